// SPDX-License-Identifier: Apache-2.0

use crate::issue::{ParseError, ID_MAX_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if input.is_empty() {
            return Err(ParseError::Empty("user id"));
        }
        if input.len() > ID_MAX_LEN {
            return Err(ParseError::TooLong("user id", ID_MAX_LEN));
        }
        if input.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidFormat("user id must not contain whitespace"));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match raw {
            "citizen" => Ok(Self::Citizen),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseError::InvalidFormat("unrecognized role")),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub password_hash: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.name.trim().is_empty() {
            return Err(ParseError::Empty("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ParseError::Empty("email"));
        }
        if !self.email.contains('@') {
            return Err(ParseError::InvalidFormat("email must contain '@'"));
        }
        if self.password_hash.is_empty() {
            return Err(ParseError::Empty("password hash"));
        }
        Ok(())
    }
}

/// Reporter projection embedded in issue list/detail responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterInfo {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
}
