// SPDX-License-Identifier: Apache-2.0

use crate::ApiError;
use chrono::{DateTime, Utc};
use civicwatch_model::{
    Category, Issue, IssueUpdate, Priority, ReporterInfo, Status, User,
};
use civicwatch_store::IssueRow;
use serde::{Deserialize, Serialize};

/// GeoJSON-style point, `coordinates` ordered `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedByDto {
    Profile(ReporterInfo),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDto {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: LocationDto,
    pub address: String,
    pub image: String,
    pub status: Status,
    pub priority: Priority,
    pub reported_by: ReportedByDto,
    pub admin_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssueDto {
    fn build(issue: Issue, reported_by: ReportedByDto) -> Self {
        Self {
            id: issue.id.as_str().to_string(),
            title: issue.title,
            description: issue.description,
            category: issue.category,
            location: LocationDto {
                kind: "Point".to_string(),
                coordinates: [issue.location.longitude, issue.location.latitude],
            },
            address: issue.address,
            image: issue.image,
            status: issue.status,
            priority: issue.priority,
            reported_by,
            admin_notes: issue.admin_notes,
            resolved_at: issue.resolved_at,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }

    /// Bare issue: the reporter stays a plain id, as returned from
    /// creation and admin updates.
    #[must_use]
    pub fn from_issue(issue: Issue) -> Self {
        let reported_by = ReportedByDto::Id(issue.reported_by.as_str().to_string());
        Self::build(issue, reported_by)
    }

    /// Joined row: the reporter's profile is embedded when the user
    /// record still exists.
    #[must_use]
    pub fn from_row(row: IssueRow) -> Self {
        let reported_by = match row.reporter {
            Some(reporter) => ReportedByDto::Profile(reporter),
            None => ReportedByDto::Id(row.issue.reported_by.as_str().to_string()),
        };
        Self::build(row.issue, reported_by)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// Admin update request. Enum fields arrive as wire labels and are
/// parsed here so a bad label surfaces as a validation failure instead
/// of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusBody {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub admin_notes: Option<String>,
}

impl UpdateStatusBody {
    pub fn parse(&self) -> Result<IssueUpdate, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(|raw| Status::parse(raw).map_err(|_| ApiError::invalid_param("status")))
            .transpose()?;
        let priority = self
            .priority
            .as_deref()
            .map(|raw| Priority::parse(raw).map_err(|_| ApiError::invalid_param("priority")))
            .transpose()?;
        Ok(IssueUpdate {
            status,
            priority,
            admin_notes: self.admin_notes.clone(),
        })
    }
}
