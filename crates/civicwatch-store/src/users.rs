// SPDX-License-Identifier: Apache-2.0

use crate::{Store, StoreError, StoreErrorCode};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use civicwatch_model::{NewUser, Role, User, UserId};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

impl Store {
    pub async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        new.validate()
            .map_err(|e| StoreError::constraint(e.to_string()))?;

        let user = User {
            id: UserId::generate(),
            name: new.name,
            email: new.email.trim().to_ascii_lowercase(),
            phone: new.phone,
            role: new.role,
            password_hash: new.password_hash,
            created_at: Utc::now().trunc_subsecs(6),
        };

        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT INTO users (id, name, email, phone, role, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id.as_str(),
                user.name,
                user.email,
                user.phone,
                user.role.as_str(),
                user.password_hash,
                user.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        );
        match inserted {
            Ok(_) => Ok(user),
            Err(e) => {
                let err = StoreError::from(e);
                if err.code == StoreErrorCode::Constraint {
                    Err(StoreError::constraint("email already registered"))
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                "SELECT id, name, email, phone, role, password_hash, created_at \
                 FROM users WHERE email = ?1",
                params![email.trim().to_ascii_lowercase()],
                decode_user,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                "SELECT id, name, email, phone, role, password_hash, created_at \
                 FROM users WHERE id = ?1",
                params![id.as_str()],
                decode_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Idempotent admin bootstrap: returns the existing account when the
    /// email is already registered, creates it otherwise.
    pub async fn ensure_admin_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            return Ok(existing);
        }
        let admin = self
            .create_user(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                phone: String::new(),
                role: Role::Admin,
                password_hash: password_hash.to_string(),
            })
            .await?;
        info!(email = %admin.email, "admin account created");
        Ok(admin)
    }
}

fn decode_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    Ok(User {
        id: UserId::parse(&id).map_err(|e| decode_err(0, e))?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: Role::parse(&role).map_err(|e| decode_err(4, e))?,
        password_hash: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| decode_err(6, e))?,
    })
}

fn decode_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
