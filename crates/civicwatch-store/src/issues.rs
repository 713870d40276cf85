// SPDX-License-Identifier: Apache-2.0

use crate::geo::{bounding_box, haversine_km};
use crate::{Store, StoreError};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use civicwatch_model::{
    Category, GeoPoint, Issue, IssueId, IssueUpdate, NewIssue, Priority, ReporterInfo, Status,
    UserId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;

const ISSUE_COLUMNS: &str = "i.id, i.title, i.description, i.category, i.longitude, i.latitude, \
     i.address, i.image, i.status, i.priority, i.reported_by, i.admin_notes, i.resolved_at, \
     i.created_at, i.updated_at";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub reported_by: Option<UserId>,
}

/// An issue joined with its reporter's profile (when the user record
/// still exists).
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub issue: Issue,
    pub reporter: Option<ReporterInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyIssue {
    pub row: IssueRow,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStats {
    pub total: u64,
    /// Dense: every status key present, zero-valued when absent.
    pub by_status: BTreeMap<String, u64>,
    /// Sparse: only categories that occur in the data.
    pub by_category: BTreeMap<String, u64>,
    /// Sparse: only priorities that occur in the data.
    pub by_priority: BTreeMap<String, u64>,
}

impl Store {
    pub async fn create_issue(&self, new: NewIssue) -> Result<Issue, StoreError> {
        new.validate()
            .map_err(|e| StoreError::constraint(e.to_string()))?;

        let now = now_micros();
        let issue = Issue {
            id: IssueId::generate(),
            title: new.title,
            description: new.description,
            category: new.category,
            location: new.location,
            address: new.address,
            image: new.image,
            status: Status::Pending,
            priority: new.priority.unwrap_or_default(),
            reported_by: new.reported_by,
            admin_notes: String::new(),
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO issues (id, title, description, category, longitude, latitude, address, \
             image, status, priority, reported_by, admin_notes, resolved_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                issue.id.as_str(),
                issue.title,
                issue.description,
                issue.category.as_str(),
                issue.location.longitude,
                issue.location.latitude,
                issue.address,
                issue.image,
                issue.status.as_str(),
                issue.priority.as_str(),
                issue.reported_by.as_str(),
                issue.admin_notes,
                Option::<String>::None,
                fmt_ts(issue.created_at),
                fmt_ts(issue.updated_at),
            ],
        )?;
        let seq = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO issue_geo (issue_rowid, min_lon, max_lon, min_lat, max_lat) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                seq,
                issue.location.longitude,
                issue.location.longitude,
                issue.location.latitude,
                issue.location.latitude
            ],
        )?;
        tx.commit()?;
        Ok(issue)
    }

    /// Filtered, newest-first page of issues plus the total size of the
    /// filtered set. `page` is 1-indexed.
    pub async fn list_issues(
        &self,
        filter: &IssueFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<IssueRow>, u64), StoreError> {
        let mut where_parts: Vec<&'static str> = Vec::new();
        let mut filter_params: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(status) = filter.status {
            where_parts.push("i.status = ?");
            filter_params.push(rusqlite::types::Value::Text(status.as_str().to_string()));
        }
        if let Some(category) = filter.category {
            where_parts.push("i.category = ?");
            filter_params.push(rusqlite::types::Value::Text(category.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            where_parts.push("i.priority = ?");
            filter_params.push(rusqlite::types::Value::Text(priority.as_str().to_string()));
        }
        if let Some(reported_by) = &filter.reported_by {
            where_parts.push("i.reported_by = ?");
            filter_params.push(rusqlite::types::Value::Text(reported_by.as_str().to_string()));
        }
        let where_clause = if where_parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_parts.join(" AND "))
        };

        let conn = self.conn.lock().await;
        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM issues i{where_clause}"),
            rusqlite::params_from_iter(filter_params.iter()),
            |row| row.get::<_, i64>(0),
        )? as u64;

        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let sql = format!(
            "SELECT {ISSUE_COLUMNS}, u.name, u.email, u.phone \
             FROM issues i LEFT JOIN users u ON u.id = i.reported_by\
             {where_clause} ORDER BY i.created_at DESC, i.seq DESC LIMIT ? OFFSET ?"
        );
        let mut page_params = filter_params;
        page_params.push(rusqlite::types::Value::Integer(page_size as i64));
        page_params.push(rusqlite::types::Value::Integer(offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(page_params.iter()), decode_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, total))
    }

    pub async fn get_issue(&self, id: &IssueId) -> Result<Option<IssueRow>, StoreError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {ISSUE_COLUMNS}, u.name, u.email, u.phone \
             FROM issues i LEFT JOIN users u ON u.id = i.reported_by WHERE i.id = ?1"
        );
        let row = conn
            .query_row(&sql, params![id.as_str()], decode_row)
            .optional()?;
        Ok(row)
    }

    /// Applies a partial admin update. Returns `None` when the issue does
    /// not exist. `resolved_at` latches on the first transition into
    /// Resolved and is never rewritten afterwards.
    pub async fn update_issue_status(
        &self,
        id: &IssueId,
        update: &IssueUpdate,
    ) -> Result<Option<Issue>, StoreError> {
        let now = now_micros();
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let Some(mut issue) = fetch_issue(&tx, id)? else {
            return Ok(None);
        };

        if let Some(status) = update.status {
            issue.status = status;
            if status == Status::Resolved && issue.resolved_at.is_none() {
                issue.resolved_at = Some(now);
            }
        }
        if let Some(priority) = update.priority {
            issue.priority = priority;
        }
        if let Some(notes) = &update.admin_notes {
            // Empty string means "no change": notes cannot be cleared here.
            if !notes.is_empty() {
                issue.admin_notes = notes.clone();
            }
        }
        issue.updated_at = now;

        tx.execute(
            "UPDATE issues SET status = ?1, priority = ?2, admin_notes = ?3, resolved_at = ?4, \
             updated_at = ?5 WHERE id = ?6",
            params![
                issue.status.as_str(),
                issue.priority.as_str(),
                issue.admin_notes,
                issue.resolved_at.map(fmt_ts),
                fmt_ts(issue.updated_at),
                issue.id.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(Some(issue))
    }

    /// Removes the record and its spatial index entry. Returns `false`
    /// when no issue with `id` exists.
    pub async fn delete_issue(&self, id: &IssueId) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let seq: Option<i64> = tx
            .query_row(
                "SELECT seq FROM issues WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(seq) = seq else {
            return Ok(false);
        };
        tx.execute("DELETE FROM issue_geo WHERE issue_rowid = ?1", params![seq])?;
        tx.execute("DELETE FROM issues WHERE seq = ?1", params![seq])?;
        tx.commit()?;
        Ok(true)
    }

    /// Issues within `radius_km` of `center`, nearest first. The R*Tree
    /// narrows to a bounding box; the exact great-circle cut and the
    /// ordering happen here. No ownership narrowing: duplicate-spotting
    /// across reporters is the point of this query.
    pub async fn nearby_issues(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<NearbyIssue>, StoreError> {
        let bb = bounding_box(center, radius_km);
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {ISSUE_COLUMNS}, u.name, u.email, u.phone \
             FROM issues i \
             JOIN issue_geo r ON r.issue_rowid = i.seq \
             LEFT JOIN users u ON u.id = i.reported_by \
             WHERE r.min_lon <= ?1 AND r.max_lon >= ?2 AND r.min_lat <= ?3 AND r.max_lat >= ?4"
        );
        let mut stmt = conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(
                params![bb.max_lon, bb.min_lon, bb.max_lat, bb.min_lat],
                decode_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut hits: Vec<NearbyIssue> = candidates
            .into_iter()
            .filter_map(|row| {
                let distance_km = haversine_km(center, row.issue.location);
                (distance_km <= radius_km).then_some(NearbyIssue { row, distance_km })
            })
            .collect();
        hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        Ok(hits)
    }

    pub async fn issue_stats(&self) -> Result<IssueStats, StoreError> {
        let conn = self.conn.lock().await;
        let total: u64 =
            conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get::<_, i64>(0))? as u64;

        let mut by_status: BTreeMap<String, u64> = Status::ALL
            .iter()
            .map(|s| (s.stats_key().to_string(), 0))
            .collect();
        for (label, count) in group_counts(&conn, "status")? {
            let status = Status::parse(&label)
                .map_err(|e| StoreError::new(crate::StoreErrorCode::Sql, e.to_string()))?;
            by_status.insert(status.stats_key().to_string(), count);
        }

        Ok(IssueStats {
            total,
            by_status,
            by_category: group_counts(&conn, "category")?.into_iter().collect(),
            by_priority: group_counts(&conn, "priority")?.into_iter().collect(),
        })
    }
}

fn group_counts(conn: &Connection, column: &str) -> Result<Vec<(String, u64)>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM issues GROUP BY {column}"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn fetch_issue(conn: &Connection, id: &IssueId) -> Result<Option<Issue>, StoreError> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues i WHERE i.id = ?1");
    let issue = conn
        .query_row(&sql, params![id.as_str()], decode_issue)
        .optional()?;
    Ok(issue)
}

fn now_micros() -> DateTime<Utc> {
    // Truncated to the stored precision so values survive a round trip
    // through the database unchanged.
    Utc::now().trunc_subsecs(6)
}

fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_err(idx, e))
}

fn decode_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let id: String = row.get(0)?;
    let category: String = row.get(3)?;
    let longitude: f64 = row.get(4)?;
    let latitude: f64 = row.get(5)?;
    let status: String = row.get(8)?;
    let priority: String = row.get(9)?;
    let reported_by: String = row.get(10)?;
    let resolved_at: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Issue {
        id: IssueId::parse(&id).map_err(|e| decode_err(0, e))?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: Category::parse(&category).map_err(|e| decode_err(3, e))?,
        location: GeoPoint::new(longitude, latitude).map_err(|e| decode_err(4, e))?,
        address: row.get(6)?,
        image: row.get(7)?,
        status: Status::parse(&status).map_err(|e| decode_err(8, e))?,
        priority: Priority::parse(&priority).map_err(|e| decode_err(9, e))?,
        reported_by: UserId::parse(&reported_by).map_err(|e| decode_err(10, e))?,
        admin_notes: row.get(11)?,
        resolved_at: resolved_at.as_deref().map(|raw| parse_ts(12, raw)).transpose()?,
        created_at: parse_ts(13, &created_at)?,
        updated_at: parse_ts(14, &updated_at)?,
    })
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<IssueRow> {
    let issue = decode_issue(row)?;
    let name: Option<String> = row.get(15)?;
    let email: Option<String> = row.get(16)?;
    let phone: Option<String> = row.get(17)?;
    let reporter = match (name, email, phone) {
        (Some(name), Some(email), Some(phone)) => Some(ReporterInfo {
            id: issue.reported_by.clone(),
            name,
            email,
            phone,
        }),
        _ => None,
    };
    Ok(IssueRow { issue, reporter })
}
