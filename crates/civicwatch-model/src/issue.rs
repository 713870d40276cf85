// SPDX-License-Identifier: Apache-2.0

use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const TITLE_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const ID_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    Empty(&'static str),
    TooLong(&'static str, usize),
    OutOfRange(&'static str),
    InvalidFormat(&'static str),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(name) => write!(f, "{name} must not be empty"),
            Self::TooLong(name, max) => write!(f, "{name} exceeds max length {max}"),
            Self::OutOfRange(name) => write!(f, "{name} is out of range"),
            Self::InvalidFormat(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if input.is_empty() {
            return Err(ParseError::Empty("issue id"));
        }
        if input.len() > ID_MAX_LEN {
            return Err(ParseError::TooLong("issue id", ID_MAX_LEN));
        }
        if input.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidFormat("issue id must not contain whitespace"));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Category {
    Pothole,
    #[serde(rename = "Broken Streetlight")]
    BrokenStreetlight,
    #[serde(rename = "Garbage Overflow")]
    GarbageOverflow,
    #[serde(rename = "Water Leakage")]
    WaterLeakage,
    #[serde(rename = "Road Damage")]
    RoadDamage,
    Other,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Pothole,
        Self::BrokenStreetlight,
        Self::GarbageOverflow,
        Self::WaterLeakage,
        Self::RoadDamage,
        Self::Other,
    ];

    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match raw {
            "Pothole" => Ok(Self::Pothole),
            "Broken Streetlight" => Ok(Self::BrokenStreetlight),
            "Garbage Overflow" => Ok(Self::GarbageOverflow),
            "Water Leakage" => Ok(Self::WaterLeakage),
            "Road Damage" => Ok(Self::RoadDamage),
            "Other" => Ok(Self::Other),
            _ => Err(ParseError::InvalidFormat("unrecognized category")),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pothole => "Pothole",
            Self::BrokenStreetlight => "Broken Streetlight",
            Self::GarbageOverflow => "Garbage Overflow",
            Self::WaterLeakage => "Water Leakage",
            Self::RoadDamage => "Road Damage",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Status {
    Pending,
    Verified,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Rejected,
}

impl Status {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Verified,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
    ];

    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match raw {
            "Pending" => Ok(Self::Pending),
            "Verified" => Ok(Self::Verified),
            "In Progress" => Ok(Self::InProgress),
            "Resolved" => Ok(Self::Resolved),
            "Rejected" => Ok(Self::Rejected),
            _ => Err(ParseError::InvalidFormat("unrecognized status")),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Verified => "Verified",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Rejected => "Rejected",
        }
    }

    /// Key used in the aggregate statistics payload.
    #[must_use]
    pub const fn stats_key(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::InProgress => "inProgress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Priority {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match raw {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Critical" => Ok(Self::Critical),
            _ => Err(ParseError::InvalidFormat("unrecognized priority")),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

/// A WGS84 point. Longitude before latitude, matching the stored
/// `[longitude, latitude]` coordinate order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ParseError> {
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(ParseError::InvalidFormat("coordinates must be finite numbers"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ParseError::OutOfRange("longitude"));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ParseError::OutOfRange("latitude"));
        }
        Ok(Self { longitude, latitude })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: GeoPoint,
    pub address: String,
    pub image: String,
    pub status: Status,
    pub priority: Priority,
    pub reported_by: UserId,
    pub admin_notes: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for issue creation. The image must already have been accepted
/// and stored by the caller; `image` carries its stored filename.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: GeoPoint,
    pub address: String,
    pub priority: Option<Priority>,
    pub image: String,
    pub reported_by: UserId,
}

impl NewIssue {
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.title.trim().is_empty() {
            return Err(ParseError::Empty("title"));
        }
        if self.title.chars().count() > TITLE_MAX_LEN {
            return Err(ParseError::TooLong("title", TITLE_MAX_LEN));
        }
        if self.description.trim().is_empty() {
            return Err(ParseError::Empty("description"));
        }
        if self.description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(ParseError::TooLong("description", DESCRIPTION_MAX_LEN));
        }
        if self.address.trim().is_empty() {
            return Err(ParseError::Empty("address"));
        }
        if self.image.is_empty() {
            return Err(ParseError::Empty("image"));
        }
        Ok(())
    }
}

/// Partial admin update. `None` fields are left unchanged; an
/// empty-string `admin_notes` is also treated as "no change", so notes
/// cannot be cleared through this path (known limitation, kept for
/// compatibility with the deployed behavior).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueUpdate {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub admin_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()).expect("label"), c);
        }
        assert!(Category::parse("pothole").is_err());
        assert!(Category::parse("").is_err());
    }

    #[test]
    fn status_labels_round_trip_and_stats_keys_are_camel_case() {
        for s in Status::ALL {
            assert_eq!(Status::parse(s.as_str()).expect("label"), s);
        }
        assert_eq!(Status::InProgress.as_str(), "In Progress");
        assert_eq!(Status::InProgress.stats_key(), "inProgress");
        assert!(Status::parse("in progress").is_err());
    }

    #[test]
    fn status_serializes_to_wire_label() {
        let v = serde_json::to_value(Status::InProgress).expect("serialize");
        assert_eq!(v, serde_json::json!("In Progress"));
        let v = serde_json::to_value(Category::BrokenStreetlight).expect("serialize");
        assert_eq!(v, serde_json::json!("Broken Streetlight"));
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn geo_point_rejects_out_of_range_and_non_finite() {
        assert!(GeoPoint::new(77.5946, 12.9716).is_ok());
        assert!(GeoPoint::new(180.0, 90.0).is_ok());
        assert!(GeoPoint::new(180.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -90.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
    }

    fn sample_new_issue() -> NewIssue {
        NewIssue {
            title: "Open pothole".to_string(),
            description: "Deep pothole near the junction".to_string(),
            category: Category::Pothole,
            location: GeoPoint::new(77.5946, 12.9716).expect("point"),
            address: "MG Road".to_string(),
            priority: None,
            image: "abc.jpg".to_string(),
            reported_by: UserId::parse("u-1").expect("user id"),
        }
    }

    #[test]
    fn new_issue_validation_enforces_length_bounds() {
        assert!(sample_new_issue().validate().is_ok());

        let mut long_title = sample_new_issue();
        long_title.title = "t".repeat(TITLE_MAX_LEN + 1);
        assert!(matches!(
            long_title.validate().expect_err("too long"),
            ParseError::TooLong("title", TITLE_MAX_LEN)
        ));

        let mut long_desc = sample_new_issue();
        long_desc.description = "d".repeat(DESCRIPTION_MAX_LEN + 1);
        assert!(long_desc.validate().is_err());

        let mut blank = sample_new_issue();
        blank.title = "   ".to_string();
        assert!(matches!(blank.validate().expect_err("blank"), ParseError::Empty("title")));

        let mut no_image = sample_new_issue();
        no_image.image = String::new();
        assert!(no_image.validate().is_err());
    }

    #[test]
    fn issue_id_parse_rejects_garbage() {
        assert!(IssueId::parse("").is_err());
        assert!(IssueId::parse("has space").is_err());
        assert!(IssueId::parse(&"x".repeat(ID_MAX_LEN + 1)).is_err());
        let generated = IssueId::generate();
        assert!(IssueId::parse(generated.as_str()).is_ok());
    }
}
