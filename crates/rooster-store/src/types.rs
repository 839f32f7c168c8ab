//! Timetable record types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A record that can live in a [`Collection`](crate::collection::Collection).
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Appointment in a user's timetable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    /// Owning user
    pub user: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Comma-joined ids of the collision group, including this appointment.
    /// Empty until collisions have been detected.
    #[serde(default)]
    pub colliding_ids: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub teachers: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl Appointment {
    /// Create an appointment, rejecting intervals that end before they start.
    pub fn new(
        id: impl Into<String>,
        user: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Self> {
        let appointment = Self {
            id: id.into(),
            user: user.into(),
            start,
            end,
            colliding_ids: String::new(),
            subjects: vec![],
            teachers: vec![],
            locations: vec![],
            groups: vec![],
            cancelled: false,
        };
        appointment.validate()?;
        Ok(appointment)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.start > self.end {
            return Err(StoreError::InvalidInterval {
                id: self.id.clone(),
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Whether the appointment lies entirely inside `[start, end]`.
    pub fn is_within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start >= start && self.end <= end
    }

    /// Ids of the collision group, in start order.
    pub fn colliding_ids(&self) -> Vec<&str> {
        if self.colliding_ids.is_empty() {
            return vec![];
        }
        self.colliding_ids.split(',').collect()
    }
}

impl Record for Appointment {
    fn id(&self) -> &str {
        &self.id
    }
}

/// School announcement, visible while its validity period lasts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub text: String,
}

impl Announcement {
    /// Whether the announcement is shown at `now`; both bounds inclusive.
    pub fn valid_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

impl Record for Announcement {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_appointment_from_json() {
        let json = r#"{
            "id": "a1",
            "user": "~me",
            "start": "2024-02-05T08:30:00Z",
            "end": "2024-02-05T09:20:00Z",
            "subjects": ["wisk"],
            "locations": ["012"]
        }"#;

        let appointment: Appointment = serde_json::from_str(json).unwrap();

        assert_eq!(appointment.id, "a1");
        assert_eq!(appointment.subjects, vec!["wisk".to_string()]);
        assert!(appointment.colliding_ids.is_empty());
        assert!(!appointment.cancelled);
        assert!(appointment.validate().is_ok());
    }

    #[test]
    fn test_new_rejects_reversed_interval() {
        let start = Utc::now();
        let result = Appointment::new("a1", "~me", start, start - Duration::minutes(1));
        assert!(matches!(result, Err(StoreError::InvalidInterval { .. })));

        assert!(Appointment::new("a2", "~me", start, start).is_ok());
    }

    #[test]
    fn test_colliding_ids_split() {
        let start = Utc::now();
        let mut appointment = Appointment::new("a1", "~me", start, start).unwrap();
        assert!(appointment.colliding_ids().is_empty());

        appointment.colliding_ids = "a1,a2".to_string();
        assert_eq!(appointment.colliding_ids(), vec!["a1", "a2"]);
    }

    #[test]
    fn test_announcement_validity_bounds() {
        let now = Utc::now();
        let announcement = Announcement {
            id: "n1".to_string(),
            start: now - Duration::days(1),
            end: now,
            title: "Sports day".to_string(),
            text: String::new(),
        };

        assert!(announcement.valid_at(now));
        assert!(announcement.valid_at(now - Duration::days(1)));
        assert!(!announcement.valid_at(now + Duration::seconds(1)));
        assert!(!announcement.valid_at(now - Duration::days(2)));
    }
}
