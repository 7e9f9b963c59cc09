// src/models/chat.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::User;

/// Prefix for identifiers of messages that have not been stored yet.
pub const PROVISIONAL_ID_PREFIX: &str = "local-";

/// A message record as stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Author relation (user record id).
    pub user: String,
    #[serde(with = "service_time")]
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<MessageExpand>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Body for the durable create call.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub text: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Appended locally, durable write still in flight
    Pending,
    Sent,
    /// Durable write failed; the entry stays visible
    Failed,
}

/// A message as shown in the conversation view.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub created: DateTime<Utc>,
    pub author_name: Option<String>,
    pub delivery: Delivery,
}

impl Message {
    /// Builds the optimistic entry for a local send.
    pub fn provisional(user_id: &str, author_name: Option<String>, text: String) -> Self {
        Self {
            id: format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4()),
            text,
            user_id: user_id.to_string(),
            created: Utc::now(),
            author_name,
            delivery: Delivery::Pending,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_ID_PREFIX)
    }

    pub fn author_label(&self) -> &str {
        self.author_name.as_deref().unwrap_or(&self.user_id)
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        let author_name = record
            .expand
            .and_then(|expand| expand.user)
            .map(|user| user.display_name().to_string())
            .filter(|name| !name.is_empty());

        Message {
            id: record.id,
            text: record.text,
            user_id: record.user,
            created: record.created,
            author_name,
            delivery: Delivery::Sent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
}

/// Payload of a realtime notification for the messages collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    pub action: RecordAction,
    pub record: MessageRecord,
}

/// Service timestamps look like `2024-03-01 09:15:00.123Z`; RFC 3339 is accepted too.
pub mod service_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
