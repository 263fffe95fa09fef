//! Core record types for companynotes.
//!
//! Companies are read-only reference data. Notes are the only mutable records
//! and carry the two predicates every backend relies on: visibility (who may
//! see a note in a listing) and ownership (who may change or delete it).

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A company in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Stable numeric identifier.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Industry sector.
    #[serde(default)]
    pub sector: String,
    /// Head count.
    #[serde(default)]
    pub employees: i64,
    /// Public website URL.
    #[serde(default)]
    pub website: String,
}

/// A user-authored note attached to a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Opaque identifier assigned at creation.
    pub id: String,
    /// The company this note is attached to. Not checked against the directory.
    pub company_id: i64,
    /// Note body.
    pub content: String,
    /// Hidden from everyone but the owner when set.
    #[serde(default)]
    pub is_private: bool,
    /// Identifier of the creator. Records written before ownership existed may lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When the note was created. Stored as an ISO-8601 string with millisecond precision.
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

/// `createdAt` in the `2024-03-01T12:00:00.000Z` form, millisecond precision.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Fields supplied by a caller creating a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNote {
    /// Target company.
    pub company_id: i64,
    /// Note body.
    pub content: String,
    /// Visibility flag; `false` when omitted.
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Fields a note owner may change. Omitted fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNote {
    /// Replacement body.
    #[serde(default)]
    pub content: Option<String>,
    /// Replacement visibility flag.
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Treats an empty identifier the same as a missing one.
fn present(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.is_empty())
}

impl Note {
    /// Build a fresh note owned by `owner` with a new id and creation time.
    #[must_use]
    pub fn new(input: CreateNote, owner: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company_id: input.company_id,
            content: input.content,
            is_private: input.is_private.unwrap_or(false),
            user_id: Some(owner.to_string()),
            created_at: Utc::now().trunc_subsecs(3),
        }
    }

    /// Whether `requester` owns this note.
    ///
    /// Both sides must carry a non-empty identifier; a missing owner never
    /// matches a missing requester.
    #[must_use]
    pub fn is_owned_by(&self, requester: Option<&str>) -> bool {
        match (present(self.user_id.as_deref()), present(requester)) {
            (Some(owner), Some(requester)) => owner == requester,
            _ => false,
        }
    }

    /// Whether `requester` may see this note in a listing.
    #[must_use]
    pub fn is_visible_to(&self, requester: Option<&str>) -> bool {
        !self.is_private || self.is_owned_by(requester)
    }

    /// Apply the provided fields of `update`, leaving the rest untouched.
    pub fn apply(&mut self, update: UpdateNote) {
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(is_private) = update.is_private {
            self.is_private = is_private;
        }
    }
}
