//! Data models
//!
//! Rust structs representing database rows and the portfolio document.
//! Identities use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Parse a stored identifier, rejecting anything that is not a ULID
    pub fn parse(s: &str) -> Option<Self> {
        ulid::Ulid::from_string(s).ok().map(|id| Self(id.to_string()))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Identity
// =============================================================================

/// A registered user
///
/// `email` and `handle` are each unique across the table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: String,
    /// Provider-verified email, immutable after signup
    pub email: String,
    /// Public username
    pub handle: String,
    pub signup_time: DateTime<Utc>,
    pub signup_ip: Option<String>,
    pub signup_agent: Option<String>,
}

/// Candidate row for an identity insert
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub id: EntityId,
    pub email: String,
    pub handle: String,
    pub provenance: Provenance,
    pub portfolio: Portfolio,
}

/// Where a signup came from
#[derive(Debug, Clone)]
pub struct Provenance {
    pub remote_addr: Option<String>,
    pub user_agent: Option<String>,
    pub at: DateTime<Utc>,
}

/// Which uniqueness constraint rejected an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Handle,
}

/// Result of an atomic identity insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate(UniqueField),
}

// =============================================================================
// Session
// =============================================================================

/// Stored session row
///
/// The client only ever sees the raw token; the table holds its digest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub token_hash: String,
    pub identity_id: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.expires_at, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

// =============================================================================
// Portfolio
// =============================================================================

/// Public page document, stored as JSON next to the identity
///
/// Missing fields fall back to the default theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Portfolio {
    pub first_name: String,
    pub last_name: String,
    pub location: String,
    pub bio: String,
    pub sections: Vec<Section>,
    pub sidebar_color: String,
    pub background_color: String,
    pub project_color: String,
    pub accent_color: String,
    pub font: String,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            location: String::new(),
            bio: String::new(),
            sections: Vec::new(),
            sidebar_color: "amber-400".to_string(),
            background_color: "slate-50".to_string(),
            project_color: "slate-100".to_string(),
            accent_color: "slate-200".to_string(),
            font: "sans".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    #[serde(rename = "imageURL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}
