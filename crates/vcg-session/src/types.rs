//! Core session types
//!
//! Identifiers for documents, users and versions, plus the version records
//! kept by [`VersioningService`](crate::VersioningService).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;
use vcg_graph::Graph;

macro_rules! session_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

session_id!(
    /// Document (diagram) identifier
    DocumentId
);

session_id!(
    /// User identifier
    UserId
);

session_id!(
    /// Version identifier (ULID-based, sortable by creation)
    VersionId
);

impl VersionId {
    /// Generate new version ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }
}

/// Local user taking part in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub display_name: String,
}

impl UserInfo {
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Remote participant reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub user_id: UserId,
    pub display_name: String,
    /// Presentation color assigned by the transport, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Peer {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            color: None,
        }
    }
}

/// Version metadata (a [`Version`] without its snapshot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub id: VersionId,
    pub sequence_number: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

/// Immutable named snapshot of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub sequence_number: u64,
    pub snapshot: Graph,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

impl Version {
    /// Metadata view
    #[must_use]
    pub fn meta(&self) -> VersionMeta {
        VersionMeta {
            id: self.id.clone(),
            sequence_number: self.sequence_number,
            name: self.name.clone(),
            author_id: self.author_id.clone(),
            created_at: self.created_at,
            is_current: self.is_current,
        }
    }
}
