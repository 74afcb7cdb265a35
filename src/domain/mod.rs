//! Domain types for the portfolio content and its back-office users.
//!
//! Records here are storage-agnostic: repositories map sea-orm models into
//! them and services only ever hand these types to the HTTP layer.

pub mod content;
pub mod user;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use content::{
    Achievement, Content, ContentBackup, ContentFields, ContentPatch, Experience, Section, Skill,
    SkillCategory, SocialLink,
};
pub use user::{AccountStatus, RefreshTokenSet, RefreshTokenState, Role, StoredRefreshToken, User};

/// Unique identifier for a back-office user.
///
/// Keeps acting-user references from being confused with content or backup ids.
///
/// ```rust
/// use folio::domain::UserId;
///
/// let id = UserId::new(7);
/// assert_eq!(id.value(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<UserId> for i32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// One rejected input field, reported back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
