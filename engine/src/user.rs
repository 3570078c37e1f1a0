//! Borrowers as seen by the engine.
//!
//! Credentials and sessions live elsewhere; the engine only needs to know a
//! user exists, their display name, and their role.

use crate::{error::Result, Error, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(role: &str) -> Result<Self> {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::Validation(format!("unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub student_id: String,
    pub name: String,
    pub role: Role,
}

/// Which loan records a history query may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    All,
    User(UserId),
}

impl HistoryScope {
    /// Scope for `caller` asking for `requested` (or everything when `None`).
    ///
    /// Admins get what they ask for. Everyone else is pinned to their own
    /// records; `None` is returned when they ask for someone else's.
    pub fn for_caller(caller: UserId, role: Role, requested: Option<UserId>) -> Option<Self> {
        match (role, requested) {
            (Role::Admin, None) => Some(HistoryScope::All),
            (Role::Admin, Some(user)) => Some(HistoryScope::User(user)),
            (Role::User, None) => Some(HistoryScope::User(caller)),
            (Role::User, Some(user)) if user == caller => Some(HistoryScope::User(caller)),
            (Role::User, Some(_)) => None,
        }
    }

    pub fn user(self) -> Option<UserId> {
        match self {
            HistoryScope::All => None,
            HistoryScope::User(id) => Some(id),
        }
    }
}
