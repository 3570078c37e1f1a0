//! Error types for the lablib engine.

use std::fmt;

use crate::{BookId, CopyId};
use thiserror::Error;

/// Kind of entity a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Book,
    Copy,
    User,
    Loan,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Book => "book",
            Entity::Copy => "copy",
            Entity::User => "user",
            Entity::Loan => "loan",
        };
        f.write_str(name)
    }
}

/// Stable error categories surfaced to callers.
///
/// `Store` is never produced by the engine itself; it exists so that
/// persistence layers can report transaction and connectivity failures in the
/// same taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NotAvailable,
    NoOpenLoan,
    Conflict,
    Store,
}

impl ErrorKind {
    /// Machine-readable code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotAvailable => "not_available",
            ErrorKind::NoOpenLoan => "no_open_loan",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Store => "store",
        }
    }

    /// Whether resubmitting the same request later may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Store)
    }
}

/// All possible errors from the lablib engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    // Circulation errors
    #[error("no available copy for {0}")]
    NotAvailable(String),

    #[error("no open loan for copy {copy} held by user {user}")]
    NoOpenLoan { copy: String, user: String },

    // Copy pool errors
    #[error("cannot remove {requested} copies: only {available} available, the rest are on loan")]
    InsufficientAvailableCopies { requested: usize, available: usize },

    #[error("book {0} has copies on loan")]
    BookOnLoan(BookId),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] error.
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`Error::NoOpenLoan`] error on a known copy.
    pub fn no_open_loan(copy: CopyId, user: impl ToString) -> Self {
        Error::NoOpenLoan {
            copy: copy.to_string(),
            user: user.to_string(),
        }
    }

    /// The stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::NotAvailable(_) => ErrorKind::NotAvailable,
            Error::NoOpenLoan { .. } => ErrorKind::NoOpenLoan,
            Error::InsufficientAvailableCopies { .. } | Error::BookOnLoan(_) => {
                ErrorKind::Conflict
            }
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
