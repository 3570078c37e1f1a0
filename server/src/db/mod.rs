//! Database module for PostgreSQL persistence.
//!
//! Functions that take `&mut PgConnection` are meant to run inside a
//! transaction opened by the caller; pass `&mut *tx`. Functions that take an
//! executor work against the pool or a transaction alike.

mod books;
mod copies;
mod loans;
mod pool;
mod rankings;
mod users;

pub use books::*;
pub use copies::*;
pub use loans::*;
pub use pool::*;
pub use rankings::*;
pub use users::*;

/// Whether `err` violates an integrity constraint (unique, foreign key,
/// check, not null). Resubmitting the same statement fails the same way.
pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| is_constraint_violation_code(&code)),
        _ => false,
    }
}

/// SQLSTATE class 23 is "integrity constraint violation".
pub(crate) fn is_constraint_violation_code(code: &str) -> bool {
    code.len() == 5 && code.starts_with("23")
}

/// Convert an in-memory count to the `INTEGER` columns used for copy counts.
pub(crate) fn to_db_count(count: usize) -> Result<i32, sqlx::Error> {
    i32::try_from(count).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Convert a non-negative database count back to `usize`.
pub(crate) fn from_db_count(count: i64) -> Result<usize, sqlx::Error> {
    usize::try_from(count).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
