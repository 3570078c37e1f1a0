//! Request handlers.
//!
//! Each handler runs one library operation against the database. Handlers
//! that change state open a transaction, take row locks in a fixed order
//! (book, then copies, then loans) and commit once; any error drops the
//! transaction and rolls everything back.

mod catalog;
mod circulation;
mod queries;

pub use catalog::*;
pub use circulation::*;
pub use queries::*;
