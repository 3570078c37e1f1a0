//! # Lablib Engine
//!
//! The circulation and inventory-consistency model for a physical-item
//! library.
//!
//! Books are catalogued, each book owns a pool of physical copies, and copies
//! move between the shelf and a borrower as users borrow and return them.
//! Every borrow also credits the book in a per-month popularity ranking.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine knows nothing of databases, files or the network
//! - **Caller supplies time**: every operation takes `now`, so results are
//!   reproducible in tests
//! - **All or nothing**: a failing operation leaves state untouched
//!
//! ## Core Concepts
//!
//! ### Copies
//!
//! A [`BookCopy`] is either available or on loan. The only transitions are
//! borrow (`Available -> OnLoan`) and return (`OnLoan -> Available`).
//!
//! ### Loans
//!
//! A [`BorrowRecord`] is opened by a borrow with a due date
//! [`LOAN_PERIOD_DAYS`] out, and closed once by the matching return. A copy is
//! unavailable exactly when it has an open record.
//!
//! ### Copy pools
//!
//! [`plan_resize`] decides how a book's pool grows or shrinks. Shrinking only
//! ever removes available copies, newest first, and refuses to cut into
//! copies on loan.
//!
//! ### Rankings
//!
//! A [`MonthlyRanking`] counts borrows of one book in one [`Month`]. Returns do
//! not reduce it.
//!
//! ## Quick Start
//!
//! ```rust
//! use lablib_engine::{CopyKey, Library, NewBook, Role, User};
//! use chrono::Utc;
//! use uuid::Uuid;
//!
//! let mut library = Library::new();
//! let reader = User {
//!     id: Uuid::new_v4(),
//!     student_id: "s1234".into(),
//!     name: "Alice".into(),
//!     role: Role::User,
//! };
//! library.register_user(reader.clone());
//!
//! let now = Utc::now();
//! let book = library
//!     .create_book(NewBook::new("Dune", "Frank Herbert", 2).with_isbn("9780441013593"), now)
//!     .unwrap();
//!
//! let key = CopyKey::parse("9780441013593").unwrap();
//! let receipt = library.borrow(&key, reader.id, now).unwrap();
//! assert_eq!(library.available_count(book.id).unwrap(), 1);
//!
//! library.return_copy(&CopyKey::Id(receipt.book_copy_id), reader.id, now).unwrap();
//! assert_eq!(library.available_count(book.id).unwrap(), 2);
//! ```
//!
//! ## Persistence
//!
//! [`Library`] keeps state in memory. Persistent deployments run the same
//! rules inside database transactions, calling into [`plan_resize`],
//! [`BorrowRecord::open`] and the other building blocks directly.

pub mod book;
pub mod copy;
pub mod error;
pub mod key;
pub mod library;
pub mod loan;
pub mod pool;
pub mod ranking;
pub mod user;
pub mod view;

// Re-export main types at crate root
pub use book::{Book, BookType, BookUpdate, NewBook};
pub use copy::{random_suffix, serial_number, BookCopy, CopyState};
pub use error::{Entity, Error, ErrorKind};
pub use key::{CopyKey, Resolved};
pub use library::Library;
pub use loan::{due_date, BorrowRecord, LoanStatus, LOAN_PERIOD_DAYS};
pub use pool::{available_count, plan_resize, ResizePlan};
pub use ranking::{clamp_limit, Month, MonthlyRanking, DEFAULT_RANKING_LIMIT, MAX_RANKING_LIMIT};
pub use user::{HistoryScope, Role, User};
pub use view::{
    rank_entries, sort_history, Availability, BookDetail, BookSummary, BorrowReceipt, LoanView,
    RankingEntry, ReturnReceipt,
};

/// Type aliases for clarity
pub type BookId = uuid::Uuid;
pub type CopyId = uuid::Uuid;
pub type LoanId = uuid::Uuid;
pub type UserId = uuid::Uuid;
pub type Timestamp = chrono::DateTime<chrono::Utc>;
