//! Read projections returned by queries and circulation calls.

use std::cmp::Reverse;

use crate::{
    Book, BookCopy, BookId, BookType, CopyId, LoanId, LoanStatus, Month, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

/// Result of a successful borrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowReceipt {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub book_copy_id: CopyId,
    pub borrowed_at: Timestamp,
    pub due_date: Timestamp,
}

/// Result of a successful return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReceipt {
    pub loan_id: LoanId,
    pub book_copy_id: CopyId,
    pub returned_at: Timestamp,
}

/// Availability of a book's copy pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub book_id: BookId,
    pub total_copies: usize,
    pub available_count: usize,
    pub has_open_loans: bool,
}

/// A book with its current availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    #[serde(flatten)]
    pub book: Book,
    pub available_copies: usize,
    /// At least one copy is on the shelf.
    pub available: bool,
}

impl BookSummary {
    pub fn new(book: Book, available_copies: usize) -> Self {
        Self {
            book,
            available_copies,
            available: available_copies > 0,
        }
    }
}

/// A loan joined with its book, copy and borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanView {
    pub id: LoanId,
    pub user_id: UserId,
    pub user_name: String,
    pub book_id: BookId,
    pub book_title: String,
    pub book_author: String,
    pub book_type: BookType,
    pub book_copy_id: CopyId,
    pub serial_number: String,
    pub borrowed_at: Timestamp,
    pub due_date: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<Timestamp>,
    pub status: LoanStatus,
    /// Open and past its due date at the time of the query.
    pub overdue: bool,
}

impl LoanView {
    /// Recompute `overdue` against `now`.
    pub fn at(mut self, now: Timestamp) -> Self {
        self.overdue = self.status == LoanStatus::Borrowed && now > self.due_date;
        self
    }
}

/// Order loans most recent first.
pub fn sort_history(loans: &mut [LoanView]) {
    loans.sort_by_key(|l| Reverse((l.borrowed_at, l.id)));
}

/// Full view of one book for its detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    #[serde(flatten)]
    pub summary: BookSummary,
    pub copies: Vec<BookCopy>,
    /// Loans of any copy of this book, most recent first.
    pub history: Vec<LoanView>,
}

/// One row of a monthly ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: usize,
    pub month: Month,
    pub book_id: BookId,
    pub borrow_count: u64,
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub book_type: BookType,
}

/// Order entries by count descending, title ascending, keep `limit` and
/// number them from 1.
pub fn rank_entries(mut entries: Vec<RankingEntry>, limit: usize) -> Vec<RankingEntry> {
    entries.sort_by(|a, b| {
        b.borrow_count
            .cmp(&a.borrow_count)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.book_id.cmp(&b.book_id))
    });
    entries.truncate(limit);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}
