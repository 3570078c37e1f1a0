//! Borrow records and loan policy.

use crate::{error::Result, CopyId, Error, LoanId, Timestamp, UserId};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Fixed loan period in days.
pub const LOAN_PERIOD_DAYS: i64 = 14;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Due date for a loan starting at `borrowed_at`.
pub fn due_date(borrowed_at: Timestamp) -> Timestamp {
    borrowed_at + Duration::days(LOAN_PERIOD_DAYS)
}

/// Lifecycle of a borrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Returned,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Returned => "returned",
        }
    }

    pub fn parse(status: &str) -> Result<Self> {
        match status {
            "borrowed" => Ok(LoanStatus::Borrowed),
            "returned" => Ok(LoanStatus::Returned),
            other => Err(Error::Validation(format!("unknown loan status: {}", other))),
        }
    }
}

/// One borrow event of one copy by one user.
///
/// Created open by a successful borrow and closed exactly once by the
/// matching return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    pub id: LoanId,
    pub user_id: UserId,
    pub book_copy_id: CopyId,
    pub borrowed_at: Timestamp,
    pub due_date: Timestamp,
    pub returned_at: Option<Timestamp>,
    pub status: LoanStatus,
}

impl BorrowRecord {
    /// Open a new loan at `now` under the fixed loan period.
    pub fn open(id: LoanId, user_id: UserId, book_copy_id: CopyId, now: Timestamp) -> Self {
        Self {
            id,
            user_id,
            book_copy_id,
            borrowed_at: now,
            due_date: due_date(now),
            returned_at: None,
            status: LoanStatus::Borrowed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Borrowed
    }

    /// Close the loan. A record can be closed only once.
    pub fn close(&mut self, now: Timestamp) -> Result<()> {
        if !self.is_open() {
            return Err(Error::no_open_loan(self.book_copy_id, self.user_id));
        }
        self.returned_at = Some(now);
        self.status = LoanStatus::Returned;
        Ok(())
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.is_open() && now > self.due_date
    }

    /// Whole days until the due date, rounded up. Negative once overdue.
    pub fn days_remaining(&self, now: Timestamp) -> i64 {
        days_until(self.due_date, now)
    }
}

pub(crate) fn days_until(due: Timestamp, now: Timestamp) -> i64 {
    let millis = (due - now).num_milliseconds();
    let days = millis / MILLIS_PER_DAY;
    if millis % MILLIS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}
