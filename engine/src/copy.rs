//! Physical copies and their availability state machine.
//!
//! A copy is either on the shelf or on loan:
//!
//! ```text
//! Available --borrow--> OnLoan --return--> Available
//! ```
//!
//! No other transitions exist. The persisted form is the `is_available` flag.

use crate::{error::Result, BookId, CopyId, Error, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of book id characters used as the serial number prefix.
const SERIAL_PREFIX_LEN: usize = 8;

/// Number of random hex characters appended to the serial number.
const SERIAL_SUFFIX_LEN: usize = 8;

/// Availability of a single copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyState {
    Available,
    OnLoan,
}

impl CopyState {
    pub fn from_available(is_available: bool) -> Self {
        if is_available {
            CopyState::Available
        } else {
            CopyState::OnLoan
        }
    }
}

/// One physical instance of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCopy {
    pub id: CopyId,
    pub book_id: BookId,
    pub serial_number: String,
    pub barcode: Option<String>,
    pub is_available: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BookCopy {
    /// Create a fresh, available copy with a newly generated serial number.
    pub fn new(book_id: BookId, barcode: Option<String>, now: Timestamp) -> Self {
        Self::with_serial(
            Uuid::new_v4(),
            book_id,
            serial_number(book_id, &random_suffix()),
            barcode,
            now,
        )
    }

    /// Create an available copy with a known id and serial number.
    pub fn with_serial(
        id: CopyId,
        book_id: BookId,
        serial_number: String,
        barcode: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            book_id,
            serial_number,
            barcode,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> CopyState {
        CopyState::from_available(self.is_available)
    }

    /// Transition `Available -> OnLoan`.
    pub fn check_out(&mut self, now: Timestamp) -> Result<()> {
        match self.state() {
            CopyState::Available => {
                self.is_available = false;
                self.updated_at = now;
                Ok(())
            }
            CopyState::OnLoan => Err(Error::NotAvailable(format!("copy {}", self.id))),
        }
    }

    /// Transition `OnLoan -> Available`.
    pub fn check_in(&mut self, user: impl ToString, now: Timestamp) -> Result<()> {
        match self.state() {
            CopyState::OnLoan => {
                self.is_available = true;
                self.updated_at = now;
                Ok(())
            }
            CopyState::Available => Err(Error::no_open_loan(self.id, user)),
        }
    }
}

/// Derive a serial number from the owning book and a random suffix.
///
/// Format: first eight characters of the book id, a dash, then the suffix.
pub fn serial_number(book_id: BookId, suffix: &str) -> String {
    let book = book_id.simple().to_string();
    format!("{}-{}", &book[..SERIAL_PREFIX_LEN], suffix)
}

/// A fresh random serial suffix.
pub fn random_suffix() -> String {
    let fresh = Uuid::new_v4().simple().to_string();
    fresh[..SERIAL_SUFFIX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn serial_number_format() {
        let book_id = Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000000").unwrap();
        assert_eq!(serial_number(book_id, "abcd1234"), "6f1c2a3b-abcd1234");
    }

    #[test]
    fn new_copies_get_distinct_serials() {
        let book_id = Uuid::new_v4();
        let a = BookCopy::new(book_id, None, Utc::now());
        let b = BookCopy::new(book_id, None, Utc::now());
        assert_ne!(a.serial_number, b.serial_number);
        assert!(a.serial_number.starts_with(&book_id.simple().to_string()[..8]));
        assert_eq!(a.serial_number.len(), 8 + 1 + 8);
    }

    #[test]
    fn check_out_then_in() {
        let mut copy = BookCopy::new(Uuid::new_v4(), None, Utc::now());
        assert_eq!(copy.state(), CopyState::Available);

        copy.check_out(Utc::now()).unwrap();
        assert_eq!(copy.state(), CopyState::OnLoan);
        assert!(!copy.is_available);

        copy.check_in("user", Utc::now()).unwrap();
        assert!(copy.is_available);
    }

    #[test]
    fn double_check_out_fails() {
        let mut copy = BookCopy::new(Uuid::new_v4(), None, Utc::now());
        copy.check_out(Utc::now()).unwrap();
        let err = copy.check_out(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::NotAvailable(_)));
    }

    #[test]
    fn check_in_available_copy_fails() {
        let mut copy = BookCopy::new(Uuid::new_v4(), None, Utc::now());
        let err = copy.check_in("user", Utc::now()).unwrap_err();
        assert!(matches!(err, Error::NoOpenLoan { .. }));
    }
}
