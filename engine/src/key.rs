//! Lookup keys for physical copies and scanned codes.

use std::fmt;

use crate::{error::Result, BookId, CopyId, Error};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the copy a borrow or return acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CopyKey {
    /// Internal copy id.
    Id(CopyId),
    /// Printed barcode. Several copies of the same book may share one.
    Barcode(String),
}

impl CopyKey {
    /// Parse a scanned or typed code. UUIDs are copy ids, anything else is a
    /// barcode.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Validation("copy key is required".into()));
        }
        Ok(match Uuid::parse_str(code) {
            Ok(id) => CopyKey::Id(id),
            Err(_) => CopyKey::Barcode(code.to_string()),
        })
    }
}

impl fmt::Display for CopyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyKey::Id(id) => write!(f, "copy {}", id),
            CopyKey::Barcode(code) => write!(f, "barcode {}", code),
        }
    }
}

/// What a scanned code refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Resolved {
    Copy(CopyId),
    Book(BookId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_codes_are_ids() {
        let id = Uuid::new_v4();
        let key = CopyKey::parse(&format!("  {}  ", id)).unwrap();
        assert_eq!(key, CopyKey::Id(id));
    }

    #[test]
    fn other_codes_are_barcodes() {
        let key = CopyKey::parse("9784873119786").unwrap();
        assert_eq!(key, CopyKey::Barcode("9784873119786".into()));
    }

    #[test]
    fn empty_code_is_invalid() {
        let err = CopyKey::parse("   ").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn resolved_serialization_format() {
        let id = Uuid::nil();
        let json = serde_json::to_value(Resolved::Copy(id)).unwrap();
        assert_eq!(json["kind"], "copy");
        assert_eq!(json["id"], id.to_string());
    }
}
