//! Catalog records.

use crate::{error::Result, BookId, Error, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of catalogued item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    #[default]
    Book,
    Thesis,
}

impl BookType {
    pub fn as_str(self) -> &'static str {
        match self {
            BookType::Book => "book",
            BookType::Thesis => "thesis",
        }
    }

    /// Parse the stored tag. Unknown tags are rejected.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "book" => Ok(BookType::Book),
            "thesis" => Ok(BookType::Thesis),
            other => Err(Error::Validation(format!("unknown book type: {}", other))),
        }
    }
}

/// A catalogued title owning a pool of physical copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub jan: Option<String>,
    pub ean13: Option<String>,
    #[serde(rename = "type")]
    pub book_type: BookType,
    /// Configured size of the copy pool. Always equals the number of copies.
    pub total_copies: usize,
    /// Physical label printed on the copies, when it differs from the ISBN.
    pub barcode: Option<String>,
    pub location: Option<String>,
    pub image_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Book {
    /// Build a book from validated input.
    pub fn new(id: BookId, input: NewBook, now: Timestamp) -> Self {
        Self {
            id,
            title: input.title,
            author: input.author,
            isbn: input.isbn,
            jan: input.jan,
            ean13: input.ean13,
            book_type: input.book_type,
            total_copies: input.total_copies,
            barcode: input.barcode,
            location: input.location,
            image_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Barcode assigned to newly created copies of this book.
    ///
    /// The explicit label wins, then the external identifiers in the order a
    /// scanner is most likely to read them.
    pub fn copy_barcode(&self) -> Option<String> {
        self.barcode
            .clone()
            .or_else(|| self.isbn.clone())
            .or_else(|| self.ean13.clone())
            .or_else(|| self.jan.clone())
    }

    /// Apply a metadata update. The copy count is handled by the pool.
    pub fn apply_update(&mut self, update: &BookUpdate, now: Timestamp) {
        self.title = update.title.clone();
        self.author = update.author.clone();
        self.isbn = update.isbn.clone();
        self.location = update.location.clone();
        self.total_copies = update.total_copies;
        self.updated_at = now;
    }

    /// Case-insensitive match on title, author and identifiers.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&needle);
        hit(&self.title)
            || hit(&self.author)
            || [&self.isbn, &self.jan, &self.ean13]
                .into_iter()
                .flatten()
                .any(|s| hit(s))
    }
}

/// Input for cataloguing a new book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub jan: Option<String>,
    #[serde(default)]
    pub ean13: Option<String>,
    #[serde(rename = "type", default)]
    pub book_type: BookType,
    pub total_copies: usize,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl NewBook {
    /// Minimal input with a title, author and copy count.
    pub fn new(title: impl Into<String>, author: impl Into<String>, total_copies: usize) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: None,
            jan: None,
            ean13: None,
            book_type: BookType::Book,
            total_copies,
            barcode: None,
            location: None,
        }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_metadata(&self.title, &self.author, self.total_copies)
    }
}

/// Metadata update for an existing book, including the target copy count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub total_copies: usize,
}

impl BookUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_metadata(&self.title, &self.author, self.total_copies)
    }
}

fn validate_metadata(title: &str, author: &str, total_copies: usize) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title is required".into()));
    }
    if author.trim().is_empty() {
        return Err(Error::Validation("author is required".into()));
    }
    if total_copies < 1 {
        return Err(Error::Validation("total copies must be at least 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn copy_barcode_prefers_explicit_label() {
        let input = NewBook::new("Dune", "Herbert", 1)
            .with_isbn("9780441013593")
            .with_barcode("LAB-0001");
        let book = Book::new(Uuid::new_v4(), input, Utc::now());
        assert_eq!(book.copy_barcode().as_deref(), Some("LAB-0001"));
    }

    #[test]
    fn copy_barcode_falls_back_to_isbn() {
        let input = NewBook::new("Dune", "Herbert", 1).with_isbn("9780441013593");
        let book = Book::new(Uuid::new_v4(), input, Utc::now());
        assert_eq!(book.copy_barcode().as_deref(), Some("9780441013593"));
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert!(NewBook::new("", "a", 1).validate().is_err());
        assert!(NewBook::new("t", "  ", 1).validate().is_err());
        assert!(NewBook::new("t", "a", 0).validate().is_err());
        assert!(NewBook::new("t", "a", 3).validate().is_ok());
    }

    #[test]
    fn search_matches_identifiers_case_insensitively() {
        let input = NewBook::new("The Rust Book", "Klabnik", 1).with_isbn("978-1718503106");
        let book = Book::new(Uuid::new_v4(), input, Utc::now());
        assert!(book.matches("rust"));
        assert!(book.matches("KLAB"));
        assert!(book.matches("1718503106"));
        assert!(book.matches(""));
        assert!(!book.matches("python"));
    }

    #[test]
    fn type_tag_roundtrip() {
        assert_eq!(BookType::parse("thesis").unwrap(), BookType::Thesis);
        assert_eq!(BookType::Book.as_str(), "book");
        assert!(BookType::parse("magazine").is_err());
    }
}
