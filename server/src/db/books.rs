//! Database operations for the books table.

use chrono::{DateTime, Utc};
use lablib_engine::{Book, BookId, BookSummary, BookType};
use sqlx::{FromRow, PgConnection, PgExecutor, Row};
use uuid::Uuid;

use super::{from_db_count, to_db_count};

const BOOK_COLUMNS: &str = "b.id, b.title, b.author, b.isbn, b.jan, b.ean13, b.type, \
    b.total_copies, b.barcode, b.location, b.image_path, b.created_at, b.updated_at";

/// A stored book row from the database.
#[derive(Debug)]
pub struct StoredBook {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub jan: Option<String>,
    pub ean13: Option<String>,
    pub book_type: String,
    pub total_copies: i32,
    pub barcode: Option<String>,
    pub location: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredBook {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredBook {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            isbn: row.try_get("isbn")?,
            jan: row.try_get("jan")?,
            ean13: row.try_get("ean13")?,
            book_type: row.try_get("type")?,
            total_copies: row.try_get("total_copies")?,
            barcode: row.try_get("barcode")?,
            location: row.try_get("location")?,
            image_path: row.try_get("image_path")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredBook {
    /// Convert database row to an engine Book.
    pub fn to_book(&self) -> Result<Book, sqlx::Error> {
        let book_type =
            BookType::parse(&self.book_type).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Book {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            jan: self.jan.clone(),
            ean13: self.ean13.clone(),
            book_type,
            total_copies: from_db_count(self.total_copies.into())?,
            barcode: self.barcode.clone(),
            location: self.location.clone(),
            image_path: self.image_path.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Insert a newly catalogued book.
pub async fn insert_book(conn: &mut PgConnection, book: &Book) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO books (
            id, title, author, isbn, jan, ean13, type, total_copies,
            barcode, location, image_path, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(book.id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(&book.jan)
    .bind(&book.ean13)
    .bind(book.book_type.as_str())
    .bind(to_db_count(book.total_copies)?)
    .bind(&book.barcode)
    .bind(&book.location)
    .bind(&book.image_path)
    .bind(book.created_at)
    .bind(book.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Get a book by ID.
pub async fn get_book<'e>(
    executor: impl PgExecutor<'e>,
    id: BookId,
) -> Result<Option<StoredBook>, sqlx::Error> {
    sqlx::query_as::<_, StoredBook>(&format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Get a book by ID and hold its row lock until the transaction ends.
///
/// Every operation that changes a book's copy pool takes this lock first, so
/// resizes and deletes of one book serialize. The lock is `NO KEY UPDATE`:
/// borrows insert rows referencing the book and must not wait on it while
/// they hold a copy lock.
pub async fn lock_book(
    conn: &mut PgConnection,
    id: BookId,
) -> Result<Option<StoredBook>, sqlx::Error> {
    sqlx::query_as::<_, StoredBook>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = $1 FOR NO KEY UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Write back the mutable fields of a book.
pub async fn update_book(conn: &mut PgConnection, book: &Book) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE books
        SET title = $2, author = $3, isbn = $4, location = $5,
            total_copies = $6, image_path = $7, updated_at = $8
        WHERE id = $1
        "#,
    )
    .bind(book.id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(&book.location)
    .bind(to_db_count(book.total_copies)?)
    .bind(&book.image_path)
    .bind(book.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Set only the recorded pool size of a book.
pub async fn set_total_copies(
    conn: &mut PgConnection,
    id: BookId,
    total_copies: usize,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE books SET total_copies = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(to_db_count(total_copies)?)
        .bind(now)
        .execute(conn)
        .await?;

    Ok(())
}

/// Delete a book row. Returns whether a row was removed.
pub async fn delete_book(conn: &mut PgConnection, id: BookId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// A book joined with its count of available copies.
#[derive(Debug)]
pub struct StoredBookSummary {
    pub book: StoredBook,
    pub available_copies: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredBookSummary {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredBookSummary {
            book: StoredBook::from_row(row)?,
            available_copies: row.try_get("available_copies")?,
        })
    }
}

impl StoredBookSummary {
    pub fn to_summary(&self) -> Result<BookSummary, sqlx::Error> {
        Ok(BookSummary::new(
            self.book.to_book()?,
            from_db_count(self.available_copies)?,
        ))
    }
}

/// Case-insensitive search over title, author and identifiers, ordered by
/// title. An empty query lists every book.
pub async fn search_books<'e>(
    executor: impl PgExecutor<'e>,
    query: &str,
) -> Result<Vec<StoredBookSummary>, sqlx::Error> {
    let pattern = format!("%{}%", escape_like(query.trim()));
    sqlx::query_as::<_, StoredBookSummary>(&format!(
        r#"
        SELECT {BOOK_COLUMNS},
               COUNT(c.id) FILTER (WHERE c.is_available) AS available_copies
        FROM books b
        LEFT JOIN book_copies c ON c.book_id = b.id
        WHERE b.title ILIKE $1 OR b.author ILIKE $1
           OR b.isbn ILIKE $1 OR b.jan ILIKE $1 OR b.ean13 ILIKE $1
        GROUP BY b.id
        ORDER BY b.title, b.id
        "#
    ))
    .bind(pattern)
    .fetch_all(executor)
    .await
}

/// A book with the counts needed to answer an availability query.
#[derive(Debug)]
pub struct StoredAvailability {
    pub total_copies: i32,
    pub available_count: i64,
    pub has_open_loans: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredAvailability {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredAvailability {
            total_copies: row.try_get("total_copies")?,
            available_count: row.try_get("available_count")?,
            has_open_loans: row.try_get("has_open_loans")?,
        })
    }
}

/// Read a book's pool size, available count and open-loan flag in a single
/// statement, so all three come from the same snapshot.
pub async fn get_availability<'e>(
    executor: impl PgExecutor<'e>,
    id: BookId,
) -> Result<Option<StoredAvailability>, sqlx::Error> {
    sqlx::query_as::<_, StoredAvailability>(
        r#"
        SELECT b.total_copies,
               COUNT(c.id) FILTER (WHERE c.is_available) AS available_count,
               EXISTS (
                   SELECT 1
                   FROM borrow_records r
                   JOIN book_copies rc ON rc.id = r.book_copy_id
                   WHERE rc.book_id = b.id AND r.status = 'borrowed'
               ) AS has_open_loans
        FROM books b
        LEFT JOIN book_copies c ON c.book_id = b.id
        WHERE b.id = $1
        GROUP BY b.id
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Find the book carrying `code` as its ID or one of its identifiers.
pub async fn find_book_by_code<'e>(
    executor: impl PgExecutor<'e>,
    code: &str,
    as_id: Option<Uuid>,
) -> Result<Option<BookId>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id FROM books
        WHERE id = $2 OR isbn = $1 OR jan = $1 OR ean13 = $1
        ORDER BY (id = $2) DESC NULLS LAST, created_at, id
        LIMIT 1
        "#,
    )
    .bind(code)
    .bind(as_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| row.try_get("id")).transpose()
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
