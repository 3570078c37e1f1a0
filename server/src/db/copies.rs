//! Database operations for the book_copies table.

use chrono::{DateTime, Utc};
use lablib_engine::{BookCopy, BookId, CopyId};
use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

/// A stored copy row from the database.
#[derive(Debug, Clone)]
pub struct StoredCopy {
    pub id: Uuid,
    pub book_id: Uuid,
    pub serial_number: String,
    pub barcode: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredCopy {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredCopy {
            id: row.try_get("id")?,
            book_id: row.try_get("book_id")?,
            serial_number: row.try_get("serial_number")?,
            barcode: row.try_get("barcode")?,
            is_available: row.try_get("is_available")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredCopy {
    /// Convert database row to an engine BookCopy.
    pub fn to_copy(&self) -> BookCopy {
        BookCopy {
            id: self.id,
            book_id: self.book_id,
            serial_number: self.serial_number.clone(),
            barcode: self.barcode.clone(),
            is_available: self.is_available,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Insert a copy unless its serial number is already taken.
///
/// Returns `false` on a serial collision so the caller can draw a new serial
/// without aborting the surrounding transaction.
pub async fn insert_copy(conn: &mut PgConnection, copy: &BookCopy) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO book_copies (
            id, book_id, serial_number, barcode, is_available, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (serial_number) DO NOTHING
        "#,
    )
    .bind(copy.id)
    .bind(copy.book_id)
    .bind(&copy.serial_number)
    .bind(&copy.barcode)
    .bind(copy.is_available)
    .bind(copy.created_at)
    .bind(copy.updated_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get a copy by ID and hold its row lock until the transaction ends.
pub async fn lock_copy(
    conn: &mut PgConnection,
    id: CopyId,
) -> Result<Option<StoredCopy>, sqlx::Error> {
    sqlx::query_as::<_, StoredCopy>(
        r#"
        SELECT id, book_id, serial_number, barcode, is_available, created_at, updated_at
        FROM book_copies
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Lock the lowest-serial available copy labelled `barcode`, skipping rows
/// another transaction is already working on.
pub async fn lock_free_copy_by_barcode(
    conn: &mut PgConnection,
    barcode: &str,
) -> Result<Option<StoredCopy>, sqlx::Error> {
    sqlx::query_as::<_, StoredCopy>(
        r#"
        SELECT id, book_id, serial_number, barcode, is_available, created_at, updated_at
        FROM book_copies
        WHERE barcode = $1 AND is_available
        ORDER BY serial_number
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(barcode)
    .fetch_optional(conn)
    .await
}

/// IDs of every copy labelled `barcode`, in ID order.
///
/// Locking these one at a time in this order matches the order
/// [`lock_copies_of_book`] uses.
pub async fn copy_ids_by_barcode(
    conn: &mut PgConnection,
    barcode: &str,
) -> Result<Vec<CopyId>, sqlx::Error> {
    let rows = sqlx::query("SELECT id FROM book_copies WHERE barcode = $1 ORDER BY id")
        .bind(barcode)
        .fetch_all(conn)
        .await?;

    rows.iter().map(|row| row.try_get("id")).collect()
}

/// Lock every copy of a book, in ID order.
///
/// The caller must already hold the book's row lock.
pub async fn lock_copies_of_book(
    conn: &mut PgConnection,
    book_id: BookId,
) -> Result<Vec<StoredCopy>, sqlx::Error> {
    sqlx::query_as::<_, StoredCopy>(
        r#"
        SELECT id, book_id, serial_number, barcode, is_available, created_at, updated_at
        FROM book_copies
        WHERE book_id = $1
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(book_id)
    .fetch_all(conn)
    .await
}

/// Get the copies of a book, lowest serial first.
pub async fn list_copies<'e>(
    executor: impl PgExecutor<'e>,
    book_id: BookId,
) -> Result<Vec<StoredCopy>, sqlx::Error> {
    sqlx::query_as::<_, StoredCopy>(
        r#"
        SELECT id, book_id, serial_number, barcode, is_available, created_at, updated_at
        FROM book_copies
        WHERE book_id = $1
        ORDER BY serial_number
        "#,
    )
    .bind(book_id)
    .fetch_all(executor)
    .await
}

/// Flip a copy between the shelf and a borrower.
pub async fn set_available(
    conn: &mut PgConnection,
    id: CopyId,
    is_available: bool,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE book_copies SET is_available = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(is_available)
        .bind(now)
        .execute(conn)
        .await?;

    Ok(())
}

/// Delete the given copies, but only those still on the shelf.
///
/// Returns how many rows were removed.
pub async fn delete_available_copies(
    conn: &mut PgConnection,
    ids: &[CopyId],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM book_copies WHERE id = ANY($1) AND is_available")
        .bind(ids)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Delete every copy of a book.
pub async fn delete_copies_of_book(
    conn: &mut PgConnection,
    book_id: BookId,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM book_copies WHERE book_id = $1")
        .bind(book_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Find the copy carrying `code` as its ID, serial number or barcode.
pub async fn find_copy_by_code<'e>(
    executor: impl PgExecutor<'e>,
    code: &str,
    as_id: Option<Uuid>,
) -> Result<Option<CopyId>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id FROM book_copies
        WHERE id = $2 OR serial_number = $1 OR barcode = $1
        ORDER BY serial_number
        LIMIT 1
        "#,
    )
    .bind(code)
    .bind(as_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| row.try_get("id")).transpose()
}
