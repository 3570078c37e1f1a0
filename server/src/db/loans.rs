//! Database operations for the borrow_records table.

use chrono::{DateTime, Utc};
use lablib_engine::{
    BookId, BookType, BorrowRecord, CopyId, LoanId, LoanStatus, LoanView, UserId,
};
use sqlx::{FromRow, PgConnection, PgExecutor, Row};
use uuid::Uuid;

fn decode_error(e: lablib_engine::Error) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

/// A stored borrow record row from the database.
#[derive(Debug)]
pub struct StoredLoan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_copy_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredLoan {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredLoan {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            book_copy_id: row.try_get("book_copy_id")?,
            borrowed_at: row.try_get("borrowed_at")?,
            due_date: row.try_get("due_date")?,
            returned_at: row.try_get("returned_at")?,
            status: row.try_get("status")?,
        })
    }
}

impl StoredLoan {
    /// Convert database row to an engine BorrowRecord.
    pub fn to_record(&self) -> Result<BorrowRecord, sqlx::Error> {
        Ok(BorrowRecord {
            id: self.id,
            user_id: self.user_id,
            book_copy_id: self.book_copy_id,
            borrowed_at: self.borrowed_at,
            due_date: self.due_date,
            returned_at: self.returned_at,
            status: LoanStatus::parse(&self.status).map_err(decode_error)?,
        })
    }
}

/// Insert a freshly opened loan.
pub async fn insert_loan(conn: &mut PgConnection, record: &BorrowRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO borrow_records (
            id, user_id, book_copy_id, borrowed_at, due_date, returned_at, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(record.book_copy_id)
    .bind(record.borrowed_at)
    .bind(record.due_date)
    .bind(record.returned_at)
    .bind(record.status.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

/// Lock `user_id`'s open loan on a copy, if there is one.
///
/// The caller must already hold the copy's row lock.
pub async fn lock_open_loan(
    conn: &mut PgConnection,
    copy_id: CopyId,
    user_id: UserId,
) -> Result<Option<StoredLoan>, sqlx::Error> {
    sqlx::query_as::<_, StoredLoan>(
        r#"
        SELECT id, user_id, book_copy_id, borrowed_at, due_date, returned_at, status
        FROM borrow_records
        WHERE book_copy_id = $1 AND user_id = $2 AND status = 'borrowed'
        FOR UPDATE
        "#,
    )
    .bind(copy_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// Lock `user_id`'s oldest open loan on any copy labelled `barcode`, together
/// with that copy.
pub async fn lock_open_loan_by_barcode(
    conn: &mut PgConnection,
    barcode: &str,
    user_id: UserId,
) -> Result<Option<StoredLoan>, sqlx::Error> {
    sqlx::query_as::<_, StoredLoan>(
        r#"
        SELECT r.id, r.user_id, r.book_copy_id, r.borrowed_at, r.due_date,
               r.returned_at, r.status
        FROM borrow_records r
        JOIN book_copies c ON c.id = r.book_copy_id
        WHERE c.barcode = $1 AND r.user_id = $2 AND r.status = 'borrowed'
        ORDER BY r.borrowed_at, r.id
        LIMIT 1
        FOR UPDATE OF r, c
        "#,
    )
    .bind(barcode)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// Mark a loan returned.
pub async fn close_loan(
    conn: &mut PgConnection,
    id: LoanId,
    returned_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE borrow_records SET status = 'returned', returned_at = $2 WHERE id = $1",
    )
    .bind(id)
    .bind(returned_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Whether any copy of a book has an open loan.
pub async fn has_open_loans<'e>(
    executor: impl PgExecutor<'e>,
    book_id: BookId,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM borrow_records r
            JOIN book_copies c ON c.id = r.book_copy_id
            WHERE c.book_id = $1 AND r.status = 'borrowed'
        ) AS open
        "#,
    )
    .bind(book_id)
    .fetch_one(executor)
    .await?;

    row.try_get("open")
}

/// Delete the closed loan history of a book's copies.
pub async fn delete_loans_of_book(
    conn: &mut PgConnection,
    book_id: BookId,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM borrow_records r
        USING book_copies c
        WHERE c.id = r.book_copy_id AND c.book_id = $1 AND r.status = 'returned'
        "#,
    )
    .bind(book_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Delete the closed loan records of the given copies.
///
/// Run before deleting the copies themselves; open loans are left alone so a
/// copy still on loan keeps blocking its own deletion.
pub async fn delete_closed_loans_of_copies(
    conn: &mut PgConnection,
    copy_ids: &[CopyId],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM borrow_records WHERE book_copy_id = ANY($1) AND status = 'returned'",
    )
    .bind(copy_ids)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

const LOAN_VIEW_SELECT: &str = r#"
    SELECT r.id, r.user_id, u.name AS user_name,
           b.id AS book_id, b.title AS book_title, b.author AS book_author,
           b.type AS book_type, r.book_copy_id, c.serial_number,
           r.borrowed_at, r.due_date, r.returned_at, r.status
    FROM borrow_records r
    JOIN users u ON u.id = r.user_id
    JOIN book_copies c ON c.id = r.book_copy_id
    JOIN books b ON b.id = c.book_id
"#;

/// A loan joined with its borrower, copy and book.
#[derive(Debug)]
pub struct StoredLoanView {
    pub loan: StoredLoan,
    pub user_name: String,
    pub book_id: Uuid,
    pub book_title: String,
    pub book_author: String,
    pub book_type: String,
    pub serial_number: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredLoanView {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredLoanView {
            loan: StoredLoan::from_row(row)?,
            user_name: row.try_get("user_name")?,
            book_id: row.try_get("book_id")?,
            book_title: row.try_get("book_title")?,
            book_author: row.try_get("book_author")?,
            book_type: row.try_get("book_type")?,
            serial_number: row.try_get("serial_number")?,
        })
    }
}

impl StoredLoanView {
    /// Convert to an engine LoanView, computing `overdue` against `now`.
    pub fn to_view(&self, now: DateTime<Utc>) -> Result<LoanView, sqlx::Error> {
        let record = self.loan.to_record()?;
        let view = LoanView {
            id: record.id,
            user_id: record.user_id,
            user_name: self.user_name.clone(),
            book_id: self.book_id,
            book_title: self.book_title.clone(),
            book_author: self.book_author.clone(),
            book_type: BookType::parse(&self.book_type).map_err(decode_error)?,
            book_copy_id: record.book_copy_id,
            serial_number: self.serial_number.clone(),
            borrowed_at: record.borrowed_at,
            due_date: record.due_date,
            returned_at: record.returned_at,
            status: record.status,
            overdue: false,
        };
        Ok(view.at(now))
    }
}

/// Loan history, most recent first. `None` lists every user's loans.
pub async fn list_loans<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Option<UserId>,
) -> Result<Vec<StoredLoanView>, sqlx::Error> {
    sqlx::query_as::<_, StoredLoanView>(&format!(
        "{LOAN_VIEW_SELECT} WHERE ($1::uuid IS NULL OR r.user_id = $1) \
         ORDER BY r.borrowed_at DESC, r.id DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Open loans of one user, most recent first.
pub async fn list_open_loans<'e>(
    executor: impl PgExecutor<'e>,
    user_id: UserId,
) -> Result<Vec<StoredLoanView>, sqlx::Error> {
    sqlx::query_as::<_, StoredLoanView>(&format!(
        "{LOAN_VIEW_SELECT} WHERE r.user_id = $1 AND r.status = 'borrowed' \
         ORDER BY r.borrowed_at DESC, r.id DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Loans of any copy of a book, most recent first.
pub async fn list_loans_of_book<'e>(
    executor: impl PgExecutor<'e>,
    book_id: BookId,
) -> Result<Vec<StoredLoanView>, sqlx::Error> {
    sqlx::query_as::<_, StoredLoanView>(&format!(
        "{LOAN_VIEW_SELECT} WHERE b.id = $1 ORDER BY r.borrowed_at DESC, r.id DESC"
    ))
    .bind(book_id)
    .fetch_all(executor)
    .await
}

/// One loan with its joined details.
pub async fn get_loan_view<'e>(
    executor: impl PgExecutor<'e>,
    id: LoanId,
) -> Result<Option<StoredLoanView>, sqlx::Error> {
    sqlx::query_as::<_, StoredLoanView>(&format!("{LOAN_VIEW_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}
