//! Database operations for the monthly_rankings table.

use lablib_engine::{BookId, BookType, Month, RankingEntry};
use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

/// Credit one borrow of `book_id` in `month`.
///
/// The first borrow of a month creates the row; later ones increment it in
/// place. Runs in the borrow's transaction, so the count and the loan commit
/// together.
pub async fn record_borrow(
    conn: &mut PgConnection,
    month: Month,
    book_id: BookId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO monthly_rankings (month, book_id, borrow_count)
        VALUES ($1, $2, 1)
        ON CONFLICT (month, book_id) DO UPDATE
        SET borrow_count = monthly_rankings.borrow_count + 1
        "#,
    )
    .bind(month.to_string())
    .bind(book_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Borrow count of one book in one month, if it was borrowed at all.
pub async fn get_borrow_count<'e>(
    executor: impl PgExecutor<'e>,
    month: Month,
    book_id: BookId,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT borrow_count FROM monthly_rankings WHERE month = $1 AND book_id = $2",
    )
    .bind(month.to_string())
    .bind(book_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| row.try_get("borrow_count")).transpose()
}

/// Delete every month's counts for a book.
pub async fn delete_rankings_of_book(
    conn: &mut PgConnection,
    book_id: BookId,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM monthly_rankings WHERE book_id = $1")
        .bind(book_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// A ranking row joined with its book.
#[derive(Debug)]
pub struct StoredRanking {
    pub book_id: Uuid,
    pub borrow_count: i64,
    pub title: String,
    pub author: String,
    pub book_type: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRanking {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRanking {
            book_id: row.try_get("book_id")?,
            borrow_count: row.try_get("borrow_count")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            book_type: row.try_get("type")?,
        })
    }
}

impl StoredRanking {
    /// Convert to an unnumbered ranking entry.
    pub fn to_entry(&self, month: Month) -> Result<RankingEntry, sqlx::Error> {
        Ok(RankingEntry {
            rank: 0,
            month,
            book_id: self.book_id,
            borrow_count: u64::try_from(self.borrow_count)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            title: self.title.clone(),
            author: self.author.clone(),
            book_type: BookType::parse(&self.book_type)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        })
    }
}

/// The `limit` most borrowed books of a month, by count then title.
pub async fn top_rankings<'e>(
    executor: impl PgExecutor<'e>,
    month: Month,
    limit: usize,
) -> Result<Vec<StoredRanking>, sqlx::Error> {
    let limit = i64::try_from(limit).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query_as::<_, StoredRanking>(
        r#"
        SELECT m.book_id, m.borrow_count, b.title, b.author, b.type
        FROM monthly_rankings m
        JOIN books b ON b.id = m.book_id
        WHERE m.month = $1
        ORDER BY m.borrow_count DESC, b.title ASC, m.book_id ASC
        LIMIT $2
        "#,
    )
    .bind(month.to_string())
    .bind(limit)
    .fetch_all(executor)
    .await
}
