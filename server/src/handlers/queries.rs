//! Read projections: search, availability, history and rankings.
//!
//! Single-statement reads see one committed snapshot by themselves. Reads
//! that combine several statements run in a read-only repeatable-read
//! transaction so every part comes from the same snapshot.

use chrono::Utc;
use lablib_engine::{
    clamp_limit, rank_entries, Availability, BookDetail, BookId, BookSummary, Entity, Error,
    HistoryScope, LoanId, LoanView, Month, RankingEntry, Resolved, UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{self, from_db_count};
use crate::error::Result;

/// Query parameters for book search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: Option<String>,
}

/// Query parameters for loan history.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Query parameters for rankings.
#[derive(Debug, Default, Deserialize)]
pub struct RankingQuery {
    /// `YYYY-MM`, defaults to the current month
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response for rankings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResponse {
    pub month: Month,
    pub entries: Vec<RankingEntry>,
}

async fn begin_snapshot(pool: &PgPool) -> Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Books matching `query`, ordered by title.
pub async fn handle_search(pool: &PgPool, query: &str) -> Result<Vec<BookSummary>> {
    let rows = db::search_books(pool, query).await?;
    let books = rows
        .iter()
        .map(|row| row.to_summary())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(books)
}

/// Pool size, available count and open-loan flag of a book.
pub async fn handle_availability(pool: &PgPool, book_id: BookId) -> Result<Availability> {
    let row = db::get_availability(pool, book_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Book, book_id))?;

    Ok(Availability {
        book_id,
        total_copies: from_db_count(row.total_copies.into())?,
        available_count: from_db_count(row.available_count)?,
        has_open_loans: row.has_open_loans,
    })
}

/// A book with its copies and loan history.
pub async fn handle_book_detail(pool: &PgPool, book_id: BookId) -> Result<BookDetail> {
    let now = Utc::now();
    let mut tx = begin_snapshot(pool).await?;

    let book = db::get_book(&mut *tx, book_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Book, book_id))?
        .to_book()?;
    let copies: Vec<_> = db::list_copies(&mut *tx, book_id)
        .await?
        .iter()
        .map(|c| c.to_copy())
        .collect();
    let history = to_views(db::list_loans_of_book(&mut *tx, book_id).await?, now)?;
    tx.commit().await?;

    let available = copies.iter().filter(|c| c.is_available).count();
    Ok(BookDetail {
        summary: BookSummary::new(book, available),
        copies,
        history,
    })
}

/// Loan history in `scope`, most recent first.
pub async fn handle_history(pool: &PgPool, scope: HistoryScope) -> Result<Vec<LoanView>> {
    let rows = db::list_loans(pool, scope.user()).await?;
    to_views(rows, Utc::now())
}

/// Open loans of a user, most recent first.
pub async fn handle_current_loans(pool: &PgPool, user_id: UserId) -> Result<Vec<LoanView>> {
    let rows = db::list_open_loans(pool, user_id).await?;
    to_views(rows, Utc::now())
}

/// One loan with its book, copy and borrower.
pub async fn handle_loan_detail(pool: &PgPool, loan_id: LoanId) -> Result<LoanView> {
    let row = db::get_loan_view(pool, loan_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Loan, loan_id))?;
    Ok(row.to_view(Utc::now())?)
}

fn to_views(rows: Vec<db::StoredLoanView>, now: chrono::DateTime<Utc>) -> Result<Vec<LoanView>> {
    let views = rows
        .iter()
        .map(|row| row.to_view(now))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(views)
}

/// Most borrowed books of a month.
pub async fn handle_top_rankings(pool: &PgPool, query: RankingQuery) -> Result<RankingResponse> {
    let month = match query.month.as_deref() {
        Some(raw) => raw.parse::<Month>()?,
        None => Month::of(Utc::now()),
    };
    let limit = clamp_limit(query.limit);

    let entries = db::top_rankings(pool, month, limit)
        .await?
        .iter()
        .map(|row| row.to_entry(month))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(RankingResponse {
        month,
        entries: rank_entries(entries, limit),
    })
}

/// Resolve a scanned code to a copy or a book.
pub async fn handle_resolve(pool: &PgPool, code: &str) -> Result<Resolved> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::Validation("code is required".into()).into());
    }
    let as_id = Uuid::parse_str(code).ok();

    if let Some(copy_id) = db::find_copy_by_code(pool, code, as_id).await? {
        return Ok(Resolved::Copy(copy_id));
    }
    if let Some(book_id) = db::find_book_by_code(pool, code, as_id).await? {
        return Ok(Resolved::Book(book_id));
    }
    Err(Error::not_found(Entity::Copy, code).into())
}
