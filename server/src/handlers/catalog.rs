//! Catalog administration: books and their copy pools.

use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use lablib_engine::{
    plan_resize, Book, BookCopy, BookId, BookUpdate, CopyId, Entity, Error, NewBook, ResizePlan,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};

/// Request body for resizing a copy pool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeRequest {
    pub total_copies: usize,
}

/// Outcome of a resize.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeResponse {
    pub book_id: BookId,
    pub total_copies: usize,
    /// Copies created by this call
    pub added: Vec<CopyId>,
    /// Copies deleted by this call
    pub removed: Vec<CopyId>,
}

/// Request body for recording a cover image.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImageRequest {
    /// File name under the image directory, or `None` to clear it.
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Catalogue a book and create its initial copies.
pub async fn handle_create_book(pool: &PgPool, input: NewBook) -> Result<Book> {
    input.validate()?;
    let now = Utc::now();
    let book = Book::new(Uuid::new_v4(), input, now);

    let mut tx = pool.begin().await?;
    db::insert_book(&mut tx, &book).await?;
    let created = create_copies(&mut tx, &book, book.total_copies, now).await?;
    tx.commit().await?;

    tracing::info!(book_id = %book.id, copies = created.len(), "Book created");
    Ok(book)
}

/// Update a book's metadata and resize its pool to the new total.
///
/// A resize conflict rolls back the metadata change too.
pub async fn handle_update_book(pool: &PgPool, book_id: BookId, update: BookUpdate) -> Result<Book> {
    update.validate()?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let mut book = db::lock_book(&mut tx, book_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Book, book_id))?
        .to_book()?;

    let outcome = resize_locked(&mut tx, &book, update.total_copies, now).await?;
    book.apply_update(&update, now);
    db::update_book(&mut tx, &book).await?;
    tx.commit().await?;

    tracing::info!(
        book_id = %book_id,
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "Book updated"
    );
    Ok(book)
}

/// Resize a book's copy pool to `total_copies`.
pub async fn handle_resize(
    pool: &PgPool,
    book_id: BookId,
    total_copies: usize,
) -> Result<ResizeResponse> {
    if total_copies < 1 {
        return Err(Error::Validation("total copies must be at least 1".into()).into());
    }
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let book = db::lock_book(&mut tx, book_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Book, book_id))?
        .to_book()?;

    let outcome = resize_locked(&mut tx, &book, total_copies, now).await?;
    db::set_total_copies(&mut tx, book_id, total_copies, now).await?;
    tx.commit().await?;

    tracing::info!(
        book_id = %book_id,
        total_copies,
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "Copy pool resized"
    );
    Ok(outcome)
}

/// Bring the pool of a locked book to `new_count` copies.
///
/// Locks every copy of the book before reading availability, so a borrow
/// either finished before the plan was made or waits until the transaction
/// ends. Does not touch `books.total_copies`.
async fn resize_locked(
    conn: &mut PgConnection,
    book: &Book,
    new_count: usize,
    now: DateTime<Utc>,
) -> Result<ResizeResponse> {
    let copies: Vec<BookCopy> = db::lock_copies_of_book(conn, book.id)
        .await?
        .iter()
        .map(|c| c.to_copy())
        .collect();

    let mut outcome = ResizeResponse {
        book_id: book.id,
        total_copies: new_count,
        added: Vec::new(),
        removed: Vec::new(),
    };

    match plan_resize(&copies, new_count)? {
        ResizePlan::Unchanged => {}
        ResizePlan::Grow(n) => {
            outcome.added = create_copies(conn, book, n, now).await?;
        }
        ResizePlan::Shrink(ids) => {
            // Closed loans go with their copy, as when the whole book is deleted.
            let purged = db::delete_closed_loans_of_copies(conn, &ids).await?;
            let deleted = db::delete_available_copies(conn, &ids).await?;
            if deleted != ids.len() as u64 {
                return Err(AppError::Internal(format!(
                    "expected to delete {} copies of book {}, deleted {}",
                    ids.len(),
                    book.id,
                    deleted
                )));
            }
            tracing::debug!(book_id = %book.id, copies = deleted, loans = purged, "Copies removed");
            outcome.removed = ids;
        }
    }

    Ok(outcome)
}

/// Insert `n` available copies of `book`, drawing a new serial on collision.
async fn create_copies(
    conn: &mut PgConnection,
    book: &Book,
    n: usize,
    now: DateTime<Utc>,
) -> Result<Vec<CopyId>> {
    let barcode = book.copy_barcode();
    let mut created = Vec::with_capacity(n);
    for _ in 0..n {
        loop {
            let copy = BookCopy::new(book.id, barcode.clone(), now);
            if db::insert_copy(conn, &copy).await? {
                created.push(copy.id);
                break;
            }
            tracing::debug!(serial = %copy.serial_number, "Serial number collision, retrying");
        }
    }
    Ok(created)
}

/// Record or clear the cover image of a book.
pub async fn handle_set_cover_image(
    pool: &PgPool,
    book_id: BookId,
    image_path: Option<String>,
) -> Result<Book> {
    if let Some(path) = &image_path {
        if !is_plain_file_name(path) {
            return Err(AppError::BadRequest(format!("invalid image path '{}'", path)));
        }
    }
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let mut book = db::lock_book(&mut tx, book_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Book, book_id))?
        .to_book()?;
    book.image_path = image_path;
    book.updated_at = now;
    db::update_book(&mut tx, &book).await?;
    tx.commit().await?;

    Ok(book)
}

/// Remove a book with its copies, closed loans and rankings.
///
/// Refused while any copy is on loan. The cover image file is removed after
/// commit; failing to remove it is logged and otherwise ignored.
pub async fn handle_delete_book(pool: &PgPool, book_id: BookId, image_dir: &Path) -> Result<()> {
    let mut tx = pool.begin().await?;
    let book = db::lock_book(&mut tx, book_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Book, book_id))?
        .to_book()?;

    // Holding every copy lock keeps borrows out until the delete commits.
    db::lock_copies_of_book(&mut tx, book_id).await?;
    if db::has_open_loans(&mut *tx, book_id).await? {
        return Err(Error::BookOnLoan(book_id).into());
    }

    let loans = db::delete_loans_of_book(&mut tx, book_id).await?;
    let rankings = db::delete_rankings_of_book(&mut tx, book_id).await?;
    let copies = db::delete_copies_of_book(&mut tx, book_id).await?;
    db::delete_book(&mut tx, book_id).await?;
    tx.commit().await?;

    tracing::info!(book_id = %book_id, loans, rankings, copies, "Book deleted");

    if let Some(image) = book.image_path.as_deref() {
        remove_cover_image(image_dir, image).await;
    }
    Ok(())
}

async fn remove_cover_image(image_dir: &Path, image: &str) {
    if !is_plain_file_name(image) {
        tracing::warn!(image, "Refusing to remove cover image outside the image directory");
        return;
    }
    let path = image_dir.join(image);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove cover image");
    }
}

/// A single normal path component, so joining it stays inside the image
/// directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
