//! Borrow and return.

use chrono::Utc;
use lablib_engine::{
    BorrowReceipt, BorrowRecord, CopyKey, Entity, Error, Month, ReturnReceipt, UserId,
};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::{self, StoredCopy};
use crate::error::Result;

/// Request body for borrow and return.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CirculationRequest {
    /// A copy ID or a barcode printed on copies.
    pub code: String,
    /// Borrower to act for. Defaults to the caller.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Lend one available copy to `user_id`.
///
/// The copy flip, the new loan and the ranking credit commit together.
pub async fn handle_borrow(
    pool: &PgPool,
    key: &CopyKey,
    user_id: UserId,
) -> Result<BorrowReceipt> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    if !db::lock_user(&mut tx, user_id).await? {
        return Err(Error::not_found(Entity::User, user_id).into());
    }

    let mut copy = claim_copy(&mut tx, key).await?.to_copy();
    copy.check_out(now)?;
    db::set_available(&mut tx, copy.id, false, now).await?;

    let record = BorrowRecord::open(Uuid::new_v4(), user_id, copy.id, now);
    db::insert_loan(&mut tx, &record).await?;
    db::record_borrow(&mut tx, Month::of(now), copy.book_id).await?;

    tx.commit().await?;

    tracing::info!(
        loan_id = %record.id,
        copy_id = %copy.id,
        book_id = %copy.book_id,
        user_id = %user_id,
        "Copy borrowed"
    );

    Ok(BorrowReceipt {
        loan_id: record.id,
        book_id: copy.book_id,
        book_copy_id: copy.id,
        borrowed_at: record.borrowed_at,
        due_date: record.due_date,
    })
}

/// Lock an available copy matching `key`.
///
/// A barcode first tries the lowest-serial copy nobody else holds a lock on.
/// If every free copy is locked, it falls back to waiting on each candidate
/// in ID order, the order resizes lock in, and re-checks availability once
/// the lock is granted.
async fn claim_copy(conn: &mut PgConnection, key: &CopyKey) -> Result<StoredCopy> {
    match key {
        CopyKey::Id(id) => {
            let copy = db::lock_copy(conn, *id)
                .await?
                .ok_or_else(|| Error::not_found(Entity::Copy, id))?;
            if !copy.is_available {
                return Err(Error::NotAvailable(key.to_string()).into());
            }
            Ok(copy)
        }
        CopyKey::Barcode(code) => {
            if let Some(copy) = db::lock_free_copy_by_barcode(conn, code).await? {
                return Ok(copy);
            }

            let candidates = db::copy_ids_by_barcode(conn, code).await?;
            if candidates.is_empty() {
                return Err(Error::not_found(Entity::Copy, code).into());
            }
            for id in candidates {
                if let Some(copy) = db::lock_copy(conn, id).await? {
                    if copy.is_available {
                        return Ok(copy);
                    }
                }
            }
            Err(Error::NotAvailable(key.to_string()).into())
        }
    }
}

/// Close `user_id`'s open loan on the copy matching `key`.
pub async fn handle_return(
    pool: &PgPool,
    key: &CopyKey,
    user_id: UserId,
) -> Result<ReturnReceipt> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let loan = match key {
        CopyKey::Id(id) => {
            let copy = db::lock_copy(&mut tx, *id)
                .await?
                .ok_or_else(|| Error::not_found(Entity::Copy, id))?;
            db::lock_open_loan(&mut tx, copy.id, user_id)
                .await?
                .ok_or_else(|| Error::no_open_loan(copy.id, user_id))?
        }
        CopyKey::Barcode(code) => {
            let found = db::lock_open_loan_by_barcode(&mut tx, code, user_id).await?;
            match found {
                Some(loan) => loan,
                None => {
                    if db::copy_ids_by_barcode(&mut tx, code).await?.is_empty() {
                        return Err(Error::not_found(Entity::Copy, code).into());
                    }
                    return Err(Error::NoOpenLoan {
                        copy: key.to_string(),
                        user: user_id.to_string(),
                    }
                    .into());
                }
            }
        }
    };

    let mut record = loan.to_record()?;
    let mut copy = db::lock_copy(&mut tx, record.book_copy_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Copy, record.book_copy_id))?
        .to_copy();

    copy.check_in(user_id, now)?;
    record.close(now)?;
    db::close_loan(&mut tx, record.id, now).await?;
    db::set_available(&mut tx, copy.id, true, now).await?;

    tx.commit().await?;

    tracing::info!(
        loan_id = %record.id,
        copy_id = %copy.id,
        user_id = %user_id,
        "Copy returned"
    );

    Ok(ReturnReceipt {
        loan_id: record.id,
        book_copy_id: copy.id,
        returned_at: now,
    })
}
