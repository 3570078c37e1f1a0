//! Loan history routes.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use lablib_engine::{HistoryScope, LoanId, LoanView};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::handlers::{handle_current_loans, handle_history, handle_loan_detail, HistoryQuery};
use crate::AppState;

/// Create loan routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/loans", get(history_handler))
        .route("/loans/current", get(current_handler))
        .route("/loans/{id}", get(detail_handler))
}

/// GET /loans - Loan history. Admins see everyone's unless `userId` narrows
/// it; other callers see their own.
async fn history_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LoanView>>> {
    let scope = HistoryScope::for_caller(auth.id, auth.role, query.user_id)
        .ok_or(AppError::Forbidden("cannot read another user's history"))?;
    let loans = handle_history(&state.pool, scope).await?;
    Ok(Json(loans))
}

/// GET /loans/current - The caller's open loans.
async fn current_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<LoanView>>> {
    let loans = handle_current_loans(&state.pool, auth.id).await?;
    Ok(Json(loans))
}

/// GET /loans/{id} - One loan.
async fn detail_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<LoanId>,
) -> Result<Json<LoanView>> {
    let loan = handle_loan_detail(&state.pool, id).await?;
    if loan.user_id != auth.id && !auth.is_admin() {
        return Err(AppError::Forbidden("cannot read another user's loan"));
    }
    Ok(Json(loan))
}
