//! Borrow, return and code resolution routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use lablib_engine::{BorrowReceipt, CopyKey, Resolved, ReturnReceipt};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_borrow, handle_resolve, handle_return, CirculationRequest};
use crate::AppState;

/// Create circulation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/circulation/borrow", post(borrow_handler))
        .route("/circulation/return", post(return_handler))
        .route("/resolve/{code}", get(resolve_handler))
}

/// POST /circulation/borrow - Borrow a copy by ID or barcode.
async fn borrow_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CirculationRequest>,
) -> Result<Json<BorrowReceipt>> {
    let user_id = auth.acting_for(request.user_id)?;
    let key = CopyKey::parse(&request.code)?;
    let receipt = handle_borrow(&state.pool, &key, user_id).await?;
    Ok(Json(receipt))
}

/// POST /circulation/return - Return a borrowed copy.
async fn return_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CirculationRequest>,
) -> Result<Json<ReturnReceipt>> {
    let user_id = auth.acting_for(request.user_id)?;
    let key = CopyKey::parse(&request.code)?;
    let receipt = handle_return(&state.pool, &key, user_id).await?;
    Ok(Json(receipt))
}

/// GET /resolve/{code} - Resolve a scanned code to a copy or a book.
async fn resolve_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Resolved>> {
    let resolved = handle_resolve(&state.pool, &code).await?;
    Ok(Json(resolved))
}
