//! Ranking routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_top_rankings, RankingQuery, RankingResponse};
use crate::AppState;

/// Create ranking routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/rankings", get(top_handler))
}

/// GET /rankings - Most borrowed books of a month.
async fn top_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<RankingQuery>,
) -> Result<Json<RankingResponse>> {
    let response = handle_top_rankings(&state.pool, query).await?;
    Ok(Json(response))
}
