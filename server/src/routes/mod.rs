//! HTTP route definitions.

mod books;
mod circulation;
mod health;
mod loans;
mod rankings;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(circulation::routes())
        .merge(books::routes())
        .merge(loans::routes())
        .merge(rankings::routes())
}
