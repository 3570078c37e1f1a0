//! Catalog routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use lablib_engine::{Availability, Book, BookDetail, BookId, BookSummary, BookUpdate, NewBook};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_availability, handle_book_detail, handle_create_book, handle_delete_book,
    handle_resize, handle_search, handle_set_cover_image, handle_update_book, CoverImageRequest,
    ResizeRequest, ResizeResponse, SearchQuery,
};
use crate::AppState;

/// Create catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(search_handler).post(create_handler))
        .route(
            "/books/{id}",
            get(detail_handler).put(update_handler).delete(delete_handler),
        )
        .route("/books/{id}/copies", put(resize_handler))
        .route("/books/{id}/image", put(cover_image_handler))
        .route("/books/{id}/availability", get(availability_handler))
}

/// GET /books - Search the catalog.
async fn search_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<BookSummary>>> {
    let books = handle_search(&state.pool, query.query.as_deref().unwrap_or("")).await?;
    Ok(Json(books))
}

/// POST /books - Catalogue a new book.
async fn create_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<NewBook>,
) -> Result<(StatusCode, Json<Book>)> {
    auth.require_admin()?;
    let book = handle_create_book(&state.pool, input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /books/{id} - Book detail with copies and history.
async fn detail_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<BookId>,
) -> Result<Json<BookDetail>> {
    let detail = handle_book_detail(&state.pool, id).await?;
    Ok(Json(detail))
}

/// PUT /books/{id} - Update metadata and resize the copy pool.
async fn update_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<BookId>,
    Json(update): Json<BookUpdate>,
) -> Result<Json<Book>> {
    auth.require_admin()?;
    let book = handle_update_book(&state.pool, id, update).await?;
    Ok(Json(book))
}

/// DELETE /books/{id} - Remove a book nobody has on loan.
async fn delete_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<BookId>,
) -> Result<StatusCode> {
    auth.require_admin()?;
    handle_delete_book(&state.pool, id, &state.config.image_dir).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /books/{id}/copies - Resize the copy pool.
async fn resize_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<BookId>,
    Json(request): Json<ResizeRequest>,
) -> Result<Json<ResizeResponse>> {
    auth.require_admin()?;
    let outcome = handle_resize(&state.pool, id, request.total_copies).await?;
    Ok(Json(outcome))
}

/// PUT /books/{id}/image - Record or clear the cover image.
async fn cover_image_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<BookId>,
    Json(request): Json<CoverImageRequest>,
) -> Result<Json<Book>> {
    auth.require_admin()?;
    let book = handle_set_cover_image(&state.pool, id, request.image_path).await?;
    Ok(Json(book))
}

/// GET /books/{id}/availability - Current availability of a book.
async fn availability_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<BookId>,
) -> Result<Json<Availability>> {
    let availability = handle_availability(&state.pool, id).await?;
    Ok(Json(availability))
}
