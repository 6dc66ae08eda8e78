//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

use super::CurrentPrincipal;

/// Search the catalog
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books, most relevant first", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.search_books(&query).await?;
    Ok(Json(books))
}

/// Get a single book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "The book", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog (staff only)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 403, description = "Not staff"),
        (status = 409, description = "Duplicate ISBN")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(request, &principal).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book (staff only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Duplicate ISBN or copy-count conflict")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .catalog
        .update_book(id, request, &principal)
        .await?;
    Ok(Json(book))
}

/// Delete a book (staff only; refused while loans are open)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Open loans exist")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
