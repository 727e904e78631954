use crate::{
    AppState,
    error::AppError,
    models::{Book, Message, NewBook, Review},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};

// --- API Surface Handlers ---

/// get_books
///
/// [Public Route] Lists every book with its reviews nested.
#[utoipa::path(
    get,
    path = "/books",
    responses((status = 200, description = "All books", body = [Book]))
)]
pub async fn get_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>, AppError> {
    let books = state.repo.list_books().await?;
    Ok(Json(books))
}

/// get_book
///
/// [Public Route] Retrieves a single book by id.
#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Found", body = Book),
        (status = 404, description = "No such book", body = Message)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    match state.repo.get_book(id).await? {
        Some(book) => Ok(Json(book)),
        None => Err(AppError::NotFound("No Book with such record".to_string())),
    }
}

/// get_book_reviews
///
/// [Public Route] Lists the reviews of an existing book. 404 when the book is missing,
/// even if orphaned reviews reference its id.
#[utoipa::path(
    get,
    path = "/books/{id}/reviews",
    params(("id" = i64, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Reviews", body = [Review]),
        (status = 404, description = "No such book", body = Message)
    )
)]
pub async fn get_book_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Review>>, AppError> {
    match state.repo.get_book(id).await? {
        Some(book) => Ok(Json(book.reviews)),
        None => Err(AppError::NotFound("No Review with such record".to_string())),
    }
}

/// create_book
///
/// [Public Route] Adds a book. Responds 201 with a `Location` header naming the new
/// resource, or 409 when the (title, author) pair already exists.
#[utoipa::path(
    post,
    path = "/books",
    request_body = NewBook,
    responses(
        (status = 201, description = "Created", body = Book),
        (status = 400, description = "Malformed body, or blank title or author", body = Message),
        (status = 409, description = "Title + Author already exists", body = Message)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    if let Some(field) = payload.blank_field() {
        return Err(AppError::BadRequest(format!("Book {field} must not be empty")));
    }

    let id = state.repo.add_book(&payload).await?;
    tracing::info!(book_id = id, "Book created");

    let location = format!("/books/{id}");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(payload.into_book(id)),
    ))
}

/// not_found
///
/// Router fallback for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
