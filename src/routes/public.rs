use crate::{AppState, handlers, pages};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints matched by the open `/`, `/**` rule of the access policy.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe.
        .route("/health", get(|| async { "ok" }))
        // --- JSON API Surface ---
        // GET /books lists the catalog; POST /books adds a book (201 + Location, or 409).
        .route("/books", get(handlers::get_books).post(handlers::create_book))
        .route("/books/{id}", get(handlers::get_book))
        .route("/books/{id}/reviews", get(handlers::get_book_reviews))
        // --- Page Surface ---
        .route("/", get(pages::home))
        .route("/register-page", get(pages::register_page))
        .route("/register", post(pages::register))
        .route("/books/reviews/{id}", get(pages::view_reviews))
        // --- Session Lifecycle ---
        .route("/login", get(pages::login_page).post(pages::login))
        .route("/logout", get(pages::logout).post(pages::logout))
        .route("/permission-denied", get(pages::permission_denied))
}
