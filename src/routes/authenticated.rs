use crate::{AppState, pages};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Pages for any signed-in account. Every path sits under `/user`, which the access
/// policy restricts to USER or ADMIN, so handlers here can rely on a resolved
/// `Principal`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /user
        // Default landing page after login, for every role.
        .route("/user", get(pages::user_home))
        // GET /user/add-review-page/{id}
        // Review form for one book.
        .route("/user/add-review-page/{id}", get(pages::add_review_page))
        // POST /user/add-review
        // Form fields `text` and `bookId`. Renders the book's updated review list.
        .route("/user/add-review", post(pages::add_review))
        // GET /user/books/reviews/{id}
        // Signed-in variant of the public reviews page.
        .route("/user/books/reviews/{id}", get(pages::view_user_reviews))
}
