use crate::{AppState, pages};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Catalog management pages. The access policy admits only ADMIN principals to
/// `/admin/**`; anyone else is redirected to the denial page before reaching these
/// handlers.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Admin landing page with the full catalog.
        .route("/admin", get(pages::admin_home))
        // GET /admin/add-book-page
        // Empty add-book form.
        .route("/admin/add-book-page", get(pages::add_book_page))
        // POST /admin/add-book
        // Form fields `title` and `author`. 409 re-renders the form on a duplicate pair.
        .route("/admin/add-book", post(pages::add_book))
}
