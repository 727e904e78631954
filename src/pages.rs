use crate::{
    AppState,
    auth::{self, Principal, clear_session_cookie, session_cookie, session_token},
    error::{AppError, AuthError, StoreError},
    models::{Credentials, NewBook, NewReview},
};
use axum::{
    Form, Json,
    extract::{Path, Query, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// PageView
///
/// What the page surface hands to the external template renderer: a view name and a
/// bag of named values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub view: String,
    pub model: Map<String, Value>,
}

impl PageView {
    pub fn new(view: &str) -> Self {
        Self {
            view: view.to_string(),
            model: Map::new(),
        }
    }

    /// Adds a named value to the model. A value that fails to serialize is logged
    /// and rendered as null.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!(view = %self.view, key, error = %e, "Model value failed to serialize");
            Value::Null
        });
        self.model.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for PageView {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// LoginFlags
///
/// `?error` after a failed login, `?logout` after logging out.
#[derive(Debug, Deserialize, Default)]
pub struct LoginFlags {
    pub error: Option<String>,
    pub logout: Option<String>,
}

// --- Public Pages ---

/// home
///
/// [Public Route] `GET /`: the catalog.
pub async fn home(State(state): State<AppState>) -> Result<PageView, AppError> {
    let books = state.repo.list_books().await?;
    Ok(PageView::new("index").with("books", books))
}

/// register_page
///
/// [Public Route] `GET /register-page`.
pub async fn register_page() -> PageView {
    PageView::new("register-page")
}

/// register
///
/// [Public Route] `POST /register`: creates a USER account, then shows the catalog
/// with a confirmation message.
pub async fn register(
    State(state): State<AppState>,
    credentials: Result<Form<Credentials>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(credentials) = credentials?;
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        let page = PageView::new("register-page").with("error", "Username and password are required");
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    match auth::register_account(state.repo.as_ref(), &credentials).await {
        Ok(()) => {}
        Err(AuthError::Store(StoreError::Conflict(_))) => {
            let page = PageView::new("register-page").with("error", "Username already exists");
            return Ok((StatusCode::CONFLICT, page).into_response());
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(username = %credentials.username.trim(), "Account registered");

    let books = state.repo.list_books().await?;
    Ok(PageView::new("index")
        .with("books", books)
        .with("message", "Thanks for registering. You can now Log in")
        .into_response())
}

/// view_reviews
///
/// [Public Route] `GET /books/reviews/{id}`. `book` is null when the id is unknown.
pub async fn view_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<PageView, AppError> {
    reviews_view(&state, "reviews", id).await
}

/// login_page
///
/// [Public Route] `GET /login`.
pub async fn login_page(Query(flags): Query<LoginFlags>) -> PageView {
    PageView::new("login")
        .with("error", flags.error.is_some())
        .with("logout", flags.logout.is_some())
}

/// login
///
/// [Public Route] `POST /login`: Anonymous -> Authenticated. Every role lands on
/// `/user`; a failed attempt goes back to `/login?error` without being logged.
pub async fn login(
    State(state): State<AppState>,
    credentials: Result<Form<Credentials>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(credentials) = credentials?;
    let Some(principal) = auth::authenticate(state.repo.as_ref(), &credentials).await? else {
        return Ok(Redirect::to("/login?error").into_response());
    };

    let username = principal.username.clone();
    let token = state.sessions.issue(principal)?;
    tracing::info!(username = %username, "Session established");

    let cookie = session_cookie(&token, state.sessions.ttl());
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/user")).into_response())
}

/// logout
///
/// [Public Route] `GET|POST /logout`: Authenticated -> Anonymous. Invalidates the
/// server-side session and clears the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login?logout"),
    )
        .into_response()
}

/// permission_denied
///
/// [Public Route] `GET /permission-denied`: target of every access-control denial.
pub async fn permission_denied() -> PageView {
    PageView::new("error/permission-denied")
}

// --- User Pages (USER or ADMIN) ---

/// user_home
///
/// [User Route] `GET /user`: default landing page after login.
pub async fn user_home(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<PageView, AppError> {
    let books = state.repo.list_books().await?;
    Ok(PageView::new("secured/user/index")
        .with("books", books)
        .with("username", principal.username))
}

/// add_review_page
///
/// [User Route] `GET /user/add-review-page/{id}`.
pub async fn add_review_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<PageView, AppError> {
    let book = state.repo.get_book(id).await?;
    Ok(PageView::new("secured/user/add-review-page").with("book", book))
}

/// add_review
///
/// [User Route] `POST /user/add-review`: stores the review, then re-reads the book's
/// reviews to render them.
pub async fn add_review(
    State(state): State<AppState>,
    review: Result<Form<NewReview>, FormRejection>,
) -> Result<PageView, AppError> {
    let Form(review) = review?;
    let affected = state.repo.add_review(&review).await?;
    tracing::info!(book_id = review.book_id, affected, "Review added");

    reviews_view(&state, "secured/user/reviews", review.book_id).await
}

/// view_user_reviews
///
/// [User Route] `GET /user/books/reviews/{id}`.
pub async fn view_user_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<PageView, AppError> {
    reviews_view(&state, "secured/user/reviews", id).await
}

// --- Admin Pages (ADMIN) ---

/// admin_home
///
/// [Admin Route] `GET /admin`.
pub async fn admin_home(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<PageView, AppError> {
    let books = state.repo.list_books().await?;
    Ok(PageView::new("secured/admin/index")
        .with("books", books)
        .with("username", principal.username))
}

/// add_book_page
///
/// [Admin Route] `GET /admin/add-book-page`.
pub async fn add_book_page() -> PageView {
    PageView::new("secured/admin/add-book-page").with("book", NewBook::default())
}

/// add_book
///
/// [Admin Route] `POST /admin/add-book`. A duplicate pair re-renders the form with
/// status 409.
pub async fn add_book(
    State(state): State<AppState>,
    book: Result<Form<NewBook>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(book) = book?;
    if let Some(field) = book.blank_field() {
        let page = PageView::new("secured/admin/add-book-page")
            .with("book", &book)
            .with("error", format!("Book {field} must not be empty"));
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    match state.repo.add_book(&book).await {
        Ok(id) => tracing::info!(book_id = id, "Book added"),
        Err(conflict @ StoreError::Conflict(_)) => {
            let page = PageView::new("secured/admin/add-book-page")
                .with("book", &book)
                .with("error", conflict.to_string());
            return Ok((StatusCode::CONFLICT, page).into_response());
        }
        Err(e) => return Err(e.into()),
    }

    let books = state.repo.list_books().await?;
    Ok(PageView::new("secured/admin/index")
        .with("books", books)
        .into_response())
}

async fn reviews_view(state: &AppState, view: &str, book_id: i64) -> Result<PageView, AppError> {
    let reviews = state.repo.list_reviews(book_id).await?;
    let book = state.repo.get_book(book_id).await?;
    Ok(PageView::new(view).with("reviews", reviews).with("book", book))
}
