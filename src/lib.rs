use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pages;
pub mod repository;

// Routers grouped by the role the access policy requires (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use access::AccessPolicy;
pub use auth::{InMemorySessionStore, SessionManager, SessionState};
pub use config::AppConfig;
pub use repository::{RepositoryState, SqliteRepository};

/// ApiDoc
///
/// OpenAPI document for the JSON API surface, served at `/api-docs/openapi.json`.
/// The page surface is not documented here: it returns view models, not resources.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_books, handlers::get_book, handlers::get_book_reviews,
        handlers::create_book
    ),
    components(
        schemas(models::Book, models::Review, models::NewBook, models::Message)
    ),
    tags(
        (name = "library-catalog", description = "Library Catalog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request needs. Shared across all
/// incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Record Store: books, reviews and the identity store over the SQLite pool.
    pub repo: RepositoryState,
    /// Session issuance, lookup and invalidation.
    pub sessions: SessionState,
    /// The ordered path -> role rule table.
    pub policy: Arc<AccessPolicy>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires a repository to an in-memory session store and the catalog's access policy.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let sessions = SessionManager::new(&config, Arc::new(InMemorySessionStore::new()));
        Self {
            repo,
            sessions: Arc::new(sessions),
            policy: Arc::new(AccessPolicy::library()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route, puts the access-control middleware in front of all of them
/// (unknown paths included), and adds the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        // Unknown paths still pass through the access policy before answering 404.
        .fallback(handlers::not_found)
        // Access Control: first-match-wins policy evaluation for every request.
        .layer(middleware::from_fn_with_state(state.clone(), access::enforce))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span: HTTP method, URI and the `x-request-id` header, so
/// every log line of one request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
