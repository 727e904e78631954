use library_catalog::{
    AppConfig, AppState, create_router,
    auth,
    models::{Book, Message, NewReview, Review},
    repository::{self, RepositoryState, SqliteRepository},
};
use reqwest::{StatusCode, header};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
}

async fn spawn_app() -> TestApp {
    let pool = repository::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database.");
    repository::migrate(&pool)
        .await
        .expect("Failed to run database migrations.");

    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;
    auth::seed_default_accounts(repo.as_ref())
        .await
        .expect("Failed to seed accounts.");

    let router = create_router(AppState::new(repo.clone(), AppConfig::default()));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(&format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_book_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. Create
    let res = client
        .post(&format!("{}/books", app.address))
        .json(&json!({ "title": "Dune", "author": "Herbert" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
    let created: Book = res.json().await.unwrap();
    assert_eq!(location, format!("/books/{}", created.id));
    assert_eq!(created.title, "Dune");
    assert!(created.reviews.is_empty());

    // 2. Read back through the Location header
    let fetched: Book = client
        .get(&format!("{}{}", app.address, location))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, created);

    // 3. Duplicate pair
    let dup = client
        .post(&format!("{}/books", app.address))
        .json(&json!({ "title": "Dune", "author": "Herbert" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), StatusCode::CONFLICT);
    let body: Message = dup.json().await.unwrap();
    assert_eq!(body, Message::error("Title + Author already exists"));

    // 4. The catalog still holds exactly one copy
    let books: Vec<Book> = client
        .get(&format!("{}/books", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(books.len(), 1);
}

#[tokio::test]
async fn test_client_supplied_id_is_ignored() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(&format!("{}/books", app.address))
        .json(&json!({ "id": 999, "title": "Emma", "author": "Austen", "reviews": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let created: Book = res.json().await.unwrap();
    assert_ne!(created.id, 999);
}

#[tokio::test]
async fn test_book_reviews() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created: Book = client
        .post(&format!("{}/books", app.address))
        .json(&json!({ "title": "Dune", "author": "Herbert" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    app.repo
        .add_review(&NewReview {
            book_id: created.id,
            text: "Spice".to_string(),
        })
        .await
        .unwrap();

    let res = client
        .get(&format!("{}/books/{}/reviews", app.address, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let raw: serde_json::Value = res.json().await.unwrap();
    assert_eq!(raw[0]["bookId"], created.id);

    let reviews: Vec<Review> = serde_json::from_value(raw).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].text, "Spice");
}

#[tokio::test]
async fn test_missing_book_messages() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .get(&format!("{}/books/4242", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Message = res.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert_eq!(body.message, "No Book with such record");

    let res = client
        .get(&format!("{}/books/4242/reviews", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Message = res.json().await.unwrap();
    assert_eq!(body.message, "No Review with such record");
}

#[tokio::test]
async fn test_orphan_reviews_still_report_missing_book() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.repo
        .add_review(&NewReview {
            book_id: 55,
            text: "orphan".to_string(),
        })
        .await
        .unwrap();

    let res = client
        .get(&format!("{}/books/55/reviews", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_title_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(&format!("{}/books", app.address))
        .json(&json!({ "title": "  ", "author": "Herbert" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Message = res.json().await.unwrap();
    assert_eq!(body.message, "Book title must not be empty");
}

#[tokio::test]
async fn test_malformed_body_uses_message_shape() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Missing `author`
    let res = client
        .post(&format!("{}/books", app.address))
        .json(&json!({ "title": "Dune" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Message = res.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert!(!body.message.is_empty());

    // Not JSON at all
    let res = client
        .post(&format!("{}/books", app.address))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{title")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Message = res.json().await.unwrap();
    assert_eq!(body.status, "error");

    assert!(app.repo.list_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let doc: serde_json::Value = client
        .get(&format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/books"].is_object());
    assert!(doc["paths"]["/books/{id}/reviews"].is_object());
}
