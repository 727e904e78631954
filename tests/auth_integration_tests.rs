use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header, request::Parts},
};
use chrono::{Duration, Utc};
use library_catalog::{
    AppConfig, AppState,
    auth::{
        self, InMemorySessionStore, Principal, Session, SessionManager, SessionStore,
        hash_password, session_cookie, session_token, verify_password,
    },
    models::{Credentials, Role},
    repository::{self, Repository, RepositoryState, SqliteRepository},
};
use std::{collections::BTreeSet, sync::Arc};
use uuid::Uuid;

// --- Helper Functions ---

async fn seeded_repo() -> RepositoryState {
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
    repo
}

fn credentials(username: &str, password: &str) -> Credentials {
    Credentials {
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn manager() -> SessionManager {
    SessionManager::new(&AppConfig::default(), Arc::new(InMemorySessionStore::new()))
}

fn principal(username: &str, roles: &[Role]) -> Principal {
    Principal {
        username: username.to_string(),
        roles: roles.iter().copied().collect(),
    }
}

fn get_request_parts(headers: &[(header::HeaderName, String)]) -> Parts {
    let mut builder = Request::builder().method(Method::GET).uri("/user");
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

// --- Passwords ---

#[test]
fn test_hash_and_verify_password() {
    let hash = hash_password("bunny").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("bunny", &hash));
    assert!(!verify_password("carrot", &hash));
}

#[test]
fn test_hashes_are_salted() {
    let a = hash_password("duck").unwrap();
    let b = hash_password("duck").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_malformed_hash_never_verifies() {
    assert!(!verify_password("duck", "not-a-phc-string"));
}

// --- Identity Store ---

#[tokio::test]
async fn test_seeded_accounts_and_roles() {
    let repo = seeded_repo().await;

    let bugs = repo.get_user("bugs").await.unwrap().unwrap();
    assert_eq!(bugs.roles, BTreeSet::from([Role::User]));

    let daffy = repo.get_user("daffy").await.unwrap().unwrap();
    assert_eq!(daffy.roles, BTreeSet::from([Role::User, Role::Admin]));

    // Seeding again is a no-op rather than a conflict.
    assert!(auth::seed_default_accounts(repo.as_ref()).await.is_ok());
}

#[tokio::test]
async fn test_authenticate() {
    let repo = seeded_repo().await;

    let daffy = auth::authenticate(repo.as_ref(), &credentials("daffy", "duck"))
        .await
        .unwrap()
        .expect("valid credentials");
    assert_eq!(daffy, principal("daffy", &[Role::User, Role::Admin]));

    let wrong = auth::authenticate(repo.as_ref(), &credentials("daffy", "bunny")).await;
    assert!(matches!(wrong, Ok(None)));

    let unknown = auth::authenticate(repo.as_ref(), &credentials("porky", "pig")).await;
    assert!(matches!(unknown, Ok(None)));
}

#[tokio::test]
async fn test_register_account_grants_user_role() {
    let repo = seeded_repo().await;

    auth::register_account(repo.as_ref(), &credentials("porky", "pig"))
        .await
        .unwrap();

    let porky = auth::authenticate(repo.as_ref(), &credentials("porky", "pig"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(porky.roles, BTreeSet::from([Role::User]));

    let again = auth::register_account(repo.as_ref(), &credentials("porky", "other")).await;
    assert!(again.is_err());
}

// --- Sessions ---

#[test]
fn test_session_issue_resolve_revoke() {
    let sessions = manager();
    let bugs = principal("bugs", &[Role::User]);

    let token = sessions.issue(bugs.clone()).unwrap();
    assert_eq!(sessions.resolve(&token), Some(bugs));

    assert!(sessions.revoke(&token));
    // A revoked token stays dead even though its signature and exp are still valid.
    assert_eq!(sessions.resolve(&token), None);
    assert!(!sessions.revoke(&token));
}

#[test]
fn test_expired_session_is_anonymous() {
    let sessions = manager().with_ttl(Duration::seconds(-5));

    let token = sessions.issue(principal("bugs", &[Role::User])).unwrap();
    assert_eq!(sessions.resolve(&token), None);
}

#[test]
fn test_token_from_another_secret_is_rejected() {
    let mut other_config = AppConfig::default();
    other_config.session_secret = "some-other-secret".to_string();
    let other = SessionManager::new(&other_config, Arc::new(InMemorySessionStore::new()));
    let sessions = manager();

    let forged = other.issue(principal("daffy", &[Role::Admin])).unwrap();
    assert_eq!(sessions.resolve(&forged), None);
    assert_eq!(sessions.resolve("garbage"), None);
}

#[test]
fn test_in_memory_store_drops_expired_sessions() {
    let store = InMemorySessionStore::new();
    let live = Session {
        id: Uuid::new_v4(),
        principal: principal("bugs", &[Role::User]),
        expires_at: Utc::now() + Duration::minutes(5),
    };
    let stale = Session {
        id: Uuid::new_v4(),
        principal: principal("daffy", &[Role::Admin]),
        expires_at: Utc::now() - Duration::minutes(5),
    };

    store.insert(live.clone());
    store.insert(stale.clone());

    assert_eq!(store.get(live.id).map(|s| s.principal), Some(live.principal));
    assert!(store.get(stale.id).is_none());
    // The stale entry was evicted on read.
    assert!(!store.remove(stale.id));
}

#[test]
fn test_abandoned_sessions_are_swept_on_issue() {
    let store = Arc::new(InMemorySessionStore::new());
    let expired = SessionManager::new(&AppConfig::default(), store.clone())
        .with_ttl(Duration::seconds(-1));

    for _ in 0..50 {
        expired.issue(principal("bugs", &[Role::User])).unwrap();
    }
    // Each insert sweeps the previous expired entries; only the newest remains.
    assert_eq!(store.len(), 1);

    let live = SessionManager::new(&AppConfig::default(), store.clone());
    let token = live.issue(principal("daffy", &[Role::Admin])).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(live.resolve(&token).map(|p| p.username), Some("daffy".to_string()));
}

#[test]
fn test_session_token_sources() {
    let mut headers = HeaderMap::new();
    assert_eq!(session_token(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert_eq!(session_token(&headers).as_deref(), Some("abc"));

    // The cookie wins over the bearer header.
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("theme=dark; SESSION=xyz; lang=en"),
    );
    assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
}

#[test]
fn test_session_cookie_format() {
    let cookie = session_cookie("tok", Duration::minutes(30));
    assert!(cookie.starts_with("SESSION=tok;"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=1800"));
}

// --- Principal Extractor ---

#[tokio::test]
async fn test_principal_extractor_with_session_cookie() {
    let state = AppState::new(seeded_repo().await, AppConfig::default());
    let token = state
        .sessions
        .issue(principal("bugs", &[Role::User]))
        .unwrap();

    let mut parts = get_request_parts(&[(header::COOKIE, format!("SESSION={token}"))]);
    let resolved = Principal::from_request_parts(&mut parts, &state).await;

    assert_eq!(resolved.unwrap().username, "bugs");
}

#[tokio::test]
async fn test_principal_extractor_with_bearer_token() {
    let state = AppState::new(seeded_repo().await, AppConfig::default());
    let token = state
        .sessions
        .issue(principal("daffy", &[Role::User, Role::Admin]))
        .unwrap();

    let mut parts = get_request_parts(&[(header::AUTHORIZATION, format!("Bearer {token}"))]);
    let resolved = Principal::from_request_parts(&mut parts, &state).await;

    assert!(resolved.unwrap().roles.contains(&Role::Admin));
}

#[tokio::test]
async fn test_principal_extractor_without_session() {
    let state = AppState::new(seeded_repo().await, AppConfig::default());

    let mut parts = get_request_parts(&[]);
    let resolved = Principal::from_request_parts(&mut parts, &state).await;

    assert_eq!(resolved.unwrap_err(), StatusCode::UNAUTHORIZED);
}
