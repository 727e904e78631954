use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, RwLock},
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AuthError, StoreResult},
    models::{Credentials, Role, User},
    repository::Repository,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "SESSION";

// --- Passwords ---

/// Hashes a password into an Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Checks `password` against a stored PHC string. A malformed hash never verifies.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

// --- Identity ---

/// Principal
///
/// The authenticated identity bound to a session, with its role set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// authenticate
///
/// Verifies a username/password pair against the identity store. Unknown users,
/// disabled accounts and wrong passwords all yield `None`.
pub async fn authenticate(
    repo: &dyn Repository,
    credentials: &Credentials,
) -> StoreResult<Option<Principal>> {
    let Some(user) = repo.get_user(&credentials.username).await? else {
        return Ok(None);
    };

    if !user.enabled || !verify_password(&credentials.password, &user.password_hash) {
        return Ok(None);
    }

    Ok(Some(Principal {
        username: user.username,
        roles: user.roles,
    }))
}

/// register_account
///
/// Creates an enabled account holding only the USER role. The username is stored
/// trimmed, so `" bugs"` collides with `bugs`.
pub async fn register_account(
    repo: &dyn Repository,
    credentials: &Credentials,
) -> Result<(), AuthError> {
    let user = User {
        username: credentials.username.trim().to_string(),
        password_hash: hash_password(&credentials.password)?,
        enabled: true,
        roles: BTreeSet::from([Role::User]),
    };
    repo.create_user(&user).await?;
    Ok(())
}

// --- Seed Accounts ---

/// An account created at startup when missing.
pub struct SeedAccount {
    pub username: &'static str,
    pub password: &'static str,
    pub roles: &'static [Role],
}

pub const DEFAULT_ACCOUNTS: [SeedAccount; 2] = [
    SeedAccount {
        username: "bugs",
        password: "bunny",
        roles: &[Role::User],
    },
    SeedAccount {
        username: "daffy",
        password: "duck",
        roles: &[Role::User, Role::Admin],
    },
];

/// seed_default_accounts
///
/// Inserts every `DEFAULT_ACCOUNTS` entry that is not yet in the identity store.
pub async fn seed_default_accounts(repo: &dyn Repository) -> Result<(), AuthError> {
    for account in &DEFAULT_ACCOUNTS {
        if repo.get_user(account.username).await?.is_some() {
            continue;
        }
        let user = User {
            username: account.username.to_string(),
            password_hash: hash_password(account.password)?,
            enabled: true,
            roles: account.roles.iter().copied().collect(),
        };
        repo.create_user(&user).await?;
        tracing::debug!(username = account.username, "Seeded default account");
    }
    Ok(())
}

/// log_default_accounts
///
/// Startup-only diagnostic listing the seeded credentials. Development use only.
pub fn log_default_accounts() {
    for account in &DEFAULT_ACCOUNTS {
        let roles: Vec<&str> = account
            .roles
            .iter()
            .map(|r| match r {
                Role::User => "USER",
                Role::Admin => "ADMIN",
            })
            .collect();
        tracing::info!(
            "[dev] default account -> username: {}, password: {}, roles: {}",
            account.username,
            account.password,
            roles.join(", ")
        );
    }
}

// --- Sessions ---

/// Claims
///
/// Payload of the signed session token. The token only names a session; the session
/// itself (and therefore its validity) lives in the `SessionStore`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the username the session was issued to.
    pub sub: String,
    /// Session id: key into the `SessionStore`.
    pub sid: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// Session
///
/// Server-side record of an authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// SessionStore
///
/// Lookup table from session id to session. Expired sessions are never returned.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: Session);
    fn get(&self, id: Uuid) -> Option<Session>;
    /// Returns true when a session was removed.
    fn remove(&self, id: Uuid) -> bool;
}

/// InMemorySessionStore
///
/// Process-local `SessionStore`. Sessions do not survive a restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    /// Sweeps every expired session before storing the new one.
    fn insert(&self, session: Session) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "Dropped expired sessions");
        }
        sessions.insert(session.id, session);
    }

    fn get(&self, id: Uuid) -> Option<Session> {
        let session = {
            let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
            sessions.get(&id).cloned()
        }?;

        if session.expires_at <= Utc::now() {
            self.remove(id);
            return None;
        }
        Some(session)
    }

    fn remove(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.remove(&id).is_some()
    }
}

/// SessionManager
///
/// Issues, resolves and revokes session tokens. A token is honoured only while its
/// signature verifies and its session is still present in the store.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

/// SessionState
///
/// The shared handle placed in the application state.
pub type SessionState = Arc<SessionManager>;

impl SessionManager {
    pub fn new(config: &AppConfig, store: Arc<dyn SessionStore>) -> Self {
        let secret = config.session_secret.as_bytes();
        Self {
            store,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(config.session_ttl_minutes),
        }
    }

    /// Overrides the session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Anonymous -> Authenticated: stores a new session and returns its signed token.
    pub fn issue(&self, principal: Principal) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let session = Session {
            id: Uuid::new_v4(),
            principal,
            expires_at,
        };

        let claims = Claims {
            sub: session.principal.username.clone(),
            sid: session.id,
            exp: expires_at.timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        self.store.insert(session);
        Ok(token)
    }

    /// Returns the principal of a live session, or `None` for any invalid, expired or
    /// revoked token.
    pub fn resolve(&self, token: &str) -> Option<Principal> {
        let claims = self.decode(token)?;
        let session = self.store.get(claims.sid)?;
        (session.principal.username == claims.sub).then_some(session.principal)
    }

    /// Authenticated -> Anonymous: drops the session named by `token`.
    pub fn revoke(&self, token: &str) -> bool {
        match self.decode(token) {
            Some(claims) => self.store.remove(claims.sid),
            None => false,
        }
    }

    fn decode(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                None
            }
        }
    }
}

/// session_token
///
/// Finds the session token of a request: the `SESSION` cookie first, then an
/// `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// `Set-Cookie` value establishing the session.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds().max(0)
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Principal Extractor Implementation
///
/// Resolves the request's principal. The access-control middleware stores it in the
/// request extensions when a session is present; otherwise the token is resolved here.
///
/// Rejection: `StatusCode::UNAUTHORIZED` when no live session is attached.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    SessionState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let sessions = SessionState::from_ref(state);
        let token = session_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        sessions.resolve(&token).ok_or(StatusCode::UNAUTHORIZED)
    }
}
