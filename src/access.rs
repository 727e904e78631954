use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{Principal, session_token},
    models::Role,
};

/// Fixed page every denied request is redirected to.
pub const DENIED_PATH: &str = "/permission-denied";

/// PathPattern
///
/// A compiled ant-style pattern. Only the two shapes the policy table needs are
/// supported: an exact path (`/`) and a subtree (`/admin/**`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    /// Matches the base itself and everything below it. The base of `/**` is empty.
    Subtree(String),
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(base) => PathPattern::Subtree(base.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Subtree(base) => {
                path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Requirement
///
/// What a matching rule demands of the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    PermitAll,
    /// An authenticated principal holding at least one of these roles.
    AnyRole(Vec<Role>),
}

/// AccessRule
///
/// One row of the policy table: any of `patterns` selects `requirement`.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub patterns: Vec<PathPattern>,
    pub requirement: Requirement,
}

impl AccessRule {
    pub fn new(patterns: &[&str], requirement: Requirement) -> Self {
        Self {
            patterns: patterns.iter().map(|p| PathPattern::compile(p)).collect(),
            requirement,
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny,
}

/// AccessPolicy
///
/// Ordered rule list evaluated first-match-wins. A path no rule matches is denied.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// The catalog's policy table.
    ///
    /// | Pattern          | Requirement   |
    /// |------------------|---------------|
    /// | `/user/**`       | USER or ADMIN |
    /// | `/admin/**`      | ADMIN         |
    /// | `/h2-console/**` | open          |
    /// | `/`, `/**`       | open          |
    pub fn library() -> Self {
        Self::new(vec![
            AccessRule::new(&["/user/**"], Requirement::AnyRole(vec![Role::User, Role::Admin])),
            AccessRule::new(&["/admin/**"], Requirement::AnyRole(vec![Role::Admin])),
            AccessRule::new(&["/h2-console/**"], Requirement::PermitAll),
            AccessRule::new(&["/", "/**"], Requirement::PermitAll),
        ])
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn evaluate(&self, path: &str, principal: Option<&Principal>) -> Decision {
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(path)) else {
            return Decision::Deny;
        };

        match (&rule.requirement, principal) {
            (Requirement::PermitAll, _) => Decision::Permit,
            (Requirement::AnyRole(roles), Some(principal)) if principal.has_any_role(roles) => {
                Decision::Permit
            }
            (Requirement::AnyRole(_), _) => Decision::Deny,
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::library()
    }
}

/// enforce
///
/// Middleware applied to the whole router. Resolves the session principal (if any),
/// makes it available to handlers through the request extensions, and evaluates the
/// policy. Denied requests never reach a handler: they get an audit line and a
/// redirect to `DENIED_PATH`.
pub async fn enforce(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let principal = session_token(request.headers()).and_then(|token| state.sessions.resolve(&token));
    let path = request.uri().path().to_string();

    match state.policy.evaluate(&path, principal.as_ref()) {
        Decision::Permit => {
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Decision::Deny => {
            let who = principal
                .as_ref()
                .map(|p| p.username.as_str())
                .unwrap_or("anonymous");
            tracing::warn!(
                target: "audit",
                principal = %who,
                path = %path,
                "{} was trying to access {}",
                who,
                path
            );
            Redirect::to(DENIED_PATH).into_response()
        }
    }
}
