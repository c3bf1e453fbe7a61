use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use super::schema::RequestSchema;
use crate::auth::{AuthError, Claims, JwtWrapper, ValidatedToken};
use crate::error::ApiError;
use crate::state::AppState;

/// Largest body buffered for schema validation
pub const MAX_VALIDATED_BODY_BYTES: usize = 2 * 1024 * 1024;

/// One check run before a route's handler
#[derive(Clone, Debug)]
pub enum PreDispatchHook {
    RequireAuth,
    RequireRole(String),
    ValidateSchema(Arc<RequestSchema>),
}

impl PreDispatchHook {
    pub fn require_role(role: impl Into<String>) -> Self {
        PreDispatchHook::RequireRole(role.into())
    }
}

/// Per-request authentication progress, traced at debug level.
///
/// The terminal state is left in the request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    TokenPresent,
    TokenValid,
    ClaimsBound,
    Authorized,
    Rejected,
}

fn transition(from: AuthState, to: AuthState) -> AuthState {
    debug!(?from, ?to, "Auth state transition");
    to
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::AbsentToken);
    };
    let header = header
        .to_str()
        .map_err(|_| AuthError::InvalidToken("non-ASCII Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::InvalidToken("Authorization header must use Bearer scheme".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::AbsentToken);
    }
    Ok(token)
}

/// Validate the bearer token and bind its claims to the request.
///
/// Claims already bound by an earlier hook are reused.
fn bind_claims(jwt: &JwtWrapper, parts: &mut Parts) -> Result<ValidatedToken, AuthError> {
    if let Some(token) = parts.extensions.get::<ValidatedToken>() {
        return Ok(token.clone());
    }

    let mut state = AuthState::Unauthenticated;
    let result = (|| -> Result<ValidatedToken, AuthError> {
        let token = extract_bearer_token(&parts.headers)?;
        state = transition(state, AuthState::TokenPresent);
        let validated = jwt.validate(token)?;
        state = transition(state, AuthState::TokenValid);
        Ok(validated)
    })();

    match result {
        Ok(validated) => {
            parts.extensions.insert(validated.clone());
            transition(state, AuthState::ClaimsBound);
            Ok(validated)
        }
        Err(e) => {
            parts.extensions.insert(transition(state, AuthState::Rejected));
            Err(e)
        }
    }
}

/// Require a valid bearer token; the request ends in `Authorized` or `Rejected`
pub fn require_authenticated(jwt: &JwtWrapper, parts: &mut Parts) -> Result<ValidatedToken, AuthError> {
    let validated = bind_claims(jwt, parts)?;
    parts.extensions.insert(transition(AuthState::ClaimsBound, AuthState::Authorized));
    Ok(validated)
}

/// Authenticate, then require an exact (case-sensitive) role match
pub fn require_role(jwt: &JwtWrapper, parts: &mut Parts, expected: &str) -> Result<ValidatedToken, AuthError> {
    let validated = bind_claims(jwt, parts)?;
    if validated.claims.role() == Some(expected) {
        parts.extensions.insert(transition(AuthState::ClaimsBound, AuthState::Authorized));
        Ok(validated)
    } else {
        parts.extensions.insert(transition(AuthState::ClaimsBound, AuthState::Rejected));
        Err(AuthError::InsufficientPrivileges {
            required: expected.to_string(),
        })
    }
}

/// Hooks attached to one route, plus the state they resolve components from
#[derive(Clone)]
pub struct RouteGuard {
    state: AppState,
    hooks: Arc<[PreDispatchHook]>,
}

impl RouteGuard {
    pub fn new(state: AppState, hooks: Vec<PreDispatchHook>) -> Self {
        Self {
            state,
            hooks: hooks.into(),
        }
    }

    fn jwt(&self) -> Result<Arc<JwtWrapper>, ApiError> {
        // Resolution failures must not leak detail; surface as a plain 401
        self.state.jwt().map_err(|e| {
            tracing::error!("Unable to resolve JWT component: {}", e);
            ApiError::unauthorized("Invalid token")
        })
    }

    async fn apply(&self, hook: &PreDispatchHook, request: Request) -> Result<Request, ApiError> {
        match hook {
            PreDispatchHook::RequireAuth => {
                let (mut parts, body) = request.into_parts();
                require_authenticated(&*self.jwt()?, &mut parts)?;
                Ok(Request::from_parts(parts, body))
            }
            PreDispatchHook::RequireRole(role) => {
                let (mut parts, body) = request.into_parts();
                require_role(&*self.jwt()?, &mut parts, role)?;
                Ok(Request::from_parts(parts, body))
            }
            PreDispatchHook::ValidateSchema(schema) => {
                let (parts, body) = request.into_parts();
                let bytes = axum::body::to_bytes(body, MAX_VALIDATED_BODY_BYTES)
                    .await
                    .map_err(|_| ApiError::bad_request("Unable to read request body"))?;
                let value: Value = serde_json::from_slice(&bytes)
                    .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
                schema.validate(&value)?;
                Ok(Request::from_parts(parts, Body::from(bytes)))
            }
        }
    }
}

/// Middleware running a route's hooks in declaration order
pub async fn run_hooks(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    for hook in guard.hooks.iter() {
        request = match guard.apply(hook, request).await {
            Ok(request) => request,
            Err(e) => {
                warn!(%method, path = path.as_str(), status = e.status_code(), "Request rejected: {}", e);
                return Err(e);
            }
        };
    }

    if !guard.hooks.is_empty() {
        debug!(%method, path = path.as_str(), "Pre-dispatch checks passed");
    }
    Ok(next.run(request).await)
}

/// Attach ordered pre-dispatch hooks to a method router
pub fn guard(route: MethodRouter<AppState>, state: &AppState, hooks: Vec<PreDispatchHook>) -> MethodRouter<AppState> {
    if hooks.is_empty() {
        return route;
    }
    route.route_layer(from_fn_with_state(RouteGuard::new(state.clone(), hooks), run_hooks))
}

/// Claims bound by the pipeline for the current request, if any.
///
/// Never rejects: outside an authenticated route every claim is `None`.
#[derive(Debug, Clone, Default)]
pub struct RequestClaims(pub Option<ValidatedToken>);

impl RequestClaims {
    pub fn get_claim(&self, name: &str) -> Option<&str> {
        self.0.as_ref().and_then(|token| token.claims.get_claim(name))
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.0.as_ref().map(|token| &token.claims)
    }

    pub fn token(&self) -> Option<&ValidatedToken> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestClaims {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestClaims(parts.extensions.get::<ValidatedToken>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn jwt() -> JwtWrapper {
        JwtWrapper::new("api.test", "pipeline-secret").unwrap()
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = HttpRequest::builder().uri("/sampleprotected/ping");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn missing_header_is_absent_token() {
        let err = require_authenticated(&jwt(), &mut parts_with(None)).unwrap_err();
        assert!(matches!(err, AuthError::AbsentToken));
        assert_eq!(ApiError::from(err).message(), "Absent authorization token");
    }

    #[test]
    fn empty_bearer_is_absent_token() {
        let err = require_authenticated(&jwt(), &mut parts_with(Some("Bearer   "))).unwrap_err();
        assert!(matches!(err, AuthError::AbsentToken));
    }

    #[test]
    fn non_bearer_scheme_is_invalid() {
        let err = require_authenticated(&jwt(), &mut parts_with(Some("Basic dXNlcjpwd2Q="))).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn valid_token_binds_claims() {
        let jwt = jwt();
        let claims = Claims::for_user("admin", "123", "X");
        let token = jwt.issue_token(&claims, 1800).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));

        let validated = require_authenticated(&jwt, &mut parts).unwrap();
        assert_eq!(validated.claims, claims);
        assert_eq!(parts.extensions.get::<ValidatedToken>().unwrap().claims, claims);
    }

    #[test]
    fn authenticated_request_ends_authorized() {
        let jwt = jwt();
        let token = jwt.issue_token(&Claims::for_user("user", "7", "U"), 60).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));

        require_authenticated(&jwt, &mut parts).unwrap();
        assert_eq!(parts.extensions.get::<AuthState>(), Some(&AuthState::Authorized));
    }

    #[test]
    fn failed_authentication_ends_rejected() {
        let mut parts = parts_with(Some("Bearer not-a-jwt"));
        assert!(require_authenticated(&jwt(), &mut parts).is_err());
        assert_eq!(parts.extensions.get::<AuthState>(), Some(&AuthState::Rejected));
    }

    #[test]
    fn role_mismatch_is_forbidden() {
        let jwt = jwt();
        let token = jwt.issue_token(&Claims::for_user("user", "7", "U"), 60).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));

        let err = require_role(&jwt, &mut parts, "admin").unwrap_err();
        assert_eq!(parts.extensions.get::<AuthState>(), Some(&AuthState::Rejected));
        let api_error = ApiError::from(err);
        assert_eq!(api_error.status_code(), 403);
        assert!(api_error.message().contains("Insufficient privileges"));
    }

    #[test]
    fn role_match_is_case_sensitive() {
        let jwt = jwt();
        let token = jwt.issue_token(&Claims::for_user("Admin", "7", "U"), 60).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        assert!(require_role(&jwt, &mut parts, "admin").is_err());
    }

    #[tokio::test]
    async fn request_claims_are_empty_without_authentication() {
        let mut parts = parts_with(None);
        let claims = RequestClaims::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(claims.get_claim("role"), None);
        assert!(claims.claims().is_none());
    }
}
