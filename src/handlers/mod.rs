// handlers/mod.rs - route table and per-route pre-dispatch hooks
pub mod dummy;
pub mod login;
pub mod root;
pub mod sample;

use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{keys, ConfigError, ConfigResult};
use crate::database::models::user::ROLE_ADMIN;
use crate::middleware::{guard, PreDispatchHook, RequestSchema};
use crate::state::AppState;

/// Build the application router.
///
/// Schemas and CORS origins are resolved here so a misconfigured container
/// fails at boot rather than on the first request.
pub fn router(state: AppState) -> ConfigResult<Router> {
    let container = state.container();
    let dummy_schema = container.get_as::<RequestSchema>(keys::SCHEMA_DUMMY)?;
    let login_schema = container.get_as::<RequestSchema>(keys::SCHEMA_LOGIN)?;
    let cors = cors_layer(&container.get_str(keys::CORS_SERVERS)?)?;

    let authenticated = || vec![PreDispatchHook::RequireAuth];
    let admin = || vec![PreDispatchHook::require_role(ROLE_ADMIN)];
    let admin_with_body = || {
        vec![
            PreDispatchHook::require_role(ROLE_ADMIN),
            PreDispatchHook::ValidateSchema(dummy_schema.clone()),
        ]
    };

    let router = Router::new()
        // Public
        .route("/", get(root::root))
        .route("/health", get(root::health))
        .route("/sample/ping", get(sample::ping))
        .route(
            "/login",
            guard(post(login::login), &state, vec![PreDispatchHook::ValidateSchema(login_schema)]),
        )
        // Authenticated
        .route("/sampleprotected/ping", guard(get(sample::protected_ping), &state, authenticated()))
        .route("/sampleprotected/pingadm", guard(get(sample::admin_ping), &state, admin()))
        .route("/refreshtoken", guard(post(login::refresh), &state, authenticated()))
        .route(
            "/dummy",
            guard(get(dummy::list), &state, authenticated())
                .merge(guard(post(dummy::create), &state, admin_with_body())),
        )
        .route(
            "/dummy/:id",
            guard(get(dummy::show), &state, authenticated())
                .merge(guard(put(dummy::update), &state, admin_with_body()))
                .merge(guard(delete(dummy::remove), &state, admin())),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(router)
}

/// CORS from a comma-separated origin list; `*` allows any origin
pub fn cors_layer(servers: &str) -> ConfigResult<CorsLayer> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let origins: Vec<&str> = servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if origins.iter().any(|origin| *origin == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any));
    }

    let origins = origins
        .into_iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::construction(keys::CORS_SERVERS, e))
        })
        .collect::<ConfigResult<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_wildcard_and_lists() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("http://localhost:3000, http://localhost:5173").is_ok());
        assert!(cors_layer("").is_ok());
    }

    #[test]
    fn cors_rejects_invalid_origin() {
        assert!(cors_layer("http://bad\norigin").is_err());
    }
}
