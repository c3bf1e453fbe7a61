// Application environments and their component wiring
use serde_json::{json, Value};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::binding::{Binding, Bindings, DiBind, Param};
use super::cache::FileCache;
use super::container::{Container, Resolver};
use super::definition::Definition;
use super::error::{ConfigError, ConfigResult};
use super::keys;
use crate::auth::JwtWrapper;
use crate::database::models::user::{ROLE_ADMIN, ROLE_USER};
use crate::database::{connect_lazy, Dummy, MemoryRepository, PgRepository, PoolSettings, SharedRepository, User};
use crate::middleware::RequestSchema;
use crate::schemas;
use crate::services::UserService;

pub const DEV: &str = "dev";
pub const TEST: &str = "test";
pub const STAGING: &str = "staging";
pub const PROD: &str = "prod";

/// Environment used when `APP_ENV` is unset or empty
pub const DEFAULT_ENVIRONMENT: &str = DEV;

/// Process variables imported as string scalars
pub const OS_IMPORTS: [&str; 4] = [
    keys::TAG_VERSION,
    keys::TAG_COMMIT,
    keys::DBDRIVER_CONNECTION,
    keys::JWT_SECRET,
];

/// Environment selected by `APP_ENV`, defaulting to `dev`
pub fn active_environment() -> String {
    std::env::var("APP_ENV")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Directory holding `<env>.yaml` layers: `CONFIG_DIR`, else the crate's `config/`
pub fn config_dir() -> PathBuf {
    std::env::var("CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        let fallback = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
        debug!(path = %fallback.display(), "CONFIG_DIR unset, using build-time config directory");
        fallback
    })
}

/// The `<env>.yaml` layer for `name`, if present; a missing file is skipped with a warning
fn layer_path(config_dir: &Path, name: &str) -> Option<PathBuf> {
    let path = config_dir.join(format!("{}.yaml", name));
    if path.exists() {
        return Some(path);
    }
    warn!(
        environment = name,
        path = %path.display(),
        "Configuration layer file not found; set CONFIG_DIR if this is unexpected"
    );
    None
}

/// Number-valued scalar; OS imports arrive as strings so those are parsed too.
pub fn scalar_u64(key: &str, value: &Value) -> ConfigResult<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ConfigError::construction(key, format!("expected a non-negative integer, got {}", value)))
}

/// The full application definition.
///
/// `dev` carries every component; `test` swaps the repositories for
/// in-memory ones; `prod` adds a file-backed config cache.
pub fn definition(config_dir: &Path) -> ConfigResult<Definition> {
    let mut definition = Definition::new();

    let dev = definition.declare(DEV)?;
    let test = definition.declare(TEST)?;
    let staging = definition.declare(STAGING)?;
    let prod = definition.declare(PROD)?;

    definition.inherit_from(test, &[dev])?;
    definition.inherit_from(staging, &[dev])?;
    definition.inherit_from(prod, &[staging, dev])?;

    info!(config_dir = %config_dir.display(), "Loading configuration layers");
    for (handle, name) in [(dev, DEV), (test, TEST), (staging, STAGING), (prod, PROD)] {
        if let Some(path) = layer_path(config_dir, name) {
            definition.load_yaml(handle, &path)?;
        }
    }

    definition.add_environment(dev, components())?;
    definition.add_environment(test, in_memory_repositories())?;

    let cache_path = config_dir.join(".cache").join("prod.json");
    definition.with_cache(prod, Arc::new(FileCache::new(cache_path)))?;

    definition.with_os_environment(OS_IMPORTS);
    Ok(definition)
}

/// Build the container for `environment` against the real process environment
pub fn build_container(environment: &str, config_dir: &Path) -> ConfigResult<Container> {
    let container = definition(config_dir)?.build(environment)?;
    info!(environment, "Configuration ready");
    Ok(container)
}

/// Build the container with OS imports read through `lookup`
pub fn build_container_with_env<F>(environment: &str, config_dir: &Path, lookup: F) -> ConfigResult<Container>
where
    F: Fn(&str) -> Option<String>,
{
    definition(config_dir)?.build_with_env(environment, lookup)
}

fn components() -> Bindings {
    Bindings::new()
        .bind(
            keys::JWT_WRAPPER,
            DiBind::with_constructor(|args| {
                JwtWrapper::new(args.string(0)?, &args.string(1)?)
                    .map_err(|e| ConfigError::construction(keys::JWT_WRAPPER, e))
            })
            .with_params([Param::key(keys::API_SERVER), Param::key(keys::JWT_SECRET)])
            .with_method_call(|jwt: &mut JwtWrapper, resolver| {
                let leeway = resolver.get_value(keys::JWT_LEEWAY_SECONDS)?;
                jwt.set_leeway(scalar_u64(keys::JWT_LEEWAY_SECONDS, &leeway)?);
                Ok(())
            })
            .to_singleton(),
        )
        .bind(
            keys::DATABASE_POOL,
            DiBind::with_constructor(|args| {
                connect_lazy(&args.string(0)?, PoolSettings::default())
                    .map_err(|e| ConfigError::construction(keys::DATABASE_POOL, e))
            })
            .with_params([Param::key(keys::DBDRIVER_CONNECTION)])
            .to_singleton(),
        )
        .bind(
            keys::DUMMY_REPOSITORY,
            Binding::singleton(|resolver| {
                let pool = resolver.get::<PgPool>(keys::DATABASE_POOL)?;
                Ok(Arc::new(PgRepository::<Dummy>::new((*pool).clone())) as SharedRepository<Dummy>)
            }),
        )
        .bind(
            keys::USER_REPOSITORY,
            Binding::singleton(|resolver| {
                let pool = resolver.get::<PgPool>(keys::DATABASE_POOL)?;
                Ok(Arc::new(PgRepository::<User>::new((*pool).clone())) as SharedRepository<User>)
            }),
        )
        .bind(keys::USER_SERVICE, Binding::singleton(user_service))
        .bind(
            keys::SCHEMA_DUMMY,
            Binding::singleton(|_| RequestSchema::compile("dummy", &schemas::dummy())),
        )
        .bind(
            keys::SCHEMA_LOGIN,
            Binding::singleton(|_| RequestSchema::compile("login", &schemas::login())),
        )
        .bind(
            keys::BUILD_INFO,
            Binding::cached_scalar(|| {
                Ok(json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                    "built_at": chrono::Utc::now().to_rfc3339(),
                }))
            }),
        )
}

fn user_service(resolver: &Resolver<'_>) -> ConfigResult<UserService> {
    let users = resolver.get::<SharedRepository<User>>(keys::USER_REPOSITORY)?;
    let jwt = resolver.get::<JwtWrapper>(keys::JWT_WRAPPER)?;
    let ttl = scalar_u64(keys::JWT_TTL_SECONDS, &resolver.get_value(keys::JWT_TTL_SECONDS)?)?;
    Ok(UserService::new((*users).clone(), jwt, ttl as i64))
}

/// Seeded accounts for the `test` environment (password `pwd` for both)
pub fn seed_users() -> Vec<User> {
    vec![
        User::new("Administrator", "admin@example.com", "admin", "pwd", ROLE_ADMIN),
        User::new("Regular User", "user@example.com", "user", "pwd", ROLE_USER),
    ]
}

fn in_memory_repositories() -> Bindings {
    Bindings::new()
        .bind(
            keys::DUMMY_REPOSITORY,
            Binding::singleton(|_| Ok(Arc::new(MemoryRepository::<Dummy>::new()) as SharedRepository<Dummy>)),
        )
        .bind(
            keys::USER_REPOSITORY,
            Binding::singleton(|_| {
                Ok(Arc::new(MemoryRepository::<User>::with_records(seed_users())) as SharedRepository<User>)
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("config")
    }

    fn build(environment: &str) -> Container {
        build_container_with_env(environment, &config_root(), |_| None).unwrap()
    }

    #[test]
    fn resolution_orders() {
        let definition = definition(&config_root()).unwrap();
        assert_eq!(definition.resolution_order(TEST).unwrap(), vec!["test", "dev"]);
        assert_eq!(definition.resolution_order(PROD).unwrap(), vec!["prod", "staging", "dev"]);
    }

    #[test]
    fn test_environment_inherits_dev_scalars() {
        let container = build(TEST);
        assert_eq!(container.get_str(keys::PAGE_SIZE_MAX).unwrap(), "100");
        assert_eq!(container.source_of(keys::PAGE_SIZE_MAX), Some(DEV));
        assert_eq!(container.source_of(keys::JWT_SECRET), Some(TEST));
    }

    #[test]
    fn unset_os_imports_bind_empty_strings() {
        let container = build(TEST);
        assert_eq!(container.get_str(keys::TAG_VERSION).unwrap(), "");
        assert_eq!(container.source_of(keys::TAG_VERSION), Some(crate::config::OS_SOURCE));
    }

    #[test]
    fn os_secret_overrides_yaml() {
        let container = build_container_with_env(TEST, &config_root(), |key| {
            (key == keys::JWT_SECRET).then(|| "from-env".to_string())
        })
        .unwrap();
        assert_eq!(container.get_str(keys::JWT_SECRET).unwrap(), "from-env");
    }

    #[tokio::test]
    async fn test_environment_uses_seeded_memory_repositories() {
        let container = build(TEST);
        let users = container.get_as::<SharedRepository<User>>(keys::USER_REPOSITORY).unwrap();
        let admins = users.find_by("username", "admin").await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].role, ROLE_ADMIN);
    }

    #[test]
    fn jwt_wrapper_is_a_configured_singleton() {
        let container = build(TEST);
        let a = container.get_as::<JwtWrapper>(keys::JWT_WRAPPER).unwrap();
        let b = container.get_as::<JwtWrapper>(keys::JWT_WRAPPER).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.server(), container.get_str(keys::API_SERVER).unwrap());
    }

    #[test]
    fn prod_without_secret_cannot_build_jwt() {
        let container = build(PROD);
        assert!(matches!(
            container.get_as::<JwtWrapper>(keys::JWT_WRAPPER),
            Err(ConfigError::Construction { .. })
        ));
    }

    #[test]
    fn schemas_compile() {
        let container = build(DEV);
        assert_eq!(container.get_as::<RequestSchema>(keys::SCHEMA_DUMMY).unwrap().name(), "dummy");
        assert_eq!(container.get_as::<RequestSchema>(keys::SCHEMA_LOGIN).unwrap().name(), "login");
    }

    #[test]
    fn missing_layer_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::copy(config_root().join("dev.yaml"), dir.path().join("dev.yaml")).unwrap();

        assert!(layer_path(dir.path(), DEV).is_some());
        assert!(layer_path(dir.path(), TEST).is_none());

        let container = build_container_with_env(TEST, dir.path(), |_| None).unwrap();
        assert_eq!(container.get_str(keys::API_SERVER).unwrap(), "api.localhost");
        assert_eq!(container.source_of(keys::API_SERVER), Some(DEV));
    }

    #[test]
    fn build_info_from_a_previous_release_is_not_served() {
        use crate::config::CacheProvider;

        let dir = tempfile::tempdir().unwrap();
        let stale = FileCache::new(dir.path().join(".cache").join("prod.json"));
        stale
            .set("prod:BUILD_INFO", &json!({"name": "old", "version": "0.0.1", "built_at": "2020-01-01T00:00:00Z"}))
            .unwrap();

        let container = build_container_with_env(PROD, dir.path(), |_| None).unwrap();
        let info = container.get_value(keys::BUILD_INFO).unwrap();
        assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));

        let reopened = FileCache::new(dir.path().join(".cache").join("prod.json"));
        assert_eq!(reopened.get(&crate::config::cache_key(PROD, keys::BUILD_INFO)).unwrap(), Some(info));
    }

    #[test]
    fn scalar_u64_accepts_numbers_and_numeric_strings() {
        assert_eq!(scalar_u64("k", &json!(30)).unwrap(), 30);
        assert_eq!(scalar_u64("k", &json!(" 45 ")).unwrap(), 45);
        assert!(scalar_u64("k", &json!("soon")).is_err());
    }
}
