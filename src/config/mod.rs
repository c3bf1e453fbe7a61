pub mod app;
pub mod binding;
pub mod cache;
pub mod container;
pub mod definition;
pub mod error;

pub use binding::{Args, Binding, Bindings, DiBind, Instance, Lifecycle, Param};
pub use cache::{CacheProvider, FileCache, MemoryCache};
pub use container::{cache_key, Container, Resolver};
pub use definition::{Definition, EnvironmentHandle, OS_SOURCE};
pub use error::{ConfigError, ConfigResult};

/// Container keys shared by bootstrap, handlers and the CLI
pub mod keys {
    // Scalars
    pub const DBDRIVER_CONNECTION: &str = "DBDRIVER_CONNECTION";
    pub const JWT_SECRET: &str = "JWT_SECRET";
    pub const JWT_TTL_SECONDS: &str = "JWT_TTL_SECONDS";
    pub const JWT_LEEWAY_SECONDS: &str = "JWT_LEEWAY_SECONDS";
    pub const CORS_SERVERS: &str = "CORS_SERVERS";
    pub const API_SERVER: &str = "API_SERVER";
    pub const PAGE_SIZE_MAX: &str = "PAGE_SIZE_MAX";
    pub const TAG_VERSION: &str = "TAG_VERSION";
    pub const TAG_COMMIT: &str = "TAG_COMMIT";
    pub const BUILD_INFO: &str = "BUILD_INFO";

    // Components
    pub const JWT_WRAPPER: &str = "JwtWrapper";
    pub const DATABASE_POOL: &str = "DatabasePool";
    pub const DUMMY_REPOSITORY: &str = "DummyRepository";
    pub const USER_REPOSITORY: &str = "UserRepository";
    pub const USER_SERVICE: &str = "UserService";
    pub const SCHEMA_DUMMY: &str = "schema.dummy";
    pub const SCHEMA_LOGIN: &str = "schema.login";
}
