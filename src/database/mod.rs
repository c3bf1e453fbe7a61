pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::DatabaseError;
pub use memory::MemoryRepository;
pub use repository::{Entity, PgRepository, Repository, SharedRepository};
pub use models::{Dummy, User};
pub use pool::{connect_lazy, redact, PoolSettings};
