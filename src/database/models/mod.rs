pub mod dummy;
pub mod user;

pub use dummy::Dummy;
pub use user::User;
