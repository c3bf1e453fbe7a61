pub mod user_service;

pub use user_service::{ServiceError, TokenResponse, UserService, REFRESH_WINDOW_SECONDS};
