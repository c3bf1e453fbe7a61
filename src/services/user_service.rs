use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{verify_password, AuthError, Claims, JwtWrapper, ValidatedToken};
use crate::database::{DatabaseError, SharedRepository, User};

/// A token may only be refreshed within this many seconds of expiry
pub const REFRESH_WINDOW_SECONDS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Body returned by login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub data: Claims,
}

/// Credential checks and token issuance for user accounts
pub struct UserService {
    users: SharedRepository<User>,
    jwt: Arc<JwtWrapper>,
    ttl_seconds: i64,
}

impl UserService {
    pub fn new(users: SharedRepository<User>, jwt: Arc<JwtWrapper>, ttl_seconds: i64) -> Self {
        Self {
            users,
            jwt,
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Check credentials and issue a token carrying the user's role, id and name
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ServiceError> {
        let user = self
            .users
            .find_by("username", username)
            .await?
            .into_iter()
            .next();

        let Some(user) = user.filter(|u| verify_password(password, &u.password)) else {
            debug!(username, "Login rejected");
            return Err(AuthError::InvalidCredentials.into());
        };

        let userid = user.id.map(|id| id.to_string()).unwrap_or_default();
        let claims = Claims::for_user(user.role.as_str(), userid, user.name.as_str());
        let token = self.jwt.issue_token(&claims, self.ttl_seconds)?;

        info!(username, role = user.role.as_str(), "User logged in");
        Ok(TokenResponse { token, data: claims })
    }

    /// Re-issue a token for the same claims once it is close to expiring
    pub fn refresh(&self, current: &ValidatedToken) -> Result<TokenResponse, ServiceError> {
        if current.expires_in() > REFRESH_WINDOW_SECONDS {
            return Err(AuthError::RefreshTooEarly {
                window_minutes: REFRESH_WINDOW_SECONDS / 60,
            }
            .into());
        }

        let token = self.jwt.issue_token(&current.claims, self.ttl_seconds)?;
        debug!(userid = current.claims.userid(), "Token refreshed");
        Ok(TokenResponse {
            token,
            data: current.claims.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryRepository;

    fn service() -> UserService {
        let users = MemoryRepository::with_records([User::new("Admin", "a@x.io", "admin", "pwd", "admin")]);
        let jwt = Arc::new(JwtWrapper::new("api.test", "service-secret").unwrap());
        UserService::new(Arc::new(users), jwt, 1800)
    }

    #[tokio::test]
    async fn login_issues_token_with_user_claims() {
        let service = service();
        let response = service.login("admin", "pwd").await.unwrap();
        assert_eq!(response.data.role(), Some("admin"));
        assert_eq!(response.data.name(), Some("Admin"));

        let validated = service.jwt.validate(&response.token).unwrap();
        assert_eq!(validated.claims, response.data);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_rejected() {
        let service = service();
        assert!(matches!(
            service.login("admin", "nope").await,
            Err(ServiceError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(matches!(
            service.login("ghost", "pwd").await,
            Err(ServiceError::Auth(AuthError::InvalidCredentials))
        ));
    }

    #[test]
    fn refresh_is_refused_outside_window() {
        let service = service();
        let token = service.jwt.issue_token(&Claims::for_user("admin", "1", "A"), 1800).unwrap();
        let validated = service.jwt.validate(&token).unwrap();
        assert!(matches!(
            service.refresh(&validated),
            Err(ServiceError::Auth(AuthError::RefreshTooEarly { window_minutes: 5 }))
        ));
    }

    #[test]
    fn refresh_inside_window_extends_expiry() {
        let service = service();
        let token = service.jwt.issue_token(&Claims::for_user("admin", "1", "A"), 120).unwrap();
        let validated = service.jwt.validate(&token).unwrap();

        let refreshed = service.refresh(&validated).unwrap();
        let renewed = service.jwt.validate(&refreshed.token).unwrap();
        assert_eq!(renewed.claims, validated.claims);
        assert!(renewed.expires_at > validated.expires_at);
    }
}
