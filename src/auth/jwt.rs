use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::AuthError;

pub const CLAIM_ROLE: &str = "role";
pub const CLAIM_USERID: &str = "userid";
pub const CLAIM_NAME: &str = "name";

/// User data embedded in a token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, String>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(role: impl Into<String>, userid: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new()
            .with(CLAIM_ROLE, role)
            .with(CLAIM_USERID, userid)
            .with(CLAIM_NAME, name)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn role(&self) -> Option<&str> {
        self.get_claim(CLAIM_ROLE)
    }

    pub fn userid(&self) -> Option<&str> {
        self.get_claim(CLAIM_USERID)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_claim(CLAIM_NAME)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Claims {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenEnvelope {
    iss: String,
    iat: i64,
    exp: i64,
    data: Claims,
}

/// A token whose signature, issuer and expiry have been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub claims: Claims,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ValidatedToken {
    /// Seconds until expiry; negative once expired.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

/// Issues and validates HS512 tokens signed with the environment's secret.
#[derive(Clone)]
pub struct JwtWrapper {
    server: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtWrapper")
            .field("server", &self.server)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl JwtWrapper {
    pub const ALGORITHM: Algorithm = Algorithm::HS512;

    pub fn new(server: impl Into<String>, secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let server = server.into();
        let mut validation = Validation::new(Self::ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[server.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            server,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Clock skew tolerated when checking `exp`
    pub fn set_leeway(&mut self, seconds: u64) {
        self.validation.leeway = seconds;
    }

    pub fn issue_token(&self, claims: &Claims, ttl_seconds: i64) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let envelope = TokenEnvelope {
            iss: self.server.clone(),
            iat: now,
            exp: now + ttl_seconds,
            data: claims.clone(),
        };

        encode(&Header::new(Self::ALGORITHM), &envelope, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<ValidatedToken, AuthError> {
        let data = decode::<TokenEnvelope>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let envelope = data.claims;
        let timestamp = |secs: i64| DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default();
        Ok(ValidatedToken {
            claims: envelope.data,
            issued_at: timestamp(envelope.iat),
            expires_at: timestamp(envelope.exp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper() -> JwtWrapper {
        JwtWrapper::new("api.test", "super-secret-key").unwrap()
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let jwt = wrapper();
        let claims = Claims::for_user("admin", "123", "X");

        let token = jwt.issue_token(&claims, 1800).unwrap();
        let validated = jwt.validate(&token).unwrap();

        assert_eq!(validated.claims, claims);
        assert!(validated.expires_in() > 1700 && validated.expires_in() <= 1800);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = wrapper();
        let token = jwt.issue_token(&Claims::for_user("user", "1", "U"), -10).unwrap();
        assert!(matches!(jwt.validate(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn leeway_tolerates_small_skew() {
        let mut jwt = wrapper();
        jwt.set_leeway(60);
        let token = jwt.issue_token(&Claims::for_user("user", "1", "U"), -10).unwrap();
        assert!(jwt.validate(&token).is_ok());
    }

    #[test]
    fn token_from_other_secret_is_invalid() {
        let other = JwtWrapper::new("api.test", "another-secret").unwrap();
        let token = other.issue_token(&Claims::for_user("admin", "1", "A"), 60).unwrap();
        assert!(matches!(wrapper().validate(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn token_from_other_issuer_is_invalid() {
        let other = JwtWrapper::new("elsewhere", "super-secret-key").unwrap();
        let token = other.issue_token(&Claims::for_user("admin", "1", "A"), 60).unwrap();
        assert!(matches!(wrapper().validate(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(wrapper().validate("not.a.jwt"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(JwtWrapper::new("api", ""), Err(AuthError::MissingSecret)));
    }

    #[test]
    fn claims_accessors() {
        let claims: Claims = [("role", "user"), ("userid", "42")].into_iter().collect();
        assert_eq!(claims.role(), Some("user"));
        assert_eq!(claims.userid(), Some("42"));
        assert_eq!(claims.name(), None);
    }
}
