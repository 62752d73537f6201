//! Bearer JWT auth for the sync HTTP API. Deliberately simpler than a
//! multi-algorithm DID-resolving scheme: one HMAC secret, one claim set,
//! checked on every request via an extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let body = serde_json::json!({ "code": "unauthorized", "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            ttl_seconds: std::env::var("JWT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
        }
    }
}

impl JwtConfig {
    pub fn issue(&self, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;
        Ok(data.claims)
    }
}

/// Extractor pulling an authenticated user id off the `Authorization: Bearer`
/// header. Requires `JwtConfig` in the router's state.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    JwtConfig: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MalformedHeader)?;

        let config = JwtConfig::from_ref(state);
        let claims = config.verify(token)?;

        Ok(AuthUser { user_id: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips_through_verify() {
        let config = JwtConfig {
            secret: "test-secret".to_string(),
            ttl_seconds: 3600,
        };
        let user_id = Uuid::new_v4();
        let token = config.issue(user_id).expect("issue token");
        let claims = config.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = JwtConfig {
            secret: "test-secret".to_string(),
            ttl_seconds: 3600,
        };
        let token = config.issue(Uuid::new_v4()).expect("issue token");
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(config.verify(&tampered), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = JwtConfig {
            secret: "secret-a".to_string(),
            ttl_seconds: 3600,
        };
        let verifier = JwtConfig {
            secret: "secret-b".to_string(),
            ttl_seconds: 3600,
        };
        let token = issuer.issue(Uuid::new_v4()).expect("issue token");
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken)));
    }
}
