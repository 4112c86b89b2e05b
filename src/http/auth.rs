//! Bearer token authentication.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, AppState};
use crate::domain::aggregates::{Role, User};
use crate::domain::value_objects::UserId;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self { encoding: EncodingKey::from_secret(secret.as_bytes()), decoding: DecodingKey::from_secret(secret.as_bytes()) }
    }

    pub fn issue(&self, user: UserId, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims { sub: user, exp: (Utc::now() + ttl).timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256)).map(|data| data.claims)
    }
}

/// The authenticated, active caller.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("You are not logged in"))?;
        let claims = state.keys.verify(token).map_err(|err| {
            debug!(error = %err, "rejected bearer token");
            ApiError::unauthorized("Invalid or expired token")
        })?;
        let user = state
            .users
            .find(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exists"))?;
        if !user.is_active {
            return Err(ApiError::unauthorized("This account has been deactivated"));
        }
        Ok(Self(user))
    }
}

pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You don't have permission to perform this action"))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_round_trip() {
        let keys = JwtKeys::new("secret");
        let user = UserId::new();
        let token = keys.issue(user, Duration::hours(1)).unwrap();
        assert_eq!(keys.verify(&token).unwrap().sub, user);
        assert!(JwtKeys::new("other").verify(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let keys = JwtKeys::new("secret");
        let token = keys.issue(UserId::new(), Duration::hours(-2)).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_roles() {
        let seller = User::new("Sam", "sam@example.com", Role::Seller);
        assert!(require_role(&seller, &[Role::Seller, Role::Admin]).is_ok());
        assert_eq!(require_role(&seller, &[Role::User]).unwrap_err().status(), axum::http::StatusCode::FORBIDDEN);
    }
}
