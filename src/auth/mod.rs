use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims of the panel's session token. The login flow that issues them lives
/// outside this service; `sid` is the session every elevation is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub sid: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id.into(),
            sid: session_id.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry, returning the claims
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_session() {
        let claims = Claims::new("user-7", "sess-1", 1);
        let token = generate_jwt(&claims, "secret").unwrap();
        let decoded = validate_jwt(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "user-7");
        assert_eq!(decoded.sid, "sess-1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt(&Claims::new("user-7", "sess-1", 1), "secret").unwrap();
        assert!(matches!(validate_jwt(&token, "other"), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_refuses_to_sign() {
        assert!(matches!(
            generate_jwt(&Claims::new("u", "s", 1), ""),
            Err(JwtError::InvalidSecret)
        ));
    }
}
