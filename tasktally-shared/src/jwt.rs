use jsonwebtoken::{self, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bearer token claims. `sub` carries the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub jti: String,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

pub fn decode_and_verify(token: &str, secret: &[u8]) -> Result<JwtClaims, JwtError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<JwtClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Decode(e.to_string()))
}

pub fn encode(claims: &JwtClaims, secret: &[u8]) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let claims = JwtClaims {
            sub: "7b7a6a3a-0b6e-4d8e-9f0a-2d3c4b5a6978".into(),
            jti: "jti-1".into(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = encode(&claims, b"secret").unwrap();
        let back = decode_and_verify(&token, b"secret").unwrap();
        assert_eq!(back.sub, claims.sub);
        assert_eq!(back.jti, claims.jti);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = JwtClaims {
            sub: "u".into(),
            jti: "j".into(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = encode(&claims, b"secret").unwrap();
        assert!(decode_and_verify(&token, b"other").is_err());

        let expired = JwtClaims {
            exp: chrono::Utc::now().timestamp() - 3600,
            ..claims
        };
        let token = encode(&expired, b"secret").unwrap();
        assert!(decode_and_verify(&token, b"secret").is_err());
    }
}
