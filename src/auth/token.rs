use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::Role;
use crate::error::AppError;

/// Claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Why a token was refused. Callers outside this module collapse all of
/// these into a single invalid-token rejection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,
}

/// HS256 issuer and verifier keyed by the process-wide secret.
///
/// Rotating the secret invalidates every token issued under the old one.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, principal_id: Uuid, email: &str, role: Role) -> Result<String, AppError> {
        self.issue_with_ttl(principal_id, email, role, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        principal_id: Uuid,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("token signing failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        // jsonwebtoken accepts `exp == now`; a token is dead from its expiry
        // second onwards.
        if Utc::now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test_secret", Duration::hours(1))
    }

    #[test]
    fn test_issue_then_verify_returns_claims() {
        let tokens = service();
        let id = Uuid::new_v4();
        let token = tokens.issue(id, "a@x.com", Role::Counselor).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Counselor);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = service();
        let token = tokens
            .issue_with_ttl(Uuid::new_v4(), "a@x.com", Role::Student, Duration::seconds(-5))
            .unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));

        let token = tokens
            .issue_with_ttl(Uuid::new_v4(), "a@x.com", Role::Student, Duration::zero())
            .unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = service();
        assert_eq!(tokens.verify(""), Err(TokenError::Malformed));
        assert_eq!(tokens.verify("not.a.jwt"), Err(TokenError::Malformed));
        assert_eq!(tokens.verify("abc"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_other_secret_fails_signature() {
        let token = service().issue(Uuid::new_v4(), "a@x.com", Role::Admin).unwrap();
        let rotated = TokenService::new("rotated_secret", Duration::hours(1));
        assert_eq!(rotated.verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let tokens = service();
        let token = tokens.issue(Uuid::new_v4(), "a@x.com", Role::Student).unwrap();

        let sig_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.clone().into_bytes();
        let mid = sig_start + 5;
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert_eq!(tokens.verify(&tampered), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_any_single_character_change_is_rejected() {
        let tokens = service();
        let token = tokens.issue(Uuid::new_v4(), "a@x.com", Role::Student).unwrap();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'x' { b'y' } else { b'x' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(tokens.verify(&tampered).is_err(), "position {} accepted", i);
        }
    }

    #[test]
    fn test_forged_role_is_rejected() {
        let tokens = service();
        let forged = TokenService::new("attacker_secret", Duration::hours(1))
            .issue(Uuid::new_v4(), "a@x.com", Role::Admin)
            .unwrap();
        assert!(tokens.verify(&forged).is_err());
    }
}
