// JWT token generation and validation service

use crate::auth::models::{IdentityClaims, Role};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Signing material and lifetimes for both token kinds
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// JWT claims structure
///
/// `sub` is serialized as a JSON integer so user ids survive the round trip
/// exactly. `jti` keeps two tokens minted in the same second distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    fn identity(self) -> IdentityClaims {
        IdentityClaims {
            user_id: self.sub,
            email: self.email,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token uses an unaccepted signing algorithm")]
    InvalidAlgorithm,

    #[error("token is malformed")]
    Malformed,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// A freshly signed token together with its absolute expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh token minted for the same identity
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Token service for JWT operations
pub struct TokenService {
    config: JwtConfig,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    fn secret_for(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.config.access_secret,
            TokenKind::Refresh => &self.config.refresh_secret,
        }
    }

    fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
        }
    }

    /// Sign `claims` with `secret`, expiring `ttl` from now
    pub fn mint(
        claims: &IdentityClaims,
        secret: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let exp = now + ttl.num_seconds();

        let claims = Claims {
            sub: claims.user_id,
            email: claims.email.clone(),
            role: claims.role,
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| TokenError::Encoding(format!("expiry {} out of range", exp)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify `token` against `secret` and return the embedded identity
    ///
    /// Only the HMAC family is accepted. A token is expired once the current
    /// second reaches `exp`; there is no leeway.
    pub fn verify(token: &str, secret: &str) -> Result<IdentityClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::InvalidAlgorithm
            }
            _ => TokenError::Malformed,
        })?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.identity())
    }

    /// Sign a token of the given kind with that kind's secret and lifetime
    pub fn generate(&self, kind: TokenKind, claims: &IdentityClaims) -> Result<IssuedToken, TokenError> {
        Self::mint(claims, self.secret_for(kind), self.ttl_for(kind))
    }

    /// Verify a token of the given kind against that kind's secret
    pub fn validate(&self, kind: TokenKind, token: &str) -> Result<IdentityClaims, TokenError> {
        Self::verify(token, self.secret_for(kind)).map_err(|e| {
            tracing::debug!("Rejected {} token: {}", kind, e);
            e
        })
    }

    /// Generate an access token (24 hours by default)
    pub fn generate_access_token(&self, claims: &IdentityClaims) -> Result<IssuedToken, TokenError> {
        self.generate(TokenKind::Access, claims)
    }

    /// Generate a refresh token (7 days by default)
    pub fn generate_refresh_token(&self, claims: &IdentityClaims) -> Result<IssuedToken, TokenError> {
        self.generate(TokenKind::Refresh, claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.validate(TokenKind::Access, token)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.validate(TokenKind::Refresh, token)
    }

    /// Generate both access and refresh tokens
    pub fn generate_token_pair(&self, claims: &IdentityClaims) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.generate_access_token(claims)?,
            refresh: self.generate_refresh_token(claims)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        access_secret: "test_access_secret_for_testing_purposes".to_string(),
        refresh_secret: "test_refresh_secret_for_testing_purposes".to_string(),
        access_ttl: Duration::hours(24),
        refresh_ttl: Duration::days(7),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_token_service() -> TokenService {
        TokenService::new(test_jwt_config())
    }

    fn alice() -> IdentityClaims {
        IdentityClaims {
            user_id: 1,
            email: "alice@example.com".to_string(),
            role: Role::User,
        }
    }

    fn decode_unchecked(token: &str, secret: &str) -> Claims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_access_token_expiration_is_24_hours() {
        let service = test_token_service();
        let issued = service.generate_access_token(&alice()).unwrap();
        let claims = decode_unchecked(&issued.token, &test_jwt_config().access_secret);

        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_refresh_token_expiration_is_7_days() {
        let service = test_token_service();
        let issued = service.generate_refresh_token(&alice()).unwrap();
        let claims = decode_unchecked(&issued.token, &test_jwt_config().refresh_secret);

        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_claims_round_trip() {
        let service = test_token_service();
        let pair = service.generate_token_pair(&alice()).unwrap();

        assert_eq!(service.validate_access_token(&pair.access.token).unwrap(), alice());
        assert_eq!(service.validate_refresh_token(&pair.refresh.token).unwrap(), alice());
        assert_ne!(pair.access.token, pair.refresh.token);
    }

    #[test]
    fn test_large_user_id_survives_exactly() {
        // 2^53 + 1 is not representable as an f64
        let claims = IdentityClaims {
            user_id: 9_007_199_254_740_993,
            ..alice()
        };
        let service = test_token_service();
        let issued = service.generate_access_token(&claims).unwrap();

        assert_eq!(
            service.validate_access_token(&issued.token).unwrap().user_id,
            9_007_199_254_740_993
        );
    }

    #[test]
    fn test_tokens_minted_back_to_back_differ() {
        let service = test_token_service();
        let first = service.generate_refresh_token(&alice()).unwrap();
        let second = service.generate_refresh_token(&alice()).unwrap();

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let service = test_token_service();
        let pair = service.generate_token_pair(&alice()).unwrap();

        assert_eq!(
            service.validate_refresh_token(&pair.access.token),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(
            service.validate_access_token(&pair.refresh.token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let secret = "expiry_secret";
        let issued = TokenService::mint(&alice(), secret, Duration::seconds(-30)).unwrap();

        assert_eq!(TokenService::verify(&issued.token, secret), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_expiring_this_second_is_rejected() {
        let secret = "expiry_secret";
        let issued = TokenService::mint(&alice(), secret, Duration::zero()).unwrap();

        assert_eq!(TokenService::verify(&issued.token, secret), Err(TokenError::Expired));
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let service = test_token_service();

        for token in ["", "not.a.token", "invalid_token_format", "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature"] {
            assert!(service.validate_access_token(token).is_err(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_none_algorithm_is_rejected() {
        let service = test_token_service();
        let issued = service.generate_access_token(&alice()).unwrap();
        let payload = issued.token.split('.').nth(1).unwrap();
        // {"alg":"none","typ":"JWT"}
        let forged = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{}.", payload);

        assert!(service.validate_access_token(&forged).is_err());
    }

    #[test]
    fn test_other_hmac_variants_are_accepted() {
        let secret = "hmac_family_secret";
        let claims = Claims {
            sub: 7,
            email: "bob@example.com".to_string(),
            role: Role::User,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(TokenService::verify(&token, secret).unwrap().user_id, 7);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let service = test_token_service();
        let issued = service.generate_access_token(&alice()).unwrap();
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let other = service
            .generate_access_token(&IdentityClaims { user_id: 2, ..alice() })
            .unwrap();
        let other_payload = other.token.split('.').nth(1).unwrap().to_string();
        parts[1] = &other_payload;

        assert_eq!(
            service.validate_access_token(&parts.join(".")),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", test_jwt_config());
        assert!(!rendered.contains("test_access_secret"));
        assert!(!rendered.contains("test_refresh_secret"));
    }

    proptest! {
        #[test]
        fn prop_mint_then_verify_returns_claims(
            user_id in any::<i64>(),
            email in "[a-z]{3,10}@[a-z]{3,10}\\.(com|org|net)",
            admin in any::<bool>(),
            ttl in 1i64..10_000_000
        ) {
            let claims = IdentityClaims {
                user_id,
                email,
                role: if admin { Role::Admin } else { Role::User },
            };
            let issued = TokenService::mint(&claims, "prop_secret", Duration::seconds(ttl))?;
            let verified = TokenService::verify(&issued.token, "prop_secret")?;
            prop_assert_eq!(verified, claims);
        }

        #[test]
        fn prop_random_strings_are_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let service = test_token_service();
            prop_assert!(service.validate_access_token(&malformed).is_err());
        }
    }
}
