// Password hashing and validation service

use crate::auth::error::AuthError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::{error, warn};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// Argon2id cost parameters
///
/// Raising these makes every hash slower; stored hashes keep the parameters
/// they were created with, so old credentials still verify after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Password service for hashing and verification
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordService {
    /// Create a service with explicit Argon2id cost parameters
    pub fn with_cost(cost: HashCost) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| {
                error!("Invalid password hash parameters: {}", e);
                AuthError::PasswordHash
            })?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password using Argon2id with a fresh random salt
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Password hashing failed: {}", e);
                AuthError::PasswordHash
            })
    }

    /// Verify a password against a stored hash
    ///
    /// A malformed hash counts as a mismatch.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Validate password strength requirements
    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn fast_password_service() -> PasswordService {
    PasswordService::with_cost(HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_and_verify() {
        let service = fast_password_service();
        let hash = service.hash_password("pass1234").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password("pass1234", &hash));
        assert!(!service.verify_password("pass12345", &hash));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let service = fast_password_service();
        let first = service.hash_password("pass1234").unwrap();
        let second = service.hash_password("pass1234").unwrap();

        assert_ne!(first, second);
        assert!(service.verify_password("pass1234", &first));
        assert!(service.verify_password("pass1234", &second));
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        let service = fast_password_service();

        assert!(!service.verify_password("pass1234", ""));
        assert!(!service.verify_password("pass1234", "not-a-phc-string"));
        assert!(!service.verify_password("pass1234", "$2b$10$abcdefghijklmnopqrstuv"));
    }

    #[test]
    fn test_hash_made_with_other_cost_still_verifies() {
        let strong = PasswordService::with_cost(HashCost {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash_password("pass1234").unwrap();

        assert!(fast_password_service().verify_password("pass1234", &hash));
    }

    #[test]
    fn test_invalid_cost_is_rejected() {
        let result = PasswordService::with_cost(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::PasswordHash)));
    }

    #[test]
    fn test_password_strength() {
        assert!(PasswordService::validate_password_strength("abcd").is_ok());
        assert!(PasswordService::validate_password_strength("pass1234").is_ok());
        assert!(matches!(
            PasswordService::validate_password_strength("ab"),
            Err(AuthError::Validation(_))
        ));
        assert!(PasswordService::validate_password_strength("").is_err());
        // Length counts characters, not bytes
        assert!(PasswordService::validate_password_strength("äöü").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_hash_verifies_only_its_own_password(
            password in "[ -~]{4,32}",
            other in "[ -~]{4,32}"
        ) {
            let service = fast_password_service();
            let hash = service.hash_password(&password)?;

            prop_assert!(service.verify_password(&password, &hash));
            if other != password {
                prop_assert!(!service.verify_password(&other, &hash));
            }
        }
    }
}
