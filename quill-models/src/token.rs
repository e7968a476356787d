//! Signed, time-limited tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quill_core::{validation_error, ErrorContext, QuillConfig, QuillError, QuillResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Registered claims wrapped around a payload
#[derive(Debug, Serialize, Deserialize)]
struct Claims<T> {
    #[serde(flatten)]
    data: T,
    /// Issued at (timestamp)
    iat: i64,
    /// Expiration time (timestamp)
    exp: i64,
}

/// HS512 signer and verifier keyed by the application secret.
///
/// Tokens are JWTs whose claims are the payload's fields next to `iat` and
/// `exp`. Expiry is checked without leeway.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &QuillConfig) -> Self {
        Self::new(config.secret_key.as_bytes())
    }

    /// Sign `data`, valid for `ttl` from now.
    ///
    /// Fails with a validation error if the expiry is past the last
    /// representable timestamp.
    pub fn dumps<T: Serialize>(&self, data: &T, ttl: Duration) -> QuillResult<String> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| validation_error!("token lifetime is out of range", "ttl", "token"))?;
        let claims = Claims {
            data,
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding).map_err(|e| {
            QuillError::Internal {
                message: format!("Failed to sign token: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("token").with_operation("dumps"),
            }
        })
    }

    /// Verify `token` and return its payload, or `None` if it is malformed,
    /// expired, badly signed or carries a different payload shape.
    pub fn loads<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        match decode::<Claims<T>>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims.data),
            Err(e) => {
                debug!("Token rejected: {}", e);
                None
            }
        }
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS512)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}
