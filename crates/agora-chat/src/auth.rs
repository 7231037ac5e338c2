use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use agora_types::api::{Claims, Identity};

use crate::error::{ChatError, Result};

/// The authentication oracle: validates a bearer credential and binds an
/// identity. Consulted once per HTTP request and once at WebSocket connect
/// time; credential issuance itself lives in the external identity service.
#[derive(Clone)]
pub struct AuthOracle {
    secret: String,
}

impl AuthOracle {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Bearer token -> bound identity. Any validation failure collapses to
    /// Unauthenticated; no detail leaks to the caller.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ChatError::Unauthenticated)?;

        Ok(Identity {
            user_id: data.claims.sub,
            username: data.claims.username,
        })
    }

    /// Mint a token for an identity. Used by the external credential issuer
    /// and by tests; the chat core itself never calls this on behalf of a
    /// client.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ChatError::Internal(e.into()))?;

        Ok(token)
    }
}
