use http::HeaderMap;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const TOKEN_HEADER: &str = "x-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No secret configured. Operational fault, not the caller's.
    #[error("server misconfiguration")]
    ServerMisconfigured,
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
}

/// Shared-secret check for the ingestion endpoints.
#[derive(Clone)]
pub struct TokenGate {
    secret: Option<String>,
}

impl std::fmt::Debug for TokenGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl TokenGate {
    /// An empty secret is treated as unconfigured.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(secret) = self.secret.as_deref() else {
            return Err(AuthError::ServerMisconfigured);
        };
        let Some(presented) = headers.get(TOKEN_HEADER) else {
            return Err(AuthError::MissingToken);
        };

        if bool::from(presented.as_bytes().ct_eq(secret.as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}
