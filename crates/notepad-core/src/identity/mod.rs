//! Anonymous identity providers.
//!
//! Every store operation is scoped to the identity established at startup.

mod device;
mod supabase;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use device::DeviceIdentityProvider;
pub use supabase::{
    normalize_auth_url, resolve_optional_supabase_config, AuthSession, AuthUser,
    FileSessionStore, SessionPersistence, SupabaseIdentityProvider,
};

/// A stable anonymous user identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Session storage error: {0}")]
    Storage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Supplies the identity a session is scoped to.
///
/// Implementations establish an anonymous identity when none exists yet and
/// return the same identity on later calls.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self) -> AuthResult<Identity>;
}
