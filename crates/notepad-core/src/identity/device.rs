//! Device-local anonymous identity.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, AuthResult, Identity, IdentityProvider};
use crate::util::normalize_text_option;

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    user_id: String,
}

/// Mints an anonymous id on first use and keeps it in a JSON file.
#[derive(Debug, Clone)]
pub struct DeviceIdentityProvider {
    path: PathBuf,
}

impl DeviceIdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AuthResult<Option<Identity>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|error| {
            AuthError::Storage(format!(
                "failed to read identity at {}: {error}",
                self.path.display()
            ))
        })?;
        let file = serde_json::from_str::<IdentityFile>(&raw)?;
        Ok(normalize_text_option(Some(file.user_id)).map(Identity::new))
    }

    fn store(&self, identity: &Identity) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AuthError::Storage(format!(
                    "failed to create identity directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
        let raw = serde_json::to_string_pretty(&IdentityFile {
            user_id: identity.as_str().to_string(),
        })?;
        std::fs::write(&self.path, raw).map_err(|error| {
            AuthError::Storage(format!(
                "failed to write identity at {}: {error}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl IdentityProvider for DeviceIdentityProvider {
    async fn identify(&self) -> AuthResult<Identity> {
        if let Some(identity) = self.load()? {
            tracing::debug!("Restored device identity {}", identity);
            return Ok(identity);
        }

        let identity = Identity::new(Uuid::now_v7().simple().to_string());
        self.store(&identity)?;
        tracing::info!("Created anonymous device identity {}", identity);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn identity_is_minted_once_and_reused() {
        let dir = tempdir().unwrap();
        let provider = DeviceIdentityProvider::new(dir.path().join("sub").join("identity.json"));

        let first = provider.identify().await.unwrap();
        let second = provider.identify().await.unwrap();
        assert_eq!(first, second);
        assert!(provider.path().exists());

        let other_instance = DeviceIdentityProvider::new(provider.path());
        assert_eq!(other_instance.identify().await.unwrap(), first);
    }

    #[tokio::test]
    async fn blank_identity_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, r#"{"user_id": "  "}"#).unwrap();

        let identity = DeviceIdentityProvider::new(&path).identify().await.unwrap();
        assert!(!identity.as_str().trim().is_empty());
    }

    #[tokio::test]
    async fn corrupt_identity_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "not json").unwrap();

        let result = DeviceIdentityProvider::new(&path).identify().await;
        assert!(matches!(result, Err(AuthError::Json(_))));
    }
}
