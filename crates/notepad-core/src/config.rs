//! Runtime configuration.
//!
//! Values come from an optional JSON file, then environment variables
//! override individual fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::resolve_optional_supabase_config;
use crate::util::normalize_text_option;

pub const CONFIG_FILE_NAME: &str = "notepad.json";
pub const DEFAULT_APP_ID: &str = "academic-notebook";

const DATABASE_FILE_NAME: &str = "notes.db";
const IDENTITY_FILE_NAME: &str = "identity.json";
const SESSION_FILE_NAME: &str = "session.json";

pub const ENV_APP_ID: &str = "NOTEPAD_APP_ID";
pub const ENV_DB_PATH: &str = "NOTEPAD_DB_PATH";
pub const ENV_SUPABASE_URL: &str = "NOTEPAD_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "NOTEPAD_SUPABASE_ANON_KEY";

/// Where the session's anonymous identity comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Identity minted and stored on this device
    Device,
    /// Supabase anonymous user
    Supabase { url: String, anon_key: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NotepadConfig {
    /// Namespace of the notes collection
    pub app_id: String,
    pub db_path: Option<PathBuf>,
    /// How long the "saved" indicator stays visible
    pub saved_indicator_ms: u64,
    /// How often live queries look for writes from other processes
    pub poll_interval_ms: u64,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub export_dir: Option<PathBuf>,
}

impl Default for NotepadConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            db_path: None,
            saved_indicator_ms: 1000,
            poll_interval_ms: 500,
            supabase_url: None,
            supabase_anon_key: None,
            export_dir: None,
        }
    }
}

impl NotepadConfig {
    /// `notepad.json` under the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("notepad").join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path` (or the default location) and apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|error| Error::Config(format!("invalid config {}: {error}", path.display())))
    }

    /// Apply overrides from a variable lookup; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| normalize_text_option(lookup(key));

        if let Some(app_id) = lookup(ENV_APP_ID) {
            self.app_id = app_id;
        }
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(url) = lookup(ENV_SUPABASE_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(anon_key) = lookup(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = Some(anon_key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let app_id = self.app_id.trim();
        if app_id.is_empty() || app_id.contains('/') {
            return Err(Error::Config(format!("invalid app_id: {:?}", self.app_id)));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        self.identity_source()?;
        Ok(())
    }

    /// Pick the identity provider: Supabase when both its URL and key are
    /// set, the device provider when neither is.
    pub fn identity_source(&self) -> Result<IdentitySource> {
        let resolved = resolve_optional_supabase_config(
            self.supabase_url.clone(),
            self.supabase_anon_key.clone(),
        )?;
        Ok(match resolved {
            Some((url, anon_key)) => IdentitySource::Supabase { url, anon_key },
            None => IdentitySource::Device,
        })
    }

    /// Database file, defaulting to `notes.db` in the data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Directory holding the database and identity files.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.db_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(default_data_dir, Path::to_path_buf)
    }

    #[must_use]
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir().join(IDENTITY_FILE_NAME)
    }

    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.data_dir().join(SESSION_FILE_NAME)
    }

    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    #[must_use]
    pub const fn saved_indicator(&self) -> Duration {
        Duration::from_millis(self.saved_indicator_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notepad")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = NotepadConfig::default();
        assert_eq!(config.app_id, "academic-notebook");
        assert_eq!(config.saved_indicator(), Duration::from_millis(1000));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.identity_source().unwrap(), IdentitySource::Device);
        assert!(config.db_path().ends_with("notepad/notes.db"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = NotepadConfig::load_file(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, NotepadConfig::default());
    }

    #[test]
    fn file_values_fill_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{ "app_id": "lab-notes", "saved_indicator_ms": 250, "export_dir": "/tmp/out" }"#,
        )
        .unwrap();

        let config = NotepadConfig::load_file(&path).unwrap();
        assert_eq!(config.app_id, "lab-notes");
        assert_eq!(config.saved_indicator_ms, 250);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "app": "typo" }"#).unwrap();

        assert!(matches!(
            NotepadConfig::load_file(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = NotepadConfig {
            app_id: "from-file".to_string(),
            ..NotepadConfig::default()
        };
        config.apply_overrides(env(&[
            (ENV_APP_ID, "from-env"),
            (ENV_DB_PATH, "/data/custom/notes.db"),
            (ENV_SUPABASE_URL, "  "),
        ]));

        assert_eq!(config.app_id, "from-env");
        assert_eq!(config.db_path(), PathBuf::from("/data/custom/notes.db"));
        assert_eq!(config.identity_path(), PathBuf::from("/data/custom/identity.json"));
        assert_eq!(config.supabase_url, None);
    }

    #[test]
    fn supabase_requires_url_and_key_together() {
        let mut config = NotepadConfig::default();
        config.apply_overrides(env(&[(ENV_SUPABASE_URL, "https://demo.supabase.co")]));
        assert!(config.validate().is_err());

        config.apply_overrides(env(&[(ENV_SUPABASE_ANON_KEY, "anon")]));
        assert_eq!(
            config.identity_source().unwrap(),
            IdentitySource::Supabase {
                url: "https://demo.supabase.co".to_string(),
                anon_key: "anon".to_string(),
            }
        );
    }

    #[test]
    fn invalid_values_fail_validation() {
        let config = NotepadConfig {
            app_id: "a/b".to_string(),
            ..NotepadConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NotepadConfig {
            poll_interval_ms: 0,
            ..NotepadConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
