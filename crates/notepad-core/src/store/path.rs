//! Collection addressing.

use std::fmt;

use crate::error::{Error, Result};
use crate::identity::Identity;

/// Path of a notes collection, namespaced per application and identity:
/// `artifacts/{app_id}/users/{identity}/notes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Build the notes collection path for an application and identity.
    pub fn notes(app_id: &str, identity: &Identity) -> Result<Self> {
        let app_id = validate_segment(app_id, "application id")?;
        let user = validate_segment(identity.as_str(), "identity")?;
        Ok(Self(format!("artifacts/{app_id}/users/{user}/notes")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{field} must not be empty")));
    }
    if value.contains('/') {
        return Err(Error::InvalidInput(format!(
            "{field} must not contain '/': {value}"
        )));
    }
    Ok(value)
}
