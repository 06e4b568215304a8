//! Backend credentials.
//!
//! # Example
//! ```yaml
//! auth:
//!   credentials_file: /etc/querybridge/credentials.json
//!   scopes:
//!     - https://www.googleapis.com/auth/monitoring.read
//! ```
//!
//! Leaving both fields empty disables authentication. Scopes without a
//! credentials file select the ambient credentials of the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default, deserialize_with = "empty_path_is_none")]
    pub credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl AuthConfig {
    pub fn is_anonymous(&self) -> bool {
        self.credentials_file.is_none() && self.scopes.is_empty()
    }
}

fn empty_path_is_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path: Option<String> = Option::deserialize(deserializer)?;
    Ok(path
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from))
}
