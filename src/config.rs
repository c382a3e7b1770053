// ABOUTME: Job configuration loaded from the JSON config file
// ABOUTME: Lists production instances, their logical databases and credentials

use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::error::CarbonCopyError;

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub databases: Vec<ProductionDatabaseConfig>,
}

/// One production instance to clone, as written in the job file.
#[derive(Clone, Deserialize)]
pub struct ProductionDatabaseConfig {
    #[serde(rename = "InstanceIdentifier")]
    pub instance_identifier: String,
    #[serde(rename = "DBName")]
    pub db_names: Vec<String>,
    /// Production master password; forced onto the clone so it can be rotated.
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "DevUsername")]
    pub dev_username: String,
    #[serde(rename = "DevPassword")]
    pub dev_password: String,
}

impl fmt::Debug for ProductionDatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductionDatabaseConfig")
            .field("instance_identifier", &self.instance_identifier)
            .field("db_names", &self.db_names)
            .field("password", &"<redacted>")
            .field("dev_username", &self.dev_username)
            .field("dev_password", &"<redacted>")
            .finish()
    }
}

impl JobConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: JobConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;

        info!(
            path = %path.display(),
            hosts = config.databases.len(),
            "Loaded job configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), CarbonCopyError> {
        for database in &self.databases {
            if database.instance_identifier.trim().is_empty() {
                return Err(CarbonCopyError::Config(
                    "InstanceIdentifier must not be empty".to_string(),
                ));
            }
            if database.dev_username.trim().is_empty() {
                return Err(CarbonCopyError::Config(format!(
                    "DevUsername for '{}' must not be empty",
                    database.instance_identifier
                )));
            }
            if let Some(name) = database
                .db_names
                .iter()
                .find(|name| name.is_empty() || name.starts_with('-') || name.contains('/'))
            {
                return Err(CarbonCopyError::Config(format!(
                    "invalid DBName '{}' for '{}'",
                    name, database.instance_identifier
                )));
            }
        }
        Ok(())
    }
}
