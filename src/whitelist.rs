// ABOUTME: Production-to-development instance identifier mapping
// ABOUTME: The only gate between a job configuration and destructive RDS calls

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use tracing::{error, info};

use crate::error::CarbonCopyError;

/// Explicit mapping of production instance identifiers to the development
/// identifiers that may be deleted and recreated on their behalf.
///
/// Lookups are exact and case-sensitive. A development identifier is never
/// allowed to also be a production key, so a resolved target can never point
/// back at production.
#[derive(Debug, Clone)]
pub struct IdentifierWhitelist {
    entries: HashMap<String, String>,
}

impl IdentifierWhitelist {
    pub fn new(entries: HashMap<String, String>) -> Result<Self, CarbonCopyError> {
        for (production, development) in &entries {
            if production.trim().is_empty() || development.trim().is_empty() {
                return Err(CarbonCopyError::Whitelist(
                    "instance identifiers must not be empty".to_string(),
                ));
            }
            if entries.contains_key(development) {
                return Err(CarbonCopyError::Whitelist(format!(
                    "'{}' maps to '{}', which is itself a production identifier",
                    production, development
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Load a whitelist from a JSON object of `"production": "development"` pairs.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read whitelist file {}", path.display()))?;
        let entries: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse whitelist file {}", path.display()))?;

        let whitelist = Self::new(entries)?;
        info!(
            path = %path.display(),
            entries = whitelist.len(),
            "Loaded instance whitelist"
        );
        Ok(whitelist)
    }

    pub fn resolve(&self, production_id: &str) -> Result<&str, CarbonCopyError> {
        match self.entries.get(production_id) {
            Some(development_id) => Ok(development_id.as_str()),
            None => {
                error!(
                    production_id = %production_id,
                    "Database identifier not in whitelist"
                );
                Err(CarbonCopyError::UnauthorizedIdentifier(
                    production_id.to_string(),
                ))
            }
        }
    }

    pub fn is_production(&self, instance_id: &str) -> bool {
        self.entries.contains_key(instance_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
