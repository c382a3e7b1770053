// ABOUTME: Plain data returned by the RDS control plane
// ABOUTME: Decoupled from aws-sdk-rds types so the provisioner can be tested with fakes

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port: port.unwrap_or(DEFAULT_MYSQL_PORT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbInstance {
    pub identifier: String,
    pub status: String, // "creating", "available", "modifying", "deleting", ...
    pub endpoint: Option<Endpoint>,
    pub master_username: Option<String>,
}

impl DbInstance {
    pub fn is_available(&self) -> bool {
        self.status == "available"
    }
}

/// A snapshot as listed by the control plane. Listing order is trusted: the
/// last entry is the most recent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReference {
    pub identifier: String,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

/// Instance states after which an "available" wait can never succeed.
pub const TERMINAL_FAILURE_STATES: &[&str] = &[
    "deleted",
    "deleting",
    "failed",
    "incompatible-restore",
    "incompatible-parameters",
    "incompatible-network",
    "inaccessible-encryption-credentials",
];

pub fn is_terminal_failure(status: &str) -> bool {
    TERMINAL_FAILURE_STATES.contains(&status)
}

/// States RDS passes through on its own. Deletes are rejected while an
/// instance is in one of them; every other state accepts a delete.
pub const TRANSITIONAL_STATES: &[&str] = &[
    "backing-up",
    "configuring-enhanced-monitoring",
    "configuring-iam-database-auth",
    "configuring-log-exports",
    "converting-to-vpc",
    "creating",
    "maintenance",
    "modifying",
    "moving-to-vpc",
    "rebooting",
    "renaming",
    "resetting-master-credentials",
    "starting",
    "stopping",
    "storage-optimization",
    "upgrading",
];

pub fn is_transitional(status: &str) -> bool {
    TRANSITIONAL_STATES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults_to_mysql_port() {
        assert_eq!(Endpoint::new("db.example.com", None).port, 3306);
        assert_eq!(Endpoint::new("db.example.com", Some(3307)).port, 3307);
    }

    #[test]
    fn test_terminal_states() {
        assert!(is_terminal_failure("incompatible-restore"));
        assert!(!is_terminal_failure("creating"));
        assert!(!is_terminal_failure("resetting-master-credentials"));
    }

    #[test]
    fn test_transitional_states() {
        assert!(is_transitional("creating"));
        assert!(is_transitional("stopping"));
        for settled in ["available", "stopped", "failed", "incompatible-restore", "storage-full"] {
            assert!(!is_transitional(settled), "{settled}");
        }
    }
}
