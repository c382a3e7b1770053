// ABOUTME: Orchestrates delete-stale-clone, restore-from-snapshot and credential rotation
// ABOUTME: Never touches a production instance: every mutation targets the whitelisted dev identifier

use std::sync::Arc;

use tracing::{error, info, warn};

use super::descriptor::DevelopmentDatabaseDescriptor;
use crate::config::ProductionDatabaseConfig;
use crate::error::CarbonCopyError;
use crate::mysql::{can_connect, AdminCredentials, CredentialRotator, SqlConnector};
use crate::rds::{is_transitional, ControlPlane, SnapshotReference};
use crate::wait::RetryPolicy;
use crate::whitelist::IdentifierWhitelist;

/// Instance class for every development clone, whatever production runs on.
pub const DEV_INSTANCE_CLASS: &str = "db.m3.large";

pub const DEV_SECURITY_GROUPS: &[&str] = &["development-database"];

pub struct DevInstanceProvisioner<C, S> {
    control_plane: C,
    connector: S,
    whitelist: Arc<IdentifierWhitelist>,
    rotation_policy: RetryPolicy,
}

impl<C: ControlPlane, S: SqlConnector> DevInstanceProvisioner<C, S> {
    pub fn new(
        control_plane: C,
        connector: S,
        whitelist: Arc<IdentifierWhitelist>,
        rotation_policy: RetryPolicy,
    ) -> Self {
        Self {
            control_plane,
            connector,
            whitelist,
            rotation_policy,
        }
    }

    pub fn whitelist(&self) -> &IdentifierWhitelist {
        &self.whitelist
    }

    /// Build a fresh development copy of `config`'s production instance from
    /// its most recent snapshot and return credentials for the read-only user.
    ///
    /// Any previous clone at the development identifier is deleted first.
    pub async fn provision(
        &self,
        config: &ProductionDatabaseConfig,
    ) -> Result<DevelopmentDatabaseDescriptor, CarbonCopyError> {
        let production_id = config.instance_identifier.as_str();
        let dev_id = self.whitelist.resolve(production_id)?;

        info!(
            production = %production_id,
            development = %dev_id,
            "Creating an independent development database"
        );

        match self.build_clone(config, production_id, dev_id).await {
            Ok(descriptor) => {
                info!(
                    production = %production_id,
                    development = %dev_id,
                    host = %descriptor.endpoint.host,
                    "Development database ready"
                );
                Ok(descriptor)
            }
            Err(e) => {
                error!(
                    production = %production_id,
                    development = %dev_id,
                    error = %e,
                    "Failed to create development database"
                );
                Err(e)
            }
        }
    }

    async fn build_clone(
        &self,
        config: &ProductionDatabaseConfig,
        production_id: &str,
        dev_id: &str,
    ) -> Result<DevelopmentDatabaseDescriptor, CarbonCopyError> {
        self.remove_existing_clone(dev_id).await?;

        let snapshot = self.latest_snapshot(production_id).await?;
        self.restore_clone(&snapshot, dev_id).await?;

        let endpoint = self
            .control_plane
            .describe_instance(dev_id)
            .await
            .map_err(|e| CarbonCopyError::control_plane("describe_instance", dev_id, e))?
            .and_then(|instance| instance.endpoint)
            .ok_or_else(|| {
                CarbonCopyError::control_plane(
                    "describe_instance",
                    dev_id,
                    anyhow::anyhow!("restored instance has no endpoint"),
                )
            })?;

        let descriptor = DevelopmentDatabaseDescriptor {
            instance_identifier: dev_id.to_string(),
            endpoint,
            username: config.dev_username.clone(),
            password: config.dev_password.clone(),
        };

        if can_connect(
            &self.connector,
            &descriptor.endpoint,
            &descriptor.username,
            &descriptor.password,
        )
        .await
        {
            info!(
                development = %dev_id,
                username = %descriptor.username,
                "Development credentials already work, skipping rotation"
            );
            return Ok(descriptor);
        }

        let admin = self.reset_master_password(dev_id, &config.password).await?;
        CredentialRotator::new(&self.connector, &self.rotation_policy)
            .rotate(
                &admin,
                &descriptor.endpoint,
                &descriptor.username,
                &descriptor.password,
            )
            .await?;

        Ok(descriptor)
    }

    async fn remove_existing_clone(&self, dev_id: &str) -> Result<(), CarbonCopyError> {
        info!(development = %dev_id, "Checking if development database already exists");

        let existing = self
            .control_plane
            .describe_instance(dev_id)
            .await
            .map_err(|e| CarbonCopyError::control_plane("describe_instance", dev_id, e))?;

        let Some(existing) = existing else {
            info!(development = %dev_id, "Development database does not exist yet");
            return Ok(());
        };

        info!(
            development = %dev_id,
            status = %existing.status,
            "Deleting previous development database, this may take a few minutes"
        );
        warn!(development = %dev_id, "Not saving database to any snapshot");

        if existing.status != "deleting" {
            // Stopped and failed clones are deleted as they are; only an
            // instance RDS is still moving between states has to settle first.
            if is_transitional(&existing.status) {
                self.control_plane
                    .wait_for_settled(dev_id)
                    .await
                    .map_err(|e| CarbonCopyError::control_plane("wait_for_settled", dev_id, e))?;
            }
            self.control_plane
                .delete_instance(dev_id)
                .await
                .map_err(|e| CarbonCopyError::control_plane("delete_instance", dev_id, e))?;
        }

        self.control_plane
            .wait_for_deleted(dev_id)
            .await
            .map_err(|e| CarbonCopyError::control_plane("wait_for_deleted", dev_id, e))?;

        info!(development = %dev_id, "Database deleted successfully");
        Ok(())
    }

    async fn latest_snapshot(&self, production_id: &str) -> Result<SnapshotReference, CarbonCopyError> {
        let snapshots = self
            .control_plane
            .describe_snapshots(production_id)
            .await
            .map_err(|e| CarbonCopyError::control_plane("describe_snapshots", production_id, e))?;

        let snapshot = snapshots.into_iter().last().ok_or_else(|| {
            CarbonCopyError::control_plane(
                "describe_snapshots",
                production_id,
                anyhow::anyhow!("no snapshots exist for this instance"),
            )
        })?;

        info!(
            production = %production_id,
            snapshot = %snapshot.identifier,
            created_at = snapshot.created_at.as_deref().unwrap_or("unknown"),
            "Selected most recent snapshot"
        );
        Ok(snapshot)
    }

    async fn restore_clone(&self, snapshot: &SnapshotReference, dev_id: &str) -> Result<(), CarbonCopyError> {
        info!(
            development = %dev_id,
            snapshot = %snapshot.identifier,
            "Creating fresh development database from snapshot, this may take a few minutes"
        );

        self.control_plane
            .restore_from_snapshot(&snapshot.identifier, dev_id, DEV_INSTANCE_CLASS)
            .await
            .map_err(|e| CarbonCopyError::control_plane("restore_from_snapshot", dev_id, e))?;
        self.control_plane
            .wait_for_available(dev_id)
            .await
            .map_err(|e| CarbonCopyError::control_plane("wait_for_available", dev_id, e))?;

        info!(development = %dev_id, "Fresh development database created");
        Ok(())
    }

    async fn reset_master_password(
        &self,
        dev_id: &str,
        production_password: &str,
    ) -> Result<AdminCredentials, CarbonCopyError> {
        let username = self
            .control_plane
            .modify_master_password(dev_id, production_password, DEV_SECURITY_GROUPS)
            .await
            .map_err(|e| CarbonCopyError::control_plane("modify_master_password", dev_id, e))?;

        info!(
            development = %dev_id,
            admin = %username,
            "Reset admin password of development database to the production password"
        );

        Ok(AdminCredentials {
            username,
            password: production_password.to_string(),
        })
    }
}
