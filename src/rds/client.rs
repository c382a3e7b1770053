// ABOUTME: aws-sdk-rds backed implementation of the control plane
// ABOUTME: Handles instance lookup, delete, snapshot restore, password reset and state polling

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_rds::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::models::{is_terminal_failure, is_transitional, DbInstance, Endpoint, SnapshotReference};
use super::ControlPlane;
use crate::wait::{wait_for_resource, WaitConfig};

pub struct RdsClient {
    client: Client,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl RdsClient {
    /// Load AWS configuration from the environment. `region` overrides the
    /// region the default provider chain would pick.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        Self::from_client(Client::new(&config), WaitConfig::for_rds_instance())
    }

    pub fn from_client(client: Client, wait: WaitConfig) -> Self {
        Self {
            client,
            wait,
            cancel: None,
        }
    }

    /// Abort state waits once `cancel` fires. Requests already sent to RDS
    /// are not rolled back.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

fn to_model(instance: &aws_sdk_rds::types::DbInstance) -> DbInstance {
    let endpoint = instance.endpoint().and_then(|endpoint| {
        endpoint.address().map(|address| {
            Endpoint::new(address, endpoint.port().and_then(|p| u16::try_from(p).ok()))
        })
    });

    DbInstance {
        identifier: instance
            .db_instance_identifier()
            .unwrap_or_default()
            .to_string(),
        status: instance
            .db_instance_status()
            .unwrap_or("unknown")
            .to_string(),
        endpoint,
        master_username: instance.master_username().map(str::to_string),
    }
}

impl ControlPlane for RdsClient {
    async fn describe_instance(&self, identifier: &str) -> Result<Option<DbInstance>> {
        let response = self
            .client
            .describe_db_instances()
            .db_instance_identifier(identifier)
            .send()
            .await;

        match response {
            Ok(response) => Ok(response.db_instances().first().map(to_model)),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_db_instance_not_found_fault())
                    .unwrap_or(false);
                if not_found {
                    debug!(instance = %identifier, "Instance does not exist");
                    Ok(None)
                } else {
                    Err(anyhow::Error::from(e))
                        .with_context(|| format!("Failed to describe instance {}", identifier))
                }
            }
        }
    }

    async fn delete_instance(&self, identifier: &str) -> Result<()> {
        info!(instance = %identifier, "Deleting instance without final snapshot");

        self.client
            .delete_db_instance()
            .db_instance_identifier(identifier)
            .skip_final_snapshot(true)
            .send()
            .await
            .with_context(|| format!("Failed to delete instance {}", identifier))?;

        Ok(())
    }

    async fn wait_for_deleted(&self, identifier: &str) -> Result<()> {
        wait_for_resource(
            &self.wait,
            self.cancel.as_ref(),
            || async move {
                match self.describe_instance(identifier).await? {
                    None => Ok(true),
                    Some(instance) if instance.status == "deleted" => Ok(true),
                    Some(instance) => {
                        debug!(instance = %identifier, status = %instance.status, "Still deleting");
                        Ok(false)
                    }
                }
            },
            &format!("RDS instance {} deleted", identifier),
        )
        .await
    }

    async fn wait_for_available(&self, identifier: &str) -> Result<()> {
        wait_for_resource(
            &self.wait,
            self.cancel.as_ref(),
            || async move {
                let Some(instance) = self.describe_instance(identifier).await? else {
                    anyhow::bail!("Instance {} disappeared while waiting for it", identifier);
                };
                if instance.is_available() {
                    return Ok(true);
                }
                if is_terminal_failure(&instance.status) {
                    anyhow::bail!(
                        "Instance {} entered state '{}' and will never become available",
                        identifier,
                        instance.status
                    );
                }
                debug!(instance = %identifier, status = %instance.status, "Not available yet");
                Ok(false)
            },
            &format!("RDS instance {} available", identifier),
        )
        .await
    }

    async fn wait_for_settled(&self, identifier: &str) -> Result<()> {
        wait_for_resource(
            &self.wait,
            self.cancel.as_ref(),
            || async move {
                match self.describe_instance(identifier).await? {
                    Some(instance) if is_transitional(&instance.status) => {
                        debug!(instance = %identifier, status = %instance.status, "Still transitioning");
                        Ok(false)
                    }
                    _ => Ok(true),
                }
            },
            &format!("RDS instance {} settled", identifier),
        )
        .await
    }

    async fn describe_snapshots(&self, identifier: &str) -> Result<Vec<SnapshotReference>> {
        let mut snapshots = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_db_snapshots()
                .db_instance_identifier(identifier)
                .set_marker(marker.take())
                .send()
                .await
                .with_context(|| format!("Failed to list snapshots of {}", identifier))?;

            snapshots.extend(response.db_snapshots().iter().filter_map(|snapshot| {
                let id = snapshot.db_snapshot_identifier()?;
                Some(SnapshotReference {
                    identifier: id.to_string(),
                    status: snapshot.status().map(str::to_string),
                    created_at: snapshot
                        .snapshot_create_time()
                        .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0))
                        .map(|t| t.to_rfc3339()),
                })
            }));

            match response.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(instance = %identifier, count = snapshots.len(), "Listed snapshots");
        Ok(snapshots)
    }

    async fn restore_from_snapshot(
        &self,
        snapshot_identifier: &str,
        new_identifier: &str,
        instance_class: &str,
    ) -> Result<()> {
        info!(
            snapshot = %snapshot_identifier,
            instance = %new_identifier,
            instance_class = %instance_class,
            "Restoring instance from snapshot"
        );

        self.client
            .restore_db_instance_from_db_snapshot()
            .db_instance_identifier(new_identifier)
            .db_snapshot_identifier(snapshot_identifier)
            .db_instance_class(instance_class)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to restore {} from snapshot {}",
                    new_identifier, snapshot_identifier
                )
            })?;

        Ok(())
    }

    async fn modify_master_password(
        &self,
        identifier: &str,
        master_password: &str,
        security_groups: &[&str],
    ) -> Result<String> {
        let mut request = self
            .client
            .modify_db_instance()
            .db_instance_identifier(identifier)
            .master_user_password(master_password)
            .apply_immediately(true);
        for group in security_groups {
            request = request.db_security_groups(*group);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to modify instance {}", identifier))?;

        response
            .db_instance()
            .and_then(|instance| instance.master_username())
            .map(str::to_string)
            .with_context(|| format!("No master username returned for {}", identifier))
    }
}
