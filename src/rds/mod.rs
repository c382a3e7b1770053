// ABOUTME: RDS control plane abstraction and its aws-sdk-rds implementation
// ABOUTME: Exposes describe/delete/restore/modify plus blocking state waits

mod client;
mod models;

pub use client::RdsClient;
pub use models::{is_transitional, DbInstance, Endpoint, SnapshotReference, DEFAULT_MYSQL_PORT};

use anyhow::Result;
use std::future::Future;

/// Operations on managed database instances that the provisioner relies on.
///
/// Every `wait_*` call blocks until the instance reaches the named state or
/// the implementation gives up. [`RdsClient`] also gives up once its
/// cancellation token fires.
pub trait ControlPlane: Send + Sync {
    /// `Ok(None)` when no instance exists with this identifier.
    fn describe_instance(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<DbInstance>>> + Send;

    /// Delete without taking a final snapshot.
    fn delete_instance(&self, identifier: &str) -> impl Future<Output = Result<()>> + Send;

    fn wait_for_deleted(&self, identifier: &str) -> impl Future<Output = Result<()>> + Send;

    fn wait_for_available(&self, identifier: &str) -> impl Future<Output = Result<()>> + Send;

    /// Wait until the instance leaves every transitional state, whatever it
    /// settles on (`available`, `stopped`, `failed`, ...).
    fn wait_for_settled(&self, identifier: &str) -> impl Future<Output = Result<()>> + Send;

    /// Snapshots of `identifier` in the provider's order (last = most recent).
    fn describe_snapshots(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Vec<SnapshotReference>>> + Send;

    fn restore_from_snapshot(
        &self,
        snapshot_identifier: &str,
        new_identifier: &str,
        instance_class: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Reset the master password and security groups; returns the master username.
    fn modify_master_password(
        &self,
        identifier: &str,
        master_password: &str,
        security_groups: &[&str],
    ) -> impl Future<Output = Result<String>> + Send;
}
