// ABOUTME: Development clone provisioning module
// ABOUTME: Rebuilds a sanitized copy of a production instance from its latest snapshot

pub mod descriptor;
pub mod provisioner;

pub use descriptor::DevelopmentDatabaseDescriptor;
pub use provisioner::{DevInstanceProvisioner, DEV_INSTANCE_CLASS, DEV_SECURITY_GROUPS};
