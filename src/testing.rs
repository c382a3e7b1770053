// ABOUTME: In-memory fakes for the control plane and SQL connector, plus fixtures
// ABOUTME: Records every call so tests can assert on ordering and absence of side effects

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::config::ProductionDatabaseConfig;
use crate::mysql::{SqlConnector, SqlSession};
use crate::rds::{is_transitional, ControlPlane, DbInstance, Endpoint, SnapshotReference};
use crate::whitelist::IdentifierWhitelist;

pub fn whitelist(pairs: &[(&str, &str)]) -> Arc<IdentifierWhitelist> {
    Arc::new(
        IdentifierWhitelist::new(
            pairs
                .iter()
                .map(|(p, d)| (p.to_string(), d.to_string()))
                .collect(),
        )
        .unwrap(),
    )
}

pub fn production_config(instance: &str, db_names: &[&str]) -> ProductionDatabaseConfig {
    ProductionDatabaseConfig {
        instance_identifier: instance.to_string(),
        db_names: db_names.iter().map(|s| s.to_string()).collect(),
        password: "prod-secret".to_string(),
        dev_username: "reader".to_string(),
        dev_password: "dev-secret".to_string(),
    }
}

/// Write an executable shell script standing in for mysqldump.
pub fn fake_dump_program(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-mysqldump");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeInstance(String),
    DeleteInstance(String),
    WaitForDeleted(String),
    WaitForAvailable(String),
    WaitForSettled(String),
    DescribeSnapshots(String),
    Restore {
        snapshot: String,
        instance: String,
        instance_class: String,
    },
    ModifyMasterPassword {
        instance: String,
        password: String,
        security_groups: Vec<String>,
    },
}

#[derive(Default)]
struct ControlPlaneState {
    instances: HashMap<String, DbInstance>,
    snapshots: HashMap<String, Vec<SnapshotReference>>,
    calls: Vec<Call>,
    failing_operation: Option<&'static str>,
}

#[derive(Default, Clone)]
pub struct FakeControlPlane {
    state: Arc<Mutex<ControlPlaneState>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&self, identifier: &str, status: &str) {
        let instance = fake_instance(identifier, status);
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(identifier.to_string(), instance);
    }

    pub fn set_snapshots(&self, production: &str, snapshots: &[&str]) {
        let snapshots = snapshots
            .iter()
            .map(|id| SnapshotReference {
                identifier: id.to_string(),
                status: Some("available".to_string()),
                created_at: None,
            })
            .collect();
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(production.to_string(), snapshots);
    }

    /// Make the named trait operation return an error.
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().failing_operation = Some(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn has_instance(&self, identifier: &str) -> bool {
        self.state.lock().unwrap().instances.contains_key(identifier)
    }

    fn record(&self, operation: &'static str, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing_operation == Some(operation) {
            anyhow::bail!("injected {} failure", operation);
        }
        Ok(())
    }
}

fn fake_instance(identifier: &str, status: &str) -> DbInstance {
    DbInstance {
        identifier: identifier.to_string(),
        status: status.to_string(),
        endpoint: Some(Endpoint::new(format!("{}.fake.rds.local", identifier), None)),
        master_username: Some("admin".to_string()),
    }
}

impl ControlPlane for FakeControlPlane {
    async fn describe_instance(&self, identifier: &str) -> Result<Option<DbInstance>> {
        self.record(
            "describe_instance",
            Call::DescribeInstance(identifier.to_string()),
        )?;
        Ok(self.state.lock().unwrap().instances.get(identifier).cloned())
    }

    async fn delete_instance(&self, identifier: &str) -> Result<()> {
        self.record("delete_instance", Call::DeleteInstance(identifier.to_string()))?;
        self.state.lock().unwrap().instances.remove(identifier);
        Ok(())
    }

    async fn wait_for_deleted(&self, identifier: &str) -> Result<()> {
        self.record("wait_for_deleted", Call::WaitForDeleted(identifier.to_string()))?;
        self.state.lock().unwrap().instances.remove(identifier);
        Ok(())
    }

    async fn wait_for_available(&self, identifier: &str) -> Result<()> {
        self.record(
            "wait_for_available",
            Call::WaitForAvailable(identifier.to_string()),
        )?;
        if let Some(instance) = self.state.lock().unwrap().instances.get_mut(identifier) {
            if !is_transitional(&instance.status) && !instance.is_available() {
                anyhow::bail!(
                    "Instance {} entered state '{}' and will never become available",
                    identifier,
                    instance.status
                );
            }
            instance.status = "available".to_string();
        }
        Ok(())
    }

    async fn wait_for_settled(&self, identifier: &str) -> Result<()> {
        self.record("wait_for_settled", Call::WaitForSettled(identifier.to_string()))?;
        if let Some(instance) = self.state.lock().unwrap().instances.get_mut(identifier) {
            if is_transitional(&instance.status) {
                instance.status = "available".to_string();
            }
        }
        Ok(())
    }

    async fn describe_snapshots(&self, identifier: &str) -> Result<Vec<SnapshotReference>> {
        self.record(
            "describe_snapshots",
            Call::DescribeSnapshots(identifier.to_string()),
        )?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .snapshots
            .get(identifier)
            .cloned()
            .unwrap_or_default())
    }

    async fn restore_from_snapshot(
        &self,
        snapshot_identifier: &str,
        new_identifier: &str,
        instance_class: &str,
    ) -> Result<()> {
        self.record(
            "restore_from_snapshot",
            Call::Restore {
                snapshot: snapshot_identifier.to_string(),
                instance: new_identifier.to_string(),
                instance_class: instance_class.to_string(),
            },
        )?;
        let mut state = self.state.lock().unwrap();
        if state.instances.contains_key(new_identifier) {
            anyhow::bail!("DBInstanceAlreadyExists: {}", new_identifier);
        }
        state.instances.insert(
            new_identifier.to_string(),
            fake_instance(new_identifier, "creating"),
        );
        Ok(())
    }

    async fn modify_master_password(
        &self,
        identifier: &str,
        master_password: &str,
        security_groups: &[&str],
    ) -> Result<String> {
        self.record(
            "modify_master_password",
            Call::ModifyMasterPassword {
                instance: identifier.to_string(),
                password: master_password.to_string(),
                security_groups: security_groups.iter().map(|s| s.to_string()).collect(),
            },
        )?;
        Ok("admin".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlEvent {
    Execute(String),
    Commit,
}

#[derive(Default)]
struct ConnectorState {
    /// (username, password) -> refusals remaining before the login works
    accepted: HashMap<(String, String), u32>,
    connect_attempts: u32,
    events: Vec<SqlEvent>,
    failing_statement: Option<String>,
    no_backslash_escapes: bool,
}

#[derive(Default, Clone)]
pub struct FakeConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, username: &str, password: &str) {
        self.accept_after(username, password, 0);
    }

    /// Refuse the first `refusals` logins with these credentials, then accept.
    pub fn accept_after(&self, username: &str, password: &str, refusals: u32) {
        self.state
            .lock()
            .unwrap()
            .accepted
            .insert((username.to_string(), password.to_string()), refusals);
    }

    pub fn fail_statements_containing(&self, fragment: &str) {
        self.state.lock().unwrap().failing_statement = Some(fragment.to_string());
    }

    pub fn set_no_backslash_escapes(&self, enabled: bool) {
        self.state.lock().unwrap().no_backslash_escapes = enabled;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn sql_events(&self) -> Vec<SqlEvent> {
        self.state.lock().unwrap().events.clone()
    }
}

impl SqlConnector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, endpoint: &Endpoint, username: &str, password: &str) -> Result<FakeSession> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        match state
            .accepted
            .get_mut(&(username.to_string(), password.to_string()))
        {
            Some(0) => Ok(FakeSession {
                state: self.state.clone(),
            }),
            Some(refusals) => {
                *refusals -= 1;
                anyhow::bail!("Access denied for user '{}' on {}", username, endpoint.host)
            }
            None => anyhow::bail!("Access denied for user '{}' on {}", username, endpoint.host),
        }
    }
}

pub struct FakeSession {
    state: Arc<Mutex<ConnectorState>>,
}

impl SqlSession for FakeSession {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(SqlEvent::Execute(statement.to_string()));
        if let Some(fragment) = &state.failing_statement {
            if statement.contains(fragment.as_str()) {
                anyhow::bail!("statement failed: {}", statement);
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.state.lock().unwrap().events.push(SqlEvent::Commit);
        Ok(())
    }

    async fn no_backslash_escapes(&mut self) -> Result<bool> {
        Ok(self.state.lock().unwrap().no_backslash_escapes)
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}
