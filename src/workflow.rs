// ABOUTME: Top-level run over every configured production host
// ABOUTME: One clone per host, then one dump per logical database on that clone

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::JobConfig;
use crate::dump::DumpSupervisor;
use crate::error::CarbonCopyError;
use crate::mysql::SqlConnector;
use crate::provision::DevInstanceProvisioner;
use crate::rds::ControlPlane;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub dumps: Vec<PathBuf>,
}

pub struct WorkflowDriver<C, S> {
    provisioner: DevInstanceProvisioner<C, S>,
    dumper: DumpSupervisor,
    cancel: CancellationToken,
}

impl<C: ControlPlane, S: SqlConnector> WorkflowDriver<C, S> {
    pub fn new(
        provisioner: DevInstanceProvisioner<C, S>,
        dumper: DumpSupervisor,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provisioner,
            dumper,
            cancel,
        }
    }

    fn stop_if_cancelled(&self, next_step: impl FnOnce() -> String) -> Result<(), CarbonCopyError> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        let step = next_step();
        warn!(step = %step, "Run interrupted");
        Err(CarbonCopyError::Interrupted(step))
    }

    /// Process hosts in order. The first failure aborts the run; hosts after
    /// it are not attempted. Cancellation is checked before every clone and
    /// every dump.
    pub async fn run(&self, config: &JobConfig) -> Result<RunSummary, CarbonCopyError> {
        // Resolve everything up front so a bad entry late in the file cannot
        // leave earlier hosts rebuilt and later ones untouched.
        for host in &config.databases {
            self.provisioner.whitelist().resolve(&host.instance_identifier)?;
        }

        let mut summary = RunSummary::default();
        for host in &config.databases {
            self.stop_if_cancelled(|| format!("provisioning '{}'", host.instance_identifier))?;
            let descriptor = self.provisioner.provision(host).await?;
            for database in &host.db_names {
                self.stop_if_cancelled(|| format!("dumping '{}'", database))?;
                let path = self.dumper.dump(&descriptor, database).await?;
                summary.dumps.push(path);
            }
        }

        info!(
            hosts = config.databases.len(),
            dumps = summary.dumps.len(),
            "All dumps complete"
        );
        Ok(summary)
    }
}
