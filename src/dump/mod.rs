// ABOUTME: Supervised mysqldump runs against a sanitized development clone
// ABOUTME: Polls the child to completion and kills it on every failure path

mod process;

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use indicatif::HumanBytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{CarbonCopyError, DumpFailure};
use crate::provision::DevelopmentDatabaseDescriptor;
use crate::whitelist::IdentifierWhitelist;

use process::DumpProcess;

pub const DEFAULT_OUTPUT_DIR: &str = "/backups/databases";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DumpSettings {
    /// mysqldump executable
    pub program: PathBuf,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    /// None waits for the process however long it takes.
    pub timeout: Option<Duration>,
    /// Date stamped into dump file names.
    pub today: fn() -> NaiveDate,
}

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// `{output_dir}/{instance}.{database}.{YYYY-MM-DD}.sql`
pub fn dump_path(output_dir: &Path, instance: &str, database: &str, date: NaiveDate) -> PathBuf {
    output_dir.join(format!(
        "{}.{}.{}.sql",
        instance,
        database,
        date.format("%Y-%m-%d")
    ))
}

async fn bytes_written(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

pub struct DumpSupervisor {
    settings: DumpSettings,
    whitelist: Arc<IdentifierWhitelist>,
    cancel: CancellationToken,
}

impl DumpSupervisor {
    pub fn new(
        settings: DumpSettings,
        whitelist: Arc<IdentifierWhitelist>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            whitelist,
            cancel,
        }
    }

    /// Dump one logical database from the clone described by `descriptor`.
    ///
    /// A failed dump leaves whatever was written at the returned path's
    /// location; only an `Ok` means the file is complete.
    pub async fn dump(
        &self,
        descriptor: &DevelopmentDatabaseDescriptor,
        database: &str,
    ) -> Result<PathBuf, CarbonCopyError> {
        if self.whitelist.is_production(&descriptor.instance_identifier) {
            error!(
                instance = %descriptor.instance_identifier,
                "Will not generate dump directly from a production database"
            );
            return Err(CarbonCopyError::ProductionTarget(
                descriptor.instance_identifier.clone(),
            ));
        }

        let path = dump_path(
            &self.settings.output_dir,
            &descriptor.instance_identifier,
            database,
            (self.settings.today)(),
        );
        let failed = |reason: DumpFailure| CarbonCopyError::DumpProcess {
            database: database.to_string(),
            path: path.clone(),
            reason,
        };

        info!(
            instance = %descriptor.instance_identifier,
            database = %database,
            path = %path.display(),
            "Dumping database to file"
        );

        let mut process = DumpProcess::spawn(&self.settings.program, descriptor, database, &path)
            .await
            .map_err(failed)?;

        match self.poll_until_exit(&mut process, &path).await {
            Ok(status) if status.success() => {
                info!(
                    database = %database,
                    path = %path.display(),
                    size = %HumanBytes(bytes_written(&path).await),
                    "Dump complete"
                );
                Ok(path)
            }
            Ok(status) => {
                error!(
                    database = %database,
                    path = %path.display(),
                    code = ?status.code(),
                    written = %HumanBytes(bytes_written(&path).await),
                    "Dump process failed, output is incomplete"
                );
                Err(failed(DumpFailure::Exited {
                    code: status.code(),
                }))
            }
            Err(reason) => {
                process.terminate().await;
                error!(
                    database = %database,
                    path = %path.display(),
                    written = %HumanBytes(bytes_written(&path).await),
                    error = %reason,
                    "Dump aborted, process terminated and output is incomplete"
                );
                Err(failed(reason))
            }
        }
    }

    async fn poll_until_exit(
        &self,
        process: &mut DumpProcess,
        path: &Path,
    ) -> Result<ExitStatus, DumpFailure> {
        let started = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(DumpFailure::Cancelled),
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }

            if let Some(status) = process.try_wait().map_err(DumpFailure::Io)? {
                return Ok(status);
            }

            debug!(
                path = %path.display(),
                written = %HumanBytes(bytes_written(path).await),
                "Dump in progress"
            );

            if let Some(limit) = self.settings.timeout {
                if started.elapsed() >= limit {
                    return Err(DumpFailure::TimedOut(limit));
                }
            }
        }
    }
}
