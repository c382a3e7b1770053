// ABOUTME: Owns a running mysqldump child bound to one output file
// ABOUTME: The child is killed when terminated explicitly or when the handle is dropped

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

use crate::error::DumpFailure;
use crate::provision::DevelopmentDatabaseDescriptor;

pub(super) struct DumpProcess {
    child: Child,
    // Held open and never written so mysqldump cannot block on a closed stdin.
    _stdin: Option<ChildStdin>,
}

impl DumpProcess {
    pub(super) async fn spawn(
        program: &Path,
        descriptor: &DevelopmentDatabaseDescriptor,
        database: &str,
        output: &Path,
    ) -> Result<Self, DumpFailure> {
        let file = tokio::fs::File::create(output)
            .await
            .map_err(DumpFailure::Io)?
            .into_std()
            .await;

        let mut child = Command::new(program)
            .arg(format!("-h{}", descriptor.endpoint.host))
            .arg(format!("-P{}", descriptor.endpoint.port))
            .arg(format!("-u{}", descriptor.username))
            // Read by the MySQL client library; keeps the password out of argv.
            .env("MYSQL_PWD", &descriptor.password)
            .arg("--quick")
            .arg("--single-transaction")
            .arg(database)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(file))
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(DumpFailure::Spawn)?;

        debug!(pid = ?child.id(), database = %database, "Dump process started");

        let stdin = child.stdin.take();
        Ok(Self {
            child,
            _stdin: stdin,
        })
    }

    pub(super) fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Kill the process if it is still running and reap it.
    pub(super) async fn terminate(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        match self.child.kill().await {
            Ok(()) => debug!("Dump process terminated"),
            Err(e) => warn!(error = %e, "Failed to terminate dump process"),
        }
    }
}
