// ABOUTME: SQL connection seam and its mysql_async implementation
// ABOUTME: Lets the probe and the credential rotator run against fakes in tests

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder};

use crate::rds::Endpoint;

pub trait SqlSession: Send {
    fn execute(&mut self, statement: &str) -> impl Future<Output = Result<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the session's sql_mode disables backslash escapes in literals.
    fn no_backslash_escapes(&mut self) -> impl Future<Output = Result<bool>> + Send;

    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

pub trait SqlConnector: Send + Sync {
    type Session: SqlSession;

    fn connect(
        &self,
        endpoint: &Endpoint,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Self::Session>> + Send;
}

pub struct MySqlConnector {
    connect_timeout: Duration,
}

impl MySqlConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for MySqlConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl SqlConnector for MySqlConnector {
    type Session = MySqlSession;

    async fn connect(&self, endpoint: &Endpoint, username: &str, password: &str) -> Result<MySqlSession> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(endpoint.host.clone())
            .tcp_port(endpoint.port)
            .user(Some(username))
            .pass(Some(password));

        let conn = tokio::time::timeout(self.connect_timeout, Conn::new(opts))
            .await
            .with_context(|| {
                format!(
                    "Timed out connecting to {}:{} after {:?}",
                    endpoint.host, endpoint.port, self.connect_timeout
                )
            })?
            .with_context(|| {
                format!(
                    "Failed to connect to {}:{} as '{}'",
                    endpoint.host, endpoint.port, username
                )
            })?;

        Ok(MySqlSession { conn })
    }
}

pub struct MySqlSession {
    conn: Conn,
}

impl SqlSession for MySqlSession {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.conn
            .query_drop(statement)
            .await
            .context("Failed to execute statement")
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn
            .query_drop("COMMIT")
            .await
            .context("Failed to commit")
    }

    async fn no_backslash_escapes(&mut self) -> Result<bool> {
        let sql_mode: Option<String> = self
            .conn
            .query_first("SELECT @@SESSION.sql_mode")
            .await
            .context("Failed to read sql_mode")?;
        Ok(sql_mode.is_some_and(|mode| mode.split(',').any(|flag| flag == "NO_BACKSLASH_ESCAPES")))
    }

    async fn close(self) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .context("Failed to close connection")
    }
}
