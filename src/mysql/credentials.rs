// ABOUTME: Replaces production credentials on a restored clone with a read-only user
// ABOUTME: Waits for the reset master password to take effect, then issues CREATE USER and GRANTs

use mysql_async::Value;
use tracing::{error, info, warn};

use super::connector::{SqlConnector, SqlSession};
use super::probe::can_connect;
use crate::error::CarbonCopyError;
use crate::rds::Endpoint;
use crate::wait::{Exhaustion, RetryPolicy};

/// Master account of a restored instance.
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

pub struct CredentialRotator<'a, S> {
    connector: &'a S,
    policy: &'a RetryPolicy,
}

impl<'a, S: SqlConnector> CredentialRotator<'a, S> {
    pub fn new(connector: &'a S, policy: &'a RetryPolicy) -> Self {
        Self { connector, policy }
    }

    /// Create `new_username` with read-only grants on every schema and return
    /// its name once all statements have been committed.
    pub async fn rotate(
        &self,
        admin: &AdminCredentials,
        endpoint: &Endpoint,
        new_username: &str,
        new_password: &str,
    ) -> Result<String, CarbonCopyError> {
        info!(
            host = %endpoint.host,
            username = %new_username,
            "Adding read-only database credentials, this may take some time"
        );

        self.wait_for_admin_access(admin, endpoint).await?;

        let rotation_error = |source: anyhow::Error| {
            error!(host = %endpoint.host, error = ?source, "Failed to alter database credentials");
            CarbonCopyError::Rotation {
                host: endpoint.host.clone(),
                source,
            }
        };

        let mut session = self
            .connector
            .connect(endpoint, &admin.username, &admin.password)
            .await
            .map_err(rotation_error)?;

        let no_backslash_escapes = session
            .no_backslash_escapes()
            .await
            .map_err(rotation_error)?;

        for statement in read_only_user_statements(new_username, new_password, no_backslash_escapes) {
            session.execute(&statement).await.map_err(rotation_error)?;
            session.commit().await.map_err(rotation_error)?;
        }

        if let Err(e) = session.close().await {
            warn!(host = %endpoint.host, error = %e, "Admin session did not close cleanly");
        }

        info!(host = %endpoint.host, username = %new_username, "Finished adding read-only user");
        Ok(new_username.to_string())
    }

    async fn wait_for_admin_access(
        &self,
        admin: &AdminCredentials,
        endpoint: &Endpoint,
    ) -> Result<(), CarbonCopyError> {
        for attempt in 1..=self.policy.max_attempts {
            if can_connect(self.connector, endpoint, &admin.username, &admin.password).await {
                info!(host = %endpoint.host, attempt, "Admin credentials accepted");
                return Ok(());
            }
            if attempt < self.policy.max_attempts {
                info!(
                    host = %endpoint.host,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    retry_in_secs = self.policy.interval.as_secs(),
                    "Admin credentials not accepted yet"
                );
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        match self.policy.on_exhausted {
            Exhaustion::Fail => Err(CarbonCopyError::Connectivity {
                host: endpoint.host.clone(),
                username: admin.username.clone(),
                attempts: self.policy.max_attempts,
            }),
            Exhaustion::Proceed => {
                warn!(
                    host = %endpoint.host,
                    attempts = self.policy.max_attempts,
                    "Admin credentials never confirmed, attempting rotation anyway"
                );
                Ok(())
            }
        }
    }
}

/// Statements that create the read-only user, in execution order.
/// `no_backslash_escapes` must match the sql_mode of the session that runs them.
pub fn read_only_user_statements(
    username: &str,
    password: &str,
    no_backslash_escapes: bool,
) -> [String; 3] {
    let quote = |value: &str| Value::Bytes(value.as_bytes().to_vec()).as_sql(no_backslash_escapes);
    let user = quote(username);
    [
        format!("CREATE USER {}@'%' IDENTIFIED BY {}", user, quote(password)),
        format!("GRANT SELECT ON *.* TO {}@'%'", user),
        format!("GRANT SHOW VIEW ON *.* TO {}@'%'", user),
    ]
}
