// ABOUTME: Connectivity probe for a set of MySQL credentials
// ABOUTME: Reports ordinary auth and network failures as `false`, never as an error

use tracing::{debug, warn};

use super::connector::{SqlConnector, SqlSession};
use crate::rds::Endpoint;

pub async fn can_connect<S: SqlConnector>(
    connector: &S,
    endpoint: &Endpoint,
    username: &str,
    password: &str,
) -> bool {
    match connector.connect(endpoint, username, password).await {
        Ok(session) => {
            if let Err(e) = session.close().await {
                warn!(host = %endpoint.host, error = %e, "Probe connection did not close cleanly");
            }
            debug!(host = %endpoint.host, username = %username, "Credentials accepted");
            true
        }
        Err(e) => {
            debug!(host = %endpoint.host, username = %username, error = %e, "Credentials not usable");
            false
        }
    }
}
