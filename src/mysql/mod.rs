// ABOUTME: MySQL connectivity utilities module
// ABOUTME: Connection seam, reachability probe and read-only user provisioning

pub mod connector;
pub mod credentials;
pub mod probe;

pub use connector::{MySqlConnector, SqlConnector, SqlSession};
pub use credentials::{read_only_user_statements, AdminCredentials, CredentialRotator};
pub use probe::can_connect;
