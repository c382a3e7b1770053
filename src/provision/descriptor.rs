// ABOUTME: Connection details of a provisioned development clone
// ABOUTME: Carries the development credentials only, never production ones

use std::fmt;

use crate::rds::Endpoint;

#[derive(Clone, PartialEq, Eq)]
pub struct DevelopmentDatabaseDescriptor {
    pub instance_identifier: String,
    pub endpoint: Endpoint,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DevelopmentDatabaseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevelopmentDatabaseDescriptor")
            .field("instance_identifier", &self.instance_identifier)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_password() {
        let descriptor = DevelopmentDatabaseDescriptor {
            instance_identifier: "dev-1".to_string(),
            endpoint: Endpoint::new("dev-1.local", None),
            username: "reader".to_string(),
            password: "dev-secret".to_string(),
        };
        let rendered = format!("{:?}", descriptor);
        assert!(rendered.contains("dev-1"));
        assert!(!rendered.contains("dev-secret"));
    }
}
