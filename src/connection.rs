use crate::errors::SeedError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER: &str = "127.0.0.1:27017";
pub const DEFAULT_AUTH_MECHANISM: &str = "SCRAM-SHA-1";
pub const DEFAULT_AUTH_DB: &str = "admin";

/// How to reach and authenticate against the document store.
///
/// Built once by the caller and shared by reference with both pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// `host:port`
    pub server: String,
    pub authentication_mechanism: Option<String>,
    pub use_tls: bool,
    pub allow_insecure_tls: bool,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub authentication_database: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            authentication_mechanism: Some(DEFAULT_AUTH_MECHANISM.to_string()),
            use_tls: false,
            allow_insecure_tls: false,
            username: None,
            password: None,
            authentication_database: None,
        }
    }
}

impl ConnectionSettings {
    pub fn new(server: impl Into<String>) -> Self {
        Self { server: server.into(), ..Self::default() }
    }

    /// Username if one is set and not blank.
    pub fn user(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }

    /// Split `server` into host and port.
    ///
    /// # Errors
    /// Returns `InvalidAddress` unless the value is exactly `host:port` with a numeric port.
    pub fn server_address(&self) -> Result<(String, u16), SeedError> {
        let mut parts = self.server.split(':');
        let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SeedError::InvalidAddress(self.server.clone()));
        };
        if host.is_empty() {
            return Err(SeedError::InvalidAddress(self.server.clone()));
        }
        let port = port.parse::<u16>().map_err(|_| SeedError::InvalidAddress(self.server.clone()))?;
        Ok((host.to_string(), port))
    }

    /// Checks the credential invariant: a username needs a password and an auth database.
    ///
    /// # Errors
    /// Returns `Config` when the server is blank or the credential is incomplete.
    pub fn validate(&self) -> Result<(), SeedError> {
        if self.server.trim().is_empty() {
            return Err(SeedError::Config("Missing server address".into()));
        }
        if self.user().is_some() {
            let missing = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
            if missing(&self.password) || missing(&self.authentication_database) {
                return Err(SeedError::Config("Missing password or authentication db".into()));
            }
        }
        Ok(())
    }
}
