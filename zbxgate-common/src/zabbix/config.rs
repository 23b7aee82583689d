use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Path of the JSON-RPC endpoint below the frontend base URL
const RPC_PATH: &str = "/api_jsonrpc.php";

/// Connection settings for the live Zabbix client
#[derive(Clone)]
pub struct ClientConfig {
    /// Frontend base URL, e.g. `https://zabbix.example.com/zabbix`
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pre-shared API token; makes `login` a no-op
    pub token: Option<String>,
    /// Per-call timeout (default: 30s)
    pub timeout: Duration,
    /// Maximum in-flight outbound calls (default: 8)
    pub max_concurrency: usize,
    /// Verify the server certificate (default: true)
    pub verify_tls: bool,
}

impl ClientConfig {
    /// Create a configuration with default settings
    ///
    /// Default configuration:
    /// - 30 second request timeout
    /// - 8 concurrent outbound calls
    /// - TLS verification enabled
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            token: None,
            timeout: Duration::from_secs(30),
            max_concurrency: 8,
            verify_tls: true,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, permits: usize) -> Self {
        self.max_concurrency = permits;
        self
    }

    #[must_use]
    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Full JSON-RPC endpoint URL
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), RPC_PATH)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Zabbix URL must start with http:// or https://: {url:?}"
            )));
        }

        if self.max_concurrency == 0 {
            return Err(Error::Config(
                "max concurrency must be at least 1".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".to_string()));
        }

        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::new("https://zbx.example.com/");

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrency, 8);
        assert!(config.verify_tls);
        assert_eq!(config.endpoint(), "https://zbx.example.com/api_jsonrpc.php");
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::new("http://127.0.0.1:8080/zabbix")
            .with_credentials("Admin", "zabbix")
            .with_max_concurrency(2)
            .with_timeout(Duration::from_secs(5))
            .with_tls_verification(false);

        assert_eq!(config.username.as_deref(), Some("Admin"));
        assert_eq!(config.max_concurrency, 2);
        assert!(!config.verify_tls);
        assert_eq!(config.endpoint(), "http://127.0.0.1:8080/zabbix/api_jsonrpc.php");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(ClientConfig::new("zbx.example.com").validate().is_err());
        assert!(ClientConfig::new("https://zbx")
            .with_max_concurrency(0)
            .validate()
            .is_err());
        assert!(ClientConfig::new("https://zbx")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ClientConfig::new("https://zbx")
            .with_credentials("Admin", "hunter2")
            .with_token("abcdef");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("abcdef"));
        assert!(rendered.contains("Admin"));
    }
}
