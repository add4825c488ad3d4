//! Client configuration.
//!
//! Built once, handed to a port at construction, never mutated afterwards.
//! Secrets are zeroized on drop and redacted from `Debug` output.

use std::fmt;
use zeroize::Zeroizing;

use crate::value_objects::MarketType;

/// Exchange connection configuration.
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    api_secret: Zeroizing<String>,
    password: Option<Zeroizing<String>>,
    testnet: bool,
    default_market_type: MarketType,
}

impl ClientConfig {
    /// Create a configuration for production swaps.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
            password: None,
            testnet: false,
            default_market_type: MarketType::default(),
        }
    }

    /// Set the API passphrase (required by some exchanges, e.g. Bitget).
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Route requests to the exchange's test/demo environment.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Set the default market family.
    pub fn with_market_type(mut self, market_type: MarketType) -> Self {
        self.default_market_type = market_type;
        self
    }

    /// API key (public identifier).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// API secret.
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// API passphrase, if set.
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.as_str())
    }

    /// Whether the test/demo environment is targeted.
    pub fn testnet(&self) -> bool {
        self.testnet
    }

    /// Default market family.
    pub fn default_market_type(&self) -> MarketType {
        self.default_market_type
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("testnet", &self.testnet)
            .field("default_market_type", &self.default_market_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("key", "secret")
            .with_password("pass")
            .with_testnet(true)
            .with_market_type(MarketType::Swap);

        assert_eq!(config.api_key(), "key");
        assert_eq!(config.api_secret(), "secret");
        assert_eq!(config.password(), Some("pass"));
        assert!(config.testnet());
        assert_eq!(config.default_market_type(), MarketType::Swap);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ClientConfig::new("key", "super-secret").with_password("hunter2");
        let debug = format!("{:?}", config);

        assert!(debug.contains("key"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("hunter2"));
    }
}
