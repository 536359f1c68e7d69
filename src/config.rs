use serde::Deserialize;
use std::time::Duration;

/// Request code handed to the provider with every purchase flow.
pub const DEFAULT_REQUEST_TOKEN: u32 = 250_102_680;

/// Runtime settings of a [`BillingCoordinator`](crate::application::coordinator::BillingCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Public key of the store listing, passed to provider setup.
    pub public_key: String,
    pub request_token: u32,
    /// How long a fetched catalog may be served from cache. Unset means until invalidated.
    pub catalog_ttl_secs: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            request_token: DEFAULT_REQUEST_TOKEN,
            catalog_ttl_secs: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn catalog_ttl(&self) -> Option<Duration> {
        self.catalog_ttl_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: CoordinatorConfig = serde_json::from_str(r#"{ "public_key": "MIIB" }"#).unwrap();
        assert_eq!(config.public_key, "MIIB");
        assert_eq!(config.request_token, DEFAULT_REQUEST_TOKEN);
        assert_eq!(config.catalog_ttl(), None);
    }

    #[test]
    fn test_catalog_ttl() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{ "catalog_ttl_secs": 300 }"#).unwrap();
        assert_eq!(config.catalog_ttl(), Some(Duration::from_secs(300)));
    }
}
