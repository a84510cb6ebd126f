//! Provider configuration
//!
//! An explicit configuration object handed to client construction; there
//! is no process-wide provider state.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// AWS region resources are managed in (e.g., "us-east-1")
    pub region: String,
}

impl ProviderConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_json() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"region": "ap-northeast-1"}"#).unwrap();
        assert_eq!(config.region, "ap-northeast-1");
    }
}
