//! Dispatcher configuration
//!
//! Tuning knobs for the dispatch engine. The struct is serde-backed so
//! embedding applications can deserialize it from their own configuration
//! files; every field has a default and absent fields fall back to it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::{MuxError, Result};

/// Configuration for a [`Dispatcher`](crate::Dispatcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Upper bound, in milliseconds, on how long a single connection may
    /// take to classify (covering every peek across the activation order).
    ///
    /// `None` disables the deadline: a connection that withholds the bytes
    /// a detector needs can then hold its dispatch task open indefinitely,
    /// bounded only by the socket's own read behavior.
    pub detection_timeout_ms: Option<u64>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            detection_timeout_ms: None,
        }
    }
}

impl MuxConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.detection_timeout_ms {
            return Err(MuxError::Config(
                "detection_timeout_ms must be greater than zero (use null to disable)".to_string(),
            ));
        }
        Ok(())
    }

    /// The classification deadline as a [`Duration`], if one is configured
    pub fn detection_timeout(&self) -> Option<Duration> {
        self.detection_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_deadline() {
        let config = MuxConfig::default();
        assert_eq!(config.detection_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = MuxConfig {
            detection_timeout_ms: Some(0),
        };
        assert!(matches!(config.validate(), Err(MuxError::Config(_))));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: MuxConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MuxConfig::default());

        let config: MuxConfig = serde_json::from_str(r#"{"detection_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.detection_timeout(), Some(Duration::from_millis(250)));
    }
}
