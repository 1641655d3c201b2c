//! Detector registry
//!
//! Maps protocol names to detectors. A registry is owned by one
//! [`Dispatcher`](crate::Dispatcher) instance; several dispatchers in the
//! same process never share registration state.

use std::collections::HashMap;
use std::sync::Arc;

use super::detector::{Detector, HttpDetector, HttpsDetector, Socks4Detector, Socks5Detector};

/// Protocol name used by the default SOCKS5 detector
pub const SOCKS5: &str = "socks5";
/// Protocol name used by the default SOCKS4 detector
pub const SOCKS4: &str = "socks4";
/// Protocol name used by the default HTTPS/TLS detector
pub const HTTPS: &str = "https";
/// Protocol name used by the default HTTP detector
pub const HTTP: &str = "http";

/// Registry of protocol detectors, keyed by protocol name
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    detectors: HashMap<String, Arc<dyn Detector>>,
}

impl DetectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the default detectors
    ///
    /// Registers [`SOCKS5`], [`SOCKS4`], [`HTTPS`], and [`HTTP`]. Note that
    /// registration carries no priority: trial order is fixed by the order
    /// listeners are requested from the dispatcher.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SOCKS5, Socks5Detector);
        registry.register(SOCKS4, Socks4Detector);
        registry.register(HTTPS, HttpsDetector);
        registry.register(HTTP, HttpDetector);
        registry
    }

    /// Install a detector under `name`, replacing any previous registration
    pub fn register(&mut self, name: impl Into<String>, detector: impl Detector + 'static) {
        self.detectors.insert(name.into(), Arc::new(detector));
    }

    /// Look up the detector registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Detector>> {
        self.detectors.get(name).map(Arc::clone)
    }

    /// Whether a detector is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.detectors.contains_key(name)
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("protocols", &self.detectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FnDetector;

    #[test]
    fn test_defaults_registered() {
        let registry = DetectorRegistry::with_defaults();
        for name in [SOCKS5, SOCKS4, HTTPS, HTTP] {
            assert!(registry.contains(name), "missing default detector {}", name);
        }
        assert!(!registry.contains("gopher"));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = DetectorRegistry::with_defaults();
        registry.register(HTTP, FnDetector::new(1, |_| Ok(false)));

        let detector = registry.get(HTTP).unwrap();
        assert_eq!(detector.peek_len(), 1, "replacement detector should be in effect");
    }
}
