//! Protocol detection module
//!
//! This module provides functionality for detecting the protocol of a
//! connection by examining its first few bytes, the way NGINX and HAProxy
//! sniff protocols on a shared port. Detectors are pluggable trait objects
//! collected in a per-dispatcher registry.

mod detector;
mod registry;

pub use detector::{
    Detector, FnDetector, HttpDetector, HttpsDetector, Socks4Detector, Socks5Detector,
};
pub use registry::{DetectorRegistry, HTTP, HTTPS, SOCKS4, SOCKS5};
