//! Protocol detector implementation
//!
//! This module implements protocol detection by examining the first few bytes
//! of a connection. Detection is non-consuming: the dispatcher peeks the
//! prefix a detector asks for and hands it over as a byte slice, so the
//! downstream protocol server still sees the stream from position zero.

use log::trace;

use crate::common::Result;

/// HTTP methods accepted by [`HttpDetector`]
const HTTP_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// Protocol detector trait
///
/// A detector declares how many leading bytes it needs through
/// [`peek_len`](Detector::peek_len); the dispatcher peeks exactly that many
/// bytes (failing the connection if they cannot be obtained) and passes the
/// prefix to [`detect`](Detector::detect). Detectors must be pure: no side
/// effects, no state, the same prefix always yields the same answer.
pub trait Detector: Send + Sync {
    /// Number of leading bytes this detector needs to see
    fn peek_len(&self) -> usize;

    /// Decide whether the peeked prefix belongs to this protocol
    ///
    /// `prefix` is exactly [`peek_len`](Detector::peek_len) bytes long. An
    /// `Err` aborts classification of the connection entirely; `Ok(false)`
    /// lets the dispatcher move on to the next protocol in activation order.
    fn detect(&self, prefix: &[u8]) -> Result<bool>;
}

/// Detector built from a plain closure
///
/// Lets callers register a predicate without defining a type:
///
/// ```
/// use protomux::protocol::FnDetector;
///
/// // Match connections that open with a NUL byte.
/// let detector = FnDetector::new(1, |prefix| Ok(prefix[0] == 0));
/// ```
pub struct FnDetector<F> {
    peek_len: usize,
    f: F,
}

impl<F> FnDetector<F>
where
    F: Fn(&[u8]) -> Result<bool> + Send + Sync,
{
    /// Create a detector that peeks `peek_len` bytes and applies `f`
    pub fn new(peek_len: usize, f: F) -> Self {
        Self { peek_len, f }
    }
}

impl<F> Detector for FnDetector<F>
where
    F: Fn(&[u8]) -> Result<bool> + Send + Sync,
{
    fn peek_len(&self) -> usize {
        self.peek_len
    }

    fn detect(&self, prefix: &[u8]) -> Result<bool> {
        (self.f)(prefix)
    }
}

/// SOCKS5 detector
///
/// Matches when the first byte is the SOCKS version number 5.
#[derive(Debug, Clone, Copy, Default)]
pub struct Socks5Detector;

impl Detector for Socks5Detector {
    fn peek_len(&self) -> usize {
        1
    }

    fn detect(&self, prefix: &[u8]) -> Result<bool> {
        Ok(prefix[0] == 5)
    }
}

/// SOCKS4 detector
///
/// Matches when the first byte is the SOCKS version number 4.
#[derive(Debug, Clone, Copy, Default)]
pub struct Socks4Detector;

impl Detector for Socks4Detector {
    fn peek_len(&self) -> usize {
        1
    }

    fn detect(&self, prefix: &[u8]) -> Result<bool> {
        Ok(prefix[0] == 4)
    }
}

/// HTTPS/TLS detector
///
/// Matches when the first byte is 0x16, the TLS handshake record type a
/// ClientHello opens with.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpsDetector;

impl Detector for HttpsDetector {
    fn peek_len(&self) -> usize {
        1
    }

    fn detect(&self, prefix: &[u8]) -> Result<bool> {
        Ok(prefix[0] == 0x16)
    }
}

/// HTTP detector
///
/// Peeks 7 bytes (enough to cover the longest method names, CONNECT and
/// OPTIONS), takes the token up to the first space, uppercases it, and
/// matches if it is a known HTTP request method. Strict method validation
/// keeps this detector from swallowing arbitrary text protocols, but it is
/// still the most permissive of the defaults and should be activated last.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDetector;

impl Detector for HttpDetector {
    fn peek_len(&self) -> usize {
        7
    }

    fn detect(&self, prefix: &[u8]) -> Result<bool> {
        let text = String::from_utf8_lossy(prefix);
        let method = text
            .split(' ')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();

        trace!("HTTP detector saw method token {:?}", method);
        Ok(HTTP_METHODS.contains(&method.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks_detectors() {
        assert!(Socks5Detector.detect(&[5]).unwrap());
        assert!(!Socks5Detector.detect(&[4]).unwrap());

        assert!(Socks4Detector.detect(&[4]).unwrap());
        assert!(!Socks4Detector.detect(&[5]).unwrap());
    }

    #[test]
    fn test_https_detector() {
        assert!(HttpsDetector.detect(&[0x16]).unwrap());
        assert!(!HttpsDetector.detect(b"G").unwrap());
    }

    #[test]
    fn test_http_detector_accepts_known_methods() {
        assert!(HttpDetector.detect(b"GET / H").unwrap());
        assert!(HttpDetector.detect(b"OPTIONS").unwrap());
        assert!(HttpDetector.detect(b"put /ab").unwrap(), "methods are case-normalized");
        assert!(HttpDetector.detect(b"DELETE ").unwrap());
    }

    #[test]
    fn test_http_detector_rejects_non_http() {
        // SOCKS5 greeting bytes must never look like HTTP.
        assert!(!HttpDetector.detect(&[5, 1, 0, 0, 0, 0, 0]).unwrap());
        assert!(!HttpDetector.detect(b"FETCH /").unwrap());
        assert!(!HttpDetector.detect(b"\xff\xfe\x00\x01\x02\x03\x04").unwrap());
    }

    #[test]
    fn test_fn_detector() {
        let detector = FnDetector::new(2, |prefix| Ok(prefix == b"hi"));
        assert_eq!(detector.peek_len(), 2);
        assert!(detector.detect(b"hi").unwrap());
        assert!(!detector.detect(b"no").unwrap());
    }
}
