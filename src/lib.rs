//! Protomux: protocol-sniffing connection multiplexer
//!
//! Several independent protocol servers (an HTTP server, a TLS front end, a
//! SOCKS proxy) can share one listening endpoint: the dispatcher peeks at
//! the first bytes of each accepted connection without consuming them,
//! classifies it against the activated protocols in activation order, and
//! hands it to the matching synthetic listener with the byte stream intact
//! from position zero. Connections no detector claims are closed.
//!
//! Activation order is priority: request listeners for restrictive
//! protocols before permissive ones, and keep `http` last since its
//! detector accepts any well-formed request method.
//!
//! # Example
//!
//! ```no_run
//! use protomux::{Dispatcher, Result};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let mut dispatcher = Dispatcher::with_defaults(listener)?;
//!
//!     // More specific protocols first; http is the permissive fallback.
//!     let mut socks5 = dispatcher.listener("socks5")?;
//!     let mut http = dispatcher.listener("http")?;
//!
//!     tokio::spawn(async move {
//!         while let Ok((stream, peer)) = socks5.accept().await {
//!             // serve the SOCKS5 connection
//!             let _ = (stream, peer);
//!         }
//!     });
//!
//!     tokio::spawn(async move {
//!         while let Ok((stream, peer)) = http.accept().await {
//!             // serve the HTTP connection
//!             let _ = (stream, peer);
//!         }
//!     });
//!
//!     dispatcher.run().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod mux;
pub mod protocol;

// Re-export commonly used structures and functions for convenience
pub use common::{init_logger, parse_socket_addr, MuxError, Result};
pub use config::MuxConfig;
pub use mux::{Dispatcher, PeekStream, ProtocolListener};
pub use protocol::{Detector, DetectorRegistry, FnDetector};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
