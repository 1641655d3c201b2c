//! Logging utilities
//!
//! This module provides helpers for the logging system.

/// Initialize the logging system
///
/// # Parameters
///
/// * `level` - Default log level used when `RUST_LOG` is not set
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    env_logger::init_from_env(env);
}
