//! Connection multiplexing module
//!
//! The dispatch engine: a peekable connection wrapper, the synthetic
//! per-protocol listener, and the dispatcher that routes each accepted
//! connection to the first protocol whose detector matches its leading
//! bytes.

mod dispatcher;
mod listener;
mod stream;

pub use dispatcher::Dispatcher;
pub use listener::ProtocolListener;
pub use stream::PeekStream;
