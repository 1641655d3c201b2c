//! Dispatch engine
//!
//! Owns the real listening socket and the routing loop: every accepted
//! connection is wrapped so its leading bytes can be peeked, classified
//! against the activated protocols in activation order, and handed to the
//! first matching synthetic listener. Unmatched connections are closed.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::listener::{AcceptItem, ProtocolListener};
use super::stream::PeekStream;
use crate::common::{MuxError, Result};
use crate::config::MuxConfig;
use crate::protocol::{Detector, DetectorRegistry};

/// Handoff queue capacity per synthetic listener. The queue acts as a
/// near-rendezvous: a protocol whose consumer is slow or absent stalls only
/// its own connections' dispatch tasks, never the accept loop or other
/// protocols.
const ROUTE_CAPACITY: usize = 1;

/// One entry of the routing table snapshot taken when `run` starts.
struct Route {
    proto: String,
    detector: Arc<dyn Detector>,
    tx: mpsc::Sender<AcceptItem>,
}

/// Protocol-sniffing connection dispatcher
///
/// Setup (registration and listener requests) happens before [`run`](Self::run);
/// the registry and activation order are read-only once the loop starts.
///
/// Activation order is trial priority: request listeners for restrictive
/// protocols (`socks5`, `https`) before permissive ones (`http`), since the
/// first detector to match wins.
pub struct Dispatcher {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: DetectorRegistry,
    /// Protocol names in the order their listeners were requested.
    order: Vec<String>,
    route_txs: HashMap<String, mpsc::Sender<AcceptItem>>,
    shutdown: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    config: MuxConfig,
}

impl Dispatcher {
    /// Create a dispatcher over an already-bound listener
    ///
    /// # Errors
    ///
    /// Fails if the listener's local address cannot be read or the
    /// configuration is invalid.
    pub fn with_config(
        listener: TcpListener,
        registry: DetectorRegistry,
        config: MuxConfig,
    ) -> Result<Self> {
        config.validate()?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            registry,
            order: Vec::new(),
            route_txs: HashMap::new(),
            shutdown: Arc::new(shutdown),
            shutdown_rx,
            config,
        })
    }

    /// Create a dispatcher with the default configuration
    pub fn new(listener: TcpListener, registry: DetectorRegistry) -> Result<Self> {
        Self::with_config(listener, registry, MuxConfig::default())
    }

    /// Create a dispatcher with the default detectors pre-registered
    ///
    /// Equivalent to `Dispatcher::new(listener, DetectorRegistry::with_defaults())`.
    pub fn with_defaults(listener: TcpListener) -> Result<Self> {
        Self::new(listener, DetectorRegistry::with_defaults())
    }

    /// The local address of the underlying listener
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Install a detector under `name`, replacing any previous registration
    pub fn register(&mut self, name: impl Into<String>, detector: impl Detector + 'static) {
        self.registry.register(name, detector);
    }

    /// Request the synthetic listener for `proto`
    ///
    /// Appends `proto` to the activation order, which fixes detector trial
    /// priority for every future connection. Requesting the same protocol
    /// twice is allowed but wasteful: both activation entries route to the
    /// newest listener's queue.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::UnknownProtocol`] if no detector is registered
    /// under `proto`; the activation order is left untouched. This is a
    /// configuration bug, so callers typically treat it as fatal during
    /// startup.
    pub fn listener(&mut self, proto: &str) -> Result<ProtocolListener> {
        if !self.registry.contains(proto) {
            return Err(MuxError::UnknownProtocol(proto.to_string()));
        }

        let (tx, rx) = mpsc::channel(ROUTE_CAPACITY);
        self.order.push(proto.to_string());
        self.route_txs.insert(proto.to_string(), tx);

        Ok(ProtocolListener::new(
            proto.to_string(),
            self.local_addr,
            rx,
            Arc::clone(&self.shutdown),
        ))
    }

    /// Run the dispatch loop
    ///
    /// Blocks until the underlying listener fails unrecoverably or a
    /// synthetic listener calls [`close`](ProtocolListener::close); either
    /// way the terminal error is fanned out to every synthetic listener
    /// before this returns it. Transient accept errors are logged and the
    /// loop continues.
    ///
    /// Each accepted connection is classified on its own task, so one slow
    /// connection never blocks acceptance of others.
    pub async fn run(self) -> Result<()> {
        let Dispatcher {
            listener,
            local_addr,
            registry,
            order,
            route_txs,
            shutdown: _shutdown,
            mut shutdown_rx,
            config,
        } = self;

        // Snapshot the routing table; setup state is immutable from here on.
        // Every name in `order` has a registry entry and a queue by
        // construction of `listener()`.
        let routes: Vec<Route> = order
            .iter()
            .filter_map(|proto| {
                let detector = registry.get(proto)?;
                let tx = route_txs.get(proto)?.clone();
                Some(Route {
                    proto: proto.clone(),
                    detector,
                    tx,
                })
            })
            .collect();
        let routes = Arc::new(routes);
        let deadline = config.detection_timeout();

        info!(
            "dispatcher started on {} with {} activated protocol(s)",
            local_addr,
            routes.len()
        );

        let mut tasks = JoinSet::new();

        loop {
            // Reap finished dispatch tasks; a panic in one must not
            // take the loop down.
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("dispatch task failed: {}", e);
                }
            }

            tokio::select! {
                _ = shutdown_rx.wait_for(|closed| *closed) => {
                    info!("listener on {} closed; stopping dispatch", local_addr);
                    fan_out_terminal(&route_txs, || MuxError::Closed);
                    return Err(MuxError::Closed);
                }
                res = listener.accept() => match res {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {}", peer);
                        let routes = Arc::clone(&routes);
                        tasks.spawn(dispatch(stream, peer, routes, deadline));
                    }
                    Err(e) if is_transient(&e) => {
                        warn!("transient accept error: {}", e);
                    }
                    Err(e) => {
                        error!("accept failed: {}", e);
                        let msg = e.to_string();
                        fan_out_terminal(&route_txs, || MuxError::Terminated(msg.clone()));
                        return Err(MuxError::Io(e));
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("local_addr", &self.local_addr)
            .field("order", &self.order)
            .finish()
    }
}

/// Deliver the terminal error to every synthetic listener's queue.
///
/// Uses a non-blocking send: a queue whose single slot is already occupied
/// still unblocks its consumer, because `run` returning drops all senders
/// and the closed channel surfaces [`MuxError::Closed`] on the next accept.
fn fan_out_terminal<F>(route_txs: &HashMap<String, mpsc::Sender<AcceptItem>>, make_err: F)
where
    F: Fn() -> MuxError,
{
    for (proto, tx) in route_txs {
        if tx.try_send(Err(make_err())).is_err() {
            debug!("could not push terminal error to {} queue", proto);
        }
    }
}

/// Classify transient accept errors, which must not end the dispatch loop.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Classify and route one accepted connection, under the configured
/// deadline if there is one.
async fn dispatch(
    stream: TcpStream,
    peer: SocketAddr,
    routes: Arc<Vec<Route>>,
    deadline: Option<Duration>,
) {
    let stream = PeekStream::new(stream);
    match deadline {
        Some(limit) => {
            if timeout(limit, classify(stream, peer, routes)).await.is_err() {
                debug!("classification of {} exceeded {:?}; dropping", peer, limit);
            }
        }
        None => classify(stream, peer, routes).await,
    }
}

/// Walk the activation order and hand the connection to the first matching
/// protocol's queue. First match wins; a peek or detector error abandons the
/// connection without trying further protocols; no match closes it.
async fn classify(mut stream: PeekStream<TcpStream>, peer: SocketAddr, routes: Arc<Vec<Route>>) {
    for route in routes.iter() {
        let verdict = match stream.peek(route.detector.peek_len()).await {
            Ok(prefix) => route.detector.detect(prefix),
            Err(e) => {
                debug!("abandoning connection from {}: {}", peer, e);
                return;
            }
        };

        match verdict {
            Ok(true) => {
                debug!("routing connection from {} to {}", peer, route.proto);
                if route.tx.send(Ok((stream, peer))).await.is_err() {
                    debug!("{} listener is gone; dropping connection from {}", route.proto, peer);
                }
                return;
            }
            Ok(false) => {}
            Err(e) => {
                debug!("{} detector failed on connection from {}: {}", route.proto, peer, e);
                return;
            }
        }
    }

    debug!("no protocol matched connection from {}; closing", peer);
}
