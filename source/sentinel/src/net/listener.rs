//! A Listener owns a bind address, TLS material, an allowed-host matcher,
//! and (indirectly, via the handler it's constructed with) a reference to
//! exactly one handler (spec.md §3/§4.3). State machine:
//! `Configured → Starting → Running → Stopping → Stopped`. `start` binds,
//! sets up TLS, spawns the accept task and returns immediately; `stop`
//! signals the task, waits up to a 5s grace period, then abandons whatever
//! is left.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener as TokioTcpListener;
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use crate::acl::AllowedHosts;

use super::{NetError, Result};

const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Configured,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Marker trait so a Listener can hand off a TLS-or-plain stream to a
/// handler through one trait object.
pub trait AsyncStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send> AsyncStream for T {}
pub type BoxedStream = Box<dyn AsyncStream>;

#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    async fn handle_connection(&self, stream: BoxedStream, peer: SocketAddr);
}

/// `(bind, port, tls)` — the coalescing key shared handlers register under
/// (spec.md §4.3, "Shared sockets").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindSpec {
    pub bind: IpAddr,
    pub port: u16,
    pub tls: bool,
}

impl std::fmt::Display for BindSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}{}", self.bind, self.port, if self.tls { "s" } else { "" })
    }
}

pub struct Listener {
    spec: BindSpec,
    tls_acceptor: Option<TlsAcceptor>,
    allowed_hosts: Arc<AllowedHosts>,
    handler: Arc<dyn ConnectionHandler>,
}

pub struct ListenerHandle {
    spec: BindSpec,
    state: Arc<Mutex<ListenerState>>,
    stop_notify: Arc<Notify>,
    join: tokio::task::JoinHandle<()>,
}

impl ListenerHandle {
    pub fn spec(&self) -> &BindSpec {
        &self.spec
    }

    pub fn state(&self) -> ListenerState {
        *self.state.lock().expect("listener state mutex poisoned")
    }

    /// Signals the accept task to stop, waits up to the grace period, then
    /// abandons the task if it hasn't wound down (spec.md §4.3, §5).
    pub async fn stop(self) {
        *self.state.lock().expect("listener state mutex poisoned") = ListenerState::Stopping;
        self.stop_notify.notify_waiters();
        if tokio::time::timeout(STOP_GRACE, self.join).await.is_err() {
            tracing::warn!(spec = %self.spec, "listener did not stop within grace period, abandoning");
        }
    }
}

impl Listener {
    pub fn new(
        spec: BindSpec,
        tls_acceptor: Option<TlsAcceptor>,
        allowed_hosts: AllowedHosts,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self> {
        if spec.tls && tls_acceptor.is_none() {
            return Err(NetError::MissingTlsMaterial { port: spec.port });
        }
        Ok(Self { spec, tls_acceptor, allowed_hosts: Arc::new(allowed_hosts), handler })
    }

    pub async fn start(self) -> Result<ListenerHandle> {
        let addr = SocketAddr::new(self.spec.bind, self.spec.port);
        let tcp = TokioTcpListener::bind(addr)
            .await
            .map_err(|source| NetError::Bind { addr: addr.to_string(), source })?;

        let state = Arc::new(Mutex::new(ListenerState::Running));
        let stop_notify = Arc::new(Notify::new());

        let spec = self.spec.clone();
        let allowed_hosts = self.allowed_hosts.clone();
        let tls_acceptor = self.tls_acceptor.clone();
        let handler = self.handler.clone();
        let accept_state = state.clone();
        let accept_stop = stop_notify.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_stop.notified() => break,
                    accepted = tcp.accept() => {
                        let (stream, peer) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                tracing::warn!(error = %e, "accept failed");
                                continue;
                            }
                        };

                        let ok = allowed_hosts.check(&peer.ip().to_string(), resolve_via_dns).await;
                        if !ok {
                            tracing::debug!(peer = %peer, "connection rejected by allowed-hosts ACL");
                            continue;
                        }

                        let handler = handler.clone();
                        let tls_acceptor = tls_acceptor.clone();
                        tokio::spawn(async move {
                            match tls_acceptor {
                                Some(acceptor) => match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        handler.handle_connection(Box::new(tls_stream), peer).await
                                    }
                                    Err(e) => tracing::debug!(error = %e, peer = %peer, "tls handshake failed"),
                                },
                                None => handler.handle_connection(Box::new(stream), peer).await,
                            }
                        });
                    }
                }
            }
            *accept_state.lock().expect("listener state mutex poisoned") = ListenerState::Stopped;
        });

        Ok(ListenerHandle { spec, state, stop_notify, join })
    }
}

async fn resolve_via_dns(host: String) -> Vec<IpAddr> {
    match tokio::net::lookup_host((host.as_str(), 0)).await {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(e) => {
            tracing::debug!(host = %host, error = %e, "dns resolution failed for allowed-hosts rule");
            Vec::new()
        }
    }
}
