//! Bouncer server listener
//!
//! Accepts TCP connections, runs the mTLS handshake (identity gate included)
//! and spawns one session task per admitted client.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

use crate::auth::verifier::auth_error_from_handshake;
use crate::auth::{tls, IdentityGate};
use crate::error::{ConfigError, Error, Result};
use crate::history::HistoryStore;
use crate::ingress::{IngressAdapter, OutboundReceiver};
use crate::registry::BroadcastHub;
use crate::server::config::ServerConfig;
use crate::session::{Session, SessionContext, SessionOutcome, SessionShared};
use crate::shutdown::ShutdownSignal;
use crate::stats::ServerStats;

/// IRC bouncer server
///
/// Owns the history store, the broadcast hub and the ingress adapter. The
/// upstream side publishes through `ingress()`.
pub struct BouncerServer {
    config: ServerConfig,
    history: Arc<HistoryStore>,
    hub: Arc<BroadcastHub>,
    ingress: Arc<IngressAdapter>,
    stats: Arc<ServerStats>,
    shutdown: Arc<ShutdownSignal>,
    acceptor: TlsAcceptor,
    gate: IdentityGate,
    shared: SessionShared,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl BouncerServer {
    /// Create a server, loading TLS material from the configured PEM files
    ///
    /// Returns the server and the receiver for client `SendMessage`
    /// requests.
    pub fn new(config: ServerConfig) -> Result<(Self, OutboundReceiver)> {
        config.validate()?;
        let paths = config
            .tls
            .clone()
            .ok_or_else(|| ConfigError::Invalid("tls section is required".into()))?;

        let ca_certs = tls::load_certs(&paths.ca_file)?;
        let cert_chain = tls::load_certs(&paths.cert_file)?;
        let key = tls::load_private_key(&paths.key_file)?;

        Self::with_tls_material(config, ca_certs, cert_chain, key)
    }

    /// Create a server from in-memory TLS material
    pub fn with_tls_material(
        config: ServerConfig,
        ca_certs: Vec<CertificateDer<'static>>,
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<(Self, OutboundReceiver)> {
        config.validate_settings()?;

        let gate = IdentityGate::new(config.client_identity.clone());
        let tls_config = tls::server_config(ca_certs, cert_chain, key, gate.clone())?;

        let history = Arc::new(HistoryStore::new(config.history_channels()));
        let hub = Arc::new(BroadcastHub::with_config(config.hub_config()));
        let stats = Arc::new(ServerStats::new());
        let (ingress, outbound) =
            IngressAdapter::new(Arc::clone(&history), Arc::clone(&hub), Arc::clone(&stats));
        let ingress = Arc::new(ingress);
        let shutdown = Arc::new(ShutdownSignal::new());

        let mut shared = SessionShared::new(Arc::clone(&ingress), Arc::clone(&shutdown))
            .read_buffer_size(config.read_buffer_size);
        if let Some(password) = &config.admin_password {
            shared = shared.admin_password(password.clone());
        }

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let server = Self {
            config,
            history,
            hub,
            ingress,
            stats,
            shutdown,
            acceptor: TlsAcceptor::from(tls_config),
            gate,
            shared,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        };

        Ok((server, outbound))
    }

    /// Entry point for the upstream side
    pub fn ingress(&self) -> &Arc<IngressAdapter> {
        &self.ingress
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Fired by an administrative Shutdown and when serving stops
    pub fn shutdown_signal(&self) -> &Arc<ShutdownSignal> {
        &self.shutdown
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server until an administrative shutdown
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves or an administrative
    /// shutdown is requested
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            client_identity = %self.gate.expected(),
            channels = self.history.channels().len(),
            "Bouncer listening"
        );

        let mut sessions = JoinSet::new();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            _ = self.shutdown.wait() => {
                tracing::info!("Administrative shutdown");
                Ok(())
            }
            result = self.accept_loop(&listener, &mut sessions) => result,
        };

        drop(listener);
        self.drain(sessions).await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener, sessions: &mut JoinSet<()>) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, sessions);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                // Reap finished sessions
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, sessions: &mut JoinSet<()>) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.stats.record_rejected();
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let handshake = Handshake {
            acceptor: self.acceptor.clone(),
            gate: self.gate.clone(),
            timeout: self.config.handshake_timeout,
            stats: Arc::clone(&self.stats),
        };
        let shared = self.shared.clone();

        sessions.spawn(async move {
            let _permit = permit;

            match serve_connection(session_id, socket, peer_addr, handshake, shared).await {
                Ok(outcome) => {
                    tracing::debug!(session_id = session_id, outcome = ?outcome, "Connection closed");
                }
                Err(e) => {
                    tracing::debug!(session_id = session_id, error = %e, "Connection error");
                }
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Stop every session, waiting up to `drain_timeout` before aborting
    async fn drain(&self, mut sessions: JoinSet<()>) {
        self.shutdown.trigger();
        self.hub.close().await;

        tracing::info!(sessions = sessions.len(), "Draining sessions");

        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(remaining = sessions.len(), "Drain timed out, aborting sessions");
            sessions.shutdown().await;
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            accepted = stats.connections_accepted,
            unauthorized = stats.unauthorized,
            published = stats.messages_published,
            dropped = stats.dropped_messages,
            uptime_secs = stats.uptime.as_secs(),
            "Bouncer stopped"
        );
    }
}

/// Everything a connection task needs to admit a client
struct Handshake {
    acceptor: TlsAcceptor,
    gate: IdentityGate,
    timeout: Duration,
    stats: Arc<ServerStats>,
}

async fn serve_connection(
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    handshake: Handshake,
    shared: SessionShared,
) -> Result<SessionOutcome> {
    let stream = match tokio::time::timeout(handshake.timeout, handshake.acceptor.accept(socket)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let err = handshake_error(e);
            if let Error::Unauthorized(reason) = &err {
                handshake.stats.record_unauthorized();
                tracing::warn!(
                    session_id = session_id,
                    peer = %peer_addr,
                    reason = %reason,
                    "Connection unauthorized"
                );
            }
            return Err(err);
        }
        Err(_) => return Err(Error::Timeout("tls handshake")),
    };

    // The verifier already ran the gate; this recovers the admitted identity
    let (_, conn) = stream.get_ref();
    let identity = handshake
        .gate
        .check_chain(conn.peer_certificates())
        .inspect_err(|_| handshake.stats.record_unauthorized())?;

    handshake.stats.record_accepted();
    tracing::debug!(
        session_id = session_id,
        peer = %peer_addr,
        identity = %identity,
        "Client authenticated"
    );

    let ctx = SessionContext::new(session_id, peer_addr, identity);
    Session::new(ctx, stream, shared).run().await
}

/// Classify a failed TLS accept
fn handshake_error(e: io::Error) -> Error {
    if let Some(reason) = auth_error_from_handshake(&e) {
        return Error::Unauthorized(reason);
    }
    match e.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
        Some(tls) => Error::Tls(tls.clone()),
        None => Error::Io(e),
    }
}
