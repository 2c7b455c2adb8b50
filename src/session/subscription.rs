//! Subscription session
//!
//! Drives one authenticated stream: wait for `Subscribe`, optionally replay
//! history, then forward live messages while serving control requests.
//!
//! The session registers with the hub *before* taking the history snapshot.
//! A message published in between can then show up both in the snapshot and
//! in the live queue; the highest sequence number replayed per channel is
//! remembered and live copies at or below it are skipped. The client sees
//! the retained history followed by a gap-free live tail, each message at
//! most once and in publish order. A message both published and evicted
//! before the snapshot is taken is not delivered.
//!
//! A later `Subscribe` does not re-register: with `want_history` it replays
//! the full retained backlog again, without it nothing happens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::watch;

use super::context::SessionContext;
use super::state::{SessionPhase, SessionState};
use crate::error::{ProtocolError, Result};
use crate::ingress::IngressAdapter;
use crate::protocol::{ClientRequest, FrameReader, FrameWriter};
use crate::registry::{Delivery, OverflowPolicy, RegistryError, SubscriberId, Subscription};
use crate::shutdown::{fired, ShutdownSignal};

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The client closed its side of the stream
    ClientClosed,
    /// This client issued an authorized Shutdown
    AdministrativeShutdown,
    /// The server is shutting down
    ServerShutdown,
    /// Dropped for falling behind under `OverflowPolicy::Disconnect`
    SlowConsumer,
}

/// Services every session works against
#[derive(Debug, Clone)]
pub struct SessionShared {
    pub ingress: Arc<IngressAdapter>,
    pub shutdown: Arc<ShutdownSignal>,
    pub admin_password: Option<Arc<str>>,
    pub read_buffer_size: usize,
}

impl SessionShared {
    pub fn new(ingress: Arc<IngressAdapter>, shutdown: Arc<ShutdownSignal>) -> Self {
        Self {
            ingress,
            shutdown,
            admin_password: None,
            read_buffer_size: 8 * 1024,
        }
    }

    /// Set the password that authorizes `Shutdown`
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = Some(Arc::from(password.into()));
        self
    }

    /// Set the initial read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Without a configured password every Shutdown is denied
    fn password_matches(&self, presented: &str) -> bool {
        matches!(&self.admin_password, Some(expected) if expected.as_ref() == presented)
    }
}

/// One subscriber stream
pub struct Session<S> {
    ctx: SessionContext,
    state: SessionState,
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    shared: SessionShared,
    subscriber: Option<SubscriberId>,
}

impl<S: AsyncRead + AsyncWrite> Session<S> {
    pub fn new(ctx: SessionContext, stream: S, shared: SessionShared) -> Self {
        let (rd, wr) = tokio::io::split(stream);
        let state = SessionState::new(ctx.session_id, ctx.peer_addr);

        Self {
            reader: FrameReader::with_capacity(rd, shared.read_buffer_size),
            writer: FrameWriter::new(wr),
            ctx,
            state,
            shared,
            subscriber: None,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Run the session to completion
    ///
    /// Always deregisters and releases the transport before returning,
    /// whatever the outcome.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        self.shared.ingress.stats().session_opened();

        let result = self.drive().await;
        self.finish(&result).await;

        self.shared.ingress.stats().session_closed();
        result
    }

    async fn drive(&mut self) -> Result<SessionOutcome> {
        let mut shutdown = self.shared.shutdown.subscribe();

        let first = tokio::select! {
            req = self.reader.read_request() => req?,
            _ = fired(&mut shutdown) => return Ok(SessionOutcome::ServerShutdown),
        };

        let want_history = match first {
            None => return Ok(SessionOutcome::ClientClosed),
            Some(ClientRequest::Subscribe { want_history }) => want_history,
            Some(other) => {
                tracing::warn!(
                    session_id = self.ctx.session_id,
                    request = other.name(),
                    "Invalid first message"
                );
                return Err(ProtocolError::InvalidFirstMessage(other.name()).into());
            }
        };
        self.state.on_subscribe(want_history);

        let hub = Arc::clone(self.shared.ingress.hub());
        let mut subscription = match hub.register(self.ctx.identity()).await {
            Ok(sub) => sub,
            Err(RegistryError::Closed) => return Ok(SessionOutcome::ServerShutdown),
        };
        self.subscriber = Some(subscription.id());

        let mut watermarks = HashMap::new();
        if want_history {
            let sent = self.replay(None, Some(&mut watermarks)).await?;
            self.state.complete_replay();
            tracing::debug!(session_id = self.ctx.session_id, messages = sent, "History replayed");
        }

        tracing::debug!(
            session_id = self.ctx.session_id,
            subscriber = %subscription.id(),
            "Session live"
        );

        self.live(&mut subscription, &watermarks, &mut shutdown).await
    }

    async fn live(
        &mut self,
        sub: &mut Subscription,
        watermarks: &HashMap<String, u64>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionOutcome> {
        let policy = self.shared.ingress.hub().config().overflow_policy;

        loop {
            tokio::select! {
                req = self.reader.read_request() => {
                    let Some(req) = req? else {
                        return Ok(SessionOutcome::ClientClosed);
                    };
                    self.ctx.stats.requests += 1;
                    if let Some(outcome) = self.handle_request(req).await? {
                        return Ok(outcome);
                    }
                }
                delivery = sub.recv() => match delivery {
                    Delivery::Message(msg) => {
                        if watermarks.get(&msg.channel).is_some_and(|&mark| msg.seq <= mark) {
                            self.ctx.stats.duplicates_skipped += 1;
                            continue;
                        }
                        self.writer.send_message(&msg).await?;
                        self.ctx.stats.live_sent += 1;
                    }
                    Delivery::Lagged(missed) => {
                        self.ctx.stats.dropped += missed;
                        self.shared.ingress.stats().record_dropped(missed);

                        tracing::warn!(
                            session_id = self.ctx.session_id,
                            identity = %self.ctx.identity,
                            missed = missed,
                            policy = ?policy,
                            "Subscriber queue overflowed"
                        );

                        match policy {
                            OverflowPolicy::DropOldest => {
                                let text = format!("{} messages dropped: client is reading too slowly", missed);
                                self.notice(&text).await?;
                            }
                            OverflowPolicy::Disconnect => return Ok(SessionOutcome::SlowConsumer),
                        }
                    }
                    Delivery::Closed => return Ok(SessionOutcome::ServerShutdown),
                },
                _ = fired(shutdown) => return Ok(SessionOutcome::ServerShutdown),
            }
        }
    }

    async fn handle_request(&mut self, req: ClientRequest) -> Result<Option<SessionOutcome>> {
        match req {
            ClientRequest::Subscribe { want_history } => {
                if want_history {
                    let sent = self.replay(None, None).await?;
                    tracing::debug!(session_id = self.ctx.session_id, messages = sent, "History replayed on resubscribe");
                }
                Ok(None)
            }
            ClientRequest::ReplayHistory { since } => {
                // The epoch is the wire's "from the beginning"
                let since = (since > UNIX_EPOCH).then_some(since);
                let sent = self.replay(since, None).await?;
                tracing::debug!(session_id = self.ctx.session_id, messages = sent, "History replayed on request");
                Ok(None)
            }
            ClientRequest::SendMessage { channel, text } => {
                if let Err(e) = self
                    .shared
                    .ingress
                    .request_send(&channel, &text, self.ctx.identity())
                {
                    tracing::debug!(session_id = self.ctx.session_id, error = %e, "Send refused");
                    self.notice(&e.to_string()).await?;
                }
                Ok(None)
            }
            ClientRequest::Shutdown { password } => {
                if !self.shared.password_matches(&password) {
                    tracing::warn!(
                        session_id = self.ctx.session_id,
                        identity = %self.ctx.identity,
                        "Shutdown denied: invalid password"
                    );
                    self.notice("shutdown denied: invalid password").await?;
                    return Ok(None);
                }

                tracing::warn!(
                    session_id = self.ctx.session_id,
                    identity = %self.ctx.identity,
                    "Administrative shutdown requested"
                );
                self.notice("bouncer shutting down").await?;
                self.shared.shutdown.trigger();
                Ok(Some(SessionOutcome::AdministrativeShutdown))
            }
        }
    }

    /// Send retained messages newer than `since` (all of them for `None`),
    /// channels in configuration order
    ///
    /// With `watermarks`, records the last replayed sequence per channel.
    async fn replay(
        &mut self,
        since: Option<SystemTime>,
        mut watermarks: Option<&mut HashMap<String, u64>>,
    ) -> Result<usize> {
        let history = Arc::clone(self.shared.ingress.history());
        let mut sent = 0;

        for channel in history.channels() {
            let messages = match since {
                Some(since) => history.since(channel, since).await,
                None => history.all(channel).await,
            };

            if let (Some(marks), Some(last)) = (watermarks.as_deref_mut(), messages.last()) {
                marks.insert(channel.clone(), last.seq);
            }

            for msg in &messages {
                self.writer.send_message(msg).await?;
                sent += 1;
            }
        }

        self.ctx.stats.history_sent += sent as u64;
        Ok(sent)
    }

    async fn notice(&mut self, text: &str) -> Result<()> {
        self.writer.send_notice(text).await?;
        self.ctx.stats.notices_sent += 1;
        Ok(())
    }

    async fn finish(&mut self, result: &Result<SessionOutcome>) {
        if let Some(id) = self.subscriber.take() {
            self.shared.ingress.hub().deregister(id).await;
        }

        // Best effort: the peer may already be gone
        let _ = self.writer.shutdown().await;

        self.state.close();
        self.ctx.stats.duration = self.state.duration();
        let stats = &self.ctx.stats;

        match result {
            Ok(outcome) => tracing::info!(
                session_id = self.ctx.session_id,
                peer = %self.ctx.peer_addr,
                identity = %self.ctx.identity,
                outcome = ?outcome,
                history_sent = stats.history_sent,
                live_sent = stats.live_sent,
                dropped = stats.dropped,
                duration_secs = stats.duration.as_secs(),
                "Session closed"
            ),
            Err(e) => tracing::info!(
                session_id = self.ctx.session_id,
                peer = %self.ctx.peer_addr,
                identity = %self.ctx.identity,
                error = %e,
                messages_sent = stats.messages_sent(),
                duration_secs = stats.duration.as_secs(),
                "Session failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::auth::ClientIdentity;
    use crate::error::Error;
    use crate::history::{HistoryLimit, HistoryStore};
    use crate::ingress::{OutboundMessage, OutboundReceiver};
    use crate::protocol::ServerEvent;
    use crate::registry::{BroadcastHub, HubConfig};
    use crate::stats::ServerStats;

    struct Harness {
        ingress: Arc<IngressAdapter>,
        outbound: OutboundReceiver,
        shutdown: Arc<ShutdownSignal>,
    }

    impl Harness {
        fn new(hub_config: HubConfig, limit: HistoryLimit) -> Self {
            let history = Arc::new(HistoryStore::new([("#rust", limit), ("#tokio", limit)]));
            let hub = Arc::new(BroadcastHub::with_config(hub_config));
            let (ingress, outbound) = IngressAdapter::new(history, hub, Arc::new(ServerStats::new()));

            Self {
                ingress: Arc::new(ingress),
                outbound,
                shutdown: Arc::new(ShutdownSignal::new()),
            }
        }

        fn basic() -> Self {
            Self::new(HubConfig::default(), HistoryLimit::Default)
        }

        fn connect(&self, buffer: usize) -> (JoinHandle<Result<SessionOutcome>>, Client) {
            let (client, server) = tokio::io::duplex(buffer);
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000);
            let ctx = SessionContext::new(1, addr, ClientIdentity::assume_verified("client_user"));
            let shared = SessionShared::new(Arc::clone(&self.ingress), Arc::clone(&self.shutdown))
                .admin_password("hunter2");

            let handle = tokio::spawn(Session::new(ctx, server, shared).run());
            let (rd, wr) = tokio::io::split(client);
            (
                handle,
                Client {
                    reader: FrameReader::new(rd),
                    writer: FrameWriter::new(wr),
                },
            )
        }

        async fn publish(&self, channel: &str, content: &str, secs: u64) {
            self.ingress
                .publish(channel, "alice", content, UNIX_EPOCH + Duration::from_secs(secs))
                .await;
        }

        async fn wait_subscribers(&self, n: usize) {
            for _ in 0..200 {
                if self.ingress.hub().subscriber_count().await == n {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("subscriber count never reached {}", n);
        }
    }

    struct Client {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: FrameWriter<WriteHalf<DuplexStream>>,
    }

    impl Client {
        async fn send(&mut self, req: ClientRequest) {
            self.writer.send_request(&req).await.unwrap();
        }

        async fn subscribe(&mut self, want_history: bool) {
            self.send(ClientRequest::Subscribe { want_history }).await;
        }

        async fn next(&mut self) -> Option<ServerEvent> {
            tokio::time::timeout(Duration::from_secs(2), self.reader.read_event())
                .await
                .expect("timed out waiting for event")
                .unwrap()
        }

        async fn next_content(&mut self) -> String {
            match self.next().await {
                Some(ServerEvent::Message(m)) => m.content.clone(),
                other => panic!("expected message, got {:?}", other),
            }
        }

        async fn next_notice(&mut self) -> String {
            match self.next().await {
                Some(ServerEvent::Notice(text)) => text,
                other => panic!("expected notice, got {:?}", other),
            }
        }
    }

    async fn outcome(handle: JoinHandle<Result<SessionOutcome>>) -> Result<SessionOutcome> {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("session did not finish")
            .unwrap()
    }

    #[tokio::test]
    async fn test_history_then_live() {
        let h = Harness::basic();
        h.publish("#rust", "m1", 1).await;
        h.publish("#rust", "m2", 2).await;

        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(true).await;

        assert_eq!(client.next_content().await, "m1");
        assert_eq!(client.next_content().await, "m2");

        h.publish("#rust", "m3", 3).await;
        assert_eq!(client.next_content().await, "m3");
    }

    #[tokio::test]
    async fn test_history_replayed_in_channel_order() {
        let h = Harness::basic();
        h.publish("#tokio", "t1", 1).await;
        h.publish("#rust", "r1", 2).await;
        h.publish("#tokio", "t2", 3).await;

        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(true).await;

        assert_eq!(client.next_content().await, "r1");
        assert_eq!(client.next_content().await, "t1");
        assert_eq!(client.next_content().await, "t2");
    }

    #[tokio::test]
    async fn test_subscribe_without_history() {
        let h = Harness::basic();
        h.publish("#rust", "old", 1).await;

        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        h.publish("#rust", "new", 2).await;
        assert_eq!(client.next_content().await, "new");
    }

    #[tokio::test]
    async fn test_invalid_first_message() {
        let h = Harness::basic();
        h.publish("#rust", "m1", 1).await;

        let (handle, mut client) = h.connect(64 * 1024);
        client
            .send(ClientRequest::ReplayHistory { since: UNIX_EPOCH })
            .await;

        let result = outcome(handle).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::InvalidFirstMessage("ReplayHistory")))
        ));

        // Nothing sent, nothing registered
        assert_eq!(client.next().await, None);
        assert_eq!(h.ingress.hub().subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_client_closes_before_subscribe() {
        let h = Harness::basic();
        let (handle, mut client) = h.connect(64 * 1024);

        client.writer.shutdown().await.unwrap();

        assert_eq!(outcome(handle).await.unwrap(), SessionOutcome::ClientClosed);
    }

    #[tokio::test]
    async fn test_client_close_deregisters() {
        let h = Harness::basic();
        let (handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        client.writer.shutdown().await.unwrap();

        assert_eq!(outcome(handle).await.unwrap(), SessionOutcome::ClientClosed);
        assert_eq!(h.ingress.hub().subscriber_count().await, 0);
        assert_eq!(h.ingress.stats().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_epoch_stamped_history_is_replayed() {
        let h = Harness::basic();
        h.publish("#rust", "at epoch", 0).await;
        h.publish("#rust", "later", 1).await;

        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(true).await;

        assert_eq!(client.next_content().await, "at epoch");
        assert_eq!(client.next_content().await, "later");

        client
            .send(ClientRequest::ReplayHistory { since: UNIX_EPOCH })
            .await;
        assert_eq!(client.next_content().await, "at epoch");
        assert_eq!(client.next_content().await, "later");
    }

    #[tokio::test]
    async fn test_oversized_message_does_not_break_stream() {
        let h = Harness::basic();
        h.publish("#rust", &"x".repeat(70_000), 1).await;
        h.publish("#rust", "small", 2).await;

        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(true).await;

        let first = client.next_content().await;
        assert_eq!(first.len(), crate::protocol::codec::max_content_len("#rust", "alice"));
        assert_eq!(client.next_content().await, "small");

        h.publish("#rust", &"y".repeat(70_000), 3).await;
        assert!(client.next_content().await.starts_with('y'));
    }

    #[tokio::test]
    async fn test_resubscribe_with_history_replays_again() {
        let h = Harness::basic();
        h.publish("#rust", "m1", 1).await;

        let (handle, mut client) = h.connect(64 * 1024);
        client.subscribe(true).await;
        assert_eq!(client.next_content().await, "m1");

        client.subscribe(true).await;
        assert_eq!(client.next_content().await, "m1");

        // Without history a repeated Subscribe changes nothing
        client.subscribe(false).await;
        h.publish("#rust", "m2", 2).await;
        assert_eq!(client.next_content().await, "m2");

        assert_eq!(h.ingress.hub().subscriber_count().await, 1);
        client.writer.shutdown().await.unwrap();
        assert_eq!(outcome(handle).await.unwrap(), SessionOutcome::ClientClosed);
    }

    #[tokio::test]
    async fn test_replay_on_demand_since() {
        let h = Harness::basic();
        h.publish("#rust", "m1", 1).await;
        h.publish("#rust", "m2", 2).await;
        h.publish("#rust", "m3", 3).await;

        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        client
            .send(ClientRequest::ReplayHistory {
                since: UNIX_EPOCH + Duration::from_secs(1),
            })
            .await;

        assert_eq!(client.next_content().await, "m2");
        assert_eq!(client.next_content().await, "m3");
    }

    #[tokio::test]
    async fn test_send_message_forwarded_upstream() {
        let mut h = Harness::basic();
        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        client
            .send(ClientRequest::SendMessage {
                channel: "#rust".into(),
                text: "hello upstream".into(),
            })
            .await;

        let request = tokio::time::timeout(Duration::from_secs(2), h.outbound.recv())
            .await
            .unwrap();
        assert_eq!(
            request,
            Some(OutboundMessage {
                channel: "#rust".into(),
                text: "hello upstream".into(),
                requested_by: "client_user".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_send_message_refused_with_notice() {
        let h = Harness::basic();
        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        client
            .send(ClientRequest::SendMessage {
                channel: "#nowhere".into(),
                text: "hi".into(),
            })
            .await;

        assert_eq!(
            client.next_notice().await,
            "cannot send to #nowhere: channel not configured"
        );
    }

    #[tokio::test]
    async fn test_shutdown_with_wrong_password_continues() {
        let h = Harness::basic();
        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        client
            .send(ClientRequest::Shutdown {
                password: "guess".into(),
            })
            .await;
        assert_eq!(client.next_notice().await, "shutdown denied: invalid password");
        assert!(!h.shutdown.is_triggered());

        h.publish("#rust", "still here", 1).await;
        assert_eq!(client.next_content().await, "still here");
    }

    #[tokio::test]
    async fn test_shutdown_with_password() {
        let h = Harness::basic();
        let (handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        client
            .send(ClientRequest::Shutdown {
                password: "hunter2".into(),
            })
            .await;

        assert_eq!(client.next_notice().await, "bouncer shutting down");
        assert_eq!(
            outcome(handle).await.unwrap(),
            SessionOutcome::AdministrativeShutdown
        );
        assert!(h.shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_server_shutdown_ends_sessions() {
        let h = Harness::basic();
        let (waiting, _idle) = h.connect(64 * 1024);
        let (live, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        h.shutdown.trigger();

        assert_eq!(outcome(waiting).await.unwrap(), SessionOutcome::ServerShutdown);
        assert_eq!(outcome(live).await.unwrap(), SessionOutcome::ServerShutdown);
    }

    #[tokio::test]
    async fn test_hub_close_ends_live_session() {
        let h = Harness::basic();
        let (handle, mut client) = h.connect(64 * 1024);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        h.ingress.hub().close().await;

        assert_eq!(outcome(handle).await.unwrap(), SessionOutcome::ServerShutdown);
    }

    #[tokio::test]
    async fn test_slow_client_gets_drop_notice() {
        let h = Harness::new(HubConfig::default().queue_capacity(2), HistoryLimit::Default);
        // Tiny transport buffer so the session blocks on write
        let (_handle, mut client) = h.connect(64);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        for n in 1..=20 {
            h.publish("#rust", &format!("m{}", n), n).await;
        }

        let mut saw_notice = false;
        let mut last = 0;
        loop {
            match client.next().await {
                Some(ServerEvent::Message(m)) => {
                    let n: u64 = m.content[1..].parse().unwrap();
                    assert!(n > last, "out of order: {} after {}", n, last);
                    last = n;
                    if n == 20 {
                        break;
                    }
                }
                Some(ServerEvent::Notice(text)) => {
                    assert!(text.contains("messages dropped"));
                    saw_notice = true;
                }
                None => panic!("stream ended early"),
            }
        }

        assert!(saw_notice);
        assert!(h.ingress.stats().snapshot().dropped_messages > 0);
    }

    #[tokio::test]
    async fn test_slow_client_disconnected_under_disconnect_policy() {
        let h = Harness::new(
            HubConfig::default()
                .queue_capacity(2)
                .overflow_policy(OverflowPolicy::Disconnect),
            HistoryLimit::Default,
        );
        let (handle, mut client) = h.connect(64);
        client.subscribe(false).await;
        h.wait_subscribers(1).await;

        for n in 1..=20 {
            h.publish("#rust", &format!("m{}", n), n).await;
        }

        // Drain whatever was in flight until the session hangs up
        while client.next().await.is_some() {}

        assert_eq!(outcome(handle).await.unwrap(), SessionOutcome::SlowConsumer);
        assert_eq!(h.ingress.hub().subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_during_publishing_is_gap_free() {
        let h = Harness::new(HubConfig::default(), HistoryLimit::Limited(1000));

        let publisher = {
            let ingress = Arc::clone(&h.ingress);
            tokio::spawn(async move {
                for n in 1..=300u64 {
                    ingress
                        .publish("#rust", "alice", format!("m{}", n), UNIX_EPOCH + Duration::from_secs(n))
                        .await;
                    tokio::task::yield_now().await;
                }
            })
        };

        tokio::task::yield_now().await;
        let (_handle, mut client) = h.connect(64 * 1024);
        client.subscribe(true).await;

        for n in 1..=300 {
            assert_eq!(client.next_content().await, format!("m{}", n));
        }
        publisher.await.unwrap();
    }
}
