//! Connection manager: one actor task per logical channel.
//!
//! Callers hold a cloneable [`ConnectionHandle`] and the single
//! [`ConnectionEvents`] receiver. The actor owns the transport channel and is
//! the only thing that touches it.
//!
//! ```text
//!   ConnectionHandle (Clone)     mpsc      ConnectionActor (tokio task)
//!   ┌─────────────────────┐  ────────▶  ┌──────────────────────────────┐
//!   │ .send(intent)       │             │ Channel (inbound + outbound) │
//!   │ .reconnect()        │             │ hello handshake              │
//!   │ .close()            │             │ backoff reconnect            │
//!   └─────────────────────┘             └──────────────────────────────┘
//!   ConnectionEvents  ◀──── Status(..) / Server(..) in arrival order ────┘
//! ```
//!
//! Lifecycle:
//!
//! ```text
//!   Connecting ─▶ Connected ─▶ Disconnected ─▶ Reconnecting{1..n} ─▶ Connected
//!                                                     │
//!                                                     ▼
//!                                             Exhausted ──reconnect()──▶ Connecting
//!   close() from anywhere ─▶ Closed
//! ```

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY, DEFAULT_RECONNECT_MAX_DELAY,
};
use crate::events::{ConnectionEvent, ConnectionStatus, ProtocolError, ServerEvent};
use crate::intents::{ClientIntent, Hello};
use crate::session::ElevationPolicy;
use crate::transport::{Channel, FrameSink, Transport, TransportError};

// ============================================================================
// Error Type
// ============================================================================

/// Errors from the connection manager.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection manager shut down")]
    Closed,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

// ============================================================================
// Options
// ============================================================================

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): base, 2×base, 4×base, … capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Where to connect and how.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub endpoint: String,
    pub reconnect: ReconnectPolicy,
    admin_key: Option<String>,
}

impl ConnectOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect: ReconnectPolicy::default(),
            admin_key: None,
        }
    }

    /// Attach a connect-time credential. It is kept (and later sent) only if
    /// `policy` admits it; otherwise the channel stays anonymous.
    pub fn with_credential(mut self, credential: Option<&str>, policy: &ElevationPolicy) -> Self {
        self.admin_key = policy.admit(credential);
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Whether channels open in elevated mode.
    pub fn is_elevated(&self) -> bool {
        self.admin_key.is_some()
    }

    fn hello(&self) -> ClientIntent {
        ClientIntent::Hello(Hello {
            admin_key: self.admin_key.clone(),
        })
    }
}

// ============================================================================
// Commands (internal)
// ============================================================================

enum Command {
    Send(ClientIntent),
    Reconnect,
    Close,
}

// ============================================================================
// Public API
// ============================================================================

/// Cloneable handle to the connection actor. Every call is fire-and-forget.
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    /// Queue an intent. Dropped (with a debug log) if the channel is not
    /// connected when the actor gets to it.
    pub fn send(&self, intent: ClientIntent) -> Result<(), ConnectError> {
        self.tx
            .send(Command::Send(intent))
            .map_err(|_| ConnectError::Closed)
    }

    /// Re-initiate after exhaustion. Ignored while connected or reconnecting.
    pub fn reconnect(&self) -> Result<(), ConnectError> {
        self.tx
            .send(Command::Reconnect)
            .map_err(|_| ConnectError::Closed)
    }

    /// Tear down. The event stream ends after `Closed`.
    pub fn close(&self) {
        let _ = self.tx.send(Command::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The ordered stream of lifecycle signals and decoded server events.
pub struct ConnectionEvents {
    rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl ConnectionEvents {
    /// Next event; `None` once the actor has shut down.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.try_recv().ok()
    }
}

/// Spawn a connection actor on the current tokio runtime and start connecting.
pub fn connect<T: Transport>(transport: T, options: ConnectOptions) -> (ConnectionHandle, ConnectionEvents) {
    let (tx, commands) = mpsc::unbounded_channel();
    let (events, rx) = mpsc::unbounded_channel();
    let actor = ConnectionActor {
        transport,
        options,
        commands,
        events,
    };
    tokio::spawn(actor.run());
    (ConnectionHandle { tx }, ConnectionEvents { rx })
}

// ============================================================================
// ConnectionActor (internal)
// ============================================================================

struct ConnectionActor<T> {
    transport: T,
    options: ConnectOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

/// How a served channel ended.
enum Exit {
    Dropped,
    Closed,
}

/// How a reconnect cycle ended.
enum Cycle {
    Opened(Channel),
    Exhausted,
    Closed,
}

impl<T: Transport> ConnectionActor<T> {
    async fn run(mut self) {
        self.status(ConnectionStatus::Connecting);
        let mut pending = self.open().await;

        loop {
            let channel = match pending.take() {
                Some(channel) => channel,
                None => match self.reconnect_cycle().await {
                    Cycle::Opened(channel) => channel,
                    Cycle::Closed => break,
                    Cycle::Exhausted => {
                        if !self.idle().await {
                            break;
                        }
                        self.status(ConnectionStatus::Connecting);
                        pending = self.open().await;
                        continue;
                    }
                },
            };

            match self.serve(channel).await {
                Exit::Dropped => self.status(ConnectionStatus::Disconnected),
                Exit::Closed => break,
            }
        }

        self.status(ConnectionStatus::Closed);
        log::debug!("Connection actor for {} shut down", self.options.endpoint);
    }

    fn status(&self, status: ConnectionStatus) {
        let _ = self.events.send(ConnectionEvent::Status(status));
    }

    /// Open a channel and send the hello frame.
    async fn open(&self) -> Option<Channel> {
        log::info!(
            "Connecting to {} (elevated={})",
            self.options.endpoint,
            self.options.is_elevated()
        );
        let result = async {
            let mut channel = self.transport.open(&self.options.endpoint).await?;
            let hello = self.options.hello().encode()?;
            channel.outbound.send(hello).await?;
            Ok::<_, ConnectError>(channel)
        }
        .await;

        match result {
            Ok(channel) => Some(channel),
            Err(e) => {
                log::warn!("Failed to open channel to {}: {e}", self.options.endpoint);
                None
            }
        }
    }

    /// Retry with backoff until a channel opens, attempts run out, or close.
    async fn reconnect_cycle(&mut self) -> Cycle {
        let policy = self.options.reconnect.clone();
        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_for(attempt);
            log::info!(
                "Reconnect attempt {attempt}/{} in {delay:?}",
                policy.max_attempts
            );
            self.status(ConnectionStatus::Reconnecting { attempt, delay });
            if !self.wait(delay).await {
                return Cycle::Closed;
            }
            if let Some(channel) = self.open().await {
                return Cycle::Opened(channel);
            }
        }

        log::warn!(
            "Giving up on {} after {} attempts",
            self.options.endpoint,
            policy.max_attempts
        );
        self.status(ConnectionStatus::Exhausted {
            attempts: policy.max_attempts,
        });
        Cycle::Exhausted
    }

    /// Sleep for `delay` while draining commands. False if close was requested.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(intent)) => drop_intent(&intent),
                    Some(Command::Reconnect) => log::debug!("Reconnect ignored: already reconnecting"),
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    /// After exhaustion: wait for `reconnect()` (true) or close (false).
    async fn idle(&mut self) -> bool {
        while let Some(cmd) = self.commands.recv().await {
            match cmd {
                Command::Send(intent) => drop_intent(&intent),
                Command::Reconnect => return true,
                Command::Close => return false,
            }
        }
        false
    }

    /// Pump frames both ways until the channel drops or we are told to close.
    async fn serve(&mut self, channel: Channel) -> Exit {
        let Channel {
            mut inbound,
            mut outbound,
        } = channel;
        log::info!("Connected to {}", self.options.endpoint);
        self.status(ConnectionStatus::Connected);

        loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(Ok(frame)) => self.deliver(&frame),
                    Some(Err(e)) => {
                        log::warn!("Channel error, will reconnect: {e}");
                        return Exit::Dropped;
                    }
                    None => {
                        log::warn!("Channel to {} dropped, will reconnect", self.options.endpoint);
                        return Exit::Dropped;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(intent)) => {
                        if let Err(e) = write(&mut outbound, &intent).await {
                            log::warn!("Send of {} failed, will reconnect: {e}", intent.name());
                            return Exit::Dropped;
                        }
                    }
                    Some(Command::Reconnect) => log::debug!("Reconnect ignored: already connected"),
                    Some(Command::Close) | None => {
                        let _ = outbound.close().await;
                        return Exit::Closed;
                    }
                },
            }
        }
    }

    fn deliver(&self, frame: &str) {
        match ServerEvent::decode(frame) {
            Ok(event) => {
                log::trace!("<- {}", event.name());
                let _ = self.events.send(ConnectionEvent::Server(event));
            }
            Err(e) => log::warn!("Dropping frame: {e}"),
        }
    }
}

async fn write(outbound: &mut FrameSink, intent: &ClientIntent) -> Result<(), TransportError> {
    let frame = match intent.encode() {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("Dropping {}: {e}", intent.name());
            return Ok(());
        }
    };
    log::trace!("-> {}", intent.name());
    outbound.send(frame).await
}

fn drop_intent(intent: &ClientIntent) {
    log::debug!("Not connected, dropping {}", intent.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryAuthority, MemoryTransport};
    use tackboard_types::MemoId;

    fn options(max_attempts: u32) -> ConnectOptions {
        ConnectOptions::new("mem://board").with_reconnect(ReconnectPolicy {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        })
    }

    async fn next_status(events: &mut ConnectionEvents) -> ConnectionStatus {
        loop {
            match events.recv().await {
                Some(ConnectionEvent::Status(status)) => return status,
                Some(ConnectionEvent::Server(_)) => continue,
                None => panic!("event stream ended"),
            }
        }
    }

    async fn accept(authority: &mut MemoryAuthority) -> crate::transport::MemoryPeer {
        let mut peer = authority.accept().await.unwrap();
        assert!(matches!(peer.recv().await, Some(ClientIntent::Hello(_))));
        peer
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        let secs: Vec<u64> = (1..=7).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(secs, [1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn credential_is_kept_only_when_admitted() {
        let policy = ElevationPolicy::new(Some("s3cret".into()));
        let opts = ConnectOptions::new("x").with_credential(Some("s3cret"), &policy);
        assert!(opts.is_elevated());
        let opts = ConnectOptions::new("x").with_credential(Some("guess"), &policy);
        assert!(!opts.is_elevated());
        assert_eq!(opts.hello(), ClientIntent::Hello(Hello::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn connects_with_hello_then_delivers_events_in_order() {
        let (transport, mut authority) = MemoryTransport::new();
        let policy = ElevationPolicy::new(Some("s3cret".into()));
        let opts = options(3).with_credential(Some("s3cret"), &policy);
        let (handle, mut events) = connect(transport, opts);

        let mut peer = authority.accept().await.unwrap();
        assert_eq!(
            peer.recv().await,
            Some(ClientIntent::Hello(Hello {
                admin_key: Some("s3cret".into())
            }))
        );

        peer.push(&ServerEvent::UserCount(3));
        peer.push_raw("garbage");
        peer.push(&ServerEvent::MemoDeleted(MemoId::new("m1")));

        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Server(ServerEvent::UserCount(3)))
        );
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Server(ServerEvent::MemoDeleted(MemoId::new("m1"))))
        );

        handle.send(ClientIntent::LikeMemo(MemoId::new("m2"))).unwrap();
        assert_eq!(peer.recv().await, Some(ClientIntent::LikeMemo(MemoId::new("m2"))));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_drop() {
        let (transport, mut authority) = MemoryTransport::new();
        let (handle, mut events) = connect(transport, options(3));

        let peer = accept(&mut authority).await;
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);

        peer.hang_up();
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Disconnected);
        assert_eq!(
            next_status(&mut events).await,
            ConnectionStatus::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );

        // Dropped while reconnecting, never delivered.
        handle.send(ClientIntent::LikeMemo(MemoId::new("lost"))).unwrap();

        let mut peer = accept(&mut authority).await;
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);

        handle.send(ClientIntent::LikeMemo(MemoId::new("kept"))).unwrap();
        assert_eq!(peer.recv().await, Some(ClientIntent::LikeMemo(MemoId::new("kept"))));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_then_reconnects_on_request() {
        let (transport, mut authority) = MemoryTransport::new();
        // Initial open plus both retries.
        authority.refuse_next(3);
        let (handle, mut events) = connect(transport, options(2));

        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(
            next_status(&mut events).await,
            ConnectionStatus::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(
            next_status(&mut events).await,
            ConnectionStatus::Reconnecting {
                attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            next_status(&mut events).await,
            ConnectionStatus::Exhausted { attempts: 2 }
        );

        handle.reconnect().unwrap();
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        let _peer = accept(&mut authority).await;
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_during_backoff_is_ignored() {
        let (transport, authority) = MemoryTransport::new();
        authority.refuse_next(100);
        let (handle, mut events) = connect(transport, options(3));

        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(
            next_status(&mut events).await,
            ConnectionStatus::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        handle.reconnect().unwrap();
        handle.reconnect().unwrap();

        let mut rest = Vec::new();
        loop {
            let status = next_status(&mut events).await;
            let done = matches!(status, ConnectionStatus::Exhausted { .. });
            rest.push(status);
            if done {
                break;
            }
        }
        assert_eq!(
            rest,
            [
                ConnectionStatus::Reconnecting {
                    attempt: 2,
                    delay: Duration::from_secs(2)
                },
                ConnectionStatus::Reconnecting {
                    attempt: 3,
                    delay: Duration::from_secs(4)
                },
                ConnectionStatus::Exhausted { attempts: 3 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_while_connected_is_ignored() {
        let (transport, mut authority) = MemoryTransport::new();
        let (handle, mut events) = connect(transport, options(3));
        let mut peer = accept(&mut authority).await;
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);

        handle.reconnect().unwrap();
        handle.send(ClientIntent::LikeMemo(MemoId::new("m1"))).unwrap();
        // Commands are handled in order, so the reconnect has been seen by now.
        assert_eq!(peer.recv().await, Some(ClientIntent::LikeMemo(MemoId::new("m1"))));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn close_ends_the_stream() {
        let (transport, mut authority) = MemoryTransport::new();
        let (handle, mut events) = connect(transport, options(3));
        let _peer = accept(&mut authority).await;
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);

        handle.close();
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Closed);
        assert!(events.recv().await.is_none());
        assert!(handle.send(ClientIntent::LikeMemo(MemoId::new("m"))).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_backoff() {
        let (transport, authority) = MemoryTransport::new();
        authority.refuse_next(100);
        let (handle, mut events) = connect(transport, options(5));

        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert!(matches!(
            next_status(&mut events).await,
            ConnectionStatus::Reconnecting { attempt: 1, .. }
        ));
        handle.close();
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Closed);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_closes() {
        let (transport, mut authority) = MemoryTransport::new();
        let (handle, mut events) = connect(transport, options(1));
        let _peer = accept(&mut authority).await;
        drop(handle);

        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(ConnectionEvent::Status(ConnectionStatus::Closed)));
    }
}
