//! Channel transports.
//!
//! A [`Transport`] opens one bidirectional [`Channel`] of text frames to the
//! authority. The connection actor is generic over it, so production code uses
//! [`TcpTransport`] (newline-delimited JSON over TCP) while tests drive the
//! whole stack through [`MemoryTransport`] and play the authority themselves.
//!
//! ```text
//!   Transport::open(endpoint)
//!        │
//!        ▼
//!   Channel { inbound: Stream<String>, outbound: Sink<String> }
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::channel::mpsc as fmpsc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, Framed, LinesCodec, LinesCodecError};

use crate::constants::{CONNECT_TIMEOUT, MAX_FRAME_LEN};
use crate::events::ServerEvent;
use crate::intents::ClientIntent;

/// Inbound half of a channel: one text frame per item.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Outbound half of a channel.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// An open channel to the authority.
pub struct Channel {
    pub inbound: FrameStream,
    pub outbound: FrameSink,
}

/// Errors opening or using a channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] LinesCodecError),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection refused by {0}")]
    Refused(String),
    #[error("channel closed")]
    Closed,
}

/// Opens channels to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, endpoint: &str) -> Result<Channel, TransportError>;
}

// ============================================================================
// TCP
// ============================================================================

/// Newline-delimited frames over a TCP stream.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    max_frame_len: usize,
    connect_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

/// Line framing that drops oversized lines instead of failing the stream.
///
/// `LinesCodec` resynchronizes on the next newline after reporting
/// `MaxLineLengthExceeded`, but `Framed` ends the stream on any decode error,
/// which the actor would treat as a dropped channel.
#[derive(Debug)]
struct FrameCodec {
    lines: LinesCodec,
    max_frame_len: usize,
}

impl FrameCodec {
    fn new(max_frame_len: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_len),
            max_frame_len,
        }
    }

    fn skip_oversized(
        &self,
        result: Result<Option<String>, LinesCodecError>,
    ) -> Option<Result<Option<String>, LinesCodecError>> {
        match result {
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                log::warn!("Dropping frame longer than {} bytes", self.max_frame_len);
                None
            }
            other => Some(other),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        loop {
            let result = self.lines.decode(buf);
            if let Some(result) = self.skip_oversized(result) {
                return result;
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        loop {
            let result = self.lines.decode_eof(buf);
            if let Some(result) = self.skip_oversized(result) {
                return result;
            }
        }
    }
}

impl Encoder<String> for FrameCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, frame: String, dst: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.lines.encode(frame, dst)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self, endpoint: &str) -> Result<Channel, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))??;
        stream.set_nodelay(true)?;

        let framed = Framed::new(stream, FrameCodec::new(self.max_frame_len));
        let (sink, stream) = framed.split::<String>();

        Ok(Channel {
            inbound: Box::pin(stream.map(|frame| frame.map_err(TransportError::from))),
            outbound: Box::pin(sink.sink_map_err(TransportError::from)),
        })
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-process transport. Every successful `open` hands a [`MemoryPeer`] to the
/// paired [`MemoryAuthority`], which plays the server side.
#[derive(Clone)]
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicU32>,
}

/// The authority side of a [`MemoryTransport`].
pub struct MemoryAuthority {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
    refuse: Arc<AtomicU32>,
}

/// One accepted in-memory channel, seen from the authority.
///
/// Dropping the peer (or calling [`MemoryPeer::hang_up`]) ends the client's
/// inbound stream, which the client observes as an unexpected drop.
pub struct MemoryPeer {
    pub endpoint: String,
    to_client: fmpsc::UnboundedSender<Result<String, TransportError>>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryAuthority) {
        let (tx, rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicU32::new(0));
        (
            Self {
                peers: tx,
                refuse: refuse.clone(),
            },
            MemoryAuthority { peers: rx, refuse },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, endpoint: &str) -> Result<Channel, TransportError> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Refused(endpoint.to_string()));
        }

        let (to_client, inbound) = fmpsc::unbounded();
        let (outbound, from_client) = fmpsc::unbounded::<String>();

        self.peers
            .send(MemoryPeer {
                endpoint: endpoint.to_string(),
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Refused(endpoint.to_string()))?;

        Ok(Channel {
            inbound: Box::pin(inbound),
            outbound: Box::pin(outbound.sink_map_err(|_| TransportError::Closed)),
        })
    }
}

impl MemoryAuthority {
    /// Wait for the next channel the client opens.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Refuse the next `n` open attempts.
    pub fn refuse_next(&self, n: u32) {
        self.refuse.store(n, Ordering::SeqCst);
    }
}

impl MemoryPeer {
    /// Push an event to the client. Returns false if the client is gone.
    pub fn push(&self, event: &ServerEvent) -> bool {
        match event.encode() {
            Ok(frame) => self.push_raw(frame),
            Err(_) => false,
        }
    }

    /// Push a raw frame, well-formed or not.
    pub fn push_raw(&self, frame: impl Into<String>) -> bool {
        self.to_client.unbounded_send(Ok(frame.into())).is_ok()
    }

    /// Next intent from the client; `None` once the client released the channel.
    /// Frames that fail to decode are skipped.
    pub async fn recv(&mut self) -> Option<ClientIntent> {
        while let Some(frame) = self.from_client.next().await {
            if let Ok(intent) = ClientIntent::decode(&frame) {
                return Some(intent);
            }
        }
        None
    }

    /// Simulate a network drop.
    pub fn hang_up(self) {}
}
