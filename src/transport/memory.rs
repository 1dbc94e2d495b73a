//! In-process transport.
//!
//! [`pair`] returns a connector for the channel and a listener for the
//! other side. Each successful connect hands a [`MemoryPeer`] to the
//! listener. The connector records when every attempt happened (on the
//! tokio clock, so paused-time tests see simulated instants) and can be
//! switched to refuse connects.
//!
//! # Example
//!
//! ```ignore
//! let (connector, mut listener) = memory::pair();
//! let channel = Channel::builder()
//!     .endpoint("ws://memory/chat/")
//!     .connector(connector.clone())
//!     .on_message(|_| {})
//!     .build()?;
//! channel.open()?;
//!
//! let mut peer = listener.accept().await.unwrap();
//! peer.send("hello");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

use super::{Connector, FrameReader, FrameWriter, Link};

// ============================================================================
// Constructor
// ============================================================================

/// Creates a connected connector/listener pair.
#[must_use]
pub fn pair() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();

    let connector = MemoryConnector {
        inner: Arc::new(ConnectorInner {
            accept_tx,
            refusing: AtomicBool::new(false),
            attempts: Mutex::new(Vec::new()),
        }),
    };

    (connector, MemoryListener { accept_rx })
}

// ============================================================================
// MemoryConnector
// ============================================================================

struct ConnectorInner {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refusing: AtomicBool,
    attempts: Mutex<Vec<Instant>>,
}

/// Client side of the in-process transport.
#[derive(Clone)]
pub struct MemoryConnector {
    inner: Arc<ConnectorInner>,
}

impl MemoryConnector {
    /// Makes every following connect fail (or succeed again).
    pub fn set_refusing(&self, refusing: bool) {
        self.inner.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Instants of every connect attempt so far, successful or not.
    #[must_use]
    pub fn attempts(&self) -> Vec<Instant> {
        self.inner.attempts.lock().clone()
    }

    /// Number of connect attempts so far.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.inner.attempts.lock().len()
    }
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("refusing", &self.inner.refusing.load(Ordering::SeqCst))
            .field("attempts", &self.attempt_count())
            .finish()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint, _protocol: Option<&str>) -> Result<Link> {
        self.inner.attempts.lock().push(Instant::now());

        if self.inner.refusing.load(Ordering::SeqCst) {
            return Err(Error::connection(format!("{endpoint} refused the connection")));
        }

        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            tx: Some(to_client_tx),
            rx: to_peer_rx,
        };

        self.inner
            .accept_tx
            .send(peer)
            .map_err(|_| Error::connection(format!("{endpoint} is not listening")))?;

        trace!(%endpoint, "Memory connection established");

        Ok((
            Box::new(MemoryWriter {
                tx: Some(to_peer_tx),
            }),
            Box::new(MemoryReader { rx: to_client_rx }),
        ))
    }
}

// ============================================================================
// MemoryListener
// ============================================================================

/// Server side of the in-process transport.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Waits for the next successful connect.
    ///
    /// Returns `None` once every connector clone has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// The remote end of one in-process connection.
#[derive(Debug)]
pub struct MemoryPeer {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Sends a text frame to the client.
    ///
    /// Returns `false` if the client side is gone or the peer was closed.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Receives the next frame written by the client.
    ///
    /// Returns `None` once the client has closed or dropped its writer.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Returns a frame already written by the client, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Closes the connection from the server side.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

// ============================================================================
// Frame Halves
// ============================================================================

struct MemoryWriter {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn send_text(&mut self, text: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(text).map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn next_text(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }
}

// ============================================================================
// Tests
// ============================================================================
