//! Transport seam between sessions
//!
//! Sessions never block on the network: outbound messages are fire and
//! forget, inbound messages are drained once at the start of each step.

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace};

/// Something that arrived on a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(Bytes),
    /// The peer went away; reported once
    Disconnected,
}

/// An ordered, message-oriented channel to one peer
pub trait Transport: Send {
    /// Queue a message for the peer; silently dropped when disconnected
    fn send(&mut self, bytes: Bytes);

    /// Next inbound event, if any is ready
    fn poll(&mut self) -> Option<TransportEvent>;

    fn is_connected(&self) -> bool;
}

/// In-memory transport backed by a pair of unbounded channels
pub struct LoopbackTransport {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    rx: mpsc::UnboundedReceiver<Bytes>,
    disconnect_reported: bool,
}

/// Two connected loopback endpoints
pub fn loopback_pair() -> (LoopbackTransport, LoopbackTransport) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: Some(a_tx),
            rx: b_rx,
            disconnect_reported: false,
        },
        LoopbackTransport {
            tx: Some(b_tx),
            rx: a_rx,
            disconnect_reported: false,
        },
    )
}

impl LoopbackTransport {
    /// Hang up; the peer sees `Disconnected` after draining what was sent
    pub fn close(&mut self) {
        self.tx = None;
        self.rx.close();
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, bytes: Bytes) {
        let Some(tx) = &self.tx else {
            trace!("Send on closed transport ignored");
            return;
        };
        if tx.send(bytes).is_err() {
            trace!("Peer gone, message dropped");
        }
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        match self.rx.try_recv() {
            Ok(bytes) => Some(TransportEvent::Message(bytes)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if self.disconnect_reported {
                    None
                } else {
                    self.disconnect_reported = true;
                    debug!("Loopback peer disconnected");
                    Some(TransportEvent::Disconnected)
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        !self.disconnect_reported && self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Drops outbound messages with a seeded probability
pub struct LossyTransport<T: Transport> {
    inner: T,
    rng: ChaCha8Rng,
    loss: f64,
    dropped: u64,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, loss: f64, seed: u64) -> Self {
        Self {
            inner,
            rng: ChaCha8Rng::seed_from_u64(seed),
            loss: if loss.is_nan() { 0.0 } else { loss.clamp(0.0, 1.0) },
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    fn send(&mut self, bytes: Bytes) {
        if self.rng.gen_bool(self.loss) {
            self.dropped += 1;
            return;
        }
        self.inner.send(bytes);
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.inner.poll()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: Bytes) {
        (**self).send(bytes)
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        (**self).poll()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
