//! Transport seam between the two parties.

use crate::error::{PsiError, Result};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Point-to-point, blocking message transport.
///
/// `Out` is what this side sends, `In` what it receives, so one
/// implementation type can serve either role. Sends and receives block
/// until the transport completes them; timeouts and retries belong to the
/// implementation. Any transport failure is fatal to the session and must
/// surface as [`PsiError::Channel`].
pub trait Channel<Out, In> {
    /// Deliver one message to the peer.
    fn send(&mut self, message: Out) -> Result<()>;

    /// Block until the peer's next message arrives.
    fn recv(&mut self) -> Result<In>;
}

/// In-process transport over a pair of mpsc queues.
///
/// Used by tests and by deployments that run both parties inside one
/// process. Endpoints come in connected pairs from [`duplex`].
pub struct InMemoryChannel<Out, In> {
    tx: Sender<Out>,
    rx: Receiver<In>,
}

/// Create a connected pair of in-memory endpoints.
///
/// The first endpoint sends `A` and receives `B`; the second is its
/// mirror image.
pub fn duplex<A, B>() -> (InMemoryChannel<A, B>, InMemoryChannel<B, A>) {
    let (a_tx, a_rx) = channel();
    let (b_tx, b_rx) = channel();
    (
        InMemoryChannel { tx: a_tx, rx: b_rx },
        InMemoryChannel { tx: b_tx, rx: a_rx },
    )
}

impl<Out, In> Channel<Out, In> for InMemoryChannel<Out, In> {
    fn send(&mut self, message: Out) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| PsiError::Channel("peer endpoint closed before send".to_string()))
    }

    fn recv(&mut self) -> Result<In> {
        self.rx
            .recv()
            .map_err(|_| PsiError::Channel("peer endpoint closed before receive".to_string()))
    }
}
