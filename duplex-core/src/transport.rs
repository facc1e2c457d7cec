//! Collaborators at the edge of the pipeline: datagram transport, input device, display.

use std::io;

use crate::message::Message;

/// Best-effort datagram link to one fixed peer.
pub trait Transport: Send + Sync {
    /// One-shot delivery to the peer. No retry, no acknowledgment.
    fn send_datagram(&self, msg: &Message) -> Result<(), TransportError>;

    /// Block for one inbound datagram. `Ok(None)` when woken or timed out without a payload.
    fn receive_datagram(&self) -> Result<Option<Message>, TransportError>;

    /// Unblock a thread parked in `receive_datagram`.
    fn wake(&self) {}
}

/// Transport failure. Send failures are recoverable; receive failures end the receive stage.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
}

/// Result of one non-blocking input poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// One line (or chunk) of typed bytes.
    Data(Vec<u8>),
    /// Nothing available within the poll interval.
    Empty,
    /// The device reached end of file.
    Closed,
}

/// Local keyboard/console source. Owned by the input stage.
pub trait InputDevice: Send {
    fn read_input(&mut self) -> io::Result<Input>;
}

/// Local screen sink. Owned by the render stage.
pub trait Display: Send {
    fn write_output(&mut self, text: &[u8]) -> io::Result<()>;
}
