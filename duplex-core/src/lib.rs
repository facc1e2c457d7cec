//! Duplex chat core: pool-backed queues, synchronized channels, the four stage loops and the
//! session orchestrator. Hosts supply the transport, input device and display.

pub mod channel;
pub mod config;
pub mod control;
pub mod message;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod session;
pub mod transport;
pub mod udp;

pub use channel::SyncChannel;
pub use config::{ConfigError, SessionConfig};
pub use control::{EndReason, SessionControl, SessionStats, StatsSnapshot};
pub use message::{Message, MessageError, MAX_MESSAGE_LEN, TERMINATION_TOKEN};
pub use pool::{ListId, ListPool, PoolExhausted, LIST_MAX_NUM_HEADS, LIST_MAX_NUM_NODES};
pub use queue::BoundedQueue;
pub use session::{Session, SessionError, SessionHandle, SessionReport, SessionState};
pub use transport::{Display, Input, InputDevice, Transport, TransportError};
pub use udp::UdpTransport;
