//! Orchestrator: starts the four stage threads and tears them down in order.
//!
//! Shutdown is cooperative. The run flag is cleared, both channels are closed (which
//! broadcasts their condvars) and the transport is woken, so every stage observes the stop
//! on its next wake and returns on its own. No thread is ever forcibly cancelled.
//!
//! States: `Running` until the input stage has exited and been joined, `Closing` while the
//! other three are woken and joined, `Joined` once all four are gone and both queues freed.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::channel::SyncChannel;
use crate::config::{ConfigError, SessionConfig};
use crate::control::{EndReason, SessionControl, SessionStats, StatsSnapshot};
use crate::message::Message;
use crate::pipeline::{self, send_urgent};
use crate::pool::PoolExhausted;
use crate::transport::{Display, InputDevice, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Running = 0,
    Closing = 1,
    Joined = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Running,
            1 => SessionState::Closing,
            _ => SessionState::Joined,
        }
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub state: SessionState,
    pub end_reason: Option<EndReason>,
    pub stats: StatsSnapshot,
    /// Messages still queued when the session ended (both directions).
    pub undelivered: usize,
}

/// Error starting a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session config: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot allocate channel queue: {0}")]
    Pool(#[from] PoolExhausted),
    #[error("cannot spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Run flag, counters and lifecycle state. Handles keep only this (and the transport), so
/// they never stop the queues from being freed.
struct Status {
    control: SessionControl,
    stats: SessionStats,
    state: AtomicU8,
}

impl Status {
    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// State shared between the session and its stages.
struct Shared {
    status: Arc<Status>,
    transport: Arc<dyn Transport>,
    outbound: SyncChannel<Message>,
    inbound: SyncChannel<Message>,
}

impl Shared {
    /// Clear the flag (if nobody has yet), then wake every blocked stage. Safe to repeat.
    fn shutdown(&self, reason: EndReason) {
        self.status.control.stop(reason);
        self.outbound.close();
        self.inbound.close();
        self.transport.wake();
    }
}

#[derive(Default)]
struct Stages {
    input: Option<JoinHandle<()>>,
    transmit: Option<JoinHandle<()>>,
    receive: Option<JoinHandle<()>>,
    render: Option<JoinHandle<()>>,
}

/// A running chat session. Call `wait` to block until it ends; dropping it shuts it down.
pub struct Session {
    shared: Option<Arc<Shared>>,
    stages: Stages,
}

/// Cloneable view of a running session, usable from other threads (signal handlers).
#[derive(Clone)]
pub struct SessionHandle {
    status: Arc<Status>,
    transport: Arc<dyn Transport>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.status.control.end_reason()
    }

    pub fn is_running(&self) -> bool {
        self.status.control.is_running()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.status.stats.snapshot()
    }

    /// End the session from outside the pipeline, telling the peer first.
    /// Returns false if the session was already stopping.
    pub fn interrupt(&self) -> bool {
        if !self.status.control.is_running() {
            return false;
        }
        send_urgent(self.transport.as_ref(), &Message::termination());
        let stopped = self.status.control.stop(EndReason::Interrupted);
        self.transport.wake();
        stopped
    }
}

impl Session {
    /// Validate the config, create both channels and spawn the four stage threads.
    pub fn start(
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        mut input: Box<dyn InputDevice>,
        mut display: Box<dyn Display>,
    ) -> Result<Session, SessionError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            status: Arc::new(Status {
                control: SessionControl::new(),
                stats: SessionStats::default(),
                state: AtomicU8::new(SessionState::Running as u8),
            }),
            transport,
            outbound: SyncChannel::new(config.queue_capacity)?,
            inbound: SyncChannel::new(config.queue_capacity)?,
        });
        let mut session = Session {
            shared: Some(shared.clone()),
            stages: Stages::default(),
        };

        let s = shared.clone();
        session.stages.input = Some(spawn("duplex-input", move || {
            pipeline::input_loop(
                input.as_mut(),
                s.transport.as_ref(),
                &s.outbound,
                &s.status.control,
                &s.status.stats,
            )
        })?);
        let s = shared.clone();
        let max_failures = config.max_consecutive_send_failures;
        session.stages.transmit = Some(spawn("duplex-transmit", move || {
            pipeline::transmit_loop(
                s.transport.as_ref(),
                &s.outbound,
                &s.status.control,
                &s.status.stats,
                max_failures,
            )
        })?);
        let s = shared.clone();
        session.stages.receive = Some(spawn("duplex-receive", move || {
            pipeline::receive_loop(
                s.transport.as_ref(),
                &s.inbound,
                &s.status.control,
                &s.status.stats,
            )
        })?);
        let s = shared;
        let prefix = config.render_prefix.clone();
        session.stages.render = Some(spawn("duplex-render", move || {
            pipeline::render_loop(display.as_mut(), &s.inbound, &s.status.stats, &prefix)
        })?);

        tracing::info!(capacity = config.queue_capacity, "session started");
        Ok(session)
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.shared.as_ref().map(|shared| SessionHandle {
            status: shared.status.clone(),
            transport: shared.transport.clone(),
        })
    }

    /// Block until the local input stage exits, then tear down the rest.
    pub fn wait(mut self) -> SessionReport {
        self.join_all()
    }

    fn join_all(&mut self) -> SessionReport {
        let Some(shared) = self.shared.take() else {
            return SessionReport {
                state: SessionState::Joined,
                end_reason: None,
                stats: StatsSnapshot::default(),
                undelivered: 0,
            };
        };

        join("duplex-input", self.stages.input.take());
        shared.status.set_state(SessionState::Closing);
        shared.shutdown(EndReason::LocalQuit);
        join("duplex-transmit", self.stages.transmit.take());
        join("duplex-render", self.stages.render.take());
        join("duplex-receive", self.stages.receive.take());

        let status = shared.status.clone();
        let end_reason = status.control.end_reason();
        let stats = status.stats.snapshot();
        let undelivered = free_queues(shared);
        status.set_state(SessionState::Joined);
        tracing::info!(?end_reason, ?stats, undelivered, "session joined");
        SessionReport {
            state: SessionState::Joined,
            end_reason,
            stats,
            undelivered,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            // Without this the input stage would run until the user typed `!`.
            shared.shutdown(EndReason::Interrupted);
            self.join_all();
        }
    }
}

/// Return both queues' nodes and heads to their pools; counts what was still queued.
/// Called after every stage is joined, when the session holds the only reference.
fn free_queues(shared: Arc<Shared>) -> usize {
    match Arc::try_unwrap(shared) {
        Ok(shared) => shared.outbound.into_queue().free() + shared.inbound.into_queue().free(),
        Err(shared) => {
            tracing::warn!("channel queues still referenced after join, left to drop");
            shared.outbound.len() + shared.inbound.len()
        }
    }
}

fn spawn<F>(name: &'static str, f: F) -> Result<JoinHandle<()>, SessionError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| SessionError::Spawn { name, source })
}

fn join(name: &str, handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.join().is_err() {
            tracing::error!(thread = name, "stage thread panicked");
        }
    }
}
