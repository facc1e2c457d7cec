//! The four stage loops. Each runs on its own thread until the run flag clears or its
//! channel closes.
//!
//! keyboard -> `input_loop` -> outbound -> `transmit_loop` -> transport
//! transport -> `receive_loop` -> inbound -> `render_loop` -> screen

use crate::channel::SyncChannel;
use crate::control::{EndReason, SessionControl, SessionStats};
use crate::message::Message;
use crate::transport::{Display, Input, InputDevice, Transport};

/// Send the termination token straight through the transport, ahead of anything queued on
/// the outbound channel. Closing the session must not wait behind backlogged chat.
pub fn send_urgent(transport: &dyn Transport, token: &Message) {
    if let Err(e) = transport.send_datagram(token) {
        tracing::warn!(error = %e, "termination token not delivered to peer");
    }
}

pub fn input_loop(
    input: &mut dyn InputDevice,
    transport: &dyn Transport,
    outbound: &SyncChannel<Message>,
    control: &SessionControl,
    stats: &SessionStats,
) {
    while control.is_running() {
        let bytes = match input.read_input() {
            Ok(Input::Data(bytes)) => bytes,
            Ok(Input::Empty) => continue,
            Ok(Input::Closed) => {
                tracing::info!("input closed, ending session");
                if control.stop(EndReason::InputClosed) {
                    send_urgent(transport, &Message::termination());
                }
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "input device failed, ending session");
                if control.stop(EndReason::InputClosed) {
                    send_urgent(transport, &Message::termination());
                }
                break;
            }
        };
        let msg = match Message::new(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "input skipped");
                continue;
            }
        };
        if msg.is_termination() {
            if control.stop(EndReason::LocalQuit) {
                send_urgent(transport, &msg);
            }
            break;
        }
        if let Err(e) = outbound.push(msg) {
            tracing::error!(error = %e, "outbound queue full, message dropped");
            stats.record_dropped();
        }
    }
    tracing::debug!("input stage exited");
}

pub fn transmit_loop(
    transport: &dyn Transport,
    outbound: &SyncChannel<Message>,
    control: &SessionControl,
    stats: &SessionStats,
    max_consecutive_failures: Option<u32>,
) {
    let mut consecutive = 0u32;
    while control.is_running() {
        let Some(msg) = outbound.pop_blocking() else {
            break;
        };
        match transport.send_datagram(&msg) {
            Ok(()) => {
                consecutive = 0;
                stats.record_sent();
            }
            Err(e) => {
                consecutive += 1;
                stats.record_send_failure();
                tracing::warn!(error = %e, consecutive, "send failed, continuing");
                if max_consecutive_failures.is_some_and(|max| consecutive >= max) {
                    tracing::error!(consecutive, "send failure limit reached, ending session");
                    control.stop(EndReason::SendFailures);
                }
            }
        }
    }
    tracing::debug!("transmit stage exited");
}

pub fn receive_loop(
    transport: &dyn Transport,
    inbound: &SyncChannel<Message>,
    control: &SessionControl,
    stats: &SessionStats,
) {
    while control.is_running() {
        let msg = match transport.receive_datagram() {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "receive failed, ending session");
                control.stop(EndReason::ReceiveFailure);
                // Let the render stage see an orderly end.
                if inbound.push(Message::termination()).is_err() {
                    inbound.close();
                }
                break;
            }
        };
        if msg.is_termination() {
            tracing::info!("peer ended the session");
            control.stop(EndReason::RemoteQuit);
            if inbound.push(msg).is_err() {
                inbound.close();
            }
            break;
        }
        stats.record_received();
        if let Err(e) = inbound.push(msg) {
            tracing::error!(error = %e, "inbound queue full, message dropped");
            stats.record_dropped();
        }
    }
    tracing::debug!("receive stage exited");
}

/// Runs until the token or a closed, drained channel. The run flag is not consulted: the
/// receive stage clears it before pushing the token, and chat queued ahead of the token
/// must still reach the screen.
pub fn render_loop(
    display: &mut dyn Display,
    inbound: &SyncChannel<Message>,
    stats: &SessionStats,
    prefix: &str,
) {
    while let Some(msg) = inbound.pop_blocking() {
        if msg.is_termination() {
            break;
        }
        let mut line = Vec::with_capacity(prefix.len() + msg.len());
        line.extend_from_slice(prefix.as_bytes());
        line.extend_from_slice(msg.as_bytes());
        match display.write_output(&line) {
            Ok(()) => stats.record_rendered(),
            Err(e) => tracing::warn!(error = %e, "display write failed"),
        }
    }
    tracing::debug!("render stage exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Message>>,
        inbound: Mutex<VecDeque<Result<Option<Message>, TransportError>>>,
        fail_sends: bool,
    }

    impl Transport for RecordingTransport {
        fn send_datagram(&self, msg: &Message) -> Result<(), TransportError> {
            if self.fail_sends {
                return Err(TransportError::Send(io::Error::other("unreachable")));
            }
            self.sent.lock().push(msg.clone());
            Ok(())
        }

        fn receive_datagram(&self) -> Result<Option<Message>, TransportError> {
            self.inbound.lock().pop_front().unwrap_or(Ok(None))
        }
    }

    struct Script(VecDeque<io::Result<Input>>);

    impl InputDevice for Script {
        fn read_input(&mut self) -> io::Result<Input> {
            self.0.pop_front().unwrap_or(Ok(Input::Closed))
        }
    }

    #[derive(Default)]
    struct Screen(Vec<u8>);

    impl Display for Screen {
        fn write_output(&mut self, text: &[u8]) -> io::Result<()> {
            self.0.extend_from_slice(text);
            Ok(())
        }
    }

    fn msg(s: &str) -> Message {
        Message::new(s).unwrap()
    }

    fn data(s: &str) -> io::Result<Input> {
        Ok(Input::Data(s.as_bytes().to_vec()))
    }

    #[test]
    fn input_queues_chat_and_sends_token_directly() {
        let transport = RecordingTransport::default();
        let outbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        let mut script = Script(VecDeque::from([
            data("hi\n"),
            Ok(Input::Empty),
            data("there\n"),
            data("!\n"),
            data("never\n"),
        ]));
        input_loop(&mut script, &transport, &outbound, &control, &stats);

        assert_eq!(control.end_reason(), Some(EndReason::LocalQuit));
        assert_eq!(transport.sent.lock().as_slice(), &[msg("!\n")]);
        assert_eq!(outbound.try_pop(), Some(msg("hi\n")));
        assert_eq!(outbound.try_pop(), Some(msg("there\n")));
        assert_eq!(outbound.try_pop(), None);
    }

    #[test]
    fn input_end_of_file_ends_session() {
        let transport = RecordingTransport::default();
        let outbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let mut script = Script(VecDeque::from([data("last\n")]));
        input_loop(&mut script, &transport, &outbound, &control, &SessionStats::default());
        assert_eq!(control.end_reason(), Some(EndReason::InputClosed));
        assert_eq!(transport.sent.lock().as_slice(), &[Message::termination()]);
        assert_eq!(outbound.len(), 1);
    }

    #[test]
    fn input_counts_drops_when_queue_full() {
        let transport = RecordingTransport::default();
        let outbound = SyncChannel::new(1).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        let mut script = Script(VecDeque::from([data("a\n"), data("b\n"), data("!")]));
        input_loop(&mut script, &transport, &outbound, &control, &stats);
        assert_eq!(stats.snapshot().dropped, 1);
        assert_eq!(outbound.try_pop(), Some(msg("a\n")));
    }

    #[test]
    fn transmit_sends_in_order_until_closed() {
        let transport = RecordingTransport::default();
        let outbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        outbound.push(msg("one\n")).unwrap();
        outbound.push(msg("two\n")).unwrap();
        outbound.close();
        transmit_loop(&transport, &outbound, &control, &stats, None);
        assert_eq!(transport.sent.lock().as_slice(), &[msg("one\n"), msg("two\n")]);
        assert_eq!(stats.snapshot().sent, 2);
        assert!(control.is_running());
    }

    #[test]
    fn transmit_tolerates_send_failures_by_default() {
        let transport = RecordingTransport {
            fail_sends: true,
            ..Default::default()
        };
        let outbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        for _ in 0..5 {
            outbound.push(msg("x\n")).unwrap();
        }
        outbound.close();
        transmit_loop(&transport, &outbound, &control, &stats, None);
        assert_eq!(stats.snapshot().send_failures, 5);
        assert!(control.is_running());
    }

    #[test]
    fn transmit_failure_limit_stops_session() {
        let transport = RecordingTransport {
            fail_sends: true,
            ..Default::default()
        };
        let outbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        for _ in 0..5 {
            outbound.push(msg("x\n")).unwrap();
        }
        transmit_loop(&transport, &outbound, &control, &stats, Some(3));
        assert_eq!(control.end_reason(), Some(EndReason::SendFailures));
        assert_eq!(stats.snapshot().send_failures, 3);
        assert_eq!(outbound.len(), 2);
    }

    #[test]
    fn receive_forwards_then_stops_on_token() {
        let transport = RecordingTransport::default();
        transport.inbound.lock().extend([
            Ok(Some(msg("hello\n"))),
            Ok(None),
            Ok(Some(msg("!"))),
            Ok(Some(msg("late\n"))),
        ]);
        let inbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        receive_loop(&transport, &inbound, &control, &stats);
        assert_eq!(control.end_reason(), Some(EndReason::RemoteQuit));
        assert_eq!(inbound.try_pop(), Some(msg("hello\n")));
        assert_eq!(inbound.try_pop(), Some(msg("!")));
        assert_eq!(inbound.try_pop(), None);
        assert_eq!(stats.snapshot().received, 1);
    }

    #[test]
    fn receive_error_is_terminal() {
        let transport = RecordingTransport::default();
        transport.inbound.lock().extend([
            Err(TransportError::Receive(io::Error::other("socket gone"))),
            Ok(Some(msg("unreached\n"))),
        ]);
        let inbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        receive_loop(&transport, &inbound, &control, &SessionStats::default());
        assert_eq!(control.end_reason(), Some(EndReason::ReceiveFailure));
        assert!(inbound.try_pop().is_some_and(|m| m.is_termination()));
        assert_eq!(transport.inbound.lock().len(), 1);
    }

    #[test]
    fn render_prefixes_and_stops_at_token() {
        let inbound = SyncChannel::new(8).unwrap();
        inbound.push(msg("hello\n")).unwrap();
        inbound.push(msg("!\n")).unwrap();
        inbound.push(msg("after\n")).unwrap();
        let stats = SessionStats::default();
        let mut screen = Screen::default();
        render_loop(&mut screen, &inbound, &stats, "Received > ");
        assert_eq!(screen.0, b"Received > hello\n");
        assert_eq!(stats.snapshot().rendered, 1);
        assert_eq!(inbound.try_pop(), Some(msg("after\n")));
    }

    #[test]
    fn render_shows_chat_queued_ahead_of_peer_quit() {
        let transport = RecordingTransport::default();
        transport.inbound.lock().extend([
            Ok(Some(msg("a\n"))),
            Ok(Some(msg("b\n"))),
            Ok(Some(msg("c\n"))),
            Ok(Some(msg("!\n"))),
        ]);
        let inbound = SyncChannel::new(8).unwrap();
        let control = SessionControl::new();
        let stats = SessionStats::default();
        receive_loop(&transport, &inbound, &control, &stats);
        assert!(!control.is_running());

        let mut screen = Screen::default();
        render_loop(&mut screen, &inbound, &stats, "> ");
        assert_eq!(screen.0, b"> a\n> b\n> c\n");
        assert_eq!(stats.snapshot().rendered, 3);
        assert!(inbound.is_empty());
    }

    #[test]
    fn render_drains_closed_channel() {
        let chan = SyncChannel::new(4).unwrap();
        chan.push(msg("queued\n")).unwrap();
        chan.close();
        let mut screen = Screen::default();
        render_loop(&mut screen, &chan, &SessionStats::default(), "> ");
        assert_eq!(screen.0, b"> queued\n");
    }

    #[test]
    fn stopped_session_does_not_transmit() {
        let transport = RecordingTransport::default();
        let chan = SyncChannel::new(4).unwrap();
        chan.push(msg("queued\n")).unwrap();
        let control = SessionControl::new();
        control.stop(EndReason::Interrupted);
        transmit_loop(&transport, &chan, &control, &SessionStats::default(), None);
        assert!(transport.sent.lock().is_empty());
        assert_eq!(chan.len(), 1);
    }
}
