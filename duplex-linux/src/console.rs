//! Console collaborators: polled, unbuffered stdin and flushed stdout.

use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use duplex_core::{Display, Input, InputDevice, MAX_MESSAGE_LEN};

/// Splits raw reads into newline-terminated lines of at most `MAX_MESSAGE_LEN` bytes.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    // The last chunk was cut at the message bound rather than at a newline.
    after_cut: bool,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line, or a full-length chunk when no newline fits in one message.
    /// A bare newline that only terminates a cut chunk is swallowed.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let limit = self.pending.len().min(MAX_MESSAGE_LEN);
            let (end, cut) = match self.pending[..limit].iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, false),
                None if self.pending.len() >= MAX_MESSAGE_LEN => (MAX_MESSAGE_LEN, true),
                None => return None,
            };
            let line: Vec<u8> = self.pending.drain(..end).collect();
            let after_cut = std::mem::replace(&mut self.after_cut, cut);
            if after_cut && line == b"\n" {
                continue;
            }
            return Some(line);
        }
    }

    /// Whatever is left, for end of file.
    fn take_rest(&mut self) -> Option<Vec<u8>> {
        self.after_cut = false;
        (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending))
    }
}

/// Keyboard input from stdin. Waits at most one poll interval per read so the input stage
/// can notice a stopped session.
pub struct StdinDevice {
    fd: RawFd,
    poll_interval: Duration,
    lines: LineBuffer,
    eof: bool,
}

impl StdinDevice {
    pub fn new(poll_interval: Duration) -> Self {
        Self::from_fd(io::stdin().as_raw_fd(), poll_interval)
    }

    /// Read from `fd` instead of stdin. The caller keeps `fd` open for the device's lifetime.
    pub(crate) fn from_fd(fd: RawFd, poll_interval: Duration) -> Self {
        Self {
            fd,
            poll_interval,
            lines: LineBuffer::default(),
            eof: false,
        }
    }

    /// True when the fd has data (or hangup) within the poll interval.
    fn poll_readable(&self) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout = self.poll_interval.as_millis().min(i32::MAX as u128) as libc::c_int;
        // SAFETY: `pfd` is a valid pollfd for the duration of the call and nfds is 1.
        let n = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(n > 0)
    }

    /// One unbuffered read(2); std's buffered stdin would hide data from poll.
    fn read_raw(&self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl InputDevice for StdinDevice {
    fn read_input(&mut self) -> io::Result<Input> {
        if let Some(line) = self.lines.next_line() {
            return Ok(Input::Data(line));
        }
        if self.eof {
            return Ok(match self.lines.take_rest() {
                Some(rest) => Input::Data(rest),
                None => Input::Closed,
            });
        }
        if !self.poll_readable()? {
            return Ok(Input::Empty);
        }
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        match self.read_raw(&mut buf) {
            Ok(0) => self.eof = true,
            Ok(n) => self.lines.push(&buf[..n]),
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                return Ok(Input::Empty)
            }
            Err(e) => return Err(e),
        }
        if let Some(line) = self.lines.next_line() {
            return Ok(Input::Data(line));
        }
        if self.eof {
            return Ok(match self.lines.take_rest() {
                Some(rest) => Input::Data(rest),
                None => Input::Closed,
            });
        }
        Ok(Input::Empty)
    }
}

/// Rendered messages go to stdout, flushed per message.
pub struct StdoutDisplay;

impl Display for StdoutDisplay {
    fn write_output(&mut self, text: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text)?;
        out.flush()
    }
}
