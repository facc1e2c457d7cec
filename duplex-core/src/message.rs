//! Chat payloads and the termination token.

use std::borrow::Cow;

/// Largest payload carried in one datagram.
pub const MAX_MESSAGE_LEN: usize = 256;

/// Reserved payload that ends a session. Never rendered or forwarded as chat text.
pub const TERMINATION_TOKEN: &[u8] = b"!";

/// Immutable chat payload: non-empty, at most `MAX_MESSAGE_LEN` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(Box<[u8]>);

impl Message {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, MessageError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(MessageError::Empty);
        }
        if bytes.len() > MAX_MESSAGE_LEN {
            return Err(MessageError::TooLong {
                len: bytes.len(),
                max: MAX_MESSAGE_LEN,
            });
        }
        Ok(Self(bytes.into_boxed_slice()))
    }

    /// The token as typed at a console: `!` followed by a newline.
    pub fn termination() -> Self {
        Self(b"!\n".to_vec().into_boxed_slice())
    }

    /// True for `!`, `!\n` and `!\r\n`.
    pub fn is_termination(&self) -> bool {
        is_termination(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view for logs.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Check raw bytes for the termination token, tolerating one trailing line ending.
pub fn is_termination(bytes: &[u8]) -> bool {
    let trimmed = bytes
        .strip_suffix(b"\n")
        .map(|b| b.strip_suffix(b"\r").unwrap_or(b))
        .unwrap_or(bytes);
    trimmed == TERMINATION_TOKEN
}

/// Error building a `Message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("empty message")]
    Empty,
    #[error("message of {len} bytes exceeds {max}")]
    TooLong { len: usize, max: usize },
}
