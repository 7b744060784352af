// src/channel/message.rs

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Instant;

use crate::types::TaskHandle;

/// Payload that marks a task's final message, by convention.
///
/// The transport has no ordering, so "done" is a property of the payload,
/// not of arrival order.
pub const DONE_SENTINEL: &str = "done";

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM: usize = 65_507;

/// One datagram as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Address the datagram came from.
    pub source: SocketAddr,
    /// Task registered for `source` via `ResultListener::map_source`, if any.
    pub source_handle: Option<TaskHandle>,
    /// Receive counter per source address, starting at 0.
    pub sequence: u64,
    pub payload: Vec<u8>,
    pub received_at: Instant,
}

impl Message {
    /// Payload as UTF-8 text (invalid sequences replaced).
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn is_done(&self) -> bool {
        self.text().trim() == DONE_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &[u8]) -> Message {
        Message {
            source: "127.0.0.1:4000".parse().unwrap(),
            source_handle: None,
            sequence: 0,
            payload: payload.to_vec(),
            received_at: Instant::now(),
        }
    }

    #[test]
    fn text_is_lossy_utf8() {
        assert_eq!(message(b"3 of 10").text(), "3 of 10");
        assert_eq!(message(&[0x66, 0xff]).text(), "f\u{fffd}");
    }

    #[test]
    fn sentinel_detection_ignores_surrounding_whitespace() {
        assert!(message(b"done\n").is_done());
        assert!(!message(b"not done").is_done());
    }
}
