// src/channel/sender.rs

//! Child side of the result channel: fire-and-forget datagrams.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::{debug, warn};

use crate::channel::message::MAX_DATAGRAM;
use crate::errors::{Result, TaskrelayError};

/// Environment variable carrying the host's listener address
/// (e.g. `127.0.0.1:7000`) into launched children.
pub const RESULT_ADDR_ENV: &str = "TASKRELAY_RESULT_ADDR";

/// Environment variable carrying the task handle into launched children.
pub const TASK_ENV: &str = "TASKRELAY_TASK";

/// Reusable datagram sender aimed at one host address.
///
/// Sending never blocks and never fails loudly: problems are logged and
/// reported as `false`. Retrying is up to the caller.
#[derive(Debug)]
pub struct ResultSender {
    socket: Option<UdpSocket>,
    target: SocketAddr,
}

impl ResultSender {
    pub fn new(target: SocketAddr) -> Self {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = match UdpSocket::bind(local).and_then(|s| {
            s.set_nonblocking(true)?;
            Ok(s)
        }) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(target_addr = %target, error = %e, "cannot open sender socket; messages will be dropped");
                None
            }
        };

        Self { socket, target }
    }

    /// Sender aimed at `127.0.0.1:<port>`.
    pub fn to_port(port: u16) -> Self {
        Self::new((Ipv4Addr::LOCALHOST, port).into())
    }

    /// Sender aimed at the address in [`RESULT_ADDR_ENV`].
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(RESULT_ADDR_ENV).map_err(|_| {
            TaskrelayError::ConfigError(format!("{RESULT_ADDR_ENV} is not set"))
        })?;
        let addr = raw.trim().parse::<SocketAddr>().map_err(|e| {
            TaskrelayError::ConfigError(format!("{RESULT_ADDR_ENV}='{raw}' is not a socket address: {e}"))
        })?;
        Ok(Self::new(addr))
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one datagram. Returns whether the OS accepted it.
    pub fn send(&self, payload: impl AsRef<[u8]>) -> bool {
        let payload = payload.as_ref();
        let Some(socket) = &self.socket else {
            return false;
        };

        if payload.len() > MAX_DATAGRAM {
            warn!(
                target_addr = %self.target,
                len = payload.len(),
                "payload too large for one datagram; dropped"
            );
            return false;
        }

        match socket.send_to(payload, self.target) {
            Ok(_) => {
                debug!(target_addr = %self.target, len = payload.len(), "datagram sent");
                true
            }
            Err(e) => {
                warn!(target_addr = %self.target, error = %e, "datagram send failed");
                false
            }
        }
    }
}

/// One-shot send to `target`.
pub fn send(target: SocketAddr, payload: impl AsRef<[u8]>) -> bool {
    ResultSender::new(target).send(payload)
}

/// One-shot send to `127.0.0.1:<port>`.
pub fn send_to_port(port: u16, payload: impl AsRef<[u8]>) -> bool {
    ResultSender::to_port(port).send(payload)
}
