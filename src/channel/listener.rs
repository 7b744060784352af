// src/channel/listener.rs

//! Host side of the result channel.
//!
//! The socket is bound synchronously so a busy port is reported to the
//! caller right away. Receiving happens on a background Tokio task; parsed
//! messages are handed over through an unbounded mpsc queue, which the host
//! drains without blocking.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::message::{MAX_DATAGRAM, Message};
use crate::errors::{Result, TaskrelayError};
use crate::types::TaskHandle;

type SourceMap = Arc<Mutex<HashMap<SocketAddr, TaskHandle>>>;

/// A bound listener and the stream of messages it has received.
///
/// Stopping (or dropping) the listener ends the background receiver; to
/// listen again, bind a new one.
#[derive(Debug)]
pub struct ResultListener {
    local_addr: SocketAddr,
    rx: mpsc::UnboundedReceiver<Message>,
    sources: SourceMap,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ResultListener {
    /// Bind `addr` and start receiving. Must be called within a Tokio runtime.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source: std::io::Error| TaskrelayError::ChannelBind { addr, source };

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| bind_err(std::io::Error::other(e.to_string())))?;

        let std_socket = std::net::UdpSocket::bind(addr).map_err(bind_err)?;
        std_socket.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_socket.local_addr().map_err(bind_err)?;

        let socket = {
            let _guard = runtime.enter();
            UdpSocket::from_std(std_socket).map_err(bind_err)?
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let sources: SourceMap = Arc::new(Mutex::new(HashMap::new()));

        let task = runtime.spawn(receive_loop(socket, tx, Arc::clone(&sources), stop_rx));

        info!(addr = %local_addr, "result listener bound");

        Ok(Self {
            local_addr,
            rx,
            sources,
            stop_tx: Some(stop_tx),
            task,
        })
    }

    /// Bind `127.0.0.1:<port>`; port 0 picks a free port.
    pub fn bind_port(port: u16) -> Result<Self> {
        Self::bind((Ipv4Addr::LOCALHOST, port).into())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Attribute datagrams from `addr` to `handle`.
    pub fn map_source(&self, addr: SocketAddr, handle: TaskHandle) {
        let mut sources = self.sources.lock().unwrap_or_else(|p| p.into_inner());
        sources.insert(addr, handle);
    }

    /// Next already-received message, without waiting.
    pub fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// All already-received messages, in arrival order, without waiting.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Wait for the next message. `None` once the listener has stopped and
    /// every received message was consumed.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
            debug!(addr = %self.local_addr, "result listener stop requested");
        }
    }
}

impl Drop for ResultListener {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn receive_loop(
    socket: UdpSocket,
    tx: mpsc::UnboundedSender<Message>,
    sources: SourceMap,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut sequences: HashMap<SocketAddr, u64> = HashMap::new();

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                debug!("result listener stopping");
                break;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        // e.g. ICMP "port unreachable" surfacing as ECONNRESET on some platforms
                        warn!(error = %e, "datagram receive failed");
                        continue;
                    }
                };

                let counter = sequences.entry(from).or_insert(0);
                let sequence = *counter;
                *counter += 1;

                let source_handle = sources
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .get(&from)
                    .cloned();

                debug!(source = %from, seq = sequence, len, "datagram received");

                let message = Message {
                    source: from,
                    source_handle,
                    sequence,
                    payload: buf[..len].to_vec(),
                    received_at: Instant::now(),
                };

                if tx.send(message).is_err() {
                    debug!("result consumer dropped; listener exiting");
                    break;
                }
            }
        }
    }
}
