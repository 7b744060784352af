// src/channel/mod.rs

//! Result channel: best-effort UDP datagrams from launched tasks to the host.
//!
//! Datagrams may be lost, duplicated or reordered. Messages are delivered in
//! arrival order and nothing more; anything like "this was the last message"
//! belongs in the payload (see [`DONE_SENTINEL`]).
//!
//! Several tasks may share one listener. The transport carries no task
//! identity, so correlating a datagram with a task is up to the caller,
//! either through payload content or [`ResultListener::map_source`].

pub mod listener;
pub mod message;
pub mod sender;

pub use listener::ResultListener;
pub use message::{DONE_SENTINEL, MAX_DATAGRAM, Message};
pub use sender::{RESULT_ADDR_ENV, ResultSender, TASK_ENV, send, send_to_port};
