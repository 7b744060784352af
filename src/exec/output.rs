// src/exec/output.rs

//! Drain child stdout/stderr into the log so pipe buffers never fill.
//!
//! The host only ever surfaces "exited with code N"; whatever a child prints
//! is diagnostic text and goes to `tracing` at debug level.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Spawn a background reader that logs every line of `pipe`.
pub fn forward_lines<R>(task: String, stream: &'static str, pipe: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let reader = BufReader::new(pipe);
        let mut lines = reader.lines();

        while let Ok(Some(line)) = lines.next_line().await {
            debug!(task = %task, stream, "{}", line);
        }

        debug!(task = %task, stream, "output stream closed");
    });
}
