// src/emit.rs

//! The `emit` demo task.
//!
//! Decodes its own argv with the flag codec and sends `"<i> of <n>"` to the
//! host every interval, followed by the `done` sentinel.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::{DONE_SENTINEL, ResultSender};
use crate::codec::{ArgSchema, DecodedArgs, FlagSpec};
use crate::errors::{Result, TaskrelayError};

/// Flags understood by `taskrelay emit`.
pub fn schema() -> ArgSchema {
    ArgSchema::new()
        .flag(FlagSpec::new("port").short('p').long("port").required())
        .flag(
            FlagSpec::new("interval")
                .short('i')
                .long("interval")
                .default_value("1"),
        )
        .flag(FlagSpec::new("loop").short('l').long("loop").default_value("10"))
        .flag(FlagSpec::new("host").long("host").default_value("127.0.0.1"))
        .flag(FlagSpec::new("prefix").long("prefix"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmitOptions {
    pub target: SocketAddr,
    pub interval: Duration,
    pub count: u64,
    pub prefix: Option<String>,
}

impl EmitOptions {
    pub fn from_args(args: &DecodedArgs) -> Result<Self> {
        let port: u16 = args.parse("port")?;
        let host: IpAddr = args.parse("host")?;
        let secs: f64 = args.parse("interval")?;
        let interval = Duration::try_from_secs_f64(secs).map_err(|_| {
            TaskrelayError::Decoding(format!("interval '{secs}' is not a valid number of seconds"))
        })?;

        Ok(Self {
            target: SocketAddr::new(host, port),
            interval,
            count: args.parse("loop")?,
            prefix: args.get("prefix").map(str::to_string),
        })
    }

    fn line(&self, i: u64) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix} {i} of {}", self.count),
            None => format!("{i} of {}", self.count),
        }
    }
}

/// Send every message; returns how many datagrams went out.
pub async fn run(options: &EmitOptions) -> usize {
    let sender = ResultSender::new(options.target);
    info!(
        target_addr = %options.target,
        count = options.count,
        interval_ms = options.interval.as_millis() as u64,
        "emit started"
    );

    let mut sent = 0;
    for i in 1..=options.count {
        let line = options.line(i);
        debug!(seq = i, payload = %line, "emit");
        if sender.send(&line) {
            sent += 1;
        }
        if i < options.count {
            tokio::time::sleep(options.interval).await;
        }
    }

    if sender.send(DONE_SENTINEL) {
        sent += 1;
    }
    info!(sent, "emit finished");
    sent
}
