// src/engine/runtime.rs

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::host::TaskHost;
use crate::engine::{HostEvent, RuntimeOptions};
use crate::exec::ProcessState;
use crate::registry::TaskEvent;
use crate::types::TaskHandle;

/// Extra time after the grace period before shutdown stops waiting.
const SHUTDOWN_SLACK: Duration = Duration::from_millis(500);

/// What happened during one `HostRuntime::run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Final state of every task that finished.
    pub finished: BTreeMap<TaskHandle, ProcessState>,
    /// Number of result messages received.
    pub messages: usize,
    /// Whether the run ended because shutdown was requested.
    pub interrupted: bool,
}

impl RunSummary {
    /// True when every finished task exited with code 0.
    pub fn all_succeeded(&self) -> bool {
        self.finished
            .values()
            .all(|state| matches!(state, ProcessState::Exited(0)))
    }

    fn record(&mut self, events: &[HostEvent]) {
        for event in events {
            match event {
                HostEvent::Message(_) => self.messages += 1,
                HostEvent::Task(TaskEvent::Exited { handle, code }) => {
                    self.finished
                        .insert(handle.clone(), ProcessState::Exited(*code));
                }
                HostEvent::Task(TaskEvent::Failed { handle, reason }) => {
                    self.finished
                        .insert(handle.clone(), ProcessState::Failed(reason.clone()));
                }
                HostEvent::Task(TaskEvent::Started { .. }) => {}
            }
        }
    }
}

/// Async loop that drives [`TaskHost::tick`] on an interval.
///
/// This is the IO shell around the host: it owns the timer and the shutdown
/// signal, while all task semantics stay in `TaskHost`.
#[derive(Debug)]
pub struct HostRuntime {
    host: TaskHost,
    options: RuntimeOptions,
}

impl HostRuntime {
    pub fn new(host: TaskHost, options: RuntimeOptions) -> Self {
        Self { host, options }
    }

    pub fn host(&self) -> &TaskHost {
        &self.host
    }

    /// Tick until idle (with `exit_when_idle`) or until `shutdown` resolves.
    ///
    /// On shutdown, active tasks are cancelled and the loop keeps ticking
    /// until they are gone or the grace period (plus a little slack) ran out.
    pub async fn run<F>(mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        info!(
            tick_ms = self.options.tick_interval.as_millis() as u64,
            exit_when_idle = self.options.exit_when_idle,
            "taskrelay runtime started"
        );

        let mut summary = RunSummary::default();
        let mut ticker = tokio::time::interval(self.options.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    summary.interrupted = true;
                    break;
                }
                _ = ticker.tick() => {
                    let produced = self.tick_once(&mut summary);
                    // Stop on a quiet tick, so late datagrams from a task
                    // that just exited are still delivered.
                    if self.options.exit_when_idle && produced == 0 && self.host.is_idle() {
                        info!("all tasks finished; stopping runtime");
                        break;
                    }
                }
            }
        }

        if summary.interrupted {
            self.drain_after_shutdown(&mut summary).await;
        }

        info!(
            finished = summary.finished.len(),
            messages = summary.messages,
            "runtime exiting"
        );
        summary
    }

    async fn drain_after_shutdown(&mut self, summary: &mut RunSummary) {
        self.host.shutdown();

        let grace = self.host.registry().launcher().options().grace_period;
        // `None` when the grace period is too large to schedule: wait it out.
        let deadline = grace
            .checked_add(SHUTDOWN_SLACK)
            .and_then(|wait| Instant::now().checked_add(wait));

        while !self.host.is_idle() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    still_active = ?self.host.registry().active(),
                    "tasks still running after shutdown grace period"
                );
                break;
            }
            tokio::time::sleep(self.options.tick_interval).await;
            self.tick_once(summary);
        }
    }

    fn tick_once(&mut self, summary: &mut RunSummary) -> usize {
        let events = self.host.tick();
        for event in &events {
            log_event(event);
        }
        summary.record(&events);
        events.len()
    }
}

fn log_event(event: &HostEvent) {
    match event {
        HostEvent::Message(msg) => {
            info!(
                source = %msg.source,
                task = ?msg.source_handle.as_ref().map(TaskHandle::as_str),
                seq = msg.sequence,
                done = msg.is_done(),
                "message: {}",
                msg.text()
            );
        }
        HostEvent::Task(TaskEvent::Started { handle, pid }) => {
            debug!(task = %handle, pid = ?pid, "task started");
        }
        HostEvent::Task(TaskEvent::Exited { handle, code }) => {
            if *code == 0 {
                info!(task = %handle, exit_code = code, "task finished");
            } else {
                warn!(task = %handle, exit_code = code, "task exited with non-zero code");
            }
        }
        HostEvent::Task(TaskEvent::Failed { handle, reason }) => {
            warn!(task = %handle, reason = %reason, "task failed");
        }
    }
}
