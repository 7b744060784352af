// src/engine/host.rs

//! The host-facing façade and its per-iteration `tick()`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{debug, info};

use crate::channel::{RESULT_ADDR_ENV, ResultListener, TASK_ENV};
use crate::engine::HostEvent;
use crate::errors::Result;
use crate::exec::{ProcessHandle, ProcessState};
use crate::registry::TaskRegistry;
use crate::task::TaskDescriptor;
use crate::types::TaskHandle;

type Subscriber = Box<dyn FnMut(&HostEvent) + Send>;

/// Registry + optional result listener + subscribers.
///
/// The host's own loop calls [`TaskHost::tick`] once per iteration. `tick`
/// never waits: it polls children with `try_wait` and drains messages the
/// background listener has already queued.
pub struct TaskHost {
    registry: TaskRegistry,
    listener: Option<ResultListener>,
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for TaskHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHost")
            .field("registry", &self.registry)
            .field("listener", &self.listener.as_ref().map(|l| l.local_addr()))
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl TaskHost {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            listener: None,
            subscribers: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: ResultListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Bind a result listener on `addr`, replacing any previous one.
    pub fn listen(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = ResultListener::bind(addr)?;
        let local = listener.local_addr();
        if let Some(mut old) = self.listener.replace(listener) {
            old.stop();
        }
        Ok(local)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn listener(&self) -> Option<&ResultListener> {
        self.listener.as_ref()
    }

    /// Address children should send results to, if a listener is bound.
    pub fn result_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .map(|l| reachable_addr(l.local_addr()))
    }

    pub fn on_event<F>(&mut self, subscriber: F)
    where
        F: FnMut(&HostEvent) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Launch through the registry.
    ///
    /// The child environment gains `TASKRELAY_TASK` and, when a listener is
    /// bound, `TASKRELAY_RESULT_ADDR` (unless the descriptor sets them).
    pub fn start(&self, handle: TaskHandle, descriptor: &TaskDescriptor) -> Result<ProcessHandle> {
        let mut extra = vec![(TASK_ENV.to_string(), handle.to_string())];
        if let Some(addr) = self.result_addr() {
            extra.push((RESULT_ADDR_ENV.to_string(), addr.to_string()));
        }
        let descriptor = descriptor.with_extra_env(extra);
        self.registry.start(handle, descriptor)
    }

    pub fn status(&self, handle: &TaskHandle) -> Result<ProcessState> {
        self.registry.status(handle)
    }

    pub fn cancel(&self, handle: &TaskHandle) -> Result<()> {
        self.registry.cancel(handle)
    }

    /// Non-blocking hook for one iteration of the host loop.
    ///
    /// Messages come first (in arrival order), then lifecycle events. Every
    /// event is passed to each subscriber and also returned.
    pub fn tick(&mut self) -> Vec<HostEvent> {
        let mut events: Vec<HostEvent> = match &mut self.listener {
            Some(listener) => listener.drain().into_iter().map(HostEvent::Message).collect(),
            None => Vec::new(),
        };
        events.extend(self.registry.poll().into_iter().map(HostEvent::Task));

        if !events.is_empty() {
            debug!(count = events.len(), "tick produced events");
        }

        for subscriber in self.subscribers.iter_mut() {
            for event in &events {
                subscriber(event);
            }
        }

        events
    }

    /// No live tasks and nothing left to report.
    pub fn is_idle(&self) -> bool {
        self.registry.is_idle()
    }

    /// Cancel every active task and stop listening.
    pub fn shutdown(&mut self) {
        info!("host shutting down; cancelling active tasks");
        self.registry.cancel_all();
        if let Some(listener) = &mut self.listener {
            listener.stop();
        }
    }
}

/// Children can't send to `0.0.0.0`; point them at loopback instead.
fn reachable_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, addr.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, addr.port()).into(),
        _ => addr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_listener_addresses_become_loopback() {
        assert_eq!(
            reachable_addr("0.0.0.0:7000".parse().unwrap()),
            "127.0.0.1:7000".parse().unwrap()
        );
        assert_eq!(
            reachable_addr("[::]:7000".parse().unwrap()),
            "[::1]:7000".parse().unwrap()
        );
        assert_eq!(
            reachable_addr("192.168.1.5:7000".parse().unwrap()),
            "192.168.1.5:7000".parse().unwrap()
        );
    }
}
