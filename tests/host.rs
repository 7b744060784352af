use std::time::Duration;

use taskrelay::codec::Parameters;
use taskrelay::engine::{HostEvent, HostRuntime, RuntimeOptions, TaskHost};
use taskrelay::exec::{LauncherOptions, ProcessLauncher, ProcessState};
use taskrelay::registry::{TaskEvent, TaskRegistry};
use taskrelay::task::TaskDescriptor;
use taskrelay::types::TaskHandle;
use taskrelay_test_utils::scripts::sh_command;
use taskrelay_test_utils::{eventually, init_tracing, with_timeout};

const TASKRELAY_BIN: &str = env!("CARGO_BIN_EXE_taskrelay");

fn host_with_listener() -> TaskHost {
    let registry = TaskRegistry::new(ProcessLauncher::new(LauncherOptions {
        grace_period: Duration::from_millis(200),
        log_output: false,
    }));
    let mut host = TaskHost::new(registry);
    host.listen("127.0.0.1:0".parse().unwrap()).unwrap();
    host
}

#[tokio::test]
async fn child_reports_back_through_injected_address() {
    init_tracing();
    let mut host = host_with_listener();
    let handle = TaskHandle::new("reporter");

    let desc = TaskDescriptor::builder(TASKRELAY_BIN)
        .args(["send", "hello from child"])
        .build()
        .unwrap();
    host.start(handle.clone(), &desc).unwrap();

    let mut events = Vec::new();
    eventually(Duration::from_secs(4), || {
        events.extend(host.tick());
        let got_message = events.iter().any(|e| matches!(e, HostEvent::Message(_)));
        let exited = events
            .iter()
            .any(|e| matches!(e, HostEvent::Task(TaskEvent::Exited { .. })));
        (got_message && exited).then_some(())
    })
    .await
    .expect("no message/exit from child");

    let text: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            HostEvent::Message(m) => Some(m.text().into_owned()),
            _ => None,
        })
        .collect();
    assert_eq!(text, vec!["hello from child"]);
    assert_eq!(host.status(&handle).unwrap(), ProcessState::Exited(0));
}

#[tokio::test]
async fn subscribers_see_every_event() {
    let mut host = host_with_listener();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    host.on_event(move |event| {
        let _ = tx.send(event.clone());
    });

    host.start(TaskHandle::new("quick"), &sh_command("exit 0"))
        .unwrap();

    let mut seen = Vec::new();
    eventually(Duration::from_secs(2), || {
        host.tick();
        while let Ok(e) = rx.try_recv() {
            seen.push(e);
        }
        host.is_idle().then_some(())
    })
    .await
    .expect("task never finished");

    assert!(matches!(seen.first(), Some(HostEvent::Task(TaskEvent::Started { .. }))));
    assert!(matches!(
        seen.last(),
        Some(HostEvent::Task(TaskEvent::Exited { code: 0, .. }))
    ));
}

#[tokio::test]
async fn emit_task_runs_to_completion_under_the_runtime() {
    init_tracing();
    let host = host_with_listener();
    let port = host.result_addr().unwrap().port();

    let params = Parameters::new()
        .with("port", port)
        .with("interval", 0.01)
        .with("loop", 3);
    let desc = TaskDescriptor::builder(TASKRELAY_BIN)
        .arg("emit")
        .parameters(params)
        .schema(taskrelay::emit::schema())
        .build()
        .unwrap();
    let port_arg = port.to_string();
    assert_eq!(
        desc.argv(),
        vec!["emit", "-p", port_arg.as_str(), "-i", "0.01", "-l", "3"]
    );

    let handle = TaskHandle::new("udp-sender-1");
    host.start(handle.clone(), &desc).unwrap();

    let runtime = HostRuntime::new(
        host,
        RuntimeOptions {
            tick_interval: Duration::from_millis(20),
            exit_when_idle: true,
        },
    );
    let summary = with_timeout(runtime.run(std::future::pending::<()>())).await;

    assert!(!summary.interrupted);
    assert_eq!(summary.messages, 4);
    assert_eq!(summary.finished.get(&handle), Some(&ProcessState::Exited(0)));
    assert!(summary.all_succeeded());
}

#[tokio::test]
async fn shutdown_cancels_running_tasks() {
    init_tracing();
    let host = host_with_listener();
    let handle = TaskHandle::new("forever");
    host.start(handle.clone(), &sh_command("sleep 30")).unwrap();

    let runtime = HostRuntime::new(
        host,
        RuntimeOptions {
            tick_interval: Duration::from_millis(20),
            exit_when_idle: false,
        },
    );
    let summary =
        with_timeout(runtime.run(tokio::time::sleep(Duration::from_millis(100)))).await;

    assert!(summary.interrupted);
    assert!(matches!(
        summary.finished.get(&handle),
        Some(ProcessState::Exited(_))
    ));
    assert!(!summary.all_succeeded());
}

#[tokio::test]
async fn shutdown_with_an_unbounded_grace_period_still_drains() {
    init_tracing();
    let registry = TaskRegistry::new(ProcessLauncher::new(LauncherOptions {
        grace_period: Duration::MAX,
        log_output: false,
    }));
    let host = TaskHost::new(registry);
    let handle = TaskHandle::new("patient");
    host.start(handle.clone(), &sh_command("sleep 30")).unwrap();

    let runtime = HostRuntime::new(
        host,
        RuntimeOptions {
            tick_interval: Duration::from_millis(20),
            exit_when_idle: false,
        },
    );
    let summary =
        with_timeout(runtime.run(tokio::time::sleep(Duration::from_millis(100)))).await;

    assert!(summary.interrupted);
    assert!(matches!(
        summary.finished.get(&handle),
        Some(ProcessState::Exited(_))
    ));
}
