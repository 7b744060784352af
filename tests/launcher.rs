use std::sync::Arc;
use std::time::{Duration, Instant};

use taskrelay::errors::TaskrelayError;
use taskrelay::exec::{LauncherOptions, ProcessLauncher, ProcessState};
use taskrelay::fs::mock::MockFileSystem;
use taskrelay::task::TaskDescriptor;
use taskrelay_test_utils::scripts::{ScriptDir, sh_command};
use taskrelay_test_utils::{eventually, init_tracing, with_timeout};

fn quick_launcher() -> ProcessLauncher {
    ProcessLauncher::new(LauncherOptions {
        grace_period: Duration::from_millis(200),
        log_output: true,
    })
}

#[tokio::test]
async fn launch_returns_before_a_sleeping_child_finishes() {
    init_tracing();
    let launcher = quick_launcher();

    let started = Instant::now();
    let handle = launcher.launch(&sh_command("sleep 5")).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(launcher.poll(&handle), ProcessState::Running);
    launcher.terminate(&handle).unwrap();

    let state = with_timeout(eventually(Duration::from_secs(3), || {
        Some(launcher.poll(&handle)).filter(ProcessState::is_finished)
    }))
    .await;
    assert!(matches!(state, Some(ProcessState::Exited(_))));
}

#[tokio::test]
async fn exit_codes_are_reported() {
    init_tracing();
    let launcher = quick_launcher();
    let handle = launcher.launch(&sh_command("exit 3")).unwrap();

    let state = eventually(Duration::from_secs(3), || {
        Some(launcher.poll(&handle)).filter(ProcessState::is_finished)
    })
    .await;
    assert_eq!(state, Some(ProcessState::Exited(3)));

    // Terminating after exit is a no-op.
    launcher.terminate(&handle).unwrap();
    assert_eq!(launcher.poll(&handle), ProcessState::Exited(3));
}

#[tokio::test]
async fn sigterm_is_escalated_to_kill_after_the_grace_period() {
    init_tracing();
    let launcher = quick_launcher();
    let handle = launcher
        .launch(&sh_command("trap '' TERM; sleep 5"))
        .unwrap();

    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(100)).await;
    launcher.terminate(&handle).unwrap();

    let state = eventually(Duration::from_secs(3), || {
        Some(launcher.poll(&handle)).filter(ProcessState::is_finished)
    })
    .await;
    assert!(state.is_some(), "child survived SIGKILL escalation");
}

#[tokio::test]
async fn script_runs_in_its_working_directory() {
    init_tracing();
    let scripts = ScriptDir::new();
    let desc = scripts.sh_task("touch.sh", "touch marker");

    let launcher = quick_launcher();
    let handle = launcher.launch(&desc).unwrap();
    let state = eventually(Duration::from_secs(3), || {
        Some(launcher.poll(&handle)).filter(ProcessState::is_finished)
    })
    .await;

    assert_eq!(state, Some(ProcessState::Exited(0)));
    assert!(scripts.path().join("marker").exists());
}

#[tokio::test]
async fn missing_executable_is_a_launch_error() {
    let launcher = quick_launcher();
    let desc = TaskDescriptor::builder("definitely-not-a-real-binary-7f3a")
        .build()
        .unwrap();

    match launcher.launch(&desc) {
        Err(TaskrelayError::Launch { reason, .. }) => assert!(reason.contains("not found")),
        other => panic!("expected launch error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_script_is_caught_through_the_filesystem() {
    let fs = MockFileSystem::new();
    fs.add_dir("/work");
    fs.add_file("/usr/bin/python3", b"");

    let launcher = quick_launcher().with_filesystem(Arc::new(fs));
    let desc = TaskDescriptor::builder("python3")
        .script("udp_sender.py")
        .working_dir("/work")
        .env("PATH", "/usr/bin")
        .build()
        .unwrap();

    match launcher.launch(&desc) {
        Err(TaskrelayError::Launch { reason, .. }) => assert!(reason.contains("udp_sender.py")),
        other => panic!("expected launch error, got {other:?}"),
    }
}

#[test]
fn launch_outside_a_runtime_is_refused() {
    let launcher = ProcessLauncher::default();
    assert!(matches!(
        launcher.launch(&sh_command("true")),
        Err(TaskrelayError::Launch { .. })
    ));
}
