// tests/background_jobs.rs

use shellwire::errors::ShellwireError;
use shellwire::{Output, Session};
use shellwire_test_utils::init_tracing;

#[test]
fn test_background_call_is_registered_until_waited() {
    init_tracing();
    let session = Session::new();

    let inv = session
        .binding("sleep")
        .call()
        .arg("0.2")
        .background(true)
        .spawn()
        .unwrap();

    assert!(inv.is_background());
    assert_eq!(session.jobs(), vec![inv.pid()]);

    assert_eq!(inv.wait().unwrap(), 0);
    assert!(inv.is_finished());
    assert!(session.jobs().is_empty());
}

#[test]
fn test_background_control_key() {
    init_tracing();
    let session = Session::new();

    let inv = session
        .binding("true")
        .call()
        .flag("_bg", true)
        .spawn()
        .unwrap();

    assert!(inv.is_background());
    assert_eq!(inv.wait().unwrap(), 0);
}

#[test]
fn test_wait_pending_collects_in_spawn_order() {
    init_tracing();
    let session = Session::new();

    let a = session
        .binding("sh")
        .call()
        .args(["-c", "sleep 0.1; exit 2"])
        .background(true)
        .spawn()
        .unwrap();
    let b = session
        .binding("true")
        .call()
        .background(true)
        .spawn()
        .unwrap();

    let codes = session.wait_pending().unwrap();

    assert_eq!(codes, vec![(a.pid(), 2), (b.pid(), 0)]);
    assert!(session.jobs().is_empty());
    // The handles see the status collected by the session.
    assert!(a.is_finished());
    assert_eq!(b.exit_code().unwrap(), 0);
}

#[test]
fn test_foreground_call_reaps_finished_background_jobs() {
    init_tracing();
    let session = Session::new();

    let bg = session
        .binding("true")
        .call()
        .background(true)
        .spawn()
        .unwrap();
    // Long enough for `true` to have exited.
    session.binding("sleep").run(["0.2"]).unwrap();

    assert!(session.jobs().is_empty());
    assert!(bg.is_finished());
    assert_eq!(bg.exit_code().unwrap(), 0);
}

#[test]
fn test_reap_finished_leaves_running_jobs() {
    init_tracing();
    let session = Session::new();

    let slow = session
        .binding("sleep")
        .call()
        .arg("1")
        .background(true)
        .spawn()
        .unwrap();

    assert!(session.reap_finished().is_empty());
    assert_eq!(session.jobs(), vec![slow.pid()]);
    assert_eq!(slow.wait().unwrap(), 0);
}

#[test]
fn test_background_capture_reads_lazily() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("printf")
        .call()
        .arg("late\\nlater\\n")
        .stdout(Output::Capture)
        .background(true)
        .spawn()
        .unwrap();

    let lines: Vec<String> = inv.lines().collect::<Result<_, _>>().unwrap();

    assert_eq!(lines, vec!["late", "later"]);
    // Exhausting the lines waited for the process.
    assert!(inv.is_finished());
}

#[test]
fn test_background_failure_surfaces_on_wait() {
    init_tracing();
    let session = Session::new();
    session.set_fail_on_nonzero(true);

    let inv = session
        .binding("false")
        .call()
        .background(true)
        .spawn()
        .unwrap();

    assert!(matches!(
        inv.wait(),
        Err(ShellwireError::ExecutionFailure { code: 1, .. })
    ));
}

#[test]
fn test_lines_yields_policy_error_last() {
    init_tracing();
    let session = Session::new();
    session.set_fail_on_nonzero(true);

    let mut inv = session
        .binding("sh")
        .call()
        .args(["-c", "echo partial; exit 5"])
        .stdout(Output::Capture)
        .background(true)
        .spawn()
        .unwrap();

    let items: Vec<_> = inv.lines().collect();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert!(matches!(
        items[1],
        Err(ShellwireError::ExecutionFailure { code: 5, .. })
    ));
}
