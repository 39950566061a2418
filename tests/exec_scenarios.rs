// tests/exec_scenarios.rs

use shellwire::errors::ShellwireError;
use shellwire::{Output, Session};
use shellwire_test_utils::builders::ConfigFileBuilder;
use shellwire_test_utils::init_tracing;

#[test]
fn test_echo_capture_returns_chomped_line() {
    init_tracing();
    let session = Session::new();

    let mut inv = session.binding("echo").capture(["hello", "world"]).unwrap();

    assert_eq!(inv.readline().unwrap().as_deref(), Some("hello world"));
    assert_eq!(inv.readline().unwrap(), None);
    assert_eq!(inv.exit_code().unwrap(), 0);
}

#[test]
fn test_foreground_call_is_finished_on_return() {
    init_tracing();
    let session = Session::new();

    let inv = session.binding("true").run(Vec::<String>::new()).unwrap();

    assert!(!inv.is_background());
    assert!(inv.is_finished());
    assert_eq!(inv.argv(), ["true"]);
}

#[test]
fn test_exit_codes_without_fail_policy() {
    init_tracing();
    let session = Session::new();

    let ok = session.binding("true").run(Vec::<String>::new()).unwrap();
    let failed = session.binding("false").run(Vec::<String>::new()).unwrap();
    let seven = session.binding("sh").run(["-c", "exit 7"]).unwrap();

    assert_eq!(ok.exit_code().unwrap(), 0);
    assert_eq!(failed.exit_code().unwrap(), 1);
    assert_eq!(seven.exit_code().unwrap(), 7);
}

#[test]
fn test_signal_death_reports_128_plus_signal() {
    init_tracing();
    let session = Session::new();

    let inv = session.binding("sh").run(["-c", "kill -9 $$"]).unwrap();

    assert_eq!(inv.exit_code().unwrap(), 128 + 9);
}

#[test]
fn test_missing_program_is_resolution_error() {
    init_tracing();
    let session = Session::new();

    // Binding creation never fails; the call does.
    let binding = session.binding("shellwire-no-such-program-x9");
    match binding.run(Vec::<String>::new()) {
        Err(ShellwireError::Resolution { name }) => {
            assert_eq!(name, "shellwire-no-such-program-x9");
        }
        other => panic!("Expected Resolution error, got: {:?}", other.map(|i| i.argv().to_vec())),
    }
}

#[test]
fn test_exit_127_maps_to_resolution_error() {
    init_tracing();
    let session = Session::new();

    let result = session.binding("sh").run(["-c", "exit 127"]);

    assert!(matches!(result, Err(ShellwireError::Resolution { .. })));
}

#[test]
fn test_explicit_path_that_does_not_exist_fails_resolution() {
    init_tracing();
    let session = Session::new();

    let result = session
        .run("/nonexistent/shellwire/prog")
        .run(Vec::<String>::new());

    assert!(matches!(result, Err(ShellwireError::Resolution { .. })));
}

#[test]
fn test_explicit_path_runs_without_search() {
    init_tracing();
    let session = ConfigFileBuilder::new()
        .search_path(vec!["/nonexistent".into()])
        .session();

    let mut inv = session.run("/bin/echo").capture(["direct"]).unwrap();

    assert_eq!(inv.readline().unwrap().as_deref(), Some("direct"));
    assert_eq!(inv.argv()[0], "/bin/echo");
}

#[test]
fn test_fail_policy_raises_execution_failure() {
    init_tracing();
    let session = Session::new();
    session.option("-e").unwrap();

    match session.binding("sh").run(["-c", "exit 3"]) {
        Err(ShellwireError::ExecutionFailure { argv, code }) => {
            assert_eq!(code, 3);
            assert_eq!(argv, vec!["sh", "-c", "exit 3"]);
        }
        other => panic!("Expected ExecutionFailure, got: {:?}", other.map(|i| i.pid())),
    }
}

#[test]
fn test_fail_policy_from_config() {
    init_tracing();
    let session = ConfigFileBuilder::new().errexit(true).session();

    let err = session.binding("false").run(Vec::<String>::new()).unwrap_err();

    assert_eq!(err.exit_code(), Some(1));
}

#[test]
fn test_fail_tolerant_call_returns_code() {
    init_tracing();
    let session = Session::new();
    session.set_fail_on_nonzero(true);

    let inv = session
        .binding("false")
        .call()
        .fail_tolerant(true)
        .spawn()
        .unwrap();

    assert_eq!(inv.exit_code().unwrap(), 1);
}

#[test]
fn test_fail_policy_can_be_switched_off() {
    init_tracing();
    let session = Session::new();
    session.option("-e").unwrap();
    session.option("+e").unwrap();

    let inv = session.binding("false").run(Vec::<String>::new()).unwrap();

    assert_eq!(inv.exit_code().unwrap(), 1);
    assert!(matches!(
        session.option("-x"),
        Err(ShellwireError::InvalidOption(_))
    ));
}

#[test]
fn test_wait_is_idempotent() {
    init_tracing();
    let session = Session::new();
    session.option("errexit").unwrap();

    let inv = session
        .binding("sh")
        .call()
        .args(["-c", "exit 4"])
        .background(true)
        .spawn()
        .unwrap();

    for _ in 0..3 {
        match inv.wait() {
            Err(ShellwireError::ExecutionFailure { code, .. }) => assert_eq!(code, 4),
            other => panic!("Expected ExecutionFailure, got: {:?}", other),
        }
    }
}

#[test]
fn test_lines_iterator_yields_every_line_then_stops() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("printf")
        .call()
        .arg("one\\ntwo\\nthree\\n")
        .stdout(Output::Capture)
        .spawn()
        .unwrap();

    let lines: Vec<String> = inv.lines().collect::<Result<_, _>>().unwrap();

    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[test]
fn test_chomp_disabled_keeps_terminator() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("echo")
        .call()
        .arg("raw")
        .stdout(Output::Capture)
        .chomp(false)
        .spawn()
        .unwrap();

    assert_eq!(inv.readline().unwrap().as_deref(), Some("raw\n"));
}

#[test]
fn test_readlines_after_close_is_empty() {
    init_tracing();
    let session = Session::new();

    let mut inv = session.binding("echo").capture(["gone"]).unwrap();
    inv.close();

    assert!(inv.readlines().unwrap().is_empty());
}

#[test]
fn test_uncaptured_invocation_reads_nothing() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("true")
        .call()
        .stdout(Output::Null)
        .spawn()
        .unwrap();

    assert!(inv.capture().is_none());
    assert_eq!(inv.readline().unwrap(), None);
}

#[test]
fn test_foreground_capture_is_drained_background_is_lazy() {
    init_tracing();
    let session = Session::new();

    let mut fg = session.binding("echo").capture(["now"]).unwrap();
    let mut bg = session
        .binding("echo")
        .call()
        .arg("later")
        .stdout(Output::Capture)
        .background(true)
        .spawn()
        .unwrap();

    assert!(fg.capture().unwrap().is_buffered());
    let stream = bg.capture().unwrap();
    assert!(!stream.is_buffered());
    assert_eq!(stream.readline(true).unwrap().as_deref(), Some("later"));
    assert_eq!(stream.readline(true).unwrap(), None);
    assert!(stream.is_closed());
    assert_eq!(bg.wait().unwrap(), 0);
}
