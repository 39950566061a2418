// tests/inline_input.rs

use proptest::prelude::*;
use shellwire::errors::ShellwireError;
use shellwire::exec::launcher::serialize_inline;
use shellwire::{CaptureStream, Encoding, InlineData, Input, Output, PeerSource, Session};
use shellwire_test_utils::builders::ConfigFileBuilder;
use shellwire_test_utils::init_tracing;

fn byte_count(session: &Session, input: Input, encoding: Encoding) -> usize {
    let mut inv = session
        .binding("wc")
        .call()
        .arg("-c")
        .stdin(input)
        .encoding(encoding)
        .stdout(Output::Capture)
        .spawn()
        .unwrap();
    inv.readline()
        .unwrap()
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[test]
fn test_lines_are_written_with_terminator() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("cat")
        .call()
        .stdin(Input::lines(["alpha", "beta", "gamma"]))
        .stdout(Output::Capture)
        .spawn()
        .unwrap();

    assert_eq!(inv.readlines().unwrap(), vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_single_text_is_one_line() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("wc")
        .call()
        .arg("-l")
        .stdin(Input::text("only line"))
        .stdout(Output::Capture)
        .spawn()
        .unwrap();

    assert_eq!(inv.readline().unwrap().unwrap().trim(), "1");
}

#[test]
fn test_default_terminator_from_config() {
    init_tracing();
    let session = ConfigFileBuilder::new().line_terminator("\r\n").session();

    let count = byte_count(&session, Input::lines(["ab", "cd"]), Encoding::Utf8);

    assert_eq!(count, 8);
}

#[test]
fn test_latin1_writes_one_byte_per_char() {
    init_tracing();
    let session = Session::new();

    assert_eq!(byte_count(&session, Input::text("é"), Encoding::Latin1), 2);
    assert_eq!(byte_count(&session, Input::text("é"), Encoding::Utf8), 3);
}

#[test]
fn test_latin1_round_trip_through_cat() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("cat")
        .call()
        .stdin(Input::text("café"))
        .encoding(Encoding::Latin1)
        .stdout(Output::Capture)
        .spawn()
        .unwrap();

    assert_eq!(inv.readline().unwrap().as_deref(), Some("café"));
}

#[test]
fn test_unencodable_text_is_an_error() {
    init_tracing();
    let session = Session::new();

    let result = session
        .binding("cat")
        .call()
        .stdin(Input::text("€"))
        .encoding(Encoding::Latin1)
        .stdout(Output::Null)
        .spawn();

    assert!(matches!(result, Err(ShellwireError::Encoding(_))));
}

#[test]
fn test_raw_bytes_pass_through() {
    init_tracing();
    let session = Session::new();

    let count = byte_count(&session, Input::bytes(vec![0xff, 0x00, 0x41]), Encoding::Utf8);

    assert_eq!(count, 4);
}

#[test]
fn test_program_ignoring_stdin_is_not_an_error() {
    init_tracing();
    let session = Session::new();
    let many: Vec<String> = (0..20_000).map(|i| format!("line {i}")).collect();

    let inv = session
        .binding("true")
        .call()
        .stdin(Input::lines(many))
        .spawn()
        .unwrap();

    assert_eq!(inv.exit_code().unwrap(), 0);
}

#[test]
fn test_empty_line_list_closes_stdin() {
    init_tracing();
    let session = Session::new();

    let mut inv = session
        .binding("cat")
        .call()
        .stdin(Input::lines(Vec::<String>::new()))
        .stdout(Output::Capture)
        .spawn()
        .unwrap();

    assert_eq!(inv.readline().unwrap(), None);
}

#[test]
fn test_large_input_and_output_round_trip() {
    init_tracing();
    let session = Session::new();
    // Well past any pipe buffer in both directions.
    let lines: Vec<String> = (0..20_000).map(|i| format!("payload line {i:06}")).collect();

    let mut inv = session
        .binding("cat")
        .call()
        .stdin(Input::lines(lines.clone()))
        .stdout(Output::Capture)
        .spawn()
        .unwrap();

    assert!(inv.is_finished());
    assert_eq!(inv.readlines().unwrap(), lines);
}

/// Children forked from the current test thread, zombies included.
fn children_of_this_thread() -> Option<String> {
    let tid = nix::unistd::gettid();
    std::fs::read_to_string(format!("/proc/self/task/{tid}/children")).ok()
}

#[test]
fn test_failed_stdin_feed_still_reaps_child() {
    init_tracing();
    let session = Session::new();
    // Reading a directory fails with EISDIR, so re-writing it into stdin fails.
    let dir = tempfile::tempdir().unwrap();
    let unreadable = std::fs::File::open(dir.path()).unwrap();
    let source = CaptureStream::from_fd(unreadable.into(), Encoding::Utf8, true, false);

    let result = session
        .binding("cat")
        .call()
        .stdin(Input::Peer(PeerSource::Captured(source)))
        .stdout(Output::Null)
        .spawn();

    match result {
        Err(ShellwireError::IoError(_)) => {}
        other => panic!("Expected IoError, got: {:?}", other.map(|i| i.pid())),
    }
    if let Some(children) = children_of_this_thread() {
        assert_eq!(children.trim(), "", "child left unreaped");
    }
}

proptest! {
    #[test]
    fn prop_serialized_lines_split_back(
        lines in proptest::collection::vec("[^\n]{0,16}", 0..12),
    ) {
        let data = InlineData::Lines(lines.clone());
        let bytes = serialize_inline(&data, Encoding::Utf8, b"\n").unwrap();

        prop_assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), data.line_count());
        let text = String::from_utf8(bytes).unwrap();
        let split: Vec<&str> = text.split_terminator('\n').collect();
        prop_assert_eq!(split, lines.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn prop_every_line_gets_the_terminator(
        lines in proptest::collection::vec("[a-z]{0,8}", 0..8),
        terminator in proptest::collection::vec(any::<u8>(), 1..4),
    ) {
        let bytes = serialize_inline(&InlineData::Lines(lines.clone()), Encoding::Utf8, &terminator).unwrap();

        let expected_len: usize = lines.iter().map(|l| l.len() + terminator.len()).sum();
        prop_assert_eq!(bytes.len(), expected_len);
        prop_assert!(lines.is_empty() || bytes.ends_with(&terminator));
    }
}
