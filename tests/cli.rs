// tests/cli.rs

use clap::Parser;
use shellwire::cli::{CliArgs, split_stages};

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

#[test]
fn test_parse_pipeline_command() {
    let args = CliArgs::try_parse_from([
        "shellwire",
        "--errexit",
        "--capture",
        "--input",
        "a",
        "--input",
        "b",
        "--env",
        "K=V=W",
        "--",
        "sort",
        "-r",
        "::",
        "head",
        "-n",
        "1",
    ])
    .unwrap();

    assert!(args.errexit);
    assert!(args.capture);
    assert_eq!(args.input, vec!["a", "b"]);
    assert_eq!(args.env, vec![("K".to_string(), "V=W".to_string())]);
    assert_eq!(
        split_stages(&args.command).unwrap(),
        vec![words("sort -r"), words("head -n 1")]
    );
}

#[test]
fn test_command_is_required() {
    assert!(CliArgs::try_parse_from(["shellwire", "--capture"]).is_err());
}

#[test]
fn test_env_without_equals_is_rejected() {
    let result = CliArgs::try_parse_from(["shellwire", "--env", "NOPE", "--", "true"]);

    assert!(result.is_err());
}

#[test]
fn test_empty_stage_is_rejected() {
    assert!(split_stages(&words("echo a :: :: cat")).is_err());
    assert!(split_stages(&words("echo a ::")).is_err());
    assert!(split_stages(&words(":: echo")).is_err());
}

#[test]
fn test_run_returns_last_stage_code() {
    let args = CliArgs::try_parse_from([
        "shellwire",
        "--config",
        "/nonexistent/Shellwire.toml",
        "--input",
        "x",
        "--",
        "cat",
        "::",
        "sh",
        "-c",
        "cat >/dev/null; exit 6",
    ])
    .unwrap();

    assert_eq!(shellwire::run(args).unwrap(), 6);
}

#[test]
fn test_run_with_errexit_reports_failure() {
    let args = CliArgs::try_parse_from([
        "shellwire",
        "--config",
        "/nonexistent/Shellwire.toml",
        "--errexit",
        "--",
        "false",
    ])
    .unwrap();

    let err = shellwire::run(args).unwrap_err();
    let failure = err.downcast_ref::<shellwire::ShellwireError>().unwrap();
    assert_eq!(failure.exit_code(), Some(1));
}
