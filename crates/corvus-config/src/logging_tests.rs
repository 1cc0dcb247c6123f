//! Tests for log destination parsing.

use std::path::PathBuf;

use rstest::rstest;

use super::LogDestination;

#[rstest]
#[case::stdout("stdout", LogDestination::Stdout)]
#[case::stderr("stderr", LogDestination::Stderr)]
#[case::null("null", LogDestination::Null)]
fn keywords_parse_to_streams(#[case] input: &str, #[case] expected: LogDestination) {
    let parsed: LogDestination = input.parse().expect("parsing is infallible");
    assert_eq!(parsed, expected);
}

#[test]
fn anything_else_is_a_file_path() {
    let parsed: LogDestination = "/var/log/corvusd.log".parse().expect("infallible");
    assert_eq!(
        parsed,
        LogDestination::File(PathBuf::from("/var/log/corvusd.log"))
    );
}

#[test]
fn only_streams_keep_standard_output_open() {
    assert!(LogDestination::Stdout.keeps_standard_streams());
    assert!(LogDestination::Stderr.keeps_standard_streams());
    assert!(!LogDestination::Null.keeps_standard_streams());
    assert!(!LogDestination::File(PathBuf::from("x.log")).keeps_standard_streams());
}
