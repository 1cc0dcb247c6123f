//! Tests for the startup handshake wire behaviour.

use std::os::fd::AsRawFd;

use nix::unistd::{self, pipe};
use rstest::rstest;

use corvus_config::LogDestination;

use super::daemonizer::{
    DaemonStdio, HandshakeOutcome, SUCCESS_MARKER, StartupNotifier, await_detached_outcome,
};

#[test]
fn marker_byte_then_close_reads_as_success() {
    let (read_end, write_end) = pipe().expect("pipe should be created");
    unistd::write(&write_end, &[SUCCESS_MARKER]).expect("marker should be written");
    drop(write_end);
    assert_eq!(await_detached_outcome(&read_end), HandshakeOutcome::Success);
}

#[test]
fn close_without_write_reads_as_failure() {
    let (read_end, write_end) = pipe().expect("pipe should be created");
    drop(write_end);
    assert_eq!(await_detached_outcome(&read_end), HandshakeOutcome::Failure);
}

#[test]
fn zero_byte_reads_as_failure() {
    let (read_end, write_end) = pipe().expect("pipe should be created");
    unistd::write(&write_end, &[0u8]).expect("byte should be written");
    drop(write_end);
    assert_eq!(await_detached_outcome(&read_end), HandshakeOutcome::Failure);
}

#[test]
fn notifier_writes_exactly_one_marker_then_closes() {
    let (read_end, write_end) = pipe().expect("pipe should be created");
    let mut notifier = StartupNotifier::detached(write_end);
    notifier.notify_success();
    // Second call must be a no-op; the channel is already gone.
    notifier.notify_success();

    let mut buffer = [0u8; 4];
    let count = unistd::read(read_end.as_raw_fd(), &mut buffer).expect("read should succeed");
    assert_eq!(count, 1);
    assert_eq!(buffer[0], SUCCESS_MARKER);

    // The write end was dropped, so the next read is EOF.
    let eof = unistd::read(read_end.as_raw_fd(), &mut buffer).expect("read should succeed");
    assert_eq!(eof, 0);
}

#[test]
fn attached_notifier_is_a_no_op() {
    let mut notifier = StartupNotifier::attached();
    notifier.notify_success();
}

#[rstest]
#[case::default_quiet(LogDestination::Null, 0, DaemonStdio::Null)]
#[case::file_quiet(LogDestination::File("/tmp/corvus.log".into()), 0, DaemonStdio::Null)]
#[case::stdout(LogDestination::Stdout, 0, DaemonStdio::KeepOutput)]
#[case::stderr(LogDestination::Stderr, 0, DaemonStdio::KeepOutput)]
#[case::debugging(LogDestination::Null, 1, DaemonStdio::KeepOutput)]
fn stdio_policy_follows_destination_and_debug(
    #[case] destination: LogDestination,
    #[case] debug_level: u8,
    #[case] expected: DaemonStdio,
) {
    assert_eq!(DaemonStdio::from_destination(&destination, debug_level), expected);
}
