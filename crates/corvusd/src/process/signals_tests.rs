//! Tests for the coalescing signal request slot.

use nix::unistd::{Pid, getpid};

use super::signals::{SignalRequest, SignalState};

#[test]
fn repeated_reloads_coalesce_into_one_request() {
    let state = SignalState::new(getpid());
    for _ in 0..5 {
        state.raise(SignalRequest::Reload);
    }
    assert_eq!(state.take(), SignalRequest::Reload);
    assert_eq!(state.take(), SignalRequest::None);
}

#[test]
fn terminate_is_never_overwritten_by_reload() {
    let state = SignalState::new(getpid());
    state.raise(SignalRequest::Reload);
    state.raise(SignalRequest::Terminate);
    state.raise(SignalRequest::Reload);
    assert_eq!(state.take(), SignalRequest::Terminate);
}

#[test]
fn pending_does_not_consume_the_request() {
    let state = SignalState::new(getpid());
    state.raise(SignalRequest::Reload);
    assert_eq!(state.pending(), SignalRequest::Reload);
    assert_eq!(state.pending(), SignalRequest::Reload);
    assert_eq!(state.take(), SignalRequest::Reload);
    assert_eq!(state.pending(), SignalRequest::None);
}

#[test]
fn identity_guard_matches_only_the_recorded_pid() {
    let ours = SignalState::new(getpid());
    assert!(ours.is_supervisor());

    let other = SignalState::new(Pid::from_raw(1));
    assert!(!other.is_supervisor());
}

#[test]
fn raising_none_changes_nothing() {
    let state = SignalState::new(getpid());
    state.raise(SignalRequest::Terminate);
    state.raise(SignalRequest::None);
    assert_eq!(state.take(), SignalRequest::Terminate);
}
