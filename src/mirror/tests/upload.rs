//! Tests for retried uploads.

use std::io::{Cursor, Seek, SeekFrom};
use std::time::Duration;

use rstest::{fixture, rstest};

use super::super::*;
use super::fixtures::{server, session};
use crate::session::SessionError;
use crate::test_support::MemoryServer;

const TARGET: &str = "/home/deploy/index.html";
const BODY: &[u8] = b"<html>hello</html>";

#[fixture]
fn policy() -> RetryPolicy {
    RetryPolicy::default().with_delay(Duration::ZERO)
}

fn upload(
    server: &MemoryServer,
    policy: &RetryPolicy,
    reader: &mut Cursor<Vec<u8>>,
) -> (UploadOutcome, Vec<u32>) {
    let mut session = session(server);
    let mut notices = Vec::new();
    let outcome = upload_with_retry(&mut session, reader, TARGET, policy, |notice| {
        assert_eq!(notice.max_attempts, policy.max_attempts());
        notices.push(notice.attempt);
    });
    (outcome, notices)
}

#[test]
fn default_policy_allows_three_attempts_two_seconds_apart() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts(), 3);
    assert_eq!(policy.delay(), Duration::from_secs(2));
}

#[test]
fn zero_attempts_are_raised_to_one() {
    assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
}

#[rstest]
fn first_attempt_success_needs_no_retry(server: MemoryServer, policy: RetryPolicy) {
    let mut reader = Cursor::new(BODY.to_vec());

    let (outcome, notices) = upload(&server, &policy, &mut reader);

    assert_eq!(
        outcome,
        UploadOutcome::Uploaded {
            attempts: 1,
            bytes: 18
        }
    );
    assert_eq!(outcome.retries(), 0);
    assert!(notices.is_empty());
    assert_eq!(server.file(TARGET).as_deref(), Some(BODY));
}

#[rstest]
fn succeeds_on_third_attempt_after_two_retries(server: MemoryServer, policy: RetryPolicy) {
    server.fail_store(TARGET, 2);
    let mut reader = Cursor::new(BODY.to_vec());

    let (outcome, notices) = upload(&server, &policy, &mut reader);

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.retries(), 2);
    assert_eq!(notices, [1, 2]);
    assert_eq!(server.store_attempts(TARGET), 3);
    assert_eq!(
        server.file(TARGET).as_deref(),
        Some(BODY),
        "the final attempt must resend the whole file"
    );
}

#[rstest]
fn gives_up_after_three_attempts(server: MemoryServer, policy: RetryPolicy) {
    server.fail_store(TARGET, 5);
    let mut reader = Cursor::new(BODY.to_vec());

    let (outcome, notices) = upload(&server, &policy, &mut reader);

    let UploadOutcome::Failed { attempts, error } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert_eq!(attempts, 3);
    assert!(
        matches!(error, SessionError::Command { ref message, .. } if message.starts_with("426")),
        "unexpected error: {error}"
    );
    assert_eq!(notices, [1, 2], "no notice follows the final attempt");
    assert_eq!(server.store_attempts(TARGET), 3, "no fourth attempt");
    assert!(server.file(TARGET).is_none());
}

#[rstest]
fn reader_is_rewound_before_the_first_attempt(server: MemoryServer, policy: RetryPolicy) {
    let mut reader = Cursor::new(BODY.to_vec());
    reader.seek(SeekFrom::End(0)).expect("seek to end");

    let (outcome, _) = upload(&server, &policy, &mut reader);

    assert!(outcome.is_success());
    assert_eq!(server.file(TARGET).as_deref(), Some(BODY));
}

#[rstest]
fn single_attempt_policy_never_retries(server: MemoryServer) {
    server.fail_store(TARGET, 1);
    let policy = RetryPolicy::new(1, Duration::ZERO);
    let mut reader = Cursor::new(BODY.to_vec());

    let (outcome, notices) = upload(&server, &policy, &mut reader);

    assert_eq!(outcome.attempts(), 1);
    assert!(!outcome.is_success());
    assert!(notices.is_empty());
}
