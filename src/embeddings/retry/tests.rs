use super::*;

#[test]
fn backoff_doubles() {
    let policy = RetryPolicy {
        attempts: 4,
        base_delay: Duration::from_millis(100),
    };
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
}

#[test]
fn client_errors_are_not_retried() {
    let policy = RetryPolicy {
        attempts: 3,
        base_delay: Duration::ZERO,
    };
    let mut calls = 0;
    let result = policy.run("test", || {
        calls += 1;
        Err(ureq::Error::StatusCode(404))
    });
    assert!(result.is_err());
    assert_eq!(calls, 1);
}

#[test]
fn server_errors_are_retried_until_success() {
    let policy = RetryPolicy {
        attempts: 3,
        base_delay: Duration::ZERO,
    };
    let mut calls = 0;
    let result = policy.run("test", || {
        calls += 1;
        if calls < 3 {
            Err(ureq::Error::StatusCode(503))
        } else {
            Ok("ok".to_string())
        }
    });
    assert_eq!(result.expect("third attempt succeeds"), "ok");
    assert_eq!(calls, 3);
}

#[test]
fn gives_up_after_all_attempts() {
    let policy = RetryPolicy {
        attempts: 2,
        base_delay: Duration::ZERO,
    };
    let mut calls = 0;
    let result = policy.run("test", || {
        calls += 1;
        Err(ureq::Error::ConnectionFailed)
    });
    assert!(result.is_err());
    assert_eq!(calls, 2);
}
