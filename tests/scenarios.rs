//! End-to-end behaviour of the public lock surface.

use std::time::Duration;
use wordlock::{guard, guard_blocking, ErrorKind, LockBuffer, LockError, Mutex, Timeout};

#[derive(Debug, PartialEq)]
enum JobError {
    Lock(ErrorKind),
    Failed(&'static str),
}

impl From<LockError> for JobError {
    fn from(e: LockError) -> Self {
        JobError::Lock(e.kind())
    }
}

#[tokio::test]
async fn lock_then_release() {
    let m = Mutex::create();
    let h = m.lock(Timeout::Unbounded).await.unwrap();
    assert!(m.is_locked());
    h.release();
    assert!(!m.is_locked());
}

#[tokio::test]
async fn contended_lock_times_out_with_value_in_message() {
    let m = Mutex::create();
    let h = m.lock(Timeout::Unbounded).await.unwrap();
    let err = m.lock(10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AcquisitionTimedOut);
    assert!(err.to_string().contains("10ms"), "{}", err);
    h.release();
    assert!(!m.is_locked());
}

#[tokio::test]
async fn fractional_timeout_appears_as_written() {
    let m = Mutex::create();
    let _h = m.try_lock().unwrap();
    let err = m.lock(33.3).await.unwrap_err();
    assert!(err.to_string().ends_with("within 33.3ms"), "{}", err);
}

#[test]
fn unlock_of_unlocked_mutex_fails() {
    let m = Mutex::create();
    let err = m.unlock().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotLocked);
}

#[test]
fn explicit_unlock_frees_a_held_lock() {
    let m = Mutex::create();
    let h = m.lock_blocking(Timeout::Unbounded).unwrap();
    m.unlock().unwrap();
    assert!(!m.is_locked());
    // The handle's own release is now absorbed.
    h.release();
    assert!(!m.is_locked());
}

#[test]
fn same_identifier_yields_distinct_buffers() {
    let a = Mutex::from_source("x").unwrap();
    let b = Mutex::from_source("x").unwrap();
    assert!(!a.buffer().same_region(b.buffer()));

    let _held = a.try_lock().unwrap();
    assert!(!b.is_locked());
    assert!(b.try_lock().is_some());
}

#[tokio::test]
async fn guard_propagates_work_error_and_releases() {
    let m = Mutex::create();
    let res: Result<(), JobError> =
        guard(&m, Timeout::Unbounded, || async { Err(JobError::Failed("boom")) }).await;
    assert_eq!(res, Err(JobError::Failed("boom")));
    assert!(!m.is_locked());
}

#[tokio::test]
async fn guard_returns_work_value() {
    let m = Mutex::create();
    let res: Result<u32, JobError> = guard(&m, 50, || async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(7)
    })
    .await;
    assert_eq!(res, Ok(7));
    assert!(!m.is_locked());
}

#[tokio::test]
async fn guard_surfaces_lock_timeout_without_running_work() {
    let m = Mutex::create();
    let _h = m.try_lock().unwrap();
    let mut ran = false;
    let res: Result<(), JobError> = guard(&m, 5, || {
        ran = true;
        async { Ok(()) }
    })
    .await;
    assert_eq!(res, Err(JobError::Lock(ErrorKind::AcquisitionTimedOut)));
    assert!(!ran);
    assert!(m.is_locked());
}

#[test]
fn guard_blocking_rejects_bad_timeout() {
    let m = Mutex::create();
    let res: Result<(), JobError> = guard_blocking(&m, -5i64, || Ok(()));
    assert_eq!(res, Err(JobError::Lock(ErrorKind::InvalidTimeout)));
}

#[test]
fn guard_blocking_releases_on_panic() {
    let m = Mutex::create();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), JobError> = guard_blocking(&m, Timeout::Unbounded, || panic!("inside"));
    }));
    assert!(outcome.is_err());
    assert!(!m.is_locked());
}

#[tokio::test]
async fn unbounded_lock_succeeds_uncontended() {
    let m = Mutex::create();
    let h = m.lock(f64::INFINITY).await.unwrap();
    assert!(m.is_locked());
    drop(h);
    let h = m.lock_blocking(f64::INFINITY).unwrap();
    assert!(m.is_locked());
    drop(h);
    assert!(!m.is_locked());
}

#[test]
fn handle_is_scoped() {
    let m = Mutex::create();
    {
        let _h = m.lock_blocking(Timeout::Unbounded).unwrap();
        assert!(m.is_locked());
    }
    assert!(!m.is_locked());
}

#[test]
fn named_buffer_layout() {
    for id in ["a", "ab", "abc", "abcd", "mutex/αβγ"] {
        let b = LockBuffer::from_name(id).unwrap();
        assert_eq!(b.byte_len() % 4, 0);
        assert_eq!(b.load(), 0);
        assert_eq!(b.identifier().as_deref(), Some(id));
    }
}

#[test]
fn rejected_buffers_never_become_mutexes() {
    let err = LockBuffer::from_region(vec![0u8; 16]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBuffer);
    let err = Mutex::from_source("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
