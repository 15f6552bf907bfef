//! Bounded polling behaviour seen from outside the crate

use futures::FutureExt;
use gridharness::wait::{WaitCondition, WaitOutcome};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
struct ProbeError(&'static str);

fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl FnMut(u64, bool) + Send + 'static) {
    let ticks = Arc::new(Mutex::new(Vec::<bool>::new()));
    let sink = ticks.clone();
    (ticks, move |_elapsed: u64, done: bool| sink.lock().unwrap().push(done))
}

#[tokio::test]
async fn test_immediate_success_does_not_sleep() {
    let started = Instant::now();

    let outcome = WaitCondition::<i32>::new(Duration::from_secs(60))
        .interval(Duration::from_secs(30))
        .wait(|| async { Ok::<_, ProbeError>(4) }, |started_nodes| *started_nodes == 4)
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Succeeded(4));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_zero_timeout_polls_exactly_once() {
    let polls = Arc::new(AtomicU32::new(0));
    let p = polls.clone();

    let outcome = WaitCondition::<bool>::new(Duration::ZERO)
        .interval(Duration::from_millis(1))
        .wait(
            move || {
                p.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProbeError>(false) }
            },
            |ready| *ready,
        )
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert_eq!(polls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_action_error_propagates_and_finalizes_once() {
    let (ticks, callback) = recorder();
    let polls = Arc::new(AtomicU32::new(0));
    let p = polls.clone();

    let result = WaitCondition::<u32>::new(Duration::from_secs(10))
        .interval(Duration::from_millis(1))
        .on_progress(callback)
        .wait(
            move || {
                let n = p.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 2 {
                        Err(ProbeError("host unreachable"))
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| false,
        )
        .await;

    assert_eq!(result.unwrap_err(), ProbeError("host unreachable"));
    assert_eq!(polls.load(Ordering::SeqCst), 3);

    let ticks = ticks.lock().unwrap();
    assert_eq!(ticks.iter().filter(|done| **done).count(), 1);
    assert_eq!(ticks.last(), Some(&true));
}

#[tokio::test]
async fn test_panicking_action_still_finalizes() {
    let (ticks, callback) = recorder();

    let wait = WaitCondition::<u32>::new(Duration::from_secs(10))
        .on_progress(callback)
        .wait(
            || async {
                if true {
                    panic!("probe exploded");
                }
                Ok::<u32, ProbeError>(0)
            },
            |_| true,
        );

    let caught = AssertUnwindSafe(wait).catch_unwind().await;
    assert!(caught.is_err());
    assert_eq!(*ticks.lock().unwrap(), vec![false, true]);
}

#[tokio::test]
async fn test_dropped_wait_still_finalizes() {
    let (ticks, callback) = recorder();

    let wait = WaitCondition::<bool>::new(Duration::from_secs(60))
        .interval(Duration::from_secs(30))
        .on_progress(callback)
        .wait(|| async { Ok::<_, ProbeError>(false) }, |ready| *ready);

    let abandoned = tokio::time::timeout(Duration::from_millis(50), wait).await;
    assert!(abandoned.is_err());
    assert_eq!(*ticks.lock().unwrap(), vec![false, true]);
}

#[tokio::test]
async fn test_failure_predicate_ends_wait_early() {
    let outcome = WaitCondition::<&str>::new(Duration::from_secs(60))
        .interval(Duration::from_millis(1))
        .failure(|status| *status == "FAILED")
        .wait(|| async { Ok::<_, ProbeError>("FAILED") }, |status| *status == "ACTIVE")
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Failed);
}
