use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

type FailureFn<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type ProgressFn = Box<dyn FnMut(u64, bool) + Send>;

/// How a wait ended when no error interrupted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Succeeded(T),
    Failed,
    TimedOut,
}

impl<T> WaitOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, WaitOutcome::Succeeded(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            WaitOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> WaitOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            WaitOutcome::Succeeded(value) => WaitOutcome::Succeeded(f(value)),
            WaitOutcome::Failed => WaitOutcome::Failed,
            WaitOutcome::TimedOut => WaitOutcome::TimedOut,
        }
    }
}

/// Parameters of one polling loop.
///
/// ```ignore
/// let outcome = WaitCondition::new(Duration::from_secs(30))
///     .interval(Duration::from_secs(2))
///     .failure(|found: &usize| *found == usize::MAX)
///     .wait(|| async { count_started(&router).await }, |found| *found == 4)
///     .await?;
/// ```
pub struct WaitCondition<T> {
    timeout: Duration,
    interval: Duration,
    progress_every: u32,
    failure: Option<FailureFn<T>>,
    on_progress: Option<ProgressFn>,
}

impl<T> WaitCondition<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: Duration::from_secs(1),
            progress_every: 4,
            failure: None,
            on_progress: None,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Report progress every `ticks` sleeps. Zero disables intermediate ticks.
    pub fn progress_every(mut self, ticks: u32) -> Self {
        self.progress_every = ticks;
        self
    }

    /// Stop retrying as soon as `predicate` holds for a result.
    pub fn failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.failure = Some(Box::new(predicate));
        self
    }

    /// Receives `(elapsed_secs, done)`. `done` is true exactly once, when the
    /// wait is left by any route.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u64, bool) + Send + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `action` until `condition` holds, the failure predicate holds or
    /// the timeout passes.
    ///
    /// The action always runs at least once. An error from the action ends
    /// the wait immediately and is returned unchanged.
    pub async fn wait<A, Fut, C, E>(self, action: A, condition: C) -> Result<WaitOutcome<T>, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(&T) -> bool,
    {
        self.wait_map(action, condition, |value| value).await
    }

    /// Like [`WaitCondition::wait`], converting the successful result with `success`.
    pub async fn wait_map<A, Fut, C, S, U, E>(
        self,
        mut action: A,
        mut condition: C,
        success: S,
    ) -> Result<WaitOutcome<U>, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(&T) -> bool,
        S: FnOnce(T) -> U,
    {
        let started = Instant::now();
        let mut progress = ProgressGuard {
            callback: self.on_progress,
            started,
            timeout: self.timeout,
        };
        progress.tick();

        let mut iteration: u32 = 0;
        loop {
            let result = action().await?;

            if condition(&result) {
                debug!(polls = iteration + 1, elapsed_ms = started.elapsed().as_millis(), "Wait condition met");
                return Ok(WaitOutcome::Succeeded(success(result)));
            }
            if let Some(failure) = &self.failure {
                if failure(&result) {
                    debug!(polls = iteration + 1, "Wait failure condition met");
                    return Ok(WaitOutcome::Failed);
                }
            }
            if started.elapsed() >= self.timeout {
                debug!(polls = iteration + 1, timeout_secs = self.timeout.as_secs(), "Wait timed out");
                return Ok(WaitOutcome::TimedOut);
            }

            tokio::time::sleep(self.interval).await;

            if self.progress_every > 0 && iteration % self.progress_every == 0 {
                progress.tick();
            }
            iteration = iteration.wrapping_add(1);
        }
    }
}

/// Sends the final `done = true` report when dropped, so it runs on return,
/// on `?`, on unwinding and when the wait future itself is dropped.
struct ProgressGuard {
    callback: Option<ProgressFn>,
    started: Instant,
    timeout: Duration,
}

impl ProgressGuard {
    /// Whole seconds elapsed, a started second counting as one.
    fn elapsed_secs(&self) -> u64 {
        let elapsed = self.started.elapsed().min(self.timeout);
        elapsed.as_secs() + u64::from(elapsed.subsec_nanos() > 0)
    }

    fn tick(&mut self) {
        let elapsed = self.elapsed_secs();
        if let Some(callback) = self.callback.as_mut() {
            callback(elapsed, false);
        }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        let elapsed = self.elapsed_secs();
        if let Some(mut callback) = self.callback.take() {
            callback(elapsed, true);
        }
    }
}
