//! Stress test configuration.

use core::time::Duration;

/// Environment variable overriding the worker count.
pub const THREADS_ENV: &str = "FOUNDATION_STRESS_THREADS";

/// Environment variable overriding the per-worker iteration count.
pub const ITERATIONS_ENV: &str = "FOUNDATION_STRESS_ITERATIONS";

/// Environment variable setting a time limit in milliseconds.
pub const DURATION_ENV: &str = "FOUNDATION_STRESS_DURATION_MS";

/// Configuration for stress tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    thread_count: usize,
    iterations: usize,
    /// Workers still running at this point are cancelled.
    duration: Option<Duration>,
}

impl StressConfig {
    /// Creates a configuration of 4 threads running 1000 iterations each,
    /// with no time limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            thread_count: 4,
            iterations: 1000,
            duration: None,
        }
    }

    /// Starts from [`StressConfig::new`] and applies any of the
    /// `FOUNDATION_STRESS_*` environment overrides that parse.
    ///
    /// Lets CI soak the same tests harder without code changes.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(threads) = read_env(THREADS_ENV) {
            config.thread_count = threads;
        }
        if let Some(iterations) = read_env(ITERATIONS_ENV) {
            config.iterations = iterations;
        }
        if let Some(millis) = read_env::<u64>(DURATION_ENV) {
            config.duration = Some(Duration::from_millis(millis));
        }
        config
    }

    #[must_use]
    pub const fn threads(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    #[must_use]
    pub const fn iterations(mut self, count: usize) -> Self {
        self.iterations = count;
        self
    }

    /// Sets a time limit after which remaining workers are cancelled.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub const fn duration_millis(self, millis: u64) -> Self {
        self.duration(Duration::from_millis(millis))
    }

    #[must_use]
    pub const fn get_thread_count(&self) -> usize {
        self.thread_count
    }

    #[must_use]
    pub const fn get_iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub const fn get_duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_env<T: core::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, raw = %raw, "ignoring unparsable stress override");
            None
        }
    }
}
