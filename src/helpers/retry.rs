use std::time::Duration;
use std::thread;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, warn, info};

/// Retry mechanism with fixed, custom or exponential intervals
///
/// The default mode backs off exponentially: 1s, 2s, 4s, 8s, 15s, 30s, 60s (max).
pub struct RetryHandler {
    /// Current attempt number (0-based)
    attempt: usize,
    /// Maximum number of attempts before giving up
    max_attempts: Option<usize>,
    /// Custom retry intervals (if None, uses default exponential backoff)
    custom_intervals: Option<Vec<Duration>>,
}

impl RetryHandler {
    /// Create a new retry handler with default exponential backoff
    pub fn new() -> Self {
        Self {
            attempt: 0,
            max_attempts: None,
            custom_intervals: None,
        }
    }

    /// Create a new retry handler with a maximum number of attempts
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            attempt: 0,
            max_attempts: Some(max_attempts),
            custom_intervals: None,
        }
    }

    /// Create a new retry handler with custom intervals
    pub fn with_intervals(intervals: Vec<Duration>) -> Self {
        Self {
            attempt: 0,
            max_attempts: Some(intervals.len()),
            custom_intervals: Some(intervals),
        }
    }

    /// A fixed number of attempts with the same delay between each of them
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts: Some(max_attempts),
            custom_intervals: Some(vec![delay]),
        }
    }

    /// Create a retry handler with the standard intervals for connection retries
    /// Uses: 1s, 2s, 4s, 8s, 15s, 30s, 60s, repeating the last one forever
    pub fn connection_retry() -> Self {
        let intervals = vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
            Duration::from_secs(15),
            Duration::from_secs(30),
            Duration::from_secs(60),
        ];
        Self {
            attempt: 0,
            max_attempts: None,
            custom_intervals: Some(intervals),
        }
    }

    /// Get the current attempt number (0-based)
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }

    /// Whether another attempt may follow the current one
    pub fn should_retry(&self) -> bool {
        if let Some(max) = self.max_attempts {
            self.attempt + 1 < max
        } else {
            true // Retry indefinitely if no max is set
        }
    }

    /// Get the delay for the current attempt
    pub fn get_delay(&self) -> Duration {
        if let Some(ref intervals) = self.custom_intervals {
            // Clamp to the last interval if we exceed the list
            match intervals.get(self.attempt).or_else(|| intervals.last()) {
                Some(delay) => *delay,
                None => Duration::ZERO,
            }
        } else {
            let base_delay = 2_u64.saturating_pow(self.attempt as u32);
            let delay_secs = std::cmp::min(base_delay, 60);
            Duration::from_secs(delay_secs)
        }
    }

    /// Wait for the current retry interval
    /// Returns true if we should continue, false if interrupted by the running flag
    pub fn wait(&mut self, running: Option<&Arc<AtomicBool>>) -> bool {
        let delay = self.get_delay();
        debug!("Retry attempt {}: waiting {:?} before next attempt", self.attempt + 1, delay);

        if let Some(running_flag) = running {
            let check_interval = Duration::from_millis(100);
            let mut remaining = delay;

            while remaining > Duration::ZERO {
                if !running_flag.load(Ordering::SeqCst) {
                    debug!("Retry interrupted by shutdown signal");
                    return false;
                }

                let sleep_time = std::cmp::min(check_interval, remaining);
                thread::sleep(sleep_time);
                remaining = remaining.saturating_sub(sleep_time);
            }
        } else {
            thread::sleep(delay);
        }

        self.attempt += 1;
        true
    }

    /// Reset the retry counter
    pub fn reset(&mut self) {
        debug!("Resetting retry counter");
        self.attempt = 0;
    }

    /// Run `operation` until it succeeds or the attempts are used up
    ///
    /// Returns the last error when every attempt failed.
    pub fn execute_with_retry<T, E, F>(
        &mut self,
        mut operation: F,
        operation_name: &str,
    ) -> Result<T, E>
    where
        F: FnMut(usize) -> Result<T, E>,
        E: std::fmt::Display,
    {
        loop {
            debug!("Attempting {} (attempt {})", operation_name, self.attempt + 1);
            match operation(self.attempt) {
                Ok(result) => {
                    if self.attempt > 0 {
                        info!("{} succeeded on attempt {}", operation_name, self.attempt + 1);
                    }
                    return Ok(result);
                },
                Err(e) => {
                    if !self.should_retry() {
                        warn!("{} failed after {} attempts, giving up: {}", operation_name, self.attempt + 1, e);
                        return Err(e);
                    }
                    warn!("{} failed on attempt {}: {}", operation_name, self.attempt + 1, e);
                }
            }

            self.wait(None);
        }
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new()
    }
}
