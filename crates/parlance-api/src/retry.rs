//! Bounded retry with a fixed inter-attempt delay.
//!
//! Dispatch paths compose a [`RetryPolicy`] around any fallible async
//! operation instead of sleeping inline. Only errors the operation marks
//! as transient are retried; semantic failures pass through on the first
//! attempt.

use std::time::Duration;

/// Classifies an error as transient (worth another attempt) or terminal.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Attempt budget and fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds, fails terminally, or the
    /// attempt budget is exhausted. The operation receives the 1-based
    /// attempt number; the last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    log::warn!(
                        "Attempt {attempt}/{} failed, retrying in {:?}: {error}",
                        self.max_attempts,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Terminal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(formatter, "{self:?}")
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_the_budget_with_fixed_delays() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);

        let started = tokio::time::Instant::now();
        let result: Result<(), TestError> = policy
            .run(|_| {
                calls.set(calls.get() + 1);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.get(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);

        let result: Result<(), TestError> = policy
            .run(|_| {
                calls.set(calls.get() + 1);
                async { Err(TestError::Terminal) }
            })
            .await;

        assert_eq!(result, Err(TestError::Terminal));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        let script = RefCell::new(VecDeque::from([
            Err(TestError::Transient),
            Err(TestError::Transient),
            Ok(7),
        ]));

        let result = policy
            .run(|_| {
                let next = script.borrow_mut().pop_front().unwrap();
                async move { next }
            })
            .await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn attempt_numbers_are_one_based() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let seen = RefCell::new(Vec::new());

        let _: Result<(), TestError> = policy
            .run(|attempt| {
                seen.borrow_mut().push(attempt);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
