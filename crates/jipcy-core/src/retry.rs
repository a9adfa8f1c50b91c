//! Bounded retry with a fixed delay.
//!
//! An operation is attempted at most `max_attempts` times. Between attempts
//! the caller waits `delay_ms`. Exhausting the attempts is a terminal
//! [`RetryError::Exhausted`] that the caller decides how to degrade; a
//! cancellation observed before an attempt, during one, or during the delay
//! ends the loop with [`RetryError::Cancelled`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay between attempts (milliseconds).
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 3_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Context handed to each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Rendered error of the previous attempt.
    pub last_error: Option<String>,
}

/// A value together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: Display> {
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E: Display> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Run `op` under `policy`, stopping early when `cancel` fires.
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<Attempted<T>, RetryError<E>>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.attempts();
    let mut last_error: Option<String> = None;

    for number in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                attempts: number - 1,
            });
        }

        let attempt = Attempt {
            number,
            last_error: last_error.take(),
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: number }),
            result = op(attempt) => result,
        };

        match result {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: number,
                })
            }
            Err(err) if number == max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: number,
                    last_error: err,
                })
            }
            Err(err) => {
                warn!(attempt = number, max_attempts, error = %err, "attempt failed, retrying");
                last_error = Some(err.to_string());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: number })
                    }
                    _ = tokio::time::sleep(policy.delay()) => {}
                }
            }
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let policy = RetryPolicy::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry_with_policy(&policy, &CancellationToken::new(), |_| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, 42);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result = retry_with_policy(&policy, &CancellationToken::new(), |_| async {
            Err::<(), _>("always fails".to_string())
        })
        .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "always fails");
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_error_is_passed_forward() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let _ = retry_with_policy(&policy, &CancellationToken::new(), |attempt| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(attempt.last_error.clone());
                Err::<(), _>(format!("failure {}", attempt.number))
            }
        })
        .await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![None, Some("failure 1".to_string())]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = retry_with_policy(&RetryPolicy::default(), &cancel, |_| async {
            Ok::<_, String>(1)
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(3600));
        let trigger = cancel.clone();

        let result = retry_with_policy(&policy, &cancel, |_| {
            let trigger = trigger.clone();
            async move {
                trigger.cancel();
                Err::<(), _>("fails".to_string())
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
    }
}
