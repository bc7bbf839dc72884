//! Retry budgets and backoff schedules for the scrape loop.
//!
//! Delays go through a `Sleeper` so tests can record them instead of waiting.

#[cfg(test)]
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Immediate,
    Fixed(Duration),
    /// Retry `k` (1-based) waits `U(min_per_attempt·k, max_per_attempt·k)`, capped.
    Jittered {
        min_per_attempt: Duration,
        max_per_attempt: Duration,
        cap: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Seed for the jitter RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl RetryPolicy {
    pub fn jittered(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Jittered {
                min_per_attempt: Duration::from_secs(5),
                max_per_attempt: Duration::from_secs(8),
                cap: Duration::from_secs(60),
            },
            seed: None,
        }
    }

    pub fn schedule(&self) -> BackoffSchedule {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        BackoffSchedule {
            backoff: self.backoff.clone(),
            rng,
            last: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::jittered(3)
    }
}

/// Per-operation delay generator. Successive delays never decrease.
pub struct BackoffSchedule {
    backoff: Backoff,
    rng: StdRng,
    last: Duration,
}

impl BackoffSchedule {
    /// Delay before retry number `retry` (1 for the first retry).
    pub fn next_delay(&mut self, retry: u32) -> Duration {
        let k = retry.max(1);
        let drawn = match &self.backoff {
            Backoff::Immediate => Duration::ZERO,
            Backoff::Fixed(d) => *d,
            Backoff::Jittered {
                min_per_attempt,
                max_per_attempt,
                cap,
            } => {
                let lo = min_per_attempt.saturating_mul(k).min(*cap);
                let hi = max_per_attempt.saturating_mul(k).min(*cap).max(lo);
                let ms = self
                    .rng
                    .random_range(lo.as_millis() as u64..=hi.as_millis() as u64);
                Duration::from_millis(ms)
            }
        };
        self.last = self.last.max(drawn);
        self.last
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records every requested delay and returns immediately.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> RetryPolicy {
        RetryPolicy {
            seed: Some(seed),
            ..RetryPolicy::jittered(5)
        }
    }

    #[test]
    fn test_jittered_delays_stay_in_range() {
        let mut schedule = seeded(7).schedule();
        for k in 1..=4u32 {
            let d = schedule.next_delay(k);
            assert!(
                d >= Duration::from_secs(5 * k as u64) && d <= Duration::from_secs(8 * k as u64),
                "retry {k} waited {d:?}"
            );
        }
    }

    #[test]
    fn test_delays_never_decrease_even_when_capped() {
        let policy = RetryPolicy {
            max_attempts: 20,
            backoff: Backoff::Jittered {
                min_per_attempt: Duration::from_secs(5),
                max_per_attempt: Duration::from_secs(8),
                cap: Duration::from_secs(20),
            },
            seed: Some(42),
        };
        for seed in 0..20 {
            let mut schedule = RetryPolicy { seed: Some(seed), ..policy.clone() }.schedule();
            let delays: Vec<_> = (1..=10).map(|k| schedule.next_delay(k)).collect();
            assert!(
                delays.windows(2).all(|w| w[0] <= w[1]),
                "seed {seed} produced a decreasing schedule: {delays:?}"
            );
            assert!(delays.iter().all(|d| *d <= Duration::from_secs(20)));
        }
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let mut a = seeded(99).schedule();
        let mut b = seeded(99).schedule();
        for k in 1..=3 {
            assert_eq!(a.next_delay(k), b.next_delay(k));
        }
    }

    #[tokio::test]
    async fn test_recording_sleeper_returns_immediately() {
        let sleeper = RecordingSleeper::default();
        sleeper.sleep(Duration::from_secs(3600)).await;
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(3600)]);
    }
}
