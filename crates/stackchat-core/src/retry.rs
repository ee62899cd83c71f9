//! Bounded readiness polling with a fixed delay.

use crate::backend::{Backend, Readiness};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many times to probe the backend and how long to wait in between.
///
/// Fields missing from a config section take the interactive preset's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(rename = "delay_secs", with = "duration_secs")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Startup wait of the interactive chat: 3 attempts, 2 seconds apart.
    pub fn interactive() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// Wait used by the setup commands: 30 attempts, 1 second apart.
    pub fn setup() -> Self {
        Self::new(30, Duration::from_secs(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::interactive()
    }
}

/// A failed probe, handed to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
    pub readiness: Readiness,
}

impl ProbeAttempt {
    /// Whether another probe follows this one.
    pub fn will_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// Probes until the backend is ready or the policy is exhausted.
///
/// Sleeps `policy.delay` between attempts, never after the last one.
/// `on_failure` is called after every failed probe.
pub async fn wait_until_ready<B, F>(backend: &B, policy: &RetryPolicy, mut on_failure: F) -> bool
where
    B: Backend + ?Sized,
    F: FnMut(&ProbeAttempt),
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let readiness = backend.probe().await;
        if readiness.is_ready() {
            tracing::debug!("[Readiness] Backend ready after {} attempt(s)", attempt);
            return true;
        }

        let report = ProbeAttempt {
            attempt,
            max_attempts,
            readiness,
        };
        if report.readiness.is_expected_failure() {
            tracing::debug!(
                "[Readiness] Attempt {}/{} failed: {}",
                attempt,
                max_attempts,
                report.readiness
            );
        } else {
            tracing::warn!(
                "[Readiness] Attempt {}/{} failed: {}",
                attempt,
                max_attempts,
                report.readiness
            );
        }
        on_failure(&report);

        if report.will_retry() {
            tokio::time::sleep(policy.delay).await;
        }
    }
    false
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
