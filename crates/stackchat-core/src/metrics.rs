//! Usage metrics for a chat session.
//!
//! Token counts are estimated from the word count of each response
//! (`floor(words * 1.3)`), not produced by a tokenizer. The estimate is known
//! to drift from the backend's real count, especially for non-English text.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Estimated tokens per whitespace-separated word, as a ratio of tenths.
const TOKENS_PER_WORD_TENTHS: u64 = 13;

/// Approximate token count of `text`: `floor(word_count * 1.3)`.
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    words * TOKENS_PER_WORD_TENTHS / 10
}

/// One completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    /// Wall-clock time the turn completed.
    pub timestamp: DateTime<Local>,
    pub estimated_tokens: u64,
    pub elapsed_seconds: f64,
}

impl UsageSample {
    /// Builds the sample for a finished response.
    pub fn from_response(response: &str, elapsed: Duration, completed_at: DateTime<Local>) -> Self {
        Self {
            timestamp: completed_at,
            estimated_tokens: estimate_tokens(response),
            elapsed_seconds: elapsed.as_secs_f64(),
        }
    }
}

/// Accumulated usage for one session. Only grows.
///
/// `samples.len() == request_count` and
/// `total_estimated_tokens == sum(samples.estimated_tokens)` always hold,
/// since [`UsageStats::record`] is the only mutator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    request_count: u64,
    total_estimated_tokens: u64,
    samples: Vec<UsageSample>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: UsageSample) {
        self.request_count += 1;
        self.total_estimated_tokens += sample.estimated_tokens;
        self.samples.push(sample);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn total_estimated_tokens(&self) -> u64 {
        self.total_estimated_tokens
    }

    pub fn samples(&self) -> &[UsageSample] {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<&UsageSample> {
        self.samples.last()
    }

    /// Mean estimated tokens per request, once there is more than one sample.
    pub fn average_tokens(&self) -> Option<f64> {
        if self.samples.len() > 1 {
            Some(self.total_estimated_tokens as f64 / self.samples.len() as f64)
        } else {
            None
        }
    }

    /// Mean response latency over all samples.
    pub fn average_elapsed_seconds(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(|s| s.elapsed_seconds).sum();
        Some(total / self.samples.len() as f64)
    }
}
