//! Generation parameters passed with every chat completion.

use crate::error::{Result, StackChatError};
use serde::Serialize;
use std::ops::RangeInclusive;

/// Sampling parameters for one session.
///
/// Fields are private so every change goes through a range-checked setter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl GenerationParams {
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 500;
    pub const DEFAULT_TOP_P: f32 = 0.95;

    pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;
    pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 100..=2000;
    pub const TOP_P_RANGE: RangeInclusive<f32> = 0.1..=1.0;

    /// Builds a validated parameter set.
    pub fn new(temperature: f32, max_tokens: u32, top_p: f32) -> Result<Self> {
        let mut params = Self::default();
        params.set_temperature(temperature)?;
        params.set_max_tokens(max_tokens)?;
        params.set_top_p(top_p)?;
        Ok(params)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn set_temperature(&mut self, value: f32) -> Result<()> {
        check_range("temperature", value, &Self::TEMPERATURE_RANGE)?;
        self.temperature = value;
        Ok(())
    }

    pub fn set_max_tokens(&mut self, value: u32) -> Result<()> {
        check_range("max_tokens", value, &Self::MAX_TOKENS_RANGE)?;
        self.max_tokens = value;
        Ok(())
    }

    pub fn set_top_p(&mut self, value: f32) -> Result<()> {
        check_range("top_p", value, &Self::TOP_P_RANGE)?;
        self.top_p = value;
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            top_p: Self::DEFAULT_TOP_P,
        }
    }
}

fn check_range<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    // NaN fails `contains`, so it is rejected here too.
    if range.contains(&value) {
        Ok(())
    } else {
        Err(StackChatError::config(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.temperature(), 0.7);
        assert_eq!(params.max_tokens(), 500);
        assert_eq!(params.top_p(), 0.95);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let params = GenerationParams::new(0.0, 100, 0.1).unwrap();
        assert_eq!(params.max_tokens(), 100);
        let params = GenerationParams::new(1.0, 2000, 1.0).unwrap();
        assert_eq!(params.top_p(), 1.0);
    }

    #[test]
    fn test_out_of_range_is_rejected_and_value_kept() {
        let mut params = GenerationParams::default();

        assert!(params.set_temperature(1.5).unwrap_err().is_config());
        assert!(params.set_max_tokens(50).is_err());
        assert!(params.set_max_tokens(2001).is_err());
        assert!(params.set_top_p(0.05).is_err());
        assert!(params.set_temperature(f32::NAN).is_err());

        assert_eq!(params, GenerationParams::default());
    }
}
