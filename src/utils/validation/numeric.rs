//! Numeric validation utilities
//!
//! Range checks for configuration values and overflow-checked arithmetic for
//! buffer geometry.

use crate::error::{CompositeError, Result};

/// Validator for numeric operations and conversions
pub struct NumericValidator;

impl NumericValidator {
    /// Convert a non-negative finite f32 to u32, rounding to nearest
    pub fn round_f32_to_u32(value: f32) -> Result<u32> {
        if !value.is_finite() {
            return Err(CompositeError::internal(format!(
                "Cannot convert non-finite value {} to u32",
                value
            )));
        }

        if value < 0.0 {
            return Err(CompositeError::internal(format!(
                "Cannot convert negative value {} to u32",
                value
            )));
        }

        let rounded = value.round();
        if rounded > u32::MAX as f32 {
            return Err(CompositeError::internal(format!(
                "Value {} exceeds u32::MAX ({})",
                value,
                u32::MAX
            )));
        }

        Ok(rounded as u32)
    }

    /// Validate percentage value (0.0 to 1.0)
    pub fn validate_percentage(value: f32) -> Result<f32> {
        if !value.is_finite() {
            return Err(CompositeError::invalid_config(format!(
                "Percentage value must be finite, got {}",
                value
            )));
        }

        if !(0.0..=1.0).contains(&value) {
            return Err(CompositeError::invalid_config(format!(
                "Percentage value must be between 0.0 and 1.0, got {}",
                value
            )));
        }

        Ok(value)
    }

    /// Validate quality setting (0-100)
    pub fn validate_quality(value: u8) -> Result<u8> {
        if value > 100 {
            return Err(CompositeError::invalid_config(format!(
                "Quality must be between 0 and 100, got {}",
                value
            )));
        }
        Ok(value)
    }

    /// Validate thread count
    pub fn validate_thread_count(value: usize) -> Result<usize> {
        const MAX_THREADS: usize = 256;

        if value > MAX_THREADS {
            return Err(CompositeError::invalid_config(format!(
                "Thread count {} exceeds maximum allowed ({})",
                value, MAX_THREADS
            )));
        }

        Ok(value)
    }

    /// Validate that a value is positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if value <= T::default() {
            return Err(CompositeError::invalid_config(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate per-channel normalization parameters for model input
    pub fn validate_normalization_params(
        mean: &[f32],
        std: &[f32],
        expected_channels: usize,
    ) -> Result<()> {
        if mean.len() != expected_channels || std.len() != expected_channels {
            return Err(CompositeError::invalid_config(format!(
                "Normalization needs {} mean and std values, got {} and {}",
                expected_channels,
                mean.len(),
                std.len()
            )));
        }

        if let Some((i, value)) = mean.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(CompositeError::invalid_config(format!(
                "Mean value at index {} is not finite: {}",
                i, value
            )));
        }

        for (i, &value) in std.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(CompositeError::invalid_config(format!(
                    "Std value at index {} must be positive and finite: {}",
                    i, value
                )));
            }
            if value > 10.0 {
                tracing::warn!(
                    index = i,
                    value,
                    "Unusually large std value (typical range: 0.1-2.0)"
                );
            }
        }

        Ok(())
    }
}
