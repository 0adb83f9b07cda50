//! Error handling for fxcore
//!
//! Errors only surface from setup paths (`init`, `set`, config loading).
//! Per-sample processing never fails.

use thiserror::Error;

/// Result type alias for fxcore operations
pub type Result<T> = std::result::Result<T, FxError>;

/// Main error type for fxcore operations
#[derive(Error, Debug)]
pub enum FxError {
    // Parameter errors
    #[error("Invalid parameter: {param} = {value} (valid range: {min}..{max})")]
    InvalidParameter {
        param: String,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    // Topology errors
    #[error("Unknown reverb tank type: {value}")]
    UnknownTankType { value: String },

    #[error("Unstable coefficient in {stage}: {value} (must lie strictly within -1..1)")]
    UnstableCoefficient { stage: String, value: f32 },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FxError {
    /// Shorthand for a parameter error
    pub fn invalid_parameter(param: &str, value: f32, min: f32, max: f32) -> Self {
        FxError::InvalidParameter {
            param: param.to_string(),
            value,
            min,
            max,
        }
    }

    /// Shorthand for a configuration error
    pub fn invalid_config(details: impl Into<String>) -> Self {
        FxError::InvalidConfig {
            details: details.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            FxError::InvalidConfig { .. } => "INVALID_CONFIG",
            FxError::UnknownTankType { .. } => "UNKNOWN_TANK_TYPE",
            FxError::UnstableCoefficient { .. } => "UNSTABLE_COEFFICIENT",
            FxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the component in its previous valid state,
    /// so the caller can retry with corrected values.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FxError::InvalidParameter { .. } => true,
            FxError::UnknownTankType { .. } => true,
            FxError::Serialization(_) => true,
            FxError::InvalidConfig { .. } => false,
            FxError::UnstableCoefficient { .. } => false,
        }
    }
}

/// Reject non-finite values; finite values pass through unchanged.
pub(crate) fn ensure_finite(param: &str, value: f32, min: f32, max: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FxError::invalid_parameter(param, value, min, max))
    }
}

/// Clamp a finite parameter into its domain, logging when it moved.
pub(crate) fn clamp_param(param: &str, value: f32, min: f32, max: f32) -> Result<f32> {
    let value = ensure_finite(param, value, min, max)?;
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!("{} = {} outside {}..{}, clamped to {}", param, value, min, max, clamped);
    }
    Ok(clamped)
}
