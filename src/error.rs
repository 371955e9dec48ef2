//! Error taxonomy for the pricing and calibration engine.
//!
//! Every public operation returns [`Result<T>`]. Failures a caller is expected to
//! act on (drop a quote, widen the data set, fix an input) have their own variant
//! so the fallback-vs-propagate decision is visible in the signature.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    /// Nonphysical input rejected before any computation started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An inversion (Black-Scholes or Heston-implied) found no root in the admissible range.
    #[error("no solution: {0}")]
    NoSolution(String),

    /// Calibration was given fewer market points than it needs.
    #[error("insufficient data: need at least {required} points, got {found}")]
    InsufficientData { required: usize, found: usize },

    /// A quadrature or optimizer intermediate became non-finite.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn no_solution(msg: impl Into<String>) -> Self {
        Self::NoSolution(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

#[cfg(feature = "serde")]
impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

#[cfg(feature = "serde")]
impl From<toml::ser::Error> for EngineError {
    fn from(e: toml::ser::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// Reject NaN/inf and non-positive values for a named input.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::invalid_input(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

/// Reject NaN/inf for a named input that may take any sign.
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(EngineError::invalid_input(format!(
            "{name} must be finite, got {value}"
        )));
    }
    Ok(())
}
