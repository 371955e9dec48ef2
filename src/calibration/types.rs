use crate::error::{EngineError, Result};
use crate::models::heston::heston_model::HestonParameters;

/// Lower edge of the admissible implied-vol band (exclusive).
pub const MIN_VALID_IV: f64 = 0.001;
/// Upper edge of the admissible implied-vol band (exclusive).
pub const MAX_VALID_IV: f64 = 5.0;

/// A resolved market implied volatility at one strike/maturity, with its weight
/// in the calibration objective.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolatilityPoint {
    /// Strike price
    pub strike: f64,
    /// Time to expiration in years
    pub maturity: f64,
    /// Market implied volatility (as decimal, e.g., 0.25 for 25%)
    pub market_iv: f64,
    /// Liquidity weight (usually traded volume)
    pub weight: f64,
}

impl VolatilityPoint {
    pub fn new(strike: f64, maturity: f64, market_iv: f64, weight: f64) -> Result<Self> {
        let point = Self {
            strike,
            maturity,
            market_iv,
            weight,
        };
        if !(strike.is_finite() && strike > 0.0) {
            return Err(EngineError::invalid_input(format!(
                "strike must be positive, got {strike}"
            )));
        }
        if !(maturity.is_finite() && maturity > 0.0) {
            return Err(EngineError::invalid_input(format!(
                "maturity must be positive, got {maturity}"
            )));
        }
        if !(weight.is_finite() && weight > 0.0) {
            return Err(EngineError::invalid_input(format!(
                "weight must be positive, got {weight}"
            )));
        }
        if !point.has_valid_iv() {
            return Err(EngineError::invalid_input(format!(
                "market IV {market_iv} outside ({MIN_VALID_IV}, {MAX_VALID_IV})"
            )));
        }
        Ok(point)
    }

    /// True when the IV lies strictly inside the admissible band.
    pub fn has_valid_iv(&self) -> bool {
        is_valid_iv(self.market_iv)
    }

    /// Usable by the calibrator: valid IV, positive strike, maturity and weight.
    pub fn is_usable(&self) -> bool {
        self.has_valid_iv()
            && self.strike.is_finite()
            && self.strike > 0.0
            && self.maturity.is_finite()
            && self.maturity > 0.0
            && self.weight.is_finite()
            && self.weight > 0.0
    }
}

pub fn is_valid_iv(iv: f64) -> bool {
    iv.is_finite() && iv > MIN_VALID_IV && iv < MAX_VALID_IV
}

/// Outcome of a Heston calibration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationResult {
    pub params: HestonParameters,
    /// Root of the weighted mean-squared vol error, in vol units
    pub rmse: f64,
    /// Whether the optimizer reported convergence
    pub converged: bool,
    /// Number of points that entered the objective
    pub n_points: usize,
    /// Objective evaluations spent by the optimizer
    pub evaluations: usize,
    /// Final weighted mean-squared error
    pub objective: f64,
    /// 2κθ >= σ_v²
    pub feller_satisfied: bool,
}

/// Model calibrator trait for parameter optimization
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the model (e.g., "heston")
    fn model_name(&self) -> &str;

    /// How many parameters are in the model's optimization vector
    fn param_count(&self) -> usize;

    /// Returns the vector of (min, max) bounds for each parameter
    fn param_bounds(&self) -> &[(f64, f64)];

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<&str>;

    /// Structured starting point derived from the data
    fn initial_guess(&self, data: &[VolatilityPoint]) -> Vec<f64>;

    /// Given a parameter vector `x` and data, returns the objective value
    fn evaluate_objective(&self, x: &[f64], data: &[VolatilityPoint]) -> f64;
}
