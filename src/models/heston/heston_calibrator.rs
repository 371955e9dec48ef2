// src/models/heston/heston_calibrator.rs

//! Heston model calibrator implementation
//!
//! Fits the five Heston parameters to market implied vols by minimizing the
//! weight-normalized squared vol error. Points the model cannot resolve (no root,
//! intrinsic fallback, vol outside the admissible band) are charged a fixed
//! penalty instead of aborting the evaluation, so the objective stays finite
//! everywhere inside the bounds.

use statrs::statistics::{Data, Median};
use tracing::{debug, info, warn};

use crate::calibration::config::CalibrationConfig;
use crate::calibration::optimizer::BoundedOptimizer;
use crate::calibration::pipeline::calibrate_model;
use crate::calibration::types::{is_valid_iv, CalibrationResult, ModelCalibrator, VolatilityPoint};
use crate::error::{ensure_finite, ensure_positive, EngineError, Result};
use crate::models::heston::heston_model::HestonParameters;
use crate::models::heston::heston_pricer::HestonPricer;

/// Structure to hold parameter bounds for the Heston model calibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct HestonParamBounds {
    /// Initial variance
    pub v0: (f64, f64),
    /// Mean-reversion speed
    pub kappa: (f64, f64),
    /// Long-run variance
    pub theta: (f64, f64),
    /// Vol of variance
    pub sigma_v: (f64, f64),
    /// Spot/variance correlation
    pub rho: (f64, f64),
}

impl Default for HestonParamBounds {
    fn default() -> Self {
        Self {
            v0: (1e-4, 0.9),
            kappa: (0.1, 15.0),
            theta: (1e-4, 0.9),
            sigma_v: (0.05, 2.0),
            rho: (-0.99, 0.99),
        }
    }
}

impl TryFrom<&[(f64, f64)]> for HestonParamBounds {
    type Error = EngineError;

    fn try_from(bounds: &[(f64, f64)]) -> Result<Self> {
        match bounds {
            &[v0, kappa, theta, sigma_v, rho] => Ok(Self {
                v0,
                kappa,
                theta,
                sigma_v,
                rho,
            }),
            _ => Err(EngineError::config(format!(
                "expected 5 parameter bounds, got {}",
                bounds.len()
            ))),
        }
    }
}

impl HestonParamBounds {
    /// Bounds in optimizer-vector order.
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        vec![self.v0, self.kappa, self.theta, self.sigma_v, self.rho]
    }

    /// Every box must be non-empty and stay inside the pricing domain.
    pub fn validate(&self) -> Result<()> {
        for (name, (lo, hi)) in HestonParameters::NAMES.iter().zip(self.to_vec()) {
            if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
                return Err(EngineError::config(format!(
                    "bounds for {name} must satisfy lo < hi, got ({lo}, {hi})"
                )));
            }
        }
        if self.v0.0 < 0.0 || self.theta.0 < 0.0 || self.kappa.0 <= 0.0 || self.sigma_v.0 <= 0.0 {
            return Err(EngineError::config(
                "v0/theta bounds must be >= 0 and kappa/sigma_v bounds > 0",
            ));
        }
        if self.rho.0 <= -1.0 || self.rho.1 >= 1.0 {
            return Err(EngineError::config("rho bounds must lie inside (-1, 1)"));
        }
        Ok(())
    }

    pub fn clamp(&self, params: &HestonParameters) -> HestonParameters {
        HestonParameters {
            v0: params.v0.clamp(self.v0.0, self.v0.1),
            kappa: params.kappa.clamp(self.kappa.0, self.kappa.1),
            theta: params.theta.clamp(self.theta.0, self.theta.1),
            sigma_v: params.sigma_v.clamp(self.sigma_v.0, self.sigma_v.1),
            rho: params.rho.clamp(self.rho.0, self.rho.1),
        }
    }
}

/// Heston objective over a fixed market (spot, rates) for the optimizer pipeline.
#[derive(Debug, Clone)]
pub struct HestonModelCalibrator<'a> {
    pricer: &'a HestonPricer,
    spot: f64,
    rate: f64,
    dividend_yield: f64,
    param_bounds: Vec<(f64, f64)>,
    config: CalibrationConfig,
}

impl<'a> HestonModelCalibrator<'a> {
    pub fn new(
        pricer: &'a HestonPricer,
        spot: f64,
        rate: f64,
        dividend_yield: f64,
        config: CalibrationConfig,
    ) -> Result<Self> {
        ensure_positive("spot", spot)?;
        ensure_finite("rate", rate)?;
        ensure_finite("dividend_yield", dividend_yield)?;
        config.validate()?;
        Ok(Self {
            pricer,
            spot,
            rate,
            dividend_yield,
            param_bounds: config.bounds.to_vec(),
            config,
        })
    }

    /// Squared vol error for one point, or `None` when the model has no valid vol there.
    fn point_error(&self, params: &HestonParameters, point: &VolatilityPoint) -> Option<f64> {
        let iv = self
            .pricer
            .implied_vol_from_model(
                params,
                self.spot,
                point.strike,
                point.maturity,
                self.rate,
                self.dividend_yield,
            )
            .ok()?;
        if !is_valid_iv(iv) {
            return None;
        }
        let diff = iv - point.market_iv;
        Some(diff * diff)
    }
}

impl ModelCalibrator for HestonModelCalibrator<'_> {
    fn model_name(&self) -> &str {
        "heston"
    }

    fn param_count(&self) -> usize {
        self.param_bounds.len()
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn param_names(&self) -> Vec<&str> {
        HestonParameters::NAMES.to_vec()
    }

    /// v0 = theta = median(IV)², structural priors for the rest, clamped into bounds.
    fn initial_guess(&self, data: &[VolatilityPoint]) -> Vec<f64> {
        let ivs: Vec<f64> = data.iter().map(|p| p.market_iv).collect();
        let median = if ivs.is_empty() {
            0.2
        } else {
            Data::new(ivs).median()
        };
        let variance = median * median;
        let guess = HestonParameters {
            v0: variance,
            kappa: self.config.initial_kappa,
            theta: variance,
            sigma_v: self.config.initial_sigma_v,
            rho: self.config.initial_rho,
        };
        self.config.bounds.clamp(&guess).to_vec()
    }

    fn evaluate_objective(&self, x: &[f64], data: &[VolatilityPoint]) -> f64 {
        let penalty = self.config.failure_penalty;
        let total_weight: f64 = data.iter().map(|p| p.weight).sum();
        if data.is_empty() || !(total_weight > 0.0) {
            return penalty;
        }

        let params = match HestonParameters::from_slice(x) {
            Ok(p) => p,
            Err(_) => return penalty,
        };

        let weighted: f64 = data
            .iter()
            .map(|point| {
                let err = self.point_error(&params, point).unwrap_or(penalty);
                point.weight * err
            })
            .sum();

        let mse = weighted / total_weight;
        if mse.is_finite() {
            mse
        } else {
            penalty
        }
    }
}

/// Calibrates Heston parameters to volatility points.
#[derive(Debug)]
pub struct HestonCalibrator {
    pricer: HestonPricer,
    config: CalibrationConfig,
    optimizer: Box<dyn BoundedOptimizer>,
}

impl HestonCalibrator {
    pub fn new(pricer: HestonPricer, config: CalibrationConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = config.optimizer.build();
        Ok(Self {
            pricer,
            config,
            optimizer,
        })
    }

    /// Swap in a different optimizer implementation.
    pub fn with_optimizer(mut self, optimizer: Box<dyn BoundedOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn pricer(&self) -> &HestonPricer {
        &self.pricer
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Fit parameters to `points` for spot `spot`, rate `r`, dividend yield `q`.
    ///
    /// Points whose IV lies outside the admissible band are discarded first; fewer
    /// than `min_points` survivors is [`EngineError::InsufficientData`].
    /// Non-convergence is reported on the result, not as an error.
    pub fn calibrate(
        &self,
        points: &[VolatilityPoint],
        spot: f64,
        r: f64,
        q: f64,
    ) -> Result<CalibrationResult> {
        let usable: Vec<VolatilityPoint> = points.iter().copied().filter(|p| p.is_usable()).collect();
        if usable.len() < points.len() {
            debug!(
                discarded = points.len() - usable.len(),
                "discarded volatility points outside the admissible band"
            );
        }
        if usable.len() < self.config.min_points {
            return Err(EngineError::InsufficientData {
                required: self.config.min_points,
                found: usable.len(),
            });
        }

        let model = HestonModelCalibrator::new(&self.pricer, spot, r, q, self.config.clone())?;
        let guess = model.initial_guess(&usable);
        info!(
            points = usable.len(),
            optimizer = self.optimizer.name(),
            "calibrating heston model"
        );

        let outcome = calibrate_model(&model, &usable, self.optimizer.as_ref(), Some(guess));
        let params = HestonParameters::from_slice(&outcome.params)?;
        let objective = outcome.objective.max(0.0);
        let rmse = objective.sqrt();

        let feller_satisfied = params.satisfies_feller();
        if !feller_satisfied {
            warn!(
                kappa = params.kappa,
                theta = params.theta,
                sigma_v = params.sigma_v,
                "calibrated parameters violate the Feller condition 2κθ >= σ_v²"
            );
        }
        info!(
            rmse,
            converged = outcome.converged,
            evaluations = outcome.evaluations,
            "heston calibration finished"
        );

        Ok(CalibrationResult {
            params,
            rmse,
            converged: outcome.converged,
            n_points: usable.len(),
            evaluations: outcome.evaluations,
            objective,
            feller_satisfied,
        })
    }
}
