//! Engine configuration: solver, quadrature, calibration, quote filtering and
//! surface grid settings, with named presets and TOML loading.

use crate::calibration::optimizer::{BoundedOptimizer, LbfgsbOptimizer, NelderMeadOptimizer};
use crate::calibration::quotes::QuoteFilter;
use crate::error::{EngineError, Result};
use crate::models::bs::implied_vol::IvSolverConfig;
use crate::models::heston::heston_calibrator::HestonParamBounds;
use crate::models::heston::heston_pricer::QuadratureConfig;
use crate::surface::SurfaceConfig;

/// Which bounded optimizer drives the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum OptimizerMethod {
    #[default]
    Lbfgsb,
    NelderMead,
}

/// Optimizer selection and stopping rules
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizerConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub method: OptimizerMethod,

    #[cfg_attr(feature = "serde", serde(default = "default_max_iterations"))]
    pub max_iterations: usize,

    /// Gradient tolerance (L-BFGS-B) or simplex spread tolerance (Nelder-Mead)
    #[cfg_attr(feature = "serde", serde(default = "default_tolerance"))]
    pub tolerance: f64,

    /// Absolute objective-change stop for L-BFGS-B
    #[cfg_attr(feature = "serde", serde(default = "default_obj_tol"))]
    pub obj_tol: f64,

    /// Step-length stop for L-BFGS-B
    #[cfg_attr(feature = "serde", serde(default = "default_step_size_tol"))]
    pub step_size_tol: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: OptimizerMethod::default(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            obj_tol: default_obj_tol(),
            step_size_tol: default_step_size_tol(),
        }
    }
}

impl OptimizerConfig {
    pub fn build(&self) -> Box<dyn BoundedOptimizer> {
        match self.method {
            OptimizerMethod::Lbfgsb => Box::new(LbfgsbOptimizer {
                max_iterations: self.max_iterations,
                tolerance: self.tolerance,
                obj_tol: self.obj_tol,
                step_size_tol: self.step_size_tol,
            }),
            OptimizerMethod::NelderMead => Box::new(NelderMeadOptimizer {
                max_iterations: self.max_iterations,
                tolerance: self.tolerance,
                ..NelderMeadOptimizer::default()
            }),
        }
    }
}

/// Heston calibration settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct CalibrationConfig {
    /// Fewer usable points than this is an error
    pub min_points: usize,
    /// Squared-vol penalty for a point the model cannot resolve (0.25 = 50 vol points)
    pub failure_penalty: f64,
    /// Starting mean-reversion speed
    pub initial_kappa: f64,
    /// Starting vol-of-vol
    pub initial_sigma_v: f64,
    /// Starting correlation
    pub initial_rho: f64,
    pub bounds: HestonParamBounds,
    pub optimizer: OptimizerConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_points: 5,
            failure_penalty: 0.25,
            initial_kappa: 2.0,
            initial_sigma_v: 0.4,
            initial_rho: -0.7,
            bounds: HestonParamBounds::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_points == 0 {
            return Err(EngineError::config("min_points must be > 0"));
        }
        if !(self.failure_penalty.is_finite() && self.failure_penalty > 0.0) {
            return Err(EngineError::config(format!(
                "failure_penalty must be positive, got {}",
                self.failure_penalty
            )));
        }
        if self.optimizer.max_iterations == 0 {
            return Err(EngineError::config("optimizer.max_iterations must be > 0"));
        }
        let tols = [
            self.optimizer.tolerance,
            self.optimizer.obj_tol,
            self.optimizer.step_size_tol,
        ];
        if tols.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
            return Err(EngineError::config(format!(
                "optimizer tolerances must be positive, got {tols:?}"
            )));
        }
        self.bounds.validate()
    }
}

/// Everything the engine can be tuned with, in one place.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct EngineConfig {
    pub solver: IvSolverConfig,
    pub quadrature: QuadratureConfig,
    pub calibration: CalibrationConfig,
    pub surface: SurfaceConfig,
    pub quotes: QuoteFilter,
}

impl EngineConfig {
    /// Default configuration for production calibration with high accuracy
    pub fn production() -> Self {
        Self::default()
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            quadrature: QuadratureConfig {
                order: 64,
                ..QuadratureConfig::default()
            },
            calibration: CalibrationConfig {
                optimizer: OptimizerConfig {
                    max_iterations: 100,
                    tolerance: 1e-8,
                    ..OptimizerConfig::default()
                },
                ..CalibrationConfig::default()
            },
            ..Self::default()
        }
    }

    /// High-precision configuration for research and backtesting
    pub fn research() -> Self {
        Self {
            solver: IvSolverConfig {
                newton_tolerance: 1e-12,
                brent_tolerance: 1e-10,
                ..IvSolverConfig::default()
            },
            quadrature: QuadratureConfig {
                order: 192,
                phi_hi: 150.0,
                ..QuadratureConfig::default()
            },
            calibration: CalibrationConfig {
                optimizer: OptimizerConfig {
                    max_iterations: 1000,
                    tolerance: 1e-12,
                    obj_tol: 1e-16,
                    step_size_tol: 1e-14,
                    ..OptimizerConfig::default()
                },
                ..CalibrationConfig::default()
            },
            surface: SurfaceConfig::default().with_shape(40, 16),
            ..Self::default()
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            quadrature: QuadratureConfig {
                order: 48,
                phi_hi: 80.0,
                ..QuadratureConfig::default()
            },
            calibration: CalibrationConfig {
                optimizer: OptimizerConfig {
                    method: OptimizerMethod::NelderMead,
                    max_iterations: 100,
                    tolerance: 1e-6,
                    ..OptimizerConfig::default()
                },
                ..CalibrationConfig::default()
            },
            surface: SurfaceConfig::default().with_shape(10, 4),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.quadrature.order == 0 || !(self.quadrature.phi_hi > self.quadrature.phi_lo) {
            return Err(EngineError::config(format!(
                "invalid quadrature settings: {:?}",
                self.quadrature
            )));
        }
        self.calibration.validate()?;
        self.surface.validate()
    }

    /// Parse a TOML document; missing sections and fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    #[cfg(feature = "serde")]
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

fn default_max_iterations() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_obj_tol() -> f64 {
    1e-14
}

fn default_step_size_tol() -> f64 {
    1e-12
}
