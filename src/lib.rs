//! # heston-surface: European Option Pricing and Heston Volatility Surfaces
//!
//! `heston-surface` prices European vanilla options and fits the Heston stochastic
//! volatility model to observed quotes, producing a smooth implied-volatility
//! surface.
//!
//! ## Core Features
//!
//! - **Black-Scholes**: closed-form prices and Greeks in trading units
//! - **Implied Volatility**: Newton-Raphson with a Brent fallback, explicit failures
//! - **Heston Pricing**: little-trap characteristic function with Gauss-Legendre quadrature
//! - **Calibration**: bounded local optimization (L-BFGS-B or Nelder-Mead) in vol space
//! - **Surfaces**: model-implied vols on a strike/maturity grid, gaps left visible
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heston_surface::{calibrate, generate_surface, GridShape, VolatilityPoint};
//!
//! # fn load_points() -> Vec<VolatilityPoint> { vec![] }
//! let points: Vec<VolatilityPoint> = load_points();
//! let (spot, r, q) = (100.0, 0.03, 0.01);
//!
//! let result = calibrate(&points, spot, r, q)?;
//! println!("rmse = {:.4}, feller = {}", result.rmse, result.feller_satisfied);
//!
//! let grid = generate_surface(spot, r, q, &result.params, GridShape::new(20, 8))?;
//! println!("{} unresolved nodes", grid.missing_count());
//! # Ok::<(), heston_surface::EngineError>(())
//! ```
//!
//! ## Configuration Presets
//!
//! The library provides several configuration presets:
//! - `production()`: High accuracy defaults
//! - `fast()`: Coarser quadrature and fewer optimizer iterations
//! - `research()`: High-precision settings for research
//! - `minimal()`: Quick validation settings

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod error;
pub mod market;
pub mod models;
pub mod surface;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

pub use calibration::{
    config::{CalibrationConfig, EngineConfig, OptimizerConfig, OptimizerMethod},
    optimizer::{BoundedOptimizer, LbfgsbOptimizer, NelderMeadOptimizer},
    quotes::{QuoteBatch, QuoteFilter, QuoteProcessor},
    types::{CalibrationResult, VolatilityPoint},
};
pub use error::{EngineError, Result};
pub use market::{Greeks, MarketSnapshot, OptionContract, OptionQuote, OptionType};
pub use models::bs::{implied_vol::IvSolverConfig, BlackScholesPricer};
pub use models::heston::{
    HestonCalibrator, HestonModel, HestonParamBounds, HestonParameters, HestonPricer, ModelPrice,
    QuadratureConfig,
};
pub use surface::{GridShape, SurfaceConfig, SurfaceGenerator, SurfaceGrid};

use calibration::types::ModelCalibrator;
use models::bs::implied_vol::ImpliedVolSolver;
use models::heston::HestonModelCalibrator;

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured engine settings for common use cases.
///
/// - [`production()`]: the documented defaults (128-node quadrature, L-BFGS-B, 300 iterations)
/// - [`fast()`]: development settings
/// - [`research()`]: high-precision settings
/// - [`minimal()`]: quick validation settings
pub mod default_configs {
    use crate::calibration::config::EngineConfig;

    /// Production-grade configuration.
    ///
    /// **Characteristics:**
    /// - 128-node Gauss-Legendre rule on φ in [1e-8, 100]
    /// - L-BFGS-B, 300 iterations, tolerance 1e-10
    /// - 20 x 8 surface grid
    ///
    /// # Example
    ///
    /// ```rust
    /// use heston_surface::default_configs;
    ///
    /// let config = default_configs::production();
    /// assert_eq!(config.quadrature.order, 128);
    /// ```
    pub fn production() -> EngineConfig {
        EngineConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - 64-node quadrature
    /// - L-BFGS-B, 100 iterations, tolerance 1e-8
    pub fn fast() -> EngineConfig {
        EngineConfig::fast()
    }

    /// High-precision configuration for research and backtesting.
    ///
    /// **Characteristics:**
    /// - 192-node quadrature on φ in [1e-8, 150]
    /// - L-BFGS-B, 1,000 iterations, tolerance 1e-12
    /// - 40 x 16 surface grid
    pub fn research() -> EngineConfig {
        EngineConfig::research()
    }

    /// Minimal configuration for quick validation and debugging.
    ///
    /// **Characteristics:**
    /// - 48-node quadrature on φ in [1e-8, 80]
    /// - Nelder-Mead, 100 iterations, tolerance 1e-6
    /// - 10 x 4 surface grid
    pub fn minimal() -> EngineConfig {
        EngineConfig::minimal()
    }
}

// ================================================================================================
// PRICING
// ================================================================================================

/// Black-Scholes price of a position at the snapshot's flat volatility.
///
/// The price is per contract unit times `|quantity|`. A maturity on the
/// valuation date prices at discounted intrinsic value.
///
/// # Errors
///
/// [`EngineError::InvalidInput`] for nonphysical market data, zero quantity or a
/// maturity before the valuation date.
pub fn price(contract: &OptionContract, market: &MarketSnapshot) -> Result<f64> {
    BlackScholesPricer::new().price(contract, market)
}

/// Black-Scholes Greeks of a position.
///
/// Vega and rho are per 1% move, theta per calendar day. Delta and rho scale with
/// the signed quantity, the others with its absolute value.
pub fn greeks(contract: &OptionContract, market: &MarketSnapshot) -> Result<Greeks> {
    BlackScholesPricer::new().greeks(contract, market)
}

/// Black-Scholes implied volatility of an observed price.
///
/// # Errors
///
/// * [`EngineError::NoSolution`] if the price violates the arbitrage bounds or no
///   volatility in [0.001, 5.0] reproduces it
/// * [`EngineError::InvalidInput`] for non-positive `S`, `K` or `T`
///
/// # Example
///
/// ```rust
/// use heston_surface::{solve_implied_vol, OptionType};
///
/// let iv = solve_implied_vol(10.450583572185565, 100.0, 100.0, 1.0, 0.05, 0.0, OptionType::Call)?;
/// assert!((iv - 0.20).abs() < 1e-6);
/// # Ok::<(), heston_surface::EngineError>(())
/// ```
#[allow(non_snake_case)]
pub fn solve_implied_vol(
    price: f64,
    S: f64,
    K: f64,
    T: f64,
    r: f64,
    q: f64,
    option_type: OptionType,
) -> Result<f64> {
    ImpliedVolSolver::default().solve(price, S, K, T, r, q, option_type)
}

// ================================================================================================
// CALIBRATION
// ================================================================================================

/// Turn raw quotes into weighted volatility points.
///
/// Dropped quotes are logged at debug level; use [`QuoteProcessor`] directly to
/// inspect the rejection reasons.
pub fn build_volatility_points(
    quotes: &[OptionQuote],
    market: &MarketSnapshot,
    filter: QuoteFilter,
) -> Result<Vec<VolatilityPoint>> {
    let processor = QuoteProcessor::new(filter, IvSolverConfig::default());
    Ok(processor.process(quotes, market)?.points)
}

/// Calibrate Heston parameters with the production configuration.
///
/// # Errors
///
/// * [`EngineError::InsufficientData`] with fewer than 5 points whose IV lies in (0.001, 5.0)
/// * [`EngineError::InvalidInput`] for a non-positive spot or non-finite rates
///
/// Optimizer non-convergence is reported through [`CalibrationResult::converged`].
pub fn calibrate(
    points: &[VolatilityPoint],
    spot: f64,
    r: f64,
    q: f64,
) -> Result<CalibrationResult> {
    calibrate_with_config(points, spot, r, q, &EngineConfig::production())
}

/// Calibrate Heston parameters with an explicit configuration.
pub fn calibrate_with_config(
    points: &[VolatilityPoint],
    spot: f64,
    r: f64,
    q: f64,
    config: &EngineConfig,
) -> Result<CalibrationResult> {
    let pricer = HestonPricer::with_solver(&config.quadrature, config.solver.clone())?;
    HestonCalibrator::new(pricer, config.calibration.clone())?.calibrate(points, spot, r, q)
}

/// Evaluate the calibration objective for a fixed parameter set.
///
/// This is **exactly the same loss value** that [`calibrate`] minimises, so it
/// can be used to monitor fit quality without re-running the optimizer.
pub fn evaluate_heston(
    points: &[VolatilityPoint],
    spot: f64,
    r: f64,
    q: f64,
    params: &HestonParameters,
) -> Result<f64> {
    let config = EngineConfig::production();
    let pricer = HestonPricer::with_solver(&config.quadrature, config.solver)?;
    let model = HestonModelCalibrator::new(&pricer, spot, r, q, config.calibration)?;
    let usable: Vec<VolatilityPoint> = points.iter().copied().filter(|p| p.is_usable()).collect();
    Ok(model.evaluate_objective(&params.to_vec(), &usable))
}

// ================================================================================================
// SURFACE
// ================================================================================================

/// Heston-implied volatility surface over the default moneyness/maturity ranges.
///
/// Rows follow maturity, columns follow strike; unresolved nodes are `None`.
pub fn generate_surface(
    spot: f64,
    r: f64,
    q: f64,
    params: &HestonParameters,
    shape: GridShape,
) -> Result<SurfaceGrid> {
    let config = EngineConfig {
        surface: SurfaceConfig::default().with_shape(shape.n_strikes, shape.n_maturities),
        ..EngineConfig::production()
    };
    generate_surface_with_config(spot, r, q, params, &config)
}

pub fn generate_surface_with_config(
    spot: f64,
    r: f64,
    q: f64,
    params: &HestonParameters,
    config: &EngineConfig,
) -> Result<SurfaceGrid> {
    params.validate()?;
    let pricer = HestonPricer::with_solver(&config.quadrature, config.solver.clone())?;
    let model = HestonModel::new(&pricer, *params);
    SurfaceGenerator::new(config.surface.clone()).generate(&model, spot, r, q)
}
