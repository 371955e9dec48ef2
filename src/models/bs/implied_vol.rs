// src/models/bs/implied_vol.rs

//! Black-Scholes implied-volatility inversion.
//!
//! Puts are mapped to call-equivalent prices through put-call parity and every
//! solve happens in call space. Newton-Raphson from a fixed starting volatility is
//! tried first; if it does not settle inside the plausible band, Brent's method on
//! the full band takes over. A bracket without a sign change is reported as
//! [`EngineError::NoSolution`] rather than widened.

use roots::{find_root_brent, SimpleConvergency};

use super::{bs_call_price, bs_vega, validate_raw_inputs};
use crate::error::{EngineError, Result};
use crate::market::OptionType;
use crate::models::utils::{call_from_put, call_intrinsic, discounted_legs};

/// Tunables for [`ImpliedVolSolver`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct IvSolverConfig {
    /// Newton starting volatility
    pub initial_guess: f64,
    /// Maximum Newton iterations before falling back to Brent
    pub max_newton_iterations: usize,
    /// Newton step size below which the iterate is accepted
    pub newton_tolerance: f64,
    /// Newton iterates are clamped into this range after each step
    pub newton_clamp: (f64, f64),
    /// Admissible volatility band; also the Brent bracket
    pub vol_bounds: (f64, f64),
    /// Brent tolerance
    pub brent_tolerance: f64,
    /// Brent iteration cap
    pub brent_max_iterations: usize,
    /// Vega below which Newton gives up
    pub min_vega: f64,
    /// Prices within this distance of intrinsic are treated as having no time value
    pub intrinsic_buffer: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            initial_guess: 0.30,
            max_newton_iterations: 25,
            newton_tolerance: 1e-9,
            newton_clamp: (1e-4, 10.0),
            vol_bounds: (0.001, 5.0),
            brent_tolerance: 1e-7,
            brent_max_iterations: 100,
            min_vega: 1e-12,
            intrinsic_buffer: 1e-9,
        }
    }
}

/// Inverts observed option prices to Black-Scholes volatilities.
#[derive(Debug, Clone, Default)]
pub struct ImpliedVolSolver {
    config: IvSolverConfig,
}

impl ImpliedVolSolver {
    pub fn new(config: IvSolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IvSolverConfig {
        &self.config
    }

    /// Solve for the volatility reproducing `price`.
    ///
    /// Returns a volatility inside `vol_bounds`, [`EngineError::NoSolution`] when
    /// the price violates the arbitrage bounds or no root exists in the band, or
    /// [`EngineError::InvalidInput`] for nonphysical inputs.
    #[allow(non_snake_case, clippy::too_many_arguments)]
    pub fn solve(
        &self,
        price: f64,
        S: f64,
        K: f64,
        T: f64,
        r: f64,
        q: f64,
        option_type: OptionType,
    ) -> Result<f64> {
        validate_raw_inputs(S, K, T, r, q)?;
        if !price.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "price must be finite, got {price}"
            )));
        }

        let call_price = match option_type {
            OptionType::Call => price,
            OptionType::Put => call_from_put(price, S, K, r, q, T),
        };

        // Arbitrage bounds in call space: intrinsic < C < S e^{-qT}
        let intrinsic = call_intrinsic(S, K, r, q, T);
        let (upper, _) = discounted_legs(S, K, r, q, T);
        if call_price <= intrinsic + self.config.intrinsic_buffer || call_price >= upper {
            return Err(EngineError::no_solution(format!(
                "price {call_price:.6} outside arbitrage bounds ({intrinsic:.6}, {upper:.6}) for K={K}, T={T}"
            )));
        }

        if let Some(sigma) = self.newton(call_price, S, K, T, r, q) {
            return Ok(sigma);
        }
        self.brent(call_price, S, K, T, r, q)
    }

    #[allow(non_snake_case)]
    fn newton(&self, target: f64, S: f64, K: f64, T: f64, r: f64, q: f64) -> Option<f64> {
        let cfg = &self.config;
        let (lo, hi) = cfg.vol_bounds;
        let mut sigma = cfg.initial_guess;

        for _ in 0..cfg.max_newton_iterations {
            let p = bs_call_price(S, K, r, q, T, sigma);
            let v = bs_vega(S, K, r, q, T, sigma);
            if v < cfg.min_vega {
                break;
            }
            let step = (p - target) / v;
            sigma = (sigma - step).clamp(cfg.newton_clamp.0, cfg.newton_clamp.1);
            if step.abs() < cfg.newton_tolerance && (lo..=hi).contains(&sigma) {
                return Some(sigma);
            }
        }
        None
    }

    #[allow(non_snake_case)]
    fn brent(&self, target: f64, S: f64, K: f64, T: f64, r: f64, q: f64) -> Result<f64> {
        let (lo, hi) = self.config.vol_bounds;
        let objective = |s: f64| bs_call_price(S, K, r, q, T, s) - target;

        // Keep the bracket as given: no sign change means no admissible root
        if objective(lo) * objective(hi) > 0.0 {
            return Err(EngineError::no_solution(format!(
                "no sign change on [{lo}, {hi}] for K={K}, T={T}"
            )));
        }

        let mut convergency = SimpleConvergency {
            eps: self.config.brent_tolerance,
            max_iter: self.config.brent_max_iterations,
        };
        match find_root_brent(lo, hi, &objective, &mut convergency) {
            Ok(sigma) if (lo..=hi).contains(&sigma) => Ok(sigma),
            Ok(sigma) => Err(EngineError::no_solution(format!(
                "root {sigma} outside [{lo}, {hi}]"
            ))),
            Err(e) => Err(EngineError::no_solution(format!(
                "root finding failed for K={K}, T={T}: {e:?}"
            ))),
        }
    }
}

/// Solve with the default solver configuration.
#[allow(non_snake_case)]
pub fn implied_volatility(
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
