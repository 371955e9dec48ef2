// src/models/heston/heston_pricer.rs

//! Semi-analytical Heston pricer.
//!
//! The two transform probabilities are integrated with one fixed Gauss-Legendre
//! rule built at construction and shared by every call, which keeps repeated
//! evaluation cheap during calibration. The pricer holds no mutable state and can
//! be shared across threads without locking.

use std::f64::consts::PI;

use tracing::debug;

use super::heston_model::{transform_integrand, HestonParameters, Probability};
use super::quadrature::GaussLegendre;
use crate::error::{EngineError, Result};
use crate::market::{forward_price, OptionType};
use crate::models::bs::implied_vol::{ImpliedVolSolver, IvSolverConfig};
use crate::models::bs::validate_raw_inputs;
use crate::models::traits::ImpliedVolModel;
use crate::models::utils::{call_intrinsic, discounted_legs, log_moneyness, put_from_call};

/// Quadrature settings for the characteristic-function integrals.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct QuadratureConfig {
    /// Number of Gauss-Legendre nodes
    pub order: usize,
    /// Lower integration limit in φ
    pub phi_lo: f64,
    /// Upper integration limit in φ (truncation of the infinite integral)
    pub phi_hi: f64,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            order: 128,
            phi_lo: 1e-8,
            phi_hi: 100.0,
        }
    }
}

/// A Heston price together with how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelPrice {
    /// Quadrature succeeded; the value is already floored at intrinsic.
    Priced(f64),
    /// A non-finite intermediate appeared; the value is the intrinsic floor.
    IntrinsicFloor(f64),
}

impl ModelPrice {
    pub fn value(&self) -> f64 {
        match *self {
            ModelPrice::Priced(v) | ModelPrice::IntrinsicFloor(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ModelPrice::IntrinsicFloor(_))
    }
}

/// Heston call/put pricer over a precomputed quadrature rule.
#[derive(Debug, Clone)]
pub struct HestonPricer {
    quadrature: GaussLegendre,
    solver: ImpliedVolSolver,
}

impl HestonPricer {
    pub fn new(config: &QuadratureConfig) -> Result<Self> {
        Self::with_solver(config, IvSolverConfig::default())
    }

    pub fn with_solver(config: &QuadratureConfig, solver: IvSolverConfig) -> Result<Self> {
        let quadrature = GaussLegendre::new(config.order, config.phi_lo, config.phi_hi)?;
        Ok(Self {
            quadrature,
            solver: ImpliedVolSolver::new(solver),
        })
    }

    pub fn quadrature(&self) -> &GaussLegendre {
        &self.quadrature
    }

    fn probability(
        &self,
        params: &HestonParameters,
        prob: Probability,
        ln_s_over_k: f64,
        t: f64,
        r: f64,
        q: f64,
    ) -> f64 {
        let integral = self
            .quadrature
            .integrate(|phi| transform_integrand(params, prob, phi, ln_s_over_k, t, r, q));
        0.5 + integral / PI
    }

    /// Raw quadrature call price `S e^{-qT} P1 - K e^{-rT} P2`, floored at intrinsic.
    ///
    /// Returns [`EngineError::NumericalInstability`] when the quadrature produces a
    /// non-finite value; [`Self::call_price`] turns that into the intrinsic floor.
    #[allow(non_snake_case)]
    pub fn try_call_price(
        &self,
        params: &HestonParameters,
        S: f64,
        K: f64,
        T: f64,
        r: f64,
        q: f64,
    ) -> Result<f64> {
        validate_raw_inputs(S, K, T, r, q)?;
        params.validate()?;

        let x = -log_moneyness(K, S);
        let p1 = self.probability(params, Probability::P1, x, T, r, q);
        let p2 = self.probability(params, Probability::P2, x, T, r, q);
        let (fwd_spot, pv_strike) = discounted_legs(S, K, r, q, T);
        let raw = fwd_spot * p1 - pv_strike * p2;

        if !raw.is_finite() {
            return Err(EngineError::numerical(format!(
                "non-finite Heston call (P1={p1}, P2={p2}) for K={K}, T={T}"
            )));
        }
        Ok(raw.max(call_intrinsic(S, K, r, q, T)))
    }

    /// Call price with the intrinsic-floor fallback made explicit.
    #[allow(non_snake_case)]
    pub fn call_price(
        &self,
        params: &HestonParameters,
        S: f64,
        K: f64,
        T: f64,
        r: f64,
        q: f64,
    ) -> Result<ModelPrice> {
        match self.try_call_price(params, S, K, T, r, q) {
            Ok(v) => Ok(ModelPrice::Priced(v)),
            Err(EngineError::NumericalInstability(msg)) => {
                debug!(strike = K, maturity = T, "Heston quadrature fell back to intrinsic: {msg}");
                Ok(ModelPrice::IntrinsicFloor(call_intrinsic(S, K, r, q, T)))
            }
            Err(e) => Err(e),
        }
    }

    /// Put price via put-call parity on the computed call.
    #[allow(non_snake_case)]
    pub fn put_price(
        &self,
        params: &HestonParameters,
        S: f64,
        K: f64,
        T: f64,
        r: f64,
        q: f64,
    ) -> Result<ModelPrice> {
        let call = self.call_price(params, S, K, T, r, q)?;
        let put = put_from_call(call.value(), S, K, r, q, T);
        Ok(match call {
            ModelPrice::Priced(_) => ModelPrice::Priced(put),
            ModelPrice::IntrinsicFloor(_) => ModelPrice::IntrinsicFloor(put),
        })
    }

    #[allow(non_snake_case, clippy::too_many_arguments)]
    pub fn price(
        &self,
        option_type: OptionType,
        params: &HestonParameters,
        S: f64,
        K: f64,
        T: f64,
        r: f64,
        q: f64,
    ) -> Result<ModelPrice> {
        match option_type {
            OptionType::Call => self.call_price(params, S, K, T, r, q),
            OptionType::Put => self.put_price(params, S, K, T, r, q),
        }
    }

    /// Black-Scholes volatility equivalent to the Heston price.
    ///
    /// Strikes at or above the forward are priced as calls, strikes below as
    /// puts, so the inversion always works on the out-of-the-money side.
    #[allow(non_snake_case)]
    pub fn implied_vol_from_model(
        &self,
        params: &HestonParameters,
        S: f64,
        K: f64,
        T: f64,
        r: f64,
        q: f64,
    ) -> Result<f64> {
        let forward = forward_price(S, r, q, T);
        let option_type = if K >= forward {
            OptionType::Call
        } else {
            OptionType::Put
        };

        match self.price(option_type, params, S, K, T, r, q)? {
            ModelPrice::Priced(price) => self.solver.solve(price, S, K, T, r, q, option_type),
            ModelPrice::IntrinsicFloor(_) => Err(EngineError::numerical(format!(
                "Heston price fell back to intrinsic for K={K}, T={T}"
            ))),
        }
    }
}

/// A calibrated parameter set bound to a pricer.
#[derive(Debug, Clone, Copy)]
pub struct HestonModel<'a> {
    pub pricer: &'a HestonPricer,
    pub params: HestonParameters,
}

impl<'a> HestonModel<'a> {
    pub fn new(pricer: &'a HestonPricer, params: HestonParameters) -> Self {
        Self { pricer, params }
    }
}

impl ImpliedVolModel for HestonModel<'_> {
    fn model_name(&self) -> &str {
        "heston"
    }

    fn implied_vol(&self, spot: f64, strike: f64, t: f64, r: f64, q: f64) -> Result<f64> {
        self.pricer
            .implied_vol_from_model(&self.params, spot, strike, t, r, q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bs::{bs_call_price, bs_put_price};
    use approx::assert_abs_diff_eq;

    fn pricer() -> HestonPricer {
        HestonPricer::new(&QuadratureConfig::default()).unwrap()
    }

    fn skewed() -> HestonParameters {
        HestonParameters::new(0.04, 1.5, 0.05, 0.6, -0.7).unwrap()
    }

    #[test]
    fn degenerate_vol_of_vol_matches_black_scholes() {
        let params = HestonParameters::new(0.04, 1.0, 0.04, 1e-4, 0.0).unwrap();
        let heston = pricer()
            .call_price(&params, 100.0, 100.0, 1.0, 0.03, 0.0)
            .unwrap();
        assert!(!heston.is_fallback());
        let bs = bs_call_price(100.0, 100.0, 0.03, 0.0, 1.0, 0.2);
        assert_abs_diff_eq!(heston.value(), bs, epsilon = 1e-3);
    }

    #[test]
    fn degenerate_case_holds_away_from_the_money_and_with_dividends() {
        let params = HestonParameters::new(0.09, 2.0, 0.09, 1e-4, 0.0).unwrap();
        let p = pricer();
        for &k in &[80.0, 95.0, 110.0, 125.0] {
            let heston = p.put_price(&params, 100.0, k, 0.5, 0.02, 0.015).unwrap();
            let bs = bs_put_price(100.0, k, 0.02, 0.015, 0.5, 0.3);
            assert_abs_diff_eq!(heston.value(), bs, epsilon = 1e-3);
        }
    }

    #[test]
    fn put_call_parity_holds_for_model_prices() {
        let p = pricer();
        let params = skewed();
        let (s, k, t, r, q) = (100.0, 90.0, 0.75, 0.03, 0.01);
        let c = p.call_price(&params, s, k, t, r, q).unwrap().value();
        let put = p.put_price(&params, s, k, t, r, q).unwrap().value();
        let rhs = s * (-q * t).exp() - k * (-r * t).exp();
        assert_abs_diff_eq!(c - put, rhs, epsilon = 1e-10);
    }

    #[test]
    fn negative_correlation_produces_downside_skew() {
        let p = pricer();
        let params = skewed();
        let low = p.implied_vol_from_model(&params, 100.0, 85.0, 0.5, 0.02, 0.0).unwrap();
        let atm = p.implied_vol_from_model(&params, 100.0, 100.0, 0.5, 0.02, 0.0).unwrap();
        let high = p.implied_vol_from_model(&params, 100.0, 115.0, 0.5, 0.02, 0.0).unwrap();
        assert!(low > atm, "expected skew: {low} <= {atm}");
        assert!(atm > high, "expected skew: {atm} <= {high}");
    }

    #[test]
    fn call_price_never_below_intrinsic() {
        let p = pricer();
        let params = skewed();
        let c = p.call_price(&params, 100.0, 40.0, 0.1, 0.05, 0.0).unwrap().value();
        assert!(c >= call_intrinsic(100.0, 40.0, 0.05, 0.0, 0.1));
    }

    #[test]
    fn invalid_inputs_are_not_masked_by_the_fallback() {
        let p = pricer();
        let params = skewed();
        assert!(matches!(
            p.call_price(&params, -1.0, 100.0, 1.0, 0.0, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            p.call_price(&params, 100.0, 100.0, 0.0, 0.0, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn model_trait_delegates_to_pricer() {
        let p = pricer();
        let model = HestonModel::new(&p, skewed());
        assert_eq!(model.model_name(), "heston");
        let direct = p.implied_vol_from_model(&skewed(), 100.0, 100.0, 1.0, 0.01, 0.0).unwrap();
        let via_trait = model.implied_vol(100.0, 100.0, 1.0, 0.01, 0.0).unwrap();
        assert_eq!(direct, via_trait);
    }
}
