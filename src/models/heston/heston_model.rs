// src/models/heston/heston_model.rs

//! Heston (1993) stochastic volatility model
//!
//! ```text
//! dS/S = (r - q) dt + sqrt(v) dW_S
//! dv   = κ(θ - v) dt + σ_v sqrt(v) dW_v,    corr(dW_S, dW_v) = ρ
//! ```
//!
//! The characteristic function is evaluated in the Albrecher et al. (2007)
//! "little trap" form: with the principal square root for `d`, the ratio
//! `g = (β - d)/(β + d)` stays inside the unit disc and `exp(-dT)` decays, so
//! the complex logarithm never crosses its branch cut as the integration
//! variable grows.

use num_complex::Complex64;

use crate::error::{EngineError, Result};

/// The five Heston parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HestonParameters {
    /// Initial variance
    pub v0: f64,
    /// Mean-reversion speed
    pub kappa: f64,
    /// Long-run variance
    pub theta: f64,
    /// Volatility of variance
    pub sigma_v: f64,
    /// Spot/variance correlation
    pub rho: f64,
}

impl HestonParameters {
    pub const NAMES: [&'static str; 5] = ["v0", "kappa", "theta", "sigma_v", "rho"];

    /// Creates parameters with validation of the model's mathematical domain.
    pub fn new(v0: f64, kappa: f64, theta: f64, sigma_v: f64, rho: f64) -> Result<Self> {
        let params = Self {
            v0,
            kappa,
            theta,
            sigma_v,
            rho,
        };
        params.validate()?;
        Ok(params)
    }

    /// Build from an optimizer vector ordered as [`Self::NAMES`].
    pub fn from_slice(x: &[f64]) -> Result<Self> {
        if x.len() != 5 {
            return Err(EngineError::invalid_input(format!(
                "Heston parameter vector must have 5 entries, got {}",
                x.len()
            )));
        }
        Self::new(x[0], x[1], x[2], x[3], x[4])
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.v0, self.kappa, self.theta, self.sigma_v, self.rho]
    }

    pub fn validate(&self) -> Result<()> {
        let all_finite = self.to_vec().iter().all(|v| v.is_finite());
        if !all_finite {
            return Err(EngineError::invalid_input(format!(
                "Heston parameters must be finite: {self:?}"
            )));
        }
        if self.v0 < 0.0 || self.theta < 0.0 {
            return Err(EngineError::invalid_input(format!(
                "Heston v0 and theta must be >= 0 (v0={}, theta={})",
                self.v0, self.theta
            )));
        }
        if self.kappa <= 0.0 || self.sigma_v <= 0.0 {
            return Err(EngineError::invalid_input(format!(
                "Heston kappa and sigma_v must be > 0 (kappa={}, sigma_v={})",
                self.kappa, self.sigma_v
            )));
        }
        if self.rho <= -1.0 || self.rho >= 1.0 {
            return Err(EngineError::invalid_input(format!(
                "Heston rho must be in (-1, 1), got {}",
                self.rho
            )));
        }
        Ok(())
    }

    /// Feller condition `2κθ >= σ_v²`: the variance process stays strictly positive.
    pub fn satisfies_feller(&self) -> bool {
        2.0 * self.kappa * self.theta >= self.sigma_v * self.sigma_v
    }

    pub fn initial_vol(&self) -> f64 {
        self.v0.sqrt()
    }

    pub fn long_run_vol(&self) -> f64 {
        self.theta.sqrt()
    }
}

/// Which of the two transform probabilities is being integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probability {
    /// Share-measure probability, `u = +1/2`, `b = κ - ρσ_v`
    P1,
    /// Risk-neutral exercise probability, `u = -1/2`, `b = κ`
    P2,
}

/// `Re[f_j(φ) / (iφ)]`, the integrand of `P_j = 1/2 + (1/π) ∫ Re[f_j/(iφ)] dφ`.
///
/// `ln_s_over_k` is `ln(S/K)`. Returns a non-finite value when an intermediate
/// overflows; callers decide the fallback.
pub fn transform_integrand(
    params: &HestonParameters,
    prob: Probability,
    phi: f64,
    ln_s_over_k: f64,
    t: f64,
    r: f64,
    q: f64,
) -> f64 {
    let HestonParameters {
        v0,
        kappa,
        theta,
        sigma_v,
        rho,
    } = *params;

    let (u, b) = match prob {
        Probability::P1 => (0.5, kappa - rho * sigma_v),
        Probability::P2 => (-0.5, kappa),
    };
    let a = kappa * theta;
    let sigma2 = sigma_v * sigma_v;

    let one = Complex64::new(1.0, 0.0);
    let i_phi = Complex64::new(0.0, phi);

    // β = b - ρσ_v iφ
    let beta = Complex64::new(b, 0.0) - i_phi * (rho * sigma_v);
    // d = sqrt(β² - σ_v²(2u iφ - φ²)), principal branch
    let d = (beta * beta - (i_phi * (2.0 * u) - phi * phi) * sigma2).sqrt();

    let beta_minus_d = beta - d;
    let g = beta_minus_d / (beta + d);
    let exp_neg_dt = (-d * t).exp();
    let denom = one - g * exp_neg_dt;

    let d_coef = beta_minus_d / sigma2 * ((one - exp_neg_dt) / denom);
    let c_coef = i_phi * ((r - q) * t)
        + (beta_minus_d * t - (denom / (one - g)).ln() * 2.0) * (a / sigma2);

    let f = (c_coef + d_coef * v0 + i_phi * ln_s_over_k).exp();
    (f / i_phi).re
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typical() -> HestonParameters {
        HestonParameters::new(0.04, 2.0, 0.04, 0.3, -0.7).unwrap()
    }

    #[test]
    fn validation_rejects_out_of_domain_values() {
        assert!(HestonParameters::new(-0.01, 2.0, 0.04, 0.3, -0.7).is_err());
        assert!(HestonParameters::new(0.04, 0.0, 0.04, 0.3, -0.7).is_err());
        assert!(HestonParameters::new(0.04, 2.0, 0.04, 0.0, -0.7).is_err());
        assert!(HestonParameters::new(0.04, 2.0, 0.04, 0.3, 1.0).is_err());
        assert!(HestonParameters::new(0.04, 2.0, f64::NAN, 0.3, 0.0).is_err());
    }

    #[test]
    fn slice_round_trip_preserves_order() {
        let p = typical();
        let back = HestonParameters::from_slice(&p.to_vec()).unwrap();
        assert_eq!(p, back);
        assert!(HestonParameters::from_slice(&[0.04, 2.0]).is_err());
    }

    #[test]
    fn feller_condition() {
        assert!(typical().satisfies_feller());
        let rough = HestonParameters::new(0.04, 0.5, 0.02, 1.0, -0.5).unwrap();
        assert!(!rough.satisfies_feller());
    }

    #[test]
    fn integrand_is_finite_and_decays() {
        let p = typical();
        for prob in [Probability::P1, Probability::P2] {
            let near = transform_integrand(&p, prob, 0.01, 0.0, 1.0, 0.03, 0.0);
            let far = transform_integrand(&p, prob, 80.0, 0.0, 1.0, 0.03, 0.0);
            assert!(near.is_finite());
            assert!(far.is_finite());
            assert!(far.abs() < 1e-6);
        }
    }

    #[test]
    fn integrand_stays_finite_for_long_dated_high_vol_of_vol() {
        let p = HestonParameters::new(0.09, 0.3, 0.09, 1.9, -0.9).unwrap();
        for k in 1..400 {
            let phi = k as f64 * 0.25;
            let v = transform_integrand(&p, Probability::P2, phi, -0.2, 10.0, 0.02, 0.01);
            assert!(v.is_finite(), "non-finite integrand at phi={phi}");
        }
    }
}
