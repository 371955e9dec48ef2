pub mod bs;
pub mod heston;

/// Common traits used by the pricing models
pub mod traits {
    use crate::error::Result;

    /// A model that can express its price for a strike/maturity as a Black-Scholes volatility.
    ///
    /// Implementations must be side-effect free; the surface generator calls
    /// them independently for every grid node.
    pub trait ImpliedVolModel {
        fn model_name(&self) -> &str;

        /// Black-Scholes implied volatility of the model price, or an explicit failure.
        fn implied_vol(&self, spot: f64, strike: f64, t: f64, r: f64, q: f64) -> Result<f64>;
    }
}

/// Utility functions shared by the Black-Scholes and Heston pricers
pub mod utils {
    /// Calculate log-moneyness: ln(K/S)
    pub fn log_moneyness(strike: f64, spot: f64) -> f64 {
        (strike / spot).ln()
    }

    /// Standard normal cumulative distribution function.
    ///
    /// Uses `erfc` so the lower tail keeps full relative precision.
    pub fn norm_cdf(x: f64) -> f64 {
        0.5 * libm::erfc(-x / std::f64::consts::SQRT_2)
    }

    /// Standard normal density.
    pub fn norm_pdf(x: f64) -> f64 {
        const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
        INV_SQRT_2PI * (-0.5 * x * x).exp()
    }

    /// Discounted spot and strike: `(S e^{-qT}, K e^{-rT})`.
    pub fn discounted_legs(spot: f64, strike: f64, r: f64, q: f64, t: f64) -> (f64, f64) {
        (spot * (-q * t).exp(), strike * (-r * t).exp())
    }

    /// Lower arbitrage bound of a European call, `max(S e^{-qT} - K e^{-rT}, 0)`.
    pub fn call_intrinsic(spot: f64, strike: f64, r: f64, q: f64, t: f64) -> f64 {
        let (fwd_spot, pv_strike) = discounted_legs(spot, strike, r, q, t);
        (fwd_spot - pv_strike).max(0.0)
    }

    /// Lower arbitrage bound of a European put, `max(K e^{-rT} - S e^{-qT}, 0)`.
    pub fn put_intrinsic(spot: f64, strike: f64, r: f64, q: f64, t: f64) -> f64 {
        let (fwd_spot, pv_strike) = discounted_legs(spot, strike, r, q, t);
        (pv_strike - fwd_spot).max(0.0)
    }

    /// Put price from a call price via parity: `P = C + K e^{-rT} - S e^{-qT}`.
    pub fn put_from_call(call: f64, spot: f64, strike: f64, r: f64, q: f64, t: f64) -> f64 {
        let (fwd_spot, pv_strike) = discounted_legs(spot, strike, r, q, t);
        call + pv_strike - fwd_spot
    }

    /// Call price from a put price via parity: `C = P + S e^{-qT} - K e^{-rT}`.
    pub fn call_from_put(put: f64, spot: f64, strike: f64, r: f64, q: f64, t: f64) -> f64 {
        let (fwd_spot, pv_strike) = discounted_legs(spot, strike, r, q, t);
        put + fwd_spot - pv_strike
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn norm_cdf_reference_values() {
            assert!((norm_cdf(0.0) - 0.5).abs() < 1e-15);
            assert!((norm_cdf(1.96) - 0.975_002_104_851_780).abs() < 1e-12);
            assert!((norm_cdf(-1.0) + norm_cdf(1.0) - 1.0).abs() < 1e-15);
            // deep lower tail keeps relative precision
            assert!(norm_cdf(-10.0) > 0.0);
        }

        #[test]
        fn parity_helpers_are_inverse() {
            let c = 10.45;
            let p = put_from_call(c, 100.0, 100.0, 0.05, 0.01, 1.0);
            let back = call_from_put(p, 100.0, 100.0, 0.05, 0.01, 1.0);
            assert!((back - c).abs() < 1e-12);
        }
    }
}
