// Closed-form Black-Scholes pricing and Greeks for European vanillas, plus the
// implied-volatility solver that inverts them.

pub mod implied_vol;

use crate::error::{ensure_finite, ensure_positive, Result};
use crate::market::{Greeks, MarketSnapshot, OptionContract, OptionType, MIN_TIME_TO_MATURITY};
use crate::models::utils::{call_intrinsic, norm_cdf, norm_pdf, put_intrinsic};

#[allow(non_snake_case)]
fn d1_d2(S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> (f64, f64) {
    let sig_sqrt_t = sigma * T.sqrt();
    let d1 = ((S / K).ln() + (r - q + 0.5 * sigma * sigma) * T) / sig_sqrt_t;
    (d1, d1 - sig_sqrt_t)
}

/// Price of a European call option under Black-Scholes assumptions.
#[allow(non_snake_case)]
pub fn bs_call_price(S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return call_intrinsic(S, K, r, q, T.max(0.0));
    }
    let (d1, d2) = d1_d2(S, K, r, q, T, sigma);
    S * (-q * T).exp() * norm_cdf(d1) - K * (-r * T).exp() * norm_cdf(d2)
}

/// Price of a European put option under Black-Scholes assumptions.
#[allow(non_snake_case)]
pub fn bs_put_price(S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return put_intrinsic(S, K, r, q, T.max(0.0));
    }
    let (d1, d2) = d1_d2(S, K, r, q, T, sigma);
    K * (-r * T).exp() * norm_cdf(-d2) - S * (-q * T).exp() * norm_cdf(-d1)
}

/// Price for either option type.
#[allow(non_snake_case)]
pub fn bs_price(option_type: OptionType, S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    match option_type {
        OptionType::Call => bs_call_price(S, K, r, q, T, sigma),
        OptionType::Put => bs_put_price(S, K, r, q, T, sigma),
    }
}

/// Raw vega `dPrice/dSigma` (per unit of volatility, not per point).
#[allow(non_snake_case)]
pub fn bs_vega(S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return 0.0;
    }
    let (d1, _) = d1_d2(S, K, r, q, T, sigma);
    S * (-q * T).exp() * norm_pdf(d1) * T.sqrt()
}

/// Greeks of one long unit, in reporting units (vega per vol point, rho per 1%,
/// theta per calendar day). Requires `T > 0` and `sigma > 0`.
#[allow(non_snake_case)]
pub fn bs_greeks(option_type: OptionType, S: f64, K: f64, r: f64, q: f64, T: f64, sigma: f64) -> Greeks {
    let (d1, d2) = d1_d2(S, K, r, q, T, sigma);
    let df_q = (-q * T).exp();
    let df_r = (-r * T).exp();
    let pdf_d1 = norm_pdf(d1);
    let sqrt_t = T.sqrt();

    let gamma = df_q * pdf_d1 / (S * sigma * sqrt_t);
    let vega = S * df_q * pdf_d1 * sqrt_t / 100.0;
    let decay = -(S * df_q * pdf_d1 * sigma) / (2.0 * sqrt_t);

    let (delta, theta, rho) = match option_type {
        OptionType::Call => (
            df_q * norm_cdf(d1),
            (decay - r * K * df_r * norm_cdf(d2) + q * S * df_q * norm_cdf(d1)) / 365.0,
            K * T * df_r * norm_cdf(d2) / 100.0,
        ),
        OptionType::Put => (
            -df_q * norm_cdf(-d1),
            (decay + r * K * df_r * norm_cdf(-d2) - q * S * df_q * norm_cdf(-d1)) / 365.0,
            -K * T * df_r * norm_cdf(-d2) / 100.0,
        ),
    };

    Greeks {
        delta,
        gamma,
        vega,
        theta,
        rho,
        degenerate: false,
    }
}

/// Greeks at expiry: the delta step of the intrinsic payoff, every other sensitivity zero.
#[allow(non_snake_case)]
fn expiry_greeks(option_type: OptionType, S: f64, K: f64, q: f64, T: f64) -> Greeks {
    let df_q = (-q * T).exp();
    let step = if S > K {
        1.0
    } else if S < K {
        0.0
    } else {
        0.5
    };
    let delta = match option_type {
        OptionType::Call => df_q * step,
        OptionType::Put => -df_q * (1.0 - step),
    };
    Greeks {
        delta,
        degenerate: true,
        ..Greeks::zero()
    }
}

/// Closed-form European pricer for contracts valued against a [`MarketSnapshot`].
///
/// Stateless; one instance can be shared freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackScholesPricer;

impl BlackScholesPricer {
    pub fn new() -> Self {
        Self
    }

    /// Validated inputs: `(T, at_expiry)`.
    fn prepare(&self, contract: &OptionContract, market: &MarketSnapshot) -> Result<(f64, bool)> {
        market.validate()?;
        contract.validate()?;
        let t = contract.time_to_maturity(market.valuation_date)?;
        Ok((t, t <= MIN_TIME_TO_MATURITY))
    }

    /// Position value: unit price scaled by `|quantity|`.
    ///
    /// On the expiry day the discounted intrinsic value is returned instead of
    /// evaluating `d1`/`d2` at the time floor.
    pub fn price(&self, contract: &OptionContract, market: &MarketSnapshot) -> Result<f64> {
        let (t, at_expiry) = self.prepare(contract, market)?;
        let (s, k, r, q) = (
            market.spot,
            contract.strike,
            market.rate,
            market.dividend_yield,
        );

        let unit = if at_expiry {
            match contract.option_type {
                OptionType::Call => call_intrinsic(s, k, r, q, t),
                OptionType::Put => put_intrinsic(s, k, r, q, t),
            }
        } else {
            bs_price(contract.option_type, s, k, r, q, t, market.volatility)
        };

        Ok(unit * contract.quantity.abs())
    }

    /// Position Greeks.
    ///
    /// Delta and rho follow the signed quantity; gamma, vega and theta are scaled
    /// by the absolute quantity. On the expiry day the result carries
    /// `degenerate = true`.
    pub fn greeks(&self, contract: &OptionContract, market: &MarketSnapshot) -> Result<Greeks> {
        let (t, at_expiry) = self.prepare(contract, market)?;
        let (s, k, r, q) = (
            market.spot,
            contract.strike,
            market.rate,
            market.dividend_yield,
        );

        let unit = if at_expiry {
            expiry_greeks(contract.option_type, s, k, q, t)
        } else {
            bs_greeks(contract.option_type, s, k, r, q, t, market.volatility)
        };

        let qty = contract.quantity;
        let abs_qty = qty.abs();
        Ok(Greeks {
            delta: unit.delta * qty,
            gamma: unit.gamma * abs_qty,
            vega: unit.vega * abs_qty,
            theta: unit.theta * abs_qty,
            rho: unit.rho * qty,
            degenerate: unit.degenerate,
        })
    }
}

/// Validate raw pricing inputs shared by the solver and the Heston pricer.
#[allow(non_snake_case)]
pub(crate) fn validate_raw_inputs(S: f64, K: f64, T: f64, r: f64, q: f64) -> Result<()> {
    ensure_positive("spot", S)?;
    ensure_positive("strike", K)?;
    ensure_positive("time to maturity", T)?;
    ensure_finite("rate", r)?;
    ensure_finite("dividend yield", q)
}
