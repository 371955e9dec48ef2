//! Raw quotes to calibration points.
//!
//! Each quote passes a moneyness window, an optional out-of-the-money selection,
//! liquidity checks on the two-sided market, and an implied-vol plausibility
//! window before it becomes a weighted [`VolatilityPoint`].

use std::fmt;

use tracing::debug;

use crate::calibration::types::VolatilityPoint;
use crate::error::Result;
use crate::market::{forward_price, MarketSnapshot, OptionQuote, OptionType};
use crate::models::bs::implied_vol::{ImpliedVolSolver, IvSolverConfig};

/// Filtering rules applied to raw quotes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct QuoteFilter {
    /// Admissible K/S window (inclusive)
    pub moneyness_range: (f64, f64),
    /// Keep only out-of-the-money quotes relative to the forward
    pub otm_only: bool,
    /// Calls with K below this multiple of the forward are dropped when `otm_only`
    pub otm_call_floor: f64,
    /// Puts with K above this multiple of the forward are dropped when `otm_only`
    pub otm_put_cap: f64,
    /// Maximum (ask - bid) / mid
    pub max_relative_spread: f64,
    /// Admissible implied-vol window (inclusive)
    pub iv_range: (f64, f64),
    /// Floor applied to volume when used as a weight
    pub min_weight: f64,
}

impl Default for QuoteFilter {
    fn default() -> Self {
        Self {
            moneyness_range: (0.70, 1.30),
            otm_only: true,
            otm_call_floor: 0.99,
            otm_put_cap: 1.01,
            max_relative_spread: 1.0,
            iv_range: (0.02, 3.0),
            min_weight: 1.0,
        }
    }
}

/// Why a quote did not make it into the calibration set.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    InvalidTerms,
    OutsideMoneyness,
    InTheMoney,
    NoBid,
    CrossedMarket,
    WideSpread,
    NoImpliedVol(String),
    ImpliedVolOutOfRange(f64),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidTerms => write!(f, "non-positive strike or maturity"),
            RejectReason::OutsideMoneyness => write!(f, "outside moneyness window"),
            RejectReason::InTheMoney => write!(f, "in the money"),
            RejectReason::NoBid => write!(f, "no bid"),
            RejectReason::CrossedMarket => write!(f, "ask <= bid"),
            RejectReason::WideSpread => write!(f, "spread too wide"),
            RejectReason::NoImpliedVol(e) => write!(f, "no implied vol: {e}"),
            RejectReason::ImpliedVolOutOfRange(iv) => write!(f, "implied vol {iv:.4} out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedQuote {
    /// Position of the quote in the input slice
    pub index: usize,
    pub reason: RejectReason,
}

/// Accepted points plus the quotes that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBatch {
    pub points: Vec<VolatilityPoint>,
    pub rejected: Vec<RejectedQuote>,
}

#[derive(Debug, Clone, Default)]
pub struct QuoteProcessor {
    filter: QuoteFilter,
    solver: ImpliedVolSolver,
}

impl QuoteProcessor {
    pub fn new(filter: QuoteFilter, solver: IvSolverConfig) -> Self {
        Self {
            filter,
            solver: ImpliedVolSolver::new(solver),
        }
    }

    pub fn filter(&self) -> &QuoteFilter {
        &self.filter
    }

    /// Resolve quotes against a market snapshot. Input order is preserved.
    pub fn process(&self, quotes: &[OptionQuote], market: &MarketSnapshot) -> Result<QuoteBatch> {
        market.validate()?;
        let mut batch = QuoteBatch::default();

        for (index, quote) in quotes.iter().enumerate() {
            match self.resolve(quote, market) {
                Ok(point) => batch.points.push(point),
                Err(reason) => {
                    debug!(
                        index,
                        strike = quote.strike,
                        maturity = quote.maturity,
                        "dropping quote: {reason}"
                    );
                    batch.rejected.push(RejectedQuote { index, reason });
                }
            }
        }

        debug!(
            accepted = batch.points.len(),
            rejected = batch.rejected.len(),
            "processed option quotes"
        );
        Ok(batch)
    }

    fn resolve(
        &self,
        quote: &OptionQuote,
        market: &MarketSnapshot,
    ) -> std::result::Result<VolatilityPoint, RejectReason> {
        let f = &self.filter;
        let spot = market.spot;
        let (r, q) = (market.rate, market.dividend_yield);

        if !(quote.strike.is_finite() && quote.strike > 0.0)
            || !(quote.maturity.is_finite() && quote.maturity > 0.0)
        {
            return Err(RejectReason::InvalidTerms);
        }

        let moneyness = quote.strike / spot;
        if moneyness < f.moneyness_range.0 || moneyness > f.moneyness_range.1 {
            return Err(RejectReason::OutsideMoneyness);
        }

        if f.otm_only {
            let forward = forward_price(spot, r, q, quote.maturity);
            let itm = match quote.option_type {
                OptionType::Call => quote.strike < f.otm_call_floor * forward,
                OptionType::Put => quote.strike > f.otm_put_cap * forward,
            };
            if itm {
                return Err(RejectReason::InTheMoney);
            }
        }

        if !(quote.bid > 0.0) {
            return Err(RejectReason::NoBid);
        }
        if !(quote.ask > quote.bid) {
            return Err(RejectReason::CrossedMarket);
        }
        let mid = quote.mid();
        if quote.spread() > f.max_relative_spread * mid {
            return Err(RejectReason::WideSpread);
        }

        let iv = self
            .solver
            .solve(mid, spot, quote.strike, quote.maturity, r, q, quote.option_type)
            .map_err(|e| RejectReason::NoImpliedVol(e.to_string()))?;
        if iv < f.iv_range.0 || iv > f.iv_range.1 {
            return Err(RejectReason::ImpliedVolOutOfRange(iv));
        }

        let weight = if quote.volume.is_finite() {
            quote.volume.max(f.min_weight)
        } else {
            f.min_weight
        };

        Ok(VolatilityPoint {
            strike: quote.strike,
            maturity: quote.maturity,
            market_iv: iv,
            weight,
        })
    }
}
