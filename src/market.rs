//! Market and instrument value types shared by every pricer.
//!
//! These are plain immutable values built by the market-data collaborator. The
//! engine reads them and validates them at each operation boundary.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::{ensure_finite, ensure_positive, EngineError, Result};

/// Floor applied to time-to-maturity (years) so that `sqrt(T)` never divides by zero.
pub const MIN_TIME_TO_MATURITY: f64 = 1e-6;

/// Calendar-day year fraction convention.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn is_call(self) -> bool {
        matches!(self, OptionType::Call)
    }

    /// +1 for calls, -1 for puts.
    pub fn sign(self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

impl FromStr for OptionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            other => Err(EngineError::invalid_input(format!(
                "invalid option type: {other}"
            ))),
        }
    }
}

/// Spot, rates and the flat volatility used for Black-Scholes pricing, as of a valuation date.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarketSnapshot {
    /// Spot price of the underlying
    pub spot: f64,
    /// Continuously compounded risk-free rate
    pub rate: f64,
    /// Continuously compounded dividend yield
    pub dividend_yield: f64,
    /// Flat Black-Scholes volatility (decimal)
    pub volatility: f64,
    /// Date from which time-to-maturity is measured
    pub valuation_date: NaiveDate,
}

impl MarketSnapshot {
    pub fn new(
        spot: f64,
        rate: f64,
        dividend_yield: f64,
        volatility: f64,
        valuation_date: NaiveDate,
    ) -> Result<Self> {
        let snapshot = Self {
            spot,
            rate,
            dividend_yield,
            volatility,
            valuation_date,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("spot", self.spot)?;
        ensure_finite("rate", self.rate)?;
        ensure_finite("dividend_yield", self.dividend_yield)?;
        if self.dividend_yield < 0.0 {
            return Err(EngineError::invalid_input(format!(
                "dividend_yield must be >= 0, got {}",
                self.dividend_yield
            )));
        }
        ensure_positive("volatility", self.volatility)
    }

    /// Forward price `S * exp((r - q) * T)`.
    pub fn forward(&self, t: f64) -> f64 {
        forward_price(self.spot, self.rate, self.dividend_yield, t)
    }
}

/// Forward price `S * exp((r - q) * T)`.
pub fn forward_price(spot: f64, r: f64, q: f64, t: f64) -> f64 {
    spot * ((r - q) * t).exp()
}

/// A European vanilla position: contract terms plus signed quantity (positive = long).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptionContract {
    pub option_type: OptionType,
    pub strike: f64,
    pub maturity: NaiveDate,
    pub quantity: f64,
}

impl OptionContract {
    pub fn new(
        option_type: OptionType,
        strike: f64,
        maturity: NaiveDate,
        quantity: f64,
    ) -> Result<Self> {
        let contract = Self {
            option_type,
            strike,
            maturity,
            quantity,
        };
        contract.validate()?;
        Ok(contract)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("strike", self.strike)?;
        ensure_finite("quantity", self.quantity)?;
        if self.quantity == 0.0 {
            return Err(EngineError::invalid_input("quantity must be non-zero"));
        }
        Ok(())
    }

    pub fn is_call(&self) -> bool {
        self.option_type.is_call()
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    /// Year fraction from `valuation_date` to maturity, floored at [`MIN_TIME_TO_MATURITY`].
    ///
    /// A maturity before the valuation date is rejected; a maturity on the
    /// valuation date yields the floor.
    pub fn time_to_maturity(&self, valuation_date: NaiveDate) -> Result<f64> {
        let days = (self.maturity - valuation_date).num_days();
        if days < 0 {
            return Err(EngineError::invalid_input(format!(
                "maturity {} is before valuation date {}",
                self.maturity, valuation_date
            )));
        }
        Ok((days as f64 / DAYS_PER_YEAR).max(MIN_TIME_TO_MATURITY))
    }
}

/// First and second order price sensitivities.
///
/// Vega is per volatility point, rho per 1% rate move and theta per calendar day.
/// `degenerate` marks Greeks produced by the expiry branch, where the
/// closed-form derivatives are not meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub degenerate: bool,
}

impl Greeks {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Scale every sensitivity by a position quantity.
    pub fn scale(&self, quantity: f64) -> Self {
        Self {
            delta: self.delta * quantity,
            gamma: self.gamma * quantity,
            vega: self.vega * quantity,
            theta: self.theta * quantity,
            rho: self.rho * quantity,
            degenerate: self.degenerate,
        }
    }
}

impl Add for Greeks {
    type Output = Greeks;

    fn add(self, other: Greeks) -> Greeks {
        Greeks {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            vega: self.vega + other.vega,
            theta: self.theta + other.theta,
            rho: self.rho + other.rho,
            degenerate: self.degenerate || other.degenerate,
        }
    }
}

impl AddAssign for Greeks {
    fn add_assign(&mut self, other: Greeks) {
        *self = *self + other;
    }
}

impl Neg for Greeks {
    type Output = Greeks;

    fn neg(self) -> Greeks {
        self.scale(-1.0)
    }
}

impl Sub for Greeks {
    type Output = Greeks;

    fn sub(self, other: Greeks) -> Greeks {
        self + (-other)
    }
}

impl Sum for Greeks {
    fn sum<I: Iterator<Item = Greeks>>(iter: I) -> Greeks {
        iter.fold(Greeks::zero(), |acc, g| acc + g)
    }
}

/// A raw two-sided quote from the market-data collaborator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptionQuote {
    pub option_type: OptionType,
    pub strike: f64,
    /// Time to expiration in years
    pub maturity: f64,
    pub bid: f64,
    pub ask: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub volume: f64,
}

impl OptionQuote {
    pub fn mid(&self) -> f64 {
        0.5 * (self.bid + self.ask)
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(delta: f64) -> Greeks {
        Greeks {
            delta,
            gamma: 0.02,
            vega: 0.4,
            theta: -0.01,
            rho: 0.5,
            degenerate: false,
        }
    }

    #[test]
    fn time_to_maturity_uses_calendar_days() {
        let c = OptionContract::new(OptionType::Call, 100.0, date(2025, 12, 31), 1.0).unwrap();
        let t = c.time_to_maturity(date(2025, 1, 1)).unwrap();
        assert!((t - 364.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn time_to_maturity_floors_on_expiry_day() {
        let c = OptionContract::new(OptionType::Put, 100.0, date(2025, 6, 1), -2.0).unwrap();
        let t = c.time_to_maturity(date(2025, 6, 1)).unwrap();
        assert_eq!(t, MIN_TIME_TO_MATURITY);
    }

    #[test]
    fn past_maturity_is_rejected() {
        let c = OptionContract::new(OptionType::Put, 100.0, date(2025, 6, 1), 1.0).unwrap();
        assert!(matches!(
            c.time_to_maturity(date(2025, 6, 2)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(OptionContract::new(OptionType::Call, 100.0, date(2026, 1, 1), 0.0).is_err());
        assert!(OptionContract::new(OptionType::Call, -5.0, date(2026, 1, 1), 1.0).is_err());
    }

    #[test]
    fn snapshot_rejects_nonphysical_inputs() {
        let d = date(2025, 1, 1);
        assert!(MarketSnapshot::new(100.0, 0.05, 0.0, 0.2, d).is_ok());
        assert!(MarketSnapshot::new(-1.0, 0.05, 0.0, 0.2, d).is_err());
        assert!(MarketSnapshot::new(100.0, 0.05, -0.01, 0.2, d).is_err());
        assert!(MarketSnapshot::new(100.0, 0.05, 0.0, 0.0, d).is_err());
    }

    #[test]
    fn greeks_form_an_additive_group() {
        let a = sample(0.5);
        let b = sample(-0.3);
        let sum = a + b;
        assert!((sum.delta - 0.2).abs() < 1e-12);
        assert_eq!(a + Greeks::zero(), a);
        let back = sum - b;
        assert!((back.delta - a.delta).abs() < 1e-12);
        assert!((back.vega - a.vega).abs() < 1e-12);
        let total: Greeks = vec![a, b, a].into_iter().sum();
        assert!((total.gamma - 0.06).abs() < 1e-12);
    }

    #[test]
    fn scale_is_linear() {
        let g = sample(0.5);
        let lhs = g.scale(2.0 + 3.0);
        let rhs = g.scale(2.0) + g.scale(3.0);
        assert!((lhs.delta - rhs.delta).abs() < 1e-12);
        assert!((lhs.theta - rhs.theta).abs() < 1e-12);
    }

    #[test]
    fn degenerate_flag_propagates_through_addition() {
        let mut g = sample(0.1);
        g.degenerate = true;
        assert!((sample(0.2) + g).degenerate);
    }

    #[test]
    fn option_type_parses_case_insensitively() {
        assert_eq!("CALL".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!(" put ".parse::<OptionType>().unwrap(), OptionType::Put);
        assert!("straddle".parse::<OptionType>().is_err());
    }
}
