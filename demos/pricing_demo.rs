// demos/pricing_demo.rs

//! Demonstration of Black-Scholes and Heston pricing
//!
//! This example shows how to:
//! 1. Price a small book of contracts and aggregate its Greeks
//! 2. Invert a market price to an implied volatility
//! 3. Compare Heston prices and implied vols with flat Black-Scholes

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use heston_surface::{
    greeks, price, solve_implied_vol, Greeks, HestonParameters, HestonPricer, MarketSnapshot,
    OptionContract, OptionType, QuadratureConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Black-Scholes and Heston Pricing Demo");
    println!("=====================================");

    let today = NaiveDate::from_ymd_opt(2025, 1, 2).context("bad date")?;
    let market = MarketSnapshot::new(100.0, 0.03, 0.01, 0.22, today)?;
    println!(
        "Spot ${:.2}, r = {:.2}%, q = {:.2}%, flat vol = {:.1}%",
        market.spot,
        market.rate * 100.0,
        market.dividend_yield * 100.0,
        market.volatility * 100.0
    );

    println!("\nStep 1: Pricing a small book...");
    let expiry = today
        .checked_add_days(Days::new(91))
        .context("date overflow")?;
    let book = [
        OptionContract::new(OptionType::Call, 100.0, expiry, 10.0)?,
        OptionContract::new(OptionType::Put, 95.0, expiry, 5.0)?,
        OptionContract::new(OptionType::Call, 110.0, expiry, -15.0)?,
        OptionContract::new(OptionType::Put, 100.0, today, 2.0)?,
    ];

    println!(
        "{:<6} {:>8} {:>8} {:>10} {:>9} {:>9} {:>9} {:>9}",
        "Type", "Strike", "Qty", "Value", "Delta", "Gamma", "Vega", "Theta"
    );
    println!("{}", "-".repeat(76));
    let mut total = Greeks::zero();
    for contract in &book {
        let value = price(contract, &market)?;
        let g = greeks(contract, &market)?;
        println!(
            "{:<6} {:>8.1} {:>8.1} {:>10.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}{}",
            contract.option_type,
            contract.strike,
            contract.quantity,
            value,
            g.delta,
            g.gamma,
            g.vega,
            g.theta,
            if g.degenerate { "  (expiry)" } else { "" }
        );
        total += g;
    }
    println!(
        "Book: delta {:.4}, gamma {:.4}, vega {:.4}, theta {:.4}, rho {:.4}",
        total.delta, total.gamma, total.vega, total.theta, total.rho
    );

    println!("\nStep 2: Implied volatility from a market price...");
    let observed = 4.35;
    let iv = solve_implied_vol(observed, 100.0, 100.0, 0.25, 0.03, 0.01, OptionType::Call)?;
    println!("  ATM call quoted at {observed:.2} -> IV {:.2}%", iv * 100.0);

    println!("\nStep 3: Heston vs Black-Scholes...");
    let params = HestonParameters::new(0.04, 1.5, 0.05, 0.6, -0.7)?;
    let pricer = HestonPricer::new(&QuadratureConfig::default())?;
    println!(
        "  v0 = {:.3}, kappa = {:.2}, theta = {:.3}, sigma_v = {:.2}, rho = {:.2} (Feller: {})",
        params.v0,
        params.kappa,
        params.theta,
        params.sigma_v,
        params.rho,
        params.satisfies_feller()
    );
    println!("{:<8} {:>12} {:>10}", "Strike", "Heston Call", "Model IV");
    println!("{}", "-".repeat(32));
    for k in (80..=120).step_by(10) {
        let k = k as f64;
        let call = pricer.call_price(&params, 100.0, k, 0.5, 0.03, 0.01)?;
        let iv = pricer
            .implied_vol_from_model(&params, 100.0, k, 0.5, 0.03, 0.01)
            .map(|v| format!("{:.2}%", v * 100.0))
            .unwrap_or_else(|e| format!("n/a ({e})"));
        println!("{:<8.1} {:>12.4} {:>10}", k, call.value(), iv);
    }

    Ok(())
}
