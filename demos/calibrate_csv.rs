// demos/calibrate_csv.rs

//! Calibrate the Heston model to quotes stored in a CSV file
//!
//! Usage: `cargo run --example calibrate_csv -- [quotes.csv] [config.toml]`
//!
//! The CSV needs the columns `option_type,strike,years_to_exp,bid,ask,volume`.
//! Without arguments the bundled sample in `tests/data` is used with the fast
//! preset.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use heston_surface::{
    calibrate_with_config, default_configs, EngineConfig, MarketSnapshot, OptionQuote,
    QuoteProcessor,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct CsvRow {
    option_type: String,
    strike: f64,
    years_to_exp: f64,
    bid: f64,
    ask: f64,
    #[serde(default)]
    volume: f64,
}

fn load_quotes(path: &str) -> Result<Vec<OptionQuote>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {path}"))?;
    let mut quotes = Vec::new();
    for (line, result) in reader.deserialize().enumerate() {
        let row: CsvRow = result.with_context(|| format!("parsing row {}", line + 1))?;
        quotes.push(OptionQuote {
            option_type: row.option_type.parse()?,
            strike: row.strike,
            maturity: row.years_to_exp,
            bid: row.bid,
            ask: row.ask,
            volume: row.volume,
        });
    }
    Ok(quotes)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let csv_path = args
        .next()
        .unwrap_or_else(|| "tests/data/quotes_sample.csv".to_string());
    let config = match args.next() {
        Some(path) => {
            EngineConfig::from_toml_file(&path).with_context(|| format!("loading config {path}"))?
        }
        None => default_configs::fast(),
    };

    let quotes = load_quotes(&csv_path)?;
    println!("Loaded {} quotes from {}", quotes.len(), csv_path);

    let market = MarketSnapshot::new(
        100.0,
        0.03,
        0.01,
        0.2,
        NaiveDate::from_ymd_opt(2025, 1, 2).context("bad date")?,
    )?;

    let processor = QuoteProcessor::new(config.quotes.clone(), config.solver.clone());
    let batch = processor.process(&quotes, &market)?;
    println!(
        "{} quotes accepted, {} rejected",
        batch.points.len(),
        batch.rejected.len()
    );
    for rejected in batch.rejected.iter().take(5) {
        let q = &quotes[rejected.index];
        println!(
            "  dropped {} K={} T={}: {}",
            q.option_type, q.strike, q.maturity, rejected.reason
        );
    }

    let result = calibrate_with_config(
        &batch.points,
        market.spot,
        market.rate,
        market.dividend_yield,
        &config,
    )?;

    println!("\nCalibration completed!");
    println!("  RMSE:        {:.4} vol points", result.rmse * 100.0);
    println!("  Converged:   {}", result.converged);
    println!("  Evaluations: {}", result.evaluations);
    println!("  Heston parameters:");
    println!("    v0      (initial variance): {:.6}", result.params.v0);
    println!("    kappa   (mean reversion):   {:.6}", result.params.kappa);
    println!("    theta   (long-run var):     {:.6}", result.params.theta);
    println!("    sigma_v (vol of variance):  {:.6}", result.params.sigma_v);
    println!("    rho     (correlation):      {:.6}", result.params.rho);
    if !result.feller_satisfied {
        println!("  Warning: Feller condition 2κθ >= σ_v² is violated");
    }

    Ok(())
}
