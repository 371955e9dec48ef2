//! Implied-volatility surface on a strike/maturity grid.
//!
//! Every node is evaluated independently through an [`ImpliedVolModel`]; a node
//! the model cannot resolve is stored as `None` and left for the caller to treat.

use tracing::debug;

use crate::error::{ensure_finite, ensure_positive, EngineError, Result};
use crate::models::traits::ImpliedVolModel;

/// Number of strike columns and maturity rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridShape {
    pub n_strikes: usize,
    pub n_maturities: usize,
}

impl GridShape {
    pub fn new(n_strikes: usize, n_maturities: usize) -> Self {
        Self {
            n_strikes,
            n_maturities,
        }
    }
}

impl Default for GridShape {
    fn default() -> Self {
        Self::new(20, 8)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct SurfaceConfig {
    pub n_strikes: usize,
    pub n_maturities: usize,
    /// K/S range covered by the strike axis
    pub moneyness_range: (f64, f64),
    /// Maturity axis in years
    pub maturity_range: (f64, f64),
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            n_strikes: 20,
            n_maturities: 8,
            moneyness_range: (0.70, 1.30),
            maturity_range: (1.0 / 12.0, 2.0),
        }
    }
}

impl SurfaceConfig {
    pub fn with_shape(mut self, n_strikes: usize, n_maturities: usize) -> Self {
        self.n_strikes = n_strikes;
        self.n_maturities = n_maturities;
        self
    }

    pub fn shape(&self) -> GridShape {
        GridShape::new(self.n_strikes, self.n_maturities)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_strikes == 0 || self.n_maturities == 0 {
            return Err(EngineError::invalid_input(format!(
                "grid shape must be non-empty, got {} strikes x {} maturities",
                self.n_strikes, self.n_maturities
            )));
        }
        let (m_lo, m_hi) = self.moneyness_range;
        ensure_positive("moneyness lower bound", m_lo)?;
        ensure_finite("moneyness upper bound", m_hi)?;
        let (t_lo, t_hi) = self.maturity_range;
        ensure_positive("maturity lower bound", t_lo)?;
        ensure_finite("maturity upper bound", t_hi)?;
        if m_hi < m_lo || t_hi < t_lo {
            return Err(EngineError::invalid_input(format!(
                "grid ranges must be ordered, got moneyness {:?} and maturity {:?}",
                self.moneyness_range, self.maturity_range
            )));
        }
        Ok(())
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| lo + step * i as f64).collect()
}

/// Rectangular IV grid, rows indexed by maturity and columns by strike.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceGrid {
    pub strikes: Vec<f64>,
    pub moneyness: Vec<f64>,
    pub maturities: Vec<f64>,
    /// `implied_vols[maturity_idx][strike_idx]`, `None` where the model failed
    pub implied_vols: Vec<Vec<Option<f64>>>,
}

impl SurfaceGrid {
    pub fn shape(&self) -> GridShape {
        GridShape::new(self.strikes.len(), self.maturities.len())
    }

    pub fn get(&self, maturity_idx: usize, strike_idx: usize) -> Option<f64> {
        self.implied_vols
            .get(maturity_idx)
            .and_then(|row| row.get(strike_idx))
            .copied()
            .flatten()
    }

    pub fn missing_count(&self) -> usize {
        self.implied_vols
            .iter()
            .flatten()
            .filter(|v| v.is_none())
            .count()
    }

    /// Same grid in percentage points (0.2 -> 20.0).
    pub fn implied_vols_pct(&self) -> Vec<Vec<Option<f64>>> {
        self.implied_vols
            .iter()
            .map(|row| row.iter().map(|v| v.map(|iv| iv * 100.0)).collect())
            .collect()
    }
}

/// Evaluate `model` on the grid described by `config`.
pub fn generate_grid<M>(
    model: &M,
    spot: f64,
    r: f64,
    q: f64,
    config: &SurfaceConfig,
) -> Result<SurfaceGrid>
where
    M: ImpliedVolModel + ?Sized,
{
    ensure_positive("spot", spot)?;
    ensure_finite("rate", r)?;
    ensure_finite("dividend_yield", q)?;
    config.validate()?;

    let moneyness = linspace(config.moneyness_range.0, config.moneyness_range.1, config.n_strikes);
    let strikes: Vec<f64> = moneyness.iter().map(|m| m * spot).collect();
    let maturities = linspace(config.maturity_range.0, config.maturity_range.1, config.n_maturities);

    let implied_vols: Vec<Vec<Option<f64>>> = maturities
        .iter()
        .map(|&t| {
            strikes
                .iter()
                .map(|&k| match model.implied_vol(spot, k, t, r, q) {
                    Ok(iv) => Some(iv),
                    Err(e) => {
                        debug!(strike = k, maturity = t, "surface node unresolved: {e}");
                        None
                    }
                })
                .collect()
        })
        .collect();

    let grid = SurfaceGrid {
        strikes,
        moneyness,
        maturities,
        implied_vols,
    };
    debug!(
        model = model.model_name(),
        missing = grid.missing_count(),
        "generated {}x{} surface",
        config.n_maturities,
        config.n_strikes
    );
    Ok(grid)
}

/// Holds a grid layout and evaluates models on it.
#[derive(Debug, Clone, Default)]
pub struct SurfaceGenerator {
    config: SurfaceConfig,
}

impl SurfaceGenerator {
    pub fn new(config: SurfaceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn generate<M>(&self, model: &M, spot: f64, r: f64, q: f64) -> Result<SurfaceGrid>
    where
        M: ImpliedVolModel + ?Sized,
    {
        generate_grid(model, spot, r, q, &self.config)
    }
}
