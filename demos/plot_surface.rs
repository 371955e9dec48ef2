// demos/plot_surface.rs

//! Plot Heston-implied volatility smiles for every maturity of a surface grid
//!
//! Writes `heston_surface.svg` in the working directory.

use anyhow::Result;
use heston_surface::{
    default_configs, generate_surface_with_config, HestonParameters, SurfaceGrid,
};
use plotters::prelude::*;
use tracing_subscriber::EnvFilter;

fn vol_range(grid: &SurfaceGrid) -> (f64, f64) {
    let vols: Vec<f64> = grid.implied_vols_pct().into_iter().flatten().flatten().collect();
    let lo = vols.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = vols.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() && hi.is_finite() {
        (lo - 1.0, hi + 1.0)
    } else {
        (0.0, 100.0)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (spot, r, q) = (100.0, 0.03, 0.01);
    let params = HestonParameters::new(0.04, 1.5, 0.05, 0.6, -0.7)?;
    let config = default_configs::production();
    let grid = generate_surface_with_config(spot, r, q, &params, &config)?;
    println!(
        "Generated {}x{} surface, {} unresolved nodes",
        grid.maturities.len(),
        grid.strikes.len(),
        grid.missing_count()
    );

    let (y_min, y_max) = vol_range(&grid);
    let x_min = grid.strikes.first().copied().unwrap_or(spot * 0.7);
    let x_max = grid.strikes.last().copied().unwrap_or(spot * 1.3);

    let root = SVGBackend::new("heston_surface.svg", (1280, 768)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(
            format!(
                "Heston IV smiles | v0={:.3} κ={:.2} θ={:.3} σ={:.2} ρ={:.2}",
                params.v0, params.kappa, params.theta, params.sigma_v, params.rho
            ),
            ("sans-serif", 30),
        )
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Strike ($)")
        .y_desc("Implied Vol (%)")
        .draw()?;

    let rows = grid.implied_vols_pct();
    let n = rows.len().max(1);
    for (i, (t, row)) in grid.maturities.iter().zip(rows.iter()).enumerate() {
        let color = HSLColor(0.66 * i as f64 / n as f64, 0.8, 0.45);
        // gaps stay gaps: each resolved run becomes its own segment
        let mut segment: Vec<(f64, f64)> = Vec::new();
        let mut segments = Vec::new();
        for (k, iv) in grid.strikes.iter().zip(row.iter()) {
            match iv {
                Some(v) => segment.push((*k, *v)),
                None if !segment.is_empty() => segments.push(std::mem::take(&mut segment)),
                None => {}
            }
        }
        if !segment.is_empty() {
            segments.push(segment);
        }

        let days = t * 365.0;
        for (j, seg) in segments.into_iter().enumerate() {
            let series = chart.draw_series(std::iter::once(PathElement::new(
                seg.clone(),
                color.stroke_width(2),
            )))?;
            if j == 0 {
                series
                    .label(format!("T = {days:.0}d"))
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
            chart.draw_series(seg.into_iter().map(|pt| Circle::new(pt, 2, color.filled())))?;
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    println!("Chart saved to heston_surface.svg");
    Ok(())
}
