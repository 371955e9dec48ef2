// src/calibration/optimizer.rs

//! Bounded local optimizers behind one trait.
//!
//! An optimizer receives an objective `R^n -> R`, a starting point and box
//! bounds, and returns the best point it found. Every returned point lies inside
//! the bounds. Failure to converge is reported through the outcome, never as an
//! error.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

use cmaes_lbfgsb::lbfgsb_optimize::{lbfgsb_optimize, LbfgsbConfig};
use tracing::{debug, trace, warn};

/// Result of one bounded minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    pub x: Vec<f64>,
    pub objective: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// Objective type accepted by every optimizer.
pub type Objective<'a> = dyn Fn(&[f64]) -> f64 + Sync + 'a;

pub trait BoundedOptimizer: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn minimize(&self, objective: &Objective<'_>, x0: &[f64], bounds: &[(f64, f64)])
        -> OptimizationOutcome;
}

/// Project `x` into the box.
pub fn clamp_to_bounds(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds.iter())
        .map(|(&v, &(lo, hi))| if v.is_nan() { 0.5 * (lo + hi) } else { v.clamp(lo, hi) })
        .collect()
}

/// Limited-memory BFGS with box constraints (`cmaes-lbfgsb`).
///
/// `tolerance` bounds the projected-gradient norm; `obj_tol` and
/// `step_size_tol` are the absolute objective-change and step-length stops.
/// A run that uses up `max_iterations` without a small projected gradient is
/// reported as not converged.
#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsbOptimizer {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub obj_tol: f64,
    pub step_size_tol: f64,
}

impl Default for LbfgsbOptimizer {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-10,
            obj_tol: 1e-14,
            step_size_tol: 1e-12,
        }
    }
}

/// Max-norm of the central-difference gradient at `x`, with components that
/// push against an active bound zeroed.
pub fn projected_gradient_norm(
    objective: &dyn Fn(&[f64]) -> f64,
    x: &[f64],
    bounds: &[(f64, f64)],
) -> f64 {
    let f0 = objective(x);
    let mut shifted = x.to_vec();
    let mut norm = 0.0_f64;
    for (i, &(lo, hi)) in bounds.iter().enumerate() {
        let h = 1e-7 * x[i].abs().max(1.0);
        let up = (x[i] + h).min(hi);
        let down = (x[i] - h).max(lo);
        shifted[i] = up;
        let f_up = if up > x[i] { objective(&shifted) } else { f0 };
        shifted[i] = down;
        let f_down = if down < x[i] { objective(&shifted) } else { f0 };
        shifted[i] = x[i];

        let width = up - down;
        if width <= 0.0 {
            continue;
        }
        let g = (f_up - f_down) / width;
        let at_lower = x[i] - lo <= h && g > 0.0;
        let at_upper = hi - x[i] <= h && g < 0.0;
        if !(at_lower || at_upper) {
            norm = norm.max(g.abs());
        }
    }
    norm
}

impl BoundedOptimizer for LbfgsbOptimizer {
    fn name(&self) -> &str {
        "l-bfgs-b"
    }

    fn minimize(
        &self,
        objective: &Objective<'_>,
        x0: &[f64],
        bounds: &[(f64, f64)],
    ) -> OptimizationOutcome {
        let evaluations = AtomicUsize::new(0);
        let iterations = AtomicUsize::new(0);
        let counted = |x: &[f64]| {
            evaluations.fetch_add(1, Ordering::Relaxed);
            objective(x)
        };

        let config = LbfgsbConfig {
            obj_tol: self.obj_tol,
            step_size_tol: self.step_size_tol,
            ..LbfgsbConfig::default()
        };

        let start = clamp_to_bounds(x0, bounds);
        let mut x = start.clone();
        let result = lbfgsb_optimize(
            &mut x,
            bounds,
            &counted,
            self.max_iterations,
            self.tolerance,
            Some(|_current_x: &[f64], current_obj: f64| {
                let it = iterations.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(iteration = it, objective = current_obj, "L-BFGS-B iteration");
            }),
            Some(config),
        );

        match result {
            Ok((obj, sol)) => {
                let x = clamp_to_bounds(&sol, bounds);
                let used = iterations.load(Ordering::Relaxed);
                let converged = obj.is_finite()
                    && (used < self.max_iterations
                        || projected_gradient_norm(&counted, &x, bounds) < self.tolerance);
                if !converged {
                    debug!(iterations = used, objective = obj, "L-BFGS-B stopped at the iteration cap");
                }
                OptimizationOutcome {
                    x,
                    objective: obj,
                    evaluations: evaluations.load(Ordering::Relaxed),
                    converged,
                }
            }
            Err(e) => {
                warn!("L-BFGS-B failed: {:?}, returning starting point", e);
                let obj = counted(&start);
                OptimizationOutcome {
                    x: start,
                    objective: obj,
                    evaluations: evaluations.load(Ordering::Relaxed),
                    converged: false,
                }
            }
        }
    }
}

/// Derivative-free bounded Nelder-Mead simplex search.
///
/// Trial vertices are clamped into the box, so the simplex never leaves it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct NelderMeadOptimizer {
    pub max_iterations: usize,
    /// Initial simplex edge as a fraction of each bound's width
    pub initial_step: f64,
    pub tolerance: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
}

impl Default for NelderMeadOptimizer {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            initial_step: 0.08,
            tolerance: 1e-10,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
        }
    }
}

impl BoundedOptimizer for NelderMeadOptimizer {
    fn name(&self) -> &str {
        "nelder-mead"
    }

    fn minimize(
        &self,
        objective: &Objective<'_>,
        x0: &[f64],
        bounds: &[(f64, f64)],
    ) -> OptimizationOutcome {
        let dim = bounds.len();
        let mut evals = 0usize;
        let mut eval = |x: &[f64]| {
            evals += 1;
            let v = objective(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let start = clamp_to_bounds(x0, bounds);
        if dim == 0 {
            let obj = eval(&start);
            return OptimizationOutcome {
                x: start,
                objective: obj,
                evaluations: evals,
                converged: true,
            };
        }

        let mut simplex = Vec::with_capacity(dim + 1);
        let mut values = Vec::with_capacity(dim + 1);
        values.push(eval(&start));
        simplex.push(start.clone());

        for d in 0..dim {
            let (lo, hi) = bounds[d];
            let step = (hi - lo).abs() * self.initial_step.max(1e-4);
            let mut x = start.clone();
            x[d] = (x[d] + step).min(hi);
            if (x[d] - start[d]).abs() < 1e-14 {
                x[d] = (x[d] - step).max(lo);
            }
            values.push(eval(&x));
            simplex.push(x);
        }

        let mut converged = false;
        for _ in 0..self.max_iterations {
            let mut order: Vec<usize> = (0..=dim).collect();
            order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let spread = (values[dim] - values[0]).abs();
            let centroid: Vec<f64> = (0..dim)
                .map(|d| simplex.iter().take(dim).map(|x| x[d]).sum::<f64>() / dim as f64)
                .collect();
            let size = simplex
                .iter()
                .map(|x| {
                    x.iter()
                        .zip(centroid.iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(0.0_f64, f64::max);

            if spread <= self.tolerance && size <= self.tolerance.sqrt() {
                converged = true;
                break;
            }

            let along = |coef: f64, from: &[f64]| -> Vec<f64> {
                let x: Vec<f64> = (0..dim)
                    .map(|d| centroid[d] + coef * (from[d] - centroid[d]))
                    .collect();
                clamp_to_bounds(&x, bounds)
            };

            let xr = along(-self.reflection, &simplex[dim]);
            let fr = eval(&xr);

            if fr < values[0] {
                let xe = along(self.expansion, &xr);
                let fe = eval(&xe);
                if fe < fr {
                    simplex[dim] = xe;
                    values[dim] = fe;
                } else {
                    simplex[dim] = xr;
                    values[dim] = fr;
                }
                continue;
            }

            if fr < values[dim - 1] {
                simplex[dim] = xr;
                values[dim] = fr;
                continue;
            }

            let xc = along(self.contraction, &simplex[dim]);
            let fc = eval(&xc);
            if fc < values[dim] {
                simplex[dim] = xc;
                values[dim] = fc;
                continue;
            }

            for i in 1..=dim {
                let shrunk: Vec<f64> = (0..dim)
                    .map(|d| simplex[0][d] + self.shrink * (simplex[i][d] - simplex[0][d]))
                    .collect();
                values[i] = eval(&shrunk);
                simplex[i] = shrunk;
            }
        }

        let best = (0..=dim)
            .min_by(|&i, &j| values[i].total_cmp(&values[j]))
            .unwrap_or(0);
        OptimizationOutcome {
            x: simplex[best].clone(),
            objective: values[best],
            evaluations: evals,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn shifted_bowl(x: &[f64]) -> f64 {
        (x[0] - 1.0).powi(2) + 3.0 * (x[1] + 0.5).powi(2)
    }

    #[test]
    fn clamp_projects_into_box() {
        let b = [(0.0, 1.0), (-1.0, 1.0)];
        assert_eq!(clamp_to_bounds(&[2.0, -3.0], &b), vec![1.0, -1.0]);
        assert_eq!(clamp_to_bounds(&[f64::NAN, 0.2], &b), vec![0.5, 0.2]);
    }

    #[test]
    fn nelder_mead_finds_interior_minimum() {
        let opt = NelderMeadOptimizer {
            max_iterations: 2000,
            ..NelderMeadOptimizer::default()
        };
        let out = opt.minimize(&shifted_bowl, &[0.0, 0.0], &[(-5.0, 5.0), (-5.0, 5.0)]);
        assert_abs_diff_eq!(out.x[0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(out.x[1], -0.5, epsilon = 1e-4);
        assert!(out.evaluations > 0);
    }

    #[test]
    fn nelder_mead_respects_bounds() {
        let opt = NelderMeadOptimizer::default();
        let bounds = [(2.0, 4.0), (0.0, 1.0)];
        let out = opt.minimize(&shifted_bowl, &[3.0, 0.5], &bounds);
        for (v, (lo, hi)) in out.x.iter().zip(bounds.iter()) {
            assert!(v >= lo && v <= hi);
        }
        assert_abs_diff_eq!(out.x[0], 2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(out.x[1], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn lbfgsb_stays_inside_bounds() {
        let opt = LbfgsbOptimizer::default();
        let bounds = [(2.0, 4.0), (0.0, 1.0)];
        let out = opt.minimize(&shifted_bowl, &[3.0, 0.5], &bounds);
        for (v, (lo, hi)) in out.x.iter().zip(bounds.iter()) {
            assert!(v >= lo && v <= hi);
        }
        assert!(out.objective <= shifted_bowl(&[3.0, 0.5]));
    }

    fn rosenbrock(x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }

    #[test]
    fn lbfgsb_capped_run_is_not_converged() {
        let opt = LbfgsbOptimizer {
            max_iterations: 1,
            ..LbfgsbOptimizer::default()
        };
        let out = opt.minimize(&rosenbrock, &[-1.2, 1.0], &[(-5.0, 5.0), (-5.0, 5.0)]);
        assert!(out.objective > 1e-3);
        assert!(!out.converged);
    }

    #[test]
    fn lbfgsb_converges_on_smooth_bowl() {
        let opt = LbfgsbOptimizer::default();
        let out = opt.minimize(&shifted_bowl, &[0.0, 0.0], &[(-5.0, 5.0), (-5.0, 5.0)]);
        assert!(out.converged);
        assert_abs_diff_eq!(out.x[0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(out.x[1], -0.5, epsilon = 1e-4);
    }

    #[test]
    fn projected_gradient_ignores_active_bounds() {
        // minimum of the bowl lies outside the box at x0 = 1; x0 = 2 is the bound
        let bounds = [(2.0, 4.0), (-5.0, 5.0)];
        assert!(projected_gradient_norm(&shifted_bowl, &[2.0, -0.5], &bounds) < 1e-6);
        assert!(projected_gradient_norm(&shifted_bowl, &[3.0, -0.5], &bounds) > 1.0);
    }
}
