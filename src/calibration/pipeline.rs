use tracing::{debug, warn};

use crate::calibration::optimizer::{clamp_to_bounds, BoundedOptimizer};
use crate::calibration::types::{ModelCalibrator, VolatilityPoint};

/// Best parameters found by [`calibrate_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub params: Vec<f64>,
    pub objective: f64,
    /// Objective evaluations including the one spent on the starting point
    pub evaluations: usize,
    /// Optimizer's own convergence flag
    pub converged: bool,
    /// True when the optimizer could not improve on the starting point
    pub kept_initial_guess: bool,
}

/// Local bounded optimization from a structured starting point.
///
/// The starting point is the model's own guess unless one is supplied; it is
/// clamped into the bounds and evaluated first. The optimizer result replaces it
/// only when it is finite and strictly better, so the returned objective never
/// exceeds the starting one.
pub fn calibrate_model(
    model: &dyn ModelCalibrator,
    data: &[VolatilityPoint],
    optimizer: &dyn BoundedOptimizer,
    initial_guess: Option<Vec<f64>>,
) -> PipelineOutcome {
    let bounds = model.param_bounds();
    let obj_fn = |x: &[f64]| model.evaluate_objective(x, data);

    let guess = initial_guess.unwrap_or_else(|| model.initial_guess(data));
    let guess = clamp_to_bounds(&guess, bounds);
    let guess_obj = obj_fn(&guess);
    debug!(
        model = model.model_name(),
        objective = guess_obj,
        "initial guess objective"
    );

    let result = optimizer.minimize(&obj_fn, &guess, bounds);
    let evaluations = result.evaluations + 1;

    if result.objective.is_finite() && result.objective < guess_obj {
        debug!(
            optimizer = optimizer.name(),
            "improved objective: {:.6e} -> {:.6e}",
            guess_obj,
            result.objective
        );
        PipelineOutcome {
            params: result.x,
            objective: result.objective,
            evaluations,
            converged: result.converged,
            kept_initial_guess: false,
        }
    } else {
        if !result.objective.is_finite() {
            warn!(
                optimizer = optimizer.name(),
                "optimizer returned a non-finite objective, keeping initial guess"
            );
        } else {
            debug!(
                optimizer = optimizer.name(),
                "optimizer did not improve objective, keeping initial guess"
            );
        }
        PipelineOutcome {
            params: guess,
            objective: guess_obj,
            evaluations,
            converged: result.converged && result.objective.is_finite(),
            kept_initial_guess: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::optimizer::{LbfgsbOptimizer, NelderMeadOptimizer};

    /// Quadratic toy model: objective is the squared distance to the mean IV.
    struct Toy {
        bounds: Vec<(f64, f64)>,
    }

    impl ModelCalibrator for Toy {
        fn model_name(&self) -> &str {
            "toy"
        }
        fn param_count(&self) -> usize {
            1
        }
        fn param_bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }
        fn param_names(&self) -> Vec<&str> {
            vec!["level"]
        }
        fn initial_guess(&self, _data: &[VolatilityPoint]) -> Vec<f64> {
            vec![0.9]
        }
        fn evaluate_objective(&self, x: &[f64], data: &[VolatilityPoint]) -> f64 {
            data.iter().map(|p| (x[0] - p.market_iv).powi(2)).sum::<f64>() / data.len() as f64
        }
    }

    fn data() -> Vec<VolatilityPoint> {
        [0.2, 0.3]
            .iter()
            .map(|&iv| VolatilityPoint {
                strike: 100.0,
                maturity: 1.0,
                market_iv: iv,
                weight: 1.0,
            })
            .collect()
    }

    #[test]
    fn optimizer_improves_on_guess() {
        let toy = Toy {
            bounds: vec![(0.0, 1.0)],
        };
        let out = calibrate_model(&toy, &data(), &NelderMeadOptimizer::default(), None);
        assert!(!out.kept_initial_guess);
        assert!((out.params[0] - 0.25).abs() < 1e-3);
        assert!(out.evaluations > 1);
    }

    #[test]
    fn result_never_worse_than_guess() {
        let toy = Toy {
            bounds: vec![(0.0, 1.0)],
        };
        let guess_obj = toy.evaluate_objective(&[0.25], &data());
        let out = calibrate_model(&toy, &data(), &LbfgsbOptimizer::default(), Some(vec![0.25]));
        assert!(out.objective <= guess_obj);
    }

    #[test]
    fn guess_is_clamped_into_bounds() {
        let toy = Toy {
            bounds: vec![(0.5, 1.0)],
        };
        let out = calibrate_model(&toy, &data(), &NelderMeadOptimizer::default(), Some(vec![-3.0]));
        assert!(out.params[0] >= 0.5 && out.params[0] <= 1.0);
        assert!((out.params[0] - 0.5).abs() < 1e-3);
    }
}
