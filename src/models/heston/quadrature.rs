//! Fixed-order Gauss-Legendre quadrature on a finite interval.
//!
//! Nodes and weights are computed once (Newton iteration on the Legendre
//! polynomial roots) and mapped onto `[lo, hi]`, so repeated integrals over the
//! same interval cost one weighted sum each.

use std::f64::consts::PI;

use crate::error::{EngineError, Result};

fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let kf = k as f64;
        let p_next = ((2.0 * kf - 1.0) * x * p - (kf - 1.0) * p_prev) / kf;
        p_prev = p;
        p = p_next;
    }
    let dp = (n as f64) * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}

/// Gauss-Legendre rule already mapped onto an integration interval.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
    lo: f64,
    hi: f64,
}

impl GaussLegendre {
    /// Build an `order`-point rule on `[lo, hi]`.
    pub fn new(order: usize, lo: f64, hi: f64) -> Result<Self> {
        if order == 0 {
            return Err(EngineError::invalid_input("quadrature order must be > 0"));
        }
        if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
            return Err(EngineError::invalid_input(format!(
                "quadrature interval must satisfy lo < hi, got [{lo}, {hi}]"
            )));
        }

        let n = order;
        let mut nodes = vec![0.0_f64; n];
        let mut weights = vec![0.0_f64; n];
        let half_width = 0.5 * (hi - lo);
        let mid = 0.5 * (hi + lo);

        for i in 0..n.div_ceil(2) {
            // Tricomi initial guess for the i-th root
            let mut z = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            for _ in 0..100 {
                let (p, dp) = legendre_with_derivative(n, z);
                let dz = p / dp;
                z -= dz;
                if dz.abs() < 1e-15 {
                    break;
                }
            }
            let (_, dp) = legendre_with_derivative(n, z);
            let w = 2.0 / ((1.0 - z * z) * dp * dp);

            nodes[i] = mid - half_width * z;
            nodes[n - 1 - i] = mid + half_width * z;
            weights[i] = half_width * w;
            weights[n - 1 - i] = half_width * w;
        }

        Ok(Self {
            nodes,
            weights,
            lo,
            hi,
        })
    }

    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    pub fn interval(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weighted sum of `f` over the precomputed nodes.
    pub fn integrate<F>(&self, f: F) -> f64
    where
        F: Fn(f64) -> f64,
    {
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(&x, &w)| w * f(x))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weights_sum_to_interval_length() {
        let rule = GaussLegendre::new(128, 0.0, 100.0).unwrap();
        let total: f64 = rule.weights().iter().sum();
        assert_abs_diff_eq!(total, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn nodes_are_interior_and_sorted() {
        let rule = GaussLegendre::new(33, 1.0, 3.0).unwrap();
        assert!(rule.nodes().windows(2).all(|w| w[0] < w[1]));
        assert!(rule.nodes()[0] > 1.0);
        assert!(*rule.nodes().last().unwrap() < 3.0);
        // odd order puts the middle node on the midpoint
        assert_abs_diff_eq!(rule.nodes()[16], 2.0, epsilon = 1e-14);
    }

    #[test]
    fn exact_for_low_degree_polynomials() {
        let rule = GaussLegendre::new(5, -1.0, 2.0).unwrap();
        // exact up to degree 9
        let v = rule.integrate(|x| x.powi(9) - 3.0 * x.powi(4) + 1.0);
        let exact = (2f64.powi(10) - 1.0) / 10.0 - 3.0 * (2f64.powi(5) + 1.0) / 5.0 + 3.0;
        assert_abs_diff_eq!(v, exact, epsilon = 1e-10);
    }

    #[test]
    fn smooth_integrand_converges() {
        let rule = GaussLegendre::new(64, 0.0, 50.0).unwrap();
        let v = rule.integrate(|x| (-0.02 * x * x).exp());
        let exact = 0.5 * (PI / 0.02).sqrt() * libm::erf(50.0 * 0.02_f64.sqrt());
        assert_abs_diff_eq!(v, exact, epsilon = 1e-10);
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(GaussLegendre::new(0, 0.0, 1.0).is_err());
        assert!(GaussLegendre::new(8, 1.0, 1.0).is_err());
        assert!(GaussLegendre::new(8, 0.0, f64::INFINITY).is_err());
    }
}
