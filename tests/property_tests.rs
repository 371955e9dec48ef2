//! Property-based tests using proptest.
//!
//! Pricing identities checked across random inputs instead of fixed examples.

use heston_surface::models::bs::{bs_call_price, bs_greeks, bs_put_price};
use heston_surface::{solve_implied_vol, Greeks, OptionType};
use proptest::prelude::*;

// --- Put-call parity ---

proptest! {
    /// C - P = S e^{-qT} - K e^{-rT} for every valid input.
    #[test]
    fn put_call_parity_holds(
        s in 20.0_f64..500.0,
        moneyness in 0.5_f64..1.5,
        t in 0.01_f64..5.0,
        r in -0.02_f64..0.10,
        q in 0.0_f64..0.06,
        sigma in 0.05_f64..1.5,
    ) {
        let k = s * moneyness;
        let c = bs_call_price(s, k, r, q, t, sigma);
        let p = bs_put_price(s, k, r, q, t, sigma);
        let rhs = s * (-q * t).exp() - k * (-r * t).exp();
        // relative to the price scale
        prop_assert!((c - p - rhs).abs() <= 1e-8 * s.max(1.0));
    }
}

// --- Greeks bounds ---

proptest! {
    /// Call delta lies in [0, 1], put delta in [-1, 0]; gamma and vega are positive.
    #[test]
    fn delta_bounds_and_positive_convexity(
        moneyness in 0.6_f64..1.4,
        t in 0.02_f64..3.0,
        r in 0.0_f64..0.08,
        q in 0.0_f64..0.05,
        sigma in 0.05_f64..1.0,
    ) {
        let s = 100.0;
        let k = s * moneyness;
        let call = bs_greeks(OptionType::Call, s, k, r, q, t, sigma);
        let put = bs_greeks(OptionType::Put, s, k, r, q, t, sigma);

        prop_assert!((0.0..=1.0).contains(&call.delta));
        prop_assert!((-1.0..=0.0).contains(&put.delta));
        prop_assert!(call.gamma > 0.0 && call.vega > 0.0);
        prop_assert!((call.gamma - put.gamma).abs() < 1e-12);
        prop_assert!((call.vega - put.vega).abs() < 1e-12);
    }
}

// --- Greeks algebra ---

proptest! {
    /// Scaling distributes over addition and negation undoes addition.
    #[test]
    fn greeks_form_an_additive_group(
        a in -10.0_f64..10.0,
        b in -10.0_f64..10.0,
        qty in -5.0_f64..5.0,
    ) {
        let g1 = Greeks { delta: a, gamma: b, vega: a * b, theta: -b, rho: a, degenerate: false };
        let g2 = Greeks { delta: b, gamma: a, vega: 1.0, theta: a, rho: -b, degenerate: false };

        let lhs = (g1 + g2).scale(qty);
        let rhs = g1.scale(qty) + g2.scale(qty);
        prop_assert!((lhs.delta - rhs.delta).abs() < 1e-9);
        prop_assert!((lhs.vega - rhs.vega).abs() < 1e-9);
        prop_assert!((lhs.theta - rhs.theta).abs() < 1e-9);

        let back = (g1 + g2) - g2;
        prop_assert!((back.delta - g1.delta).abs() < 1e-9);
        prop_assert!((back.gamma - g1.gamma).abs() < 1e-9);
    }
}

// --- Price positivity and IV round trip ---

proptest! {
    /// Prices are non-negative and invert back to the generating volatility.
    #[test]
    fn prices_positive_and_invertible(
        moneyness in 0.8_f64..1.2,
        t in 0.1_f64..2.0,
        r in 0.0_f64..0.06,
        sigma in 0.08_f64..1.2,
        is_call in any::<bool>(),
    ) {
        let (s, q) = (100.0, 0.0);
        let k = s * moneyness;
        let option_type = if is_call { OptionType::Call } else { OptionType::Put };
        let call = bs_call_price(s, k, r, q, t, sigma);
        let put = bs_put_price(s, k, r, q, t, sigma);
        prop_assert!(call >= 0.0 && put >= 0.0);
        // no time value left to invert
        prop_assume!(call.min(put) > 1e-3);

        let price = if is_call { call } else { put };

        let iv = solve_implied_vol(price, s, k, t, r, q, option_type).unwrap();
        prop_assert!((iv - sigma).abs() < 1e-5, "iv {} vs sigma {}", iv, sigma);
    }
}
