
use heston_surface::calibration::pipeline::calibrate_model;
use heston_surface::calibration::ModelCalibrator;
use heston_surface::models::heston::HestonModelCalibrator;
use heston_surface::{
    build_volatility_points, calibrate, calibrate_with_config, default_configs, evaluate_heston,
    CalibrationConfig, EngineError, LbfgsbOptimizer, QuoteFilter, VolatilityPoint,
};
use test_utils::{distant_params, init_tracing, reference_params, synthetic_points, test_pricer};

fn synthetic_set() -> Vec<VolatilityPoint> {
    synthetic_points(
        &reference_params(),
        100.0,
        0.03,
        0.01,
        &[85.0, 92.5, 100.0, 107.5, 115.0],
        &[0.25, 0.5, 1.0],
    )
}

/// Synthetic vols generated by known parameters are reproduced to within one vol point.
#[test]
fn test_calibration_recovers_synthetic_surface() {
    init_tracing();
    let points = synthetic_set();
    let result = calibrate(&points, 100.0, 0.03, 0.01).expect("calibration failed");

    println!("Calibrated parameters: {:?}", result.params);
    println!(
        "rmse = {:.6}, converged = {}, evaluations = {}",
        result.rmse, result.converged, result.evaluations
    );

    assert_eq!(result.n_points, 15);
    assert!(result.rmse < 0.01, "rmse {} too large", result.rmse);
    assert!(result.rmse >= 0.0);
    assert!((result.rmse - result.objective.sqrt()).abs() < 1e-12);

    let b = heston_surface::HestonParamBounds::default();
    let p = result.params;
    assert!(p.v0 >= b.v0.0 && p.v0 <= b.v0.1);
    assert!(p.kappa >= b.kappa.0 && p.kappa <= b.kappa.1);
    assert!(p.theta >= b.theta.0 && p.theta <= b.theta.1);
    assert!(p.sigma_v >= b.sigma_v.0 && p.sigma_v <= b.sigma_v.1);
    assert!(p.rho >= b.rho.0 && p.rho <= b.rho.1);
    assert_eq!(result.feller_satisfied, p.satisfies_feller());
}

fn distant_set() -> Vec<VolatilityPoint> {
    synthetic_points(
        &distant_params(),
        100.0,
        0.03,
        0.01,
        &[85.0, 92.5, 100.0, 107.5, 115.0],
        &[0.25, 0.5, 1.0],
    )
}

/// The search has to travel: the starting point alone misses by several vol points.
#[test]
fn test_calibration_recovers_distant_parameters() {
    init_tracing();
    let points = distant_set();
    let pricer = test_pricer();
    let model = HestonModelCalibrator::new(&pricer, 100.0, 0.03, 0.01, CalibrationConfig::default()).unwrap();
    let guess = model.initial_guess(&points);
    let guess_rmse = model.evaluate_objective(&guess, &points).sqrt();
    assert!(guess_rmse > 0.01, "starting point already fits: {guess_rmse}");

    let outcome = calibrate_model(&model, &points, &LbfgsbOptimizer::default(), None);
    assert!(!outcome.kept_initial_guess);
    assert!(outcome.objective < guess_rmse * guess_rmse);

    let result = calibrate(&points, 100.0, 0.03, 0.01).expect("calibration failed");
    println!("Calibrated parameters: {:?}, rmse = {:.6}", result.params, result.rmse);
    assert!(result.rmse < 0.01, "rmse {} too large", result.rmse);
    assert!((result.rmse - outcome.objective.sqrt()).abs() < 1e-12);
    let moved: f64 = result
        .params
        .to_vec()
        .iter()
        .zip(guess.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(moved > 0.1, "parameters barely moved from the guess: {:?}", result.params);
}

#[test]
fn test_objective_matches_reported_fit() {
    let points = synthetic_set();
    let result = calibrate(&points, 100.0, 0.03, 0.01).unwrap();
    let objective = evaluate_heston(&points, 100.0, 0.03, 0.01, &result.params).unwrap();
    assert!((objective - result.objective).abs() < 1e-12);

    let truth = evaluate_heston(&points, 100.0, 0.03, 0.01, &reference_params()).unwrap();
    assert!(truth < 1e-8, "objective at the true parameters: {truth}");
}

#[test]
fn test_four_points_is_insufficient() {
    let points: Vec<VolatilityPoint> = synthetic_set().into_iter().take(4).collect();
    let err = calibrate(&points, 100.0, 0.03, 0.01).unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientData {
            required: 5,
            found: 4
        }
    );
}

#[test]
fn test_five_points_is_enough() {
    let points: Vec<VolatilityPoint> = synthetic_set().into_iter().take(5).collect();
    let result = calibrate(&points, 100.0, 0.03, 0.01).unwrap();
    assert_eq!(result.n_points, 5);
    assert!(result.rmse.is_finite());
}

#[test]
fn test_nelder_mead_preset_calibrates() {
    let points = synthetic_set();
    let config = default_configs::minimal();
    let result = calibrate_with_config(&points, 100.0, 0.03, 0.01, &config).unwrap();
    assert!(result.rmse < 0.01, "rmse {}", result.rmse);
}

#[test]
fn test_invalid_spot_is_rejected() {
    let points = synthetic_set();
    assert!(matches!(
        calibrate(&points, 0.0, 0.03, 0.01),
        Err(EngineError::InvalidInput(_))
    ));
}

/// Raw quotes from CSV through filtering, IV resolution and calibration.
#[cfg(feature = "serde")]
#[test]
fn test_csv_quotes_to_calibration() {
    init_tracing();
    let quotes = test_utils::load_test_quotes(test_utils::SAMPLE_QUOTES).expect("Failed to load test data");
    println!("Loaded {} quotes", quotes.len());
    assert_eq!(quotes.len(), 56);

    let market = test_utils::sample_market();
    let points = build_volatility_points(&quotes, &market, QuoteFilter::default()).unwrap();
    println!("{} quotes survived filtering", points.len());
    assert_eq!(points.len(), 29);
    assert!(points.iter().all(|p| p.market_iv > 0.02 && p.market_iv < 3.0));
    assert!(points.iter().all(|p| p.weight >= 1.0));

    let config = test_utils::create_test_config();
    let result = calibrate_with_config(&points, market.spot, market.rate, market.dividend_yield, &config)
        .expect("calibration failed");
    println!("Calibrated parameters: {:?}, rmse = {:.5}", result.params, result.rmse);
    assert_eq!(result.n_points, 29);
    assert!(result.rmse < 0.05);
    // the fixture smile is downward sloping
    assert!(result.params.rho < 0.0);
}
