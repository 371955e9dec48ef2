pub mod heston_calibrator;
pub mod heston_model;
pub mod heston_pricer;
pub mod quadrature;

pub use heston_calibrator::{HestonCalibrator, HestonModelCalibrator, HestonParamBounds};
pub use heston_model::HestonParameters;
pub use heston_pricer::{HestonModel, HestonPricer, ModelPrice, QuadratureConfig};
