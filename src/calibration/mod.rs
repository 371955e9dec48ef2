pub mod config;
pub mod optimizer;
pub mod pipeline;
pub mod quotes;
pub mod types;

pub use config::{CalibrationConfig, EngineConfig, OptimizerConfig, OptimizerMethod};
pub use optimizer::{BoundedOptimizer, LbfgsbOptimizer, NelderMeadOptimizer, OptimizationOutcome};
pub use quotes::{QuoteBatch, QuoteFilter, QuoteProcessor};
pub use types::{CalibrationResult, ModelCalibrator, VolatilityPoint};
