#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Target point sets with per-point weights.
pub mod configuration;

mod error;
pub use error::PoseError;

/// Matching of tracked points against a configuration.
pub mod evaluator;

/// JSON persistence of pose configurations.
pub mod io;

pub use configuration::PoseConfiguration;
pub use evaluator::{PoseEvaluator, PoseMatch};
