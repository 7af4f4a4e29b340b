#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Jacobi eigen-decomposition of symmetric 3x3 matrices.
pub mod eigen;

/// Scalar and vector helpers: fast rsqrt, Givens parameters, segment projection.
pub mod math;

/// Rigid poses built from a position and a unit quaternion.
pub mod pose;

/// Module to calculate SVD of a 3x3 matrix
pub mod svd;

/// Symmetric 3x3 matrices used for covariances and second moments.
pub mod symmetric;

pub use pose::Pose;
