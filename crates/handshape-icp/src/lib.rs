#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Sampling-based check that an alignment explains a whole shape.
pub mod coverage;

/// Iterative closest point registration against a shape.
pub mod icp;

/// Shapes built from straight line segments.
pub mod line_shape;

/// Principal component analysis of point sets.
pub mod pca;

/// Least-squares alignment of corresponding point sets.
pub mod point_set;

/// The shape abstraction and closest-point queries.
pub mod shape;

/// Time-stamped polylines recorded from a tracked point.
pub mod spline;

pub use icp::{IcpConfig, IcpError, IcpSolver, IcpStatus, IcpStep};
pub use line_shape::LineShape;
pub use pca::{PcaError, PcaResult, PcaSolver};
pub use point_set::{PointSetError, PointSetTransformSolver, ScaleMode, TransformEstimate};
pub use shape::{ClosestPointFinder, SampleBuffer, Segment, SegmentFinder, Shape, ShapeError};
pub use spline::{ControlPoint, SplineCurve};
