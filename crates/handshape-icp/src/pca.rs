use glam::{Quat, Vec3};
use handshape_linalg::{
    eigen::{JacobiEigenSolver, JacobiParams},
    math::{centroid, from_to_rotation},
    symmetric::SymmetricMatrix3,
    Pose,
};
use thiserror::Error;

/// Error type for principal component analysis.
#[derive(Debug, Error, PartialEq)]
pub enum PcaError {
    /// The point set is empty.
    #[error("cannot compute principal components of an empty point set")]
    NoPoints,
}

/// Principal pose and per-axis spread of a point set.
///
/// The pose places the origin at the centroid and the local x, y, z axes along the
/// principal directions of decreasing spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaResult {
    /// Centroid and principal orientation.
    pub pose: Pose,
    /// Standard deviation along each principal axis.
    pub moments: Vec3,
}

impl Default for PcaResult {
    /// Identity pose with unit moments, the fallback when no points are available.
    fn default() -> Self {
        Self {
            pose: Pose::IDENTITY,
            moments: Vec3::ONE,
        }
    }
}

/// Principal component analysis for point sets.
#[derive(Debug, Clone)]
pub struct PcaSolver {
    params: JacobiParams,
}

impl Default for PcaSolver {
    fn default() -> Self {
        // applied to the trace-normalised covariance
        Self::new(JacobiParams {
            squared_error_threshold: 1e-10,
            max_iterations: 60,
        })
    }
}

impl PcaSolver {
    /// Creates a solver whose eigen decomposition uses `params`.
    pub fn new(params: JacobiParams) -> Self {
        Self { params }
    }

    /// Stopping criteria of the eigen decomposition.
    pub fn params(&self) -> &JacobiParams {
        &self.params
    }

    /// Computes centroid, principal orientation and per-axis moments.
    ///
    /// * one point: that point, identity rotation, zero moments.
    /// * two points: the midpoint, with the x axis along the chord.
    /// * three or more: the eigen decomposition of the covariance about the centroid.
    pub fn solve(&self, points: &[Vec3]) -> Result<PcaResult, PcaError> {
        match points {
            [] => Err(PcaError::NoPoints),
            [p] => Ok(PcaResult {
                pose: Pose::from_position(*p),
                moments: Vec3::ZERO,
            }),
            [p0, p1] => {
                let chord = *p1 - *p0;
                Ok(PcaResult {
                    pose: Pose::new((*p0 + *p1) * 0.5, from_to_rotation(Vec3::X, chord)),
                    moments: Vec3::new(chord.length() * 0.5, 0.0, 0.0),
                })
            }
            _ => {
                let mean = centroid(points);
                let covariance = points
                    .iter()
                    .fold(SymmetricMatrix3::ZERO, |acc, &p| {
                        acc + SymmetricMatrix3::from_outer_product(p - mean)
                    })
                    .scale(1.0 / points.len() as f32);
                let (rotation, moments) = principal_axes(&covariance, &self.params);
                Ok(PcaResult {
                    pose: Pose::new(mean, rotation),
                    moments,
                })
            }
        }
    }

    /// Like [`Self::solve`] but substitutes [`PcaResult::default`] for an empty set.
    pub fn solve_or_default(&self, points: &[Vec3]) -> PcaResult {
        self.solve(points).unwrap_or_default()
    }
}

/// Principal rotation and standard deviations of a covariance matrix.
///
/// The covariance is normalised by its trace before the eigen decomposition so the
/// stopping threshold does not depend on the scale of the data. A zero covariance gives
/// the identity rotation and zero moments.
pub fn principal_axes(covariance: &SymmetricMatrix3, params: &JacobiParams) -> (Quat, Vec3) {
    let trace = covariance.trace();
    if trace.is_nan() || trace <= f32::EPSILON * f32::EPSILON {
        return (Quat::IDENTITY, Vec3::ZERO);
    }

    let mut solver = JacobiEigenSolver::new(*params);
    let eigen = solver.solve(&covariance.scale(1.0 / trace)).sorted();
    let variances = eigen.eigenvalues.max(Vec3::ZERO) * trace;
    let moments = Vec3::new(variances.x.sqrt(), variances.y.sqrt(), variances.z.sqrt());
    (eigen.rotation, moments)
}
