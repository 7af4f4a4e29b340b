use glam::{Mat3, Quat, Vec3};
use handshape_linalg::{
    math::{from_to_rotation, outer_product, weighted_centroid},
    svd::svd3,
    Pose,
};
use thiserror::Error;

/// Relative threshold below which a variance counts as degenerate.
const DEGENERATE_VARIANCE: f32 = 1e-10;

/// Error type for point set alignment.
#[derive(Debug, Error, PartialEq)]
pub enum PointSetError {
    /// Input and target point sets must have the same length.
    #[error("input has {input} points but target has {target}")]
    MismatchedLengths {
        /// Number of input points.
        input: usize,
        /// Number of target points.
        target: usize,
    },

    /// The weight array must match the number of points.
    #[error("{points} points but {weights} weights")]
    MismatchedWeights {
        /// Number of points.
        points: usize,
        /// Number of weights.
        weights: usize,
    },
}

/// How the scale between the two point sets is estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// Rigid fit, the scale is always one.
    #[default]
    Fixed,
    /// A single scale factor shared by all axes.
    Uniform,
    /// One scale factor per axis, estimated from the per-axis variances before the
    /// rotation is solved.
    NonUniform,
}

/// Similarity transform mapping target points onto input points.
///
/// `input ≈ rotation * (scale * target) + translation`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformEstimate {
    /// Proper rotation (determinant +1).
    pub rotation: Quat,
    /// Translation applied after rotation and scale.
    pub translation: Vec3,
    /// Per-axis scale applied to the target before rotating.
    pub scale: Vec3,
    /// Ratio of the largest to the smallest singular value of the cross-covariance.
    ///
    /// Zero when fewer than three points were given.
    pub condition_number: f32,
    /// Whether the unconstrained least-squares solution was a reflection.
    pub reflection: bool,
}

impl Default for TransformEstimate {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformEstimate {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
        scale: Vec3::ONE,
        condition_number: 0.0,
        reflection: false,
    };

    /// The rigid part of the transform.
    pub fn pose(&self) -> Pose {
        Pose::new(self.translation, self.rotation)
    }

    /// Maps a target point into the input frame.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.translation
    }

    /// Maps an input point back into the target frame.
    #[inline]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) / self.scale
    }
}

/// Weighted least-squares alignment of two corresponding point sets.
///
/// Follows Arun, Huang and Blostein, "Least-Squares Fitting of Two 3-D Point Sets"
/// (IEEE PAMI, 1987) with the scale estimate of Umeyama (IEEE PAMI, 1991).
#[derive(Debug, Clone, Default)]
pub struct PointSetTransformSolver {
    /// Scale estimation mode.
    pub scale_mode: ScaleMode,
}

impl PointSetTransformSolver {
    /// Creates a solver with the given scale mode.
    pub fn new(scale_mode: ScaleMode) -> Self {
        Self { scale_mode }
    }

    /// Finds the transform mapping `target` onto `input`.
    ///
    /// Weights default to one. An empty set yields the identity, a single pair a pure
    /// translation, and two pairs the shortest-arc rotation between the chords.
    pub fn solve(
        &self,
        input: &[Vec3],
        target: &[Vec3],
        weights: Option<&[f32]>,
    ) -> Result<TransformEstimate, PointSetError> {
        if input.len() != target.len() {
            return Err(PointSetError::MismatchedLengths {
                input: input.len(),
                target: target.len(),
            });
        }
        if let Some(w) = weights {
            if w.len() != input.len() {
                return Err(PointSetError::MismatchedWeights {
                    points: input.len(),
                    weights: w.len(),
                });
            }
        }

        match (input, target) {
            ([], []) => Ok(TransformEstimate::IDENTITY),
            ([x], [y]) => Ok(TransformEstimate {
                translation: *x - *y,
                ..TransformEstimate::IDENTITY
            }),
            ([x0, x1], [y0, y1]) => Ok(self.solve_chord(*x0, *x1, *y0, *y1)),
            _ => Ok(self.solve_general(input, target, effective_weights(weights))),
        }
    }

    fn solve_chord(&self, x0: Vec3, x1: Vec3, y0: Vec3, y1: Vec3) -> TransformEstimate {
        let chord_from = y1 - y0;
        let chord_to = x1 - x0;
        let rotation = from_to_rotation(chord_from, chord_to);

        let scale = match self.scale_mode {
            ScaleMode::Fixed => 1.0,
            // per-axis scale is undefined for a single chord
            ScaleMode::Uniform | ScaleMode::NonUniform => {
                let from_length = chord_from.length();
                if from_length > 0.0 {
                    chord_to.length() / from_length
                } else {
                    1.0
                }
            }
        };

        let target_center = (y0 + y1) * 0.5;
        let input_center = (x0 + x1) * 0.5;
        TransformEstimate {
            rotation,
            translation: input_center - rotation * (target_center * scale),
            scale: Vec3::splat(scale),
            ..TransformEstimate::IDENTITY
        }
    }

    fn solve_general(
        &self,
        input: &[Vec3],
        target: &[Vec3],
        weights: Option<&[f32]>,
    ) -> TransformEstimate {
        let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
        let input_center = weighted_centroid(input, weights);
        let target_center = weighted_centroid(target, weights);

        // weighted second moments of the centred sets, per axis
        let mut input_var = Vec3::ZERO;
        let mut target_var = Vec3::ZERO;
        for (i, (x, y)) in input.iter().zip(target).enumerate() {
            let xc = *x - input_center;
            let yc = *y - target_center;
            input_var += weight(i) * xc * xc;
            target_var += weight(i) * yc * yc;
        }

        let pre_scale = match self.scale_mode {
            ScaleMode::NonUniform => per_axis_scale(input_var, target_var),
            ScaleMode::Fixed | ScaleMode::Uniform => Vec3::ONE,
        };

        // H = Σ w (target ⊗ input), target side already scaled
        let mut h = Mat3::ZERO;
        for (i, (x, y)) in input.iter().zip(target).enumerate() {
            let xc = *x - input_center;
            let yc = pre_scale * (*y - target_center);
            h += outer_product(yc, xc) * weight(i);
        }

        let svd = svd3(&h);
        let u = *svd.u();
        let mut v = *svd.v();

        let mut rotation_matrix = v * u.transpose();
        let reflection = rotation_matrix.determinant() < 0.0;
        if reflection {
            v.z_axis = -v.z_axis;
            rotation_matrix = v * u.transpose();
        }
        let rotation = Quat::from_mat3(&rotation_matrix).normalize();

        let scale = match self.scale_mode {
            ScaleMode::Fixed => Vec3::ONE,
            ScaleMode::NonUniform => pre_scale,
            ScaleMode::Uniform => {
                let s = svd.s();
                let d = if reflection { -1.0 } else { 1.0 };
                let spread = target_var.element_sum();
                if spread > 0.0 {
                    Vec3::splat((s.x + s.y + d * s.z) / spread)
                } else {
                    Vec3::ONE
                }
            }
        };

        let condition_number = svd.condition_number();
        log::trace!(
            "point set fit: {} pairs, condition {condition_number}, reflection {reflection}",
            input.len()
        );

        TransformEstimate {
            rotation,
            translation: input_center - rotation * (scale * target_center),
            scale,
            condition_number,
            reflection,
        }
    }
}

/// Drops the weights when they cannot define a centroid.
fn effective_weights(weights: Option<&[f32]>) -> Option<&[f32]> {
    let weights = weights?;
    if weights.iter().sum::<f32>() > 0.0 {
        Some(weights)
    } else {
        log::warn!("all {} weights are zero, using unit weights", weights.len());
        None
    }
}

/// `sqrt(input_var / target_var)` per axis.
///
/// Axes without target or input spread take the ratio of the total spreads; one when that
/// is degenerate as well.
fn per_axis_scale(input_var: Vec3, target_var: Vec3) -> Vec3 {
    let limit = DEGENERATE_VARIANCE * target_var.max_element().max(f32::MIN_POSITIVE);
    let usable = |s: f32| s.is_finite() && s > 0.0;

    let total_target = target_var.element_sum();
    let fallback = if total_target > limit {
        Some((input_var.element_sum() / total_target).sqrt()).filter(|s| usable(*s))
    } else {
        None
    }
    .unwrap_or(1.0);

    let axis = |num: f32, den: f32| {
        if den > limit {
            Some((num / den).sqrt()).filter(|s| usable(*s)).unwrap_or(fallback)
        } else {
            fallback
        }
    };
    Vec3::new(
        axis(input_var.x, target_var.x),
        axis(input_var.y, target_var.y),
        axis(input_var.z, target_var.z),
    )
}
