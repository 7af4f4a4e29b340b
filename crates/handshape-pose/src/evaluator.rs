use glam::Vec3;
use handshape_icp::{PointSetTransformSolver, ScaleMode};
use handshape_linalg::Pose;

use crate::{PoseConfiguration, PoseError};

/// Result of matching tracked points against a [`PoseConfiguration`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMatch {
    /// Pose mapping the configuration targets onto the input points.
    pub offset: Pose,
    /// Condition number of the fit; large values indicate a poorly constrained match.
    pub condition_number: f32,
    /// Whether the best fit was a mirror image that had to be corrected.
    pub reflection: bool,
}

impl PoseMatch {
    /// Squared distance between each input point and its transformed target.
    pub fn squared_residuals<'a>(
        &'a self,
        input: &'a [Vec3],
        config: &'a PoseConfiguration,
    ) -> impl Iterator<Item = f32> + 'a {
        input
            .iter()
            .zip(config.targets())
            .map(|(x, target)| self.offset.transform_point(*target).distance_squared(*x))
    }
}

/// Rigid matching of tracked points to pose configurations with known correspondence.
#[derive(Debug, Clone)]
pub struct PoseEvaluator {
    solver: PointSetTransformSolver,
}

impl Default for PoseEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseEvaluator {
    /// Creates an evaluator; matches are rigid, without scale.
    pub fn new() -> Self {
        Self {
            solver: PointSetTransformSolver::new(ScaleMode::Fixed),
        }
    }

    /// Finds the rigid offset that best maps the configuration onto `input`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidArgument`] if `input` does not have one point per target.
    /// The configuration is never modified.
    pub fn evaluate_pose(
        &self,
        input: &[Vec3],
        config: &PoseConfiguration,
    ) -> Result<PoseMatch, PoseError> {
        check_lengths(input, config)?;

        let estimate = self
            .solver
            .solve(input, config.targets(), Some(config.weights()))?;

        Ok(PoseMatch {
            offset: estimate.pose(),
            condition_number: estimate.condition_number,
            reflection: estimate.reflection,
        })
    }

    /// Returns a copy of `config` whose weights are lowered so that no point contributes
    /// more than `max_error²` to the weighted error of `pose_match`.
    ///
    /// Calling [`Self::evaluate_pose`] again with the result damps outliers; repeating
    /// the two steps approximates a robust fit.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidArgument`] if `input` does not have one point per target.
    pub fn error_limited_config(
        &self,
        input: &[Vec3],
        config: &PoseConfiguration,
        pose_match: &PoseMatch,
        max_error: f32,
    ) -> Result<PoseConfiguration, PoseError> {
        check_lengths(input, config)?;
        let max_error_sq = max_error * max_error;

        let weights: Vec<f32> = pose_match
            .squared_residuals(input, config)
            .zip(config.weights())
            .map(|(residual, &weight)| {
                if residual > 0.0 && residual * weight > max_error_sq {
                    max_error_sq / residual
                } else {
                    weight
                }
            })
            .collect();

        let limited = weights
            .iter()
            .zip(config.weights())
            .filter(|(new, old)| new != old)
            .count();
        log::debug!("error limit {max_error} lowered {limited} of {} weights", weights.len());

        let result = PoseConfiguration::new(config.targets().to_vec(), weights)?;
        match config.identifiers() {
            Some(ids) => result.with_identifiers(ids.to_vec()),
            None => Ok(result),
        }
    }
}

fn check_lengths(input: &[Vec3], config: &PoseConfiguration) -> Result<(), PoseError> {
    if input.len() != config.len() {
        return Err(PoseError::InvalidArgument {
            input: input.len(),
            config: config.len(),
        });
    }
    Ok(())
}
