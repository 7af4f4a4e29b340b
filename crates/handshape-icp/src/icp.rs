use glam::Vec3;
use handshape_linalg::{math::mean_square_error, Pose};
use thiserror::Error;

use crate::{
    pca::PcaSolver,
    point_set::{PointSetError, PointSetTransformSolver, ScaleMode},
    shape::{ClosestPointFinder, Shape, ShapeError},
};

/// Moments below this fraction of the largest one are ignored for the initial scale.
const DEGENERATE_MOMENT: f32 = 1e-3;

/// Error type for ICP registration.
#[derive(Debug, Error)]
pub enum IcpError {
    /// A step was requested before [`IcpSolver::init`].
    #[error("ICP solver has not been initialised")]
    NotInitialized,

    /// The closest-point query failed.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The incremental fit failed.
    #[error(transparent)]
    PointSet(#[from] PointSetError),
}

/// Parameters of the ICP iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpConfig {
    /// Maximum number of steps performed by [`IcpSolver::solve`].
    pub max_iterations: usize,
    /// The solver has converged once the mean squared error decreases by no more than
    /// the square of this value between two steps.
    pub convergence_threshold: f32,
    /// Scale estimation mode for the initial guess and the incremental fits.
    pub scale_mode: ScaleMode,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            convergence_threshold: 0.001,
            scale_mode: ScaleMode::Fixed,
        }
    }
}

/// State of an [`IcpSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcpStatus {
    /// No point set has been given yet.
    Uninitialized,
    /// More steps may still reduce the error.
    Iterating,
    /// The error stopped decreasing, or there was nothing to align.
    Converged,
    /// The iteration cap was reached before convergence.
    IterationCapReached,
}

/// Snapshot of the solver after one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpStep {
    /// Number of steps performed so far.
    pub iteration: usize,
    /// Mean squared distance between the aligned points and their correspondences.
    pub mean_square_error: f32,
    /// Current shape-to-input pose.
    pub target_offset: Pose,
    /// Current shape-to-input scale.
    pub target_scale: Vec3,
}

/// Iterative closest point registration of a point set against a [`Shape`].
///
/// The result maps the shape into the frame of the input points:
/// `input ≈ target_offset * (target_scale * shape_point)`.
///
/// The solver can run to completion with [`IcpSolver::solve`] or be advanced a few steps
/// at a time with [`IcpSolver::solve_step`], [`IcpSolver::solve_with_budget`] or
/// [`IcpSolver::steps`].
pub struct IcpSolver<'a> {
    config: IcpConfig,
    pca: PcaSolver,
    point_solver: PointSetTransformSolver,
    finder: Option<Box<dyn ClosestPointFinder + 'a>>,
    points: Vec<Vec3>,
    closest: Vec<Vec3>,
    target_offset: Pose,
    target_scale: Vec3,
    iterations: usize,
    mean_square_error: f32,
    local_optimum: bool,
}

impl Default for IcpSolver<'_> {
    fn default() -> Self {
        Self::new(IcpConfig::default())
    }
}

impl std::fmt::Debug for IcpSolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcpSolver")
            .field("config", &self.config)
            .field("points", &self.points.len())
            .field("target_offset", &self.target_offset)
            .field("target_scale", &self.target_scale)
            .field("iterations", &self.iterations)
            .field("mean_square_error", &self.mean_square_error)
            .field("status", &self.status())
            .finish()
    }
}

impl<'a> IcpSolver<'a> {
    /// Creates an uninitialised solver.
    pub fn new(config: IcpConfig) -> Self {
        Self {
            config,
            pca: PcaSolver::default(),
            point_solver: PointSetTransformSolver::new(config.scale_mode),
            finder: None,
            points: Vec::new(),
            closest: Vec::new(),
            target_offset: Pose::IDENTITY,
            target_scale: Vec3::ONE,
            iterations: 0,
            mean_square_error: 0.0,
            local_optimum: false,
        }
    }

    /// The solver parameters.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Starts a new registration of `points` against the geometry behind `finder`.
    ///
    /// The initial guess aligns the principal axes of `points` with the shape's
    /// principal pose `shape_pose`. Unless the scale mode is fixed, the initial scale is
    /// the mean ratio of the input moments to `shape_moments`.
    pub fn init(
        &mut self,
        points: &[Vec3],
        finder: Box<dyn ClosestPointFinder + 'a>,
        shape_pose: Pose,
        shape_moments: Vec3,
    ) {
        self.finder = Some(finder);
        self.points.clear();
        self.points.extend_from_slice(points);
        self.closest.clear();
        self.closest.resize(points.len(), Vec3::ZERO);
        self.iterations = 0;
        self.mean_square_error = 0.0;
        self.local_optimum = false;

        let input = self.pca.solve_or_default(points);
        let scale = match self.config.scale_mode {
            ScaleMode::Fixed => 1.0,
            ScaleMode::Uniform | ScaleMode::NonUniform => {
                initial_scale(input.moments, shape_moments)
            }
        };

        // shape principal frame onto input principal frame
        let rotation = input.pose.rotation * shape_pose.rotation.inverse();
        let position = input.pose.position - rotation * (shape_pose.position * scale);
        self.target_offset = Pose::new(position, rotation);
        self.target_scale = Vec3::splat(scale);

        let offset = self.target_offset;
        for p in &mut self.points {
            *p = offset.inverse_transform_point(*p) / scale;
        }

        log::debug!(
            "ICP init: {} points, initial scale {scale}, offset {:?}",
            points.len(),
            self.target_offset
        );
    }

    /// Starts a new registration of `points` against `shape`.
    pub fn init_with_shape<S: Shape + ?Sized>(&mut self, points: &[Vec3], shape: &'a S) {
        self.init(
            points,
            shape.closest_point_finder(),
            shape.principal_components_transform(),
            shape.principal_components_moments(),
        );
    }

    /// Performs one closest-point and alignment step.
    ///
    /// Returns whether a local optimum has been found.
    pub fn solve_step(&mut self) -> Result<bool, IcpError> {
        let finder = self.finder.as_ref().ok_or(IcpError::NotInitialized)?;
        if self.points.is_empty() {
            return Ok(self.local_optimum);
        }
        let now = std::time::Instant::now();

        finder.find_closest_points(&self.points, &mut self.closest)?;

        // increment maps the matched shape points onto the working points
        let increment = self.point_solver.solve(&self.points, &self.closest, None)?;
        for p in &mut self.points {
            *p = increment.inverse_transform_point(*p);
        }
        self.target_offset = self.target_offset
            * Pose::new(self.target_scale * increment.translation, increment.rotation);
        self.target_scale *= increment.scale;

        let previous = self.mean_square_error;
        self.mean_square_error = mean_square_error(&self.points, &self.closest);

        let threshold_sq = self.config.convergence_threshold * self.config.convergence_threshold;
        self.local_optimum =
            self.iterations > 1 && previous - self.mean_square_error <= threshold_sq;
        self.iterations += 1;

        log::debug!(
            "ICP iteration {}: correspondences {}, mse {:e}, elapsed {:?}",
            self.iterations,
            self.points.len(),
            self.mean_square_error,
            now.elapsed()
        );

        Ok(self.local_optimum)
    }

    /// Steps until a local optimum is found or the iteration cap is reached.
    pub fn solve(&mut self) -> Result<IcpStatus, IcpError> {
        self.solve_with_budget(usize::MAX)
    }

    /// Performs at most `max_steps` steps, stopping early at convergence or at the
    /// iteration cap. Intended to be called once per host frame.
    pub fn solve_with_budget(&mut self, max_steps: usize) -> Result<IcpStatus, IcpError> {
        if self.finder.is_none() {
            return Err(IcpError::NotInitialized);
        }
        let mut budget = max_steps;
        while budget > 0 && self.status() == IcpStatus::Iterating {
            self.solve_step()?;
            budget -= 1;
        }

        let status = self.status();
        match status {
            IcpStatus::Converged => log::debug!(
                "ICP converged after {} iterations with mse {:e}",
                self.iterations,
                self.mean_square_error
            ),
            IcpStatus::IterationCapReached => log::debug!(
                "ICP reached the iteration cap of {} with mse {:e}",
                self.config.max_iterations,
                self.mean_square_error
            ),
            IcpStatus::Uninitialized | IcpStatus::Iterating => {}
        }
        Ok(status)
    }

    /// Iterator performing one step per item until convergence or the iteration cap.
    pub fn steps(&mut self) -> IcpSteps<'_, 'a> {
        IcpSteps {
            solver: self,
            failed: false,
        }
    }

    /// Current state of the solver.
    pub fn status(&self) -> IcpStatus {
        if self.finder.is_none() {
            IcpStatus::Uninitialized
        } else if self.local_optimum || self.points.is_empty() {
            IcpStatus::Converged
        } else if self.iterations >= self.config.max_iterations {
            IcpStatus::IterationCapReached
        } else {
            IcpStatus::Iterating
        }
    }

    /// Snapshot of the current estimate.
    pub fn current_step(&self) -> IcpStep {
        IcpStep {
            iteration: self.iterations,
            mean_square_error: self.mean_square_error,
            target_offset: self.target_offset,
            target_scale: self.target_scale,
        }
    }

    /// The working points, expressed in the shape frame.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Shape points matched to the working points in the last step.
    pub fn closest_points(&self) -> &[Vec3] {
        &self.closest
    }

    /// Pose mapping the scaled shape into the input frame.
    pub fn target_offset(&self) -> Pose {
        self.target_offset
    }

    /// Scale applied to the shape before [`Self::target_offset`].
    pub fn target_scale(&self) -> Vec3 {
        self.target_scale
    }

    /// Mean squared error after the last step, zero before the first one.
    pub fn mean_square_error(&self) -> f32 {
        self.mean_square_error
    }

    /// Number of steps performed since the last initialisation.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the error stopped decreasing.
    pub fn has_found_local_optimum(&self) -> bool {
        self.local_optimum
    }
}

/// Iterator returned by [`IcpSolver::steps`].
pub struct IcpSteps<'s, 'a> {
    solver: &'s mut IcpSolver<'a>,
    failed: bool,
}

impl Iterator for IcpSteps<'_, '_> {
    type Item = Result<IcpStep, IcpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.solver.status() {
            IcpStatus::Uninitialized => Err(IcpError::NotInitialized),
            IcpStatus::Iterating => self.solver.solve_step().map(|_| self.solver.current_step()),
            IcpStatus::Converged | IcpStatus::IterationCapReached => return None,
        };
        // stop after the first error
        self.failed = result.is_err();
        Some(result)
    }
}

/// Mean ratio of input to shape moments over the axes where both are non-degenerate.
///
/// Falls back to one when no axis qualifies, e.g. for a single point or coincident points.
fn initial_scale(input_moments: Vec3, shape_moments: Vec3) -> f32 {
    let shape_limit = DEGENERATE_MOMENT * shape_moments.max_element();
    let input_limit = DEGENERATE_MOMENT * input_moments.max_element();
    let ratios: Vec<f32> = input_moments
        .to_array()
        .iter()
        .zip(shape_moments.to_array())
        .filter(|(input, shape)| {
            *shape > shape_limit && *shape > 0.0 && **input > input_limit && **input > 0.0
        })
        .map(|(input, shape)| input / shape)
        .collect();

    if ratios.is_empty() {
        return 1.0;
    }
    let scale = ratios.iter().sum::<f32>() / ratios.len() as f32;
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        log::warn!("degenerate initial scale {scale}, using 1");
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_shape::LineShape;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn test_uninitialized() {
        let mut solver = IcpSolver::default();
        assert_eq!(solver.status(), IcpStatus::Uninitialized);
        assert!(matches!(solver.solve_step(), Err(IcpError::NotInitialized)));
        assert!(matches!(solver.solve(), Err(IcpError::NotInitialized)));
    }

    #[test]
    fn test_empty_input_is_noop() -> Result<(), IcpError> {
        let shape = LineShape::circle(1.0, 8);
        let mut solver = IcpSolver::default();
        solver.init_with_shape(&[], &shape);
        assert_eq!(solver.solve()?, IcpStatus::Converged);
        assert_eq!(solver.iterations(), 0);
        assert_eq!(solver.mean_square_error(), 0.0);
        Ok(())
    }

    #[test]
    fn test_empty_shape_reports_error() {
        let shape = LineShape::new();
        let mut solver = IcpSolver::default();
        solver.init_with_shape(&[Vec3::ZERO, Vec3::X, Vec3::Y], &shape);
        assert!(matches!(
            solver.solve_step(),
            Err(IcpError::Shape(ShapeError::EmptyShape))
        ));
    }

    #[test]
    fn test_rigid_rectangle_alignment() -> Result<(), IcpError> {
        let shape = LineShape::rectangle(2.0, 1.0);
        let transform = Pose::new(Vec3::new(0.3, -0.2, 0.5), Quat::from_rotation_z(0.3));
        let mut samples = crate::shape::SampleBuffer::new();
        shape.generate_samples(0.1, &mut samples);
        samples.transform(&transform);

        let mut solver = IcpSolver::default();
        solver.init_with_shape(&samples.samples, &shape);
        let status = solver.solve()?;
        assert_eq!(status, IcpStatus::Converged);
        assert!(solver.mean_square_error() < 1e-6);

        let offset = solver.target_offset();
        assert_relative_eq!(offset.position.x, 0.3, epsilon = 1e-3);
        assert_relative_eq!(offset.position.y, -0.2, epsilon = 1e-3);
        assert_relative_eq!(offset.position.z, 0.5, epsilon = 1e-3);
        assert_eq!(solver.target_scale(), Vec3::ONE);
        Ok(())
    }

    #[test]
    fn test_budget_and_steps() -> Result<(), IcpError> {
        let shape = LineShape::rectangle(2.0, 1.0);
        let transform = Pose::new(Vec3::new(0.1, 0.1, 0.0), Quat::from_rotation_z(0.2));
        let points: Vec<Vec3> = shape
            .segments()
            .iter()
            .map(|s| transform.transform_point(s.start.lerp(s.end, 0.3)))
            .collect();

        let mut solver = IcpSolver::default();
        solver.init_with_shape(&points, &shape);
        assert_eq!(solver.solve_with_budget(1)?, IcpStatus::Iterating);
        assert_eq!(solver.iterations(), 1);

        let mut last = 1;
        for step in solver.steps() {
            let step = step?;
            assert_eq!(step.iteration, last + 1);
            last = step.iteration;
        }
        assert_ne!(solver.status(), IcpStatus::Iterating);
        assert!(solver.iterations() <= solver.config().max_iterations);
        Ok(())
    }

    #[test]
    fn test_iteration_cap() -> Result<(), IcpError> {
        let shape = LineShape::circle(1.0, 12);
        let points = [Vec3::new(0.5, 0.1, 0.0), Vec3::new(-0.3, 0.9, 0.2), Vec3::Z];
        let mut solver = IcpSolver::new(IcpConfig {
            max_iterations: 2,
            convergence_threshold: 0.0,
            scale_mode: ScaleMode::Fixed,
        });
        solver.init_with_shape(&points, &shape);
        let status = solver.solve()?;
        assert!(matches!(
            status,
            IcpStatus::IterationCapReached | IcpStatus::Converged
        ));
        assert!(solver.iterations() <= 2);
        Ok(())
    }

    #[test]
    fn test_initial_scale() {
        assert_relative_eq!(
            initial_scale(Vec3::new(2.0, 1.0, 0.001), Vec3::new(1.0, 0.5, 0.0)),
            2.0
        );
        assert_eq!(initial_scale(Vec3::ONE, Vec3::ZERO), 1.0);
        // a single point or coincident points have no spread
        assert_eq!(initial_scale(Vec3::ZERO, Vec3::new(0.2, 0.1, 0.0)), 1.0);
        assert_eq!(initial_scale(Vec3::ZERO, Vec3::ZERO), 1.0);
    }

    #[test]
    fn test_degenerate_input_with_scale_estimation() -> Result<(), IcpError> {
        let shape = LineShape::circle(0.2, 16);
        let single = [Vec3::new(0.1, 0.2, 0.0)];
        let coincident = [Vec3::ONE; 4];

        for mode in [ScaleMode::Uniform, ScaleMode::NonUniform] {
            for points in [&single[..], &coincident[..]] {
                let mut solver = IcpSolver::new(IcpConfig {
                    scale_mode: mode,
                    ..Default::default()
                });
                solver.init_with_shape(points, &shape);
                solver.solve()?;

                assert!(solver.mean_square_error().is_finite());
                assert!(solver.mean_square_error() < 1e-8);
                assert!(solver.target_offset().position.is_finite());
                assert!(solver.target_offset().rotation.is_finite());
                assert!(solver.target_scale().is_finite());
                assert!(solver.target_scale().min_element() > 0.0);
                assert!(solver.points().iter().all(|p| p.is_finite()));
            }
        }
        Ok(())
    }

    #[test]
    fn test_non_uniform_axis_scale() -> Result<(), IcpError> {
        let shape = LineShape::rectangle(2.0, 1.0);
        let mut samples = crate::shape::SampleBuffer::new();
        shape.generate_samples(0.05, &mut samples);
        let expected = Vec3::new(1.5, 1.0, 1.0);
        samples.transform_scaled(&Pose::IDENTITY, expected);

        let mut solver = IcpSolver::new(IcpConfig {
            max_iterations: 100,
            convergence_threshold: 1e-4,
            scale_mode: ScaleMode::NonUniform,
        });
        solver.init_with_shape(&samples.samples, &shape);
        solver.solve()?;

        assert!(solver.mean_square_error() < 1e-4);
        let scale = solver.target_scale();
        assert!(scale.x > scale.y);
        assert_relative_eq!(scale.x, expected.x, epsilon = 0.05);
        assert_relative_eq!(scale.y, expected.y, epsilon = 0.05);
        assert_relative_eq!(solver.target_offset().position.length(), 0.0, epsilon = 0.01);
        Ok(())
    }
}
