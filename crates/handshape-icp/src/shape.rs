use glam::Vec3;
use handshape_linalg::{math::closest_point_on_segment, Pose};
use rayon::prelude::*;
use thiserror::Error;

/// Error type for shape queries.
#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    /// The shape has no segments to project onto.
    #[error("shape has no segments")]
    EmptyShape,

    /// The output buffer must have one slot per query point.
    #[error("{points} query points but {result} result slots")]
    MismatchedBuffers {
        /// Number of query points.
        points: usize,
        /// Length of the result buffer.
        result: usize,
    },
}

/// A straight line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// First end point.
    pub start: Vec3,
    /// Second end point.
    pub end: Vec3,
}

impl Segment {
    /// Creates a segment.
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    /// Euclidean length.
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    /// Point at parameter `t` in `[0, 1]`.
    pub fn lerp(&self, t: f32) -> Vec3 {
        self.start.lerp(self.end, t)
    }

    /// Closest point on the segment and its squared distance to `point`.
    #[inline]
    pub fn closest_point(&self, point: Vec3) -> (Vec3, f32) {
        let (closest, _) = closest_point_on_segment(point, self.start, self.end);
        (closest, closest.distance_squared(point))
    }
}

/// Nearest-point queries against a fixed geometry.
pub trait ClosestPointFinder: Send + Sync {
    /// Writes into `result[i]` the point of the geometry nearest to `points[i]`.
    fn find_closest_points(&self, points: &[Vec3], result: &mut [Vec3])
        -> Result<(), ShapeError>;
}

/// Closest-point finder over a borrowed list of segments.
///
/// Every query scans all segments; among equally near segments the first one wins.
/// Queries run in parallel and each one writes only its own slot.
#[derive(Debug, Clone, Copy)]
pub struct SegmentFinder<'a> {
    segments: &'a [Segment],
}

impl<'a> SegmentFinder<'a> {
    /// Creates a finder over `segments`.
    pub fn new(segments: &'a [Segment]) -> Self {
        Self { segments }
    }

    /// Nearest point to a single query, `None` when there are no segments.
    pub fn closest_point(&self, point: Vec3) -> Option<Vec3> {
        let mut best: Option<(Vec3, f32)> = None;
        for segment in self.segments {
            let (candidate, dist_sq) = segment.closest_point(point);
            match best {
                Some((_, best_dist)) if dist_sq >= best_dist => {}
                _ => best = Some((candidate, dist_sq)),
            }
        }
        best.map(|(p, _)| p)
    }
}

impl ClosestPointFinder for SegmentFinder<'_> {
    fn find_closest_points(
        &self,
        points: &[Vec3],
        result: &mut [Vec3],
    ) -> Result<(), ShapeError> {
        if points.len() != result.len() {
            return Err(ShapeError::MismatchedBuffers {
                points: points.len(),
                result: result.len(),
            });
        }
        if self.segments.is_empty() {
            return Err(ShapeError::EmptyShape);
        }

        result
            .par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(out, &point)| {
                if let Some(closest) = self.closest_point(point) {
                    *out = closest;
                }
            });

        Ok(())
    }
}

/// Evenly spaced points along a shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    /// The sample positions.
    pub samples: Vec<Vec3>,
}

impl SampleBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Removes all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Appends `count >= 2` evenly spaced samples from `start` to `end`, both included.
    pub fn push_segment(&mut self, start: Vec3, end: Vec3, count: usize) {
        let count = count.max(2);
        let denom = (count - 1) as f32;
        self.samples
            .extend((0..count).map(|i| start.lerp(end, i as f32 / denom)));
    }

    /// Maps every sample through `pose`.
    pub fn transform(&mut self, pose: &Pose) {
        for sample in &mut self.samples {
            *sample = pose.transform_point(*sample);
        }
    }

    /// Scales every sample per axis, then maps it through `pose`.
    pub fn transform_scaled(&mut self, pose: &Pose, scale: Vec3) {
        for sample in &mut self.samples {
            *sample = pose.transform_point(scale * *sample);
        }
    }
}

/// A target geometry for ICP registration.
pub trait Shape {
    /// A closest-point finder bound to the current geometry.
    fn closest_point_finder(&self) -> Box<dyn ClosestPointFinder + '_>;

    /// Fills `buffer` with samples spaced at most `max_distance` apart along the shape.
    fn generate_samples(&self, max_distance: f32, buffer: &mut SampleBuffer);

    /// Centroid and principal orientation of the geometry.
    fn principal_components_transform(&self) -> Pose;

    /// Standard deviation along each principal axis.
    fn principal_components_moments(&self) -> Vec3;
}

/// Upper bound on the number of samples generated along one segment or curve.
pub const MAX_SAMPLES: usize = 1 << 16;

/// Number of `max_distance` steps needed to cover `length`, capped so that
/// `MAX_SAMPLES` samples are never exceeded.
pub(crate) fn sample_steps(length: f32, max_distance: f32) -> usize {
    if max_distance.is_nan() || max_distance <= 0.0 || !length.is_finite() {
        return 1;
    }
    let steps = (length / max_distance).ceil();
    if steps < (MAX_SAMPLES - 1) as f32 {
        steps as usize
    } else {
        log::warn!(
            "sample spacing {max_distance} too small for length {length}, capping at {MAX_SAMPLES} samples"
        );
        MAX_SAMPLES - 1
    }
}

/// Number of samples needed to keep neighbours at most `max_distance` apart on `length`.
pub(crate) fn sample_count(length: f32, max_distance: f32) -> usize {
    sample_steps(length, max_distance).max(2)
}
