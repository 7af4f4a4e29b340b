use std::f32::consts::TAU;

use glam::Vec3;
use handshape_linalg::{symmetric::SymmetricMatrix3, Pose};

use crate::{
    pca::{principal_axes, PcaResult, PcaSolver},
    shape::{sample_count, ClosestPointFinder, SampleBuffer, Segment, SegmentFinder, Shape},
};

/// A shape made of straight line segments, open or closed.
///
/// Principal components are recomputed whenever segments are added or removed.
#[derive(Debug, Clone, Default)]
pub struct LineShape {
    segments: Vec<Segment>,
    principal: PcaResult,
}

impl LineShape {
    /// Creates an empty shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shape from a list of segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut shape = Self {
            segments,
            principal: PcaResult::default(),
        };
        shape.update();
        shape
    }

    /// Closed polygon with `num_points` vertices on a circle in the xy plane.
    pub fn circle(radius: f32, num_points: usize) -> Self {
        let points = (0..num_points).map(|i| {
            let angle = TAU * i as f32 / num_points as f32;
            Vec3::new(angle.cos(), angle.sin(), 0.0) * radius
        });
        let mut shape = Self::new();
        shape.add_closed(points);
        shape
    }

    /// Closed axis-aligned rectangle centred at the origin in the xy plane.
    pub fn rectangle(width: f32, height: f32) -> Self {
        let (w, h) = (width * 0.5, height * 0.5);
        let mut shape = Self::new();
        shape.add_closed([
            Vec3::new(-w, -h, 0.0),
            Vec3::new(w, -h, 0.0),
            Vec3::new(w, h, 0.0),
            Vec3::new(-w, h, 0.0),
        ]);
        shape
    }

    /// Open arrow head pointing along +x.
    pub fn arrow(length: f32, width: f32) -> Self {
        let (l, w) = (length * 0.5, width * 0.5);
        let mut shape = Self::new();
        shape.add_open([
            Vec3::new(-l, w, 0.0),
            Vec3::new(l, 0.0, 0.0),
            Vec3::new(-l, -w, 0.0),
        ]);
        shape
    }

    /// Closed triangle through three points.
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let mut shape = Self::new();
        shape.add_closed([a, b, c]);
        shape
    }

    /// The segments of the shape.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the shape has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of the segment lengths.
    pub fn total_length(&self) -> f32 {
        self.segments.iter().map(Segment::length).sum()
    }

    /// Appends segments.
    pub fn add_segments(&mut self, segments: impl IntoIterator<Item = Segment>) {
        self.segments.extend(segments);
        self.update();
    }

    /// Appends a polyline through `points`.
    pub fn add_open(&mut self, points: impl IntoIterator<Item = Vec3>) {
        let mut iter = points.into_iter();
        if let Some(mut prev) = iter.next() {
            for point in iter {
                self.segments.push(Segment::new(prev, point));
                prev = point;
            }
        }
        self.update();
    }

    /// Appends a closed polygon through `points`.
    pub fn add_closed(&mut self, points: impl IntoIterator<Item = Vec3>) {
        let mut iter = points.into_iter();
        if let Some(first) = iter.next() {
            let mut prev = first;
            for point in iter {
                self.segments.push(Segment::new(prev, point));
                prev = point;
            }
            self.segments.push(Segment::new(prev, first));
        }
        self.update();
    }

    /// Keeps the first `len` segments.
    pub fn truncate(&mut self, len: usize) {
        if len < self.segments.len() {
            self.segments.truncate(len);
            self.update();
        }
    }

    /// Removes every segment.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.update();
    }

    /// A copy with every vertex scaled per axis and then mapped through `pose`.
    pub fn transformed(&self, pose: &Pose, scale: Vec3) -> Self {
        let map = |p: Vec3| pose.transform_point(scale * p);
        Self::from_segments(
            self.segments
                .iter()
                .map(|s| Segment::new(map(s.start), map(s.end)))
                .collect(),
        )
    }

    fn update(&mut self) {
        self.principal = compute_principal_components(&self.segments);
    }
}

/// Principal components of the uniform distribution along the segments.
pub(crate) fn compute_principal_components(segments: &[Segment]) -> PcaResult {
    if segments.is_empty() {
        return PcaResult::default();
    }

    let total_length: f32 = segments.iter().map(Segment::length).sum();
    if total_length <= 0.0 {
        // only degenerate segments, use the vertex centroid
        let sum = segments
            .iter()
            .fold(Vec3::ZERO, |acc, s| acc + s.start + s.end);
        return PcaResult {
            pose: Pose::from_position(sum / (2 * segments.len()) as f32),
            moments: Vec3::ZERO,
        };
    }

    let mean = segments
        .iter()
        .fold(Vec3::ZERO, |acc, s| acc + (s.start + s.end) * 0.5 * s.length())
        / total_length;

    let second_moment = segments.iter().fold(SymmetricMatrix3::ZERO, |acc, s| {
        let center = (s.start + s.end) * 0.5 - mean;
        let half = (s.end - s.start) * 0.5;
        let spread = SymmetricMatrix3::from_outer_product(center)
            + SymmetricMatrix3::from_outer_product(half).scale(1.0 / 3.0);
        acc + spread.scale(s.length())
    });
    let covariance = second_moment.scale(1.0 / total_length);

    let (rotation, moments) = principal_axes(&covariance, PcaSolver::default().params());
    PcaResult {
        pose: Pose::new(mean, rotation),
        moments,
    }
}

impl Shape for LineShape {
    fn closest_point_finder(&self) -> Box<dyn ClosestPointFinder + '_> {
        Box::new(SegmentFinder::new(&self.segments))
    }

    fn generate_samples(&self, max_distance: f32, buffer: &mut SampleBuffer) {
        buffer.clear();
        for segment in &self.segments {
            let count = sample_count(segment.length(), max_distance);
            buffer.push_segment(segment.start, segment.end, count);
        }
    }

    fn principal_components_transform(&self) -> Pose {
        self.principal.pose
    }

    fn principal_components_moments(&self) -> Vec3 {
        self.principal.moments
    }
}
