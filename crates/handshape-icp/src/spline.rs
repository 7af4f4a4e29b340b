use std::ops::Range;

use glam::Vec3;
use handshape_linalg::Pose;

use crate::{
    line_shape::compute_principal_components,
    pca::PcaResult,
    shape::{sample_steps, ClosestPointFinder, SampleBuffer, Segment, SegmentFinder, Shape},
};

/// A recorded point of a [`SplineCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Position of the point.
    pub position: Vec3,
    /// Time the point was recorded, in seconds.
    pub timestamp: f32,
    segment_start: f32,
    segment_length: f32,
}

impl ControlPoint {
    /// Arc length from the first control point to this one.
    pub fn segment_start(&self) -> f32 {
        self.segment_start
    }

    /// Distance to the next control point, zero for the last one.
    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }
}

/// A polyline through time-stamped control points, typically a traced gesture.
///
/// Arc lengths, segments and principal components are rebuilt after every mutation.
#[derive(Debug, Clone, Default)]
pub struct SplineCurve {
    points: Vec<ControlPoint>,
    segments: Vec<Segment>,
    arc_length: f32,
    principal: PcaResult,
}

impl SplineCurve {
    /// Creates an empty curve.
    pub fn new() -> Self {
        Self::default()
    }

    /// The control points in recording order.
    pub fn control_points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// Number of control points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the curve has no control points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total length of the polyline.
    pub fn arc_length(&self) -> f32 {
        self.arc_length
    }

    /// Appends a control point recorded at `timestamp`.
    pub fn append(&mut self, position: Vec3, timestamp: f32) {
        self.points.push(ControlPoint {
            position,
            timestamp,
            segment_start: 0.0,
            segment_length: 0.0,
        });
        self.update();
    }

    /// Removes the control points in `range`, clamped to the curve.
    pub fn remove_range(&mut self, range: Range<usize>) {
        let end = range.end.min(self.points.len());
        let start = range.start.min(end);
        if start < end {
            self.points.drain(start..end);
            self.update();
        }
    }

    /// Removes every control point matching `pred` and returns how many were removed.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&ControlPoint) -> bool) -> usize {
        let before = self.points.len();
        self.points.retain(|p| !pred(p));
        let removed = before - self.points.len();
        if removed > 0 {
            self.update();
        }
        removed
    }

    /// Keeps only the most recent `max_count` control points.
    pub fn truncate_front(&mut self, max_count: usize) {
        let excess = self.points.len().saturating_sub(max_count);
        self.remove_range(0..excess);
    }

    /// Drops points older than `max_age` or farther than `max_length` of arc from the
    /// newest point. Returns the number of removed points.
    pub fn prune(&mut self, now: f32, max_length: f32, max_age: f32) -> usize {
        let total = self.arc_length;
        let removed = self.remove_where(|p| {
            now - p.timestamp > max_age || total - p.segment_start > max_length
        });
        if removed > 0 {
            log::trace!("pruned {removed} control points, {} left", self.points.len());
        }
        removed
    }

    /// Removes every control point.
    pub fn clear(&mut self) {
        self.points.clear();
        self.update();
    }

    /// Index of the control point whose segment contains `arc`.
    ///
    /// `None` for an empty curve or a negative arc length.
    pub fn find_control_point(&self, arc: f32) -> Option<usize> {
        // first index whose segment starts after `arc`
        let upper = self.points.partition_point(|p| p.segment_start <= arc);
        upper.checked_sub(1)
    }

    /// Position at arc length `arc`, clamped to the ends of the curve.
    pub fn point_at(&self, arc: f32) -> Option<Vec3> {
        let arc = arc.clamp(0.0, self.arc_length);
        let index = self.find_control_point(arc)?;
        let cp = self.points.get(index)?;
        match self.points.get(index + 1) {
            Some(next) if cp.segment_length > 0.0 => {
                let t = ((arc - cp.segment_start) / cp.segment_length).clamp(0.0, 1.0);
                Some(cp.position.lerp(next.position, t))
            }
            _ => Some(cp.position),
        }
    }

    fn update(&mut self) {
        let mut distance = 0.0;
        for i in 0..self.points.len() {
            let length = match self.points.get(i + 1) {
                Some(next) => self.points[i].position.distance(next.position),
                None => 0.0,
            };
            let cp = &mut self.points[i];
            cp.segment_start = distance;
            cp.segment_length = length;
            distance += length;
        }
        self.arc_length = distance;

        self.segments = match self.points.as_slice() {
            [] => Vec::new(),
            [single] => vec![Segment::new(single.position, single.position)],
            points => points
                .windows(2)
                .map(|w| Segment::new(w[0].position, w[1].position))
                .collect(),
        };
        self.principal = compute_principal_components(&self.segments);
    }
}

impl Shape for SplineCurve {
    fn closest_point_finder(&self) -> Box<dyn ClosestPointFinder + '_> {
        Box::new(SegmentFinder::new(&self.segments))
    }

    fn generate_samples(&self, max_distance: f32, buffer: &mut SampleBuffer) {
        buffer.clear();
        match self.points.as_slice() {
            [] => {}
            [single] => buffer.samples.push(single.position),
            _ => {
                let count = (sample_steps(self.arc_length, max_distance) + 1).max(2);
                let spacing = self.arc_length / (count - 1) as f32;
                buffer
                    .samples
                    .extend((0..count).filter_map(|i| self.point_at(spacing * i as f32)));
            }
        }
    }

    fn principal_components_transform(&self) -> Pose {
        self.principal.pose
    }

    fn principal_components_moments(&self) -> Vec3 {
        self.principal.moments
    }
}
