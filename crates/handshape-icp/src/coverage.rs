use glam::Vec3;
use handshape_linalg::{math::mean_square_error, Pose};

use crate::shape::{SampleBuffer, Shape, ShapeError};

/// Mean squared distance from the samples of `shape`, mapped into the curve frame by
/// `offset` and `scale`, to the nearest points of `curve`.
///
/// An ICP match only guarantees that the traced curve lies on the shape. This checks the
/// converse: that the whole shape is explained by the curve, not just one part of it.
/// Returns zero when `shape` produces no samples.
///
/// # Errors
///
/// Returns [`ShapeError::EmptyShape`] if `curve` has no segments.
pub fn coverage_error(
    shape: &dyn Shape,
    curve: &dyn Shape,
    offset: &Pose,
    scale: Vec3,
    max_distance: f32,
) -> Result<f32, ShapeError> {
    let mut samples = SampleBuffer::new();
    shape.generate_samples(max_distance, &mut samples);
    if samples.is_empty() {
        return Ok(0.0);
    }
    samples.transform_scaled(offset, scale);

    let mut closest = vec![Vec3::ZERO; samples.len()];
    curve
        .closest_point_finder()
        .find_closest_points(&samples.samples, &mut closest)?;

    Ok(mean_square_error(&samples.samples, &closest))
}
