//! Scalar and vector primitives shared by the solvers.

use glam::{Mat3, Quat, Vec3};

/// tan²(π/8) reciprocal: rotations steeper than π/8 fall back to the fixed angle.
const GAMMA: f32 = 5.828_427_3;
/// cos(π/8)
const CSTAR: f32 = 0.923_879_5;
/// sin(π/8)
const SSTAR: f32 = 0.382_683_43;

/// Squared lengths below this are treated as zero.
pub const EPSILON_SQ: f32 = 1e-12;

/// Half-angle parameters of an (unnormalised) Givens quaternion.
///
/// The quaternion rotating about the remaining axis is `(axis * sh, ch)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Givens {
    /// Cosine-like component of the half angle.
    pub ch: f32,
    /// Sine-like component of the half angle.
    pub sh: f32,
}

impl Givens {
    /// Cosine and sine of the full rotation angle, normalised so that `c² + s² = 1`.
    #[inline]
    pub fn rotation(&self) -> (f32, f32) {
        let ch2 = self.ch * self.ch;
        let sh2 = self.sh * self.sh;
        let scale = 1.0 / (ch2 + sh2);
        ((ch2 - sh2) * scale, 2.0 * self.sh * self.ch * scale)
    }
}

/// Fast approximate reciprocal square root.
///
/// Bit-level initial guess followed by a single Newton step. The relative error stays
/// below 1% across `[1e-12, 1e12]`.
#[inline]
pub fn rsqrt(x: f32) -> f32 {
    let i = 0x5f37_5a86_u32.wrapping_sub(x.to_bits() >> 1);
    let y = f32::from_bits(i);
    y * (1.5 - 0.5 * x * y * y)
}

/// Approximate Givens rotation that reduces the off-diagonal entry of the symmetric
/// 2x2 block `[[a_pp, a_pq], [a_pq, a_qq]]`.
///
/// Follows Algorithm 2 of McAdams et al., "Computing the Singular Value Decomposition
/// of 3x3 matrices with minimal branching and elementary floating point operations"
/// (UW-Madison TR1690, 2011). No trigonometric functions are evaluated: when the
/// exact angle would exceed π/8 the fixed π/8 half angle is used instead.
#[inline]
pub fn approximate_givens(a_pp: f32, a_pq: f32, a_qq: f32) -> Givens {
    let ch = 2.0 * (a_pp - a_qq);
    let sh = a_pq;
    let ch2 = ch * ch;
    let sh2 = sh * sh;
    if GAMMA * sh2 < ch2 {
        let w = rsqrt(ch2 + sh2);
        Givens {
            ch: w * ch,
            sh: w * sh,
        }
    } else {
        Givens {
            ch: CSTAR,
            sh: SSTAR,
        }
    }
}

/// Closest point to `point` on the segment `[start, end]`.
///
/// Returns the point together with the segment parameter `lambda` clamped to `[0, 1]`.
/// A zero-length segment yields `start`.
#[inline]
pub fn closest_point_on_segment(point: Vec3, start: Vec3, end: Vec3) -> (Vec3, f32) {
    let dir = end - start;
    let len_sq = dir.length_squared();
    if len_sq <= 0.0 {
        return (start, 0.0);
    }
    let lambda = (dir.dot(point - start) / len_sq).clamp(0.0, 1.0);
    (start + dir * lambda, lambda)
}

/// Outer product `a * bᵀ`.
#[inline]
pub fn outer_product(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Arithmetic mean of the points, zero for an empty slice.
pub fn centroid(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    points.iter().fold(Vec3::ZERO, |acc, &p| acc + p) / points.len() as f32
}

/// Weighted mean of the points.
///
/// Falls back to the plain centroid when no weights are given or they sum to zero.
///
/// PRECONDITION: `weights` has the same length as `points`.
pub fn weighted_centroid(points: &[Vec3], weights: Option<&[f32]>) -> Vec3 {
    let Some(weights) = weights else {
        return centroid(points);
    };
    let total: f32 = weights.iter().sum();
    if total <= 0.0 {
        return centroid(points);
    }
    points
        .iter()
        .zip(weights)
        .fold(Vec3::ZERO, |acc, (&p, &w)| acc + p * w)
        / total
}

/// Mean squared distance between corresponding points, zero for empty input.
///
/// PRECONDITION: both slices have the same length.
pub fn mean_square_error(a: &[Vec3], b: &[Vec3]) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(p, q)| p.distance_squared(*q))
        .sum();
    sum / a.len() as f32
}

/// Shortest-arc rotation taking the direction of `from` onto the direction of `to`.
///
/// Zero-length inputs give the identity; opposite directions give a half turn about an
/// axis orthogonal to `from`.
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let (Some(from), Some(to)) = (from.try_normalize(), to.try_normalize()) else {
        return Quat::IDENTITY;
    };
    Quat::from_rotation_arc(from, to)
}

/// Component-wise `num / den`, substituting `fallback` where `|den|` is negligible.
pub fn safe_ratio(num: Vec3, den: Vec3, fallback: f32) -> Vec3 {
    let div = |n: f32, d: f32| {
        if d.abs() * d.abs() > EPSILON_SQ {
            n / d
        } else {
            fallback
        }
    };
    Vec3::new(div(num.x, den.x), div(num.y, den.y), div(num.z, den.z))
}
