//! Fast 3×3 Singular Value Decomposition.
//!
//! For any matrix A ∈ ℝ³ˣ³ the decomposition is
//!
//! ```text
//! A = U Σ Vᵀ
//! ```
//!
//! with U, V orthogonal and Σ = diag(σ₁ ≥ σ₂ ≥ σ₃ ≥ 0).
//!
//! V is obtained from the Jacobi eigen-decomposition of AᵀA, the columns of B = A·V are
//! sorted by length, and U follows from a Givens QR factorisation of B.
//!
//! # Example
//!
//! ```
//! use glam::{Mat3, Vec3};
//! use handshape_linalg::svd::svd3;
//!
//! let matrix = Mat3::from_diagonal(Vec3::new(1.0, 2.0, 3.0));
//! let svd = svd3(&matrix);
//! assert!((svd.s() - Vec3::new(3.0, 2.0, 1.0)).abs().max_element() < 1e-5);
//! ```
//!
//! # References
//!
//! * McAdams, Selle, Tamstorf, Teran, and Sifakis (2011).
//!   "Computing the Singular Value Decomposition of 3x3 matrices with minimal
//!   branching and elementary floating point operations."
//!   University of Wisconsin-Madison Technical Report TR1690.

use glam::{Mat3, Vec3};

use crate::{
    eigen::{JacobiEigenSolver, JacobiParams},
    symmetric::SymmetricMatrix3,
};

const SVD3_EPSILON: f32 = 1e-6;
/// Eight full sweeps over the three axis pairs.
const MAX_ROTATIONS: usize = 24;

#[derive(Debug)]
struct Givens {
    cos_theta: f32,
    sin_theta: f32,
}

#[derive(Debug)]
struct QR3 {
    q: Mat3,
    r: Mat3,
}

/// Result of [`svd3`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Svd3 {
    u: Mat3,
    s: Vec3,
    v: Mat3,
}

impl Svd3 {
    /// Left singular vectors, one per column.
    #[inline]
    pub fn u(&self) -> &Mat3 {
        &self.u
    }

    /// Singular values in descending order.
    #[inline]
    pub fn s(&self) -> Vec3 {
        self.s
    }

    /// Singular values as a diagonal matrix.
    #[inline]
    pub fn s_mat(&self) -> Mat3 {
        Mat3::from_diagonal(self.s)
    }

    /// Right singular vectors, one per column.
    #[inline]
    pub fn v(&self) -> &Mat3 {
        &self.v
    }

    /// Ratio of the largest to the smallest singular value.
    ///
    /// Infinite when the smallest singular value is zero (rank-deficient input).
    pub fn condition_number(&self) -> f32 {
        if self.s.z <= f32::EPSILON * self.s.x.max(f32::MIN_POSITIVE) {
            f32::INFINITY
        } else {
            self.s.x / self.s.z
        }
    }
}

/// V from the Jacobi eigen-decomposition of `AᵀA`.
fn right_singular_vectors(ata: &SymmetricMatrix3) -> Mat3 {
    // stop close to f32 resolution relative to the matrix scale
    let scale = ata.trace() * 1e-7;
    let params = JacobiParams {
        squared_error_threshold: scale * scale,
        max_iterations: MAX_ROTATIONS,
    };
    let mut solver = JacobiEigenSolver::new(params);
    solver.init(ata);
    while solver.iterations() < MAX_ROTATIONS
        && solver.residual() > params.squared_error_threshold
    {
        solver.solve_step();
    }
    Mat3::from_quat(solver.q())
}

/// Sorts the columns of `b` by decreasing length and permutes `v` alongside.
///
/// Each swap negates one column so both matrices keep their determinant sign.
fn sort_singular_values(b: &mut Mat3, v: &mut Mat3) {
    let mut rho = [
        b.x_axis.length_squared(),
        b.y_axis.length_squared(),
        b.z_axis.length_squared(),
    ];
    let mut b_cols = [b.x_axis, b.y_axis, b.z_axis];
    let mut v_cols = [v.x_axis, v.y_axis, v.z_axis];

    for (i, j) in [(0, 1), (0, 2), (1, 2)] {
        if rho[i] < rho[j] {
            rho.swap(i, j);
            b_cols.swap(i, j);
            v_cols.swap(i, j);
            b_cols[j] = -b_cols[j];
            v_cols[j] = -v_cols[j];
        }
    }

    *b = Mat3::from_cols(b_cols[0], b_cols[1], b_cols[2]);
    *v = Mat3::from_cols(v_cols[0], v_cols[1], v_cols[2]);
}

/// Givens half-angle zeroing `a2` against `a1` (Algorithm 4).
fn qr_givens_quaternion(a1: f32, a2: f32) -> Givens {
    let rho = (a1 * a1 + a2 * a2).sqrt();

    let mut g = Givens {
        cos_theta: a1.abs() + f32::max(rho, SVD3_EPSILON),
        sin_theta: if rho > SVD3_EPSILON { a2 } else { 0.0 },
    };

    if a1 < 0.0 {
        std::mem::swap(&mut g.sin_theta, &mut g.cos_theta);
    }

    let w = (g.cos_theta * g.cos_theta + g.sin_theta * g.sin_theta)
        .sqrt()
        .recip();
    g.cos_theta *= w;
    g.sin_theta *= w;
    g
}

/// Applies the row rotation `[[a, b], [-b, a]]` to rows `i` and `j` of every column.
fn rotate_rows(m: &mut Mat3, i: usize, j: usize, a: f32, b: f32) {
    for col in [&mut m.x_axis, &mut m.y_axis, &mut m.z_axis] {
        let ci = col[i];
        let cj = col[j];
        col[i] = a * ci + b * cj;
        col[j] = -b * ci + a * cj;
    }
}

/// QR decomposition of `b_mat` by three Givens rotations.
fn qr_decomposition(b_mat: &Mat3) -> QR3 {
    let mut r = *b_mat;

    // zero r[1][0]
    let g1 = qr_givens_quaternion(r.x_axis.x, r.x_axis.y);
    let a1 = -2.0 * g1.sin_theta * g1.sin_theta + 1.0;
    let b1 = 2.0 * g1.cos_theta * g1.sin_theta;
    rotate_rows(&mut r, 0, 1, a1, b1);

    // zero r[2][0]
    let g2 = qr_givens_quaternion(r.x_axis.x, r.x_axis.z);
    let a2 = -2.0 * g2.sin_theta * g2.sin_theta + 1.0;
    let b2 = 2.0 * g2.cos_theta * g2.sin_theta;
    rotate_rows(&mut r, 0, 2, a2, b2);

    // zero r[2][1]
    let g3 = qr_givens_quaternion(r.y_axis.y, r.y_axis.z);
    let a3 = -2.0 * g3.sin_theta * g3.sin_theta + 1.0;
    let b3 = 2.0 * g3.cos_theta * g3.sin_theta;
    rotate_rows(&mut r, 1, 2, a3, b3);

    let q1 = Mat3::from_cols(Vec3::new(a1, b1, 0.0), Vec3::new(-b1, a1, 0.0), Vec3::Z);
    let q2 = Mat3::from_cols(Vec3::new(a2, 0.0, b2), Vec3::Y, Vec3::new(-b2, 0.0, a2));
    let q3 = Mat3::from_cols(Vec3::X, Vec3::new(0.0, a3, b3), Vec3::new(0.0, -b3, a3));

    QR3 {
        q: q1 * q2 * q3,
        r,
    }
}

/// Singular value decomposition of a 3x3 matrix.
pub fn svd3(a: &Mat3) -> Svd3 {
    let ata = SymmetricMatrix3::from_mat3(&(a.transpose() * *a));
    let mut v = right_singular_vectors(&ata);
    let mut b = *a * v;

    sort_singular_values(&mut b, &mut v);

    let QR3 { q: mut u, r } = qr_decomposition(&b);

    // make the singular values non-negative
    let diag = [r.x_axis.x, r.y_axis.y, r.z_axis.z];
    for (i, col) in [&mut u.x_axis, &mut u.y_axis, &mut u.z_axis]
        .into_iter()
        .enumerate()
    {
        if diag[i] < 0.0 {
            *col = -*col;
        }
    }
    let s = Vec3::new(diag[0].abs(), diag[1].abs(), diag[2].abs());

    Svd3 { u, s, v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    /// Checks reconstruction, orthogonality and ordering.
    fn verify_svd_properties(a: &Mat3, svd: &Svd3, epsilon: f32) {
        let u = svd.u;
        let s = svd.s_mat();
        let v = svd.v;

        let reconstruction = u * s * v.transpose();
        let scale = a.to_cols_array().iter().fold(1.0_f32, |m, x| m.max(x.abs()));
        assert!(
            a.abs_diff_eq(reconstruction, 1e-4 * scale),
            "Reconstruction failed: A != U*S*V.T\nA:\n{a}\nReconstruction:\n{reconstruction}"
        );

        let u_t_u = u.transpose() * u;
        assert!(
            Mat3::IDENTITY.abs_diff_eq(u_t_u, epsilon),
            "U is not orthogonal: U.T*U != I\nU.T*U:\n{u_t_u}"
        );

        let v_t_v = v.transpose() * v;
        assert!(
            Mat3::IDENTITY.abs_diff_eq(v_t_v, epsilon),
            "V is not orthogonal: V.T*V != I\nV.T*V:\n{v_t_v}"
        );

        let s_diag = svd.s();
        assert!(
            s_diag.min_element() >= 0.0,
            "Singular values are not non-negative: {s_diag:?}"
        );
        assert!(
            s_diag.x >= s_diag.y - epsilon && s_diag.y >= s_diag.z - epsilon,
            "Singular values are not sorted: {s_diag:?}"
        );
    }

    const ORTHO_EPSILON: f32 = 1e-5;

    #[test]
    fn test_svd3_diagonal_sorted() {
        let a = Mat3::from_diagonal(Vec3::new(3.0, 2.0, 1.0));
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().abs_diff_eq(Vec3::new(3.0, 2.0, 1.0), 1e-5));
        assert!((svd.condition_number() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_svd3_zero() {
        let a = Mat3::ZERO;
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().abs_diff_eq(Vec3::ZERO, SVD3_EPSILON));
        assert_eq!(svd.condition_number(), f32::INFINITY);
    }

    #[test]
    fn test_svd3_identity() {
        let a = Mat3::IDENTITY;
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn test_svd3_singular_rank1() {
        let a = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(2.0, 4.0, 6.0),
            Vec3::new(3.0, 6.0, 9.0),
        );
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);

        let s = svd.s();
        assert!((s.x - 14.0).abs() < 1e-3);
        assert!(s.y < 1e-4 * s.x);
        assert!(s.z < 1e-4 * s.x);
    }

    #[test]
    fn test_svd3_diagonal_unsorted() {
        let a = Mat3::from_diagonal(Vec3::new(2.0, 3.0, 1.0));
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().abs_diff_eq(Vec3::new(3.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn test_svd3_rotation_matrix() {
        let a = Mat3::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn test_svd3_reflection_matrix() {
        let a = Mat3::from_diagonal(Vec3::new(1.0, -1.0, 1.0));
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn test_svd3_general_full_rank() {
        let a = Mat3::from_cols(
            Vec3::new(1.0, 4.0, 7.0),
            Vec3::new(2.0, 5.0, 8.0),
            Vec3::new(3.0, 6.0, 10.0),
        );
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        assert!(svd.s().min_element() > 1e-3);
        assert!(svd.condition_number().is_finite());
    }

    #[test]
    fn test_svd3_singular_rank2() {
        let a = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(5.0, 7.0, 9.0), // c0 + c1
        );
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, ORTHO_EPSILON);

        let s = svd.s();
        assert!(s.y > 1e-3);
        assert!(s.z < 1e-4 * s.x);
    }

    #[test]
    fn test_svd3_random_matrices() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let cols: [f32; 9] = std::array::from_fn(|_| rng.random_range(-1.0..1.0));
            let a = Mat3::from_cols_array(&cols);
            let svd = svd3(&a);
            verify_svd_properties(&a, &svd, ORTHO_EPSILON);
        }
    }
}
