//! Jacobi eigen-decomposition of symmetric 3x3 matrices.
//!
//! The solver repeatedly applies approximate Givens rotations to the three off-diagonal
//! axis pairs `(0, 1)`, `(1, 2)`, `(2, 0)` in turn. The accumulated rotation `Q`
//! satisfies `Qᵀ · A · Q ≈ diag(S)`.
//!
//! The solver can be driven one rotation at a time ([`JacobiEigenSolver::solve_step`])
//! or until convergence ([`JacobiEigenSolver::solve`]).

use glam::{Mat3, Quat, Vec3};

use crate::{math::approximate_givens, symmetric::SymmetricMatrix3};

/// Axis pairs visited in cyclic order, with the remaining axis last.
const AXIS_PAIRS: [(usize, usize, usize); 3] = [(0, 1, 2), (1, 2, 0), (2, 0, 1)];

/// Stopping criteria for the Jacobi iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobiParams {
    /// The iteration stops once the sum of squared off-diagonal entries is at or below
    /// this value.
    pub squared_error_threshold: f32,
    /// Maximum number of single-pair rotations.
    pub max_iterations: usize,
}

impl Default for JacobiParams {
    fn default() -> Self {
        Self {
            squared_error_threshold: 1e-6,
            max_iterations: 30,
        }
    }
}

/// Result of a Jacobi eigen-decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenDecomposition {
    /// Rotation whose matrix columns are the eigenvectors.
    pub rotation: Quat,
    /// Eigenvalues, matching the columns of `rotation`.
    pub eigenvalues: Vec3,
    /// Sum of squared off-diagonal entries left after the last rotation.
    pub residual: f32,
    /// Number of rotations applied.
    pub iterations: usize,
}

impl EigenDecomposition {
    /// Eigenvector matrix, one eigenvector per column.
    pub fn eigenvectors(&self) -> Mat3 {
        Mat3::from_quat(self.rotation)
    }

    /// Returns the decomposition with eigenvalues in descending order.
    ///
    /// Eigenvector columns are permuted along with the eigenvalues; whenever the
    /// permutation is odd one column is negated so the basis stays right-handed.
    pub fn sorted(&self) -> Self {
        let mut values = [self.eigenvalues.x, self.eigenvalues.y, self.eigenvalues.z];
        let m = self.eigenvectors();
        let mut cols = [m.x_axis, m.y_axis, m.z_axis];

        // three-element sorting network, every swap flips one column
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            if values[i] < values[j] {
                values.swap(i, j);
                cols.swap(i, j);
                cols[j] = -cols[j];
            }
        }

        let basis = Mat3::from_cols(cols[0], cols[1], cols[2]);
        Self {
            rotation: Quat::from_mat3(&basis).normalize(),
            eigenvalues: Vec3::from_array(values),
            ..*self
        }
    }
}

/// Steppable Jacobi eigen solver for symmetric 3x3 matrices.
///
/// # Example
///
/// ```
/// use handshape_linalg::{eigen::JacobiEigenSolver, symmetric::SymmetricMatrix3};
/// use glam::Vec3;
///
/// let a = SymmetricMatrix3 { m_00: 2.0, m_01: 1.0, m_11: 2.0, m_22: 1.0, ..Default::default() };
/// let mut solver = JacobiEigenSolver::default();
/// let result = solver.solve(&a).sorted();
/// assert!((result.eigenvalues - Vec3::new(3.0, 1.0, 1.0)).abs().max_element() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct JacobiEigenSolver {
    params: JacobiParams,
    work: SymmetricMatrix3,
    q: Quat,
    iterations: usize,
}

impl Default for JacobiEigenSolver {
    fn default() -> Self {
        Self::new(JacobiParams::default())
    }
}

impl JacobiEigenSolver {
    /// Creates a solver with the given stopping criteria.
    pub fn new(params: JacobiParams) -> Self {
        Self {
            params,
            work: SymmetricMatrix3::ZERO,
            q: Quat::IDENTITY,
            iterations: 0,
        }
    }

    /// The stopping criteria in use.
    pub fn params(&self) -> &JacobiParams {
        &self.params
    }

    /// Starts a new decomposition of `a`.
    pub fn init(&mut self, a: &SymmetricMatrix3) {
        self.work = *a;
        self.q = Quat::IDENTITY;
        self.iterations = 0;
    }

    /// Applies one approximate Givens rotation to the next axis pair.
    pub fn solve_step(&mut self) {
        let (p, q, r) = AXIS_PAIRS[self.iterations % AXIS_PAIRS.len()];
        let w = &mut self.work;

        let w_pp = w.get(p, p);
        let w_qq = w.get(q, q);
        let w_pq = w.get(p, q);
        let w_pr = w.get(p, r);
        let w_qr = w.get(q, r);

        let g = approximate_givens(w_pp, w_pq, w_qq);
        let (a, b) = g.rotation();

        let aa = a * a;
        let bb = b * b;
        let ab = a * b;
        w.set(p, p, aa * w_pp + 2.0 * ab * w_pq + bb * w_qq);
        w.set(q, q, bb * w_pp - 2.0 * ab * w_pq + aa * w_qq);
        w.set(p, q, ab * (w_qq - w_pp) + (aa - bb) * w_pq);
        w.set(p, r, a * w_pr + b * w_qr);
        w.set(q, r, -b * w_pr + a * w_qr);

        // rotation about the remaining axis
        let mut axis = [0.0_f32; 3];
        axis[r] = g.sh;
        let qk = Quat::from_xyzw(axis[0], axis[1], axis[2], g.ch);
        self.q = self.q * qk;

        self.iterations += 1;
        log::trace!(
            "jacobi step {} pair ({p}, {q}) residual {:e}",
            self.iterations,
            self.residual()
        );
    }

    /// Rotates until the residual meets the threshold or the iteration cap is reached.
    ///
    /// Never fails: after the cap the best-effort decomposition is returned and the
    /// caller may inspect [`EigenDecomposition::residual`].
    pub fn solve(&mut self, a: &SymmetricMatrix3) -> EigenDecomposition {
        self.init(a);
        while self.residual() > self.params.squared_error_threshold {
            if self.iterations >= self.params.max_iterations {
                log::warn!(
                    "jacobi solver reached {} iterations with residual {:e}",
                    self.iterations,
                    self.residual()
                );
                break;
            }
            self.solve_step();
        }
        self.decomposition()
    }

    /// Snapshot of the current state.
    pub fn decomposition(&self) -> EigenDecomposition {
        EigenDecomposition {
            rotation: self.q(),
            eigenvalues: self.s(),
            residual: self.residual(),
            iterations: self.iterations,
        }
    }

    /// Accumulated eigenvector rotation, normalised.
    pub fn q(&self) -> Quat {
        self.q.normalize()
    }

    /// Current diagonal of the working matrix.
    pub fn s(&self) -> Vec3 {
        self.work.diagonal()
    }

    /// Sum of squared off-diagonal entries of the working matrix.
    pub fn residual(&self) -> f32 {
        self.work.off_diagonal_residual()
    }

    /// Number of rotations applied since the last [`Self::init`].
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The working matrix.
    pub fn work(&self) -> &SymmetricMatrix3 {
        &self.work
    }
}
