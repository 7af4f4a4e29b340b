use glam::{Mat3, Vec3};

use crate::math::outer_product;

/// A symmetric 3x3 matrix storing only its upper triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SymmetricMatrix3 {
    /// Row 0, column 0.
    pub m_00: f32,
    /// Row 0, column 1; equal to `m_10`.
    pub m_01: f32,
    /// Row 0, column 2; equal to `m_20`.
    pub m_02: f32,
    /// Row 1, column 1.
    pub m_11: f32,
    /// Row 1, column 2; equal to `m_21`.
    pub m_12: f32,
    /// Row 2, column 2.
    pub m_22: f32,
}

impl SymmetricMatrix3 {
    /// The zero matrix.
    pub const ZERO: Self = Self {
        m_00: 0.0,
        m_01: 0.0,
        m_02: 0.0,
        m_11: 0.0,
        m_12: 0.0,
        m_22: 0.0,
    };

    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        m_00: 1.0,
        m_01: 0.0,
        m_02: 0.0,
        m_11: 1.0,
        m_12: 0.0,
        m_22: 1.0,
    };

    /// Builds a symmetric matrix from the upper triangle of `mat`.
    pub fn from_mat3(mat: &Mat3) -> Self {
        Self {
            m_00: mat.x_axis.x,
            m_01: mat.y_axis.x,
            m_02: mat.z_axis.x,
            m_11: mat.y_axis.y,
            m_12: mat.z_axis.y,
            m_22: mat.z_axis.z,
        }
    }

    /// Builds the diagonal matrix `diag(d)`.
    pub fn from_diagonal(d: Vec3) -> Self {
        Self {
            m_00: d.x,
            m_11: d.y,
            m_22: d.z,
            ..Self::ZERO
        }
    }

    /// Builds `v * vᵀ`.
    pub fn from_outer_product(v: Vec3) -> Self {
        Self::from_mat3(&outer_product(v, v))
    }

    /// Expands into a full matrix.
    pub fn to_mat3(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(self.m_00, self.m_01, self.m_02),
            Vec3::new(self.m_01, self.m_11, self.m_12),
            Vec3::new(self.m_02, self.m_12, self.m_22),
        )
    }

    /// Entry at `(row, col)`; indices are taken modulo 3.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        match (row % 3, col % 3) {
            (0, 0) => self.m_00,
            (1, 1) => self.m_11,
            (2, 2) => self.m_22,
            (0, 1) | (1, 0) => self.m_01,
            (0, 2) | (2, 0) => self.m_02,
            _ => self.m_12,
        }
    }

    /// Writes the entry at `(row, col)` and its mirror.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        match (row % 3, col % 3) {
            (0, 0) => self.m_00 = value,
            (1, 1) => self.m_11 = value,
            (2, 2) => self.m_22 = value,
            (0, 1) | (1, 0) => self.m_01 = value,
            (0, 2) | (2, 0) => self.m_02 = value,
            _ => self.m_12 = value,
        }
    }

    /// Element-wise sum.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            m_00: self.m_00 + other.m_00,
            m_01: self.m_01 + other.m_01,
            m_02: self.m_02 + other.m_02,
            m_11: self.m_11 + other.m_11,
            m_12: self.m_12 + other.m_12,
            m_22: self.m_22 + other.m_22,
        }
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            m_00: self.m_00 * factor,
            m_01: self.m_01 * factor,
            m_02: self.m_02 * factor,
            m_11: self.m_11 * factor,
            m_12: self.m_12 * factor,
            m_22: self.m_22 * factor,
        }
    }

    /// Sum of the diagonal.
    #[inline]
    pub fn trace(&self) -> f32 {
        self.m_00 + self.m_11 + self.m_22
    }

    /// The diagonal as a vector.
    #[inline]
    pub fn diagonal(&self) -> Vec3 {
        Vec3::new(self.m_00, self.m_11, self.m_22)
    }

    /// Sum of squares of the three distinct off-diagonal entries.
    #[inline]
    pub fn off_diagonal_residual(&self) -> f32 {
        self.m_01 * self.m_01 + self.m_02 * self.m_02 + self.m_12 * self.m_12
    }
}

impl std::ops::Add for SymmetricMatrix3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        SymmetricMatrix3::add(&self, &rhs)
    }
}

impl std::ops::AddAssign for SymmetricMatrix3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = SymmetricMatrix3::add(self, &rhs);
    }
}
