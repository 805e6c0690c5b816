use nalgebra as na;
use crate::math::Vector3;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A 3x3 matrix representation for physics calculations.
///
/// When used as a rotation basis the rows are the world-space directions of
/// the local front (x), up (y) and right (z) axes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Matrix3 {
    pub data: [[f32; 3]; 3],
}

impl Matrix3 {
    /// Creates a new 3x3 matrix from a 2D array
    #[inline]
    pub fn new(data: [[f32; 3]; 3]) -> Self {
        Self { data }
    }

    /// Creates a new 3x3 identity matrix
    #[inline]
    pub fn identity() -> Self {
        Self {
            data: [
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a new 3x3 zero matrix
    #[inline]
    pub fn zero() -> Self {
        Self {
            data: [
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0],
            ],
        }
    }

    /// Creates a basis from three row vectors (front, up, right)
    #[inline]
    pub fn from_rows(front: Vector3, up: Vector3, right: Vector3) -> Self {
        Self {
            data: [
                [front.x, front.y, front.z],
                [up.x, up.y, up.z],
                [right.x, right.y, right.z],
            ],
        }
    }

    /// Creates a diagonal matrix from a vector
    #[inline]
    pub fn from_diagonal(d: Vector3) -> Self {
        Self {
            data: [
                [d.x, 0.0, 0.0],
                [0.0, d.y, 0.0],
                [0.0, 0.0, d.z],
            ],
        }
    }

    /// Creates a rotation matrix from an axis and angle (Rodrigues formula).
    /// The axis must be unit length.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        let t = 1.0 - c;
        let (x, y, z) = (axis.x, axis.y, axis.z);

        Self {
            data: [
                [t * x * x + c, t * x * y + s * z, t * x * z - s * y],
                [t * x * y - s * z, t * y * y + c, t * y * z + s * x],
                [t * x * z + s * y, t * y * z - s * x, t * z * z + c],
            ],
        }
    }

    /// Builds an orthonormal basis whose front row is the given direction.
    ///
    /// Degenerate inputs fall back to a deterministic axis, so the result is
    /// always orthonormal.
    pub fn basis_from_front(dir: Vector3) -> Self {
        let front = dir.normalize_or_fallback();
        let up = front.any_perpendicular();
        let right = front.cross(up);
        Self::from_rows(front, up, right)
    }

    /// Builds an orthonormal basis from a front direction and an up hint.
    ///
    /// The up hint fixes the in-plane axis instead of it being inferred; its
    /// component along the front direction is removed before normalization.
    pub fn basis_from_front_and_up(dir: Vector3, up_hint: Vector3) -> Self {
        let front = dir.normalize_or_fallback();
        let projected = up_hint - front * up_hint.dot(front);
        let up = if projected.length_squared() > crate::math::DEGENERATE_LENGTH2 {
            projected.normalize()
        } else {
            front.any_perpendicular()
        };
        let right = front.cross(up);
        Self::from_rows(front, up, right)
    }

    /// Returns the front (first) row of the basis
    #[inline]
    pub fn front(&self) -> Vector3 {
        Vector3::new(self.data[0][0], self.data[0][1], self.data[0][2])
    }

    /// Returns the up (second) row of the basis
    #[inline]
    pub fn up(&self) -> Vector3 {
        Vector3::new(self.data[1][0], self.data[1][1], self.data[1][2])
    }

    /// Returns the right (third) row of the basis
    #[inline]
    pub fn right(&self) -> Vector3 {
        Vector3::new(self.data[2][0], self.data[2][1], self.data[2][2])
    }

    /// Rotates a local-space vector into world space
    #[inline]
    pub fn rotate_vector(&self, v: Vector3) -> Vector3 {
        self.front() * v.x + self.up() * v.y + self.right() * v.z
    }

    /// Rotates a world-space vector back into local space
    #[inline]
    pub fn unrotate_vector(&self, v: Vector3) -> Vector3 {
        Vector3::new(
            v.dot(self.front()),
            v.dot(self.up()),
            v.dot(self.right()),
        )
    }

    /// Returns the transpose of the matrix
    #[inline]
    pub fn transpose(&self) -> Self {
        let [[a, b, c], [d, e, f], [g, h, i]] = self.data;

        Self {
            data: [
                [a, d, g],
                [b, e, h],
                [c, f, i],
            ],
        }
    }

    /// Multiplies the matrix by a vector (rows dot v)
    #[inline]
    pub fn multiply_vector(&self, v: Vector3) -> Vector3 {
        let [[a, b, c], [d, e, f], [g, h, i]] = self.data;

        Vector3::new(
            a * v.x + b * v.y + c * v.z,
            d * v.x + e * v.y + f * v.z,
            g * v.x + h * v.y + i * v.z,
        )
    }

    /// Multiplies this matrix by another
    pub fn multiply_matrix(&self, other: &Self) -> Self {
        let mut result = Self::zero();
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = 0.0;
                for (k, row) in other.data.iter().enumerate() {
                    sum += self.data[i][k] * row[j];
                }
                result.data[i][j] = sum;
            }
        }
        result
    }

    /// Decomposes a rotation basis into pitch/yaw/roll angles (rotation about
    /// the front, up and right axes respectively).
    pub fn pitch_yaw_roll(&self) -> Vector3 {
        let m = &self.data;
        let clamped = crate::math::clamp(m[0][2], -0.999_999, 0.999_999);
        let yaw = (-clamped).asin();

        let (pitch, roll) = if m[0][2].abs() < 0.999_999 {
            (m[1][2].atan2(m[2][2]), m[0][1].atan2(m[0][0]))
        } else {
            // Gimbal singularity: fold everything into pitch.
            ((-m[2][1]).atan2(m[1][1]), 0.0)
        };

        Vector3::new(pitch, yaw, roll)
    }

    /// Returns the largest deviation of this basis from orthonormality:
    /// the worst row-length error and worst pairwise row dot product.
    pub fn orthonormal_error(&self) -> f32 {
        let f = self.front();
        let u = self.up();
        let r = self.right();

        let mut error: f32 = 0.0;
        error = error.max((f.length() - 1.0).abs());
        error = error.max((u.length() - 1.0).abs());
        error = error.max((r.length() - 1.0).abs());
        error = error.max(f.dot(u).abs());
        error = error.max(f.dot(r).abs());
        error = error.max(u.dot(r).abs());
        error
    }

    /// Convert to nalgebra Matrix3
    #[inline]
    pub fn to_nalgebra(&self) -> na::Matrix3<f32> {
        na::Matrix3::from_fn(|i, j| self.data[i][j])
    }

    /// Convert from nalgebra Matrix3
    #[inline]
    pub fn from_nalgebra(m: &na::Matrix3<f32>) -> Self {
        let mut data = [[0.0; 3]; 3];
        for (i, row) in data.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = m[(i, j)];
            }
        }
        Self { data }
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::identity()
    }
}
