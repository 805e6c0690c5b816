use crate::math::{Matrix3, Vector3};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A rigid transformation in 3D space: a position plus an orthonormal 3x3
/// rotation basis. No scale or shear is representable; that keeps the inverse
/// a cheap transpose and the basis always orthonormal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Transform {
    /// Position in 3D space
    pub position: Vector3,

    /// Rotation as an orthonormal basis (front/up/right rows)
    pub basis: Matrix3,
}

impl Transform {
    /// Creates a new transform with the given position and basis
    #[inline]
    pub fn new(position: Vector3, basis: Matrix3) -> Self {
        Self { position, basis }
    }

    /// Creates a new identity transform
    #[inline]
    pub fn identity() -> Self {
        Self {
            position: Vector3::zero(),
            basis: Matrix3::identity(),
        }
    }

    /// Creates a new transform from just a position
    #[inline]
    pub fn from_position(position: Vector3) -> Self {
        Self {
            position,
            basis: Matrix3::identity(),
        }
    }

    /// Creates a frame at a pivot whose front axis points along `dir`
    #[inline]
    pub fn from_pivot_and_dir(pivot: Vector3, dir: Vector3) -> Self {
        Self {
            position: pivot,
            basis: Matrix3::basis_from_front(dir),
        }
    }

    /// Creates a frame at a pivot with an explicit front direction and an up
    /// hint fixing the in-plane axis
    #[inline]
    pub fn from_pivot_and_dirs(pivot: Vector3, dir: Vector3, up_hint: Vector3) -> Self {
        Self {
            position: pivot,
            basis: Matrix3::basis_from_front_and_up(dir, up_hint),
        }
    }

    /// Transforms a local-space point into world space
    #[inline]
    pub fn transform_point(&self, point: Vector3) -> Vector3 {
        self.basis.rotate_vector(point) + self.position
    }

    /// Transforms a world-space point back into local space
    #[inline]
    pub fn untransform_point(&self, point: Vector3) -> Vector3 {
        self.basis.unrotate_vector(point - self.position)
    }

    /// Rotates a local-space direction into world space (ignores translation)
    #[inline]
    pub fn rotate_vector(&self, direction: Vector3) -> Vector3 {
        self.basis.rotate_vector(direction)
    }

    /// Rotates a world-space direction back into local space
    #[inline]
    pub fn unrotate_vector(&self, direction: Vector3) -> Vector3 {
        self.basis.unrotate_vector(direction)
    }

    /// Composes this transform with a child: `world = self ∘ local`
    pub fn transform(&self, local: &Transform) -> Transform {
        let mut basis = Matrix3::zero();
        for i in 0..3 {
            let row = Vector3::new(local.basis.data[i][0], local.basis.data[i][1], local.basis.data[i][2]);
            let rotated = self.basis.rotate_vector(row);
            basis.data[i] = [rotated.x, rotated.y, rotated.z];
        }
        Transform {
            position: self.transform_point(local.position),
            basis,
        }
    }

    /// Expresses a world transform relative to this one: `local = self⁻¹ ∘ world`
    pub fn untransform(&self, world: &Transform) -> Transform {
        let mut basis = Matrix3::zero();
        for i in 0..3 {
            let row = Vector3::new(world.basis.data[i][0], world.basis.data[i][1], world.basis.data[i][2]);
            let unrotated = self.basis.unrotate_vector(row);
            basis.data[i] = [unrotated.x, unrotated.y, unrotated.z];
        }
        Transform {
            position: self.untransform_point(world.position),
            basis,
        }
    }

    /// Inverts this transform
    pub fn inverse(&self) -> Self {
        let inv_basis = self.basis.transpose();
        Self {
            position: -self.basis.unrotate_vector(self.position),
            basis: inv_basis,
        }
    }

    /// Rotates this transform in place about a world-space axis through its
    /// own position
    pub fn rotate_about(&mut self, axis: Vector3, angle: f32) {
        let rotation = Matrix3::from_axis_angle(axis, angle);
        let mut basis = Matrix3::zero();
        for i in 0..3 {
            let row = Vector3::new(self.basis.data[i][0], self.basis.data[i][1], self.basis.data[i][2]);
            let new_row = rotation.rotate_vector(row);
            basis.data[i] = [new_row.x, new_row.y, new_row.z];
        }
        self.basis = basis;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
