use crate::bodies::RigidBody;
use crate::constraints::bilateral::BilateralBase;
use crate::constraints::descriptor::RowDescriptor;
use crate::core::BodyHandle;
use crate::math::{Transform, Vector3, DEGENERATE_LENGTH2};
use crate::Result;

/// Up-vector joint: keeps one body-local axis aligned with a fixed world
/// pin direction, removing two angular degrees of freedom. Affects only
/// its single body.
pub struct UpVectorJoint {
    pub(crate) base: BilateralBase,
}

impl UpVectorJoint {
    /// Creates an up-vector joint aligning the body to the world `pin_dir`
    pub(crate) fn new(
        pin_dir: Vector3,
        body0: BodyHandle,
        matrix0: &Transform,
    ) -> Result<Self> {
        let mut base = BilateralBase::new(body0, None);
        base.set_pivot_and_pin_dir(
            matrix0.position,
            pin_dir,
            matrix0,
            &Transform::identity(),
        )?;
        Ok(Self { base })
    }

    /// Returns the current world-space pin direction
    pub fn get_pin_dir(&self) -> Vector3 {
        self.base.local_matrix1.basis.front()
    }

    /// Repoints the world pin direction, keeping the body attachment
    pub fn set_pin_dir(&mut self, pin_dir: Vector3) -> Result<()> {
        if pin_dir.length_squared() < DEGENERATE_LENGTH2 {
            return Err(crate::PhysicsError::InvalidParameter(
                "up vector pin direction is degenerate".to_string(),
            ));
        }
        let pivot = self.base.local_matrix1.position;
        self.base.local_matrix1 = Transform::from_pivot_and_dir(pivot, pin_dir);
        Ok(())
    }

    pub(crate) fn build_rows(&mut self, desc: &mut RowDescriptor, body0: &RigidBody) {
        let matrix0 = body0.get_transform();
        let global0 = matrix0.transform(&self.base.local_matrix0);
        let pin = self.base.local_matrix1.basis.front();

        let omega0 = body0.get_angular_velocity();
        let omega1 = Vector3::zero();
        let stiffness = self.base.get_stiffness();

        let front0 = global0.basis.front();
        let cross = front0.cross(pin);
        if cross.length_squared() > DEGENERATE_LENGTH2 {
            // Rotating body0 about the misalignment axis closes the tilt.
            let lateral = cross.normalize();
            self.base.calculate_angular_derivative(
                desc,
                lateral,
                omega0,
                omega1,
                cross.dot(lateral),
                stiffness,
            );
            let second = lateral.cross(front0).normalize_or_fallback();
            self.base
                .calculate_angular_derivative(desc, second, omega0, omega1, 0.0, stiffness);
        } else {
            // Near-parallel directions: constrain about the anchor frame's
            // own transverse axes instead of a vanishing cross product.
            self.base.calculate_angular_derivative(
                desc,
                global0.basis.up(),
                omega0,
                omega1,
                0.0,
                stiffness,
            );
            self.base.calculate_angular_derivative(
                desc,
                global0.basis.right(),
                omega0,
                omega1,
                0.0,
                stiffness,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::CollisionBounds;
    use crate::math::Matrix3;

    fn make_body(position: Vector3) -> RigidBody {
        let mut body = RigidBody::new(
            CollisionBounds::new(Vector3::new(0.5, 0.5, 0.5)),
            Transform::from_position(position),
        );
        body.set_mass_matrix(1.0, Vector3::one());
        body
    }

    #[test]
    fn test_always_two_rows() {
        let body0 = make_body(Vector3::zero());
        let mut joint = UpVectorJoint::new(
            Vector3::new(0.0, 1.0, 0.0),
            BodyHandle(1),
            &body0.get_transform(),
        )
        .unwrap();

        // Aligned: the near-parallel fallback still emits both rows.
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &body0);
        assert_eq!(desc.row_count, 2);

        // Tilted body: the misalignment axis path emits both rows too.
        let mut tilted = make_body(Vector3::zero());
        let mut transform = tilted.get_transform();
        transform.basis = Matrix3::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), 0.5)
            .multiply_matrix(&transform.basis);
        tilted.set_transform(transform);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &tilted);
        assert_eq!(desc.row_count, 2);
    }

    #[test]
    fn test_set_pin_dir_repoints() {
        let body0 = make_body(Vector3::zero());
        let mut joint = UpVectorJoint::new(
            Vector3::new(0.0, 1.0, 0.0),
            BodyHandle(1),
            &body0.get_transform(),
        )
        .unwrap();
        joint.set_pin_dir(Vector3::new(1.0, 0.0, 0.0)).unwrap();
        let pin = joint.get_pin_dir();
        assert!((pin.x - 1.0).abs() < 1.0e-6);
        assert!(joint.set_pin_dir(Vector3::zero()).is_err());
    }
}
