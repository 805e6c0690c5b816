use crate::bodies::RigidBody;
use crate::constraints::bilateral::{BilateralBase, PointParam};
use crate::constraints::descriptor::RowDescriptor;
use crate::core::BodyHandle;
use crate::math::{Transform, Vector3, DEGENERATE_LENGTH2};
use crate::Result;

/// State handed to a ball joint's per-step callback
#[derive(Debug, Clone, Copy)]
pub struct BallState {
    /// Relative rotation between the anchor frames, one angle per axis
    pub joint_angles: Vector3,

    /// Relative angular velocity between the bodies
    pub joint_omega: Vector3,

    /// Current step length in seconds
    pub timestep: f32,
}

/// Per-step notification callback for a ball joint
pub type BallCallback = Box<dyn FnMut(BallState) + Send>;

/// Ball-and-socket joint: pins a shared pivot point, leaving all three
/// rotational degrees of freedom free unless cone/twist limits are enabled.
pub struct BallJoint {
    pub(crate) base: BilateralBase,

    /// Whether the cone limit row may be emitted
    cone_limit: bool,

    /// Whether the twist limit row may be emitted
    twist_limit: bool,

    /// Cone half-angle limit in radians
    max_cone_angle: f32,

    /// Cosine of the cone half-angle limit
    cone_angle_cos: f32,

    /// Twist limit in radians, symmetric about zero
    max_twist_angle: f32,

    /// Resolved per-axis joint angles from the last step
    angles: Vector3,

    /// Resolved relative angular velocity from the last step
    omega: Vector3,

    /// Resolved cone angle from the last step
    cone_angle: f32,

    callback: Option<BallCallback>,
}

impl BallJoint {
    /// Creates a ball joint pinned at the given world pivot.
    ///
    /// The anchor frames are seeded from the first body's own front axis,
    /// so construction never produces a degenerate frame.
    pub(crate) fn new(
        pivot: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<Self> {
        let mut base = BilateralBase::new(body0, body1);
        base.set_pivot_and_pin_dir(pivot, matrix0.basis.front(), matrix0, matrix1)?;
        Ok(Self {
            base,
            cone_limit: false,
            twist_limit: false,
            max_cone_angle: 0.0,
            cone_angle_cos: 1.0,
            max_twist_angle: 0.0,
            angles: Vector3::zero(),
            omega: Vector3::zero(),
            cone_angle: 0.0,
            callback: None,
        })
    }

    /// Enables cone and twist limits about the given world-space cone axis.
    ///
    /// A limit of (near) zero disables the corresponding row. The anchor
    /// frames are re-seeded so the cone axis becomes the joint's front
    /// axis.
    pub fn set_cone_limits(
        &mut self,
        cone_axis: Vector3,
        max_cone_angle: f32,
        max_twist_angle: f32,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<()> {
        let pivot = matrix0.transform(&self.base.local_matrix0).position;
        self.base
            .set_pivot_and_pin_dir(pivot, cone_axis, matrix0, matrix1)?;

        self.max_cone_angle = max_cone_angle.clamp(0.0, std::f32::consts::PI);
        self.cone_angle_cos = self.max_cone_angle.cos();
        self.max_twist_angle = max_twist_angle.clamp(0.0, std::f32::consts::PI);
        self.cone_limit = self.max_cone_angle > 1.0e-3;
        self.twist_limit = self.max_twist_angle > 1.0e-3;
        Ok(())
    }

    /// Registers a per-step notification callback
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(BallState) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Returns the resolved per-axis joint angles from the last step
    pub fn get_joint_angles(&self) -> Vector3 {
        self.angles
    }

    /// Returns the relative angular velocity from the last step
    pub fn get_joint_omega(&self) -> Vector3 {
        self.omega
    }

    /// Returns the resolved cone angle from the last step
    pub fn get_cone_angle(&self) -> f32 {
        self.cone_angle
    }

    pub(crate) fn build_rows(
        &mut self,
        desc: &mut RowDescriptor,
        body0: &RigidBody,
        body1: Option<&RigidBody>,
    ) {
        let matrix0 = body0.get_transform();
        let matrix1 = body1.map(|b| b.get_transform());
        let (global0, global1, euler) = self
            .base
            .calculate_global_matrix_and_angle(&matrix0, matrix1.as_ref());
        self.angles = -euler;

        let omega0 = body0.get_angular_velocity();
        let omega1 = body1
            .map(|b| b.get_angular_velocity())
            .unwrap_or_else(Vector3::zero);
        self.omega = omega0 - omega1;

        let front0 = global0.basis.front();
        let front1 = global1.basis.front();
        self.cone_angle = front0.dot(front1).clamp(-1.0, 1.0).acos();

        if let Some(callback) = self.callback.as_mut() {
            callback(BallState {
                joint_angles: self.angles,
                joint_omega: self.omega,
                timestep: desc.timestep,
            });
        }

        let stiffness = self.base.get_stiffness();
        let param = PointParam::new(body0, body1, global0.position, global1.position, stiffness);
        self.base
            .calculate_point_derivative(desc, global0.basis.front(), &param);
        self.base
            .calculate_point_derivative(desc, global0.basis.up(), &param);
        self.base
            .calculate_point_derivative(desc, global0.basis.right(), &param);

        if self.twist_limit {
            // Twist is the relative rotation about the cone axis.
            let twist = self.angles.x;
            if twist > self.max_twist_angle {
                let index = self.base.calculate_angular_derivative(
                    desc,
                    -front0,
                    omega0,
                    omega1,
                    twist - self.max_twist_angle,
                    stiffness,
                );
                desc.rows[index].min_force = 0.0;
            } else if twist < -self.max_twist_angle {
                let index = self.base.calculate_angular_derivative(
                    desc,
                    front0,
                    omega0,
                    omega1,
                    -twist - self.max_twist_angle,
                    stiffness,
                );
                desc.rows[index].min_force = 0.0;
            }
        }

        if self.cone_limit {
            let cone_cos = front0.dot(front1);
            if cone_cos < self.cone_angle_cos {
                // Rotating body0 about front0 x front1 closes the cone.
                let cross = front0.cross(front1);
                let lateral = if cross.length_squared() < DEGENERATE_LENGTH2 {
                    global0.basis.up()
                } else {
                    cross.normalize()
                };
                let excess = cone_cos.clamp(-1.0, 1.0).acos() - self.max_cone_angle;
                let index = self.base.calculate_angular_derivative(
                    desc, lateral, omega0, omega1, excess, stiffness,
                );
                desc.rows[index].min_force = 0.0;
            }
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
    fn test_three_rows_without_limits() {
        let body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let mut joint = BallJoint::new(
            Vector3::new(1.0, 0.0, 0.0),
            BodyHandle(1),
            Some(BodyHandle(2)),
            &body0.get_transform(),
            &body1.get_transform(),
        )
        .unwrap();

        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &body0, Some(&body1));
        assert_eq!(desc.row_count, 3);
    }

    #[test]
    fn test_cone_limit_row_gating() {
        let limit = 0.3_f32;
        let body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let mut joint = BallJoint::new(
            Vector3::new(1.0, 0.0, 0.0),
            BodyHandle(1),
            Some(BodyHandle(2)),
            &body0.get_transform(),
            &body1.get_transform(),
        )
        .unwrap();
        joint
            .set_cone_limits(
                Vector3::new(1.0, 0.0, 0.0),
                limit,
                0.0,
                &body0.get_transform(),
                &body1.get_transform(),
            )
            .unwrap();

        // Tilt body0 just under the limit: no extra row.
        let mut tilted = make_body(Vector3::zero());
        let mut transform = tilted.get_transform();
        transform.basis =
            Matrix3::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), limit - 0.01)
                .multiply_matrix(&transform.basis);
        tilted.set_transform(transform);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &tilted, Some(&body1));
        assert_eq!(desc.row_count, 3);

        // Just over the limit: exactly one unilateral row.
        let mut transform = make_body(Vector3::zero()).get_transform();
        transform.basis =
            Matrix3::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), limit + 0.01)
                .multiply_matrix(&transform.basis);
        tilted.set_transform(transform);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &tilted, Some(&body1));
        assert_eq!(desc.row_count, 4);
        assert!(desc.rows[3].min_force >= 0.0);
    }
}
