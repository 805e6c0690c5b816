use crate::bodies::RigidBody;
use crate::constraints::descriptor::{
    ConstraintRow, Jacobian, RowDescriptor, MAX_CONSTRAINT_ROWS,
};
use crate::core::{BodyHandle, ConstraintHandle};
use crate::math::{Transform, Vector3, DEGENERATE_LENGTH2};
use crate::{PhysicsError, Result};

/// Callback invoked when a constraint is destroyed
pub type ConstraintDestructorCallback = Box<dyn FnMut(ConstraintHandle) + Send>;

/// Gain of the positional stabilization spring
pub(crate) const POSITION_STAB_GAIN: f32 = 1500.0;

/// Gain of the velocity stabilization damper
pub(crate) const VELOCITY_STAB_GAIN: f32 = 100.0;

/// Clamp applied to the centripetal feed-forward term
pub(crate) const CENTRIPETAL_CLAMP: f32 = 100_000.0;

/// Lever arm used when a joint needs a second attachment point along its pin
pub(crate) const MIN_JOINT_PIN_LENGTH: f32 = 50.0;

/// Shared state and row-building helpers for the two-body joints.
///
/// Every joint stores its attachment as a pair of local frames, one per
/// body. The frames are captured at construction time so that the joint
/// follows the bodies as they move; when the second body is absent the
/// second frame is a fixed world-space anchor.
pub struct BilateralBase {
    /// First constrained body
    pub(crate) body0: BodyHandle,

    /// Second constrained body, or `None` to anchor against the world
    pub(crate) body1: Option<BodyHandle>,

    /// Joint frame in the first body's local space
    pub(crate) local_matrix0: Transform,

    /// Joint frame in the second body's local space (world space when
    /// `body1` is `None`)
    pub(crate) local_matrix1: Transform,

    /// Internal row stiffness, already remapped from the user range
    stiffness: f32,

    /// Reaction force solved for each row last step
    pub(crate) joint_force: [f32; MAX_CONSTRAINT_ROWS],

    /// Motor acceleration requested for each row
    pub(crate) motor_acceleration: [f32; MAX_CONSTRAINT_ROWS],

    /// Whether each row carries a motor acceleration
    pub(crate) row_is_motor: [bool; MAX_CONSTRAINT_ROWS],

    /// Optional destruction notification
    pub(crate) destructor: Option<ConstraintDestructorCallback>,
}

impl BilateralBase {
    /// Creates the base state for a joint between `body0` and `body1`
    pub fn new(body0: BodyHandle, body1: Option<BodyHandle>) -> Self {
        Self {
            body0,
            body1,
            local_matrix0: Transform::identity(),
            local_matrix1: Transform::identity(),
            stiffness: 0.9,
            joint_force: [0.0; MAX_CONSTRAINT_ROWS],
            motor_acceleration: [0.0; MAX_CONSTRAINT_ROWS],
            row_is_motor: [false; MAX_CONSTRAINT_ROWS],
            destructor: None,
        }
    }

    /// Returns the first constrained body
    #[inline]
    pub fn get_body0(&self) -> BodyHandle {
        self.body0
    }

    /// Returns the second constrained body, if any
    #[inline]
    pub fn get_body1(&self) -> Option<BodyHandle> {
        self.body1
    }

    /// Returns the joint frame in the first body's local space
    #[inline]
    pub fn get_local_matrix0(&self) -> Transform {
        self.local_matrix0
    }

    /// Returns the joint frame in the second body's local space, or the
    /// world-space anchor when the joint has no second body
    #[inline]
    pub fn get_local_matrix1(&self) -> Transform {
        self.local_matrix1
    }

    /// Returns the internal row stiffness
    #[inline]
    pub fn get_stiffness(&self) -> f32 {
        self.stiffness
    }

    /// Sets the row stiffness from a user value in `[0, 1]`
    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = 0.99 * stiffness.clamp(0.0, 1.0);
    }

    /// Returns the reaction force solved for a row last step
    #[inline]
    pub fn get_row_force(&self, row: usize) -> f32 {
        if row < MAX_CONSTRAINT_ROWS {
            self.joint_force[row]
        } else {
            0.0
        }
    }

    /// Registers a callback fired when the joint is destroyed
    pub fn set_destructor<F>(&mut self, destructor: F)
    where
        F: FnMut(ConstraintHandle) + Send + 'static,
    {
        self.destructor = Some(Box::new(destructor));
    }

    /// Stores a solved reaction force for a row
    #[inline]
    pub(crate) fn set_row_force(&mut self, row: usize, force: f32) {
        if row < MAX_CONSTRAINT_ROWS {
            self.joint_force[row] = force;
        }
    }

    /// Captures the joint attachment from a world pivot and a single pin
    /// direction.
    ///
    /// Builds a world frame whose front axis follows `pin_dir` and stores
    /// it in each body's local space. `matrix1` is the identity when the
    /// joint anchors against the world.
    pub fn set_pivot_and_pin_dir(
        &mut self,
        pivot: Vector3,
        pin_dir: Vector3,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<()> {
        if pin_dir.length_squared() < DEGENERATE_LENGTH2 {
            return Err(PhysicsError::InvalidParameter(
                "joint pin direction is degenerate".to_string(),
            ));
        }
        let frame = Transform::from_pivot_and_dir(pivot, pin_dir);
        self.local_matrix0 = matrix0.untransform(&frame);
        self.local_matrix1 = matrix1.untransform(&frame);
        Ok(())
    }

    /// Captures the joint attachment from a world pivot and two pin
    /// directions; `pin_dir0` becomes the front axis and `pin_dir1` seeds
    /// the up axis.
    pub fn set_pivot_and_pin_dir2(
        &mut self,
        pivot: Vector3,
        pin_dir0: Vector3,
        pin_dir1: Vector3,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<()> {
        if pin_dir0.length_squared() < DEGENERATE_LENGTH2
            || pin_dir1.length_squared() < DEGENERATE_LENGTH2
        {
            return Err(PhysicsError::InvalidParameter(
                "joint pin direction is degenerate".to_string(),
            ));
        }
        if pin_dir0.cross(pin_dir1).length_squared() < DEGENERATE_LENGTH2 {
            return Err(PhysicsError::InvalidParameter(
                "joint pin directions are parallel".to_string(),
            ));
        }
        let frame = Transform::from_pivot_and_dirs(pivot, pin_dir0, pin_dir1);
        self.local_matrix0 = matrix0.untransform(&frame);
        self.local_matrix1 = matrix1.untransform(&frame);
        Ok(())
    }

    /// Resolves the two joint frames into world space and returns them
    /// together with the relative rotation between them, decomposed into
    /// pitch/yaw/roll angles about the second frame's front/up/right axes.
    ///
    /// `matrix1` is `None` when the joint anchors against the world, in
    /// which case the second frame is the stored world-space anchor.
    pub fn calculate_global_matrix_and_angle(
        &self,
        matrix0: &Transform,
        matrix1: Option<&Transform>,
    ) -> (Transform, Transform, Vector3) {
        let global0 = matrix0.transform(&self.local_matrix0);
        let global1 = match matrix1 {
            Some(matrix) => matrix.transform(&self.local_matrix1),
            None => self.local_matrix1,
        };

        // Rows of the product are frame-0 axes expressed in frame-1
        // coordinates, so the pitch component is the twist about the pin.
        let relative = global0
            .basis
            .multiply_matrix(&global1.basis.transpose());
        let euler = relative.pitch_yaw_roll();

        (global0, global1, euler)
    }

    /// Emits one translational row along `dir` and returns its index.
    ///
    /// The row's desired acceleration is the implicit spring-damper
    /// stabilization of the positional error; the clamped centripetal
    /// feed-forward needed to track rotating attachment points is stashed
    /// on the row for the solver to fold in.
    pub fn calculate_point_derivative(
        &mut self,
        desc: &mut RowDescriptor,
        dir: Vector3,
        param: &PointParam,
    ) -> usize {
        let jacobian0 = Jacobian {
            linear: dir,
            angular: param.r0.cross(dir),
        };
        let jacobian1 = Jacobian {
            linear: -dir,
            angular: dir.cross(param.r1),
        };

        let position_error = (param.posit1 - param.posit0).dot(dir);
        let velocity_error = (param.veloc1 - param.veloc0).dot(dir);
        let centripetal_error = (param.centripetal1 - param.centripetal0)
            .dot(dir)
            .clamp(-CENTRIPETAL_CLAMP, CENTRIPETAL_CLAMP);

        let dt = desc.timestep;
        let ks = POSITION_STAB_GAIN;
        let kd = VELOCITY_STAB_GAIN;
        let ksd = dt * ks;
        let num = ks * position_error + kd * velocity_error + ksd * velocity_error;
        let den = 1.0 + dt * kd + dt * ksd;
        let accel = num / den;

        let index = desc.push(ConstraintRow {
            jacobian0,
            jacobian1,
            acceleration: accel,
            stiffness: param.stiffness,
            penetration: position_error,
            centripetal: centripetal_error,
            force_slot: desc.row_count,
            ..ConstraintRow::zero()
        });
        desc.rows[index].force_slot = index;
        self.row_is_motor[index] = false;
        index
    }

    /// Emits one rotational row about `axis` and returns its index.
    ///
    /// `joint_angle` is the angular error the row stabilizes toward zero.
    pub fn calculate_angular_derivative(
        &mut self,
        desc: &mut RowDescriptor,
        axis: Vector3,
        omega0: Vector3,
        omega1: Vector3,
        joint_angle: f32,
        stiffness: f32,
    ) -> usize {
        let jacobian0 = Jacobian {
            linear: Vector3::zero(),
            angular: axis,
        };
        let jacobian1 = Jacobian {
            linear: Vector3::zero(),
            angular: -axis,
        };

        let omega_error = (omega1 - omega0).dot(axis);

        let dt = desc.timestep;
        let ks = POSITION_STAB_GAIN;
        let kd = VELOCITY_STAB_GAIN;
        let ksd = dt * ks;
        let num = ks * joint_angle + kd * omega_error + ksd * omega_error;
        let den = 1.0 + dt * kd + dt * ksd;
        let accel = num / den;

        let index = desc.push(ConstraintRow {
            jacobian0,
            jacobian1,
            acceleration: accel,
            stiffness,
            penetration: joint_angle,
            ..ConstraintRow::zero()
        });
        desc.rows[index].force_slot = index;
        self.row_is_motor[index] = false;
        index
    }

    /// Overrides a row's desired acceleration with a motor command.
    ///
    /// Motor rows skip stabilization: the solver drives the relative
    /// acceleration straight toward the requested value within the row's
    /// force bounds.
    pub fn set_motor_acceleration(
        &mut self,
        desc: &mut RowDescriptor,
        row: usize,
        acceleration: f32,
    ) {
        if row < desc.row_count {
            self.motor_acceleration[row] = acceleration;
            self.row_is_motor[row] = true;
            desc.rows[row].acceleration = acceleration;
            desc.rows[row].is_motor = true;
        }
    }
}

/// Kinematic state of one attachment point pair, precomputed once per row
/// group.
#[derive(Debug, Clone, Copy)]
pub struct PointParam {
    /// World-space attachment point on the first body
    pub posit0: Vector3,

    /// World-space attachment point on the second body (or the anchor)
    pub posit1: Vector3,

    /// Lever arm from the first body's center to its attachment point
    pub r0: Vector3,

    /// Lever arm from the second body's center to its attachment point
    pub r1: Vector3,

    /// Velocity of the first attachment point
    pub veloc0: Vector3,

    /// Velocity of the second attachment point
    pub veloc1: Vector3,

    /// Centripetal acceleration of the first attachment point
    pub centripetal0: Vector3,

    /// Centripetal acceleration of the second attachment point
    pub centripetal1: Vector3,

    /// Stiffness copied into the rows built from this parameter block
    pub stiffness: f32,
}

impl PointParam {
    /// Computes the attachment kinematics for both bodies.
    ///
    /// When `body1` is `None` the second attachment point is a fixed world
    /// anchor with zero velocity.
    pub fn new(
        body0: &RigidBody,
        body1: Option<&RigidBody>,
        point0: Vector3,
        point1: Vector3,
        stiffness: f32,
    ) -> Self {
        let r0 = point0 - body0.get_transform().position;
        let omega0 = body0.get_angular_velocity();
        let veloc0 = body0.get_linear_velocity() + omega0.cross(r0);
        let centripetal0 = omega0.cross(omega0.cross(r0));

        let (r1, veloc1, centripetal1) = match body1 {
            Some(body) => {
                let r1 = point1 - body.get_transform().position;
                let omega1 = body.get_angular_velocity();
                let veloc1 = body.get_linear_velocity() + omega1.cross(r1);
                let centripetal1 = omega1.cross(omega1.cross(r1));
                (r1, veloc1, centripetal1)
            }
            None => (Vector3::zero(), Vector3::zero(), Vector3::zero()),
        };

        Self {
            posit0: point0,
            posit1: point1,
            r0,
            r1,
            veloc0,
            veloc1,
            centripetal0,
            centripetal1,
            stiffness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::CollisionBounds;

    fn make_body(position: Vector3) -> RigidBody {
        let mut body = RigidBody::new(
            CollisionBounds::new(Vector3::new(0.5, 0.5, 0.5)),
            Transform::from_position(position),
        );
        body.set_mass_matrix(1.0, Vector3::one());
        body
    }

    #[test]
    fn test_point_row_jacobians() {
        let body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let pivot = Vector3::new(1.0, 0.0, 0.0);

        let mut base = BilateralBase::new(BodyHandle(1), Some(BodyHandle(2)));
        let param = PointParam::new(&body0, Some(&body1), pivot, pivot, 0.9);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        let dir = Vector3::new(0.0, 1.0, 0.0);
        let index = base.calculate_point_derivative(&mut desc, dir, &param);

        let row = &desc.rows[index];
        assert_eq!(row.jacobian0.linear, dir);
        assert_eq!(row.jacobian1.linear, -dir);
        // r0 = (1,0,0), r0 x up = (0,0,1); r1 = (-1,0,0), up x r1 = (0,0,1)
        assert!((row.jacobian0.angular.z - 1.0).abs() < 1.0e-6);
        assert!((row.jacobian1.angular.z - 1.0).abs() < 1.0e-6);
        assert_eq!(row.force_slot, index);
    }

    #[test]
    fn test_coincident_points_give_zero_acceleration() {
        let body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let pivot = Vector3::new(1.0, 0.0, 0.0);

        let mut base = BilateralBase::new(BodyHandle(1), Some(BodyHandle(2)));
        let param = PointParam::new(&body0, Some(&body1), pivot, pivot, 0.9);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        let index =
            base.calculate_point_derivative(&mut desc, Vector3::new(1.0, 0.0, 0.0), &param);
        assert!(desc.rows[index].acceleration.abs() < 1.0e-6);
    }

    #[test]
    fn test_centripetal_term_stashed_separately() {
        let mut body0 = make_body(Vector3::zero());
        body0.set_angular_velocity(Vector3::new(0.0, 0.0, 4.0));
        let pivot = Vector3::new(1.0, 0.0, 0.0);

        let mut base = BilateralBase::new(BodyHandle(1), None);
        let param = PointParam::new(&body0, None, pivot, pivot, 0.9);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        let index =
            base.calculate_point_derivative(&mut desc, Vector3::new(1.0, 0.0, 0.0), &param);

        // omega x (omega x r) = (-16, 0, 0), so the anchor side leads by 16
        // along the row; none of it may leak into the stabilization target.
        let row = &desc.rows[index];
        assert!((row.centripetal - 16.0).abs() < 1.0e-4);
        assert!(row.acceleration.abs() < 1.0e-4);
    }

    #[test]
    fn test_relative_angle_tracks_twist_about_pin() {
        use crate::math::Matrix3;

        let pin = Vector3::new(0.0, 1.0, 0.0);
        let identity = Transform::identity();
        let mut base = BilateralBase::new(BodyHandle(1), None);
        base.set_pivot_and_pin_dir(Vector3::zero(), pin, &identity, &identity)
            .unwrap();

        // Twisting the body about the pin must land entirely in the pitch
        // component, whatever world axis the pin points along.
        let twisted = Transform::new(
            Vector3::zero(),
            Matrix3::from_axis_angle(pin, 0.3),
        );
        let (_, _, euler) = base.calculate_global_matrix_and_angle(&twisted, None);
        assert!((euler.x - 0.3).abs() < 1.0e-4, "pitch = {}", euler.x);
        assert!(euler.y.abs() < 1.0e-4);
        assert!(euler.z.abs() < 1.0e-4);
    }

    #[test]
    fn test_motor_acceleration_overrides_row() {
        let mut base = BilateralBase::new(BodyHandle(1), None);
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        let index = base.calculate_angular_derivative(
            &mut desc,
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::zero(),
            Vector3::zero(),
            0.1,
            0.9,
        );
        base.set_motor_acceleration(&mut desc, index, 5.0);
        assert!(desc.rows[index].is_motor);
        assert!((desc.rows[index].acceleration - 5.0).abs() < 1.0e-6);
        assert!((base.motor_acceleration[index] - 5.0).abs() < 1.0e-6);
    }

    #[test]
    fn test_degenerate_pin_rejected() {
        let mut base = BilateralBase::new(BodyHandle(1), None);
        let identity = Transform::identity();
        let result = base.set_pivot_and_pin_dir(
            Vector3::zero(),
            Vector3::zero(),
            &identity,
            &identity,
        );
        assert!(result.is_err());
    }
}
