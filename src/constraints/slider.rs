use crate::bodies::RigidBody;
use crate::constraints::bilateral::{BilateralBase, PointParam, MIN_JOINT_PIN_LENGTH};
use crate::constraints::descriptor::RowDescriptor;
use crate::constraints::MotorRequest;
use crate::core::BodyHandle;
use crate::math::{Transform, Vector3, DEGENERATE_LENGTH2};
use crate::Result;

/// State handed to a slider joint's per-step callback
#[derive(Debug, Clone, Copy)]
pub struct SliderState {
    /// Resolved travel along the slide axis
    pub position: f32,

    /// Relative velocity along the slide axis
    pub velocity: f32,

    /// Current step length in seconds
    pub timestep: f32,
}

/// Per-step motor/friction callback for a slider joint
pub type SliderCallback = Box<dyn FnMut(SliderState) -> Option<MotorRequest> + Send>;

/// Slider joint: locks all rotation and two translations, leaving
/// translation along the pin axis free.
pub struct SliderJoint {
    pub(crate) base: BilateralBase,

    /// Resolved travel from the last step
    position: f32,

    /// Resolved travel rate from the last step
    velocity: f32,

    callback: Option<SliderCallback>,
}

impl SliderJoint {
    /// Creates a slider at the given world pivot sliding along `pin_dir`
    pub(crate) fn new(
        pivot: Vector3,
        pin_dir: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<Self> {
        let mut base = BilateralBase::new(body0, body1);
        base.set_pivot_and_pin_dir(pivot, pin_dir, matrix0, matrix1)?;
        Ok(Self {
            base,
            position: 0.0,
            velocity: 0.0,
            callback: None,
        })
    }

    /// Registers a callback that may drive the free axis each step
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(SliderState) -> Option<MotorRequest> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Returns the resolved travel from the last step
    pub fn get_joint_position(&self) -> f32 {
        self.position
    }

    /// Returns the resolved travel rate from the last step
    pub fn get_joint_velocity(&self) -> f32 {
        self.velocity
    }

    /// Returns the reaction force solved for a row last step
    pub fn get_joint_force(&self, row: usize) -> f32 {
        self.base.get_row_force(row)
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

        let omega0 = body0.get_angular_velocity();
        let omega1 = body1
            .map(|b| b.get_angular_velocity())
            .unwrap_or_else(Vector3::zero);
        let veloc0 = body0.get_linear_velocity();
        let veloc1 = body1
            .map(|b| b.get_linear_velocity())
            .unwrap_or_else(Vector3::zero);

        let front0 = global0.basis.front();
        let front1 = global1.basis.front();

        self.position = (global0.position - global1.position).dot(front1);
        self.velocity = (veloc0 - veloc1).dot(front1);

        let stiffness = self.base.get_stiffness();

        // Rotation lock: one row about the current misalignment axis, one
        // twist row about the pin itself.
        let cross = front0.cross(front1);
        let (lateral, tilt_error) = if cross.length_squared() < DEGENERATE_LENGTH2 {
            (global0.basis.up(), 0.0)
        } else {
            let axis = cross.normalize();
            (axis, cross.dot(axis))
        };
        self.base
            .calculate_angular_derivative(desc, lateral, omega0, omega1, tilt_error, stiffness);
        self.base
            .calculate_angular_derivative(desc, front0, omega0, omega1, -euler.x, stiffness);

        // Translation lock at the pivot projected onto the slide line.
        let p0 = global0.position;
        let p1 = global1.position + front1 * (p0 - global1.position).dot(front1);
        let param = PointParam::new(body0, body1, p0, p1, stiffness);
        self.base
            .calculate_point_derivative(desc, global0.basis.up(), &param);
        self.base
            .calculate_point_derivative(desc, global0.basis.right(), &param);

        // Offset point row removes the remaining rotation coupled to the
        // slide line.
        let q0 = p0 + front0 * MIN_JOINT_PIN_LENGTH;
        let q1 = p1 + front1 * MIN_JOINT_PIN_LENGTH;
        let offset_param = PointParam::new(body0, body1, q0, q1, stiffness);
        self.base
            .calculate_point_derivative(desc, global0.basis.up(), &offset_param);

        if let Some(callback) = self.callback.as_mut() {
            let request = callback(SliderState {
                position: self.position,
                velocity: self.velocity,
                timestep: desc.timestep,
            });
            if let Some(request) = request {
                let index = self.base.calculate_point_derivative(desc, front0, &param);
                desc.rows[index].min_force = request.min_friction;
                desc.rows[index].max_force = request.max_friction;
                self.base
                    .set_motor_acceleration(desc, index, request.acceleration);
            }
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
    fn test_five_rows_without_motor() {
        let body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let mut joint = SliderJoint::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            BodyHandle(1),
            Some(BodyHandle(2)),
            &body0.get_transform(),
            &body1.get_transform(),
        )
        .unwrap();

        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &body0, Some(&body1));
        assert_eq!(desc.row_count, 5);
    }

    #[test]
    fn test_travel_is_signed_along_pin() {
        let mut body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let mut joint = SliderJoint::new(
            Vector3::zero(),
            Vector3::new(1.0, 0.0, 0.0),
            BodyHandle(1),
            Some(BodyHandle(2)),
            &body0.get_transform(),
            &body1.get_transform(),
        )
        .unwrap();

        body0.set_transform(Transform::from_position(Vector3::new(0.5, 0.0, 0.0)));
        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &body0, Some(&body1));
        assert!((joint.get_joint_position() - 0.5).abs() < 1.0e-4);
    }

    #[test]
    fn test_motor_row_appended_when_requested() {
        let body0 = make_body(Vector3::zero());
        let body1 = make_body(Vector3::new(2.0, 0.0, 0.0));
        let mut joint = SliderJoint::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            BodyHandle(1),
            Some(BodyHandle(2)),
            &body0.get_transform(),
            &body1.get_transform(),
        )
        .unwrap();
        joint.set_callback(|_state| {
            Some(MotorRequest {
                acceleration: -1.0,
                min_friction: -5.0,
                max_friction: 5.0,
            })
        });

        let mut desc = RowDescriptor::new(1.0 / 60.0);
        joint.build_rows(&mut desc, &body0, Some(&body1));
        assert_eq!(desc.row_count, 6);
        assert!(desc.rows[5].is_motor);
    }
}
