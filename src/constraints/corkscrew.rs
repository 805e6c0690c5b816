use crate::bodies::RigidBody;
use crate::constraints::bilateral::{BilateralBase, PointParam};
use crate::constraints::descriptor::RowDescriptor;
use crate::constraints::MotorRequest;
use crate::core::BodyHandle;
use crate::math::{Transform, Vector3, DEGENERATE_LENGTH2};
use crate::Result;

/// State handed to a corkscrew joint's per-step callback
#[derive(Debug, Clone, Copy)]
pub struct CorkscrewState {
    /// Resolved travel along the pin axis
    pub position: f32,

    /// Relative velocity along the pin axis
    pub velocity: f32,

    /// Resolved rotation about the pin axis
    pub angle: f32,

    /// Relative angular velocity about the pin axis
    pub omega: f32,

    /// Current step length in seconds
    pub timestep: f32,
}

/// Motor commands a corkscrew callback may return; the linear and angular
/// axes are driven independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorkscrewMotor {
    /// Drive for the translation along the pin
    pub linear: Option<MotorRequest>,

    /// Drive for the rotation about the pin
    pub angular: Option<MotorRequest>,
}

/// Per-step motor/friction callback for a corkscrew joint
pub type CorkscrewCallback = Box<dyn FnMut(CorkscrewState) -> CorkscrewMotor + Send>;

/// Corkscrew joint: leaves translation along and rotation about the pin
/// axis free, locking the remaining four degrees of freedom.
pub struct CorkscrewJoint {
    pub(crate) base: BilateralBase,

    /// Resolved travel from the last step
    position: f32,

    /// Resolved travel rate from the last step
    velocity: f32,

    /// Resolved rotation from the last step
    angle: f32,

    /// Resolved rotation rate from the last step
    omega: f32,

    callback: Option<CorkscrewCallback>,
}

impl CorkscrewJoint {
    /// Creates a corkscrew at the given world pivot about `pin_dir`
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
            angle: 0.0,
            omega: 0.0,
            callback: None,
        })
    }

    /// Registers a callback that may drive either free axis each step
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(CorkscrewState) -> CorkscrewMotor + Send + 'static,
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

    /// Returns the resolved rotation from the last step
    pub fn get_joint_angle(&self) -> f32 {
        self.angle
    }

    /// Returns the resolved rotation rate from the last step
    pub fn get_joint_omega(&self) -> f32 {
        self.omega
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
        self.angle = -euler.x;
        self.omega = (omega0 - omega1).dot(front0);

        let stiffness = self.base.get_stiffness();

        // Two angular rows perpendicular to the pin lock the tilt while
        // leaving the twist free.
        let cross = front0.cross(front1);
        let (lateral, tilt_error) = if cross.length_squared() < DEGENERATE_LENGTH2 {
            (global0.basis.up(), 0.0)
        } else {
            let axis = cross.normalize();
            (axis, cross.dot(axis))
        };
        self.base
            .calculate_angular_derivative(desc, lateral, omega0, omega1, tilt_error, stiffness);
        let second = lateral.cross(front0).normalize_or_fallback();
        self.base
            .calculate_angular_derivative(desc, second, omega0, omega1, 0.0, stiffness);

        // Translation lock at the pivot projected onto the pin line.
        let p0 = global0.position;
        let p1 = global1.position + front1 * (p0 - global1.position).dot(front1);
        let param = PointParam::new(body0, body1, p0, p1, stiffness);
        self.base
            .calculate_point_derivative(desc, global0.basis.up(), &param);
        self.base
            .calculate_point_derivative(desc, global0.basis.right(), &param);

        if let Some(callback) = self.callback.as_mut() {
            let motor = callback(CorkscrewState {
                position: self.position,
                velocity: self.velocity,
                angle: self.angle,
                omega: self.omega,
                timestep: desc.timestep,
            });
            if let Some(request) = motor.linear {
                let index = self.base.calculate_point_derivative(desc, front0, &param);
                desc.rows[index].min_force = request.min_friction;
                desc.rows[index].max_force = request.max_friction;
                self.base
                    .set_motor_acceleration(desc, index, request.acceleration);
            }
            if let Some(request) = motor.angular {
                let index = self
                    .base
                    .calculate_angular_derivative(desc, front0, omega0, omega1, 0.0, stiffness);
                desc.rows[index].min_force = request.min_friction;
                desc.rows[index].max_force = request.max_friction;
                self.base
                    .set_motor_acceleration(desc, index, request.acceleration);
            }
        }
    }
}
