use crate::bodies::RigidBody;
use crate::constraints::bilateral::{BilateralBase, PointParam, MIN_JOINT_PIN_LENGTH};
use crate::constraints::descriptor::RowDescriptor;
use crate::constraints::MotorRequest;
use crate::core::BodyHandle;
use crate::math::{Transform, Vector3};
use crate::Result;

/// State handed to a universal joint's per-step callback
#[derive(Debug, Clone, Copy)]
pub struct UniversalState {
    /// Resolved rotation about the first free axis (attached to body0)
    pub angle0: f32,

    /// Resolved rotation about the second free axis (attached to body1)
    pub angle1: f32,

    /// Relative angular velocity about the first free axis
    pub omega0: f32,

    /// Relative angular velocity about the second free axis
    pub omega1: f32,

    /// Current step length in seconds
    pub timestep: f32,
}

/// Friction/motor commands a universal callback may return, one per free
/// axis, each independently gated.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniversalMotor {
    /// Drive for the axis attached to body0
    pub axis0: Option<MotorRequest>,

    /// Drive for the axis attached to body1
    pub axis1: Option<MotorRequest>,
}

/// Per-step motor/friction callback for a universal joint
pub type UniversalCallback = Box<dyn FnMut(UniversalState) -> UniversalMotor + Send>;

/// Universal joint: pins a shared pivot and removes one rotation, leaving
/// two rotational degrees of freedom about non-parallel axes.
pub struct UniversalJoint {
    pub(crate) base: BilateralBase,

    /// Resolved rotation about the first free axis from the last step
    angle0: f32,

    /// Resolved rotation about the second free axis from the last step
    angle1: f32,

    /// Resolved rate about the first free axis from the last step
    omega0: f32,

    /// Resolved rate about the second free axis from the last step
    omega1: f32,

    callback: Option<UniversalCallback>,
}

impl UniversalJoint {
    /// Creates a universal joint at `pivot`; `pin0` attaches to body0 and
    /// `pin1` to body1, and the two must not be parallel.
    pub(crate) fn new(
        pivot: Vector3,
        pin0: Vector3,
        pin1: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<Self> {
        let mut base = BilateralBase::new(body0, body1);
        base.set_pivot_and_pin_dir2(pivot, pin0, pin1, matrix0, matrix1)?;
        Ok(Self {
            base,
            angle0: 0.0,
            angle1: 0.0,
            omega0: 0.0,
            omega1: 0.0,
            callback: None,
        })
    }

    /// Registers a callback that may drive either free axis each step
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(UniversalState) -> UniversalMotor + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Returns the resolved rotation about the first free axis
    pub fn get_joint_angle0(&self) -> f32 {
        self.angle0
    }

    /// Returns the resolved rotation about the second free axis
    pub fn get_joint_angle1(&self) -> f32 {
        self.angle1
    }

    /// Returns the resolved rate about the first free axis
    pub fn get_joint_omega0(&self) -> f32 {
        self.omega0
    }

    /// Returns the resolved rate about the second free axis
    pub fn get_joint_omega1(&self) -> f32 {
        self.omega1
    }

    pub(crate) fn build_rows(
        &mut self,
        desc: &mut RowDescriptor,
        body0: &RigidBody,
        body1: Option<&RigidBody>,
    ) {
        let matrix0 = body0.get_transform();
        let matrix1 = body1.map(|b| b.get_transform());
        let (global0, global1, _) = self
            .base
            .calculate_global_matrix_and_angle(&matrix0, matrix1.as_ref());

        let omega0 = body0.get_angular_velocity();
        let omega1 = body1
            .map(|b| b.get_angular_velocity())
            .unwrap_or_else(Vector3::zero);

        // dir0/dir1 are the free axes; dir2 completes the constrained
        // frame and dir3 spans the plane for the offset row.
        let dir0 = global0.basis.front();
        let dir1 = global1.basis.up();
        let dir2 = dir0.cross(dir1).normalize_or_fallback();
        let dir3 = dir2.cross(dir0).normalize_or_fallback();

        self.angle0 = dir2.cross(global0.basis.up()).dot(dir0).atan2(dir2.dot(global0.basis.up()));
        self.angle1 = dir2
            .cross(global1.basis.front())
            .dot(dir1)
            .atan2(dir2.dot(global1.basis.front()));
        let rel_omega = omega0 - omega1;
        self.omega0 = rel_omega.dot(dir0);
        self.omega1 = rel_omega.dot(dir1);

        let stiffness = self.base.get_stiffness();
        let p0 = global0.position;
        let p1 = global1.position;
        let param = PointParam::new(body0, body1, p0, p1, stiffness);
        self.base.calculate_point_derivative(desc, dir0, &param);
        self.base.calculate_point_derivative(desc, dir1, &param);
        self.base.calculate_point_derivative(desc, dir2, &param);

        // Offset row removes the rotation about dir2 that the pivot rows
        // leave unconstrained.
        let q0 = p0 + dir3 * MIN_JOINT_PIN_LENGTH;
        let q1 = p1 + dir1 * MIN_JOINT_PIN_LENGTH;
        let offset_param = PointParam::new(body0, body1, q0, q1, stiffness);
        self.base
            .calculate_point_derivative(desc, dir0, &offset_param);

        if let Some(callback) = self.callback.as_mut() {
            let motor = callback(UniversalState {
                angle0: self.angle0,
                angle1: self.angle1,
                omega0: self.omega0,
                omega1: self.omega1,
                timestep: desc.timestep,
            });
            if let Some(request) = motor.axis0 {
                let index = self
                    .base
                    .calculate_angular_derivative(desc, dir0, omega0, omega1, 0.0, stiffness);
                desc.rows[index].min_force = request.min_friction;
                desc.rows[index].max_force = request.max_friction;
                self.base
                    .set_motor_acceleration(desc, index, request.acceleration);
            }
            if let Some(request) = motor.axis1 {
                let index = self
                    .base
                    .calculate_angular_derivative(desc, dir1, omega0, omega1, 0.0, stiffness);
                desc.rows[index].min_force = request.min_friction;
                desc.rows[index].max_force = request.max_friction;
                self.base
                    .set_motor_acceleration(desc, index, request.acceleration);
            }
        }
    }
}
