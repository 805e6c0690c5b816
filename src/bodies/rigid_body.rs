use crate::bodies::body_flags::BodyFlags;
use crate::core::BodyHandle;
use crate::math::{Aabb, Matrix3, Transform, Vector3};

/// Callback invoked every step so the user can apply external forces
pub type ForceAndTorqueCallback = Box<dyn FnMut(&mut RigidBody, f32) + Send>;

/// Callback invoked just before a body is destroyed
pub type BodyDestructorCallback = Box<dyn FnMut(BodyHandle) + Send>;

/// Local-space collision bounds consumed by the broad-phase.
///
/// Shape geometry itself lives outside this subsystem; the registry only
/// needs an extent to keep the broad-phase placement current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBounds {
    /// Half extents of the body's local bounding box
    pub half_extents: Vector3,
}

impl CollisionBounds {
    /// Creates new collision bounds with the given half extents
    #[inline]
    pub fn new(half_extents: Vector3) -> Self {
        Self { half_extents }
    }

    /// Returns the world-space AABB of these bounds under a transform
    pub fn world_aabb(&self, transform: &Transform) -> Aabb {
        let h = self.half_extents;
        let m = &transform.basis.data;
        // World extent along axis j is the projection of the rotated box:
        // sum over local axes of |basis row| times the local half extent.
        let extent = Vector3::new(
            m[0][0].abs() * h.x + m[1][0].abs() * h.y + m[2][0].abs() * h.z,
            m[0][1].abs() * h.x + m[1][1].abs() * h.y + m[2][1].abs() * h.z,
            m[0][2].abs() * h.x + m[1][2].abs() * h.y + m[2][2].abs() * h.z,
        );
        Aabb::from_center_half_extents(transform.position, extent)
    }
}

/// A rigid body owned by the dynamics world.
///
/// Bodies are created with infinite mass; call [`RigidBody::set_mass_matrix`]
/// to make one dynamic.
pub struct RigidBody {
    /// The body's transform in world space
    transform: Transform,

    /// The body's linear velocity
    linear_velocity: Vector3,

    /// The body's angular velocity
    angular_velocity: Vector3,

    /// Accumulated external force for the current step
    force: Vector3,

    /// Accumulated external torque for the current step
    torque: Vector3,

    /// Net linear acceleration over the last step (sleep metrics)
    accel: Vector3,

    /// Net angular acceleration over the last step (sleep metrics)
    alpha: Vector3,

    /// The body's mass (0 means infinite)
    mass: f32,

    /// Inverse of the body's mass
    inv_mass: f32,

    /// Inverse principal inertia in local space (diagonal)
    inv_inertia: Vector3,

    /// The body's linear damping coefficient (per second)
    linear_damping: f32,

    /// The body's angular damping coefficient (per second)
    angular_damping: f32,

    /// Local-space bounds used for broad-phase placement
    bounds: CollisionBounds,

    /// The body's flags
    flags: BodyFlags,

    /// Consecutive steps the body stayed under its sleep bucket thresholds
    sleeping_counter: u32,

    /// Net constraint force applied by the solver last step
    net_force: Vector3,

    /// Net constraint torque applied by the solver last step
    net_torque: Vector3,

    /// Optional per-step external force callback
    pub(crate) force_and_torque_callback: Option<ForceAndTorqueCallback>,

    /// Optional destructor callback invoked on destroy
    pub(crate) destructor: Option<BodyDestructorCallback>,
}

impl RigidBody {
    /// Creates a new body with the given bounds and transform.
    ///
    /// The body starts static (infinite mass) and inside the world.
    pub fn new(bounds: CollisionBounds, transform: Transform) -> Self {
        Self {
            transform,
            linear_velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
            force: Vector3::zero(),
            torque: Vector3::zero(),
            accel: Vector3::zero(),
            alpha: Vector3::zero(),
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: Vector3::zero(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            bounds,
            flags: BodyFlags::AUTO_SLEEP | BodyFlags::IN_WORLD,
            sleeping_counter: 0,
            net_force: Vector3::zero(),
            net_torque: Vector3::zero(),
            force_and_torque_callback: None,
            destructor: None,
        }
    }

    /// Returns the body's transform
    #[inline]
    pub fn get_transform(&self) -> Transform {
        self.transform
    }

    /// Sets the body's transform
    #[inline]
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Returns the body's position
    #[inline]
    pub fn get_position(&self) -> Vector3 {
        self.transform.position
    }

    /// Returns the body's linear velocity
    #[inline]
    pub fn get_linear_velocity(&self) -> Vector3 {
        self.linear_velocity
    }

    /// Sets the body's linear velocity
    #[inline]
    pub fn set_linear_velocity(&mut self, velocity: Vector3) {
        self.linear_velocity = velocity;
    }

    /// Returns the body's angular velocity
    #[inline]
    pub fn get_angular_velocity(&self) -> Vector3 {
        self.angular_velocity
    }

    /// Sets the body's angular velocity
    #[inline]
    pub fn set_angular_velocity(&mut self, velocity: Vector3) {
        self.angular_velocity = velocity;
    }

    /// Returns the net linear acceleration over the last step
    #[inline]
    pub fn get_acceleration(&self) -> Vector3 {
        self.accel
    }

    /// Returns the net angular acceleration over the last step
    #[inline]
    pub fn get_angular_acceleration(&self) -> Vector3 {
        self.alpha
    }

    pub(crate) fn set_step_accelerations(&mut self, accel: Vector3, alpha: Vector3) {
        self.accel = accel;
        self.alpha = alpha;
    }

    /// Sets the body's mass and principal inertia, making it dynamic.
    ///
    /// A zero or negative mass restores the default infinite mass.
    pub fn set_mass_matrix(&mut self, mass: f32, inertia: Vector3) {
        if mass > crate::math::EPSILON {
            self.mass = mass;
            self.inv_mass = 1.0 / mass;
            self.inv_inertia = Vector3::new(
                if inertia.x > crate::math::EPSILON { 1.0 / inertia.x } else { 0.0 },
                if inertia.y > crate::math::EPSILON { 1.0 / inertia.y } else { 0.0 },
                if inertia.z > crate::math::EPSILON { 1.0 / inertia.z } else { 0.0 },
            );
        } else {
            self.mass = 0.0;
            self.inv_mass = 0.0;
            self.inv_inertia = Vector3::zero();
        }
    }

    /// Returns the body's mass (0 means infinite)
    #[inline]
    pub fn get_mass(&self) -> f32 {
        self.mass
    }

    /// Returns the body's inverse mass
    #[inline]
    pub fn get_inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Returns whether the body is static (infinite mass)
    #[inline]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Applies the world-space inverse inertia tensor to a vector
    pub fn apply_inverse_inertia(&self, v: Vector3) -> Vector3 {
        let local = self.transform.unrotate_vector(v);
        let scaled = Vector3::new(
            local.x * self.inv_inertia.x,
            local.y * self.inv_inertia.y,
            local.z * self.inv_inertia.z,
        );
        self.transform.rotate_vector(scaled)
    }

    /// Returns the world-space inverse inertia tensor as a matrix
    pub fn get_inverse_inertia_world(&self) -> Matrix3 {
        let c0 = self.apply_inverse_inertia(Vector3::unit_x());
        let c1 = self.apply_inverse_inertia(Vector3::unit_y());
        let c2 = self.apply_inverse_inertia(Vector3::unit_z());
        Matrix3::new([
            [c0.x, c1.x, c2.x],
            [c0.y, c1.y, c2.y],
            [c0.z, c1.z, c2.z],
        ])
    }

    /// Sets the body's linear damping coefficient
    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping.max(0.0);
    }

    /// Returns the body's linear damping coefficient
    pub fn get_linear_damping(&self) -> f32 {
        self.linear_damping
    }

    /// Sets the body's angular damping coefficient
    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping.max(0.0);
    }

    /// Returns the body's angular damping coefficient
    pub fn get_angular_damping(&self) -> f32 {
        self.angular_damping
    }

    /// Returns the body's collision bounds
    #[inline]
    pub fn get_bounds(&self) -> CollisionBounds {
        self.bounds
    }

    /// Sets the body's collision bounds
    #[inline]
    pub fn set_bounds(&mut self, bounds: CollisionBounds) {
        self.bounds = bounds;
    }

    /// Returns the world-space AABB of the body
    #[inline]
    pub fn world_aabb(&self) -> Aabb {
        self.bounds.world_aabb(&self.transform)
    }

    /// Applies a force at the center of mass for the current step
    pub fn apply_force(&mut self, force: Vector3) {
        self.force += force;
    }

    /// Applies a torque for the current step
    pub fn apply_torque(&mut self, torque: Vector3) {
        self.torque += torque;
    }

    /// Clears the accumulated force and torque
    pub fn clear_forces(&mut self) {
        self.force = Vector3::zero();
        self.torque = Vector3::zero();
    }

    /// Returns the accumulated external force
    #[inline]
    pub fn get_force(&self) -> Vector3 {
        self.force
    }

    /// Returns the accumulated external torque
    #[inline]
    pub fn get_torque(&self) -> Vector3 {
        self.torque
    }

    /// Applies an impulse at a world-space point, changing velocities
    /// immediately. Static bodies ignore impulses.
    pub fn apply_impulse(&mut self, impulse: Vector3, point: Vector3) {
        if self.inv_mass > 0.0 {
            self.linear_velocity += impulse * self.inv_mass;
            let r = point - self.transform.position;
            self.angular_velocity += self.apply_inverse_inertia(r.cross(impulse));
        }
    }

    /// Returns the net constraint force from the last solve
    #[inline]
    pub fn get_net_force(&self) -> Vector3 {
        self.net_force
    }

    /// Returns the net constraint torque from the last solve
    #[inline]
    pub fn get_net_torque(&self) -> Vector3 {
        self.net_torque
    }

    pub(crate) fn set_net_reaction(&mut self, force: Vector3, torque: Vector3) {
        self.net_force = force;
        self.net_torque = torque;
    }

    /// Returns whether the body is sleeping
    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.flags.contains(BodyFlags::SLEEPING)
    }

    /// Puts the body to sleep, zeroing its velocities
    pub fn put_to_sleep(&mut self) {
        if self.inv_mass > 0.0 && !self.is_sleeping() {
            self.flags.insert(BodyFlags::SLEEPING);
            self.linear_velocity = Vector3::zero();
            self.angular_velocity = Vector3::zero();
            self.accel = Vector3::zero();
            self.alpha = Vector3::zero();
            self.clear_forces();
        }
    }

    /// Wakes up the body
    pub fn wake_up(&mut self) {
        self.flags.remove(BodyFlags::SLEEPING);
        self.flags.remove(BodyFlags::EQUILIBRIUM);
        self.sleeping_counter = 0;
    }

    /// Returns whether the sleep heuristics may freeze this body
    pub fn get_auto_sleep(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    /// Sets whether the sleep heuristics may freeze this body
    pub fn set_auto_sleep(&mut self, auto_sleep: bool) {
        if auto_sleep {
            self.flags.insert(BodyFlags::AUTO_SLEEP);
        } else {
            self.flags.remove(BodyFlags::AUTO_SLEEP);
            self.wake_up();
        }
    }

    /// Returns whether the body was in equilibrium last step
    #[inline]
    pub fn is_in_equilibrium(&self) -> bool {
        self.flags.contains(BodyFlags::EQUILIBRIUM)
    }

    pub(crate) fn set_equilibrium(&mut self, equilibrium: bool) {
        if equilibrium {
            self.flags.insert(BodyFlags::EQUILIBRIUM);
        } else {
            self.flags.remove(BodyFlags::EQUILIBRIUM);
        }
    }

    /// Returns whether the body is inside the world bounds
    #[inline]
    pub fn is_in_world(&self) -> bool {
        self.flags.contains(BodyFlags::IN_WORLD)
    }

    pub(crate) fn set_in_world(&mut self, in_world: bool) {
        if in_world {
            self.flags.insert(BodyFlags::IN_WORLD);
        } else {
            self.flags.remove(BodyFlags::IN_WORLD);
        }
    }

    /// Returns the consecutive-step sleep counter
    #[inline]
    pub fn get_sleeping_counter(&self) -> u32 {
        self.sleeping_counter
    }

    pub(crate) fn set_sleeping_counter(&mut self, counter: u32) {
        self.sleeping_counter = counter;
    }

    /// Sets the per-step force callback used to apply external forces
    pub fn set_force_and_torque_callback(&mut self, callback: ForceAndTorqueCallback) {
        self.force_and_torque_callback = Some(callback);
    }

    /// Sets the destructor callback invoked when the body is destroyed
    pub fn set_destructor(&mut self, callback: BodyDestructorCallback) {
        self.destructor = Some(callback);
    }

    /// Integrates accumulated forces into velocities, then applies damping
    /// and clears the accumulators
    pub(crate) fn integrate_forces(&mut self, dt: f32) {
        if self.inv_mass == 0.0 || self.is_sleeping() {
            self.clear_forces();
            return;
        }

        self.linear_velocity += self.force * (self.inv_mass * dt);
        self.angular_velocity += self.apply_inverse_inertia(self.torque) * dt;

        let linear_drop = crate::math::clamp(1.0 - self.linear_damping * dt, 0.0, 1.0);
        let angular_drop = crate::math::clamp(1.0 - self.angular_damping * dt, 0.0, 1.0);
        self.linear_velocity *= linear_drop;
        self.angular_velocity *= angular_drop;

        self.clear_forces();
    }

    /// Integrates velocities into the transform
    pub(crate) fn integrate_velocity(&mut self, dt: f32) {
        if self.inv_mass == 0.0 || self.is_sleeping() {
            return;
        }

        self.transform.position += self.linear_velocity * dt;

        let omega_mag2 = self.angular_velocity.length_squared();
        if omega_mag2 > crate::math::EPSILON * crate::math::EPSILON {
            let omega_mag = omega_mag2.sqrt();
            let axis = self.angular_velocity / omega_mag;
            self.transform.rotate_about(axis, omega_mag * dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_body_is_static() {
        let body = RigidBody::new(
            CollisionBounds::new(Vector3::one()),
            Transform::identity(),
        );
        assert!(body.is_static());
        assert_eq!(body.get_inverse_mass(), 0.0);
    }

    #[test]
    fn test_set_mass_matrix_makes_dynamic() {
        let mut body = RigidBody::new(
            CollisionBounds::new(Vector3::one()),
            Transform::identity(),
        );
        body.set_mass_matrix(2.0, Vector3::new(1.0, 1.0, 1.0));
        assert!(!body.is_static());
        assert!((body.get_inverse_mass() - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn test_impulse_ignored_on_static_body() {
        let mut body = RigidBody::new(
            CollisionBounds::new(Vector3::one()),
            Transform::identity(),
        );
        body.apply_impulse(Vector3::new(10.0, 0.0, 0.0), Vector3::zero());
        assert!(body.get_linear_velocity().is_zero());
    }

    #[test]
    fn test_world_aabb_rotated() {
        let mut transform = Transform::identity();
        transform.rotate_about(Vector3::unit_z(), std::f32::consts::FRAC_PI_4);
        let bounds = CollisionBounds::new(Vector3::new(1.0, 1.0, 1.0));
        let aabb = bounds.world_aabb(&transform);
        // A unit cube rotated 45 degrees about z widens to sqrt(2) in x/y.
        let expected = 2.0_f32.sqrt();
        assert!((aabb.half_extents().x - expected).abs() < 1.0e-5);
        assert!((aabb.half_extents().z - 1.0).abs() < 1.0e-5);
    }
}
