use std::collections::{HashMap, HashSet, VecDeque};

use crate::bodies::RigidBody;
use crate::collision::{BroadPhase, ContactGenerator, SweepBroadPhase};
use crate::constraints::{
    BallJoint, CorkscrewJoint, HingeJoint, Joint, RowDescriptor, SliderJoint, UniversalJoint,
    UpVectorJoint,
};
use crate::core::config::{ExecutionMode, FrictionMode, SolverMode, WorldConfig};
use crate::core::island::{build_islands, Island};
use crate::core::sleep::{SleepEntry, SleepTable};
use crate::core::solver::{BodyInfo, SolverRow};
use crate::core::storage::{BodyStorage, ConstraintStorage};
use crate::core::{BodyHandle, ConstraintHandle, IslandScheduler, SimulationContext};
use crate::math::{Aabb, Transform, Vector3};
use crate::{PhysicsError, Result};

/// Velocity drag applied to bodies resting in equilibrium
const EQUILIBRIUM_VELOCITY_DRAG: f32 = 0.9993;

/// Callback fired once per body/joint pair whose accumulated constraint
/// reaction exceeded the configured threshold
pub type ExcessiveForceCallback = Box<dyn FnMut(BodyHandle, ConstraintHandle) + Send>;

/// Callback fired when a body leaves the world bounds
pub type LeaveWorldCallback = Box<dyn FnMut(BodyHandle) + Send>;

/// The registry and per-step driver of the simulation.
///
/// Owns every body and joint, the adjacency graph between them, the sleep
/// table, and the scratch buffers and worker pool of the island solve.
pub struct DynamicsWorld {
    config: WorldConfig,
    bodies: BodyStorage<RigidBody>,
    joints: ConstraintStorage<Joint>,
    adjacency: HashMap<BodyHandle, Vec<ConstraintHandle>>,
    broad_phase: Box<dyn BroadPhase>,
    contact_generator: Option<Box<dyn ContactGenerator>>,
    sleep_table: SleepTable,
    context: SimulationContext,
    scheduler: Option<IslandScheduler>,
    resolved_execution: Option<ExecutionMode>,
    excessive_force_callback: Option<ExcessiveForceCallback>,
    leave_world_callback: Option<LeaveWorldCallback>,
}

impl DynamicsWorld {
    /// Creates a world with the default configuration
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world with an explicit configuration
    pub fn with_config(config: WorldConfig) -> Self {
        let sleep_table = SleepTable::new(&config.freeze_thresholds);
        Self {
            config,
            bodies: BodyStorage::new(),
            joints: ConstraintStorage::new(),
            adjacency: HashMap::new(),
            broad_phase: Box::new(SweepBroadPhase::new()),
            contact_generator: None,
            sleep_table,
            context: SimulationContext::new(),
            scheduler: None,
            resolved_execution: None,
            excessive_force_callback: None,
            leave_world_callback: None,
        }
    }

    // ---- lifecycle -----------------------------------------------------

    /// Creates a body and registers it with the broad-phase.
    ///
    /// New bodies are static (infinite mass) until
    /// [`RigidBody::set_mass_matrix`] is called, and inherit the world's
    /// default damping.
    pub fn create_body(
        &mut self,
        bounds: crate::bodies::CollisionBounds,
        transform: Transform,
    ) -> BodyHandle {
        let mut body = RigidBody::new(bounds, transform);
        body.set_linear_damping(self.config.default_linear_damping);
        body.set_angular_damping(self.config.default_angular_damping);
        let aabb = body.world_aabb();
        let handle = self.bodies.insert(body);
        self.broad_phase.add(handle, aabb);
        self.adjacency.insert(handle, Vec::new());
        handle
    }

    /// Destroys a body along with every joint attached to it.
    ///
    /// The body's destructor callback, if any, runs first.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<()> {
        if !self.bodies.contains(handle) {
            return Err(PhysicsError::ResourceNotFound(format!(
                "body {:?} does not exist",
                handle
            )));
        }

        let attached: Vec<ConstraintHandle> =
            self.adjacency.get(&handle).cloned().unwrap_or_default();
        for joint in attached {
            // Joints may already be gone when two attached bodies die.
            let _ = self.destroy_joint(joint);
        }

        let mut body = self.bodies.remove(handle).unwrap();
        if let Some(mut destructor) = body.destructor.take() {
            destructor(handle);
        }
        self.broad_phase.remove(handle);
        self.adjacency.remove(&handle);
        Ok(())
    }

    /// Returns a reference to a body
    pub fn get_body(&self, handle: BodyHandle) -> Result<&RigidBody> {
        self.bodies.get(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("body {:?} does not exist", handle))
        })
    }

    /// Returns a mutable reference to a body
    pub fn get_body_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody> {
        self.bodies.get_mut(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("body {:?} does not exist", handle))
        })
    }

    /// Returns a reference to a joint
    pub fn get_joint(&self, handle: ConstraintHandle) -> Result<&Joint> {
        self.joints.get(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("joint {:?} does not exist", handle))
        })
    }

    /// Returns a mutable reference to a joint
    pub fn get_joint_mut(&mut self, handle: ConstraintHandle) -> Result<&mut Joint> {
        self.joints.get_mut(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("joint {:?} does not exist", handle))
        })
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn validate_joint_bodies(
        &self,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
    ) -> Result<(Transform, Transform)> {
        let matrix0 = self.get_body(body0)?.get_transform();
        let matrix1 = match body1 {
            Some(handle) => {
                if handle == body0 {
                    return Err(PhysicsError::InvalidParameter(format!(
                        "joint bodies must differ, got {:?} twice",
                        body0
                    )));
                }
                self.get_body(handle)?.get_transform()
            }
            None => Transform::identity(),
        };
        Ok((matrix0, matrix1))
    }

    fn register_joint(&mut self, joint: Joint) -> ConstraintHandle {
        let body0 = joint.get_body0();
        let body1 = joint.get_body1();
        let bilateral = joint.is_bilateral();
        let handle = self.joints.insert(joint);
        self.adjacency.entry(body0).or_default().push(handle);
        if bilateral {
            if let Some(body1) = body1 {
                self.adjacency.entry(body1).or_default().push(handle);
            }
        }
        handle
    }

    /// Creates a ball-and-socket joint pinned at `pivot`
    pub fn create_ball_joint(
        &mut self,
        pivot: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
    ) -> Result<ConstraintHandle> {
        let (matrix0, matrix1) = self.validate_joint_bodies(body0, body1)?;
        let joint = BallJoint::new(pivot, body0, body1, &matrix0, &matrix1)?;
        Ok(self.register_joint(Joint::Ball(joint)))
    }

    /// Creates a hinge joint at `pivot` rotating about `pin_dir`
    pub fn create_hinge_joint(
        &mut self,
        pivot: Vector3,
        pin_dir: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
    ) -> Result<ConstraintHandle> {
        let (matrix0, matrix1) = self.validate_joint_bodies(body0, body1)?;
        let joint = HingeJoint::new(pivot, pin_dir, body0, body1, &matrix0, &matrix1)?;
        Ok(self.register_joint(Joint::Hinge(joint)))
    }

    /// Creates a slider joint at `pivot` sliding along `pin_dir`
    pub fn create_slider_joint(
        &mut self,
        pivot: Vector3,
        pin_dir: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
    ) -> Result<ConstraintHandle> {
        let (matrix0, matrix1) = self.validate_joint_bodies(body0, body1)?;
        let joint = SliderJoint::new(pivot, pin_dir, body0, body1, &matrix0, &matrix1)?;
        Ok(self.register_joint(Joint::Slider(joint)))
    }

    /// Creates a corkscrew joint at `pivot` about `pin_dir`
    pub fn create_corkscrew_joint(
        &mut self,
        pivot: Vector3,
        pin_dir: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
    ) -> Result<ConstraintHandle> {
        let (matrix0, matrix1) = self.validate_joint_bodies(body0, body1)?;
        let joint = CorkscrewJoint::new(pivot, pin_dir, body0, body1, &matrix0, &matrix1)?;
        Ok(self.register_joint(Joint::Corkscrew(joint)))
    }

    /// Creates a universal joint at `pivot`; `pin0` attaches to body0 and
    /// `pin1` to body1
    pub fn create_universal_joint(
        &mut self,
        pivot: Vector3,
        pin0: Vector3,
        pin1: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
    ) -> Result<ConstraintHandle> {
        let (matrix0, matrix1) = self.validate_joint_bodies(body0, body1)?;
        let joint = UniversalJoint::new(pivot, pin0, pin1, body0, body1, &matrix0, &matrix1)?;
        Ok(self.register_joint(Joint::Universal(joint)))
    }

    /// Creates an up-vector joint keeping `body0` aligned with `pin_dir`
    pub fn create_up_vector_joint(
        &mut self,
        pin_dir: Vector3,
        body0: BodyHandle,
    ) -> Result<ConstraintHandle> {
        let matrix0 = self.get_body(body0)?.get_transform();
        let joint = UpVectorJoint::new(pin_dir, body0, &matrix0)?;
        Ok(self.register_joint(Joint::UpVector(joint)))
    }

    /// Destroys a joint and removes its adjacency edges.
    ///
    /// The joint's destructor callback, if any, runs first.
    pub fn destroy_joint(&mut self, handle: ConstraintHandle) -> Result<()> {
        let mut joint = self.joints.remove(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("joint {:?} does not exist", handle))
        })?;

        if let Some(mut destructor) = joint.base_mut().destructor.take() {
            destructor(handle);
        }

        let body0 = joint.get_body0();
        if let Some(edges) = self.adjacency.get_mut(&body0) {
            edges.retain(|&edge| edge != handle);
        }
        if let Some(body1) = joint.get_body1() {
            if let Some(edges) = self.adjacency.get_mut(&body1) {
                edges.retain(|&edge| edge != handle);
            }
        }
        Ok(())
    }

    // ---- graph operations ----------------------------------------------

    /// Teleports a body and everything jointed to it.
    ///
    /// The relative delta between the body's old and new transform is
    /// applied to every body reachable over joint edges; their velocities
    /// are zeroed and broad-phase placements refreshed. The work queue
    /// grows on demand, so arbitrarily large assemblies never overflow.
    pub fn set_body_matrix(&mut self, handle: BodyHandle, transform: Transform) -> Result<()> {
        let old = self.get_body(handle)?.get_transform();
        let delta = transform.transform(&old.inverse());

        let mut visited: HashSet<BodyHandle> = HashSet::new();
        let mut queue: VecDeque<BodyHandle> = VecDeque::new();
        visited.insert(handle);
        queue.push_back(handle);

        while let Some(current) = queue.pop_front() {
            if let Some(body) = self.bodies.get_mut(current) {
                let moved = delta.transform(&body.get_transform());
                body.set_transform(moved);
                body.set_linear_velocity(Vector3::zero());
                body.set_angular_velocity(Vector3::zero());
                let aabb = body.world_aabb();
                self.broad_phase.update(current, aabb);
            }

            let edges = match self.adjacency.get(&current) {
                Some(edges) => edges,
                None => continue,
            };
            for &edge in edges {
                let joint = match self.joints.get(edge) {
                    Some(joint) => joint,
                    None => continue,
                };
                if !joint.is_bilateral() {
                    continue;
                }
                let other = if joint.get_body0() == current {
                    joint.get_body1()
                } else {
                    Some(joint.get_body0())
                };
                if let Some(other) = other {
                    if visited.insert(other) {
                        queue.push_back(other);
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether two bodies are connected through joint edges.
    ///
    /// The search starts from a dynamic endpoint to shortcut static
    /// anchors and never expands through a static body, so two chains
    /// bolted to the same wall do not count as connected.
    pub fn are_bodies_connected_by_joints(
        &self,
        a: BodyHandle,
        b: BodyHandle,
    ) -> Result<bool> {
        let body_a = self.get_body(a)?;
        let _ = self.get_body(b)?;
        if a == b {
            return Ok(true);
        }

        let (start, target) = if body_a.is_static() { (b, a) } else { (a, b) };

        let mut visited: HashSet<BodyHandle> = HashSet::new();
        let mut queue: VecDeque<BodyHandle> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if current == target {
                return Ok(true);
            }
            let expandable = self
                .bodies
                .get(current)
                .map(|body| !body.is_static() || current == start)
                .unwrap_or(false);
            if !expandable {
                continue;
            }

            let edges = match self.adjacency.get(&current) {
                Some(edges) => edges,
                None => continue,
            };
            for &edge in edges {
                let joint = match self.joints.get(edge) {
                    Some(joint) => joint,
                    None => continue,
                };
                if !joint.is_bilateral() {
                    continue;
                }
                let other = if joint.get_body0() == current {
                    joint.get_body1()
                } else {
                    Some(joint.get_body0())
                };
                if let Some(other) = other {
                    if visited.insert(other) {
                        queue.push_back(other);
                    }
                }
            }
        }
        Ok(false)
    }

    // ---- impulses ------------------------------------------------------

    /// Applies a world-space impulse at a point, waking the body.
    ///
    /// Static bodies ignore impulses and stay asleep.
    pub fn add_body_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vector3,
        point: Vector3,
    ) -> Result<()> {
        let body = self.get_body_mut(handle)?;
        if !body.is_static() {
            body.wake_up();
            body.apply_impulse(impulse, point);
        }
        Ok(())
    }

    /// Applies a batch of impulse/point pairs to one body
    pub fn apply_impulse_array(
        &mut self,
        handle: BodyHandle,
        impulses: &[(Vector3, Vector3)],
    ) -> Result<()> {
        let body = self.get_body_mut(handle)?;
        if !body.is_static() {
            body.wake_up();
            for &(impulse, point) in impulses {
                body.apply_impulse(impulse, point);
            }
        }
        Ok(())
    }

    // ---- per-frame driver ----------------------------------------------

    /// Advances the simulation by `timestep` seconds.
    ///
    /// Runs force callbacks, refreshes the broad-phase, partitions the
    /// awake graph into islands, builds and solves each island's
    /// constraint rows, integrates, and evaluates the sleep heuristics.
    pub fn update(&mut self, timestep: f32) -> Result<()> {
        if !timestep.is_finite() || timestep <= 0.0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "timestep must be positive, got {}",
                timestep
            )));
        }

        if self.scheduler.is_none() {
            self.scheduler = Some(IslandScheduler::new(self.config.thread_count));
        }
        if self.resolved_execution.is_none() {
            self.resolved_execution = Some(resolve_execution_mode(self.config.execution_mode));
        }
        let chunked = self.resolved_execution == Some(ExecutionMode::Chunked);
        let iterations = self.config.solver_mode.iterations();

        // External forces; remember pre-step velocities for the
        // acceleration estimate the sleep heuristics use.
        let handles = self.bodies.handles();
        let mut previous_velocities: HashMap<BodyHandle, (Vector3, Vector3)> = HashMap::new();
        for &handle in &handles {
            let body = self.bodies.get_mut(handle).unwrap();
            if body.is_static() || body.is_sleeping() {
                continue;
            }
            previous_velocities.insert(
                handle,
                (body.get_linear_velocity(), body.get_angular_velocity()),
            );
            if let Some(mut callback) = body.force_and_torque_callback.take() {
                callback(body, timestep);
                self.bodies.get_mut(handle).unwrap().force_and_torque_callback = Some(callback);
            }
            self.bodies.get_mut(handle).unwrap().integrate_forces(timestep);
        }

        // Broad-phase refresh and the external contact hook.
        for &handle in &handles {
            let aabb = self.bodies.get(handle).unwrap().world_aabb();
            self.broad_phase.update(handle, aabb);
        }
        let pairs = self.broad_phase.refresh();
        if let Some(generator) = self.contact_generator.as_mut() {
            for pair in pairs {
                generator.process_pair(pair, &mut self.bodies, timestep);
            }
        }

        let islands = build_islands(&self.bodies, &self.joints, &self.adjacency);

        // An awake neighbor wakes the whole island.
        for island in &islands {
            for &handle in &island.bodies {
                if let Some(body) = self.bodies.get_mut(handle) {
                    if body.is_sleeping() {
                        body.wake_up();
                    }
                }
            }
        }

        self.build_workloads(&islands, timestep);
        {
            let workloads = self.context.prepare_filled();
            self.scheduler.as_ref().unwrap().solve_islands(
                workloads,
                iterations,
                chunked,
                self.config.thread_single_island,
            );
        }
        let excessive = self.write_back(timestep);

        // Positions, then the step accelerations driving the sleep table.
        for &handle in &handles {
            let body = self.bodies.get_mut(handle).unwrap();
            if body.is_static() || body.is_sleeping() {
                continue;
            }
            body.integrate_velocity(timestep);
            if let Some(&(v_prev, w_prev)) = previous_velocities.get(&handle) {
                let accel = (body.get_linear_velocity() - v_prev) / timestep;
                let alpha = (body.get_angular_velocity() - w_prev) / timestep;
                body.set_step_accelerations(accel, alpha);
            }
        }

        self.notify_excessive_forces(excessive);
        self.notify_leaving_world(&handles);
        self.evaluate_sleep(&islands);
        Ok(())
    }

    fn build_workloads(&mut self, islands: &[Island], timestep: f32) {
        let workloads = self.context.prepare(islands.len());
        let mut descriptor = RowDescriptor::new(timestep);

        for (island, workload) in islands.iter().zip(workloads.iter_mut()) {
            let mut index_of: HashMap<BodyHandle, usize> = HashMap::new();
            for &handle in &island.bodies {
                let body = self.bodies.get(handle).unwrap();
                index_of.insert(handle, workload.bodies.len());
                workload.bodies.push(snapshot_body(handle, body));
            }

            for &joint_handle in &island.joints {
                let joint = match self.joints.get_mut(joint_handle) {
                    Some(joint) => joint,
                    None => continue,
                };
                let body0_handle = joint.get_body0();
                let body1_handle = joint.get_body1();
                let body0 = match self.bodies.get(body0_handle) {
                    Some(body) => body,
                    None => continue,
                };
                let body1 = body1_handle.and_then(|h| self.bodies.get(h));

                descriptor.reset(timestep);
                joint.build_rows(&mut descriptor, body0, body1);

                // Static anchors join the snapshot with zero inverse mass.
                let index0 = *index_of.entry(body0_handle).or_insert_with(|| {
                    workload.bodies.push(snapshot_body(body0_handle, body0));
                    workload.bodies.len() - 1
                });
                let index1 = body1.map(|body| {
                    *index_of.entry(body1_handle.unwrap()).or_insert_with(|| {
                        workload
                            .bodies
                            .push(snapshot_body(body1_handle.unwrap(), body));
                        workload.bodies.len() - 1
                    })
                });

                for row in descriptor.active_rows() {
                    let mut velocity = row.jacobian0.linear.dot(body0.get_linear_velocity())
                        + row.jacobian0.angular.dot(body0.get_angular_velocity());
                    if let Some(body1) = body1 {
                        velocity += row.jacobian1.linear.dot(body1.get_linear_velocity())
                            + row.jacobian1.angular.dot(body1.get_angular_velocity());
                    }
                    // Motor rows carry the commanded acceleration as-is;
                    // everything else gets the stashed centripetal
                    // feed-forward on top of the stabilization target.
                    let acceleration = if row.is_motor {
                        row.acceleration
                    } else {
                        row.acceleration + row.centripetal
                    };
                    workload.rows.push(SolverRow {
                        constraint: joint_handle,
                        force_slot: row.force_slot,
                        body0: index0,
                        body1: index1,
                        jacobian0: row.jacobian0,
                        jacobian1: row.jacobian1,
                        target_velocity: velocity + acceleration * timestep,
                        min_impulse: bound_impulse(row.min_force, timestep),
                        max_impulse: bound_impulse(row.max_force, timestep),
                        stiffness: row.stiffness,
                        inv_diag: 0.0,
                        accumulated: 0.0,
                    });
                }
            }
        }
    }

    fn write_back(&mut self, timestep: f32) -> Vec<(BodyHandle, ConstraintHandle)> {
        let inv_timestep = 1.0 / timestep;
        let threshold = self.config.excessive_force_threshold;
        let check_forces = threshold < f32::MAX;
        let mut net_reactions: HashMap<BodyHandle, (Vector3, Vector3)> = HashMap::new();
        let mut joint_reactions: HashMap<(BodyHandle, ConstraintHandle), Vector3> =
            HashMap::new();

        let workloads = self.context.prepare_filled();
        for workload in workloads.iter() {
            for info in &workload.bodies {
                if let Some(body) = self.bodies.get_mut(info.handle) {
                    if !body.is_static() {
                        body.set_linear_velocity(info.linear_velocity);
                        body.set_angular_velocity(info.angular_velocity);
                    }
                }
            }

            for row in &workload.rows {
                let force = row.accumulated * inv_timestep;
                if let Some(joint) = self.joints.get_mut(row.constraint) {
                    joint.base_mut().set_row_force(row.force_slot, force);
                }

                let handle0 = workload.bodies[row.body0].handle;
                let entry = net_reactions.entry(handle0).or_insert_with(|| {
                    (Vector3::zero(), Vector3::zero())
                });
                entry.0 += row.jacobian0.linear * force;
                entry.1 += row.jacobian0.angular * force;
                if check_forces {
                    *joint_reactions
                        .entry((handle0, row.constraint))
                        .or_insert_with(Vector3::zero) += row.jacobian0.linear * force;
                }

                if let Some(index1) = row.body1 {
                    let handle1 = workload.bodies[index1].handle;
                    let entry = net_reactions.entry(handle1).or_insert_with(|| {
                        (Vector3::zero(), Vector3::zero())
                    });
                    entry.0 += row.jacobian1.linear * force;
                    entry.1 += row.jacobian1.angular * force;
                    if check_forces {
                        *joint_reactions
                            .entry((handle1, row.constraint))
                            .or_insert_with(Vector3::zero) += row.jacobian1.linear * force;
                    }
                }
            }
        }

        for (handle, (force, torque)) in net_reactions {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.set_net_reaction(force, torque);
            }
        }

        // A joint trips the callback when its whole reaction on a body is
        // past the threshold, not any single row of it.
        let mut excessive: Vec<(BodyHandle, ConstraintHandle)> = joint_reactions
            .into_iter()
            .filter(|(_, reaction)| reaction.length() > threshold)
            .map(|(pair, _)| pair)
            .collect();
        excessive.sort_unstable();
        excessive
    }

    fn notify_excessive_forces(&mut self, pairs: Vec<(BodyHandle, ConstraintHandle)>) {
        if pairs.is_empty() {
            return;
        }
        if let Some(mut callback) = self.excessive_force_callback.take() {
            for (body, joint) in pairs {
                callback(body, joint);
            }
            self.excessive_force_callback = Some(callback);
        }
    }

    fn notify_leaving_world(&mut self, handles: &[BodyHandle]) {
        let mut left: Vec<BodyHandle> = Vec::new();
        for &handle in handles {
            if let Some(body) = self.bodies.get_mut(handle) {
                if body.is_in_world()
                    && !self
                        .config
                        .world_bounds
                        .contains_point(body.get_position())
                {
                    body.set_in_world(false);
                    left.push(handle);
                }
            }
        }
        if left.is_empty() {
            return;
        }
        if let Some(mut callback) = self.leave_world_callback.take() {
            for handle in left {
                callback(handle);
            }
            self.leave_world_callback = Some(callback);
        }
    }

    /// Island-wide sleep evaluation.
    ///
    /// An island in equilibrium (every motion maximum under the freeze
    /// thresholds) has residual velocity dragged off. Independently, the
    /// motion maxima pick the first sleep-table bucket that contains them
    /// and the island freezes once its counter outlasts that bucket's
    /// step count.
    fn evaluate_sleep(&mut self, islands: &[Island]) {
        if !self.config.sleep_enabled {
            return;
        }

        for island in islands {
            let mut eligible = true;
            let mut max_accel2 = 0.0_f32;
            let mut max_alpha2 = 0.0_f32;
            let mut max_veloc2 = 0.0_f32;
            let mut max_omega2 = 0.0_f32;
            let mut counter = u32::MAX;

            for &handle in &island.bodies {
                let body = match self.bodies.get(handle) {
                    Some(body) => body,
                    None => continue,
                };
                if !body.get_auto_sleep() {
                    eligible = false;
                    break;
                }
                max_accel2 = max_accel2.max(body.get_acceleration().length_squared());
                max_alpha2 = max_alpha2.max(body.get_angular_acceleration().length_squared());
                max_veloc2 = max_veloc2.max(body.get_linear_velocity().length_squared());
                max_omega2 = max_omega2.max(body.get_angular_velocity().length_squared());
                counter = counter.min(body.get_sleeping_counter());
            }

            if !eligible {
                for &handle in &island.bodies {
                    if let Some(body) = self.bodies.get_mut(handle) {
                        body.set_sleeping_counter(0);
                        body.set_equilibrium(false);
                    }
                }
                continue;
            }

            let freeze = &self.config.freeze_thresholds;
            let equilibrium = max_accel2 <= freeze.accel2
                && max_alpha2 <= freeze.alpha2
                && max_veloc2 <= freeze.speed2
                && max_omega2 <= freeze.omega2;

            // Equilibrium bodies bleed off residual velocity while the
            // bucket counter decides when the island actually freezes.
            for &handle in &island.bodies {
                if let Some(body) = self.bodies.get_mut(handle) {
                    body.set_equilibrium(equilibrium);
                    if equilibrium {
                        let v = body.get_linear_velocity() * EQUILIBRIUM_VELOCITY_DRAG;
                        let w = body.get_angular_velocity() * EQUILIBRIUM_VELOCITY_DRAG;
                        body.set_linear_velocity(v);
                        body.set_angular_velocity(w);
                    }
                }
            }

            match self
                .sleep_table
                .find_bucket(max_accel2, max_alpha2, max_veloc2, max_omega2)
            {
                Some(bucket) => {
                    let counter = counter.saturating_add(1);
                    let asleep = counter > self.sleep_table.required_steps(bucket);
                    for &handle in &island.bodies {
                        if let Some(body) = self.bodies.get_mut(handle) {
                            if asleep {
                                body.put_to_sleep();
                            } else {
                                body.set_sleeping_counter(counter);
                            }
                        }
                    }
                }
                None => {
                    for &handle in &island.bodies {
                        if let Some(body) = self.bodies.get_mut(handle) {
                            body.set_sleeping_counter(0);
                        }
                    }
                }
            }
        }
    }

    // ---- configuration -------------------------------------------------

    /// Returns the active configuration
    pub fn get_config(&self) -> &WorldConfig {
        &self.config
    }

    /// Sets the solver iteration class
    pub fn set_solver_mode(&mut self, mode: SolverMode) {
        self.config.solver_mode = mode;
    }

    /// Sets the friction accuracy class
    pub fn set_friction_mode(&mut self, mode: FrictionMode) {
        self.config.friction_mode = mode;
    }

    /// Sets the numeric execution path; takes effect at the next update
    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.config.execution_mode = mode;
        self.resolved_execution = None;
    }

    /// Sets the worker thread count; takes effect at the next update
    pub fn set_thread_count(&mut self, count: usize) {
        self.config.thread_count = count;
        self.scheduler = None;
    }

    /// Solve on workers even when only one island exists
    pub fn set_thread_single_island(&mut self, enabled: bool) {
        self.config.thread_single_island = enabled;
    }

    /// Sets the region bodies are expected to stay inside
    pub fn set_world_bounds(&mut self, bounds: Aabb) {
        self.config.world_bounds = bounds;
    }

    /// Enables or disables the sleep heuristics
    pub fn set_sleep_enabled(&mut self, enabled: bool) {
        self.config.sleep_enabled = enabled;
    }

    /// Sets the constraint-force magnitude that triggers the
    /// excessive-force callback
    pub fn set_excessive_force_threshold(&mut self, threshold: f32) {
        self.config.excessive_force_threshold = threshold;
    }

    /// Overrides one sleep-table bucket
    pub fn set_sleep_entry(&mut self, index: usize, entry: SleepEntry) -> Result<()> {
        self.sleep_table.set_sleep_entry(index, entry)
    }

    /// Returns one sleep-table bucket
    pub fn get_sleep_entry(&self, index: usize) -> Result<SleepEntry> {
        self.sleep_table.get_sleep_entry(index)
    }

    /// Registers the callback fired per body/joint pair under excessive
    /// constraint force
    pub fn set_excessive_force_callback<F>(&mut self, callback: F)
    where
        F: FnMut(BodyHandle, ConstraintHandle) + Send + 'static,
    {
        self.excessive_force_callback = Some(Box::new(callback));
    }

    /// Registers the callback fired when a body leaves the world bounds
    pub fn set_leave_world_callback<F>(&mut self, callback: F)
    where
        F: FnMut(BodyHandle) + Send + 'static,
    {
        self.leave_world_callback = Some(Box::new(callback));
    }

    /// Installs the external contact generator hook
    pub fn set_contact_generator(&mut self, generator: Box<dyn ContactGenerator>) {
        self.contact_generator = Some(generator);
    }

    /// Replaces the broad-phase, re-registering every live body
    pub fn set_broad_phase(&mut self, mut broad_phase: Box<dyn BroadPhase>) {
        for (handle, body) in self.bodies.iter() {
            broad_phase.add(handle, body.world_aabb());
        }
        self.broad_phase = broad_phase;
    }
}

impl Default for DynamicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_body(handle: BodyHandle, body: &RigidBody) -> BodyInfo {
    BodyInfo {
        handle,
        linear_velocity: body.get_linear_velocity(),
        angular_velocity: body.get_angular_velocity(),
        inv_mass: body.get_inverse_mass(),
        inv_inertia_world: body.get_inverse_inertia_world(),
    }
}

fn bound_impulse(force_bound: f32, timestep: f32) -> f32 {
    if force_bound.abs() >= f32::MAX * 0.5 {
        force_bound
    } else {
        force_bound * timestep
    }
}

fn resolve_execution_mode(mode: ExecutionMode) -> ExecutionMode {
    match mode {
        ExecutionMode::Auto => {
            if cfg!(target_arch = "x86_64") || cfg!(target_arch = "aarch64") {
                ExecutionMode::Chunked
            } else {
                ExecutionMode::Scalar
            }
        }
        resolved => resolved,
    }
}
