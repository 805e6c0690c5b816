use crate::constraints::Jacobian;
use crate::core::{BodyHandle, ConstraintHandle};
use crate::math::{Matrix3, Vector3};

/// Snapshot of the solver-relevant state of one body.
///
/// Workloads carry copies so that islands can be relaxed on worker
/// threads without touching the world's storages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyInfo {
    pub handle: BodyHandle,
    pub linear_velocity: Vector3,
    pub angular_velocity: Vector3,
    pub inv_mass: f32,
    pub inv_inertia_world: Matrix3,
}

/// One prepared scalar row inside a workload
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverRow {
    pub constraint: ConstraintHandle,
    pub force_slot: usize,
    pub body0: usize,
    pub body1: Option<usize>,
    pub jacobian0: Jacobian,
    pub jacobian1: Jacobian,

    /// Row velocity the relaxation drives toward
    pub target_velocity: f32,

    /// Force bounds scaled by the timestep
    pub min_impulse: f32,
    pub max_impulse: f32,

    /// Relaxation weight from the row stiffness
    pub stiffness: f32,

    /// Reciprocal of the row's effective mass
    pub inv_diag: f32,

    /// Accumulated impulse
    pub accumulated: f32,
}

/// Everything one island needs to be solved in isolation
#[derive(Debug, Default)]
pub(crate) struct IslandWorkload {
    pub bodies: Vec<BodyInfo>,
    pub rows: Vec<SolverRow>,
}

impl IslandWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.rows.clear();
    }
}

#[inline]
fn row_velocity(bodies: &[BodyInfo], row: &SolverRow) -> f32 {
    let b0 = &bodies[row.body0];
    let mut vel = row.jacobian0.linear.dot(b0.linear_velocity)
        + row.jacobian0.angular.dot(b0.angular_velocity);
    if let Some(index1) = row.body1 {
        let b1 = &bodies[index1];
        vel += row.jacobian1.linear.dot(b1.linear_velocity)
            + row.jacobian1.angular.dot(b1.angular_velocity);
    }
    vel
}

/// Precomputes each row's effective mass from the current body set
pub(crate) fn prepare_rows(workload: &mut IslandWorkload) {
    let bodies = &workload.bodies;
    for row in workload.rows.iter_mut() {
        let b0 = &bodies[row.body0];
        let mut diag = row.jacobian0.linear.length_squared() * b0.inv_mass
            + row
                .jacobian0
                .angular
                .dot(b0.inv_inertia_world.multiply_vector(row.jacobian0.angular));
        if let Some(index1) = row.body1 {
            let b1 = &bodies[index1];
            diag += row.jacobian1.linear.length_squared() * b1.inv_mass
                + row
                    .jacobian1
                    .angular
                    .dot(b1.inv_inertia_world.multiply_vector(row.jacobian1.angular));
        }
        row.inv_diag = if diag > 1.0e-12 { 1.0 / diag } else { 0.0 };
    }
}

#[inline]
fn relax_row(bodies: &mut [BodyInfo], row: &mut SolverRow) {
    let vel = row_velocity(bodies, row);
    let delta = (row.target_velocity - vel) * row.inv_diag * row.stiffness;

    let old = row.accumulated;
    row.accumulated = (old + delta).clamp(row.min_impulse, row.max_impulse);
    let applied = row.accumulated - old;
    if applied == 0.0 {
        return;
    }

    let b0 = &mut bodies[row.body0];
    b0.linear_velocity = b0.linear_velocity + row.jacobian0.linear * (applied * b0.inv_mass);
    b0.angular_velocity = b0.angular_velocity
        + b0.inv_inertia_world
            .multiply_vector(row.jacobian0.angular * applied);
    if let Some(index1) = row.body1 {
        let b1 = &mut bodies[index1];
        b1.linear_velocity = b1.linear_velocity + row.jacobian1.linear * (applied * b1.inv_mass);
        b1.angular_velocity = b1.angular_velocity
            + b1.inv_inertia_world
                .multiply_vector(row.jacobian1.angular * applied);
    }
}

/// Runs projected relaxation passes over one island's rows.
///
/// The chunked path batches rows four at a time for locality; rows are
/// still applied in the same order, so both paths produce identical
/// results.
pub(crate) fn solve_workload(workload: &mut IslandWorkload, iterations: usize, chunked: bool) {
    let (bodies, rows) = (&mut workload.bodies, &mut workload.rows);
    for _ in 0..iterations {
        if chunked {
            for chunk in rows.chunks_mut(4) {
                for row in chunk.iter_mut() {
                    relax_row(bodies, row);
                }
            }
        } else {
            for row in rows.iter_mut() {
                relax_row(bodies, row);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_body_workload() -> IslandWorkload {
        let mut workload = IslandWorkload::new();
        workload.bodies.push(BodyInfo {
            handle: BodyHandle(1),
            linear_velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
            inv_mass: 1.0,
            inv_inertia_world: Matrix3::identity(),
        });
        workload.rows.push(SolverRow {
            constraint: ConstraintHandle(1),
            force_slot: 0,
            body0: 0,
            body1: None,
            jacobian0: Jacobian {
                linear: Vector3::new(1.0, 0.0, 0.0),
                angular: Vector3::zero(),
            },
            jacobian1: Jacobian {
                linear: Vector3::zero(),
                angular: Vector3::zero(),
            },
            target_velocity: 2.0,
            min_impulse: -f32::MAX,
            max_impulse: f32::MAX,
            stiffness: 1.0,
            inv_diag: 0.0,
            accumulated: 0.0,
        });
        workload
    }

    #[test]
    fn test_single_row_reaches_target() {
        let mut workload = single_body_workload();
        prepare_rows(&mut workload);
        solve_workload(&mut workload, 8, false);
        assert!((workload.bodies[0].linear_velocity.x - 2.0).abs() < 1.0e-4);
        assert!((workload.rows[0].accumulated - 2.0).abs() < 1.0e-4);
    }

    #[test]
    fn test_impulse_clamped_to_bounds() {
        let mut workload = single_body_workload();
        workload.rows[0].min_impulse = 0.0;
        workload.rows[0].max_impulse = 0.5;
        prepare_rows(&mut workload);
        solve_workload(&mut workload, 8, false);
        assert!((workload.rows[0].accumulated - 0.5).abs() < 1.0e-6);
        assert!((workload.bodies[0].linear_velocity.x - 0.5).abs() < 1.0e-4);
    }

    #[test]
    fn test_scalar_and_chunked_paths_agree() {
        let mut scalar = single_body_workload();
        let mut chunked = single_body_workload();
        prepare_rows(&mut scalar);
        prepare_rows(&mut chunked);
        solve_workload(&mut scalar, 8, false);
        solve_workload(&mut chunked, 8, true);
        assert_eq!(
            scalar.bodies[0].linear_velocity,
            chunked.bodies[0].linear_velocity
        );
    }
}
