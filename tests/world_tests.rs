use std::sync::{Arc, Mutex};

use joint_engine::bodies::CollisionBounds;
use joint_engine::core::{DynamicsWorld, SleepEntry, SolverMode};
use joint_engine::math::{Aabb, Transform, Vector3};
use joint_engine::BodyHandle;

const TIMESTEP: f32 = 1.0 / 60.0;

fn create_dynamic_body(world: &mut DynamicsWorld, position: Vector3) -> BodyHandle {
    let handle = world.create_body(
        CollisionBounds::new(Vector3::new(0.5, 0.5, 0.5)),
        Transform::from_position(position),
    );
    world
        .get_body_mut(handle)
        .unwrap()
        .set_mass_matrix(1.0, Vector3::one());
    handle
}

/// Builds a chain of `count` bodies linked by ball joints at the midpoints
fn build_chain(world: &mut DynamicsWorld, count: usize) -> (Vec<BodyHandle>, Vec<joint_engine::ConstraintHandle>) {
    let bodies: Vec<BodyHandle> = (0..count)
        .map(|i| create_dynamic_body(world, Vector3::new(i as f32 * 2.0, 0.0, 0.0)))
        .collect();
    let joints = bodies
        .windows(2)
        .map(|pair| {
            let mid = (world.get_body(pair[0]).unwrap().get_position()
                + world.get_body(pair[1]).unwrap().get_position())
                * 0.5;
            world.create_ball_joint(mid, pair[0], Some(pair[1])).unwrap()
        })
        .collect();
    (bodies, joints)
}

#[test]
fn test_chain_connectivity_query() {
    let mut world = DynamicsWorld::new();
    let (bodies, joints) = build_chain(&mut world, 50);

    assert!(world
        .are_bodies_connected_by_joints(bodies[0], bodies[49])
        .unwrap());
    assert!(world
        .are_bodies_connected_by_joints(bodies[49], bodies[0])
        .unwrap());
    assert!(world
        .are_bodies_connected_by_joints(bodies[7], bodies[7])
        .unwrap());

    // Cutting the middle link splits the chain in two.
    world.destroy_joint(joints[24]).unwrap();
    assert!(!world
        .are_bodies_connected_by_joints(bodies[0], bodies[49])
        .unwrap());
    assert!(!world
        .are_bodies_connected_by_joints(bodies[49], bodies[0])
        .unwrap());
    assert!(world
        .are_bodies_connected_by_joints(bodies[0], bodies[24])
        .unwrap());
}

#[test]
fn test_chains_sharing_static_anchor_are_not_connected() {
    let mut world = DynamicsWorld::new();

    // Infinite mass, never made dynamic.
    let wall = world.create_body(
        CollisionBounds::new(Vector3::one()),
        Transform::from_position(Vector3::zero()),
    );
    let left = create_dynamic_body(&mut world, Vector3::new(-2.0, 0.0, 0.0));
    let right = create_dynamic_body(&mut world, Vector3::new(2.0, 0.0, 0.0));
    world
        .create_ball_joint(Vector3::new(-1.0, 0.0, 0.0), left, Some(wall))
        .unwrap();
    world
        .create_ball_joint(Vector3::new(1.0, 0.0, 0.0), right, Some(wall))
        .unwrap();

    assert!(world.are_bodies_connected_by_joints(left, wall).unwrap());
    assert!(world.are_bodies_connected_by_joints(right, wall).unwrap());
    assert!(!world.are_bodies_connected_by_joints(left, right).unwrap());
}

#[test]
fn test_island_sleeps_after_required_steps_and_wakes_on_impulse() {
    let mut world = DynamicsWorld::new();
    let body = create_dynamic_body(&mut world, Vector3::zero());

    // A first bucket that accepts any motion after three quiet steps.
    world
        .set_sleep_entry(
            0,
            SleepEntry {
                max_accel2: 1.0e6,
                max_alpha2: 1.0e6,
                max_veloc2: 1.0e6,
                max_omega2: 1.0e6,
                steps: 3,
            },
        )
        .unwrap();

    world
        .get_body_mut(body)
        .unwrap()
        .set_linear_velocity(Vector3::new(0.05, 0.0, 0.0));

    for step in 1..=3 {
        world.update(TIMESTEP).unwrap();
        assert!(
            !world.get_body(body).unwrap().is_sleeping(),
            "slept too early at step {}",
            step
        );
    }
    world.update(TIMESTEP).unwrap();
    assert!(world.get_body(body).unwrap().is_sleeping());
    assert!(world
        .get_body(body)
        .unwrap()
        .get_linear_velocity()
        .is_zero());

    world
        .add_body_impulse(body, Vector3::new(1.0, 0.0, 0.0), Vector3::zero())
        .unwrap();
    assert!(!world.get_body(body).unwrap().is_sleeping());
}

#[test]
fn test_auto_sleep_opt_out_keeps_island_awake() {
    let mut world = DynamicsWorld::new();
    let body = create_dynamic_body(&mut world, Vector3::zero());
    world.get_body_mut(body).unwrap().set_auto_sleep(false);
    world
        .set_sleep_entry(
            0,
            SleepEntry {
                max_accel2: 1.0e6,
                max_alpha2: 1.0e6,
                max_veloc2: 1.0e6,
                max_omega2: 1.0e6,
                steps: 1,
            },
        )
        .unwrap();

    for _ in 0..20 {
        world.update(TIMESTEP).unwrap();
    }
    assert!(!world.get_body(body).unwrap().is_sleeping());
}

#[test]
fn test_set_body_matrix_moves_whole_assembly() {
    let mut world = DynamicsWorld::new();
    let a = create_dynamic_body(&mut world, Vector3::zero());
    let b = create_dynamic_body(&mut world, Vector3::new(2.0, 0.0, 0.0));
    world
        .create_ball_joint(Vector3::new(1.0, 0.0, 0.0), a, Some(b))
        .unwrap();

    world
        .get_body_mut(b)
        .unwrap()
        .set_linear_velocity(Vector3::new(0.0, 3.0, 0.0));

    world
        .set_body_matrix(a, Transform::from_position(Vector3::new(10.0, 0.0, 0.0)))
        .unwrap();

    let pos_a = world.get_body(a).unwrap().get_position();
    let pos_b = world.get_body(b).unwrap().get_position();
    assert!((pos_a - Vector3::new(10.0, 0.0, 0.0)).length() < 1.0e-5);
    assert!((pos_b - Vector3::new(12.0, 0.0, 0.0)).length() < 1.0e-5);
    assert!(world.get_body(b).unwrap().get_linear_velocity().is_zero());
}

#[test]
fn test_leave_world_callback_fires_once() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_world_bounds(Aabb::new(
        Vector3::new(-1.0, -1.0, -1.0),
        Vector3::new(1.0, 1.0, 1.0),
    ));

    let escaped: Arc<Mutex<Vec<BodyHandle>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&escaped);
    world.set_leave_world_callback(move |handle| {
        sink.lock().unwrap().push(handle);
    });

    let body = create_dynamic_body(&mut world, Vector3::zero());
    world
        .get_body_mut(body)
        .unwrap()
        .set_linear_velocity(Vector3::new(10.0, 0.0, 0.0));

    for _ in 0..30 {
        world.update(TIMESTEP).unwrap();
    }

    let escaped = escaped.lock().unwrap();
    assert_eq!(escaped.as_slice(), &[body]);
    assert!(!world.get_body(body).unwrap().is_in_world());
}

#[test]
fn test_excessive_force_callback_reports_joint() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_solver_mode(SolverMode::Exact);
    world.set_excessive_force_threshold(1.0e-6);

    let reported: Arc<Mutex<Vec<(BodyHandle, joint_engine::ConstraintHandle)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    world.set_excessive_force_callback(move |body, joint| {
        sink.lock().unwrap().push((body, joint));
    });

    let bob = create_dynamic_body(&mut world, Vector3::new(1.0, 0.0, 0.0));
    world
        .get_body_mut(bob)
        .unwrap()
        .set_force_and_torque_callback(Box::new(|body, _dt| {
            let weight = Vector3::new(0.0, -9.8 * body.get_mass(), 0.0);
            body.apply_force(weight);
        }));
    let joint = world.create_ball_joint(Vector3::zero(), bob, None).unwrap();

    for _ in 0..5 {
        world.update(TIMESTEP).unwrap();
    }

    let reported = reported.lock().unwrap();
    assert!(
        reported.iter().any(|&(b, j)| b == bob && j == joint),
        "no excessive force reported"
    );
}

#[test]
fn test_excessive_force_uses_accumulated_reaction() {
    // A diagonal pull of (10, 10, 10) splits across the three anchor rows
    // as components of about 10 each, while the whole reaction is about
    // 17.3. A threshold between the two must still fire.
    let run = |threshold: f32| {
        let mut world = DynamicsWorld::new();
        world.set_sleep_enabled(false);
        world.set_solver_mode(SolverMode::Exact);
        world.set_excessive_force_threshold(threshold);

        let reported: Arc<Mutex<Vec<(BodyHandle, joint_engine::ConstraintHandle)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        world.set_excessive_force_callback(move |body, joint| {
            sink.lock().unwrap().push((body, joint));
        });

        let body = create_dynamic_body(&mut world, Vector3::zero());
        world
            .get_body_mut(body)
            .unwrap()
            .set_force_and_torque_callback(Box::new(|b, _dt| {
                b.apply_force(Vector3::new(10.0, 10.0, 10.0));
            }));
        let joint = world.create_ball_joint(Vector3::zero(), body, None).unwrap();

        for _ in 0..5 {
            world.update(TIMESTEP).unwrap();
        }
        let reported = reported.lock().unwrap();
        reported.iter().any(|&(b, j)| b == body && j == joint)
    };

    assert!(run(14.0), "accumulated reaction above threshold not reported");
    assert!(!run(20.0), "reaction below threshold reported");
}

#[test]
fn test_destroy_body_removes_attached_joints() {
    let mut world = DynamicsWorld::new();
    let (bodies, joints) = build_chain(&mut world, 3);

    world.destroy_body(bodies[1]).unwrap();
    assert_eq!(world.body_count(), 2);
    assert_eq!(world.joint_count(), 0);
    assert!(world.get_joint(joints[0]).is_err());
    assert!(world.get_joint(joints[1]).is_err());

    // The survivors still simulate.
    world.update(TIMESTEP).unwrap();
}

#[test]
fn test_static_body_ignores_impulses() {
    let mut world = DynamicsWorld::new();
    let wall = world.create_body(
        CollisionBounds::new(Vector3::one()),
        Transform::from_position(Vector3::zero()),
    );

    world
        .add_body_impulse(wall, Vector3::new(100.0, 0.0, 0.0), Vector3::zero())
        .unwrap();
    assert!(world.get_body(wall).unwrap().get_linear_velocity().is_zero());

    world.update(TIMESTEP).unwrap();
    assert!(world.get_body(wall).unwrap().get_position().is_zero());
}

#[test]
fn test_update_rejects_bad_timestep() {
    let mut world = DynamicsWorld::new();
    assert!(world.update(0.0).is_err());
    assert!(world.update(-1.0).is_err());
    assert!(world.update(f32::NAN).is_err());
}
