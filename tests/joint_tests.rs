use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use joint_engine::bodies::CollisionBounds;
use joint_engine::constraints::Joint;
use joint_engine::core::DynamicsWorld;
use joint_engine::math::{Matrix3, Transform, Vector3};
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

fn attach_gravity(world: &mut DynamicsWorld, handle: BodyHandle) {
    world
        .get_body_mut(handle)
        .unwrap()
        .set_force_and_torque_callback(Box::new(|body, _dt| {
            let weight = Vector3::new(0.0, -9.8 * body.get_mass(), 0.0);
            body.apply_force(weight);
        }));
}

/// World-space anchor position computed from a body's side of a joint
fn anchor_position(world: &DynamicsWorld, joint: &Joint, from_body0: bool) -> Vector3 {
    let base = joint.base();
    if from_body0 {
        let body = world.get_body(base.get_body0()).unwrap();
        body.get_transform()
            .transform(&base.get_local_matrix0())
            .position
    } else {
        match base.get_body1() {
            Some(handle) => {
                let body = world.get_body(handle).unwrap();
                body.get_transform()
                    .transform(&base.get_local_matrix1())
                    .position
            }
            None => base.get_local_matrix1().position,
        }
    }
}

#[test]
fn test_ball_pendulum_pivot_stays_pinned() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_solver_mode(joint_engine::core::SolverMode::Exact);

    let bob = create_dynamic_body(&mut world, Vector3::new(1.0, 0.0, 0.0));
    attach_gravity(&mut world, bob);
    let joint = world
        .create_ball_joint(Vector3::zero(), bob, None)
        .unwrap();

    let start = world.get_body(bob).unwrap().get_position();
    for _ in 0..60 {
        world.update(TIMESTEP).unwrap();
    }

    // The bob swings, yet its anchor point stays at the world pivot.
    let moved = (world.get_body(bob).unwrap().get_position() - start).length();
    assert!(moved > 0.1, "pendulum did not move, traveled {}", moved);

    let joint_ref = world.get_joint(joint).unwrap();
    let anchor0 = anchor_position(&world, joint_ref, true);
    let anchor1 = anchor_position(&world, joint_ref, false);
    assert!(
        (anchor0 - anchor1).length() < 0.05,
        "pivot drifted by {}",
        (anchor0 - anchor1).length()
    );
}

#[test]
fn test_ball_pivot_coincides_between_two_bodies() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_solver_mode(joint_engine::core::SolverMode::Exact);

    let a = create_dynamic_body(&mut world, Vector3::zero());
    let b = create_dynamic_body(&mut world, Vector3::new(2.0, 0.0, 0.0));
    let joint = world
        .create_ball_joint(Vector3::new(1.0, 0.0, 0.0), a, Some(b))
        .unwrap();

    world
        .get_body_mut(a)
        .unwrap()
        .set_linear_velocity(Vector3::new(0.0, 1.0, 0.0));
    for _ in 0..30 {
        world.update(TIMESTEP).unwrap();
    }

    let joint_ref = world.get_joint(joint).unwrap();
    let anchor0 = anchor_position(&world, joint_ref, true);
    let anchor1 = anchor_position(&world, joint_ref, false);
    assert!(
        (anchor0 - anchor1).length() < 1.0e-2,
        "pivot drifted by {}",
        (anchor0 - anchor1).length()
    );
}

#[test]
fn test_hinge_suppresses_off_axis_rotation() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_solver_mode(joint_engine::core::SolverMode::Exact);

    let body = create_dynamic_body(&mut world, Vector3::zero());
    let joint = world
        .create_hinge_joint(Vector3::zero(), Vector3::new(0.0, 0.0, 1.0), body, None)
        .unwrap();

    // Angular velocity orthogonal to the hinge axis must be absorbed. The
    // stabilization transient takes a few dozen steps to bleed off.
    world
        .get_body_mut(body)
        .unwrap()
        .set_angular_velocity(Vector3::new(2.0, 0.0, 0.0));
    for _ in 0..40 {
        world.update(TIMESTEP).unwrap();
    }

    let omega = world.get_body(body).unwrap().get_angular_velocity();
    assert!(omega.x.abs() < 1.0e-3, "omega.x = {}", omega.x);
    assert!(omega.y.abs() < 1.0e-3, "omega.y = {}", omega.y);

    let joint_ref = world.get_joint(joint).unwrap();
    let base = joint_ref.base();
    let front0 = world
        .get_body(body)
        .unwrap()
        .get_transform()
        .transform(&base.get_local_matrix0())
        .basis
        .front();
    let front1 = base.get_local_matrix1().basis.front();
    assert_relative_eq!(front0.dot(front1), 1.0, epsilon = 1.0e-3);
}

#[test]
fn test_hinge_spin_about_free_axis_survives() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);

    let body = create_dynamic_body(&mut world, Vector3::zero());
    world
        .create_hinge_joint(Vector3::zero(), Vector3::new(0.0, 0.0, 1.0), body, None)
        .unwrap();

    world
        .get_body_mut(body)
        .unwrap()
        .set_angular_damping(0.0);
    world
        .get_body_mut(body)
        .unwrap()
        .set_angular_velocity(Vector3::new(0.0, 0.0, 3.0));
    for _ in 0..10 {
        world.update(TIMESTEP).unwrap();
    }

    let omega = world.get_body(body).unwrap().get_angular_velocity();
    assert_relative_eq!(omega.z, 3.0, epsilon = 1.0e-2);
}

#[test]
fn test_anchor_frames_stay_orthonormal_for_random_pins() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut world = DynamicsWorld::new();

    for _ in 0..50 {
        let position = Vector3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        );
        let axis = Vector3::new(
            rng.gen_range(-1.0..1.0_f32),
            rng.gen_range(-1.0..1.0_f32),
            rng.gen_range(-1.0..1.0_f32),
        )
        .normalize_or_fallback();
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);

        let handle = world.create_body(
            CollisionBounds::new(Vector3::new(0.5, 0.5, 0.5)),
            Transform::new(position, Matrix3::from_axis_angle(axis, angle)),
        );
        world
            .get_body_mut(handle)
            .unwrap()
            .set_mass_matrix(1.0, Vector3::one());

        // Pins kept away from zero length so construction cannot fail.
        let pin = Vector3::new(
            rng.gen_range(0.5..1.5),
            rng.gen_range(-1.5..1.5),
            rng.gen_range(-1.5..1.5),
        );
        let pivot = position + Vector3::new(0.0, 1.0, 0.0);
        let joint = world.create_hinge_joint(pivot, pin, handle, None).unwrap();

        let base = world.get_joint(joint).unwrap().base();
        assert!(base.get_local_matrix0().basis.orthonormal_error() < 1.0e-5);
        assert!(base.get_local_matrix1().basis.orthonormal_error() < 1.0e-5);
    }
}

#[test]
fn test_slider_constrains_transverse_motion() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_solver_mode(joint_engine::core::SolverMode::Exact);

    let body = create_dynamic_body(&mut world, Vector3::zero());
    world
        .create_slider_joint(Vector3::zero(), Vector3::new(1.0, 0.0, 0.0), body, None)
        .unwrap();

    // Enough steps for the spring-damper to pull the transverse
    // component back down, short enough that damping keeps the slide.
    world
        .get_body_mut(body)
        .unwrap()
        .set_linear_velocity(Vector3::new(1.0, 1.0, 0.0));
    for _ in 0..40 {
        world.update(TIMESTEP).unwrap();
    }

    let body_ref = world.get_body(body).unwrap();
    let velocity = body_ref.get_linear_velocity();
    assert!(velocity.y.abs() < 1.0e-3, "transverse velocity {}", velocity.y);
    assert!(velocity.x > 0.5, "slide velocity lost: {}", velocity.x);
    assert!(body_ref.get_position().y.abs() < 1.0e-2);
}

#[test]
fn test_up_vector_keeps_body_upright() {
    let mut world = DynamicsWorld::new();
    world.set_sleep_enabled(false);
    world.set_solver_mode(joint_engine::core::SolverMode::Exact);

    let body = create_dynamic_body(&mut world, Vector3::zero());
    let joint = world
        .create_up_vector_joint(Vector3::new(0.0, 1.0, 0.0), body)
        .unwrap();

    world
        .get_body_mut(body)
        .unwrap()
        .set_angular_velocity(Vector3::new(3.0, 0.0, 0.0));
    for _ in 0..30 {
        world.update(TIMESTEP).unwrap();
    }

    let base = world.get_joint(joint).unwrap().base();
    let aligned = world
        .get_body(body)
        .unwrap()
        .get_transform()
        .transform(&base.get_local_matrix0())
        .basis
        .front();
    assert!(
        aligned.dot(Vector3::new(0.0, 1.0, 0.0)) > 0.99,
        "body tilted away from the pin: {:?}",
        aligned
    );
}

#[test]
fn test_joint_factories_reject_bad_input() {
    let mut world = DynamicsWorld::new();
    let body = create_dynamic_body(&mut world, Vector3::zero());

    // Aliased bodies.
    assert!(world
        .create_ball_joint(Vector3::zero(), body, Some(body))
        .is_err());
    // Unknown body.
    assert!(world
        .create_ball_joint(Vector3::zero(), BodyHandle(9999), None)
        .is_err());
    // Degenerate pin.
    assert!(world
        .create_hinge_joint(Vector3::zero(), Vector3::zero(), body, None)
        .is_err());
    // Parallel universal pins.
    assert!(world
        .create_universal_joint(
            Vector3::zero(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            body,
            None,
        )
        .is_err());
}
