use std::collections::{HashMap, HashSet, VecDeque};

use crate::bodies::RigidBody;
use crate::constraints::Joint;
use crate::core::{BodyHandle, BodyStorage, ConstraintHandle, ConstraintStorage};

/// A maximal connected group of dynamic bodies and the joints between
/// them, solved independently of other islands within one step.
#[derive(Debug, Clone, Default)]
pub struct Island {
    /// Dynamic members; static anchors are not listed
    pub bodies: Vec<BodyHandle>,

    /// Joints whose row groups belong to this island
    pub joints: Vec<ConstraintHandle>,
}

/// Partitions the awake part of the world into islands.
///
/// Traversal starts from awake dynamic bodies and crosses joint edges
/// between dynamic bodies only: a static anchor never merges the islands
/// hanging off it. Sleeping bodies pulled in by an awake neighbor become
/// island members (the world wakes them before solving).
pub(crate) fn build_islands(
    bodies: &BodyStorage<RigidBody>,
    joints: &ConstraintStorage<Joint>,
    adjacency: &HashMap<BodyHandle, Vec<ConstraintHandle>>,
) -> Vec<Island> {
    let mut islands = Vec::new();
    let mut visited_bodies: HashSet<BodyHandle> = HashSet::new();
    let mut visited_joints: HashSet<ConstraintHandle> = HashSet::new();
    let mut queue: VecDeque<BodyHandle> = VecDeque::new();

    for seed in bodies.handles() {
        let body = match bodies.get(seed) {
            Some(body) => body,
            None => continue,
        };
        if body.is_static() || body.is_sleeping() || visited_bodies.contains(&seed) {
            continue;
        }

        let mut island = Island::default();
        visited_bodies.insert(seed);
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            island.bodies.push(current);

            let edges = match adjacency.get(&current) {
                Some(edges) => edges,
                None => continue,
            };
            for &edge in edges {
                let joint = match joints.get(edge) {
                    Some(joint) => joint,
                    None => continue,
                };
                if visited_joints.insert(edge) {
                    island.joints.push(edge);
                }

                let other = if joint.get_body0() == current {
                    joint.get_body1()
                } else {
                    Some(joint.get_body0())
                };
                if let Some(other) = other {
                    if let Some(other_body) = bodies.get(other) {
                        if !other_body.is_static() && visited_bodies.insert(other) {
                            queue.push_back(other);
                        }
                    }
                }
            }
        }

        island.bodies.sort();
        island.joints.sort();
        islands.push(island);
    }

    islands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::CollisionBounds;
    use crate::constraints::BallJoint;
    use crate::math::{Transform, Vector3};

    fn make_world_parts() -> (BodyStorage<RigidBody>, ConstraintStorage<Joint>) {
        (BodyStorage::new(), ConstraintStorage::new())
    }

    fn add_body(bodies: &mut BodyStorage<RigidBody>, position: Vector3, dynamic: bool) -> BodyHandle {
        let mut body = RigidBody::new(
            CollisionBounds::new(Vector3::new(0.5, 0.5, 0.5)),
            Transform::from_position(position),
        );
        if dynamic {
            body.set_mass_matrix(1.0, Vector3::one());
        }
        bodies.insert(body)
    }

    fn link(
        bodies: &BodyStorage<RigidBody>,
        joints: &mut ConstraintStorage<Joint>,
        adjacency: &mut HashMap<BodyHandle, Vec<ConstraintHandle>>,
        a: BodyHandle,
        b: BodyHandle,
    ) -> ConstraintHandle {
        let pivot = (bodies.get(a).unwrap().get_transform().position
            + bodies.get(b).unwrap().get_transform().position)
            * 0.5;
        let joint = BallJoint::new(
            pivot,
            a,
            Some(b),
            &bodies.get(a).unwrap().get_transform(),
            &bodies.get(b).unwrap().get_transform(),
        )
        .unwrap();
        let handle = joints.insert(Joint::Ball(joint));
        adjacency.entry(a).or_default().push(handle);
        adjacency.entry(b).or_default().push(handle);
        handle
    }

    #[test]
    fn test_static_anchor_does_not_merge_islands() {
        let (mut bodies, mut joints) = make_world_parts();
        let mut adjacency = HashMap::new();

        let anchor = add_body(&mut bodies, Vector3::zero(), false);
        let left = add_body(&mut bodies, Vector3::new(-2.0, 0.0, 0.0), true);
        let right = add_body(&mut bodies, Vector3::new(2.0, 0.0, 0.0), true);
        link(&bodies, &mut joints, &mut adjacency, left, anchor);
        link(&bodies, &mut joints, &mut adjacency, right, anchor);

        let islands = build_islands(&bodies, &joints, &adjacency);
        assert_eq!(islands.len(), 2);
        for island in &islands {
            assert_eq!(island.bodies.len(), 1);
            assert_eq!(island.joints.len(), 1);
        }
    }

    #[test]
    fn test_chain_forms_one_island() {
        let (mut bodies, mut joints) = make_world_parts();
        let mut adjacency = HashMap::new();

        let handles: Vec<BodyHandle> = (0..5)
            .map(|i| add_body(&mut bodies, Vector3::new(i as f32, 0.0, 0.0), true))
            .collect();
        for pair in handles.windows(2) {
            link(&bodies, &mut joints, &mut adjacency, pair[0], pair[1]);
        }

        let islands = build_islands(&bodies, &joints, &adjacency);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].bodies.len(), 5);
        assert_eq!(islands[0].joints.len(), 4);
    }
}
