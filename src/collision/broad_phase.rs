use std::collections::HashMap;

use crate::core::BodyHandle;
use crate::math::Aabb;

/// A candidate overlap produced by the broad-phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePair {
    /// The first body of the pair
    pub body_a: BodyHandle,

    /// The second body of the pair
    pub body_b: BodyHandle,
}

/// Trait for broad-phase overlap detection collaborators.
///
/// The world keeps each body's placement current through `add`/`remove`/
/// `update` and calls `refresh` once per step to collect candidate pairs.
pub trait BroadPhase: Send {
    /// Registers a body with its current world AABB
    fn add(&mut self, handle: BodyHandle, aabb: Aabb);

    /// Removes a body from the broad-phase
    fn remove(&mut self, handle: BodyHandle);

    /// Updates a body's world AABB
    fn update(&mut self, handle: BodyHandle, aabb: Aabb);

    /// Recomputes and returns all candidate overlap pairs
    fn refresh(&mut self) -> Vec<CandidatePair>;
}

/// Simple brute-force broad-phase over stored AABBs
pub struct SweepBroadPhase {
    /// The bodies in the broad-phase and their AABBs
    bodies: HashMap<BodyHandle, Aabb>,
}

impl SweepBroadPhase {
    /// Creates a new empty broad-phase
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
        }
    }

    /// Returns the number of registered bodies
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Returns whether the broad-phase is empty
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl Default for SweepBroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadPhase for SweepBroadPhase {
    fn add(&mut self, handle: BodyHandle, aabb: Aabb) {
        self.bodies.insert(handle, aabb);
    }

    fn remove(&mut self, handle: BodyHandle) {
        self.bodies.remove(&handle);
    }

    fn update(&mut self, handle: BodyHandle, aabb: Aabb) {
        if let Some(stored) = self.bodies.get_mut(&handle) {
            *stored = aabb;
        }
    }

    fn refresh(&mut self) -> Vec<CandidatePair> {
        // Deterministic pair order: sort by handle before the O(n^2) sweep.
        let mut entries: Vec<(BodyHandle, Aabb)> =
            self.bodies.iter().map(|(h, aabb)| (*h, *aabb)).collect();
        entries.sort_by_key(|(handle, _)| *handle);

        let mut pairs = Vec::new();
        for i in 0..entries.len() {
            let (handle_a, aabb_a) = entries[i];
            for &(handle_b, aabb_b) in entries.iter().skip(i + 1) {
                if aabb_a.intersects(&aabb_b) {
                    pairs.push(CandidatePair {
                        body_a: handle_a,
                        body_b: handle_b,
                    });
                }
            }
        }

        pairs
    }
}
