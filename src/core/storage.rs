use std::collections::HashMap;

use crate::core::{BodyHandle, ConstraintHandle};

/// Handle-based storage for rigid bodies.
///
/// Handles are unique for the lifetime of the storage; ids increase
/// monotonically and are never reused.
pub struct BodyStorage<T> {
    items: HashMap<BodyHandle, T>,
    next_id: u32,
}

impl<T> BodyStorage<T> {
    /// Creates an empty storage
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
        }
    }

    /// Inserts an item and returns its new handle
    pub fn insert(&mut self, item: T) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;
        self.items.insert(handle, item);
        handle
    }

    /// Removes an item, returning it if the handle was live
    pub fn remove(&mut self, handle: BodyHandle) -> Option<T> {
        self.items.remove(&handle)
    }

    /// Returns a reference to an item
    pub fn get(&self, handle: BodyHandle) -> Option<&T> {
        self.items.get(&handle)
    }

    /// Returns a mutable reference to an item
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut T> {
        self.items.get_mut(&handle)
    }

    /// Returns whether a handle is live
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.items.contains_key(&handle)
    }

    /// Iterates over all items
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &T)> {
        self.items.iter().map(|(handle, item)| (*handle, item))
    }

    /// Iterates mutably over all items
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut T)> {
        self.items.iter_mut().map(|(handle, item)| (*handle, item))
    }

    /// Collects the live handles, sorted for deterministic iteration
    pub fn handles(&self) -> Vec<BodyHandle> {
        let mut handles: Vec<BodyHandle> = self.items.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Returns the number of live items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for BodyStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle-based storage for joints, mirroring [`BodyStorage`]
pub struct ConstraintStorage<T> {
    items: HashMap<ConstraintHandle, T>,
    next_id: u32,
}

impl<T> ConstraintStorage<T> {
    /// Creates an empty storage
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
        }
    }

    /// Inserts an item and returns its new handle
    pub fn insert(&mut self, item: T) -> ConstraintHandle {
        let handle = ConstraintHandle(self.next_id);
        self.next_id += 1;
        self.items.insert(handle, item);
        handle
    }

    /// Removes an item, returning it if the handle was live
    pub fn remove(&mut self, handle: ConstraintHandle) -> Option<T> {
        self.items.remove(&handle)
    }

    /// Returns a reference to an item
    pub fn get(&self, handle: ConstraintHandle) -> Option<&T> {
        self.items.get(&handle)
    }

    /// Returns a mutable reference to an item
    pub fn get_mut(&mut self, handle: ConstraintHandle) -> Option<&mut T> {
        self.items.get_mut(&handle)
    }

    /// Returns whether a handle is live
    pub fn contains(&self, handle: ConstraintHandle) -> bool {
        self.items.contains_key(&handle)
    }

    /// Iterates over all items
    pub fn iter(&self) -> impl Iterator<Item = (ConstraintHandle, &T)> {
        self.items.iter().map(|(handle, item)| (*handle, item))
    }

    /// Collects the live handles, sorted for deterministic iteration
    pub fn handles(&self) -> Vec<ConstraintHandle> {
        let mut handles: Vec<ConstraintHandle> = self.items.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Returns the number of live items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for ConstraintStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}
