use crate::core::solver::IslandWorkload;

/// World-owned scratch for the per-step solve.
///
/// Workload buffers are pooled across steps and grown only on the world
/// thread, before islands are handed to workers.
pub(crate) struct SimulationContext {
    workloads: Vec<IslandWorkload>,

    /// Workloads in use this step
    active: usize,
}

impl SimulationContext {
    pub fn new() -> Self {
        Self {
            workloads: Vec::new(),
            active: 0,
        }
    }

    /// Makes sure one cleared workload exists per island.
    ///
    /// Must be called before the parallel section; workers never grow
    /// these buffers.
    pub fn prepare(&mut self, island_count: usize) -> &mut [IslandWorkload] {
        if self.workloads.len() < island_count {
            self.workloads
                .resize_with(island_count, IslandWorkload::new);
        }
        self.active = island_count;
        for workload in self.workloads.iter_mut().take(island_count) {
            workload.clear();
        }
        &mut self.workloads[..island_count]
    }

    /// Returns the workloads filled by the last [`prepare`](Self::prepare)
    pub fn prepare_filled(&mut self) -> &mut [IslandWorkload] {
        &mut self.workloads[..self.active]
    }
}
