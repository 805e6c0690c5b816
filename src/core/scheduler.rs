use crate::core::solver::{self, IslandWorkload};

/// Distributes island solves over a fixed number of worker threads.
///
/// The thread count is chosen once, at the world's first update. Islands
/// never share bodies, so workers operate on disjoint workloads.
pub(crate) struct IslandScheduler {
    thread_count: usize,
}

impl IslandScheduler {
    /// Creates a scheduler; `configured` of 0 picks the hardware count
    pub fn new(configured: usize) -> Self {
        let thread_count = if configured > 0 {
            configured
        } else {
            detect_thread_count()
        };
        Self {
            thread_count: thread_count.max(1),
        }
    }

    /// Solves every workload, on workers when it pays off.
    ///
    /// A single island runs inline unless `thread_single_island` forces it
    /// onto a worker anyway.
    pub fn solve_islands(
        &self,
        workloads: &mut [IslandWorkload],
        iterations: usize,
        chunked: bool,
        thread_single_island: bool,
    ) {
        for workload in workloads.iter_mut() {
            solver::prepare_rows(workload);
        }

        let parallel = self.thread_count > 1 && (workloads.len() > 1 || thread_single_island);
        if !parallel {
            for workload in workloads.iter_mut() {
                solver::solve_workload(workload, iterations, chunked);
            }
            return;
        }

        let chunk_size = workloads.len().div_ceil(self.thread_count);
        std::thread::scope(|scope| {
            for slice in workloads.chunks_mut(chunk_size) {
                scope.spawn(move || {
                    for workload in slice.iter_mut() {
                        solver::solve_workload(workload, iterations, chunked);
                    }
                });
            }
        });
    }
}

#[cfg(feature = "parallel")]
fn detect_thread_count() -> usize {
    num_cpus::get()
}

#[cfg(not(feature = "parallel"))]
fn detect_thread_count() -> usize {
    1
}
