//! Pipeline configuration

/// Tunables for the ordered worker pool.
///
/// The queue capacities bound in-flight work; the algorithm itself does not
/// depend on them. A worker output capacity of 0 gives a rendezvous between
/// a worker finishing a job and the resolver absorbing it.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent derivation workers
    pub workers: usize,
    /// Inclusive tier bound handed to each job's `derivate_until`
    pub max_tiers: u32,
    /// Capacity of the submission queue
    pub input_capacity: usize,
    /// Capacity of the shared work queue
    pub work_capacity: usize,
    /// Capacity of each worker's output queue
    pub worker_output_capacity: usize,
    /// Capacity of the resolved output queue
    pub output_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: rayon::current_num_threads(),
            max_tiers: 15,
            input_capacity: 5,
            work_capacity: 5,
            worker_output_capacity: 0,
            output_capacity: 5,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_tiers(mut self, max_tiers: u32) -> Self {
        self.max_tiers = max_tiers;
        self
    }
}
