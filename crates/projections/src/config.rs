//! Projection engine configuration.

/// Sizing of the ingestion pool and subscription buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionConfig {
    /// Number of ingestion partitions (one worker task each).
    pub workers: usize,
    /// Events buffered per partition before `submit` waits.
    pub ingest_queue_capacity: usize,
    /// Updates buffered per subscription before it is dropped as lagged.
    pub subscription_capacity: usize,
}

impl ProjectionConfig {
    /// Sets the number of ingestion partitions (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the per-partition queue capacity (at least 1).
    pub fn with_ingest_queue_capacity(mut self, capacity: usize) -> Self {
        self.ingest_queue_capacity = capacity.max(1);
        self
    }

    /// Sets the per-subscription buffer (at least 1).
    pub fn with_subscription_capacity(mut self, capacity: usize) -> Self {
        self.subscription_capacity = capacity.max(1);
        self
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            ingest_queue_capacity: 1024,
            subscription_capacity: 64,
        }
    }
}
