/// Configuration for batch loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Examples per batch
    pub batch_size: usize,

    /// Batches the prefetch worker may run ahead of the consumer
    pub prefetch_batches: usize,

    /// Discard a trailing batch smaller than `batch_size`
    pub drop_last: bool,

    /// Gather the examples of one batch on the rayon pool
    pub parallel: bool,
}

impl LoaderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set examples per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set prefetch queue depth
    pub fn with_prefetch_batches(mut self, n: usize) -> Self {
        self.prefetch_batches = n.max(1);
        self
    }

    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            prefetch_batches: 2,
            drop_last: false,
            parallel: true,
        }
    }
}
