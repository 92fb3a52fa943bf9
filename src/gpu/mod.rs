//! The GPU backend collaborator.
//!
//! Three buffer kinds are modeled directly on a GPU module's packed
//! `gpu_bpm_buffer_t` family: `fmi_search`, `fmi_decode`, `align_bpm`. Each
//! exposes `reserve`/`push`/`submit`/`wait`/`pull`. This crate ships only
//! [`NullGpuBackend`], which always reports the buffers unavailable,
//! driving the `gpu-transient` to CPU-fallback path. Real GPU backends are
//! out of scope.

use crate::errors::GemError;

/// Work item for the `fmi_search` buffer kind: one seed's backward-search
/// request against the FM-index.
#[derive(Debug, Clone)]
pub struct FmiSearchItem {
    pub seed: Vec<u8>,
    pub read_id: u64,
}

/// Work item for the `fmi_decode` buffer kind: one SA interval entry to
/// decode into a text position.
#[derive(Debug, Clone, Copy)]
pub struct FmiDecodeItem {
    pub sa_index: u64,
    pub read_id: u64,
}

/// Work item for the `align_bpm` buffer kind: one candidate region to verify
/// with the bit-parallel Myers filter.
#[derive(Debug, Clone)]
pub struct AlignBpmItem {
    pub peq_words: Vec<u64>,
    pub text_begin: u64,
    pub text_end: u64,
    pub max_error: u32,
    pub read_id: u64,
}

/// Result of one `align_bpm` work item, as the GPU buffer would hand it back.
#[derive(Debug, Clone, Copy)]
pub struct AlignBpmResult {
    pub read_id: u64,
    pub best_column: u64,
    pub best_score: u32,
}

/// Common shape of a GPU staging buffer: single-producer/single-consumer,
/// never shared across worker threads.
pub trait GpuBuffer<Item, Result> {
    /// Reserve capacity for `n` more items; returns `false` if the buffer is full.
    fn reserve(&mut self, n: usize) -> bool;
    /// Append a work item. Caller must have reserved capacity for it.
    fn push(&mut self, item: Item);
    /// Submit the buffer asynchronously. Returns `GpuTransient` on failure.
    fn submit(&mut self) -> Result_<(), GemError>;
    /// Block until the submitted buffer has completed.
    fn wait(&mut self) -> Result_<(), GemError>;
    /// Drain results in issue order.
    fn pull(&mut self) -> Vec<Result>;
    /// Number of items currently staged but not yet submitted.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Alias to avoid clashing with the `Result` type parameter name above.
type Result_<T, E> = std::result::Result<T, E>;

pub trait FmiSearchBuffer: GpuBuffer<FmiSearchItem, (u64, u64, u64)> {}
pub trait FmiDecodeBuffer: GpuBuffer<FmiDecodeItem, (u64, u64)> {}
pub trait AlignBpmBuffer: GpuBuffer<AlignBpmItem, AlignBpmResult> {}

/// The GPU backend a worker reserves buffers from.
pub trait GpuBackend: Send + Sync {
    fn is_available(&self) -> bool;
    fn new_fmi_search_buffer(&self, capacity: usize) -> Box<dyn FmiSearchBuffer>;
    fn new_fmi_decode_buffer(&self, capacity: usize) -> Box<dyn FmiDecodeBuffer>;
    fn new_align_bpm_buffer(&self, capacity: usize) -> Box<dyn AlignBpmBuffer>;
}

/// Always-unavailable backend. `submit`/`wait` fail with `GpuTransient`,
/// which drives callers back onto the CPU BPM path.
pub struct NullGpuBackend;

impl GpuBackend for NullGpuBackend {
    fn is_available(&self) -> bool {
        false
    }

    fn new_fmi_search_buffer(&self, capacity: usize) -> Box<dyn FmiSearchBuffer> {
        Box::new(NullBuffer::<FmiSearchItem, (u64, u64, u64)>::new(capacity))
    }

    fn new_fmi_decode_buffer(&self, capacity: usize) -> Box<dyn FmiDecodeBuffer> {
        Box::new(NullBuffer::<FmiDecodeItem, (u64, u64)>::new(capacity))
    }

    fn new_align_bpm_buffer(&self, capacity: usize) -> Box<dyn AlignBpmBuffer> {
        Box::new(NullBuffer::<AlignBpmItem, AlignBpmResult>::new(capacity))
    }
}

struct NullBuffer<Item, Result> {
    capacity: usize,
    items: Vec<Item>,
    _marker: std::marker::PhantomData<Result>,
}

impl<Item, Result> NullBuffer<Item, Result> {
    fn new(capacity: usize) -> Self {
        NullBuffer {
            capacity,
            items: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<Item, Result> GpuBuffer<Item, Result> for NullBuffer<Item, Result> {
    fn reserve(&mut self, n: usize) -> bool {
        self.items.len() + n <= self.capacity
    }

    fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    fn submit(&mut self) -> Result_<(), GemError> {
        Err(GemError::GpuTransient(
            "no GPU backend available".to_string(),
        ))
    }

    fn wait(&mut self) -> Result_<(), GemError> {
        Err(GemError::GpuTransient(
            "no GPU backend available".to_string(),
        ))
    }

    fn pull(&mut self) -> Vec<Result> {
        Vec::new()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl FmiSearchBuffer for NullBuffer<FmiSearchItem, (u64, u64, u64)> {}
impl FmiDecodeBuffer for NullBuffer<FmiDecodeItem, (u64, u64)> {}
impl AlignBpmBuffer for NullBuffer<AlignBpmItem, AlignBpmResult> {}
