//! VM configuration

use memory_manager::HeapConfig;
use serde::{Deserialize, Serialize};

/// Default limit on nested frames
pub const DEFAULT_MAX_FRAMES: usize = 64;

/// Settings for one VM instance.
///
/// Deserializes from JSON with every key optional:
///
/// ```
/// use interpreter::VmConfig;
///
/// let config = VmConfig::default().with_max_frames(128).with_trace(true);
/// assert_eq!(config.max_frames, 128);
/// assert!(config.trace);
/// assert_eq!(config.heap.int_pool_capacity, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum number of frames on the call stack
    pub max_frames: usize,
    /// Heap tuning
    pub heap: HeapConfig,
    /// Log every executed instruction at `info` level
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            heap: HeapConfig::default(),
            trace: false,
        }
    }
}

impl VmConfig {
    /// Set the frame limit
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Replace the heap settings
    pub fn with_heap(mut self, heap: HeapConfig) -> Self {
        self.heap = heap;
        self
    }

    /// Enable or disable instruction tracing
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
