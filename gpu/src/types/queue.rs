//! Queue classification.

/// The kind of work a queue executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    /// Graphics, compute and transfer work.
    Graphics,
    /// Compute and transfer work.
    Compute,
    /// Transfer work only.
    Transfer,
    /// Video decoding.
    VideoDecode,
    /// Video encoding.
    VideoEncode,
}

/// Scheduling priority of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum QueuePriority {
    /// Default priority.
    #[default]
    Normal = 33,
    /// Elevated priority.
    High = 66,
    /// Highest priority, may require elevated process privileges.
    Realtime = 100,
}

impl QueuePriority {
    /// Priority normalized to the `0.0..=1.0` range.
    pub fn normalized(self) -> f32 {
        self as u32 as f32 / 100.0
    }
}
