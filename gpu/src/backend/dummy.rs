//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. Every native call is
//! appended to a [`DummyJournal`] shared by all objects of a device, so tests
//! can assert how many barrier calls or submissions were issued. Queue fences
//! complete immediately when the device is created with auto completion, or
//! when the test calls [`DummyQueue::complete`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::barrier::Barrier;
use crate::command::CommandBuffer;
use crate::layout::LayoutPlan;
use crate::types::{QueuePriority, QueueType};

use super::{NativeCommandBuffer, NativeDescriptorSetLayout, NativeLayout, NativePipelineLayout};

/// A native call recorded by the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyCall {
    /// A queue was created.
    CreateQueue {
        /// Queue id.
        queue: u64,
        /// Queue type.
        queue_type: QueueType,
    },
    /// A command buffer was allocated.
    AllocateCommandBuffer {
        /// Owning queue.
        queue: u64,
        /// Command buffer id.
        command_buffer: u64,
        /// Primary or secondary level.
        primary: bool,
    },
    /// Recording began.
    Begin {
        /// Command buffer id.
        command_buffer: u64,
    },
    /// Recording ended.
    End {
        /// Command buffer id.
        command_buffer: u64,
    },
    /// A barrier was recorded.
    PipelineBarrier {
        /// Command buffer id.
        command_buffer: u64,
        /// Number of global transitions.
        globals: usize,
        /// Number of buffer transitions.
        buffers: usize,
        /// Number of image transitions.
        images: usize,
    },
    /// Command buffers were executed.
    Execute {
        /// Queue id.
        queue: u64,
        /// Executed command buffers.
        command_buffers: Vec<u64>,
    },
    /// The queue fence was signaled.
    Signal {
        /// Queue id.
        queue: u64,
        /// Signaled value.
        value: u64,
    },
    /// The CPU blocked on the queue fence.
    Wait {
        /// Queue id.
        queue: u64,
        /// Awaited value.
        value: u64,
    },
    /// A GPU-side wait on another queue was inserted.
    WaitForQueue {
        /// Waiting queue.
        queue: u64,
        /// Queue waited on.
        other: u64,
        /// Awaited value.
        value: u64,
    },
    /// A descriptor set layout was created.
    CreateDescriptorSetLayout {
        /// Space of the set.
        space: u32,
        /// Number of bindings.
        bindings: usize,
    },
    /// A pipeline layout was created.
    CreatePipelineLayout {
        /// Spaces of the declared sets.
        spaces: Vec<u32>,
        /// Number of push constant ranges.
        push_constant_ranges: usize,
        /// Whether a default input attachment sampler was synthesized.
        default_sampler: bool,
    },
}

/// Log of native calls issued through a dummy device.
#[derive(Debug, Default)]
pub struct DummyJournal {
    calls: Mutex<Vec<DummyCall>>,
}

impl DummyJournal {
    fn record(&self, call: DummyCall) {
        log::trace!("DummyBackend: {call:?}");
        self.calls.lock().push(call);
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<DummyCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DummyCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Number of recorded barrier calls.
    pub fn barrier_calls(&self) -> usize {
        self.count(|call| matches!(call, DummyCall::PipelineBarrier { .. }))
    }

    /// Forget all recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Dummy device.
#[derive(Debug)]
pub struct DummyDevice {
    journal: Arc<DummyJournal>,
    auto_complete: bool,
    next_id: Arc<AtomicU64>,
}

impl DummyDevice {
    /// Create a dummy device.
    ///
    /// With `auto_complete`, every signaled fence value completes immediately.
    pub fn new(auto_complete: bool) -> Self {
        Self {
            journal: Arc::new(DummyJournal::default()),
            auto_complete,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Journal shared by every object of this device.
    pub fn journal(&self) -> &Arc<DummyJournal> {
        &self.journal
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn create_queue(
        &self,
        queue_type: QueueType,
        priority: QueuePriority,
    ) -> DummyQueue {
        let id = self.next_id();
        log::trace!("DummyBackend: creating {queue_type:?} queue {id} (priority: {priority:?})");
        self.journal.record(DummyCall::CreateQueue {
            queue: id,
            queue_type,
        });

        DummyQueue {
            id,
            journal: Arc::clone(&self.journal),
            fence: DummyFence::default(),
            auto_complete: self.auto_complete,
            next_id: Arc::clone(&self.next_id),
        }
    }

    pub(crate) fn create_pipeline_layout(&self, plan: &LayoutPlan) -> NativeLayout {
        let ranges = plan.push_constants().map_or(0, |layout| layout.ranges().len()) as u32;
        let push_constant_indices: Vec<u32> = (0..ranges).collect();

        let mut sets = Vec::with_capacity(plan.sets().len());
        for (index, set) in (ranges..).zip(plan.sets()) {
            self.journal.record(DummyCall::CreateDescriptorSetLayout {
                space: set.space,
                bindings: set.bindings.len(),
            });
            sets.push((NativeDescriptorSetLayout::Dummy(self.next_id()), index));
        }

        self.journal.record(DummyCall::CreatePipelineLayout {
            spaces: plan.sets().iter().map(|set| set.space).collect(),
            push_constant_ranges: push_constant_indices.len(),
            default_sampler: plan.needs_default_sampler(),
        });

        NativeLayout {
            sets,
            push_constant_indices,
            pipeline: NativePipelineLayout::Dummy(self.next_id()),
        }
    }
}

/// Simulated fence with a CPU-visible completed value.
#[derive(Debug, Default)]
struct DummyFence {
    completed: Mutex<u64>,
    signaled: Condvar,
}

impl DummyFence {
    fn complete(&self, value: u64) {
        let mut completed = self.completed.lock();
        if value > *completed {
            *completed = value;
            self.signaled.notify_all();
        }
    }

    fn completed(&self) -> u64 {
        *self.completed.lock()
    }

    fn wait(&self, value: u64) {
        let mut completed = self.completed.lock();
        while *completed < value {
            self.signaled.wait(&mut completed);
        }
    }
}

/// Dummy queue.
#[derive(Debug)]
pub struct DummyQueue {
    id: u64,
    journal: Arc<DummyJournal>,
    fence: DummyFence,
    auto_complete: bool,
    next_id: Arc<AtomicU64>,
}

impl DummyQueue {
    /// Queue id used in journal entries.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Simulate the GPU reaching fence `value`.
    pub fn complete(&self, value: u64) {
        log::trace!("DummyBackend: queue {} completed fence {value}", self.id);
        self.fence.complete(value);
    }

    pub(crate) fn completed_value(&self) -> u64 {
        self.fence.completed()
    }

    pub(crate) fn create_command_buffer(&self, primary: bool) -> DummyCommandBuffer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.journal.record(DummyCall::AllocateCommandBuffer {
            queue: self.id,
            command_buffer: id,
            primary,
        });
        DummyCommandBuffer {
            id,
            journal: Arc::clone(&self.journal),
        }
    }

    pub(crate) fn submit(&self, command_buffers: &[Arc<CommandBuffer>], signal_value: u64) {
        let ids = command_buffers
            .iter()
            .filter_map(|cmd| match cmd.native() {
                NativeCommandBuffer::Dummy(cmd) => Some(cmd.id),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .collect();

        self.journal.record(DummyCall::Execute {
            queue: self.id,
            command_buffers: ids,
        });
        self.journal.record(DummyCall::Signal {
            queue: self.id,
            value: signal_value,
        });

        if self.auto_complete {
            self.fence.complete(signal_value);
        }
    }

    pub(crate) fn wait(&self, value: u64) {
        self.journal.record(DummyCall::Wait {
            queue: self.id,
            value,
        });
        self.fence.wait(value);
    }

    pub(crate) fn wait_for_queue(&self, other: &DummyQueue, value: u64) {
        self.journal.record(DummyCall::WaitForQueue {
            queue: self.id,
            other: other.id,
            value,
        });
    }
}

/// Dummy command buffer.
#[derive(Debug)]
pub struct DummyCommandBuffer {
    id: u64,
    journal: Arc<DummyJournal>,
}

impl DummyCommandBuffer {
    /// Command buffer id used in journal entries.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn begin(&self) {
        self.journal.record(DummyCall::Begin {
            command_buffer: self.id,
        });
    }

    pub(crate) fn end(&self) {
        self.journal.record(DummyCall::End {
            command_buffer: self.id,
        });
    }

    pub(crate) fn record_barrier(&self, barrier: &Barrier<'_>) {
        self.journal.record(DummyCall::PipelineBarrier {
            command_buffer: self.id,
            globals: barrier.globals().len(),
            buffers: barrier.buffers().len(),
            images: barrier.images().len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_device_name() {
        let device = DummyDevice::new(true);
        assert_eq!(device.name(), "Dummy Backend");
        assert!(device.journal().calls().is_empty());
    }

    #[test]
    fn test_auto_complete_signals_fence() {
        let device = DummyDevice::new(true);
        let queue = device.create_queue(QueueType::Graphics, QueuePriority::Normal);
        queue.submit(&[], 3);
        assert_eq!(queue.completed_value(), 3);
    }

    #[test]
    fn test_manual_completion_is_monotonic() {
        let device = DummyDevice::new(false);
        let queue = device.create_queue(QueueType::Compute, QueuePriority::High);
        queue.submit(&[], 1);
        assert_eq!(queue.completed_value(), 0);

        queue.complete(2);
        queue.complete(1);
        assert_eq!(queue.completed_value(), 2);
    }

    #[test]
    fn test_wait_blocks_until_completed() {
        let device = DummyDevice::new(false);
        let queue = Arc::new(device.create_queue(QueueType::Transfer, QueuePriority::Normal));

        let signaler = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                queue.complete(5);
            })
        };

        queue.wait(5);
        assert!(queue.completed_value() >= 5);
        signaler.join().unwrap();
    }

    #[test]
    fn test_journal_counts_calls() {
        let device = DummyDevice::new(true);
        let queue = device.create_queue(QueueType::Graphics, QueuePriority::Normal);
        let cmd = queue.create_command_buffer(true);
        cmd.begin();
        cmd.end();

        let journal = device.journal();
        assert_eq!(
            journal.count(|call| matches!(call, DummyCall::Begin { .. } | DummyCall::End { .. })),
            2
        );
        assert_eq!(journal.barrier_calls(), 0);

        journal.clear();
        assert!(journal.calls().is_empty());
    }
}
