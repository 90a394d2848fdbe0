//! Command queues and fence tracking.
//!
//! A [`Queue`] owns a native queue and a monotonic fence. Every submission
//! signals the next fence value and records which command buffers it carried.
//! The queue keeps those command buffers (and the resources they retain)
//! alive until it observes that the GPU has passed their fence, then releases
//! them. The release sweep runs on every submission and every CPU wait, so the
//! tracking list never grows without bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::backend::NativeQueue;
use crate::command::CommandBuffer;
use crate::error::{GpuError, GpuResult};
use crate::types::{QueuePriority, QueueType};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Hooks invoked around every submission.
///
/// Observers run while the queue's submission lock is held and must not
/// call back into the same queue.
pub trait SubmitObserver: Send + Sync {
    /// Called before the command buffers are ended and executed.
    fn submitting(&self, _queue_type: QueueType, _command_buffers: &[Arc<CommandBuffer>]) {}

    /// Called after the submission signaled `fence`.
    fn submitted(&self, _queue_type: QueueType, _fence: u64) {}
}

#[derive(Debug, Default)]
struct SubmissionState {
    fence_value: u64,
    submitted: Vec<(u64, Arc<CommandBuffer>)>,
}

/// A command queue.
///
/// Dropping a queue releases the command buffers it still tracks without
/// waiting for the GPU. Wait for [`current_fence`](Self::current_fence) first.
pub struct Queue {
    id: u64,
    queue_type: QueueType,
    priority: QueuePriority,
    native: NativeQueue,
    state: Mutex<SubmissionState>,
    observers: RwLock<Vec<Arc<dyn SubmitObserver>>>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.id)
            .field("queue_type", &self.queue_type)
            .field("priority", &self.priority)
            .field("native", &self.native)
            .field("state", &*self.state.lock())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl Queue {
    pub(crate) fn new(queue_type: QueueType, priority: QueuePriority, native: NativeQueue) -> Self {
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Created {:?} queue {} on {} (priority: {:?})",
            queue_type,
            id,
            native.backend_type().name(),
            priority
        );

        Self {
            id,
            queue_type,
            priority,
            native,
            state: Mutex::new(SubmissionState::default()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Unique queue identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue type.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Queue priority.
    pub fn priority(&self) -> QueuePriority {
        self.priority
    }

    /// Native queue.
    pub fn native(&self) -> &NativeQueue {
        &self.native
    }

    /// Register a submission observer.
    pub fn add_observer(&self, observer: Arc<dyn SubmitObserver>) {
        self.observers.write().push(observer);
    }

    /// Last fence value signaled by a submission. `0` before the first submission.
    pub fn current_fence(&self) -> u64 {
        self.state.lock().fence_value
    }

    /// Number of command buffers waiting for their fence to pass.
    pub fn tracked_command_buffers(&self) -> usize {
        self.state.lock().submitted.len()
    }

    /// Allocate a command buffer for this queue.
    ///
    /// Does not affect the fence.
    pub fn create_command_buffer(
        &self,
        begin_recording: bool,
        primary: bool,
    ) -> GpuResult<Arc<CommandBuffer>> {
        let native = self.native.create_command_buffer(primary)?;
        let command_buffer = CommandBuffer::new(self.id, self.queue_type, primary, native);

        if begin_recording {
            command_buffer.begin()?;
        }

        Ok(Arc::new(command_buffer))
    }

    /// Submit a single command buffer. See [`submit_all`](Self::submit_all).
    pub fn submit(&self, command_buffer: &Arc<CommandBuffer>) -> GpuResult<u64> {
        self.submit_all(std::slice::from_ref(command_buffer))
    }

    /// End and execute `command_buffers`, returning the fence value that
    /// signals their completion.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] before any native call if the list
    /// is empty or contains a secondary buffer, a buffer that is not recording,
    /// the same buffer twice, or a buffer allocated by another queue. Returns
    /// [`GpuError::Runtime`] if native execution fails. In that case no fence is
    /// signaled and the buffers are left executable, so they have to be
    /// recorded again before the next submission.
    pub fn submit_all(&self, command_buffers: &[Arc<CommandBuffer>]) -> GpuResult<u64> {
        if command_buffers.is_empty() {
            return Err(GpuError::invalid_argument(
                "at least one command buffer must be submitted",
            ));
        }

        let mut state = self.state.lock();

        for (index, command_buffer) in command_buffers.iter().enumerate() {
            if command_buffers[..index]
                .iter()
                .any(|other| Arc::ptr_eq(other, command_buffer))
            {
                return Err(GpuError::invalid_argument(
                    "the same command buffer is submitted more than once",
                ));
            }
            if command_buffer.is_secondary() {
                return Err(GpuError::invalid_argument(
                    "secondary command buffers cannot be submitted to a queue",
                ));
            }
            if !command_buffer.is_recording() {
                return Err(GpuError::invalid_argument(
                    "the command buffer has already ended or never started recording",
                ));
            }
            if command_buffer.queue_id() != self.id {
                return Err(GpuError::invalid_argument(format!(
                    "the command buffer was allocated by queue {}, not queue {}",
                    command_buffer.queue_id(),
                    self.id
                )));
            }
        }

        for observer in self.observers.read().iter() {
            observer.submitting(self.queue_type, command_buffers);
        }

        let completed = self.native.completed_value()?;
        Self::release(&mut state, completed);

        for command_buffer in command_buffers {
            command_buffer.end()?;
        }

        let fence = state.fence_value + 1;
        self.native.submit(command_buffers, fence)?;
        state.fence_value = fence;

        state.submitted.extend(command_buffers.iter().map(|command_buffer| {
            command_buffer.mark_pending();
            (fence, Arc::clone(command_buffer))
        }));

        log::trace!(
            "Queue {} submitted {} command buffers at fence {}",
            self.id,
            command_buffers.len(),
            fence
        );

        for observer in self.observers.read().iter() {
            observer.submitted(self.queue_type, fence);
        }

        Ok(fence)
    }

    /// Block until the GPU reaches `fence`, then release every command buffer
    /// submitted at or before it.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::ArgumentOutOfRange`] if `fence` was never signaled
    /// by a submission, and [`GpuError::Runtime`] if the native wait fails.
    pub fn wait_for(&self, fence: u64) -> GpuResult<()> {
        let current = self.current_fence();
        if fence > current {
            return Err(GpuError::out_of_range(
                "fence",
                format!("fence {fence} has not been submitted yet (current fence is {current})"),
            ));
        }

        if self.native.completed_value()? < fence {
            self.native.wait(fence)?;
        }

        self.release_command_buffers(fence);
        Ok(())
    }

    /// Make subsequent GPU work on this queue wait until `other` reaches `fence`.
    ///
    /// The calling thread does not block.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the queues belong to different
    /// backends.
    pub fn wait_for_queue(&self, other: &Queue, fence: u64) -> GpuResult<()> {
        log::trace!(
            "Queue {} waits for queue {} to reach fence {}",
            self.id,
            other.id,
            fence
        );
        self.native.wait_for_queue(&other.native, fence)
    }

    /// Release every tracked command buffer submitted at or before `fence`.
    pub fn release_command_buffers(&self, fence: u64) {
        Self::release(&mut self.state.lock(), fence);
    }

    fn release(state: &mut SubmissionState, fence: u64) {
        let before = state.submitted.len();
        state.submitted.retain(|(submitted_at, command_buffer)| {
            if *submitted_at <= fence {
                command_buffer.mark_completed();
                false
            } else {
                true
            }
        });

        let released = before - state.submitted.len();
        if released > 0 {
            log::debug!("Released {released} command buffers up to fence {fence}");
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (_, command_buffer) in state.submitted.drain(..) {
            command_buffer.mark_completed();
        }
    }
}

static_assertions::assert_impl_all!(Queue: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::command::CommandBufferState;

    fn queue(auto_complete: bool) -> Queue {
        let device = DummyDevice::new(auto_complete);
        let native = device.create_queue(QueueType::Graphics, QueuePriority::Normal);
        Queue::new(QueueType::Graphics, QueuePriority::Normal, NativeQueue::Dummy(native))
    }

    fn complete(queue: &Queue, value: u64) {
        match queue.native() {
            NativeQueue::Dummy(native) => native.complete(value),
            #[allow(unreachable_patterns)]
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fences_start_at_one() {
        let queue = queue(true);
        assert_eq!(queue.current_fence(), 0);

        let fences: Vec<_> = (0..4)
            .map(|_| {
                let cmd = queue.create_command_buffer(true, true).unwrap();
                queue.submit(&cmd).unwrap()
            })
            .collect();
        assert_eq!(fences, vec![1, 2, 3, 4]);
        assert_eq!(queue.current_fence(), 4);
    }

    #[test]
    fn test_submit_ends_recording() {
        let queue = queue(true);
        let cmd = queue.create_command_buffer(true, true).unwrap();
        queue.submit(&cmd).unwrap();
        assert!(!cmd.is_recording());
    }

    #[test]
    fn test_reject_secondary_and_ended_buffers() {
        let queue = queue(true);

        let secondary = queue.create_command_buffer(true, false).unwrap();
        assert!(matches!(
            queue.submit(&secondary),
            Err(GpuError::InvalidArgument(_))
        ));

        let not_started = queue.create_command_buffer(false, true).unwrap();
        assert!(matches!(
            queue.submit(&not_started),
            Err(GpuError::InvalidArgument(_))
        ));

        let ended = queue.create_command_buffer(true, true).unwrap();
        ended.end().unwrap();
        assert!(matches!(
            queue.submit(&ended),
            Err(GpuError::InvalidArgument(_))
        ));

        assert_eq!(queue.current_fence(), 0);
    }

    #[test]
    fn test_release_sweep_on_submit() {
        let queue = queue(false);
        let first = queue.create_command_buffer(true, true).unwrap();
        queue.submit(&first).unwrap();
        assert_eq!(queue.tracked_command_buffers(), 1);

        complete(&queue, 1);
        let second = queue.create_command_buffer(true, true).unwrap();
        queue.submit(&second).unwrap();

        assert_eq!(queue.tracked_command_buffers(), 1);
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(Arc::strong_count(&second), 2);
    }

    #[test]
    fn test_reject_duplicate_buffer() {
        let queue = queue(true);
        let cmd = queue.create_command_buffer(true, true).unwrap();

        assert!(matches!(
            queue.submit_all(&[Arc::clone(&cmd), Arc::clone(&cmd)]),
            Err(GpuError::InvalidArgument(_))
        ));
        assert!(cmd.is_recording());
        assert_eq!(queue.current_fence(), 0);
        assert_eq!(queue.tracked_command_buffers(), 0);

        assert_eq!(queue.submit(&cmd).unwrap(), 1);
    }

    #[test]
    fn test_rejected_submission_skips_observers() {
        #[derive(Default)]
        struct Counter(AtomicU64);

        impl SubmitObserver for Counter {
            fn submitting(&self, _: QueueType, _: &[Arc<CommandBuffer>]) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let queue = queue(true);
        let counter = Arc::new(Counter::default());
        queue.add_observer(counter.clone());

        let cmd = queue.create_command_buffer(true, true).unwrap();
        let ended = queue.create_command_buffer(true, true).unwrap();
        ended.end().unwrap();

        assert!(queue.submit_all(&[Arc::clone(&cmd), ended]).is_err());
        assert_eq!(counter.0.load(Ordering::Relaxed), 0);
        assert!(cmd.is_recording());
    }

    #[test]
    fn test_release_returns_buffer_to_executable() {
        let queue = queue(false);
        let cmd = queue.create_command_buffer(true, true).unwrap();
        let fence = queue.submit(&cmd).unwrap();
        assert_eq!(cmd.state(), CommandBufferState::Pending);

        queue.release_command_buffers(fence - 1);
        assert_eq!(cmd.state(), CommandBufferState::Pending);

        complete(&queue, fence);
        queue.wait_for(fence).unwrap();
        assert_eq!(cmd.state(), CommandBufferState::Executable);
        assert_eq!(queue.tracked_command_buffers(), 0);
    }

    #[test]
    fn test_drop_releases_without_waiting() {
        let device = DummyDevice::new(false);
        let native = device.create_queue(QueueType::Graphics, QueuePriority::Normal);
        let queue = Queue::new(
            QueueType::Graphics,
            QueuePriority::Normal,
            NativeQueue::Dummy(native),
        );

        let resource: Arc<dyn std::any::Any + Send + Sync> = Arc::new(7u32);
        let cmd = queue.create_command_buffer(true, true).unwrap();
        cmd.retain(Arc::clone(&resource));
        queue.submit(&cmd).unwrap();

        drop(queue);
        assert_eq!(Arc::strong_count(&cmd), 1);
        assert_eq!(Arc::strong_count(&resource), 1);
        assert_eq!(
            device
                .journal()
                .count(|call| matches!(call, crate::backend::DummyCall::Wait { .. })),
            0
        );
    }

    #[test]
    fn test_wait_for_unsubmitted_fence() {
        let queue = queue(true);
        assert!(matches!(
            queue.wait_for(1),
            Err(GpuError::ArgumentOutOfRange { name: "fence", .. })
        ));
    }
}
