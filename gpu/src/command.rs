//! Command buffers.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::NativeCommandBuffer;
use crate::barrier::Barrier;
use crate::error::{GpuError, GpuResult};
use crate::types::QueueType;

/// Recording state of a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    /// Allocated, not recording.
    Initial,
    /// Commands can be recorded.
    Recording,
    /// Recording ended; the buffer can be submitted once.
    Executable,
    /// Submitted and tracked by its queue until the fence passes.
    Pending,
}

/// A command buffer allocated by a [`Queue`](crate::Queue).
///
/// Primary buffers are submitted to the queue that created them. Secondary
/// buffers (bundles) can only be executed from a primary buffer and are
/// rejected by `submit`.
///
/// Resources passed to [`retain`](Self::retain) stay alive until the queue
/// observes the fence of the submission that contained this buffer.
pub struct CommandBuffer {
    queue_id: u64,
    queue_type: QueueType,
    primary: bool,
    state: Mutex<CommandBufferState>,
    retained: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
    native: NativeCommandBuffer,
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("queue_id", &self.queue_id)
            .field("queue_type", &self.queue_type)
            .field("primary", &self.primary)
            .field("state", &*self.state.lock())
            .field("retained", &self.retained.lock().len())
            .field("native", &self.native)
            .finish()
    }
}

impl CommandBuffer {
    pub(crate) fn new(
        queue_id: u64,
        queue_type: QueueType,
        primary: bool,
        native: NativeCommandBuffer,
    ) -> Self {
        Self {
            queue_id,
            queue_type,
            primary,
            state: Mutex::new(CommandBufferState::Initial),
            retained: Mutex::new(Vec::new()),
            native,
        }
    }

    /// Identifier of the queue that allocated this buffer.
    pub fn queue_id(&self) -> u64 {
        self.queue_id
    }

    /// Type of the queue that allocated this buffer.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Returns `true` for secondary command buffers.
    pub fn is_secondary(&self) -> bool {
        !self.primary
    }

    /// Current recording state.
    pub fn state(&self) -> CommandBufferState {
        *self.state.lock()
    }

    /// Returns `true` while commands can be recorded.
    pub fn is_recording(&self) -> bool {
        self.state() == CommandBufferState::Recording
    }

    /// Begin recording.
    ///
    /// A buffer that was executed before is reset by the native begin call.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the buffer is already recording
    /// or its submission has not completed yet.
    pub fn begin(&self) -> GpuResult<()> {
        let mut state = self.state.lock();
        match *state {
            CommandBufferState::Recording => {
                return Err(GpuError::invalid_argument(
                    "the command buffer is already recording",
                ));
            }
            CommandBufferState::Pending => {
                return Err(GpuError::invalid_argument(
                    "the command buffer is still in flight",
                ));
            }
            CommandBufferState::Initial | CommandBufferState::Executable => {}
        }

        self.native.begin()?;
        *state = CommandBufferState::Recording;
        Ok(())
    }

    /// End recording.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the buffer is not recording.
    pub fn end(&self) -> GpuResult<()> {
        let mut state = self.state.lock();
        if *state != CommandBufferState::Recording {
            return Err(GpuError::invalid_argument(
                "the command buffer is not recording",
            ));
        }

        self.native.end()?;
        *state = CommandBufferState::Executable;
        Ok(())
    }

    /// Record `barrier` into this buffer.
    pub fn barrier(&self, barrier: &Barrier<'_>) -> GpuResult<()> {
        barrier.execute(self)
    }

    /// Keep `resource` alive until the submission containing this buffer completes.
    pub fn retain(&self, resource: Arc<dyn Any + Send + Sync>) {
        self.retained.lock().push(resource);
    }

    /// Number of retained resources.
    pub fn retained(&self) -> usize {
        self.retained.lock().len()
    }

    /// Drop every retained resource.
    pub fn release_shared_state(&self) {
        self.retained.lock().clear();
    }

    pub(crate) fn mark_pending(&self) {
        *self.state.lock() = CommandBufferState::Pending;
    }

    /// Called by the queue once the fence of the submission has passed.
    pub(crate) fn mark_completed(&self) {
        {
            let mut state = self.state.lock();
            if *state == CommandBufferState::Pending {
                *state = CommandBufferState::Executable;
            }
        }
        self.release_shared_state();
    }

    /// Native command buffer.
    pub fn native(&self) -> &NativeCommandBuffer {
        &self.native
    }
}
