//! Backend-neutral barriers.
//!
//! A [`Barrier`] collects global, buffer and image transitions between two
//! sets of pipeline stages. Nothing reaches the GPU until [`Barrier::execute`]
//! lowers the transitions into the native barrier shape of the command
//! buffer's backend and records them with a single native call.
//!
//! # Example
//!
//! ```ignore
//! let mut barrier = Barrier::new(PipelineStage::empty(), PipelineStage::COMPUTE);
//! barrier.transition_image(
//!     &image,
//!     ResourceAccess::empty(),
//!     ResourceAccess::SHADER_READ_WRITE,
//!     ImageLayout::ReadWrite,
//! );
//! barrier.execute(&command_buffer)?;
//! ```

use crate::backend::NativeCommandBuffer;
use crate::command::CommandBuffer;
use crate::error::{GpuError, GpuResult};
use crate::resources::{Buffer, Image, SubresourceRange};
use crate::types::{
    ImageLayout, PipelineStage, ResourceAccess, acceleration_structure_scratch_access,
};

/// A memory dependency that is not tied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalTransition {
    /// Access before the barrier.
    pub access_before: ResourceAccess,
    /// Access after the barrier.
    pub access_after: ResourceAccess,
}

/// A transition of a whole buffer or a single element.
#[derive(Debug, Clone, Copy)]
pub struct BufferTransition<'a> {
    /// Transitioned buffer.
    pub buffer: &'a Buffer,
    /// Element index, or `None` for the whole buffer.
    pub element: Option<u32>,
    /// Access before the barrier.
    pub access_before: ResourceAccess,
    /// Access after the barrier.
    pub access_after: ResourceAccess,
}

impl BufferTransition<'_> {
    /// Accesses as they must be lowered to native flags.
    ///
    /// Applies [`acceleration_structure_scratch_access`] to scratch buffers.
    pub fn lowered_access(
        &self,
        sync_before: PipelineStage,
        sync_after: PipelineStage,
    ) -> (ResourceAccess, ResourceAccess) {
        if self.buffer.is_scratch() {
            (
                acceleration_structure_scratch_access(sync_before, self.access_before),
                acceleration_structure_scratch_access(sync_after, self.access_after),
            )
        } else {
            (self.access_before, self.access_after)
        }
    }
}

/// A layout and access transition over a range of image subresources.
#[derive(Debug, Clone, Copy)]
pub struct ImageTransition<'a> {
    /// Transitioned image.
    pub image: &'a Image,
    /// Access before the barrier.
    pub access_before: ResourceAccess,
    /// Access after the barrier.
    pub access_after: ResourceAccess,
    /// Layout before the barrier. `None` lowers to [`ImageLayout::Undefined`].
    pub from_layout: Option<ImageLayout>,
    /// Layout after the barrier.
    pub to_layout: ImageLayout,
    /// Covered subresources.
    pub range: SubresourceRange,
}

impl ImageTransition<'_> {
    /// Layout the native barrier transitions from.
    pub fn source_layout(&self) -> ImageLayout {
        self.from_layout.unwrap_or(ImageLayout::Undefined)
    }
}

/// A set of transitions between two groups of pipeline stages.
///
/// The barrier borrows the resources it references and never owns them.
/// Transitions are only appended; executing a barrier does not consume it and
/// executing it again re-records every transition.
#[derive(Debug, Clone)]
pub struct Barrier<'a> {
    sync_before: PipelineStage,
    sync_after: PipelineStage,
    globals: Vec<GlobalTransition>,
    buffers: Vec<BufferTransition<'a>>,
    images: Vec<ImageTransition<'a>>,
}

impl<'a> Barrier<'a> {
    /// Create an empty barrier between `sync_before` and `sync_after`.
    pub fn new(sync_before: PipelineStage, sync_after: PipelineStage) -> Self {
        Self {
            sync_before,
            sync_after,
            globals: Vec::new(),
            buffers: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Stages that must finish before the barrier.
    pub fn sync_before(&self) -> PipelineStage {
        self.sync_before
    }

    /// Stages that wait for the barrier.
    pub fn sync_after(&self) -> PipelineStage {
        self.sync_after
    }

    /// Add a global memory dependency.
    pub fn wait(
        &mut self,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
    ) -> &mut Self {
        self.globals.push(GlobalTransition {
            access_before,
            access_after,
        });
        self
    }

    /// Transition every element of `buffer`.
    pub fn transition_buffer(
        &mut self,
        buffer: &'a Buffer,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
    ) -> &mut Self {
        self.buffers.push(BufferTransition {
            buffer,
            element: None,
            access_before,
            access_after,
        });
        self
    }

    /// Transition a single element of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::ArgumentOutOfRange`] if `element` is not an element
    /// of the buffer.
    pub fn transition_buffer_element(
        &mut self,
        buffer: &'a Buffer,
        element: u32,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
    ) -> GpuResult<&mut Self> {
        buffer.element_range(element)?;
        self.buffers.push(BufferTransition {
            buffer,
            element: Some(element),
            access_before,
            access_after,
        });
        Ok(self)
    }

    /// Transition every subresource of `image` into `layout`.
    ///
    /// The previous layout is lowered as [`ImageLayout::Undefined`], which
    /// allows the driver to discard the contents. Use
    /// [`transition_image_from`](Self::transition_image_from) when the
    /// contents must survive.
    pub fn transition_image(
        &mut self,
        image: &'a Image,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
        layout: ImageLayout,
    ) -> &mut Self {
        self.push_image(image, image.full_range(), access_before, access_after, None, layout);
        self
    }

    /// Transition every subresource of `image` from `from_layout` into `to_layout`.
    pub fn transition_image_from(
        &mut self,
        image: &'a Image,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
        from_layout: ImageLayout,
        to_layout: ImageLayout,
    ) -> &mut Self {
        self.push_image(
            image,
            image.full_range(),
            access_before,
            access_after,
            Some(from_layout),
            to_layout,
        );
        self
    }

    /// Transition a range of subresources of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] for an empty range and
    /// [`GpuError::ArgumentOutOfRange`] for a range outside the image.
    pub fn transition_image_range(
        &mut self,
        image: &'a Image,
        range: SubresourceRange,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
        from_layout: Option<ImageLayout>,
        to_layout: ImageLayout,
    ) -> GpuResult<&mut Self> {
        image.validate_range(&range)?;
        self.push_image(image, range, access_before, access_after, from_layout, to_layout);
        Ok(self)
    }

    fn push_image(
        &mut self,
        image: &'a Image,
        range: SubresourceRange,
        access_before: ResourceAccess,
        access_after: ResourceAccess,
        from_layout: Option<ImageLayout>,
        to_layout: ImageLayout,
    ) {
        self.images.push(ImageTransition {
            image,
            access_before,
            access_after,
            from_layout,
            to_layout,
            range,
        });
    }

    /// Recorded global transitions.
    pub fn globals(&self) -> &[GlobalTransition] {
        &self.globals
    }

    /// Recorded buffer transitions.
    pub fn buffers(&self) -> &[BufferTransition<'a>] {
        &self.buffers
    }

    /// Recorded image transitions.
    pub fn images(&self) -> &[ImageTransition<'a>] {
        &self.images
    }

    /// Returns `true` if no transition has been recorded.
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.buffers.is_empty() && self.images.is_empty()
    }

    /// Record the barrier into `command_buffer`.
    ///
    /// An empty barrier records nothing. After the native call succeeds, the
    /// tracked layout of every transitioned image subresource is updated.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the command buffer is not
    /// recording, or if a resource has no native handle for the command
    /// buffer's backend.
    pub fn execute(&self, command_buffer: &CommandBuffer) -> GpuResult<()> {
        if !command_buffer.is_recording() {
            return Err(GpuError::invalid_argument(
                "barriers can only be recorded into a command buffer that is recording",
            ));
        }

        if self.is_empty() {
            return Ok(());
        }

        if cfg!(debug_assertions) {
            self.check_tracked_layouts();
        }

        log::trace!(
            "Recording barrier {:?} -> {:?} ({} global, {} buffer, {} image)",
            self.sync_before,
            self.sync_after,
            self.globals.len(),
            self.buffers.len(),
            self.images.len()
        );

        match command_buffer.native() {
            NativeCommandBuffer::Dummy(cmd) => cmd.record_barrier(self),
            #[cfg(feature = "vulkan-backend")]
            NativeCommandBuffer::Vulkan(cmd) => {
                crate::backend::vulkan::barriers::record(cmd, self)?
            }
            #[cfg(feature = "d3d12-backend")]
            NativeCommandBuffer::D3D12(cmd) => crate::backend::d3d12::barriers::record(cmd, self)?,
        }

        for transition in &self.images {
            transition
                .image
                .track_layout(&transition.range, transition.to_layout);
        }

        Ok(())
    }

    fn check_tracked_layouts(&self) {
        for transition in &self.images {
            let Some(expected) = transition.from_layout else {
                continue;
            };

            let tracked = transition.image.uniform_layout(&transition.range);
            if tracked != Some(expected) {
                log::warn!(
                    "Image {:?} is transitioned from {:?} but its tracked layout is {:?}",
                    transition.image.label(),
                    expected,
                    tracked
                );
            }
        }
    }
}
