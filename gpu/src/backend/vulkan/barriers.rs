//! Barrier lowering for Vulkan.
//!
//! A [`Barrier`] becomes a single `vkCmdPipelineBarrier2` call. Global,
//! buffer and image transitions are lowered into `VkMemoryBarrier2`,
//! `VkBufferMemoryBarrier2` and `VkImageMemoryBarrier2` entries that all
//! share the barrier's stage masks.

use ash::vk;

use super::VulkanCommandBuffer;
use super::conversion::{
    convert_access, convert_aspect, convert_image_layout, convert_pipeline_stage,
};
use crate::backend::{NativeBuffer, NativeImage};
use crate::barrier::Barrier;
use crate::error::{GpuError, GpuResult};

/// Native barrier entries of one [`Barrier`].
#[derive(Debug, Default)]
pub struct VulkanBarriers {
    /// Global memory barriers.
    pub memory: Vec<vk::MemoryBarrier2<'static>>,
    /// Buffer barriers.
    pub buffers: Vec<vk::BufferMemoryBarrier2<'static>>,
    /// Image barriers.
    pub images: Vec<vk::ImageMemoryBarrier2<'static>>,
}

impl VulkanBarriers {
    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.memory.len() + self.buffers.len() + self.images.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lower `barrier` into Vulkan barrier entries.
///
/// # Errors
///
/// Returns [`GpuError::InvalidArgument`] if a transitioned resource is not a
/// Vulkan resource.
pub fn build(barrier: &Barrier<'_>) -> GpuResult<VulkanBarriers> {
    let src_stage = convert_pipeline_stage(barrier.sync_before());
    let dst_stage = convert_pipeline_stage(barrier.sync_after());

    let memory = barrier
        .globals()
        .iter()
        .map(|global| {
            vk::MemoryBarrier2::default()
                .src_stage_mask(src_stage)
                .dst_stage_mask(dst_stage)
                .src_access_mask(convert_access(global.access_before))
                .dst_access_mask(convert_access(global.access_after))
        })
        .collect();

    let mut buffers = Vec::with_capacity(barrier.buffers().len());
    for transition in barrier.buffers() {
        let buffer = match transition.buffer.native() {
            NativeBuffer::Vulkan(buffer) => *buffer,
            #[allow(unreachable_patterns)]
            _ => {
                return Err(GpuError::invalid_argument(format!(
                    "buffer {:?} is not a Vulkan buffer",
                    transition.buffer.label()
                )));
            }
        };

        let (offset, size) = match transition.element {
            Some(element) => transition.buffer.element_range(element)?,
            None => (0, vk::WHOLE_SIZE),
        };
        let (access_before, access_after) =
            transition.lowered_access(barrier.sync_before(), barrier.sync_after());

        buffers.push(
            vk::BufferMemoryBarrier2::default()
                .src_stage_mask(src_stage)
                .dst_stage_mask(dst_stage)
                .src_access_mask(convert_access(access_before))
                .dst_access_mask(convert_access(access_after))
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(buffer)
                .offset(offset)
                .size(size),
        );
    }

    let mut images = Vec::with_capacity(barrier.images().len());
    for transition in barrier.images() {
        let image = match transition.image.native() {
            NativeImage::Vulkan(image) => *image,
            #[allow(unreachable_patterns)]
            _ => {
                return Err(GpuError::invalid_argument(format!(
                    "image {:?} is not a Vulkan image",
                    transition.image.label()
                )));
            }
        };

        let range = &transition.range;
        let subresource_range = vk::ImageSubresourceRange::default()
            .aspect_mask(convert_aspect(transition.image.aspect(), range))
            .base_mip_level(range.base_level)
            .level_count(range.levels)
            .base_array_layer(range.base_layer)
            .layer_count(range.layers);

        images.push(
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(src_stage)
                .dst_stage_mask(dst_stage)
                .src_access_mask(convert_access(transition.access_before))
                .dst_access_mask(convert_access(transition.access_after))
                .old_layout(convert_image_layout(transition.source_layout()))
                .new_layout(convert_image_layout(transition.to_layout))
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource_range),
        );
    }

    Ok(VulkanBarriers {
        memory,
        buffers,
        images,
    })
}

/// Record `barrier` into `cmd` with one `vkCmdPipelineBarrier2` call.
pub fn record(cmd: &VulkanCommandBuffer, barrier: &Barrier<'_>) -> GpuResult<()> {
    let barriers = build(barrier)?;
    if barriers.is_empty() {
        return Ok(());
    }

    let dependency_info = vk::DependencyInfo::default()
        .memory_barriers(&barriers.memory)
        .buffer_memory_barriers(&barriers.buffers)
        .image_memory_barriers(&barriers.images);

    let _guard = cmd.pool().lock();
    unsafe {
        cmd.device()
            .cmd_pipeline_barrier2(cmd.handle(), &dependency_info)
    };
    Ok(())
}
