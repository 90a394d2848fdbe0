//! GPU backend implementations.
//!
//! Every object that owns or references a native API object holds one of the
//! tagged unions in this module. The variant is fixed when the
//! [`Device`](crate::Device) is created and every object derived from that
//! device carries the same variant.
//!
//! Available backends:
//! - `dummy` - Records native calls into a journal, for testing without a GPU
//! - `vulkan` - Vulkan 1.3 via ash (synchronization2, timeline semaphores)
//! - `d3d12` - Direct3D 12 enhanced barriers through an injected native API

pub mod dummy;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

#[cfg(feature = "d3d12-backend")]
pub mod d3d12;

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::error::GpuResult;
use crate::layout::LayoutPlan;
use crate::types::{QueuePriority, QueueType};

pub use dummy::{DummyCall, DummyDevice, DummyJournal};

/// Available backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Journal-recording backend without a GPU.
    #[default]
    Dummy,
    /// Vulkan backend.
    Vulkan,
    /// Direct3D 12 backend.
    D3D12,
}

impl BackendType {
    /// Human readable backend name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dummy => "Dummy",
            Self::Vulkan => "Vulkan",
            Self::D3D12 => "D3D12",
        }
    }
}

/// Native buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeBuffer {
    /// Dummy buffer identified by an arbitrary id.
    Dummy(u64),
    /// Vulkan buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(ash::vk::Buffer),
    /// D3D12 resource.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::ResourceHandle),
}

/// Native image handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeImage {
    /// Dummy image identified by an arbitrary id.
    Dummy(u64),
    /// Vulkan image.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(ash::vk::Image),
    /// D3D12 resource.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::ResourceHandle),
}

/// Native command buffer.
#[derive(Debug)]
pub enum NativeCommandBuffer {
    /// Dummy command buffer.
    Dummy(dummy::DummyCommandBuffer),
    /// Vulkan command buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanCommandBuffer),
    /// D3D12 command list.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::D3d12CommandList),
}

impl NativeCommandBuffer {
    pub(crate) fn begin(&self) -> GpuResult<()> {
        match self {
            Self::Dummy(cmd) => {
                cmd.begin();
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(cmd) => cmd.begin(),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(cmd) => cmd.begin(),
        }
    }

    pub(crate) fn end(&self) -> GpuResult<()> {
        match self {
            Self::Dummy(cmd) => {
                cmd.end();
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(cmd) => cmd.end(),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(cmd) => cmd.end(),
        }
    }
}

/// Native queue together with its fence.
#[derive(Debug)]
pub enum NativeQueue {
    /// Dummy queue.
    Dummy(dummy::DummyQueue),
    /// Vulkan queue with a timeline semaphore.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanQueue),
    /// D3D12 command queue with a fence.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::D3d12Queue),
}

impl NativeQueue {
    pub(crate) fn backend_type(&self) -> BackendType {
        match self {
            Self::Dummy(_) => BackendType::Dummy,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => BackendType::Vulkan,
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(_) => BackendType::D3D12,
        }
    }

    pub(crate) fn create_command_buffer(&self, primary: bool) -> GpuResult<NativeCommandBuffer> {
        match self {
            Self::Dummy(queue) => Ok(NativeCommandBuffer::Dummy(
                queue.create_command_buffer(primary),
            )),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(queue) => queue
                .create_command_buffer(primary)
                .map(NativeCommandBuffer::Vulkan),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(queue) => queue
                .create_command_list(primary)
                .map(NativeCommandBuffer::D3D12),
        }
    }

    /// Last fence value the GPU has completed.
    pub(crate) fn completed_value(&self) -> GpuResult<u64> {
        match self {
            Self::Dummy(queue) => Ok(queue.completed_value()),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(queue) => queue.completed_value(),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(queue) => Ok(queue.completed_value()),
        }
    }

    /// Execute ended command buffers and signal `signal_value` afterwards.
    pub(crate) fn submit(
        &self,
        command_buffers: &[Arc<CommandBuffer>],
        signal_value: u64,
    ) -> GpuResult<()> {
        match self {
            Self::Dummy(queue) => {
                queue.submit(command_buffers, signal_value);
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(queue) => queue.submit(command_buffers, signal_value),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(queue) => queue.submit(command_buffers, signal_value),
        }
    }

    /// Block the calling thread until the fence reaches `value`.
    pub(crate) fn wait(&self, value: u64) -> GpuResult<()> {
        match self {
            Self::Dummy(queue) => {
                queue.wait(value);
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(queue) => queue.wait(value),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(queue) => queue.wait(value),
        }
    }

    /// Make subsequent GPU work on this queue wait for `other` to reach `value`.
    pub(crate) fn wait_for_queue(&self, other: &NativeQueue, value: u64) -> GpuResult<()> {
        match (self, other) {
            (Self::Dummy(queue), Self::Dummy(other)) => {
                queue.wait_for_queue(other, value);
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            (Self::Vulkan(queue), Self::Vulkan(other)) => {
                queue.wait_for_queue(other, value);
                Ok(())
            }
            #[cfg(feature = "d3d12-backend")]
            (Self::D3D12(queue), Self::D3D12(other)) => queue.wait_for_queue(other, value),
            #[allow(unreachable_patterns)]
            _ => Err(crate::error::GpuError::invalid_argument(format!(
                "a {} queue cannot wait for a {} queue",
                self.backend_type().name(),
                other.backend_type().name()
            ))),
        }
    }
}

/// Native descriptor set layout.
#[derive(Debug)]
pub enum NativeDescriptorSetLayout {
    /// Dummy layout identified by its journal id.
    Dummy(u64),
    /// Vulkan descriptor set layout.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanDescriptorSetLayout),
    /// D3D12 descriptor table; the native object is the root signature.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::DescriptorTableLayout),
}

/// Native pipeline layout.
#[derive(Debug)]
pub enum NativePipelineLayout {
    /// Dummy layout identified by its journal id.
    Dummy(u64),
    /// Vulkan pipeline layout.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanPipelineLayout),
    /// D3D12 root signature.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::D3d12RootSignature),
}

/// Native objects produced while assembling a pipeline layout.
///
/// `sets` is parallel to the declared descriptor sets of the plan and carries
/// each set's native layout and root parameter index.
#[derive(Debug)]
pub(crate) struct NativeLayout {
    pub sets: Vec<(NativeDescriptorSetLayout, u32)>,
    pub push_constant_indices: Vec<u32>,
    pub pipeline: NativePipelineLayout,
}

/// Native device.
pub enum NativeDevice {
    /// Dummy device.
    Dummy(DummyDevice),
    /// Vulkan device.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanDevice),
    /// D3D12 device.
    #[cfg(feature = "d3d12-backend")]
    D3D12(d3d12::D3d12Device),
}

impl std::fmt::Debug for NativeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NativeDevice")
            .field(&self.backend_type())
            .finish()
    }
}

impl NativeDevice {
    /// Backend of this device.
    pub fn backend_type(&self) -> BackendType {
        match self {
            Self::Dummy(_) => BackendType::Dummy,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => BackendType::Vulkan,
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(_) => BackendType::D3D12,
        }
    }

    pub(crate) fn create_queue(
        &self,
        queue_type: QueueType,
        priority: QueuePriority,
    ) -> GpuResult<NativeQueue> {
        match self {
            Self::Dummy(device) => Ok(NativeQueue::Dummy(
                device.create_queue(queue_type, priority),
            )),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(device) => device
                .create_queue(queue_type, priority)
                .map(NativeQueue::Vulkan),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(device) => device
                .create_queue(queue_type, priority)
                .map(NativeQueue::D3D12),
        }
    }

    pub(crate) fn create_pipeline_layout(&self, plan: &LayoutPlan) -> GpuResult<NativeLayout> {
        match self {
            Self::Dummy(device) => Ok(device.create_pipeline_layout(plan)),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(device) => vulkan::layout::create_pipeline_layout(device, plan),
            #[cfg(feature = "d3d12-backend")]
            Self::D3D12(device) => d3d12::layout::create_pipeline_layout(device, plan),
        }
    }
}
