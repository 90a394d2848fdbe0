//! Direct3D 12 backend.
//!
//! The backend lowers everything into the plain data of [`native`] and hands
//! it to an application-provided [`DeviceApi`]. Each [`D3d12Queue`] owns a
//! command queue and a fence: submission `n` signals value `n` on the fence,
//! and CPU waits block on the fence reaching a value.
//!
//! Barriers use the enhanced barrier model (`ID3D12GraphicsCommandList7::Barrier`).

pub mod barriers;
pub mod conversion;
pub mod layout;
pub mod native;

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::error::{GpuError, GpuResult};
use crate::types::{QueuePriority, QueueType};

use super::NativeCommandBuffer;
use conversion::{convert_queue_priority, convert_queue_type};
pub use native::{
    CommandListApi, CommandQueueApi, DeviceApi, FenceApi, NativeError, NativeResult,
    ResourceHandle, RootSignatureApi,
};
use native::{CommandListType, DescriptorRange, RootSignatureDesc};

/// D3D12 device.
#[derive(Debug, Clone)]
pub struct D3d12Device {
    api: Arc<dyn DeviceApi>,
}

impl D3d12Device {
    /// Wrap a native device.
    pub fn new(api: Arc<dyn DeviceApi>) -> Self {
        Self { api }
    }

    /// Native device interface.
    pub fn api(&self) -> &Arc<dyn DeviceApi> {
        &self.api
    }

    pub(crate) fn create_queue(
        &self,
        queue_type: QueueType,
        priority: QueuePriority,
    ) -> GpuResult<D3d12Queue> {
        let list_type = convert_queue_type(queue_type);
        let queue = self
            .api
            .create_command_queue(list_type, convert_queue_priority(priority))
            .map_err(|e| e.into_gpu_error("Failed to create command queue"))?;
        let fence = self
            .api
            .create_fence(0)
            .map_err(|e| e.into_gpu_error("Failed to create fence"))?;

        log::debug!("D3D12 {list_type:?} command queue created (priority: {priority:?})");

        Ok(D3d12Queue {
            device: Arc::clone(&self.api),
            queue,
            fence,
            list_type,
        })
    }
}

/// D3D12 command queue with its fence.
#[derive(Debug)]
pub struct D3d12Queue {
    device: Arc<dyn DeviceApi>,
    queue: Box<dyn CommandQueueApi>,
    fence: Arc<dyn FenceApi>,
    list_type: CommandListType,
}

impl D3d12Queue {
    /// Native command queue.
    pub fn api(&self) -> &dyn CommandQueueApi {
        self.queue.as_ref()
    }

    /// Fence signaled by every submission.
    pub fn fence(&self) -> &Arc<dyn FenceApi> {
        &self.fence
    }

    /// Command list type of the queue.
    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    pub(crate) fn create_command_list(&self, primary: bool) -> GpuResult<D3d12CommandList> {
        let list_type = if primary {
            self.list_type
        } else {
            CommandListType::Bundle
        };

        let list = self
            .device
            .create_command_list(list_type)
            .map_err(|e| e.into_gpu_error("Failed to create command list"))?;

        // D3D12 creates lists in the recording state; `begin` reopens them.
        list.close()
            .map_err(|e| e.into_gpu_error("Failed to close new command list"))?;

        Ok(D3d12CommandList { list, list_type })
    }

    pub(crate) fn completed_value(&self) -> u64 {
        self.fence.completed_value()
    }

    pub(crate) fn submit(
        &self,
        command_buffers: &[Arc<CommandBuffer>],
        signal_value: u64,
    ) -> GpuResult<()> {
        let mut lists: Vec<&dyn CommandListApi> = Vec::with_capacity(command_buffers.len());
        for command_buffer in command_buffers {
            match command_buffer.native() {
                NativeCommandBuffer::D3D12(cmd) => lists.push(cmd.list.as_ref()),
                #[allow(unreachable_patterns)]
                _ => {
                    return Err(GpuError::invalid_argument(
                        "only D3D12 command lists can be submitted to a D3D12 queue",
                    ));
                }
            }
        }

        self.queue
            .execute_command_lists(&lists)
            .map_err(|e| e.into_gpu_error("Failed to execute command lists"))?;
        self.queue
            .signal(self.fence.as_ref(), signal_value)
            .map_err(|e| e.into_gpu_error("Failed to signal fence"))
    }

    pub(crate) fn wait(&self, value: u64) -> GpuResult<()> {
        self.fence
            .wait_for_value(value)
            .map_err(|e| e.into_gpu_error("Failed to wait for fence"))
    }

    pub(crate) fn wait_for_queue(&self, other: &D3d12Queue, value: u64) -> GpuResult<()> {
        self.queue
            .wait(other.fence.as_ref(), value)
            .map_err(|e| e.into_gpu_error("Failed to wait for queue"))
    }
}

/// D3D12 command list.
#[derive(Debug)]
pub struct D3d12CommandList {
    list: Box<dyn CommandListApi>,
    list_type: CommandListType,
}

impl D3d12CommandList {
    /// Native command list.
    pub fn api(&self) -> &dyn CommandListApi {
        self.list.as_ref()
    }

    /// Command list type.
    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    pub(crate) fn begin(&self) -> GpuResult<()> {
        self.list
            .reset()
            .map_err(|e| e.into_gpu_error("Failed to reset command list"))
    }

    pub(crate) fn end(&self) -> GpuResult<()> {
        self.list
            .close()
            .map_err(|e| e.into_gpu_error("Failed to close command list"))
    }
}

/// Descriptor table of one descriptor set.
///
/// The native object is the root signature; this records the ranges the
/// table was declared with.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorTableLayout {
    ranges: Vec<DescriptorRange>,
}

impl DescriptorTableLayout {
    /// Dynamic descriptor ranges of the table, excluding static samplers.
    pub fn ranges(&self) -> &[DescriptorRange] {
        &self.ranges
    }
}

/// D3D12 root signature.
#[derive(Debug)]
pub struct D3d12RootSignature {
    signature: Box<dyn RootSignatureApi>,
    desc: RootSignatureDesc,
}

impl D3d12RootSignature {
    /// Native root signature.
    pub fn api(&self) -> &dyn RootSignatureApi {
        self.signature.as_ref()
    }

    /// Description the root signature was created from.
    pub fn desc(&self) -> &RootSignatureDesc {
        &self.desc
    }
}
