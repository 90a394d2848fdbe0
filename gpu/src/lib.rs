//! # RedLilium GPU
//!
//! Cross-API command submission and synchronization core for RedLilium.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Barrier`] - API-neutral memory and layout transitions, lowered to one
//!   native barrier call per backend
//! - [`Queue`] - Command buffer submission with monotonically increasing fence
//!   values and release of finished command buffers
//! - [`PipelineLayout`] - Descriptor set and push constant assembly for
//!   Vulkan's dense set indices and D3D12's sparse register spaces
//! - [`reflection`] - Pipeline layouts derived from SPIR-V or WGSL shaders
//! - Multiple backend support: Vulkan, D3D12, and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_gpu::*;
//!
//! let device = Device::dummy();
//! let queue = device.create_queue(QueueType::Graphics, QueuePriority::Normal)?;
//! let cmd = queue.create_command_buffer(true, true)?;
//!
//! let mut barrier = Barrier::new(PipelineStage::COMPUTE, PipelineStage::FRAGMENT);
//! barrier.transition_buffer(
//!     &buffer,
//!     ResourceAccess::SHADER_READ_WRITE,
//!     ResourceAccess::SHADER_READ,
//! );
//! barrier.execute(&cmd)?;
//!
//! let fence = queue.submit(&cmd)?;
//! queue.wait_for(fence)?;
//! ```

pub mod backend;
pub mod barrier;
pub mod command;
pub mod device;
pub mod error;
pub mod layout;
pub mod queue;
pub mod reflection;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendType, DummyCall, DummyJournal};
pub use barrier::{Barrier, BufferTransition, GlobalTransition, ImageTransition};
pub use command::{CommandBuffer, CommandBufferState};
pub use device::{Device, DeviceParameters};
pub use error::{GpuError, GpuResult};
pub use layout::{
    DescriptorLayout, DescriptorPoolSizes, DescriptorSetLayout, DescriptorSetLayoutDesc,
    LayoutPlan, PipelineLayout, PipelineLayoutBuilder, PushConstantsLayout, PushConstantsRange,
};
pub use queue::{Queue, SubmitObserver};
pub use reflection::{ReflectedLayout, ShaderModule, ShaderProgram};
pub use resources::{
    Buffer, BufferDescriptor, BufferUsage, Extent3d, Image, ImageAspect, ImageDescriptor,
    SubresourceRange,
};
pub use types::{
    AddressMode, CompareFunction, DescriptorType, FilterMode, ImageLayout, PipelineStage,
    QueuePriority, QueueType, ResourceAccess, SamplerDescriptor, ShaderStage,
};

/// GPU library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the GPU subsystem.
///
/// This should be called before using any GPU functionality.
pub fn init() {
    log::info!("RedLilium GPU v{} initialized", VERSION);
}
