//! Backend-neutral vocabulary shared by barriers, queues and layouts.

mod descriptor;
mod queue;
mod sampler;
mod shader;
mod sync;

pub use descriptor::DescriptorType;
pub use queue::{QueuePriority, QueueType};
pub use sampler::{AddressMode, CompareFunction, FilterMode, SamplerDescriptor};
pub use shader::ShaderStage;
pub use sync::{ImageLayout, PipelineStage, ResourceAccess, acceleration_structure_scratch_access};
