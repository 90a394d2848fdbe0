//! Type conversions between RedLilium types and Vulkan types.

use ash::vk;

use crate::resources::{ImageAspect, SubresourceRange};
use crate::types::{
    AddressMode, CompareFunction, DescriptorType, FilterMode, ImageLayout, PipelineStage,
    QueuePriority, QueueType, ResourceAccess, ShaderStage,
};

/// Convert PipelineStage flags to Vulkan synchronization2 stage flags.
pub fn convert_pipeline_stage(stage: PipelineStage) -> vk::PipelineStageFlags2 {
    let mut result = vk::PipelineStageFlags2::NONE;

    if stage.contains(PipelineStage::ALL) {
        result |= vk::PipelineStageFlags2::ALL_COMMANDS;
    }
    if stage.contains(PipelineStage::DRAW) {
        result |= vk::PipelineStageFlags2::ALL_GRAPHICS;
    }
    if stage.contains(PipelineStage::INPUT_ASSEMBLY) {
        result |= vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT
            | vk::PipelineStageFlags2::INDEX_INPUT;
    }
    if stage.contains(PipelineStage::VERTEX) {
        result |= vk::PipelineStageFlags2::VERTEX_SHADER;
    }
    if stage.contains(PipelineStage::TESSELLATION_CONTROL) {
        result |= vk::PipelineStageFlags2::TESSELLATION_CONTROL_SHADER;
    }
    if stage.contains(PipelineStage::TESSELLATION_EVALUATION) {
        result |= vk::PipelineStageFlags2::TESSELLATION_EVALUATION_SHADER;
    }
    if stage.contains(PipelineStage::GEOMETRY) {
        result |= vk::PipelineStageFlags2::GEOMETRY_SHADER;
    }
    if stage.contains(PipelineStage::FRAGMENT) {
        result |= vk::PipelineStageFlags2::FRAGMENT_SHADER;
    }
    if stage.contains(PipelineStage::DEPTH_STENCIL) {
        result |= vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
    }
    if stage.contains(PipelineStage::INDIRECT) {
        result |= vk::PipelineStageFlags2::DRAW_INDIRECT;
    }
    if stage.contains(PipelineStage::RENDER_TARGET) {
        result |= vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT;
    }
    if stage.contains(PipelineStage::COMPUTE) {
        result |= vk::PipelineStageFlags2::COMPUTE_SHADER;
    }
    if stage.contains(PipelineStage::TRANSFER) {
        result |= vk::PipelineStageFlags2::TRANSFER;
    }
    if stage.contains(PipelineStage::RESOLVE) {
        result |= vk::PipelineStageFlags2::RESOLVE;
    }
    if stage.contains(PipelineStage::ACCELERATION_STRUCTURE_BUILD) {
        result |= vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR;
    }
    if stage.contains(PipelineStage::ACCELERATION_STRUCTURE_COPY) {
        result |= vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_COPY_KHR;
    }
    if stage.contains(PipelineStage::RAYTRACING) {
        result |= vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR;
    }

    result
}

/// Convert ResourceAccess flags to Vulkan synchronization2 access flags.
pub fn convert_access(access: ResourceAccess) -> vk::AccessFlags2 {
    let mut result = vk::AccessFlags2::NONE;

    if access.contains(ResourceAccess::VERTEX_BUFFER) {
        result |= vk::AccessFlags2::VERTEX_ATTRIBUTE_READ;
    }
    if access.contains(ResourceAccess::INDEX_BUFFER) {
        result |= vk::AccessFlags2::INDEX_READ;
    }
    if access.contains(ResourceAccess::CONSTANT_BUFFER) {
        result |= vk::AccessFlags2::UNIFORM_READ;
    }
    if access.contains(ResourceAccess::INDIRECT_COMMAND) {
        result |= vk::AccessFlags2::INDIRECT_COMMAND_READ;
    }
    if access.contains(ResourceAccess::SHADER_READ) {
        result |= vk::AccessFlags2::SHADER_READ;
    }
    if access.contains(ResourceAccess::SHADER_READ_WRITE) {
        result |= vk::AccessFlags2::SHADER_READ | vk::AccessFlags2::SHADER_WRITE;
    }
    if access.contains(ResourceAccess::RENDER_TARGET) {
        result |=
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE;
    }
    if access.contains(ResourceAccess::DEPTH_STENCIL_READ) {
        result |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if access.contains(ResourceAccess::DEPTH_STENCIL_WRITE) {
        result |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    // Resolves are transfer operations in Vulkan.
    if access.intersects(ResourceAccess::TRANSFER_READ | ResourceAccess::RESOLVE_READ) {
        result |= vk::AccessFlags2::TRANSFER_READ;
    }
    if access.intersects(ResourceAccess::TRANSFER_WRITE | ResourceAccess::RESOLVE_WRITE) {
        result |= vk::AccessFlags2::TRANSFER_WRITE;
    }
    if access.contains(ResourceAccess::ACCELERATION_STRUCTURE_READ) {
        result |= vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR;
    }
    if access.contains(ResourceAccess::ACCELERATION_STRUCTURE_WRITE) {
        result |= vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR;
    }
    if access.contains(ResourceAccess::COMMON) {
        result |= vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE;
    }

    result
}

/// Convert ImageLayout to Vulkan image layout.
pub fn convert_image_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Common | ImageLayout::ReadWrite => vk::ImageLayout::GENERAL,
        ImageLayout::CopySource | ImageLayout::ResolveSource => {
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        }
        ImageLayout::CopyDestination | ImageLayout::ResolveDestination => {
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        }
        ImageLayout::ShaderResource => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::DepthWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
    }
}

/// Image aspect flags of the planes selected by `range`.
pub fn convert_aspect(aspect: ImageAspect, range: &SubresourceRange) -> vk::ImageAspectFlags {
    match aspect {
        ImageAspect::Color => vk::ImageAspectFlags::COLOR,
        ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        ImageAspect::Stencil => vk::ImageAspectFlags::STENCIL,
        ImageAspect::DepthStencil => {
            let mut flags = vk::ImageAspectFlags::empty();
            if range.base_plane == 0 {
                flags |= vk::ImageAspectFlags::DEPTH;
            }
            if range.base_plane + range.planes > 1 {
                flags |= vk::ImageAspectFlags::STENCIL;
            }
            flags
        }
    }
}

/// Convert ShaderStage flags to Vulkan shader stage flags.
pub fn convert_shader_stages(stages: ShaderStage) -> vk::ShaderStageFlags {
    const TABLE: [(ShaderStage, vk::ShaderStageFlags); 14] = [
        (ShaderStage::VERTEX, vk::ShaderStageFlags::VERTEX),
        (
            ShaderStage::TESSELLATION_CONTROL,
            vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ),
        (
            ShaderStage::TESSELLATION_EVALUATION,
            vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ),
        (ShaderStage::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
        (ShaderStage::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
        (ShaderStage::COMPUTE, vk::ShaderStageFlags::COMPUTE),
        (ShaderStage::TASK, vk::ShaderStageFlags::TASK_EXT),
        (ShaderStage::MESH, vk::ShaderStageFlags::MESH_EXT),
        (ShaderStage::RAY_GENERATION, vk::ShaderStageFlags::RAYGEN_KHR),
        (ShaderStage::ANY_HIT, vk::ShaderStageFlags::ANY_HIT_KHR),
        (ShaderStage::CLOSEST_HIT, vk::ShaderStageFlags::CLOSEST_HIT_KHR),
        (ShaderStage::MISS, vk::ShaderStageFlags::MISS_KHR),
        (ShaderStage::INTERSECTION, vk::ShaderStageFlags::INTERSECTION_KHR),
        (ShaderStage::CALLABLE, vk::ShaderStageFlags::CALLABLE_KHR),
    ];

    TABLE
        .iter()
        .filter(|(stage, _)| stages.contains(*stage))
        .fold(vk::ShaderStageFlags::empty(), |flags, (_, vk_stage)| {
            flags | *vk_stage
        })
}

/// Convert DescriptorType to Vulkan descriptor type.
pub fn convert_descriptor_type(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::ConstantBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StructuredBuffer
        | DescriptorType::RWStructuredBuffer
        | DescriptorType::ByteAddressBuffer
        | DescriptorType::RWByteAddressBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::Texture => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::RWTexture => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        DescriptorType::Buffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        DescriptorType::RWBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        DescriptorType::AccelerationStructure => vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
    }
}

/// Convert FilterMode to Vulkan filter.
pub fn convert_filter_mode(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

/// Convert FilterMode to Vulkan mipmap mode.
pub fn convert_mipmap_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

/// Convert AddressMode to Vulkan sampler address mode.
pub fn convert_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

/// Convert CompareFunction to Vulkan compare op.
pub fn convert_compare_function(func: CompareFunction) -> vk::CompareOp {
    match func {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

/// Queue family capabilities required by a queue type.
pub fn convert_queue_type(queue_type: QueueType) -> vk::QueueFlags {
    match queue_type {
        QueueType::Graphics => vk::QueueFlags::GRAPHICS,
        QueueType::Compute => vk::QueueFlags::COMPUTE,
        QueueType::Transfer => vk::QueueFlags::TRANSFER,
        QueueType::VideoDecode => vk::QueueFlags::VIDEO_DECODE_KHR,
        QueueType::VideoEncode => vk::QueueFlags::VIDEO_ENCODE_KHR,
    }
}

/// Queue priority as passed to `VkDeviceQueueCreateInfo`.
pub fn convert_queue_priority(priority: QueuePriority) -> f32 {
    priority.normalized()
}
