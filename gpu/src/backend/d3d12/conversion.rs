//! Type conversions between RedLilium types and D3D12 types.

use super::native::{
    BarrierAccess, BarrierLayout, BarrierSubresourceRange, BarrierSync, CommandListType,
    CommandQueuePriority, ComparisonFunc, DescriptorRangeFlags, DescriptorRangeType, Filter,
    ShaderVisibility, StaticBorderColor, StaticSamplerDesc, TextureAddressMode,
};
use crate::resources::SubresourceRange;
use crate::types::{
    AddressMode, CompareFunction, DescriptorType, FilterMode, ImageLayout, PipelineStage,
    QueuePriority, QueueType, ResourceAccess, SamplerDescriptor, ShaderStage,
};

/// Convert PipelineStage flags to D3D12 barrier sync flags.
pub fn convert_pipeline_stage(stage: PipelineStage) -> BarrierSync {
    const TABLE: [(PipelineStage, BarrierSync); 17] = [
        (PipelineStage::ALL, BarrierSync::ALL),
        (PipelineStage::DRAW, BarrierSync::DRAW),
        (PipelineStage::INPUT_ASSEMBLY, BarrierSync::INDEX_INPUT),
        (PipelineStage::VERTEX, BarrierSync::VERTEX_SHADING),
        (PipelineStage::TESSELLATION_CONTROL, BarrierSync::VERTEX_SHADING),
        (PipelineStage::TESSELLATION_EVALUATION, BarrierSync::VERTEX_SHADING),
        (PipelineStage::GEOMETRY, BarrierSync::VERTEX_SHADING),
        (PipelineStage::FRAGMENT, BarrierSync::PIXEL_SHADING),
        (PipelineStage::DEPTH_STENCIL, BarrierSync::DEPTH_STENCIL),
        (PipelineStage::INDIRECT, BarrierSync::EXECUTE_INDIRECT),
        (PipelineStage::RENDER_TARGET, BarrierSync::RENDER_TARGET),
        (PipelineStage::COMPUTE, BarrierSync::COMPUTE_SHADING),
        (PipelineStage::TRANSFER, BarrierSync::COPY),
        (PipelineStage::RESOLVE, BarrierSync::RESOLVE),
        (
            PipelineStage::ACCELERATION_STRUCTURE_BUILD,
            BarrierSync::BUILD_RAYTRACING_ACCELERATION_STRUCTURE,
        ),
        (
            PipelineStage::ACCELERATION_STRUCTURE_COPY,
            BarrierSync::COPY_RAYTRACING_ACCELERATION_STRUCTURE,
        ),
        (PipelineStage::RAYTRACING, BarrierSync::RAYTRACING),
    ];

    TABLE
        .iter()
        .filter(|(neutral, _)| stage.contains(*neutral))
        .fold(BarrierSync::NONE, |sync, (_, native)| sync | *native)
}

/// Convert ResourceAccess flags to D3D12 barrier access flags.
///
/// No access at all is `NO_ACCESS`; `COMMON` is the empty native mask and
/// only survives when nothing else is requested.
pub fn convert_access(access: ResourceAccess) -> BarrierAccess {
    const TABLE: [(ResourceAccess, BarrierAccess); 15] = [
        (ResourceAccess::VERTEX_BUFFER, BarrierAccess::VERTEX_BUFFER),
        (ResourceAccess::INDEX_BUFFER, BarrierAccess::INDEX_BUFFER),
        (ResourceAccess::CONSTANT_BUFFER, BarrierAccess::CONSTANT_BUFFER),
        (ResourceAccess::INDIRECT_COMMAND, BarrierAccess::INDIRECT_ARGUMENT),
        (ResourceAccess::SHADER_READ, BarrierAccess::SHADER_RESOURCE),
        (ResourceAccess::SHADER_READ_WRITE, BarrierAccess::UNORDERED_ACCESS),
        (ResourceAccess::RENDER_TARGET, BarrierAccess::RENDER_TARGET),
        (ResourceAccess::DEPTH_STENCIL_READ, BarrierAccess::DEPTH_STENCIL_READ),
        (ResourceAccess::DEPTH_STENCIL_WRITE, BarrierAccess::DEPTH_STENCIL_WRITE),
        (ResourceAccess::TRANSFER_READ, BarrierAccess::COPY_SOURCE),
        (ResourceAccess::TRANSFER_WRITE, BarrierAccess::COPY_DEST),
        (ResourceAccess::RESOLVE_READ, BarrierAccess::RESOLVE_SOURCE),
        (ResourceAccess::RESOLVE_WRITE, BarrierAccess::RESOLVE_DEST),
        (
            ResourceAccess::ACCELERATION_STRUCTURE_READ,
            BarrierAccess::RAYTRACING_ACCELERATION_STRUCTURE_READ,
        ),
        (
            ResourceAccess::ACCELERATION_STRUCTURE_WRITE,
            BarrierAccess::RAYTRACING_ACCELERATION_STRUCTURE_WRITE,
        ),
    ];

    if access.is_empty() {
        return BarrierAccess::NO_ACCESS;
    }

    TABLE
        .iter()
        .filter(|(neutral, _)| access.contains(*neutral))
        .fold(BarrierAccess::COMMON, |flags, (_, native)| flags | *native)
}

/// Convert ImageLayout to D3D12 barrier layout.
pub fn convert_image_layout(layout: ImageLayout) -> BarrierLayout {
    match layout {
        ImageLayout::Undefined => BarrierLayout::Undefined,
        ImageLayout::Common | ImageLayout::Present => BarrierLayout::Common,
        ImageLayout::ReadWrite => BarrierLayout::UnorderedAccess,
        ImageLayout::ShaderResource => BarrierLayout::ShaderResource,
        ImageLayout::CopySource => BarrierLayout::CopySource,
        ImageLayout::CopyDestination => BarrierLayout::CopyDest,
        ImageLayout::RenderTarget => BarrierLayout::RenderTarget,
        ImageLayout::DepthRead => BarrierLayout::DepthStencilRead,
        ImageLayout::DepthWrite => BarrierLayout::DepthStencilWrite,
        ImageLayout::ResolveSource => BarrierLayout::ResolveSource,
        ImageLayout::ResolveDestination => BarrierLayout::ResolveDest,
    }
}

/// Convert a subresource range to a D3D12 barrier subresource range.
pub fn convert_subresource_range(range: &SubresourceRange) -> BarrierSubresourceRange {
    BarrierSubresourceRange {
        index_or_first_mip_level: range.base_level,
        num_mip_levels: range.levels,
        first_array_slice: range.base_layer,
        num_array_slices: range.layers,
        first_plane: range.base_plane,
        num_planes: range.planes,
    }
}

/// Root parameter visibility of `stages`.
///
/// D3D12 can restrict a root parameter to one graphics stage. Any other
/// combination is visible to all stages.
pub fn convert_shader_visibility(stages: ShaderStage) -> ShaderVisibility {
    match stages {
        s if s == ShaderStage::VERTEX => ShaderVisibility::Vertex,
        s if s == ShaderStage::TESSELLATION_CONTROL => ShaderVisibility::Hull,
        s if s == ShaderStage::TESSELLATION_EVALUATION => ShaderVisibility::Domain,
        s if s == ShaderStage::GEOMETRY => ShaderVisibility::Geometry,
        s if s == ShaderStage::FRAGMENT => ShaderVisibility::Pixel,
        s if s == ShaderStage::TASK => ShaderVisibility::Amplification,
        s if s == ShaderStage::MESH => ShaderVisibility::Mesh,
        _ => ShaderVisibility::All,
    }
}

/// Descriptor range kind and flags of a descriptor type.
pub fn convert_descriptor_type(
    descriptor_type: DescriptorType,
) -> (DescriptorRangeType, DescriptorRangeFlags) {
    let static_while_set = DescriptorRangeFlags::DESCRIPTORS_VOLATILE
        | DescriptorRangeFlags::DATA_STATIC_WHILE_SET_AT_EXECUTE;

    match descriptor_type {
        DescriptorType::ConstantBuffer => (DescriptorRangeType::Cbv, static_while_set),
        DescriptorType::Texture
        | DescriptorType::StructuredBuffer
        | DescriptorType::ByteAddressBuffer
        | DescriptorType::Buffer
        | DescriptorType::InputAttachment
        | DescriptorType::AccelerationStructure => (DescriptorRangeType::Srv, static_while_set),
        DescriptorType::RWTexture
        | DescriptorType::RWStructuredBuffer
        | DescriptorType::RWByteAddressBuffer
        | DescriptorType::RWBuffer => (
            DescriptorRangeType::Uav,
            DescriptorRangeFlags::DESCRIPTORS_VOLATILE,
        ),
        DescriptorType::Sampler => (DescriptorRangeType::Sampler, DescriptorRangeFlags::empty()),
    }
}

/// Convert AddressMode to D3D12 texture address mode.
pub fn convert_address_mode(mode: AddressMode) -> TextureAddressMode {
    match mode {
        AddressMode::ClampToEdge => TextureAddressMode::Clamp,
        AddressMode::Repeat => TextureAddressMode::Wrap,
        AddressMode::MirrorRepeat => TextureAddressMode::Mirror,
        AddressMode::ClampToBorder => TextureAddressMode::Border,
    }
}

/// Convert CompareFunction to D3D12 comparison function.
pub fn convert_compare_function(func: CompareFunction) -> ComparisonFunc {
    match func {
        CompareFunction::Never => ComparisonFunc::Never,
        CompareFunction::Less => ComparisonFunc::Less,
        CompareFunction::Equal => ComparisonFunc::Equal,
        CompareFunction::LessEqual => ComparisonFunc::LessEqual,
        CompareFunction::Greater => ComparisonFunc::Greater,
        CompareFunction::NotEqual => ComparisonFunc::NotEqual,
        CompareFunction::GreaterEqual => ComparisonFunc::GreaterEqual,
        CompareFunction::Always => ComparisonFunc::Always,
    }
}

/// Encode the filter of a sampler descriptor.
pub fn convert_filter(descriptor: &SamplerDescriptor) -> Filter {
    let filter = if descriptor.anisotropy_clamp > 1 {
        Filter::ANISOTROPIC
    } else {
        Filter::encode(
            descriptor.min_filter == FilterMode::Linear,
            descriptor.mag_filter == FilterMode::Linear,
            descriptor.mipmap_filter == FilterMode::Linear,
            false,
        )
    };

    if descriptor.compare.is_some() {
        filter.with_comparison()
    } else {
        filter
    }
}

/// Build a static sampler bound to `register` in `space`.
pub fn convert_static_sampler(
    descriptor: &SamplerDescriptor,
    register: u32,
    space: u32,
    visibility: ShaderVisibility,
) -> StaticSamplerDesc {
    StaticSamplerDesc {
        filter: convert_filter(descriptor),
        address_u: convert_address_mode(descriptor.address_mode_u),
        address_v: convert_address_mode(descriptor.address_mode_v),
        address_w: convert_address_mode(descriptor.address_mode_w),
        mip_lod_bias: descriptor.mip_lod_bias,
        max_anisotropy: u32::from(descriptor.anisotropy_clamp.max(1)),
        comparison_func: descriptor
            .compare
            .map(convert_compare_function)
            .unwrap_or(ComparisonFunc::Always),
        border_color: StaticBorderColor::TransparentBlack,
        min_lod: descriptor.lod_min_clamp,
        max_lod: descriptor.lod_max_clamp,
        shader_register: register,
        register_space: space,
        visibility,
    }
}

/// Command list type of a queue type.
pub fn convert_queue_type(queue_type: QueueType) -> CommandListType {
    match queue_type {
        QueueType::Graphics => CommandListType::Direct,
        QueueType::Compute => CommandListType::Compute,
        QueueType::Transfer => CommandListType::Copy,
        QueueType::VideoDecode => CommandListType::VideoDecode,
        QueueType::VideoEncode => CommandListType::VideoEncode,
    }
}

/// Convert QueuePriority to D3D12 command queue priority.
pub fn convert_queue_priority(priority: QueuePriority) -> CommandQueuePriority {
    match priority {
        QueuePriority::Normal => CommandQueuePriority::Normal,
        QueuePriority::High => CommandQueuePriority::High,
        QueuePriority::Realtime => CommandQueuePriority::GlobalRealtime,
    }
}
