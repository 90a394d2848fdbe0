//! Native Direct3D 12 vocabulary and the device interface the backend drives.
//!
//! The values mirror the D3D12 headers (enhanced barriers, root signature
//! 1.1) so an implementation of [`DeviceApi`] can pass them through to the
//! driver unchanged. The backend never talks to COM directly: the application
//! provides the native objects behind these traits, and tests provide
//! recording mocks.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::GpuError;

bitflags! {
    /// `D3D12_BARRIER_SYNC`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BarrierSync: u32 {
        const ALL = 0x1;
        const DRAW = 0x2;
        const INDEX_INPUT = 0x4;
        const VERTEX_SHADING = 0x8;
        const PIXEL_SHADING = 0x10;
        const DEPTH_STENCIL = 0x20;
        const RENDER_TARGET = 0x40;
        const COMPUTE_SHADING = 0x80;
        const RAYTRACING = 0x100;
        const COPY = 0x200;
        const RESOLVE = 0x400;
        const EXECUTE_INDIRECT = 0x800;
        const BUILD_RAYTRACING_ACCELERATION_STRUCTURE = 0x80_0000;
        const COPY_RAYTRACING_ACCELERATION_STRUCTURE = 0x100_0000;
    }
}

impl BarrierSync {
    /// `D3D12_BARRIER_SYNC_NONE`.
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// `D3D12_BARRIER_ACCESS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BarrierAccess: u32 {
        const VERTEX_BUFFER = 0x1;
        const CONSTANT_BUFFER = 0x2;
        const INDEX_BUFFER = 0x4;
        const RENDER_TARGET = 0x8;
        const UNORDERED_ACCESS = 0x10;
        const DEPTH_STENCIL_WRITE = 0x20;
        const DEPTH_STENCIL_READ = 0x40;
        const SHADER_RESOURCE = 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const RAYTRACING_ACCELERATION_STRUCTURE_READ = 0x4000;
        const RAYTRACING_ACCELERATION_STRUCTURE_WRITE = 0x8000;
        const NO_ACCESS = 0x8000_0000;
    }
}

impl BarrierAccess {
    /// `D3D12_BARRIER_ACCESS_COMMON`.
    pub const COMMON: Self = Self::empty();
}

/// `D3D12_BARRIER_LAYOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BarrierLayout {
    Undefined = 0xFFFF_FFFF,
    Common = 0,
    GenericRead = 1,
    RenderTarget = 2,
    UnorderedAccess = 3,
    DepthStencilWrite = 4,
    DepthStencilRead = 5,
    ShaderResource = 6,
    CopySource = 7,
    CopyDest = 8,
    ResolveSource = 9,
    ResolveDest = 10,
}

/// `D3D12_GLOBAL_BARRIER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalBarrier {
    pub sync_before: BarrierSync,
    pub sync_after: BarrierSync,
    pub access_before: BarrierAccess,
    pub access_after: BarrierAccess,
}

/// `D3D12_BUFFER_BARRIER`.
///
/// D3D12 requires buffer barriers to cover the whole resource, so `offset`
/// is always `0` and `size` is always `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub sync_before: BarrierSync,
    pub sync_after: BarrierSync,
    pub access_before: BarrierAccess,
    pub access_after: BarrierAccess,
    pub resource: ResourceHandle,
    pub offset: u64,
    pub size: u64,
}

/// `D3D12_BARRIER_SUBRESOURCE_RANGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierSubresourceRange {
    pub index_or_first_mip_level: u32,
    pub num_mip_levels: u32,
    pub first_array_slice: u32,
    pub num_array_slices: u32,
    pub first_plane: u32,
    pub num_planes: u32,
}

/// `D3D12_TEXTURE_BARRIER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBarrier {
    pub sync_before: BarrierSync,
    pub sync_after: BarrierSync,
    pub access_before: BarrierAccess,
    pub access_after: BarrierAccess,
    pub layout_before: BarrierLayout,
    pub layout_after: BarrierLayout,
    pub resource: ResourceHandle,
    pub subresources: BarrierSubresourceRange,
}

/// `D3D12_BARRIER_GROUP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierGroup<'a> {
    Global(&'a [GlobalBarrier]),
    Buffer(&'a [BufferBarrier]),
    Texture(&'a [TextureBarrier]),
}

/// `D3D12_COMMAND_LIST_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandListType {
    Direct = 0,
    Bundle = 1,
    Compute = 2,
    Copy = 3,
    VideoDecode = 4,
    VideoEncode = 6,
}

/// `D3D12_COMMAND_QUEUE_PRIORITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandQueuePriority {
    Normal = 0,
    High = 100,
    GlobalRealtime = 10000,
}

/// `D3D12_SHADER_VISIBILITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderVisibility {
    All = 0,
    Vertex = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Pixel = 5,
    Amplification = 6,
    Mesh = 7,
}

/// `D3D12_DESCRIPTOR_RANGE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DescriptorRangeType {
    Srv = 0,
    Uav = 1,
    Cbv = 2,
    Sampler = 3,
}

bitflags! {
    /// `D3D12_DESCRIPTOR_RANGE_FLAGS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescriptorRangeFlags: u32 {
        const DESCRIPTORS_VOLATILE = 0x1;
        const DATA_VOLATILE = 0x2;
        const DATA_STATIC_WHILE_SET_AT_EXECUTE = 0x4;
        const DATA_STATIC = 0x8;
    }
}

/// `D3D12_DESCRIPTOR_RANGE1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub flags: DescriptorRangeFlags,
    pub offset_in_descriptors_from_table_start: u32,
}

impl DescriptorRange {
    /// `D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND`.
    pub const OFFSET_APPEND: u32 = 0xFFFF_FFFF;
}

/// `D3D12_ROOT_PARAMETER1`, restricted to the kinds the backend emits.
#[derive(Debug, Clone, PartialEq)]
pub enum RootParameter {
    /// Inline 32-bit constants.
    Constants {
        shader_register: u32,
        register_space: u32,
        num_32bit_values: u32,
        visibility: ShaderVisibility,
    },
    /// A descriptor table.
    DescriptorTable {
        ranges: Vec<DescriptorRange>,
        visibility: ShaderVisibility,
    },
}

/// `D3D12_FILTER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Filter(pub u32);

impl Filter {
    /// `D3D12_FILTER_MIN_MAG_MIP_POINT`.
    pub const MIN_MAG_MIP_POINT: Self = Self(0);
    /// `D3D12_FILTER_MIN_MAG_MIP_LINEAR`.
    pub const MIN_MAG_MIP_LINEAR: Self = Self(0x15);
    /// `D3D12_FILTER_ANISOTROPIC`.
    pub const ANISOTROPIC: Self = Self(0x55);

    const MIP_LINEAR: u32 = 0x1;
    const MAG_LINEAR: u32 = 0x4;
    const MIN_LINEAR: u32 = 0x10;
    const COMPARISON: u32 = 0x80;

    /// Encode a filter from per-stage linear flags.
    pub fn encode(min_linear: bool, mag_linear: bool, mip_linear: bool, comparison: bool) -> Self {
        let mut bits = 0;
        if min_linear {
            bits |= Self::MIN_LINEAR;
        }
        if mag_linear {
            bits |= Self::MAG_LINEAR;
        }
        if mip_linear {
            bits |= Self::MIP_LINEAR;
        }
        if comparison {
            bits |= Self::COMPARISON;
        }
        Self(bits)
    }

    /// Returns `Self` with the comparison reduction enabled.
    pub fn with_comparison(self) -> Self {
        Self(self.0 | Self::COMPARISON)
    }
}

/// `D3D12_TEXTURE_ADDRESS_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TextureAddressMode {
    Wrap = 1,
    Mirror = 2,
    Clamp = 3,
    Border = 4,
}

/// `D3D12_COMPARISON_FUNC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ComparisonFunc {
    Never = 1,
    Less = 2,
    Equal = 3,
    LessEqual = 4,
    Greater = 5,
    NotEqual = 6,
    GreaterEqual = 7,
    Always = 8,
}

/// `D3D12_STATIC_BORDER_COLOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StaticBorderColor {
    TransparentBlack = 0,
    OpaqueBlack = 1,
    OpaqueWhite = 2,
}

/// `D3D12_STATIC_SAMPLER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSamplerDesc {
    pub filter: Filter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: ComparisonFunc,
    pub border_color: StaticBorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
    pub shader_register: u32,
    pub register_space: u32,
    pub visibility: ShaderVisibility,
}

bitflags! {
    /// `D3D12_ROOT_SIGNATURE_FLAGS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RootSignatureFlags: u32 {
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 0x1;
        const DENY_VERTEX_SHADER_ROOT_ACCESS = 0x2;
        const DENY_HULL_SHADER_ROOT_ACCESS = 0x4;
        const DENY_DOMAIN_SHADER_ROOT_ACCESS = 0x8;
        const DENY_GEOMETRY_SHADER_ROOT_ACCESS = 0x10;
        const DENY_PIXEL_SHADER_ROOT_ACCESS = 0x20;
        const ALLOW_STREAM_OUTPUT = 0x40;
        const LOCAL_ROOT_SIGNATURE = 0x80;
    }
}

/// `D3D12_ROOT_SIGNATURE_DESC1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<StaticSamplerDesc>,
    pub flags: RootSignatureFlags,
}

/// Opaque native resource handle, usually the `ID3D12Resource` pointer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

/// A failed native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// `HRESULT` of the call.
    pub code: i32,
    /// Error blob or debug layer message, when the API produced one.
    pub message: Option<String>,
}

impl NativeError {
    /// Create an error without a message.
    pub fn new(code: i32) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn into_gpu_error(self, context: &str) -> GpuError {
        match self.message {
            Some(message) => GpuError::runtime(format!(
                "{context} (HRESULT {:#010x}): {message}",
                self.code
            )),
            None => GpuError::runtime(format!("{context} (HRESULT {:#010x})", self.code)),
        }
    }
}

/// Result of a native call.
pub type NativeResult<T> = Result<T, NativeError>;

/// `ID3D12Device` operations used by the backend.
pub trait DeviceApi: Debug + Send + Sync {
    /// `CreateCommandQueue`.
    fn create_command_queue(
        &self,
        list_type: CommandListType,
        priority: CommandQueuePriority,
    ) -> NativeResult<Box<dyn CommandQueueApi>>;

    /// `CreateFence`.
    fn create_fence(&self, initial_value: u64) -> NativeResult<Arc<dyn FenceApi>>;

    /// `CreateCommandAllocator` followed by `CreateCommandList`.
    ///
    /// The returned list is open for recording, as D3D12 creates it.
    fn create_command_list(
        &self,
        list_type: CommandListType,
    ) -> NativeResult<Box<dyn CommandListApi>>;

    /// `D3D12SerializeVersionedRootSignature` followed by `CreateRootSignature`.
    fn create_root_signature(
        &self,
        desc: &RootSignatureDesc,
    ) -> NativeResult<Box<dyn RootSignatureApi>>;
}

/// `ID3D12CommandQueue` operations used by the backend.
pub trait CommandQueueApi: Debug + Send + Sync {
    /// `ExecuteCommandLists`.
    fn execute_command_lists(&self, lists: &[&dyn CommandListApi]) -> NativeResult<()>;

    /// GPU-side `Signal`.
    fn signal(&self, fence: &dyn FenceApi, value: u64) -> NativeResult<()>;

    /// GPU-side `Wait`.
    fn wait(&self, fence: &dyn FenceApi, value: u64) -> NativeResult<()>;
}

/// `ID3D12Fence` operations used by the backend.
pub trait FenceApi: Debug + Send + Sync {
    /// `GetCompletedValue`.
    fn completed_value(&self) -> u64;

    /// `SetEventOnCompletion` and a blocking wait on the event.
    fn wait_for_value(&self, value: u64) -> NativeResult<()>;

    /// Downcast support for queue implementations.
    fn as_any(&self) -> &dyn Any;
}

/// `ID3D12GraphicsCommandList7` operations used by the backend.
pub trait CommandListApi: Debug + Send + Sync {
    /// Reset the allocator and the list.
    fn reset(&self) -> NativeResult<()>;

    /// `Close`.
    fn close(&self) -> NativeResult<()>;

    /// `Barrier`.
    fn barrier(&self, groups: &[BarrierGroup<'_>]);

    /// Downcast support for queue implementations.
    fn as_any(&self) -> &dyn Any;
}

/// `ID3D12RootSignature`.
pub trait RootSignatureApi: Debug + Send + Sync {}
