//! Backend-neutral synchronization vocabulary.
//!
//! [`PipelineStage`], [`ResourceAccess`] and [`ImageLayout`] describe a
//! transition without committing to either native model. Each backend lowers
//! them through the pure tables in its `conversion` module.

use bitflags::bitflags;

bitflags! {
    /// Pipeline stages that produce or consume a resource.
    ///
    /// The empty set means "no stage" and is used when a barrier has no
    /// producer (first use) or no consumer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        /// Every command on the queue.
        const ALL = 1 << 0;
        /// All stages of the graphics pipeline.
        const DRAW = 1 << 1;
        /// Vertex and index fetch.
        const INPUT_ASSEMBLY = 1 << 2;
        /// Vertex shader.
        const VERTEX = 1 << 3;
        /// Tessellation control (hull) shader.
        const TESSELLATION_CONTROL = 1 << 4;
        /// Tessellation evaluation (domain) shader.
        const TESSELLATION_EVALUATION = 1 << 5;
        /// Geometry shader.
        const GEOMETRY = 1 << 6;
        /// Fragment (pixel) shader.
        const FRAGMENT = 1 << 7;
        /// Depth and stencil tests.
        const DEPTH_STENCIL = 1 << 8;
        /// Indirect argument consumption.
        const INDIRECT = 1 << 9;
        /// Render target output.
        const RENDER_TARGET = 1 << 10;
        /// Compute shader.
        const COMPUTE = 1 << 11;
        /// Copy commands.
        const TRANSFER = 1 << 12;
        /// Multisample resolve.
        const RESOLVE = 1 << 13;
        /// Acceleration structure builds.
        const ACCELERATION_STRUCTURE_BUILD = 1 << 14;
        /// Acceleration structure copies.
        const ACCELERATION_STRUCTURE_COPY = 1 << 15;
        /// Ray tracing shaders.
        const RAYTRACING = 1 << 16;
    }
}

impl Default for PipelineStage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// The way a resource is accessed on one side of a barrier.
    ///
    /// The empty set means "no access", for example before the first write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceAccess: u32 {
        /// Read as a vertex buffer.
        const VERTEX_BUFFER = 1 << 0;
        /// Read as an index buffer.
        const INDEX_BUFFER = 1 << 1;
        /// Read as a constant (uniform) buffer.
        const CONSTANT_BUFFER = 1 << 2;
        /// Read as indirect command arguments.
        const INDIRECT_COMMAND = 1 << 3;
        /// Read by a shader.
        const SHADER_READ = 1 << 4;
        /// Read and written by a shader.
        const SHADER_READ_WRITE = 1 << 5;
        /// Written as a render target.
        const RENDER_TARGET = 1 << 6;
        /// Read as a depth/stencil attachment.
        const DEPTH_STENCIL_READ = 1 << 7;
        /// Written as a depth/stencil attachment.
        const DEPTH_STENCIL_WRITE = 1 << 8;
        /// Copy source.
        const TRANSFER_READ = 1 << 9;
        /// Copy destination.
        const TRANSFER_WRITE = 1 << 10;
        /// Resolve source.
        const RESOLVE_READ = 1 << 11;
        /// Resolve destination.
        const RESOLVE_WRITE = 1 << 12;
        /// Read as an acceleration structure.
        const ACCELERATION_STRUCTURE_READ = 1 << 13;
        /// Written as an acceleration structure.
        const ACCELERATION_STRUCTURE_WRITE = 1 << 14;
        /// Any access. Maps to the broadest memory access of the backend.
        const COMMON = 1 << 15;
    }
}

impl Default for ResourceAccess {
    fn default() -> Self {
        Self::empty()
    }
}

/// Layout of an image subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Usable by any queue for any access the image supports.
    Common,
    /// Read and written by shaders (storage / unordered access).
    ReadWrite,
    /// Copy source.
    CopySource,
    /// Copy destination.
    CopyDestination,
    /// Sampled or read by shaders.
    ShaderResource,
    /// Color attachment.
    RenderTarget,
    /// Read-only depth/stencil attachment.
    DepthRead,
    /// Writable depth/stencil attachment.
    DepthWrite,
    /// Ready for presentation.
    Present,
    /// Multisample resolve source.
    ResolveSource,
    /// Multisample resolve destination.
    ResolveDestination,
    /// Contents are undefined and may be discarded.
    #[default]
    Undefined,
}

/// Remap acceleration-structure access on scratch buffers.
///
/// Scratch memory used while building an acceleration structure is accessed
/// as plain read/write memory, not as an acceleration structure. When `sync`
/// contains [`PipelineStage::ACCELERATION_STRUCTURE_BUILD`], acceleration
/// structure bits in `access` are replaced by
/// [`ResourceAccess::SHADER_READ_WRITE`]. Every backend applies this before
/// lowering a transition on a scratch buffer.
pub fn acceleration_structure_scratch_access(
    sync: PipelineStage,
    access: ResourceAccess,
) -> ResourceAccess {
    let structure_access =
        ResourceAccess::ACCELERATION_STRUCTURE_READ | ResourceAccess::ACCELERATION_STRUCTURE_WRITE;

    if sync.contains(PipelineStage::ACCELERATION_STRUCTURE_BUILD)
        && access.intersects(structure_access)
    {
        (access - structure_access) | ResourceAccess::SHADER_READ_WRITE
    } else {
        access
    }
}
