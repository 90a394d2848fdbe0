//! Descriptor types.

/// The kind of resource bound to a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Uniform / constant buffer.
    ConstantBuffer,
    /// Read-only structured buffer.
    StructuredBuffer,
    /// Read-write structured buffer.
    RWStructuredBuffer,
    /// Sampled texture.
    Texture,
    /// Storage texture.
    RWTexture,
    /// Sampler state.
    Sampler,
    /// Render pass input attachment.
    InputAttachment,
    /// Read-only typed (texel) buffer.
    Buffer,
    /// Read-write typed (texel) buffer.
    RWBuffer,
    /// Read-only raw buffer.
    ByteAddressBuffer,
    /// Read-write raw buffer.
    RWByteAddressBuffer,
    /// Ray tracing acceleration structure.
    AccelerationStructure,
}

impl DescriptorType {
    /// Returns `true` for descriptors the shader may write to.
    pub fn is_read_write(self) -> bool {
        matches!(
            self,
            Self::RWStructuredBuffer | Self::RWTexture | Self::RWBuffer | Self::RWByteAddressBuffer
        )
    }

    /// Returns `true` for sampler descriptors.
    pub fn is_sampler(self) -> bool {
        self == Self::Sampler
    }
}
