//! Descriptor bindings and descriptor set layouts.

use std::collections::HashSet;

use crate::backend::NativeDescriptorSetLayout;
use crate::error::{GpuError, GpuResult};
use crate::types::{DescriptorType, SamplerDescriptor, ShaderStage};

/// A single binding inside a descriptor set.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorLayout {
    binding: u32,
    descriptor_type: DescriptorType,
    element_size: u32,
    descriptors: u32,
    static_sampler: Option<SamplerDescriptor>,
    input_attachment_index: u32,
}

impl DescriptorLayout {
    /// Create a binding holding one descriptor.
    ///
    /// `element_size` is the size of one buffer element in bytes and is `0`
    /// for images, samplers and acceleration structures.
    pub fn new(binding: u32, descriptor_type: DescriptorType, element_size: u32) -> Self {
        Self {
            binding,
            descriptor_type,
            element_size,
            descriptors: 1,
            static_sampler: None,
            input_attachment_index: 0,
        }
    }

    /// Create a binding with an immutable sampler baked into the layout.
    pub fn static_sampler(binding: u32, sampler: SamplerDescriptor) -> Self {
        Self {
            static_sampler: Some(sampler),
            ..Self::new(binding, DescriptorType::Sampler, 0)
        }
    }

    /// Create an input attachment binding reading attachment `index`.
    pub fn input_attachment(binding: u32, index: u32) -> Self {
        Self {
            input_attachment_index: index,
            ..Self::new(binding, DescriptorType::InputAttachment, 0)
        }
    }

    /// Set the number of descriptors (array size).
    pub fn with_descriptors(mut self, descriptors: u32) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Binding index.
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Descriptor type.
    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    /// Element size in bytes.
    pub fn element_size(&self) -> u32 {
        self.element_size
    }

    /// Number of descriptors.
    pub fn descriptors(&self) -> u32 {
        self.descriptors
    }

    /// Immutable sampler state, if the binding is a static sampler.
    pub fn sampler(&self) -> Option<&SamplerDescriptor> {
        self.static_sampler.as_ref()
    }

    /// Returns `true` if the binding is a static sampler.
    pub fn is_static_sampler(&self) -> bool {
        self.static_sampler.is_some()
    }

    /// Input attachment index.
    pub fn input_attachment_index(&self) -> u32 {
        self.input_attachment_index
    }
}

/// Number of descriptors of each kind in a set.
///
/// Static samplers are tallied separately and never allocated from a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DescriptorPoolSizes {
    /// Constant buffers.
    pub constant_buffers: u32,
    /// Structured and byte address buffers.
    pub storage_buffers: u32,
    /// Read-only typed buffers.
    pub texel_buffers: u32,
    /// Read-write typed buffers.
    pub storage_texel_buffers: u32,
    /// Sampled textures.
    pub images: u32,
    /// Storage textures.
    pub storage_images: u32,
    /// Dynamic samplers.
    pub samplers: u32,
    /// Static samplers.
    pub static_samplers: u32,
    /// Input attachments.
    pub input_attachments: u32,
    /// Acceleration structures.
    pub acceleration_structures: u32,
}

impl DescriptorPoolSizes {
    /// Tally the descriptors of `bindings`.
    pub fn tally<'a>(bindings: impl IntoIterator<Item = &'a DescriptorLayout>) -> Self {
        let mut sizes = Self::default();
        for layout in bindings {
            let count = layout.descriptors();
            let slot = match layout.descriptor_type() {
                DescriptorType::ConstantBuffer => &mut sizes.constant_buffers,
                DescriptorType::StructuredBuffer
                | DescriptorType::RWStructuredBuffer
                | DescriptorType::ByteAddressBuffer
                | DescriptorType::RWByteAddressBuffer => &mut sizes.storage_buffers,
                DescriptorType::Buffer => &mut sizes.texel_buffers,
                DescriptorType::RWBuffer => &mut sizes.storage_texel_buffers,
                DescriptorType::Texture => &mut sizes.images,
                DescriptorType::RWTexture => &mut sizes.storage_images,
                DescriptorType::Sampler if layout.is_static_sampler() => &mut sizes.static_samplers,
                DescriptorType::Sampler => &mut sizes.samplers,
                DescriptorType::InputAttachment => &mut sizes.input_attachments,
                DescriptorType::AccelerationStructure => &mut sizes.acceleration_structures,
            };
            *slot += count;
        }
        sizes
    }

    /// Number of descriptors that must be allocated from a pool.
    pub fn dynamic_descriptors(&self) -> u32 {
        self.constant_buffers
            + self.storage_buffers
            + self.texel_buffers
            + self.storage_texel_buffers
            + self.images
            + self.storage_images
            + self.samplers
            + self.input_attachments
            + self.acceleration_structures
    }
}

/// Declared contents of a descriptor set, before any native object exists.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSetLayoutDesc {
    /// Space (set index) of the layout.
    pub space: u32,
    /// Shader stages the set is visible to.
    pub stages: ShaderStage,
    /// Bindings in declaration order.
    pub bindings: Vec<DescriptorLayout>,
}

impl DescriptorSetLayoutDesc {
    /// Create an empty set description.
    pub fn new(space: u32, stages: ShaderStage) -> Self {
        Self {
            space,
            stages,
            bindings: Vec::new(),
        }
    }

    /// Append a binding.
    pub fn with_binding(mut self, layout: DescriptorLayout) -> Self {
        self.bindings.push(layout);
        self
    }

    /// Check the set for duplicate bindings and malformed entries.
    pub fn validate(&self) -> GpuResult<()> {
        if !self.bindings.is_empty() && self.stages.is_empty() {
            return Err(GpuError::invalid_argument(format!(
                "descriptor set {} has bindings but no shader stages",
                self.space
            )));
        }

        let mut seen = HashSet::with_capacity(self.bindings.len());
        for layout in &self.bindings {
            if !seen.insert(layout.binding()) {
                return Err(GpuError::invalid_argument(format!(
                    "binding {} is declared twice in descriptor set {}",
                    layout.binding(),
                    self.space
                )));
            }

            if layout.descriptors() == 0 {
                return Err(GpuError::invalid_argument(format!(
                    "binding {} of descriptor set {} has no descriptors",
                    layout.binding(),
                    self.space
                )));
            }

            if layout.is_static_sampler() && layout.descriptors() != 1 {
                return Err(GpuError::invalid_argument(format!(
                    "static sampler at binding {} of descriptor set {} cannot be an array",
                    layout.binding(),
                    self.space
                )));
            }
        }

        Ok(())
    }

    /// Returns `true` if any binding is an input attachment.
    pub fn has_input_attachments(&self) -> bool {
        self.bindings
            .iter()
            .any(|layout| layout.descriptor_type() == DescriptorType::InputAttachment)
    }

    /// Binding at `binding`, if declared.
    pub fn binding(&self, binding: u32) -> Option<&DescriptorLayout> {
        self.bindings.iter().find(|layout| layout.binding() == binding)
    }
}

/// A descriptor set layout owned by a [`PipelineLayout`](super::PipelineLayout).
#[derive(Debug)]
pub struct DescriptorSetLayout {
    desc: DescriptorSetLayoutDesc,
    pool_sizes: DescriptorPoolSizes,
    root_parameter_index: u32,
    native: NativeDescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub(crate) fn new(
        desc: DescriptorSetLayoutDesc,
        root_parameter_index: u32,
        native: NativeDescriptorSetLayout,
    ) -> Self {
        let pool_sizes = DescriptorPoolSizes::tally(&desc.bindings);
        Self {
            desc,
            pool_sizes,
            root_parameter_index,
            native,
        }
    }

    /// Space (set index).
    pub fn space(&self) -> u32 {
        self.desc.space
    }

    /// Shader stages the set is visible to.
    pub fn stages(&self) -> ShaderStage {
        self.desc.stages
    }

    /// Bindings in declaration order.
    pub fn descriptors(&self) -> &[DescriptorLayout] {
        &self.desc.bindings
    }

    /// Binding at `binding`.
    pub fn descriptor(&self, binding: u32) -> GpuResult<&DescriptorLayout> {
        self.desc.binding(binding).ok_or_else(|| {
            GpuError::out_of_range(
                "binding",
                format!(
                    "descriptor set {} has no binding {binding}",
                    self.desc.space
                ),
            )
        })
    }

    /// Per-kind descriptor counts.
    pub fn pool_sizes(&self) -> &DescriptorPoolSizes {
        &self.pool_sizes
    }

    /// Native binding slot: the set index on Vulkan, the root parameter on D3D12.
    pub fn root_parameter_index(&self) -> u32 {
        self.root_parameter_index
    }

    /// Native layout.
    pub fn native(&self) -> &NativeDescriptorSetLayout {
        &self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_descriptor_arrays() {
        let desc = DescriptorSetLayoutDesc::new(0, ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::new(0, DescriptorType::ConstantBuffer, 64))
            .with_binding(DescriptorLayout::new(1, DescriptorType::Texture, 0).with_descriptors(8))
            .with_binding(DescriptorLayout::new(2, DescriptorType::Sampler, 0))
            .with_binding(DescriptorLayout::static_sampler(3, SamplerDescriptor::bilinear_clamp()))
            .with_binding(DescriptorLayout::new(4, DescriptorType::RWByteAddressBuffer, 4))
            .with_binding(DescriptorLayout::input_attachment(5, 0));

        let sizes = DescriptorPoolSizes::tally(&desc.bindings);
        assert_eq!(sizes.constant_buffers, 1);
        assert_eq!(sizes.images, 8);
        assert_eq!(sizes.samplers, 1);
        assert_eq!(sizes.static_samplers, 1);
        assert_eq!(sizes.storage_buffers, 1);
        assert_eq!(sizes.input_attachments, 1);
        assert_eq!(sizes.dynamic_descriptors(), 12);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let desc = DescriptorSetLayoutDesc::new(1, ShaderStage::VERTEX)
            .with_binding(DescriptorLayout::new(0, DescriptorType::ConstantBuffer, 16))
            .with_binding(DescriptorLayout::new(0, DescriptorType::Texture, 0));
        assert!(matches!(desc.validate(), Err(GpuError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_array_rejected() {
        let desc = DescriptorSetLayoutDesc::new(0, ShaderStage::COMPUTE)
            .with_binding(DescriptorLayout::new(0, DescriptorType::Texture, 0).with_descriptors(0));
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_bindings_without_stages_rejected() {
        let desc = DescriptorSetLayoutDesc::new(0, ShaderStage::empty())
            .with_binding(DescriptorLayout::new(0, DescriptorType::Texture, 0));
        assert!(desc.validate().is_err());
        assert!(DescriptorSetLayoutDesc::new(3, ShaderStage::empty()).validate().is_ok());
    }

    #[test]
    fn test_binding_lookup() {
        let desc = DescriptorSetLayoutDesc::new(2, ShaderStage::COMPUTE)
            .with_binding(DescriptorLayout::new(4, DescriptorType::RWTexture, 0));
        let layout = DescriptorSetLayout::new(desc, 1, NativeDescriptorSetLayout::Dummy(9));

        assert_eq!(layout.space(), 2);
        assert_eq!(layout.root_parameter_index(), 1);
        assert_eq!(
            layout.descriptor(4).unwrap().descriptor_type(),
            DescriptorType::RWTexture
        );
        assert!(matches!(
            layout.descriptor(0),
            Err(GpuError::ArgumentOutOfRange { name: "binding", .. })
        ));
    }
}
