//! Pipeline layouts and their builder.

use crate::backend::NativePipelineLayout;
use crate::device::Device;
use crate::error::{GpuError, GpuResult};
use crate::reflection::ReflectedLayout;
use crate::types::{DescriptorType, SamplerDescriptor, ShaderStage};

use super::{
    DescriptorLayout, DescriptorSetLayout, DescriptorSetLayoutDesc, LayoutPlan,
    PushConstantsLayout, PushConstantsRange,
};

/// Descriptor sets and push constants of a pipeline.
///
/// Descriptor sets are ordered by space. Placeholder sets a backend creates to
/// fill unused spaces are owned by the native layout and never returned here.
#[derive(Debug)]
pub struct PipelineLayout {
    sets: Vec<DescriptorSetLayout>,
    push_constants: Option<PushConstantsLayout>,
    native: NativePipelineLayout,
}

impl PipelineLayout {
    /// Create a builder.
    pub fn builder() -> PipelineLayoutBuilder {
        PipelineLayoutBuilder::new()
    }

    /// Descriptor set declared at `space`.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::ArgumentOutOfRange`] if no set was declared at `space`.
    pub fn descriptor_set(&self, space: u32) -> GpuResult<&DescriptorSetLayout> {
        self.sets
            .binary_search_by_key(&space, DescriptorSetLayout::space)
            .map(|index| &self.sets[index])
            .map_err(|_| {
                GpuError::out_of_range(
                    "space",
                    format!("the pipeline layout has no descriptor set at space {space}"),
                )
            })
    }

    /// Declared descriptor sets, ordered by space.
    pub fn descriptor_sets(&self) -> &[DescriptorSetLayout] {
        &self.sets
    }

    /// Push constants layout, if any.
    pub fn push_constants(&self) -> Option<&PushConstantsLayout> {
        self.push_constants.as_ref()
    }

    /// Native layout.
    pub fn native(&self) -> &NativePipelineLayout {
        &self.native
    }
}

/// Builder for [`PipelineLayout`].
///
/// Nothing is validated until [`build`](Self::build), which fails before any
/// native object is created if the declaration is malformed.
///
/// ```ignore
/// let mut builder = PipelineLayout::builder();
/// builder
///     .descriptor_set(0, ShaderStage::VERTEX | ShaderStage::FRAGMENT)
///     .with_constant_buffer(0, 64)
///     .with_texture(1, 1)
///     .add();
/// builder.push_constants(16).with_range(ShaderStage::VERTEX, 0, 16, 0, 0).add();
/// let layout = builder.build(&device)?;
/// ```
#[derive(Debug, Default)]
pub struct PipelineLayoutBuilder {
    sets: Vec<DescriptorSetLayoutDesc>,
    push_constants: Option<PushConstantsLayout>,
}

impl PipelineLayoutBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start declaring the descriptor set at `space`.
    pub fn descriptor_set(
        &mut self,
        space: u32,
        stages: ShaderStage,
    ) -> DescriptorSetLayoutBuilder<'_> {
        DescriptorSetLayoutBuilder {
            parent: self,
            desc: DescriptorSetLayoutDesc::new(space, stages),
        }
    }

    /// Start declaring a push constants block of `size` bytes.
    pub fn push_constants(&mut self, size: u32) -> PushConstantsLayoutBuilder<'_> {
        PushConstantsLayoutBuilder {
            parent: self,
            layout: PushConstantsLayout::new(size),
        }
    }

    /// Add a complete descriptor set description.
    pub fn with_descriptor_set(&mut self, desc: DescriptorSetLayoutDesc) -> &mut Self {
        self.sets.push(desc);
        self
    }

    /// Set the push constants layout.
    pub fn with_push_constants(&mut self, layout: PushConstantsLayout) -> &mut Self {
        if self.push_constants.is_some() {
            log::warn!("Replacing previously declared push constants layout");
        }
        self.push_constants = Some(layout);
        self
    }

    /// Add every set and push constant range derived by reflection.
    pub fn with_reflection(&mut self, reflected: ReflectedLayout) -> &mut Self {
        let (sets, push_constants) = reflected.into_parts();
        self.sets.extend(sets);
        if let Some(push_constants) = push_constants {
            self.with_push_constants(push_constants);
        }
        self
    }

    /// Descriptor sets declared so far, in declaration order.
    pub fn descriptor_sets(&self) -> &[DescriptorSetLayoutDesc] {
        &self.sets
    }

    /// Validate the declaration and create the native layout.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] for duplicate spaces or malformed
    /// bindings and ranges, and [`GpuError::Runtime`] if native creation fails.
    pub fn build(self, device: &Device) -> GpuResult<PipelineLayout> {
        let plan = LayoutPlan::new(self.sets, self.push_constants)?;
        let native = device.native().create_pipeline_layout(&plan)?;

        let (descs, push_constants) = plan.into_parts();
        let sets = descs
            .into_iter()
            .zip(native.sets)
            .map(|(desc, (set, index))| DescriptorSetLayout::new(desc, index, set))
            .collect::<Vec<_>>();

        let push_constants = push_constants.map(|mut layout| {
            layout.assign_root_parameter_indices(&native.push_constant_indices);
            layout
        });

        log::info!(
            "Created pipeline layout with {} descriptor sets and {} push constant ranges",
            sets.len(),
            push_constants
                .as_ref()
                .map_or(0, |layout| layout.ranges().len())
        );

        Ok(PipelineLayout {
            sets,
            push_constants,
            native: native.pipeline,
        })
    }
}

/// Declares one descriptor set of a [`PipelineLayoutBuilder`].
///
/// The set is added to the parent by [`add`](Self::add). Dropping the builder
/// without calling `add` discards the set.
#[derive(Debug)]
pub struct DescriptorSetLayoutBuilder<'b> {
    parent: &'b mut PipelineLayoutBuilder,
    desc: DescriptorSetLayoutDesc,
}

impl DescriptorSetLayoutBuilder<'_> {
    /// Add an arbitrary binding.
    pub fn with_binding(mut self, layout: DescriptorLayout) -> Self {
        self.desc.bindings.push(layout);
        self
    }

    /// Add a constant buffer whose elements are `element_size` bytes.
    pub fn with_constant_buffer(self, binding: u32, element_size: u32) -> Self {
        self.with_binding(DescriptorLayout::new(
            binding,
            DescriptorType::ConstantBuffer,
            element_size,
        ))
    }

    /// Add a structured buffer, writable if `writable`.
    pub fn with_structured_buffer(self, binding: u32, element_size: u32, writable: bool) -> Self {
        let descriptor_type = if writable {
            DescriptorType::RWStructuredBuffer
        } else {
            DescriptorType::StructuredBuffer
        };
        self.with_binding(DescriptorLayout::new(binding, descriptor_type, element_size))
    }

    /// Add an array of `descriptors` sampled textures.
    pub fn with_texture(self, binding: u32, descriptors: u32) -> Self {
        self.with_binding(
            DescriptorLayout::new(binding, DescriptorType::Texture, 0)
                .with_descriptors(descriptors),
        )
    }

    /// Add an array of `descriptors` storage textures.
    pub fn with_storage_texture(self, binding: u32, descriptors: u32) -> Self {
        self.with_binding(
            DescriptorLayout::new(binding, DescriptorType::RWTexture, 0)
                .with_descriptors(descriptors),
        )
    }

    /// Add a dynamic sampler.
    pub fn with_sampler(self, binding: u32) -> Self {
        self.with_binding(DescriptorLayout::new(binding, DescriptorType::Sampler, 0))
    }

    /// Add an immutable sampler.
    pub fn with_static_sampler(self, binding: u32, sampler: SamplerDescriptor) -> Self {
        self.with_binding(DescriptorLayout::static_sampler(binding, sampler))
    }

    /// Add an input attachment reading attachment `index`.
    pub fn with_input_attachment(self, binding: u32, index: u32) -> Self {
        self.with_binding(DescriptorLayout::input_attachment(binding, index))
    }

    /// Add an acceleration structure.
    pub fn with_acceleration_structure(self, binding: u32) -> Self {
        self.with_binding(DescriptorLayout::new(
            binding,
            DescriptorType::AccelerationStructure,
            0,
        ))
    }

    /// Add the set to the pipeline layout builder.
    pub fn add(self) {
        self.parent.sets.push(self.desc);
    }
}

/// Declares the push constants of a [`PipelineLayoutBuilder`].
#[derive(Debug)]
pub struct PushConstantsLayoutBuilder<'b> {
    parent: &'b mut PipelineLayoutBuilder,
    layout: PushConstantsLayout,
}

impl PushConstantsLayoutBuilder<'_> {
    /// Add a range.
    pub fn with_range(
        mut self,
        stage: ShaderStage,
        offset: u32,
        size: u32,
        space: u32,
        binding: u32,
    ) -> Self {
        self.layout
            .push_range(PushConstantsRange::new(stage, offset, size, space, binding));
        self
    }

    /// Set the push constants of the pipeline layout builder.
    pub fn add(self) {
        self.parent.with_push_constants(self.layout);
    }
}

static_assertions::assert_impl_all!(PipelineLayout: Send, Sync);
