//! Descriptor set, push constants and pipeline layouts.
//!
//! Layouts are declared through a [`PipelineLayoutBuilder`], either binding
//! by binding or from a [`ReflectedLayout`](crate::reflection::ReflectedLayout),
//! and assembled into a native layout object by [`PipelineLayoutBuilder::build`].
//!
//! Assembly runs in two phases. [`LayoutPlan::new`] performs every
//! backend-independent step (ordering by space, duplicate detection, binding
//! validation and the default input attachment sampler decision) without
//! touching the device. The backend then lowers the plan into its own binding
//! model: Vulkan back-fills unused spaces with empty set layouts, D3D12 maps
//! spaces straight to register spaces of descriptor tables.

mod descriptor_set;
mod pipeline;
mod push_constants;

pub use descriptor_set::{
    DescriptorLayout, DescriptorPoolSizes, DescriptorSetLayout, DescriptorSetLayoutDesc,
};
pub use pipeline::{
    DescriptorSetLayoutBuilder, PipelineLayout, PipelineLayoutBuilder, PushConstantsLayoutBuilder,
};
pub use push_constants::{PushConstantsLayout, PushConstantsRange};

use crate::error::{GpuError, GpuResult};
use crate::types::DescriptorType;

/// Validated, backend-independent description of a pipeline layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    sets: Vec<DescriptorSetLayoutDesc>,
    push_constants: Option<PushConstantsLayout>,
    default_input_attachment_sampler: bool,
}

impl LayoutPlan {
    /// Order `sets` by space and validate them together with `push_constants`.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if two sets share a space or any
    /// set or push constant range is malformed.
    pub fn new(
        mut sets: Vec<DescriptorSetLayoutDesc>,
        push_constants: Option<PushConstantsLayout>,
    ) -> GpuResult<Self> {
        sets.sort_by_key(|set| set.space);

        if let Some(pair) = sets.windows(2).find(|pair| pair[0].space == pair[1].space) {
            return Err(GpuError::invalid_argument(format!(
                "descriptor set space {} is declared more than once",
                pair[0].space
            )));
        }

        for set in &sets {
            set.validate()?;
        }

        if let Some(push_constants) = &push_constants {
            push_constants.validate()?;
        }

        let has_input_attachments = sets.iter().any(DescriptorSetLayoutDesc::has_input_attachments);
        let explicit_default_sampler = sets
            .first()
            .filter(|set| set.space == 0)
            .and_then(|set| set.binding(0))
            .is_some_and(|layout| layout.descriptor_type() == DescriptorType::Sampler);

        Ok(Self {
            sets,
            push_constants,
            default_input_attachment_sampler: has_input_attachments && !explicit_default_sampler,
        })
    }

    /// Descriptor sets ordered by space.
    pub fn sets(&self) -> &[DescriptorSetLayoutDesc] {
        &self.sets
    }

    /// Push constants, if any.
    pub fn push_constants(&self) -> Option<&PushConstantsLayout> {
        self.push_constants.as_ref()
    }

    /// Returns `true` if a default sampler must be synthesized at binding 0 of space 0.
    pub fn needs_default_sampler(&self) -> bool {
        self.default_input_attachment_sampler
    }

    pub(crate) fn into_parts(self) -> (Vec<DescriptorSetLayoutDesc>, Option<PushConstantsLayout>) {
        (self.sets, self.push_constants)
    }
}
