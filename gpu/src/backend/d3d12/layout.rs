//! Root signature assembly for D3D12.
//!
//! Register spaces are sparse in D3D12, so a set's space is passed through as
//! the register space of its descriptor table and no placeholder is created
//! for unused spaces. Root parameters are assigned in order: push constant
//! ranges first as root constants, then one descriptor table per set.

use super::conversion::{convert_descriptor_type, convert_shader_visibility, convert_static_sampler};
use super::native::{
    DescriptorRange, RootParameter, RootSignatureDesc, RootSignatureFlags, ShaderVisibility,
};
use super::{D3d12Device, D3d12RootSignature, DescriptorTableLayout};
use crate::backend::{NativeDescriptorSetLayout, NativeLayout, NativePipelineLayout};
use crate::error::{GpuError, GpuResult};
use crate::layout::LayoutPlan;
use crate::types::{DescriptorType, SamplerDescriptor, ShaderStage};

/// Root signature description of a plan, with the root parameter indices it assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignaturePlan {
    /// Root signature description.
    pub desc: RootSignatureDesc,
    /// Root parameter index of each push constant range.
    pub push_constant_indices: Vec<u32>,
    /// Descriptor table and root parameter index of each declared set.
    pub tables: Vec<(DescriptorTableLayout, u32)>,
}

/// Build the root signature description of `plan`.
///
/// # Errors
///
/// Returns [`GpuError::InvalidArgument`] if a set mixes dynamic samplers
/// with other descriptors, which D3D12 keeps in separate heaps.
pub fn build_root_signature_desc(plan: &LayoutPlan) -> GpuResult<RootSignaturePlan> {
    let mut parameters = Vec::new();
    let mut static_samplers = Vec::new();
    let mut push_constant_indices = Vec::new();
    let mut tables = Vec::with_capacity(plan.sets().len());

    if let Some(push_constants) = plan.push_constants() {
        for range in push_constants.ranges() {
            push_constant_indices.push(parameters.len() as u32);
            parameters.push(RootParameter::Constants {
                shader_register: range.binding(),
                register_space: range.space(),
                num_32bit_values: range.size() / 4,
                visibility: convert_shader_visibility(range.stage()),
            });
        }
    }

    for set in plan.sets() {
        let visibility = convert_shader_visibility(set.stages);

        let dynamic = || set.bindings.iter().filter(|layout| !layout.is_static_sampler());
        let has_samplers = dynamic().any(|layout| layout.descriptor_type().is_sampler());
        let has_resources = dynamic().any(|layout| !layout.descriptor_type().is_sampler());
        if has_samplers && has_resources {
            return Err(GpuError::invalid_argument(format!(
                "descriptor set {} mixes dynamic samplers with other descriptors",
                set.space
            )));
        }

        let mut ranges = Vec::with_capacity(set.bindings.len());
        for layout in &set.bindings {
            if let Some(sampler) = layout.sampler() {
                static_samplers.push(convert_static_sampler(
                    sampler,
                    layout.binding(),
                    set.space,
                    visibility,
                ));
                continue;
            }

            if layout.descriptor_type() == DescriptorType::Sampler
                && layout.binding() == 0
                && set.space == 0
                && set.stages != ShaderStage::COMPUTE
            {
                log::warn!(
                    "Sampler bound to register 0 of space 0, \
                     which is reserved for the input attachment sampler"
                );
            }

            let (range_type, flags) = convert_descriptor_type(layout.descriptor_type());
            ranges.push(DescriptorRange {
                range_type,
                num_descriptors: layout.descriptors(),
                base_shader_register: layout.binding(),
                register_space: set.space,
                flags,
                offset_in_descriptors_from_table_start: DescriptorRange::OFFSET_APPEND,
            });
        }

        let index = parameters.len() as u32;
        parameters.push(RootParameter::DescriptorTable {
            ranges: ranges.clone(),
            visibility,
        });
        tables.push((DescriptorTableLayout { ranges }, index));
    }

    if plan.needs_default_sampler() {
        static_samplers.push(convert_static_sampler(
            &SamplerDescriptor::bilinear_clamp(),
            0,
            0,
            ShaderVisibility::All,
        ));
    }

    Ok(RootSignaturePlan {
        desc: RootSignatureDesc {
            parameters,
            static_samplers,
            flags: RootSignatureFlags::ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        },
        push_constant_indices,
        tables,
    })
}

pub(crate) fn create_pipeline_layout(
    device: &D3d12Device,
    plan: &LayoutPlan,
) -> GpuResult<NativeLayout> {
    let RootSignaturePlan {
        desc,
        push_constant_indices,
        tables,
    } = build_root_signature_desc(plan)?;

    let signature = device
        .api()
        .create_root_signature(&desc)
        .map_err(|e| e.into_gpu_error("Failed to create root signature"))?;

    log::debug!(
        "D3D12 root signature with {} root parameters and {} static samplers",
        desc.parameters.len(),
        desc.static_samplers.len()
    );

    Ok(NativeLayout {
        sets: tables
            .into_iter()
            .map(|(table, index)| (NativeDescriptorSetLayout::D3D12(table), index))
            .collect(),
        push_constant_indices,
        pipeline: NativePipelineLayout::D3D12(D3d12RootSignature { signature, desc }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::d3d12::native::DescriptorRangeType;
    use crate::layout::{
        DescriptorLayout, DescriptorSetLayoutDesc, PushConstantsLayout, PushConstantsRange,
    };

    fn set(space: u32) -> DescriptorSetLayoutDesc {
        DescriptorSetLayoutDesc::new(space, ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::new(0, DescriptorType::ConstantBuffer, 16))
    }

    #[test]
    fn test_sparse_spaces_pass_through() {
        let plan = LayoutPlan::new(vec![set(5), set(0), set(2)], None).unwrap();
        let built = build_root_signature_desc(&plan).unwrap();

        assert_eq!(built.desc.parameters.len(), 3);
        let spaces: Vec<u32> = built
            .tables
            .iter()
            .map(|(table, _)| table.ranges()[0].register_space)
            .collect();
        assert_eq!(spaces, vec![0, 2, 5]);
        let indices: Vec<u32> = built.tables.iter().map(|(_, index)| *index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_push_constants_come_first() {
        let push = PushConstantsLayout::new(32)
            .with_range(PushConstantsRange::new(ShaderStage::VERTEX, 0, 16, 1, 3))
            .with_range(PushConstantsRange::new(ShaderStage::FRAGMENT, 16, 16, 1, 4));
        let plan = LayoutPlan::new(vec![set(0)], Some(push)).unwrap();
        let built = build_root_signature_desc(&plan).unwrap();

        assert_eq!(built.push_constant_indices, vec![0, 1]);
        assert_eq!(built.tables[0].1, 2);
        assert_eq!(
            built.desc.parameters[0],
            RootParameter::Constants {
                shader_register: 3,
                register_space: 1,
                num_32bit_values: 4,
                visibility: ShaderVisibility::Vertex,
            }
        );
    }

    #[test]
    fn test_static_samplers_excluded_from_ranges() {
        let desc = DescriptorSetLayoutDesc::new(1, ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::new(0, DescriptorType::Texture, 0))
            .with_binding(DescriptorLayout::static_sampler(1, SamplerDescriptor::nearest()));
        let plan = LayoutPlan::new(vec![desc], None).unwrap();
        let built = build_root_signature_desc(&plan).unwrap();

        let ranges = built.tables[0].0.ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].range_type, DescriptorRangeType::Srv);
        assert_eq!(built.desc.static_samplers.len(), 1);
        assert_eq!(built.desc.static_samplers[0].shader_register, 1);
        assert_eq!(built.desc.static_samplers[0].register_space, 1);
        assert_eq!(built.desc.static_samplers[0].visibility, ShaderVisibility::Pixel);
    }

    #[test]
    fn test_default_input_attachment_sampler() {
        let desc = DescriptorSetLayoutDesc::new(0, ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::input_attachment(0, 0));
        let plan = LayoutPlan::new(vec![desc], None).unwrap();
        let built = build_root_signature_desc(&plan).unwrap();

        assert_eq!(built.desc.static_samplers.len(), 1);
        let sampler = &built.desc.static_samplers[0];
        assert_eq!((sampler.shader_register, sampler.register_space), (0, 0));
    }

    #[test]
    fn test_reject_mixed_sampler_table() {
        let desc = DescriptorSetLayoutDesc::new(0, ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::new(0, DescriptorType::Texture, 0))
            .with_binding(DescriptorLayout::new(1, DescriptorType::Sampler, 0));
        let plan = LayoutPlan::new(vec![desc], None).unwrap();

        assert!(matches!(
            build_root_signature_desc(&plan),
            Err(GpuError::InvalidArgument(_))
        ));
    }
}
