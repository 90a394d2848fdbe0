//! Pipeline layout assembly for Vulkan.
//!
//! Vulkan descriptor sets are addressed by a dense index: a pipeline layout
//! that uses set 5 must provide set layouts for 0 through 4 as well. Spaces
//! the declaration skipped are filled with empty placeholder layouts, which
//! the pipeline layout owns. The root parameter index of a declared set is
//! its space.
//!
//! When the plan asks for a default input attachment sampler, an immutable
//! bilinear clamp sampler is placed at binding 0 of set 0, whether set 0 was
//! declared or is a placeholder.

use ash::vk;

use super::conversion::{
    convert_address_mode, convert_compare_function, convert_descriptor_type, convert_filter_mode,
    convert_mipmap_mode, convert_shader_stages,
};
use super::{VulkanDescriptorSetLayout, VulkanDevice, VulkanPipelineLayout};
use crate::backend::{NativeDescriptorSetLayout, NativeLayout, NativePipelineLayout};
use crate::error::{GpuError, GpuResult};
use crate::layout::{DescriptorSetLayoutDesc, LayoutPlan};
use crate::types::{DescriptorType, SamplerDescriptor, ShaderStage};

/// Highest number of descriptor sets a pipeline layout can bind.
///
/// Matches the largest `maxBoundDescriptorSets` reported by desktop drivers.
pub const MAX_DESCRIPTOR_SETS: u32 = 32;

/// Map every set index `0..=max_space` to the declared set it holds.
///
/// `spaces` must be sorted and free of duplicates. `None` marks a space that
/// needs a placeholder layout.
///
/// # Errors
///
/// Returns [`GpuError::InvalidArgument`] if a space is not below
/// [`MAX_DESCRIPTOR_SETS`].
pub fn dense_set_plan(spaces: &[u32]) -> GpuResult<Vec<Option<usize>>> {
    let Some(&max) = spaces.last() else {
        return Ok(Vec::new());
    };
    if max >= MAX_DESCRIPTOR_SETS {
        return Err(GpuError::invalid_argument(format!(
            "descriptor set space {max} exceeds the Vulkan limit of {MAX_DESCRIPTOR_SETS} sets"
        )));
    }

    let mut slots = vec![None; max as usize + 1];
    for (index, &space) in spaces.iter().enumerate() {
        slots[space as usize] = Some(index);
    }
    Ok(slots)
}

/// Check the Vulkan-specific restrictions of `plan`.
///
/// Input attachments can only be read by fragment shaders, so a set holding
/// one must be visible to the fragment stage alone.
pub fn validate_plan(plan: &LayoutPlan) -> GpuResult<()> {
    for set in plan.sets() {
        if set.has_input_attachments() && set.stages != ShaderStage::FRAGMENT {
            return Err(GpuError::invalid_argument(format!(
                "descriptor set {} has input attachments and must be visible \
                 to the fragment stage only, not {:?}",
                set.space, set.stages
            )));
        }
    }
    Ok(())
}

pub(crate) fn create_pipeline_layout(
    device: &VulkanDevice,
    plan: &LayoutPlan,
) -> GpuResult<NativeLayout> {
    validate_plan(plan)?;

    let spaces: Vec<u32> = plan.sets().iter().map(|set| set.space).collect();
    let slots = dense_set_plan(&spaces)?;

    let mut declared: Vec<Option<VulkanDescriptorSetLayout>> =
        (0..plan.sets().len()).map(|_| None).collect();
    let mut placeholders = Vec::new();
    let mut set_handles = Vec::with_capacity(slots.len());

    for (set_index, slot) in slots.iter().enumerate() {
        let default_sampler = set_index == 0 && plan.needs_default_sampler();
        match slot {
            Some(declared_index) => {
                let desc = &plan.sets()[*declared_index];
                let layout = create_set_layout(device, desc, default_sampler)?;
                set_handles.push(layout.handle);
                declared[*declared_index] = Some(layout);
            }
            None => {
                let desc = DescriptorSetLayoutDesc::new(set_index as u32, ShaderStage::FRAGMENT);
                let layout = create_set_layout(device, &desc, default_sampler)?;
                set_handles.push(layout.handle);
                placeholders.push(layout);
            }
        }
    }

    let push_constant_ranges: Vec<vk::PushConstantRange> = plan
        .push_constants()
        .map(|layout| {
            layout
                .ranges()
                .iter()
                .map(|range| vk::PushConstantRange {
                    stage_flags: convert_shader_stages(range.stage()),
                    offset: range.offset(),
                    size: range.size(),
                })
                .collect()
        })
        .unwrap_or_default();

    let layout_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_handles)
        .push_constant_ranges(&push_constant_ranges);

    let handle = unsafe { device.handle().create_pipeline_layout(&layout_info, None) }
        .map_err(|e| GpuError::runtime(format!("Failed to create pipeline layout: {:?}", e)))?;

    log::debug!(
        "Vulkan pipeline layout with {} set layouts ({} placeholders) and {} push constant ranges",
        set_handles.len(),
        placeholders.len(),
        push_constant_ranges.len()
    );

    let sets = declared
        .into_iter()
        .zip(&spaces)
        .map(|(layout, &space)| {
            layout
                .map(|layout| (NativeDescriptorSetLayout::Vulkan(layout), space))
                .ok_or_else(|| {
                    GpuError::runtime(format!("no set layout was created for space {space}"))
                })
        })
        .collect::<GpuResult<Vec<_>>>()?;

    Ok(NativeLayout {
        sets,
        push_constant_indices: (0..push_constant_ranges.len() as u32).collect(),
        pipeline: NativePipelineLayout::Vulkan(VulkanPipelineLayout {
            device: device.handle().clone(),
            handle,
            placeholders,
        }),
    })
}

/// Where each binding of a set layout takes its immutable sampler from.
struct BindingPlan {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    count: u32,
    sampler: Option<usize>,
}

fn create_set_layout(
    device: &VulkanDevice,
    desc: &DescriptorSetLayoutDesc,
    default_sampler: bool,
) -> GpuResult<VulkanDescriptorSetLayout> {
    // Samplers are destroyed by the wrapper if anything below fails.
    let mut layout = VulkanDescriptorSetLayout {
        device: device.handle().clone(),
        handle: vk::DescriptorSetLayout::null(),
        immutable_samplers: Vec::new(),
    };

    let mut plans = Vec::with_capacity(desc.bindings.len() + 1);
    for binding in &desc.bindings {
        let sampler = match binding.sampler() {
            Some(sampler) => {
                layout.immutable_samplers.push(create_sampler(device, sampler)?);
                Some(layout.immutable_samplers.len() - 1)
            }
            None => None,
        };
        plans.push(BindingPlan {
            binding: binding.binding(),
            descriptor_type: convert_descriptor_type(binding.descriptor_type()),
            count: binding.descriptors(),
            sampler,
        });
    }

    if default_sampler {
        if desc.binding(0).is_some() {
            log::warn!(
                "Binding 0 of descriptor set {} is taken, input attachments get no default sampler",
                desc.space
            );
        } else {
            layout
                .immutable_samplers
                .push(create_sampler(device, &SamplerDescriptor::bilinear_clamp())?);
            plans.push(BindingPlan {
                binding: 0,
                descriptor_type: convert_descriptor_type(DescriptorType::Sampler),
                count: 1,
                sampler: Some(layout.immutable_samplers.len() - 1),
            });
        }
    }

    let stage_flags = convert_shader_stages(desc.stages);
    let handle = {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = plans
            .iter()
            .map(|plan| {
                let binding = vk::DescriptorSetLayoutBinding::default()
                    .binding(plan.binding)
                    .descriptor_type(plan.descriptor_type)
                    .descriptor_count(plan.count)
                    .stage_flags(stage_flags);
                match plan.sampler {
                    Some(index) => binding.immutable_samplers(std::slice::from_ref(
                        &layout.immutable_samplers[index],
                    )),
                    None => binding,
                }
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { device.handle().create_descriptor_set_layout(&layout_info, None) }.map_err(|e| {
            GpuError::runtime(format!(
                "Failed to create descriptor set layout for space {}: {:?}",
                desc.space, e
            ))
        })?
    };

    layout.handle = handle;
    Ok(layout)
}

fn create_sampler(device: &VulkanDevice, descriptor: &SamplerDescriptor) -> GpuResult<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::default()
        .mag_filter(convert_filter_mode(descriptor.mag_filter))
        .min_filter(convert_filter_mode(descriptor.min_filter))
        .mipmap_mode(convert_mipmap_mode(descriptor.mipmap_filter))
        .address_mode_u(convert_address_mode(descriptor.address_mode_u))
        .address_mode_v(convert_address_mode(descriptor.address_mode_v))
        .address_mode_w(convert_address_mode(descriptor.address_mode_w))
        .mip_lod_bias(descriptor.mip_lod_bias)
        .anisotropy_enable(descriptor.anisotropy_clamp > 1)
        .max_anisotropy(descriptor.anisotropy_clamp as f32)
        .compare_enable(descriptor.compare.is_some())
        .compare_op(
            descriptor
                .compare
                .map(convert_compare_function)
                .unwrap_or(vk::CompareOp::ALWAYS),
        )
        .min_lod(descriptor.lod_min_clamp)
        .max_lod(descriptor.lod_max_clamp)
        .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
        .unnormalized_coordinates(false);

    unsafe { device.handle().create_sampler(&sampler_info, None) }
        .map_err(|e| GpuError::runtime(format!("Failed to create sampler: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DescriptorLayout;

    #[test]
    fn test_dense_plan_fills_gaps() {
        assert_eq!(
            dense_set_plan(&[0, 2, 5]).unwrap(),
            vec![Some(0), None, Some(1), None, None, Some(2)]
        );
    }

    #[test]
    fn test_dense_plan_leading_gap() {
        assert_eq!(dense_set_plan(&[1]).unwrap(), vec![None, Some(0)]);
        assert!(dense_set_plan(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_dense_plan_rejects_huge_space() {
        assert_eq!(
            dense_set_plan(&[MAX_DESCRIPTOR_SETS - 1]).unwrap().len(),
            MAX_DESCRIPTOR_SETS as usize
        );
        assert!(matches!(
            dense_set_plan(&[0, MAX_DESCRIPTOR_SETS]),
            Err(GpuError::InvalidArgument(_))
        ));
        assert!(matches!(
            dense_set_plan(&[u32::MAX]),
            Err(GpuError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_input_attachments_need_fragment_only_set() {
        let fragment = DescriptorSetLayoutDesc::new(0, ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::input_attachment(1, 0));
        let plan = LayoutPlan::new(vec![fragment], None).unwrap();
        assert!(validate_plan(&plan).is_ok());
        assert!(plan.needs_default_sampler());

        let graphics = DescriptorSetLayoutDesc::new(0, ShaderStage::VERTEX | ShaderStage::FRAGMENT)
            .with_binding(DescriptorLayout::input_attachment(1, 0));
        let plan = LayoutPlan::new(vec![graphics], None).unwrap();
        assert!(matches!(
            validate_plan(&plan),
            Err(GpuError::InvalidArgument(_))
        ));
    }
}
