//! Pipeline layout reflection from shader modules.
//!
//! Shaders are parsed with naga (SPIR-V or WGSL) and validated so that only
//! the global variables an entry point actually uses are reflected. Every
//! resource binding becomes a [`DescriptorLayout`] in the set named by its
//! group, and every push constant block becomes a [`PushConstantsRange`].
//!
//! When several stages use the same `(space, binding)` pair the stage masks
//! are merged. A later stage that disagrees on the type, element size or
//! descriptor count is ignored with a warning and the first declaration wins.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::device::Device;
use crate::error::{GpuError, GpuResult};
use crate::layout::{
    DescriptorLayout, DescriptorSetLayoutDesc, PipelineLayout, PushConstantsLayout,
    PushConstantsRange,
};
use crate::types::{DescriptorType, ShaderStage};

/// A parsed and validated shader module for one stage.
#[derive(Debug)]
pub struct ShaderModule {
    stage: ShaderStage,
    module: naga::Module,
    info: naga::valid::ModuleInfo,
}

impl ShaderModule {
    /// Parse a SPIR-V binary.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if `stage` names more than one
    /// stage and [`GpuError::Reflection`] if the binary cannot be parsed or
    /// validated.
    pub fn from_spirv(stage: ShaderStage, bytes: &[u8]) -> GpuResult<Self> {
        check_stage(stage)?;
        let options = naga::front::spv::Options::default();
        let module = naga::front::spv::parse_u8_slice(bytes, &options)
            .map_err(|e| GpuError::Reflection(format!("SPIR-V parse error: {e}")))?;
        Self::validated(stage, module)
    }

    /// Parse WGSL source.
    ///
    /// # Errors
    ///
    /// Same as [`from_spirv`](Self::from_spirv).
    pub fn from_wgsl(stage: ShaderStage, source: &str) -> GpuResult<Self> {
        check_stage(stage)?;
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| GpuError::Reflection(format!("WGSL parse error: {e}")))?;
        Self::validated(stage, module)
    }

    fn validated(stage: ShaderStage, module: naga::Module) -> GpuResult<Self> {
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        let info = validator
            .validate(&module)
            .map_err(|e| GpuError::Reflection(format!("Validation error: {e}")))?;

        let shader = Self {
            stage,
            module,
            info,
        };
        if shader.entry_points().next().is_none() {
            return Err(GpuError::Reflection(format!(
                "module has no entry point for stage {stage:?}"
            )));
        }
        Ok(shader)
    }

    /// Stage of the module.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Parsed module.
    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// Names of the entry points of this module's stage.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.stage_entry_points().map(|(_, ep)| ep.name.as_str())
    }

    fn stage_entry_points(&self) -> impl Iterator<Item = (usize, &naga::EntryPoint)> {
        let stage = naga_stage(self.stage);
        self.module
            .entry_points
            .iter()
            .enumerate()
            .filter(move |(_, ep)| Some(ep.stage) == stage)
    }

    /// Global variables referenced by any entry point of the stage, in declaration order.
    fn used_globals(&self) -> Vec<&naga::GlobalVariable> {
        self.module
            .global_variables
            .iter()
            .filter(|(handle, _)| {
                self.stage_entry_points()
                    .any(|(index, _)| !self.info.get_entry_point(index)[*handle].is_empty())
            })
            .map(|(_, var)| var)
            .collect()
    }
}

fn check_stage(stage: ShaderStage) -> GpuResult<()> {
    if !stage.is_single_stage() {
        return Err(GpuError::invalid_argument(format!(
            "a shader module belongs to exactly one stage, got {stage:?}"
        )));
    }
    if naga_stage(stage).is_none() {
        return Err(GpuError::invalid_argument(format!(
            "stage {stage:?} cannot be reflected"
        )));
    }
    Ok(())
}

fn naga_stage(stage: ShaderStage) -> Option<naga::ShaderStage> {
    if stage == ShaderStage::VERTEX {
        Some(naga::ShaderStage::Vertex)
    } else if stage == ShaderStage::FRAGMENT {
        Some(naga::ShaderStage::Fragment)
    } else if stage == ShaderStage::COMPUTE {
        Some(naga::ShaderStage::Compute)
    } else {
        None
    }
}

/// Descriptor sets and push constants derived from a [`ShaderProgram`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedLayout {
    sets: Vec<DescriptorSetLayoutDesc>,
    push_constants: Option<PushConstantsLayout>,
}

impl ReflectedLayout {
    /// Descriptor sets ordered by space, bindings ordered by binding index.
    pub fn sets(&self) -> &[DescriptorSetLayoutDesc] {
        &self.sets
    }

    /// Push constants, if any stage declares a block.
    pub fn push_constants(&self) -> Option<&PushConstantsLayout> {
        self.push_constants.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Vec<DescriptorSetLayoutDesc>, Option<PushConstantsLayout>) {
        (self.sets, self.push_constants)
    }
}

/// The shader modules of one pipeline.
#[derive(Debug, Default)]
pub struct ShaderProgram {
    modules: Vec<ShaderModule>,
}

impl ShaderProgram {
    /// Create a program from modules of distinct stages.
    pub fn new(modules: Vec<ShaderModule>) -> Self {
        Self { modules }
    }

    /// Modules in the order they were given.
    pub fn modules(&self) -> &[ShaderModule] {
        &self.modules
    }

    /// Reflect the descriptor sets and push constants of every module.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::NotInitialized`] if the program has no modules and
    /// [`GpuError::Reflection`] if a resource has a type that cannot be bound.
    pub fn reflect(&self) -> GpuResult<ReflectedLayout> {
        if self.modules.is_empty() {
            return Err(GpuError::NotInitialized(
                "shader program has no modules to reflect".to_string(),
            ));
        }

        let mut bindings: BTreeMap<(u32, u32), (DescriptorLayout, ShaderStage)> = BTreeMap::new();
        let mut push_ranges: Vec<PushConstantsRange> = Vec::new();

        for shader in &self.modules {
            let module = &shader.module;
            let mut push_seen = false;

            for var in shader.used_globals() {
                if var.space == naga::AddressSpace::PushConstant {
                    if push_seen || push_ranges.iter().any(|r| r.stage() == shader.stage) {
                        log::warn!(
                            "Ignoring extra push constant block {:?} in stage {:?}",
                            var.name,
                            shader.stage
                        );
                        continue;
                    }
                    push_seen = true;
                    let size = module.types[var.ty]
                        .inner
                        .size(module.to_ctx())
                        .checked_next_multiple_of(4)
                        .ok_or_else(|| {
                            GpuError::Reflection(format!(
                                "push constant block {:?} is too large",
                                var.name
                            ))
                        })?;
                    push_ranges.push(PushConstantsRange::new(shader.stage, 0, size, 0, 0));
                    continue;
                }

                let Some(binding) = &var.binding else {
                    continue;
                };
                let layout = reflect_binding(module, var, binding.binding)?;

                match bindings.entry((binding.group, binding.binding)) {
                    Entry::Vacant(entry) => {
                        entry.insert((layout, shader.stage));
                    }
                    Entry::Occupied(mut entry) => {
                        let (existing, stages) = entry.get_mut();
                        if *existing == layout {
                            *stages |= shader.stage;
                        } else {
                            log::warn!(
                                "Binding {} of space {} in stage {:?} conflicts with an \
                                 earlier stage ({:?} x{} vs {:?} x{}), keeping the first",
                                binding.binding,
                                binding.group,
                                shader.stage,
                                layout.descriptor_type(),
                                layout.descriptors(),
                                existing.descriptor_type(),
                                existing.descriptors()
                            );
                        }
                    }
                }
            }
        }

        let mut sets: Vec<DescriptorSetLayoutDesc> = Vec::new();
        for ((space, _), (layout, stages)) in bindings {
            match sets.last_mut() {
                Some(set) if set.space == space => {
                    set.stages |= stages;
                    set.bindings.push(layout);
                }
                _ => sets.push(DescriptorSetLayoutDesc::new(space, stages).with_binding(layout)),
            }
        }

        let push_constants = if push_ranges.is_empty() {
            None
        } else {
            let size = push_ranges
                .iter()
                .map(|range| range.offset() + range.size())
                .max()
                .unwrap_or(0);
            Some(
                push_ranges
                    .into_iter()
                    .fold(PushConstantsLayout::new(size), PushConstantsLayout::with_range),
            )
        };

        log::debug!(
            "Reflected {} descriptor sets from {} shader modules",
            sets.len(),
            self.modules.len()
        );

        Ok(ReflectedLayout {
            sets,
            push_constants,
        })
    }

    /// Reflect the program and build its pipeline layout on `device`.
    pub fn reflect_pipeline_layout(&self, device: &Device) -> GpuResult<PipelineLayout> {
        let mut builder = PipelineLayout::builder();
        builder.with_reflection(self.reflect()?);
        builder.build(device)
    }
}

fn reflect_binding(
    module: &naga::Module,
    var: &naga::GlobalVariable,
    binding: u32,
) -> GpuResult<DescriptorLayout> {
    let (ty, descriptors) = match module.types[var.ty].inner {
        naga::TypeInner::BindingArray { base, size } => {
            let count = match size {
                naga::ArraySize::Constant(count) => count.get(),
                _ => 1,
            };
            (base, count)
        }
        _ => (var.ty, 1),
    };

    let descriptor_type = match (var.space, &module.types[ty].inner) {
        (naga::AddressSpace::Uniform, _) => DescriptorType::ConstantBuffer,
        (naga::AddressSpace::Storage { access }, _) => {
            if access.contains(naga::StorageAccess::STORE) {
                DescriptorType::RWStructuredBuffer
            } else {
                DescriptorType::StructuredBuffer
            }
        }
        (naga::AddressSpace::Handle, naga::TypeInner::Image { class, .. }) => match class {
            naga::ImageClass::Storage { .. } => DescriptorType::RWTexture,
            _ => DescriptorType::Texture,
        },
        (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => DescriptorType::Sampler,
        (naga::AddressSpace::Handle, naga::TypeInner::AccelerationStructure) => {
            DescriptorType::AccelerationStructure
        }
        (space, inner) => {
            return Err(GpuError::Reflection(format!(
                "global {:?} at binding {binding} has unsupported type {inner:?} in {space:?}",
                var.name
            )));
        }
    };

    let element_size = match descriptor_type {
        DescriptorType::ConstantBuffer
        | DescriptorType::StructuredBuffer
        | DescriptorType::RWStructuredBuffer => element_size(module, ty),
        _ => 0,
    };

    Ok(DescriptorLayout::new(binding, descriptor_type, element_size).with_descriptors(descriptors))
}

/// Size of one buffer element: the array stride for arrays and for structs
/// ending in a runtime-sized array, the type size otherwise.
fn element_size(module: &naga::Module, ty: naga::Handle<naga::Type>) -> u32 {
    let inner = &module.types[ty].inner;
    match inner {
        naga::TypeInner::Array { stride, .. } => *stride,
        naga::TypeInner::Struct { members, .. } => match members.last() {
            Some(last) => match module.types[last.ty].inner {
                naga::TypeInner::Array {
                    size: naga::ArraySize::Dynamic,
                    stride,
                    ..
                } => stride,
                _ => inner.size(module.to_ctx()),
            },
            None => 0,
        },
        _ => inner.size(module.to_ctx()),
    }
}
