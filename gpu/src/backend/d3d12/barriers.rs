//! Barrier lowering for D3D12 enhanced barriers.
//!
//! Each non-empty transition category becomes one barrier group, and all
//! groups are recorded with a single `Barrier` call.

use super::D3d12CommandList;
use super::conversion::{
    convert_access, convert_image_layout, convert_pipeline_stage, convert_subresource_range,
};
use super::native::{BarrierGroup, BufferBarrier, GlobalBarrier, TextureBarrier};
use crate::backend::{NativeBuffer, NativeImage};
use crate::barrier::Barrier;
use crate::error::{GpuError, GpuResult};

/// Native barrier groups of one [`Barrier`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct D3d12Barriers {
    /// Global barriers.
    pub globals: Vec<GlobalBarrier>,
    /// Buffer barriers.
    pub buffers: Vec<BufferBarrier>,
    /// Texture barriers.
    pub textures: Vec<TextureBarrier>,
}

impl D3d12Barriers {
    /// One group per non-empty category.
    pub fn groups(&self) -> Vec<BarrierGroup<'_>> {
        let mut groups = Vec::with_capacity(3);
        if !self.globals.is_empty() {
            groups.push(BarrierGroup::Global(&self.globals));
        }
        if !self.buffers.is_empty() {
            groups.push(BarrierGroup::Buffer(&self.buffers));
        }
        if !self.textures.is_empty() {
            groups.push(BarrierGroup::Texture(&self.textures));
        }
        groups
    }
}

/// Lower `barrier` into D3D12 barrier groups.
///
/// Buffer barriers always cover the whole buffer, even for element
/// transitions.
///
/// # Errors
///
/// Returns [`GpuError::InvalidArgument`] if a transitioned resource is not a
/// D3D12 resource.
pub fn build(barrier: &Barrier<'_>) -> GpuResult<D3d12Barriers> {
    let sync_before = convert_pipeline_stage(barrier.sync_before());
    let sync_after = convert_pipeline_stage(barrier.sync_after());

    let globals = barrier
        .globals()
        .iter()
        .map(|global| GlobalBarrier {
            sync_before,
            sync_after,
            access_before: convert_access(global.access_before),
            access_after: convert_access(global.access_after),
        })
        .collect();

    let mut buffers = Vec::with_capacity(barrier.buffers().len());
    for transition in barrier.buffers() {
        let resource = match transition.buffer.native() {
            NativeBuffer::D3D12(resource) => *resource,
            #[allow(unreachable_patterns)]
            _ => {
                return Err(GpuError::invalid_argument(format!(
                    "buffer {:?} is not a D3D12 resource",
                    transition.buffer.label()
                )));
            }
        };

        let (access_before, access_after) =
            transition.lowered_access(barrier.sync_before(), barrier.sync_after());

        buffers.push(BufferBarrier {
            sync_before,
            sync_after,
            access_before: convert_access(access_before),
            access_after: convert_access(access_after),
            resource,
            offset: 0,
            size: u64::MAX,
        });
    }

    let mut textures = Vec::with_capacity(barrier.images().len());
    for transition in barrier.images() {
        let resource = match transition.image.native() {
            NativeImage::D3D12(resource) => *resource,
            #[allow(unreachable_patterns)]
            _ => {
                return Err(GpuError::invalid_argument(format!(
                    "image {:?} is not a D3D12 resource",
                    transition.image.label()
                )));
            }
        };

        textures.push(TextureBarrier {
            sync_before,
            sync_after,
            access_before: convert_access(transition.access_before),
            access_after: convert_access(transition.access_after),
            layout_before: convert_image_layout(transition.source_layout()),
            layout_after: convert_image_layout(transition.to_layout),
            resource,
            subresources: convert_subresource_range(&transition.range),
        });
    }

    Ok(D3d12Barriers {
        globals,
        buffers,
        textures,
    })
}

/// Record `barrier` into `cmd` with one `Barrier` call.
pub fn record(cmd: &D3d12CommandList, barrier: &Barrier<'_>) -> GpuResult<()> {
    let barriers = build(barrier)?;
    let groups = barriers.groups();
    if !groups.is_empty() {
        cmd.api().barrier(&groups);
    }
    Ok(())
}
