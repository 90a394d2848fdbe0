//! Push constants layouts.

use crate::error::{GpuError, GpuResult};
use crate::types::ShaderStage;

/// A block of push constants visible to one set of shader stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantsRange {
    stage: ShaderStage,
    offset: u32,
    size: u32,
    space: u32,
    binding: u32,
    root_parameter_index: u32,
}

impl PushConstantsRange {
    /// Create a range of `size` bytes at `offset`.
    ///
    /// `space` and `binding` address the range on backends that bind push
    /// constants as root constants.
    pub fn new(stage: ShaderStage, offset: u32, size: u32, space: u32, binding: u32) -> Self {
        Self {
            stage,
            offset,
            size,
            space,
            binding,
            root_parameter_index: 0,
        }
    }

    /// Shader stages the range is visible to.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Byte offset.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Register space.
    pub fn space(&self) -> u32 {
        self.space
    }

    /// Register binding.
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Root parameter index assigned when the pipeline layout was built.
    pub fn root_parameter_index(&self) -> u32 {
        self.root_parameter_index
    }
}

/// Push constant ranges of a pipeline layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PushConstantsLayout {
    size: u32,
    ranges: Vec<PushConstantsRange>,
}

impl PushConstantsLayout {
    /// Create a layout of `size` bytes, rounded up to a multiple of 4.
    ///
    /// A size that cannot be rounded without overflowing is kept as given and
    /// rejected by [`validate`](Self::validate).
    pub fn new(size: u32) -> Self {
        Self {
            size: size.checked_next_multiple_of(4).unwrap_or(size),
            ranges: Vec::new(),
        }
    }

    /// Append a range.
    pub fn with_range(mut self, range: PushConstantsRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub(crate) fn push_range(&mut self, range: PushConstantsRange) {
        self.ranges.push(range);
    }

    /// Total size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Ranges in declaration order.
    pub fn ranges(&self) -> &[PushConstantsRange] {
        &self.ranges
    }

    /// Range visible to `stage`.
    pub fn range(&self, stage: ShaderStage) -> GpuResult<&PushConstantsRange> {
        self.ranges
            .iter()
            .find(|range| range.stage.intersects(stage))
            .ok_or_else(|| {
                GpuError::out_of_range(
                    "stage",
                    format!("no push constant range is visible to {stage:?}"),
                )
            })
    }

    /// Check alignment, bounds and stage uniqueness of every range.
    pub fn validate(&self) -> GpuResult<()> {
        if self.size % 4 != 0 {
            return Err(GpuError::out_of_range(
                "size",
                format!("a push constant layout of {} bytes cannot be 4 byte aligned", self.size),
            ));
        }

        let mut stages = ShaderStage::empty();
        for range in &self.ranges {
            if range.stage.is_empty() {
                return Err(GpuError::invalid_argument(
                    "a push constant range must be visible to at least one stage",
                ));
            }

            if range.offset % 4 != 0 || range.size % 4 != 0 {
                return Err(GpuError::invalid_argument(format!(
                    "push constant range for {:?} has offset {} and size {}, \
                     both must be multiples of 4",
                    range.stage, range.offset, range.size
                )));
            }

            if range.size == 0 {
                return Err(GpuError::invalid_argument(format!(
                    "push constant range for {:?} is empty",
                    range.stage
                )));
            }

            match range.offset.checked_add(range.size) {
                Some(end) if end <= self.size => {}
                _ => {
                    return Err(GpuError::out_of_range(
                        "size",
                        format!(
                            "push constant range of {} bytes at {} exceeds the {} byte layout",
                            range.size, range.offset, self.size
                        ),
                    ));
                }
            }

            if stages.intersects(range.stage) {
                return Err(GpuError::invalid_argument(format!(
                    "more than one push constant range is visible to {:?}",
                    stages & range.stage
                )));
            }
            stages |= range.stage;
        }

        Ok(())
    }

    pub(crate) fn assign_root_parameter_indices(&mut self, indices: &[u32]) {
        for (range, index) in self.ranges.iter_mut().zip(indices) {
            range.root_parameter_index = *index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_rounded_up() {
        assert_eq!(PushConstantsLayout::new(13).size(), 16);
        assert_eq!(PushConstantsLayout::new(64).size(), 64);
    }

    #[test]
    fn test_unalignable_size_rejected() {
        let layout = PushConstantsLayout::new(u32::MAX)
            .with_range(PushConstantsRange::new(ShaderStage::COMPUTE, 0, 16, 0, 0));
        assert_eq!(layout.size(), u32::MAX);
        assert!(matches!(
            layout.validate(),
            Err(GpuError::ArgumentOutOfRange { name: "size", .. })
        ));
    }

    #[test]
    fn test_range_end_overflow_rejected() {
        let layout = PushConstantsLayout::new(64).with_range(PushConstantsRange::new(
            ShaderStage::VERTEX,
            u32::MAX - 3,
            8,
            0,
            0,
        ));
        assert!(matches!(
            layout.validate(),
            Err(GpuError::ArgumentOutOfRange { name: "size", .. })
        ));
    }

    #[test]
    fn test_valid_ranges() {
        let layout = PushConstantsLayout::new(32)
            .with_range(PushConstantsRange::new(ShaderStage::VERTEX, 0, 16, 0, 0))
            .with_range(PushConstantsRange::new(ShaderStage::FRAGMENT, 16, 16, 0, 1));
        assert!(layout.validate().is_ok());
        assert_eq!(layout.range(ShaderStage::FRAGMENT).unwrap().offset(), 16);
        assert!(layout.range(ShaderStage::COMPUTE).is_err());
    }

    #[test]
    fn test_misaligned_range() {
        let layout = PushConstantsLayout::new(32)
            .with_range(PushConstantsRange::new(ShaderStage::VERTEX, 2, 8, 0, 0));
        assert!(matches!(layout.validate(), Err(GpuError::InvalidArgument(_))));
    }

    #[test]
    fn test_range_outside_layout() {
        let layout = PushConstantsLayout::new(16)
            .with_range(PushConstantsRange::new(ShaderStage::COMPUTE, 8, 16, 0, 0));
        assert!(matches!(
            layout.validate(),
            Err(GpuError::ArgumentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_one_range_per_stage() {
        let layout = PushConstantsLayout::new(32)
            .with_range(PushConstantsRange::new(
                ShaderStage::VERTEX | ShaderStage::FRAGMENT,
                0,
                16,
                0,
                0,
            ))
            .with_range(PushConstantsRange::new(ShaderStage::FRAGMENT, 16, 16, 0, 1));
        assert!(matches!(layout.validate(), Err(GpuError::InvalidArgument(_))));
    }
}
