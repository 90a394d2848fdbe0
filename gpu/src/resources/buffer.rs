//! Buffer capability consumed by barriers.

use bitflags::bitflags;

use crate::backend::NativeBuffer;
use crate::error::{GpuError, GpuResult};

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
        /// Buffer backs an acceleration structure.
        const ACCELERATION_STRUCTURE = 1 << 7;
        /// Buffer is scratch memory for acceleration structure builds.
        const ACCELERATION_STRUCTURE_SCRATCH = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for wrapping a buffer.
///
/// A buffer is an array of `elements` elements. Each element occupies
/// `element_size` bytes rounded up to `alignment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size of one element in bytes.
    pub element_size: u64,
    /// Number of elements.
    pub elements: u32,
    /// Element alignment in bytes. `0` and `1` mean tightly packed.
    pub alignment: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a descriptor for a buffer holding `elements` elements.
    pub fn new(element_size: u64, elements: u32, usage: BufferUsage) -> Self {
        Self {
            label: None,
            element_size,
            elements,
            alignment: 0,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the element alignment.
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }
}

/// A GPU buffer created by the device layer.
#[derive(Debug)]
pub struct Buffer {
    descriptor: BufferDescriptor,
    native: NativeBuffer,
}

impl Buffer {
    /// Wrap a native buffer handle.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the element count is zero or
    /// the alignment is not a power of two, and [`GpuError::ArgumentOutOfRange`]
    /// if the aligned size does not fit in 64 bits.
    pub fn new(descriptor: BufferDescriptor, native: NativeBuffer) -> GpuResult<Self> {
        if descriptor.elements == 0 {
            return Err(GpuError::invalid_argument(
                "a buffer must contain at least one element",
            ));
        }

        if descriptor.alignment > 1 && !descriptor.alignment.is_power_of_two() {
            return Err(GpuError::invalid_argument(format!(
                "buffer alignment {} is not a power of two",
                descriptor.alignment
            )));
        }

        let aligned = match descriptor.alignment {
            0 | 1 => Some(descriptor.element_size),
            alignment => descriptor.element_size.checked_next_multiple_of(alignment),
        };
        if aligned
            .and_then(|size| size.checked_mul(u64::from(descriptor.elements)))
            .is_none()
        {
            return Err(GpuError::out_of_range(
                "size",
                format!(
                    "{} elements of {} bytes aligned to {} overflow the buffer size",
                    descriptor.elements, descriptor.element_size, descriptor.alignment
                ),
            ));
        }

        Ok(Self { descriptor, native })
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Number of elements.
    pub fn elements(&self) -> u32 {
        self.descriptor.elements
    }

    /// Unaligned element size in bytes.
    pub fn element_size(&self) -> u64 {
        self.descriptor.element_size
    }

    /// Element size rounded up to the element alignment.
    pub fn aligned_element_size(&self) -> u64 {
        match self.descriptor.alignment {
            0 | 1 => self.descriptor.element_size,
            alignment => self.descriptor.element_size.next_multiple_of(alignment),
        }
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.aligned_element_size() * u64::from(self.descriptor.elements)
    }

    /// Returns `true` if the buffer is acceleration structure build scratch memory.
    pub fn is_scratch(&self) -> bool {
        self.descriptor
            .usage
            .contains(BufferUsage::ACCELERATION_STRUCTURE_SCRATCH)
    }

    /// Byte offset of a single element.
    pub fn element_offset(&self, element: u32) -> GpuResult<u64> {
        self.element_range(element).map(|(offset, _)| offset)
    }

    /// Byte offset and size of a single element.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::ArgumentOutOfRange`] if `element` is not an element
    /// of this buffer.
    pub fn element_range(&self, element: u32) -> GpuResult<(u64, u64)> {
        if element >= self.descriptor.elements {
            return Err(GpuError::out_of_range(
                "element",
                format!(
                    "element {element} exceeds the {} elements of the buffer",
                    self.descriptor.elements
                ),
            ));
        }

        let size = self.aligned_element_size();
        Ok((size * u64::from(element), size))
    }

    /// Native handle.
    pub fn native(&self) -> &NativeBuffer {
        &self.native
    }
}
