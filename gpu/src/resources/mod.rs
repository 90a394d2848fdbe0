//! Buffer and image capabilities.
//!
//! Resources are allocated by the device layer outside this crate and wrapped
//! here so barriers can address them through their native handles.

mod buffer;
mod image;

pub use buffer::{Buffer, BufferDescriptor, BufferUsage};
pub use image::{Extent3d, Image, ImageAspect, ImageDescriptor, SubresourceRange};
