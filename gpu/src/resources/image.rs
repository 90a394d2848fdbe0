//! Image capability and per-subresource layout tracking.

use parking_lot::RwLock;

use crate::backend::NativeImage;
use crate::error::{GpuError, GpuResult};
use crate::types::ImageLayout;

/// 3D extent of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D images).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Which aspects of the image format are present.
///
/// The aspect fixes the number of planes: depth/stencil formats have a
/// depth plane (0) and a stencil plane (1), everything else has one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageAspect {
    /// Color format.
    #[default]
    Color,
    /// Depth-only format.
    Depth,
    /// Stencil-only format.
    Stencil,
    /// Combined depth/stencil format.
    DepthStencil,
}

impl ImageAspect {
    /// Number of planes.
    pub fn planes(self) -> u32 {
        match self {
            Self::DepthStencil => 2,
            _ => 1,
        }
    }
}

/// Descriptor for wrapping an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Debug label for the image.
    pub label: Option<String>,
    /// Size of the top mip level.
    pub extent: Extent3d,
    /// Mip level count.
    pub mip_levels: u32,
    /// Array layer count.
    pub array_layers: u32,
    /// Format aspect.
    pub aspect: ImageAspect,
}

impl ImageDescriptor {
    /// Create a descriptor for a single-level 2D color image.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            label: None,
            extent: Extent3d::new_2d(width, height),
            mip_levels: 1,
            array_layers: 1,
            aspect: ImageAspect::Color,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, levels: u32) -> Self {
        self.mip_levels = levels;
        self
    }

    /// Set the array layer count.
    pub fn with_array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers;
        self
    }

    /// Set the format aspect.
    pub fn with_aspect(mut self, aspect: ImageAspect) -> Self {
        self.aspect = aspect;
        self
    }
}

/// A contiguous range of image subresources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    /// First mip level.
    pub base_level: u32,
    /// Number of mip levels.
    pub levels: u32,
    /// First array layer.
    pub base_layer: u32,
    /// Number of array layers.
    pub layers: u32,
    /// First plane.
    pub base_plane: u32,
    /// Number of planes.
    pub planes: u32,
}

impl SubresourceRange {
    /// Iterate over every `(level, layer, plane)` triple in the range.
    ///
    /// Bounds saturate at `u32::MAX`; validate the range against an image first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let plane_end = self.base_plane.saturating_add(self.planes);
        let layer_end = self.base_layer.saturating_add(self.layers);
        let level_end = self.base_level.saturating_add(self.levels);

        (self.base_plane..plane_end).flat_map(move |plane| {
            (self.base_layer..layer_end).flat_map(move |layer| {
                (self.base_level..level_end).map(move |level| (level, layer, plane))
            })
        })
    }
}

/// A GPU image created by the device layer.
///
/// The image records the last layout a barrier transitioned each subresource
/// to. Tracking starts at [`ImageLayout::Undefined`].
#[derive(Debug)]
pub struct Image {
    descriptor: ImageDescriptor,
    layouts: RwLock<Vec<ImageLayout>>,
    native: NativeImage,
}

impl Image {
    /// Wrap a native image handle.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the image has no mip levels
    /// or no array layers.
    pub fn new(descriptor: ImageDescriptor, native: NativeImage) -> GpuResult<Self> {
        if descriptor.mip_levels == 0 || descriptor.array_layers == 0 {
            return Err(GpuError::invalid_argument(
                "an image needs at least one mip level and one array layer",
            ));
        }

        let subresources =
            descriptor.mip_levels * descriptor.array_layers * descriptor.aspect.planes();

        Ok(Self {
            descriptor,
            layouts: RwLock::new(vec![ImageLayout::Undefined; subresources as usize]),
            native,
        })
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Size of the top mip level.
    pub fn extent(&self) -> Extent3d {
        self.descriptor.extent
    }

    /// Mip level count.
    pub fn levels(&self) -> u32 {
        self.descriptor.mip_levels
    }

    /// Array layer count.
    pub fn layers(&self) -> u32 {
        self.descriptor.array_layers
    }

    /// Plane count.
    pub fn planes(&self) -> u32 {
        self.descriptor.aspect.planes()
    }

    /// Format aspect.
    pub fn aspect(&self) -> ImageAspect {
        self.descriptor.aspect
    }

    /// Total number of subresources.
    pub fn subresources(&self) -> u32 {
        self.levels() * self.layers() * self.planes()
    }

    /// Linear subresource index of `(level, layer, plane)`.
    pub fn subresource_id(&self, level: u32, layer: u32, plane: u32) -> GpuResult<u32> {
        if level >= self.levels() {
            return Err(GpuError::out_of_range(
                "level",
                format!("mip level {level} exceeds {} levels", self.levels()),
            ));
        }
        if layer >= self.layers() {
            return Err(GpuError::out_of_range(
                "layer",
                format!("array layer {layer} exceeds {} layers", self.layers()),
            ));
        }
        if plane >= self.planes() {
            return Err(GpuError::out_of_range(
                "plane",
                format!("plane {plane} exceeds {} planes", self.planes()),
            ));
        }

        Ok(level + layer * self.levels() + plane * self.levels() * self.layers())
    }

    /// Range covering every subresource.
    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange {
            base_level: 0,
            levels: self.levels(),
            base_layer: 0,
            layers: self.layers(),
            base_plane: 0,
            planes: self.planes(),
        }
    }

    /// Check that `range` is non-empty and lies inside the image.
    pub fn validate_range(&self, range: &SubresourceRange) -> GpuResult<()> {
        if range.levels == 0 || range.layers == 0 || range.planes == 0 {
            return Err(GpuError::invalid_argument(
                "a subresource range must cover at least one level, layer and plane",
            ));
        }
        check_range_end("levels", range.base_level, range.levels, self.levels())?;
        check_range_end("layers", range.base_layer, range.layers, self.layers())?;
        check_range_end("plane", range.base_plane, range.planes, self.planes())?;
        Ok(())
    }

    /// Tracked layout of a subresource.
    pub fn layout(&self, level: u32, layer: u32, plane: u32) -> GpuResult<ImageLayout> {
        let id = self.subresource_id(level, layer, plane)?;
        Ok(self.layouts.read()[id as usize])
    }

    /// Returns the tracked layout if every subresource in `range` agrees.
    ///
    /// Returns `None` as well if `range` does not lie inside the image.
    pub fn uniform_layout(&self, range: &SubresourceRange) -> Option<ImageLayout> {
        self.validate_range(range).ok()?;
        let layouts = self.layouts.read();
        let mut ids = range.iter().map(|(level, layer, plane)| {
            (level + layer * self.levels() + plane * self.levels() * self.layers()) as usize
        });

        let first = layouts[ids.next()?];
        ids.all(|id| layouts[id] == first).then_some(first)
    }

    pub(crate) fn track_layout(&self, range: &SubresourceRange, layout: ImageLayout) {
        let mut layouts = self.layouts.write();
        for (level, layer, plane) in range.iter() {
            let id = level + layer * self.levels() + plane * self.levels() * self.layers();
            layouts[id as usize] = layout;
        }
    }

    /// Native handle.
    pub fn native(&self) -> &NativeImage {
        &self.native
    }
}

fn check_range_end(name: &'static str, base: u32, count: u32, limit: u32) -> GpuResult<()> {
    match base.checked_add(count) {
        Some(end) if end <= limit => Ok(()),
        Some(end) => Err(GpuError::out_of_range(
            name,
            format!("{name} {base}..{end} exceed the {limit} {name} of the image"),
        )),
        None => Err(GpuError::out_of_range(
            name,
            format!("{name} range starting at {base} with {count} entries overflows"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(levels: u32, layers: u32, aspect: ImageAspect) -> Image {
        let descriptor = ImageDescriptor::new_2d(64, 64)
            .with_mip_levels(levels)
            .with_array_layers(layers)
            .with_aspect(aspect);
        Image::new(descriptor, NativeImage::Dummy(7)).unwrap()
    }

    #[test]
    fn test_subresource_ids() {
        let img = image(4, 3, ImageAspect::DepthStencil);
        assert_eq!(img.subresources(), 24);
        assert_eq!(img.subresource_id(0, 0, 0).unwrap(), 0);
        assert_eq!(img.subresource_id(3, 0, 0).unwrap(), 3);
        assert_eq!(img.subresource_id(1, 2, 0).unwrap(), 9);
        assert_eq!(img.subresource_id(1, 2, 1).unwrap(), 21);
        assert!(img.subresource_id(4, 0, 0).is_err());
        assert!(img.subresource_id(0, 0, 2).is_err());
    }

    #[test]
    fn test_initial_layout_is_undefined() {
        let img = image(2, 2, ImageAspect::Color);
        assert_eq!(img.layout(1, 1, 0).unwrap(), ImageLayout::Undefined);
        assert_eq!(img.uniform_layout(&img.full_range()), Some(ImageLayout::Undefined));
    }

    #[test]
    fn test_track_partial_range() {
        let img = image(3, 1, ImageAspect::Color);
        let range = SubresourceRange {
            base_level: 1,
            levels: 2,
            base_layer: 0,
            layers: 1,
            base_plane: 0,
            planes: 1,
        };
        img.track_layout(&range, ImageLayout::ShaderResource);

        assert_eq!(img.layout(0, 0, 0).unwrap(), ImageLayout::Undefined);
        assert_eq!(img.layout(1, 0, 0).unwrap(), ImageLayout::ShaderResource);
        assert_eq!(img.layout(2, 0, 0).unwrap(), ImageLayout::ShaderResource);
        assert_eq!(img.uniform_layout(&img.full_range()), None);
        assert_eq!(img.uniform_layout(&range), Some(ImageLayout::ShaderResource));
    }

    #[test]
    fn test_validate_range() {
        let img = image(2, 4, ImageAspect::Color);
        let mut range = img.full_range();
        assert!(img.validate_range(&range).is_ok());

        range.base_layer = 2;
        assert!(matches!(
            img.validate_range(&range),
            Err(GpuError::ArgumentOutOfRange { name: "layers", .. })
        ));

        range.base_layer = 0;
        range.levels = 0;
        assert!(matches!(
            img.validate_range(&range),
            Err(GpuError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_range_overflow() {
        let img = image(2, 1, ImageAspect::Color);
        let mut range = img.full_range();
        range.base_level = u32::MAX;
        assert!(matches!(
            img.validate_range(&range),
            Err(GpuError::ArgumentOutOfRange { name: "levels", .. })
        ));
        assert_eq!(img.uniform_layout(&range), None);

        let mut range = img.full_range();
        range.base_layer = 1;
        range.layers = u32::MAX;
        assert!(matches!(
            img.validate_range(&range),
            Err(GpuError::ArgumentOutOfRange { name: "layers", .. })
        ));
    }

    #[test]
    fn test_range_iteration_order() {
        let range = SubresourceRange {
            base_level: 0,
            levels: 2,
            base_layer: 1,
            layers: 2,
            base_plane: 0,
            planes: 1,
        };
        let triples: Vec<_> = range.iter().collect();
        assert_eq!(triples, vec![(0, 1, 0), (1, 1, 0), (0, 2, 0), (1, 2, 0)]);
    }
}
