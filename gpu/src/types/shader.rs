//! Shader stage flags.

use bitflags::bitflags;

bitflags! {
    /// Shader stages a binding or push constant range is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStage: u32 {
        /// Vertex shader.
        const VERTEX = 1 << 0;
        /// Tessellation control (hull) shader.
        const TESSELLATION_CONTROL = 1 << 1;
        /// Tessellation evaluation (domain) shader.
        const TESSELLATION_EVALUATION = 1 << 2;
        /// Geometry shader.
        const GEOMETRY = 1 << 3;
        /// Fragment (pixel) shader.
        const FRAGMENT = 1 << 4;
        /// Compute shader.
        const COMPUTE = 1 << 5;
        /// Task (amplification) shader.
        const TASK = 1 << 6;
        /// Mesh shader.
        const MESH = 1 << 7;
        /// Ray generation shader.
        const RAY_GENERATION = 1 << 8;
        /// Any-hit shader.
        const ANY_HIT = 1 << 9;
        /// Closest-hit shader.
        const CLOSEST_HIT = 1 << 10;
        /// Miss shader.
        const MISS = 1 << 11;
        /// Intersection shader.
        const INTERSECTION = 1 << 12;
        /// Callable shader.
        const CALLABLE = 1 << 13;

        /// All rasterization stages.
        const GRAPHICS = Self::VERTEX.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits()
            | Self::TASK.bits()
            | Self::MESH.bits();
        /// All ray tracing stages.
        const RAY_TRACING = Self::RAY_GENERATION.bits()
            | Self::ANY_HIT.bits()
            | Self::CLOSEST_HIT.bits()
            | Self::MISS.bits()
            | Self::INTERSECTION.bits()
            | Self::CALLABLE.bits();
    }
}

impl ShaderStage {
    /// Returns `true` if exactly one stage bit is set.
    pub fn is_single_stage(self) -> bool {
        self.bits().count_ones() == 1
    }
}
