//! Error types for the GPU core.

use thiserror::Error;

/// Errors raised by barrier lowering, queue submission and layout assembly.
///
/// Errors are reported synchronously by the call that detects them. Nothing in
/// this crate retries internally.
#[derive(Debug, Error)]
pub enum GpuError {
    /// A parameter has a value that is never valid for the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An index or size exceeds the bounds of the object it refers to.
    #[error("argument `{name}` out of range: {message}")]
    ArgumentOutOfRange {
        /// Name of the offending argument.
        name: &'static str,
        /// Description of the violated bound.
        message: String,
    },

    /// A required sub-object is missing at the point of use.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// A native API call failed.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Shader bytecode or source could not be parsed for reflection.
    #[error("shader reflection failed: {0}")]
    Reflection(String),

    /// A Vulkan call returned an error code.
    #[cfg(feature = "vulkan-backend")]
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),
}

impl GpuError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn out_of_range(name: &'static str, message: impl Into<String>) -> Self {
        Self::ArgumentOutOfRange {
            name,
            message: message.into(),
        }
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// Result alias used throughout the crate.
pub type GpuResult<T> = Result<T, GpuError>;
