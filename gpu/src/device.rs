//! Devices.
//!
//! A [`Device`] fixes the backend for every object created from it. Vulkan and
//! D3D12 devices wrap native objects created by the application; the dummy
//! device needs nothing and is used for tests.

use std::sync::Arc;

use crate::backend::{BackendType, DummyDevice, DummyJournal, NativeDevice};
use crate::error::{GpuError, GpuResult};
use crate::queue::Queue;
use crate::types::{QueuePriority, QueueType};

/// Configuration for [`Device::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Backend to use.
    pub backend: BackendType,
    /// Whether dummy fences complete immediately when signaled.
    pub dummy_auto_complete: bool,
    /// Debug label.
    pub label: Option<String>,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Dummy,
            dummy_auto_complete: true,
            label: None,
        }
    }
}

impl DeviceParameters {
    /// Create parameters with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Set whether dummy fences complete immediately.
    pub fn with_dummy_auto_complete(mut self, auto_complete: bool) -> Self {
        self.dummy_auto_complete = auto_complete;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A device of one backend.
#[derive(Debug)]
pub struct Device {
    label: Option<String>,
    native: NativeDevice,
}

impl Device {
    /// Create a device from parameters.
    ///
    /// Only the dummy backend can be created from parameters alone. Native
    /// backends wrap an existing native device, see [`Device::vulkan`] and
    /// [`Device::d3d12`].
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::NotInitialized`] for native backends.
    pub fn new(params: DeviceParameters) -> GpuResult<Self> {
        match params.backend {
            BackendType::Dummy => Ok(Self::with_native(
                params.label,
                NativeDevice::Dummy(DummyDevice::new(params.dummy_auto_complete)),
            )),
            backend => Err(GpuError::NotInitialized(format!(
                "the {} backend needs a native device created by the application",
                backend.name()
            ))),
        }
    }

    /// Create a dummy device whose fences complete immediately.
    pub fn dummy() -> Self {
        Self::with_native(None, NativeDevice::Dummy(DummyDevice::new(true)))
    }

    /// Wrap a Vulkan device.
    #[cfg(feature = "vulkan-backend")]
    pub fn vulkan(device: crate::backend::vulkan::VulkanDevice) -> Self {
        Self::with_native(None, NativeDevice::Vulkan(device))
    }

    /// Wrap a D3D12 device.
    #[cfg(feature = "d3d12-backend")]
    pub fn d3d12(device: crate::backend::d3d12::D3d12Device) -> Self {
        Self::with_native(None, NativeDevice::D3D12(device))
    }

    fn with_native(label: Option<String>, native: NativeDevice) -> Self {
        log::info!(
            "Creating Device {:?} (backend: {})",
            label,
            native.backend_type().name()
        );
        Self { label, native }
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Backend of this device.
    pub fn backend_type(&self) -> BackendType {
        self.native.backend_type()
    }

    /// Native device.
    pub fn native(&self) -> &NativeDevice {
        &self.native
    }

    /// Journal of native calls, for dummy devices.
    pub fn dummy_journal(&self) -> Option<&Arc<DummyJournal>> {
        match &self.native {
            NativeDevice::Dummy(device) => Some(device.journal()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Create a queue.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if the device cannot provide a
    /// queue of `queue_type`, and [`GpuError::Runtime`] if native creation fails.
    pub fn create_queue(
        &self,
        queue_type: QueueType,
        priority: QueuePriority,
    ) -> GpuResult<Arc<Queue>> {
        let native = self.native.create_queue(queue_type, priority)?;
        Ok(Arc::new(Queue::new(queue_type, priority, native)))
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);
