//! Common utilities for GPU integration tests.
//!
//! This module provides dummy devices and a mock D3D12 native device that
//! records every call, so barrier lowering, submission and layout assembly
//! can be checked on each backend without a GPU.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use redlilium_gpu::backend::{NativeBuffer, NativeImage};
use redlilium_gpu::{
    BackendType, Buffer, BufferDescriptor, BufferUsage, Device, DeviceParameters, DummyCall, Image,
    ImageDescriptor,
};

/// Initialize logging for a test binary. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    redlilium_gpu::init();
}

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backends that can be tested without a GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (journal only).
    Dummy,
    /// D3D12 backend driven by [`d3d12_mock::MockDevice`].
    D3D12,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            #[cfg(feature = "d3d12-backend")]
            Backend::D3D12 => true,
            #[cfg(not(feature = "d3d12-backend"))]
            Backend::D3D12 => false,
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A device plus a way to count the native calls it issued.
pub struct TestContext {
    pub device: Device,
    #[cfg(feature = "d3d12-backend")]
    pub mock: Option<Arc<d3d12_mock::MockLog>>,
    next_resource: AtomicU64,
}

impl TestContext {
    /// Create a context, or `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_auto_complete(backend, true)
    }

    /// Create a context whose fences only complete when the test says so.
    ///
    /// Only the dummy backend supports manual completion.
    pub fn manual(backend: Backend) -> Option<Self> {
        Self::with_auto_complete(backend, false)
    }

    fn with_auto_complete(backend: Backend, auto_complete: bool) -> Option<Self> {
        init_logging();
        if !backend.is_available() {
            return None;
        }

        match backend {
            Backend::Dummy => {
                let device = Device::new(
                    DeviceParameters::new()
                        .with_backend(BackendType::Dummy)
                        .with_dummy_auto_complete(auto_complete),
                )
                .ok()?;
                Some(Self {
                    device,
                    #[cfg(feature = "d3d12-backend")]
                    mock: None,
                    next_resource: AtomicU64::new(0x1000),
                })
            }
            #[cfg(feature = "d3d12-backend")]
            Backend::D3D12 => {
                if !auto_complete {
                    return None;
                }
                let (device, log) = d3d12_mock::MockDevice::create();
                Some(Self {
                    device,
                    mock: Some(log),
                    next_resource: AtomicU64::new(0x1000),
                })
            }
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    fn next_handle(&self) -> u64 {
        self.next_resource.fetch_add(1, Ordering::Relaxed)
    }

    /// Wrap a fake buffer for the context's backend.
    pub fn buffer(&self, element_size: u64, elements: u32, usage: BufferUsage) -> Buffer {
        let handle = self.next_handle();
        let native = match self.device.backend_type() {
            #[cfg(feature = "d3d12-backend")]
            BackendType::D3D12 => {
                NativeBuffer::D3D12(redlilium_gpu::backend::d3d12::ResourceHandle(handle))
            }
            _ => NativeBuffer::Dummy(handle),
        };
        Buffer::new(BufferDescriptor::new(element_size, elements, usage), native)
            .expect("valid buffer descriptor")
    }

    /// Wrap a fake image for the context's backend.
    pub fn image(&self, descriptor: ImageDescriptor) -> Image {
        let handle = self.next_handle();
        let native = match self.device.backend_type() {
            #[cfg(feature = "d3d12-backend")]
            BackendType::D3D12 => {
                NativeImage::D3D12(redlilium_gpu::backend::d3d12::ResourceHandle(handle))
            }
            _ => NativeImage::Dummy(handle),
        };
        Image::new(descriptor, native).expect("valid image descriptor")
    }

    /// Number of native barrier calls issued so far.
    pub fn barrier_calls(&self) -> usize {
        #[cfg(feature = "d3d12-backend")]
        {
            if let Some(log) = &self.mock {
                return log.count(|event| matches!(event, d3d12_mock::MockEvent::Barrier { .. }));
            }
        }
        self.device
            .dummy_journal()
            .map_or(0, |journal| journal.barrier_calls())
    }

    /// Number of native pipeline layout objects created so far.
    pub fn layout_creations(&self) -> usize {
        #[cfg(feature = "d3d12-backend")]
        {
            if let Some(log) = &self.mock {
                return log
                    .count(|event| matches!(event, d3d12_mock::MockEvent::CreateRootSignature(_)));
            }
        }
        self.device.dummy_journal().map_or(0, |journal| {
            journal.count(|call| {
                matches!(
                    call,
                    DummyCall::CreatePipelineLayout { .. }
                        | DummyCall::CreateDescriptorSetLayout { .. }
                )
            })
        })
    }
}

// ============================================================================
// D3D12 Mock
// ============================================================================

#[cfg(feature = "d3d12-backend")]
pub mod d3d12_mock {
    use std::any::Any;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::Mutex;
    use redlilium_gpu::Device;
    use redlilium_gpu::backend::d3d12::native::{
        BarrierGroup, CommandListType, CommandQueuePriority, RootSignatureDesc,
    };
    use redlilium_gpu::backend::d3d12::{
        CommandListApi, CommandQueueApi, D3d12Device, DeviceApi, FenceApi, NativeError,
        NativeResult, RootSignatureApi,
    };

    /// A call made on a mock native object.
    #[derive(Debug, Clone, PartialEq)]
    pub enum MockEvent {
        CreateQueue(CommandListType, CommandQueuePriority),
        CreateList(CommandListType),
        Reset(u64),
        Close(u64),
        Barrier {
            list: u64,
            globals: usize,
            buffers: usize,
            textures: usize,
        },
        Execute(Vec<u64>),
        Signal(u64),
        GpuWait(u64),
        CpuWait(u64),
        CreateRootSignature(RootSignatureDesc),
    }

    /// Shared log of every mock call.
    #[derive(Debug, Default)]
    pub struct MockLog {
        events: Mutex<Vec<MockEvent>>,
        fail_root_signature: Mutex<Option<String>>,
    }

    impl MockLog {
        fn push(&self, event: MockEvent) {
            self.events.lock().push(event);
        }

        pub fn events(&self) -> Vec<MockEvent> {
            self.events.lock().clone()
        }

        pub fn count(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
            self.events.lock().iter().filter(|event| predicate(event)).count()
        }

        /// Root signature descriptions passed to the device, in order.
        pub fn root_signatures(&self) -> Vec<RootSignatureDesc> {
            self.events
                .lock()
                .iter()
                .filter_map(|event| match event {
                    MockEvent::CreateRootSignature(desc) => Some(desc.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Make the next root signature creation fail with `message`.
        pub fn fail_next_root_signature(&self, message: &str) {
            *self.fail_root_signature.lock() = Some(message.to_string());
        }
    }

    #[derive(Debug)]
    pub struct MockDevice {
        log: Arc<MockLog>,
        next_list: AtomicU64,
    }

    impl MockDevice {
        /// Create a D3D12 [`Device`] backed by a mock, with its call log.
        pub fn create() -> (Device, Arc<MockLog>) {
            let log = Arc::new(MockLog::default());
            let api = Arc::new(MockDevice {
                log: Arc::clone(&log),
                next_list: AtomicU64::new(1),
            });
            (Device::d3d12(D3d12Device::new(api)), log)
        }
    }

    impl DeviceApi for MockDevice {
        fn create_command_queue(
            &self,
            list_type: CommandListType,
            priority: CommandQueuePriority,
        ) -> NativeResult<Box<dyn CommandQueueApi>> {
            self.log.push(MockEvent::CreateQueue(list_type, priority));
            Ok(Box::new(MockQueue {
                log: Arc::clone(&self.log),
            }))
        }

        fn create_fence(&self, initial_value: u64) -> NativeResult<Arc<dyn FenceApi>> {
            Ok(Arc::new(MockFence {
                value: AtomicU64::new(initial_value),
                log: Arc::clone(&self.log),
            }))
        }

        fn create_command_list(
            &self,
            list_type: CommandListType,
        ) -> NativeResult<Box<dyn CommandListApi>> {
            self.log.push(MockEvent::CreateList(list_type));
            Ok(Box::new(MockList {
                id: self.next_list.fetch_add(1, Ordering::Relaxed),
                log: Arc::clone(&self.log),
            }))
        }

        fn create_root_signature(
            &self,
            desc: &RootSignatureDesc,
        ) -> NativeResult<Box<dyn RootSignatureApi>> {
            if let Some(message) = self.log.fail_root_signature.lock().take() {
                return Err(NativeError::new(0x8007_0057_u32 as i32).with_message(message));
            }
            self.log.push(MockEvent::CreateRootSignature(desc.clone()));
            Ok(Box::new(MockRootSignature))
        }
    }

    /// Fence that completes as soon as it is signaled.
    #[derive(Debug)]
    pub struct MockFence {
        value: AtomicU64,
        log: Arc<MockLog>,
    }

    impl FenceApi for MockFence {
        fn completed_value(&self) -> u64 {
            self.value.load(Ordering::Acquire)
        }

        fn wait_for_value(&self, value: u64) -> NativeResult<()> {
            self.log.push(MockEvent::CpuWait(value));
            if self.completed_value() >= value {
                Ok(())
            } else {
                Err(NativeError::new(0x887A_0005_u32 as i32).with_message("fence never signaled"))
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    pub struct MockQueue {
        log: Arc<MockLog>,
    }

    impl CommandQueueApi for MockQueue {
        fn execute_command_lists(&self, lists: &[&dyn CommandListApi]) -> NativeResult<()> {
            let ids = lists
                .iter()
                .filter_map(|list| list.as_any().downcast_ref::<MockList>())
                .map(|list| list.id)
                .collect();
            self.log.push(MockEvent::Execute(ids));
            Ok(())
        }

        fn signal(&self, fence: &dyn FenceApi, value: u64) -> NativeResult<()> {
            self.log.push(MockEvent::Signal(value));
            let fence = fence
                .as_any()
                .downcast_ref::<MockFence>()
                .ok_or_else(|| NativeError::new(-1).with_message("foreign fence"))?;
            fence.value.fetch_max(value, Ordering::AcqRel);
            Ok(())
        }

        fn wait(&self, _fence: &dyn FenceApi, value: u64) -> NativeResult<()> {
            self.log.push(MockEvent::GpuWait(value));
            Ok(())
        }
    }

    #[derive(Debug)]
    pub struct MockList {
        id: u64,
        log: Arc<MockLog>,
    }

    impl CommandListApi for MockList {
        fn reset(&self) -> NativeResult<()> {
            self.log.push(MockEvent::Reset(self.id));
            Ok(())
        }

        fn close(&self) -> NativeResult<()> {
            self.log.push(MockEvent::Close(self.id));
            Ok(())
        }

        fn barrier(&self, groups: &[BarrierGroup<'_>]) {
            let (mut globals, mut buffers, mut textures) = (0, 0, 0);
            for group in groups {
                match group {
                    BarrierGroup::Global(entries) => globals += entries.len(),
                    BarrierGroup::Buffer(entries) => buffers += entries.len(),
                    BarrierGroup::Texture(entries) => textures += entries.len(),
                }
            }
            self.log.push(MockEvent::Barrier {
                list: self.id,
                globals,
                buffers,
                textures,
            });
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    pub struct MockRootSignature;

    impl RootSignatureApi for MockRootSignature {}
}
