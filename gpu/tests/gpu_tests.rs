//! Integration tests for the GPU core.
//!
//! Tests are parameterized using `rstest` to run against the dummy backend and
//! the D3D12 backend driven by a mock native device.
//!
//! # Test Categories
//!
//! - **Barrier Tests**: Native call counts and image layout tracking
//! - **Submission Tests**: Fence values and release of finished command buffers
//! - **Layout Tests**: Space reconciliation, validation and binding lookup
//!
//! ```bash
//! cargo test --test gpu_tests
//! ```

mod common;

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rstest::rstest;

use common::{Backend, TestContext};
use redlilium_gpu::backend::NativeQueue;
use redlilium_gpu::{
    Barrier, BufferUsage, CommandBuffer, DescriptorType, DummyCall, GpuError, ImageDescriptor,
    ImageLayout, PipelineLayout, PipelineStage, QueuePriority, QueueType, ResourceAccess,
    ShaderStage, SubmitObserver,
};

// ============================================================================
// Barrier Tests
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_empty_barrier_issues_no_native_call(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let cmd = queue.create_command_buffer(true, true).unwrap();

    let barrier = Barrier::new(PipelineStage::ALL, PipelineStage::ALL);
    barrier.execute(&cmd).unwrap();
    assert_eq!(ctx.barrier_calls(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_barrier_is_one_native_call(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let queue = ctx
        .device
        .create_queue(QueueType::Compute, QueuePriority::Normal)
        .unwrap();
    let cmd = queue.create_command_buffer(true, true).unwrap();
    let first = ctx.buffer(16, 64, BufferUsage::STORAGE);
    let second = ctx.buffer(16, 64, BufferUsage::STORAGE);
    let image = ctx.image(ImageDescriptor::new_2d(64, 64));

    let mut barrier = Barrier::new(PipelineStage::COMPUTE, PipelineStage::COMPUTE);
    barrier
        .wait(ResourceAccess::SHADER_READ_WRITE, ResourceAccess::SHADER_READ)
        .transition_buffer(&first, ResourceAccess::SHADER_READ_WRITE, ResourceAccess::SHADER_READ)
        .transition_image(
            &image,
            ResourceAccess::empty(),
            ResourceAccess::SHADER_READ_WRITE,
            ImageLayout::ReadWrite,
        );
    barrier
        .transition_buffer_element(
            &second,
            3,
            ResourceAccess::SHADER_READ_WRITE,
            ResourceAccess::SHADER_READ_WRITE,
        )
        .unwrap();

    cmd.barrier(&barrier).unwrap();
    assert_eq!(ctx.barrier_calls(), 1);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_image_transition_updates_tracked_layout(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let cmd = queue.create_command_buffer(true, true).unwrap();
    let image = ctx.image(ImageDescriptor::new_2d(32, 32).with_mip_levels(3));
    assert_eq!(image.layout(0, 0, 0).unwrap(), ImageLayout::Undefined);

    let mut barrier = Barrier::new(PipelineStage::empty(), PipelineStage::COMPUTE);
    barrier.transition_image(
        &image,
        ResourceAccess::empty(),
        ResourceAccess::SHADER_READ_WRITE,
        ImageLayout::ReadWrite,
    );
    barrier.execute(&cmd).unwrap();

    for level in 0..3 {
        assert_eq!(image.layout(level, 0, 0).unwrap(), ImageLayout::ReadWrite);
    }
    assert!(matches!(
        image.layout(3, 0, 0),
        Err(GpuError::ArgumentOutOfRange { .. })
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_barrier_requires_recording(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let cmd = queue.create_command_buffer(false, true).unwrap();
    let buffer = ctx.buffer(4, 4, BufferUsage::UNIFORM);

    let mut barrier = Barrier::new(PipelineStage::TRANSFER, PipelineStage::VERTEX);
    barrier.transition_buffer(
        &buffer,
        ResourceAccess::TRANSFER_WRITE,
        ResourceAccess::CONSTANT_BUFFER,
    );
    assert!(matches!(
        barrier.execute(&cmd),
        Err(GpuError::InvalidArgument(_))
    ));
    assert_eq!(ctx.barrier_calls(), 0);
}

// ============================================================================
// Submission Tests
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_fence_values_increase_by_one(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::High)
        .unwrap();
    assert_eq!(queue.current_fence(), 0);

    let fences: Vec<u64> = (0..5)
        .map(|_| {
            let cmd = queue.create_command_buffer(true, true).unwrap();
            queue.submit(&cmd).unwrap()
        })
        .collect();

    assert_eq!(fences, vec![1, 2, 3, 4, 5]);
    assert_eq!(queue.current_fence(), 5);

    queue.wait_for(5).unwrap();
    assert_eq!(queue.tracked_command_buffers(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_submit_validation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let graphics = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let compute = ctx
        .device
        .create_queue(QueueType::Compute, QueuePriority::Normal)
        .unwrap();

    assert!(matches!(
        graphics.submit_all(&[]),
        Err(GpuError::InvalidArgument(_))
    ));

    let foreign = compute.create_command_buffer(true, true).unwrap();
    assert!(matches!(
        graphics.submit(&foreign),
        Err(GpuError::InvalidArgument(_))
    ));

    let bundle = graphics.create_command_buffer(true, false).unwrap();
    assert!(matches!(
        graphics.submit(&bundle),
        Err(GpuError::InvalidArgument(_))
    ));

    let not_recording = graphics.create_command_buffer(false, true).unwrap();
    assert!(matches!(
        graphics.submit(&not_recording),
        Err(GpuError::InvalidArgument(_))
    ));

    assert_eq!(graphics.current_fence(), 0);
    assert!(matches!(
        graphics.wait_for(1),
        Err(GpuError::ArgumentOutOfRange { name: "fence", .. })
    ));
}

#[test]
fn test_wait_for_releases_up_to_fence() {
    let ctx = TestContext::manual(Backend::Dummy).unwrap();
    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let NativeQueue::Dummy(native) = queue.native() else {
        panic!("dummy device created a non-dummy queue");
    };

    let resource_a: Arc<dyn Any + Send + Sync> = Arc::new("a");
    let resource_b: Arc<dyn Any + Send + Sync> = Arc::new("b");

    let a = queue.create_command_buffer(true, true).unwrap();
    a.retain(Arc::clone(&resource_a));
    let b = queue.create_command_buffer(true, true).unwrap();
    b.retain(Arc::clone(&resource_b));

    assert_eq!(queue.submit(&a).unwrap(), 1);
    assert_eq!(queue.submit(&b).unwrap(), 2);
    assert_eq!(queue.tracked_command_buffers(), 2);

    native.complete(1);
    queue.wait_for(1).unwrap();
    assert_eq!(queue.tracked_command_buffers(), 1);
    assert_eq!(a.retained(), 0);
    assert_eq!(b.retained(), 1);
    assert_eq!(Arc::strong_count(&resource_a), 1);

    // Waiting for an older fence again releases nothing.
    queue.wait_for(1).unwrap();
    assert_eq!(queue.tracked_command_buffers(), 1);

    native.complete(2);
    queue.wait_for(2).unwrap();
    assert_eq!(queue.tracked_command_buffers(), 0);
    assert_eq!(Arc::strong_count(&resource_b), 1);
}

#[test]
fn test_submit_sweeps_completed_buffers() {
    let ctx = TestContext::manual(Backend::Dummy).unwrap();
    let queue = ctx
        .device
        .create_queue(QueueType::Compute, QueuePriority::Normal)
        .unwrap();
    let NativeQueue::Dummy(native) = queue.native() else {
        panic!("dummy device created a non-dummy queue");
    };

    let first = queue.create_command_buffer(true, true).unwrap();
    queue.submit(&first).unwrap();
    native.complete(1);

    let second = queue.create_command_buffer(true, true).unwrap();
    queue.submit(&second).unwrap();
    assert_eq!(queue.tracked_command_buffers(), 1);
}

#[test]
fn test_wait_for_blocks_until_fence_completes() {
    let ctx = TestContext::manual(Backend::Dummy).unwrap();
    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let NativeQueue::Dummy(native) = queue.native() else {
        panic!("dummy device created a non-dummy queue");
    };
    let journal = ctx.device.dummy_journal().unwrap();

    let cmd = queue.create_command_buffer(true, true).unwrap();
    let fence = queue.submit(&cmd).unwrap();

    std::thread::scope(|scope| {
        let waiter = scope.spawn(|| queue.wait_for(fence));

        // The native wait is journaled right before it blocks.
        while journal.count(|call| matches!(call, DummyCall::Wait { value: 1, .. })) == 0 {
            std::thread::yield_now();
        }
        assert!(!waiter.is_finished());
        assert_eq!(queue.tracked_command_buffers(), 1);

        native.complete(fence);
        waiter.join().unwrap().unwrap();
    });

    assert_eq!(queue.tracked_command_buffers(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_concurrent_submits_get_unique_fences(#[case] backend: Backend) {
    const THREADS: u64 = 8;
    const SUBMITS: u64 = 16;

    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let queue = ctx
        .device
        .create_queue(QueueType::Compute, QueuePriority::Normal)
        .unwrap();

    let mut fences: Vec<u64> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    (0..SUBMITS)
                        .map(|_| {
                            let cmd = queue.create_command_buffer(true, true).unwrap();
                            queue.submit(&cmd).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect()
    });

    fences.sort_unstable();
    assert_eq!(fences, (1..=THREADS * SUBMITS).collect::<Vec<_>>());
    assert_eq!(queue.current_fence(), THREADS * SUBMITS);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_wait_for_queue(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let graphics = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let transfer = ctx
        .device
        .create_queue(QueueType::Transfer, QueuePriority::Normal)
        .unwrap();

    let upload = transfer.create_command_buffer(true, true).unwrap();
    let fence = transfer.submit(&upload).unwrap();
    graphics.wait_for_queue(&transfer, fence).unwrap();

    if let Some(journal) = ctx.device.dummy_journal() {
        assert_eq!(
            journal.count(|call| matches!(call, DummyCall::WaitForQueue { value: 1, .. })),
            1
        );
    }

    #[cfg(feature = "d3d12-backend")]
    {
        if let Some(log) = &ctx.mock {
            assert_eq!(
                log.count(|event| matches!(event, common::d3d12_mock::MockEvent::GpuWait(1))),
                1
            );
        }
    }
}

#[derive(Default)]
struct CountingObserver {
    submitting: AtomicU64,
    last_fence: AtomicU64,
}

impl SubmitObserver for CountingObserver {
    fn submitting(&self, _queue_type: QueueType, command_buffers: &[Arc<CommandBuffer>]) {
        self.submitting
            .fetch_add(command_buffers.len() as u64, Ordering::Relaxed);
    }

    fn submitted(&self, _queue_type: QueueType, fence: u64) {
        self.last_fence.store(fence, Ordering::Relaxed);
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_submit_observers(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let queue = ctx
        .device
        .create_queue(QueueType::Graphics, QueuePriority::Normal)
        .unwrap();
    let observer = Arc::new(CountingObserver::default());
    queue.add_observer(observer.clone());

    let buffers = vec![
        queue.create_command_buffer(true, true).unwrap(),
        queue.create_command_buffer(true, true).unwrap(),
    ];
    let fence = queue.submit_all(&buffers).unwrap();

    assert_eq!(observer.submitting.load(Ordering::Relaxed), 2);
    assert_eq!(observer.last_fence.load(Ordering::Relaxed), fence);
}

// ============================================================================
// Layout Tests
// ============================================================================

fn sparse_layout(ctx: &TestContext) -> PipelineLayout {
    let mut builder = PipelineLayout::builder();
    builder
        .descriptor_set(5, ShaderStage::FRAGMENT)
        .with_texture(0, 4)
        .add();
    builder
        .descriptor_set(0, ShaderStage::VERTEX | ShaderStage::FRAGMENT)
        .with_constant_buffer(0, 64)
        .add();
    builder
        .descriptor_set(2, ShaderStage::COMPUTE)
        .with_structured_buffer(0, 16, false)
        .with_structured_buffer(1, 16, true)
        .add();
    builder.build(&ctx.device).unwrap()
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_sparse_spaces(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let layout = sparse_layout(&ctx);
    let spaces: Vec<u32> = layout.descriptor_sets().iter().map(|set| set.space()).collect();
    assert_eq!(spaces, vec![0, 2, 5]);

    if let Some(journal) = ctx.device.dummy_journal() {
        assert_eq!(
            journal.count(|call| matches!(call, DummyCall::CreateDescriptorSetLayout { .. })),
            3
        );
    }

    #[cfg(feature = "d3d12-backend")]
    {
        if let Some(log) = &ctx.mock {
            let signatures = log.root_signatures();
            assert_eq!(signatures.len(), 1);
            assert_eq!(signatures[0].parameters.len(), 3);

            let indices: Vec<u32> = layout
                .descriptor_sets()
                .iter()
                .map(|set| set.root_parameter_index())
                .collect();
            assert_eq!(indices, vec![0, 1, 2]);
        }
    }
}

#[cfg(feature = "vulkan-backend")]
#[test]
fn test_vulkan_sets_are_dense() {
    use redlilium_gpu::backend::vulkan::layout::dense_set_plan;

    let plan = dense_set_plan(&[0, 2, 5]).unwrap();
    assert_eq!(plan.len(), 6);
    assert_eq!(plan.iter().filter(|slot| slot.is_none()).count(), 3);
    assert_eq!(plan[5], Some(2));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_duplicate_space_creates_nothing(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let mut builder = PipelineLayout::builder();
    builder
        .descriptor_set(1, ShaderStage::FRAGMENT)
        .with_texture(0, 1)
        .add();
    builder
        .descriptor_set(1, ShaderStage::FRAGMENT)
        .with_sampler(0)
        .add();

    assert!(matches!(
        builder.build(&ctx.device),
        Err(GpuError::InvalidArgument(_))
    ));
    assert_eq!(ctx.layout_creations(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_binding_lookup(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let layout = sparse_layout(&ctx);

    let set = layout.descriptor_set(2).unwrap();
    assert_eq!(set.stages(), ShaderStage::COMPUTE);
    let binding = set.descriptor(1).unwrap();
    assert_eq!(binding.descriptor_type(), DescriptorType::RWStructuredBuffer);
    assert_eq!(binding.element_size(), 16);
    assert_eq!(layout.descriptor_set(5).unwrap().descriptor(0).unwrap().descriptors(), 4);

    assert!(matches!(
        set.descriptor(7),
        Err(GpuError::ArgumentOutOfRange { .. })
    ));
    assert!(matches!(
        layout.descriptor_set(1),
        Err(GpuError::ArgumentOutOfRange { .. })
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::d3d12(Backend::D3D12)]
fn test_push_constant_root_parameters(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };

    let mut builder = PipelineLayout::builder();
    builder
        .descriptor_set(0, ShaderStage::FRAGMENT)
        .with_texture(0, 1)
        .add();
    builder
        .push_constants(32)
        .with_range(ShaderStage::VERTEX, 0, 16, 0, 0)
        .with_range(ShaderStage::FRAGMENT, 16, 16, 0, 1)
        .add();
    let layout = builder.build(&ctx.device).unwrap();

    let push = layout.push_constants().unwrap();
    assert_eq!(push.size(), 32);
    assert_eq!(push.range(ShaderStage::VERTEX).unwrap().root_parameter_index(), 0);
    assert_eq!(push.range(ShaderStage::FRAGMENT).unwrap().root_parameter_index(), 1);
    assert_eq!(layout.descriptor_set(0).unwrap().root_parameter_index(), 2);
}

#[cfg(feature = "d3d12-backend")]
#[test]
fn test_d3d12_root_signature_failure_is_runtime_error() {
    let ctx = TestContext::new(Backend::D3D12).unwrap();
    let log = ctx.mock.as_ref().unwrap();
    log.fail_next_root_signature("root parameter count exceeds limit");

    let mut builder = PipelineLayout::builder();
    builder
        .descriptor_set(0, ShaderStage::COMPUTE)
        .with_constant_buffer(0, 16)
        .add();

    match builder.build(&ctx.device) {
        Err(GpuError::Runtime(message)) => {
            assert!(message.contains("root parameter count exceeds limit"));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[cfg(feature = "d3d12-backend")]
#[test]
fn test_d3d12_command_list_lifecycle() {
    use common::d3d12_mock::MockEvent;
    use redlilium_gpu::backend::d3d12::native::CommandListType;

    let ctx = TestContext::new(Backend::D3D12).unwrap();
    let log = ctx.mock.as_ref().unwrap();
    let queue = ctx
        .device
        .create_queue(QueueType::Compute, QueuePriority::Realtime)
        .unwrap();
    let cmd = queue.create_command_buffer(true, true).unwrap();
    let fence = queue.submit(&cmd).unwrap();
    queue.wait_for(fence).unwrap();

    let events = log.events();
    assert!(matches!(events[0], MockEvent::CreateQueue(CommandListType::Compute, _)));
    assert_eq!(
        &events[1..],
        &[
            MockEvent::CreateList(CommandListType::Compute),
            MockEvent::Close(1),
            MockEvent::Reset(1),
            MockEvent::Close(1),
            MockEvent::Execute(vec![1]),
            MockEvent::Signal(1),
        ]
    );
}
