//! Vulkan backend.
//!
//! Wraps an `ash::Device` created by the application. The device must be a
//! Vulkan 1.3 device with `synchronization2` and `timelineSemaphore` enabled.
//!
//! Every [`VulkanQueue`] owns a timeline semaphore, which is the queue fence:
//! submission `n` signals value `n` and CPU waits block on the semaphore
//! counter. Command buffers are allocated from a per-queue command pool.

pub mod barriers;
pub mod conversion;
pub mod layout;

use std::sync::Arc;

use ash::vk;
use parking_lot::{Mutex, MutexGuard};

use crate::command::CommandBuffer;
use crate::error::{GpuError, GpuResult};
use crate::types::{QueuePriority, QueueType};

use super::NativeCommandBuffer;
use conversion::convert_queue_type;

/// A queue family the application enabled on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanQueueFamily {
    /// Family index.
    pub index: u32,
    /// Capabilities of the family.
    pub flags: vk::QueueFlags,
    /// Number of queues created from this family at device creation.
    pub count: u32,
}

/// Pick the family a new queue of `queue_type` is taken from.
///
/// Only families with a free queue are considered. Among those, the family
/// with the fewest capabilities beyond the requested ones wins, so compute and
/// transfer queues land on dedicated families when the device has them.
pub(crate) fn select_queue_family(
    families: &[VulkanQueueFamily],
    used: &[u32],
    queue_type: QueueType,
) -> Option<usize> {
    let required = convert_queue_type(queue_type);
    let unwanted = match queue_type {
        QueueType::Graphics => vk::QueueFlags::empty(),
        QueueType::Compute => vk::QueueFlags::GRAPHICS,
        QueueType::Transfer | QueueType::VideoDecode | QueueType::VideoEncode => {
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE
        }
    };

    families
        .iter()
        .enumerate()
        .filter(|(i, family)| {
            family.flags.contains(required) && used.get(*i).copied().unwrap_or(0) < family.count
        })
        .min_by_key(|(_, family)| (family.flags & unwanted).as_raw().count_ones())
        .map(|(i, _)| i)
}

/// Vulkan device.
pub struct VulkanDevice {
    device: ash::Device,
    families: Vec<VulkanQueueFamily>,
    used_queues: Mutex<Vec<u32>>,
}

impl std::fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("handle", &self.device.handle())
            .field("families", &self.families)
            .finish()
    }
}

impl VulkanDevice {
    /// Wrap an application-created device.
    ///
    /// # Safety
    ///
    /// `device` must stay valid for the lifetime of this object and of every
    /// object created from it, and `families` must describe exactly the queues
    /// requested in its `VkDeviceCreateInfo`.
    pub unsafe fn new(device: ash::Device, families: Vec<VulkanQueueFamily>) -> Self {
        log::info!(
            "Vulkan device with {} queue families: {:?}",
            families.len(),
            families
        );
        let used_queues = Mutex::new(vec![0; families.len()]);
        Self {
            device,
            families,
            used_queues,
        }
    }

    /// Get the ash device.
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Enabled queue families.
    pub fn queue_families(&self) -> &[VulkanQueueFamily] {
        &self.families
    }

    pub(crate) fn create_queue(
        &self,
        queue_type: QueueType,
        priority: QueuePriority,
    ) -> GpuResult<VulkanQueue> {
        let mut used = self.used_queues.lock();
        let family_slot = select_queue_family(&self.families, &used, queue_type).ok_or_else(|| {
            GpuError::invalid_argument(format!(
                "the device has no free queue supporting {queue_type:?}"
            ))
        })?;
        let family = self.families[family_slot];
        let queue_index = used[family_slot];

        // Priorities are fixed by VkDeviceQueueCreateInfo.
        log::debug!(
            "Vulkan {queue_type:?} queue from family {} index {} (requested priority {:.2})",
            family.index,
            queue_index,
            conversion::convert_queue_priority(priority)
        );

        let queue = unsafe { self.device.get_device_queue(family.index, queue_index) };

        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let semaphore_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let timeline = unsafe { self.device.create_semaphore(&semaphore_info, None) }.map_err(|e| {
            GpuError::runtime(format!("Failed to create timeline semaphore: {:?}", e))
        })?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family.index);
        let pool = match unsafe { self.device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { self.device.destroy_semaphore(timeline, None) };
                return Err(GpuError::runtime(format!(
                    "Failed to create command pool: {:?}",
                    e
                )));
            }
        };

        used[family_slot] += 1;

        Ok(VulkanQueue {
            device: self.device.clone(),
            queue,
            family: family.index,
            timeline,
            pool: Arc::new(VulkanCommandPool {
                device: self.device.clone(),
                pool,
                lock: Mutex::new(()),
            }),
            pending_waits: Mutex::new(Vec::new()),
        })
    }
}

/// Command pool shared by a queue and the command buffers it allocated.
///
/// Vulkan requires external synchronization of a pool while any of its
/// command buffers is allocated, freed or recorded. Every such call holds
/// [`lock`](Self::lock).
pub struct VulkanCommandPool {
    device: ash::Device,
    pool: vk::CommandPool,
    lock: Mutex<()>,
}

impl VulkanCommandPool {
    /// Native pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

impl Drop for VulkanCommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}

/// Vulkan queue with its timeline semaphore.
pub struct VulkanQueue {
    device: ash::Device,
    queue: vk::Queue,
    family: u32,
    timeline: vk::Semaphore,
    pool: Arc<VulkanCommandPool>,
    /// Cross-queue waits consumed by the next submission.
    pending_waits: Mutex<Vec<(vk::Semaphore, u64)>>,
}

impl std::fmt::Debug for VulkanQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanQueue")
            .field("queue", &self.queue)
            .field("family", &self.family)
            .field("timeline", &self.timeline)
            .field("pending_waits", &*self.pending_waits.lock())
            .finish()
    }
}

impl VulkanQueue {
    /// Native queue handle.
    pub fn handle(&self) -> vk::Queue {
        self.queue
    }

    /// Queue family index.
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Timeline semaphore signaled by every submission.
    pub fn timeline_semaphore(&self) -> vk::Semaphore {
        self.timeline
    }

    pub(crate) fn create_command_buffer(&self, primary: bool) -> GpuResult<VulkanCommandBuffer> {
        let level = if primary {
            vk::CommandBufferLevel::PRIMARY
        } else {
            vk::CommandBufferLevel::SECONDARY
        };
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool.pool)
            .level(level)
            .command_buffer_count(1);

        let command_buffers = {
            let _guard = self.pool.lock();
            unsafe { self.device.allocate_command_buffers(&alloc_info) }
        }
        .map_err(|e| GpuError::runtime(format!("Failed to allocate command buffer: {:?}", e)))?;

        let handle = command_buffers
            .first()
            .copied()
            .ok_or_else(|| GpuError::runtime("Vulkan returned no command buffer"))?;

        Ok(VulkanCommandBuffer {
            pool: Arc::clone(&self.pool),
            handle,
            primary,
        })
    }

    pub(crate) fn completed_value(&self) -> GpuResult<u64> {
        Ok(unsafe { self.device.get_semaphore_counter_value(self.timeline) }?)
    }

    pub(crate) fn submit(
        &self,
        command_buffers: &[Arc<CommandBuffer>],
        signal_value: u64,
    ) -> GpuResult<()> {
        let mut command_buffer_infos = Vec::with_capacity(command_buffers.len());
        for command_buffer in command_buffers {
            match command_buffer.native() {
                NativeCommandBuffer::Vulkan(cmd) => command_buffer_infos
                    .push(vk::CommandBufferSubmitInfo::default().command_buffer(cmd.handle)),
                #[allow(unreachable_patterns)]
                _ => {
                    return Err(GpuError::invalid_argument(
                        "only Vulkan command buffers can be submitted to a Vulkan queue",
                    ));
                }
            }
        }

        let mut pending = self.pending_waits.lock();
        let wait_infos: Vec<vk::SemaphoreSubmitInfo> = pending
            .iter()
            .map(|&(semaphore, value)| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .value(value)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            })
            .collect();
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.timeline)
            .value(signal_value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe {
            self.device
                .queue_submit2(self.queue, &[submit_info], vk::Fence::null())
        }?;

        pending.clear();
        Ok(())
    }

    pub(crate) fn wait(&self, value: u64) -> GpuResult<()> {
        let semaphores = [self.timeline];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe { self.device.wait_semaphores(&wait_info, u64::MAX) }?;
        Ok(())
    }

    /// Queue a wait on `other`'s timeline for the next submission.
    pub(crate) fn wait_for_queue(&self, other: &VulkanQueue, value: u64) {
        self.pending_waits.lock().push((other.timeline, value));
    }
}

// The owner drains the queue before dropping it.
impl Drop for VulkanQueue {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.timeline, None) };
    }
}

/// Vulkan command buffer.
pub struct VulkanCommandBuffer {
    pool: Arc<VulkanCommandPool>,
    handle: vk::CommandBuffer,
    primary: bool,
}

impl std::fmt::Debug for VulkanCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanCommandBuffer")
            .field("handle", &self.handle)
            .field("primary", &self.primary)
            .finish()
    }
}

impl VulkanCommandBuffer {
    /// Native command buffer handle.
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub(crate) fn device(&self) -> &ash::Device {
        &self.pool.device
    }

    pub(crate) fn pool(&self) -> &VulkanCommandPool {
        &self.pool
    }

    pub(crate) fn begin(&self) -> GpuResult<()> {
        // Secondary buffers must always provide inheritance info.
        let inheritance = vk::CommandBufferInheritanceInfo::default();
        let mut begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if !self.primary {
            begin_info = begin_info.inheritance_info(&inheritance);
        }

        let _guard = self.pool.lock();
        unsafe { self.device().begin_command_buffer(self.handle, &begin_info) }?;
        Ok(())
    }

    pub(crate) fn end(&self) -> GpuResult<()> {
        let _guard = self.pool.lock();
        unsafe { self.device().end_command_buffer(self.handle) }?;
        Ok(())
    }
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        let _guard = self.pool.lock();
        unsafe {
            self.pool
                .device
                .free_command_buffers(self.pool.pool, &[self.handle])
        };
    }
}

/// Vulkan descriptor set layout and the immutable samplers it embeds.
pub struct VulkanDescriptorSetLayout {
    device: ash::Device,
    handle: vk::DescriptorSetLayout,
    immutable_samplers: Vec<vk::Sampler>,
}

impl std::fmt::Debug for VulkanDescriptorSetLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDescriptorSetLayout")
            .field("handle", &self.handle)
            .field("immutable_samplers", &self.immutable_samplers)
            .finish()
    }
}

impl VulkanDescriptorSetLayout {
    /// Native layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    /// Immutable samplers referenced by the layout.
    pub fn immutable_samplers(&self) -> &[vk::Sampler] {
        &self.immutable_samplers
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            if self.handle != vk::DescriptorSetLayout::null() {
                self.device.destroy_descriptor_set_layout(self.handle, None);
            }
            for sampler in self.immutable_samplers.drain(..) {
                self.device.destroy_sampler(sampler, None);
            }
        }
    }
}

/// Vulkan pipeline layout.
///
/// Owns the empty set layouts created for spaces the declaration skipped.
pub struct VulkanPipelineLayout {
    device: ash::Device,
    handle: vk::PipelineLayout,
    placeholders: Vec<VulkanDescriptorSetLayout>,
}

impl std::fmt::Debug for VulkanPipelineLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanPipelineLayout")
            .field("handle", &self.handle)
            .field("placeholders", &self.placeholders)
            .finish()
    }
}

impl VulkanPipelineLayout {
    /// Native layout handle.
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Set layouts created for unused spaces.
    pub fn placeholders(&self) -> &[VulkanDescriptorSetLayout] {
        &self.placeholders
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline_layout(self.handle, None) };
    }
}
