//! Command submission unit.
//!
//! One command pool (allocator) per frame slot plus one reusable primary
//! command buffer each. A pool is only ever reset through an acquired
//! [`FrameSlot`], which proves the fence wait for that slot's previous
//! submission already happened.

use crate::error::{GpuError, Result};
use crate::sync::FrameSlot;
use ash::vk;

/// Per-frame command pools, buffers, and the queue they submit to.
pub struct SubmitContext {
    queue: vk::Queue,
    pools: Vec<vk::CommandPool>,
    buffers: Vec<vk::CommandBuffer>,
}

impl SubmitContext {
    /// Create pools and primary command buffers for each frame slot.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(
        device: &ash::Device,
        queue: vk::Queue,
        queue_family: u32,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let mut pools = Vec::with_capacity(frames_in_flight);
        let mut buffers = Vec::with_capacity(frames_in_flight);

        for _ in 0..frames_in_flight {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| GpuError::ResourceCreation(format!("command pool: {e}")))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let buffer = device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| GpuError::ResourceCreation(format!("command buffer: {e}")))?[0];

            pools.push(pool);
            buffers.push(buffer);
        }

        Ok(Self {
            queue,
            pools,
            buffers,
        })
    }

    /// The queue this context submits to.
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.pools.len()
    }

    /// Reset the slot's allocator and begin recording its command buffer.
    ///
    /// # Safety
    /// The device must be valid. The slot token guarantees the GPU has
    /// finished the work last recorded from this allocator.
    pub unsafe fn begin(&self, device: &ash::Device, slot: &FrameSlot) -> Result<vk::CommandBuffer> {
        device.reset_command_pool(
            self.pools[slot.index()],
            vk::CommandPoolResetFlags::empty(),
        )?;

        let buffer = self.buffers[slot.index()];
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(buffer, &begin_info)?;

        Ok(buffer)
    }

    /// End recording and submit the slot's command buffer.
    ///
    /// `wait` is waited before execution (e.g. image acquisition), `signal`
    /// is signaled on completion (e.g. for presentation). The caller follows
    /// up with a fence signal and records the returned value in the ring.
    ///
    /// # Safety
    /// The device must be valid and the buffer must be in the recording
    /// state (from [`Self::begin`]).
    pub unsafe fn submit(
        &self,
        device: &ash::Device,
        slot: &FrameSlot,
        wait: Option<vk::Semaphore>,
        signal: Option<vk::Semaphore>,
    ) -> Result<()> {
        let buffer = self.buffers[slot.index()];
        device.end_command_buffer(buffer)?;

        let buffer_info = vk::CommandBufferSubmitInfo::default().command_buffer(buffer);

        let wait_infos: Vec<vk::SemaphoreSubmitInfo> = wait
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            })
            .into_iter()
            .collect();
        let signal_infos: Vec<vk::SemaphoreSubmitInfo> = signal
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            })
            .into_iter()
            .collect();

        let submit_info = vk::SubmitInfo2::default()
            .command_buffer_infos(std::slice::from_ref(&buffer_info))
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos);

        device.queue_submit2(self.queue, &[submit_info], vk::Fence::null())?;

        Ok(())
    }

    /// Destroy all pools (and with them the command buffers).
    ///
    /// # Safety
    /// The device must be valid and no buffer may be executing.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for &pool in &self.pools {
            device.destroy_command_pool(pool, None);
        }
    }
}

/// Record an image layout transition.
///
/// # Safety
/// The command buffer must be recording and the image valid.
#[allow(clippy::too_many_arguments)]
pub unsafe fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src: (vk::PipelineStageFlags2, vk::AccessFlags2),
    dst: (vk::PipelineStageFlags2, vk::AccessFlags2),
) {
    let barrier = vk::ImageMemoryBarrier2::default()
        .image(image)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_stage_mask(src.0)
        .src_access_mask(src.1)
        .dst_stage_mask(dst.0)
        .dst_access_mask(dst.1)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let dependency = vk::DependencyInfo::default()
        .image_memory_barriers(std::slice::from_ref(&barrier));

    device.cmd_pipeline_barrier2(cmd, &dependency);
}
