//! Application context.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use atelier_core::constants::{
    DEFAULT_FRAMES_IN_FLIGHT, DEFAULT_RESOURCE_HEAP_CAPACITY, DEFAULT_SAMPLER_HEAP_CAPACITY,
};
use atelier_core::types::{Extent2d, FrameNumber};
use atelier_gpu::sync::create_binary_semaphore;
use atelier_gpu::{
    ConstantRing, DescriptorHeap, FrameRing, GpuContext, HeapKind, Presenter, SubmitContext,
    SurfaceContext, TimelineFence, DEFAULT_FENCE_TIMEOUT,
};
use winit::window::Window;

use crate::frame::FramePhase;

/// Application context shared across all app methods.
///
/// Owns everything in dependency order: device context, surface, presenter,
/// command ring, heaps, constants, fence. Teardown runs in reverse with a
/// final fence flush so no GPU work is in flight when resources are
/// destroyed.
pub struct AppContext {
    /// The window handle.
    pub window: Arc<Window>,
    /// GPU context with device and queue.
    pub gpu: GpuContext,
    /// Surface context for windowed rendering.
    pub surface: SurfaceContext,
    /// Swapchain, back buffers, and their attachment slots.
    pub presenter: Presenter,
    /// Per-frame command pools and buffers.
    pub submit: SubmitContext,
    /// The frame fence.
    pub fence: TimelineFence,
    /// Frame-slot ring gating per-frame resource reuse on the fence.
    pub ring: FrameRing,
    /// Shader-visible resource descriptor heap (texture display for the
    /// editor UI allocates from this).
    pub resource_heap: DescriptorHeap,
    /// Sampler descriptor heap.
    pub sampler_heap: DescriptorHeap,
    /// Per-frame constant buffer ring.
    pub constants: ConstantRing,
    /// One image-available semaphore per frame slot.
    pub(crate) image_available: Vec<vk::Semaphore>,
    /// One render-finished semaphore per back buffer.
    pub(crate) render_finished: Vec<vk::Semaphore>,
    /// Frame loop phase.
    pub(crate) phase: FramePhase,
    /// Total frames rendered.
    pub frame_number: FrameNumber,
    /// Startup instant, for the constants time field.
    pub(crate) start_time: Instant,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    /// Create a new application context.
    ///
    /// # Safety
    /// The window must have valid handles.
    pub(crate) unsafe fn new(
        window: Arc<Window>,
        gpu: GpuContext,
        vsync: bool,
        frames_in_flight: usize,
    ) -> anyhow::Result<Self> {
        let frames_in_flight = if frames_in_flight == 0 {
            DEFAULT_FRAMES_IN_FLIGHT
        } else {
            frames_in_flight
        };

        // SAFETY: Caller guarantees window has valid handles
        let surface = unsafe { SurfaceContext::from_window(&gpu, window.as_ref())? };

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        // SAFETY: GPU context and surface are valid
        let presenter = unsafe {
            Presenter::new(
                &gpu,
                &surface,
                width,
                height,
                frames_in_flight as u32,
                vsync,
            )?
        };

        // SAFETY: Device and queue family are valid
        let submit = unsafe {
            SubmitContext::new(
                gpu.device(),
                gpu.graphics_queue(),
                gpu.graphics_queue_family(),
                frames_in_flight,
            )?
        };

        // SAFETY: Device was created with the timeline-semaphore feature
        let fence = unsafe {
            TimelineFence::new(gpu.device_arc(), gpu.graphics_queue(), DEFAULT_FENCE_TIMEOUT)?
        };
        let ring = FrameRing::new(frames_in_flight);

        // SAFETY: Device is valid
        let resource_heap = unsafe {
            DescriptorHeap::new(gpu.device(), HeapKind::Resource, DEFAULT_RESOURCE_HEAP_CAPACITY)?
        };
        // SAFETY: Device is valid
        let sampler_heap = unsafe {
            DescriptorHeap::new(gpu.device(), HeapKind::Sampler, DEFAULT_SAMPLER_HEAP_CAPACITY)?
        };

        let constants = ConstantRing::new(&gpu, frames_in_flight)?;

        let mut image_available = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            // SAFETY: Device is valid
            image_available.push(unsafe { create_binary_semaphore(gpu.device())? });
        }

        let mut render_finished = Vec::with_capacity(presenter.back_buffer_count());
        for _ in 0..presenter.back_buffer_count() {
            // SAFETY: Device is valid
            render_finished.push(unsafe { create_binary_semaphore(gpu.device())? });
        }

        let now = Instant::now();
        Ok(Self {
            window,
            gpu,
            surface,
            presenter,
            submit,
            fence,
            ring,
            resource_heap,
            sampler_heap,
            constants,
            image_available,
            render_finished,
            phase: FramePhase::Idle,
            frame_number: FrameNumber::ZERO,
            start_time: now,
            last_frame_time: now,
        })
    }

    /// Current back buffer extent.
    pub fn extent(&self) -> Extent2d {
        let extent = self.presenter.extent();
        Extent2d::new(extent.width, extent.height)
    }

    /// Target width in pixels.
    pub fn width(&self) -> u32 {
        self.extent().width
    }

    /// Target height in pixels.
    pub fn height(&self) -> u32 {
        self.extent().height
    }

    /// Aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.extent().aspect_ratio()
    }

    /// Number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.ring.frames_in_flight()
    }

    /// Resize the back buffer set; a resize to the current extent is a
    /// no-op. Returns true if buffers were recreated.
    pub fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<bool> {
        // SAFETY: Context members are valid; resize fence-flushes internally
        let recreated = unsafe {
            self.presenter
                .resize(&self.gpu, &self.surface, &self.fence, width, height)?
        };

        if recreated && self.render_finished.len() != self.presenter.back_buffer_count() {
            // Back buffer count changed; the fence flush inside resize makes
            // the old semaphores safe to destroy.
            unsafe {
                for semaphore in self.render_finished.drain(..) {
                    self.gpu.device().destroy_semaphore(semaphore, None);
                }
                for _ in 0..self.presenter.back_buffer_count() {
                    self.render_finished
                        .push(create_binary_semaphore(self.gpu.device())?);
                }
            }
        }

        Ok(recreated)
    }

    /// Cleanup all resources.
    ///
    /// # Safety
    /// Call once, at shutdown.
    pub(crate) unsafe fn cleanup(&mut self) {
        if let Err(e) = self.fence.flush() {
            tracing::error!("Fence flush at shutdown failed: {e}");
        }
        if let Err(e) = self.gpu.wait_idle() {
            tracing::error!("Wait idle at shutdown failed: {e}");
        }

        unsafe {
            let device = self.gpu.device();
            for semaphore in self.image_available.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }

            self.constants.destroy(&self.gpu);
            self.resource_heap.destroy(self.gpu.device());
            self.sampler_heap.destroy(self.gpu.device());
            self.submit.destroy(self.gpu.device());
            self.fence.destroy();
            self.presenter.destroy(&self.gpu, &self.surface);
            self.surface.destroy();
        }
    }
}
