//! Presentation unit: back buffers, current-buffer index, resize.
//!
//! Owns the swapchain together with the render-target and depth-stencil
//! heaps bound to its images. Resizing requires all in-flight GPU work
//! referencing the old buffers to have completed, so `resize` performs a
//! full fence flush before releasing anything; skipping that wait would be a
//! use-after-free on the back buffers.

use crate::context::GpuContext;
use crate::descriptors::{AttachmentHeap, HeapKind};
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;
use crate::surface::SurfaceContext;
use crate::swapchain::{
    calculate_extent, clamp_buffer_count, extent_changed, select_present_mode,
    select_surface_format, Swapchain,
};
use crate::sync::TimelineFence;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Depth buffer format used for the main target.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Swapchain plus the attachment slots bound to its images.
pub struct Presenter {
    swapchain: Swapchain,
    render_targets: AttachmentHeap,
    depth_heap: AttachmentHeap,
    depth_image: GpuImage,
    current_back_buffer: u32,
    buffer_count: u32,
    vsync: bool,
}

impl Presenter {
    /// Create the swapchain and bind its images to render-target slots.
    ///
    /// The buffer count is fixed at construction (clamped to surface
    /// limits).
    ///
    /// # Safety
    /// The GPU context and surface must be valid.
    pub unsafe fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        width: u32,
        height: u32,
        buffer_count: u32,
        vsync: bool,
    ) -> Result<Self> {
        let caps = surface.capabilities(gpu)?;
        let buffer_count = clamp_buffer_count(
            buffer_count,
            caps.capabilities.min_image_count,
            caps.capabilities.max_image_count,
        );

        let swapchain = create_swapchain(
            gpu,
            surface,
            &caps.capabilities,
            width,
            height,
            buffer_count,
            vsync,
            &caps.formats,
            &caps.present_modes,
            vk::SwapchainKHR::null(),
        )?;

        let actual_count = swapchain.images.len() as u32;
        let mut render_targets = AttachmentHeap::new(HeapKind::RenderTarget, actual_count);
        for &image in &swapchain.images {
            render_targets.attach(
                gpu.device(),
                image,
                swapchain.format,
                vk::ImageAspectFlags::COLOR,
            )?;
        }

        let (depth_image, depth_heap) = create_depth_target(gpu, swapchain.extent)?;

        tracing::info!(
            "Swapchain created: {}x{} ({} buffers, vsync: {})",
            swapchain.extent.width,
            swapchain.extent.height,
            actual_count,
            vsync,
        );

        Ok(Self {
            swapchain,
            render_targets,
            depth_heap,
            depth_image,
            current_back_buffer: 0,
            buffer_count,
            vsync,
        })
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    /// Number of back buffers.
    pub fn back_buffer_count(&self) -> usize {
        self.swapchain.images.len()
    }

    /// Index of the back buffer most recently acquired.
    pub fn current_back_buffer(&self) -> u32 {
        self.current_back_buffer
    }

    /// The back buffer image for an index.
    pub fn back_buffer(&self, index: u32) -> vk::Image {
        self.swapchain.images[index as usize]
    }

    /// Back buffer format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format
    }

    /// Render-target view for a back buffer index.
    pub fn rtv(&self, index: u32) -> Option<vk::ImageView> {
        self.render_targets.view(index)
    }

    /// The depth-stencil view.
    pub fn dsv(&self) -> Option<vk::ImageView> {
        self.depth_heap.view(0)
    }

    /// Acquire the next back buffer; the returned index becomes
    /// [`Self::current_back_buffer`].
    ///
    /// # Safety
    /// The surface and semaphore must be valid.
    pub unsafe fn acquire(
        &mut self,
        surface: &SurfaceContext,
        semaphore: vk::Semaphore,
    ) -> Result<u32> {
        let (index, _suboptimal) =
            self.swapchain
                .acquire_next_image(&surface.swapchain_loader, semaphore, u64::MAX)?;
        self.current_back_buffer = index;
        Ok(index)
    }

    /// Present the current back buffer. Returns true if the swapchain
    /// should be recreated.
    ///
    /// # Safety
    /// The queue and semaphores must be valid and the image submitted.
    pub unsafe fn present(
        &mut self,
        surface: &SurfaceContext,
        queue: vk::Queue,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool> {
        self.swapchain.present(
            &surface.swapchain_loader,
            queue,
            self.current_back_buffer,
            wait_semaphores,
        )
    }

    /// Resize the back buffer set.
    ///
    /// A resize to the current extent is a no-op: no buffer recreation and
    /// no fence wait. Otherwise all in-flight work is fence-flushed before
    /// the old buffers and their attachment slots are released and rebuilt.
    /// Returns true if the buffers were recreated.
    ///
    /// Failure here is a [`GpuError::SwapchainCreation`], distinct from
    /// device loss, so the caller may retry at a different size.
    ///
    /// # Safety
    /// The GPU context, surface, and fence must be valid.
    pub unsafe fn resize(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        fence: &TimelineFence,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        if !extent_changed(self.swapchain.extent, width, height) {
            return Ok(false);
        }

        // All in-flight frames must retire before the old buffers go away.
        fence.flush()?;

        // Build the replacement before tearing anything down: a creation
        // failure here leaves the old swapchain intact, so the caller can
        // retry at a different size.
        let caps = surface.capabilities(gpu)?;
        let new_swapchain = create_swapchain(
            gpu,
            surface,
            &caps.capabilities,
            width,
            height,
            self.buffer_count,
            self.vsync,
            &caps.formats,
            &caps.present_modes,
            self.swapchain.swapchain,
        )?;

        self.render_targets.reset(gpu.device());
        self.depth_heap.reset(gpu.device());
        gpu.allocator()
            .lock()
            .free_image(&mut self.depth_image)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;
        self.swapchain.destroy(&surface.swapchain_loader);
        self.swapchain = new_swapchain;

        for &image in &self.swapchain.images {
            self.render_targets.attach(
                gpu.device(),
                image,
                self.swapchain.format,
                vk::ImageAspectFlags::COLOR,
            )?;
        }

        let (depth_image, depth_heap) = create_depth_target(gpu, self.swapchain.extent)?;
        self.depth_image = depth_image;
        self.depth_heap = depth_heap;
        self.current_back_buffer = 0;

        tracing::info!(
            "Swapchain recreated: {}x{}",
            self.swapchain.extent.width,
            self.swapchain.extent.height
        );

        Ok(true)
    }

    /// Destroy the swapchain, attachment slots, and depth buffer.
    ///
    /// # Safety
    /// The GPU must be idle.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext, surface: &SurfaceContext) {
        self.render_targets.reset(gpu.device());
        self.depth_heap.reset(gpu.device());
        let _ = gpu.allocator().lock().free_image(&mut self.depth_image);
        self.swapchain.destroy(&surface.swapchain_loader);
    }
}

#[allow(clippy::too_many_arguments)]
unsafe fn create_swapchain(
    gpu: &GpuContext,
    surface: &SurfaceContext,
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
    buffer_count: u32,
    vsync: bool,
    formats: &[vk::SurfaceFormatKHR],
    present_modes: &[vk::PresentModeKHR],
    old_swapchain: vk::SwapchainKHR,
) -> Result<Swapchain> {
    let surface_format = select_surface_format(formats);
    let present_mode = select_present_mode(present_modes, vsync);
    let extent = calculate_extent(capabilities, width, height);

    Swapchain::new(
        &surface.swapchain_loader,
        surface.surface,
        capabilities,
        surface_format,
        present_mode,
        extent,
        buffer_count,
        gpu.graphics_queue_family(),
        old_swapchain,
    )
}

unsafe fn create_depth_target(
    gpu: &GpuContext,
    extent: vk::Extent2D,
) -> Result<(GpuImage, AttachmentHeap)> {
    let create_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(DEPTH_FORMAT)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    let depth_image = gpu
        .allocator()
        .lock()
        .create_image(&create_info, MemoryLocation::GpuOnly, "depth target")?;

    let mut depth_heap = AttachmentHeap::new(HeapKind::DepthStencil, 1);
    depth_heap.attach(
        gpu.device(),
        depth_image.image,
        DEPTH_FORMAT,
        vk::ImageAspectFlags::DEPTH,
    )?;

    Ok((depth_image, depth_heap))
}
