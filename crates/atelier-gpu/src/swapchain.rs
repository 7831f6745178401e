//! Swapchain management.

use crate::error::{GpuError, Result};
use ash::vk;

/// Swapchain wrapper owning the back buffer images.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a new swapchain.
    ///
    /// `old_swapchain` is the retired swapchain during a resize rebuild
    /// (null on first creation); the old handle stays valid until the
    /// caller destroys it, so a failed rebuild leaves it usable.
    ///
    /// # Safety
    /// All handles must be valid.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        extent: vk::Extent2D,
        buffer_count: u32,
        graphics_queue_family: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let queue_families = [graphics_queue_family];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(buffer_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = swapchain_loader.get_swapchain_images(swapchain)?;

        Ok(Self {
            swapchain,
            images,
            format: surface_format.format,
            extent,
        })
    }

    /// Acquire the next back buffer index.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, bool)> {
        let result = swapchain_loader.acquire_next_image(
            self.swapchain,
            timeout_ns,
            semaphore,
            vk::Fence::null(),
        );

        match result {
            Ok((index, suboptimal)) => Ok((index, suboptimal)),
            // OUT_OF_DATE means no image was acquired; caller must recreate.
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Present an image. Returns true if the swapchain is suboptimal or out
    /// of date and should be recreated.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = swapchain_loader.queue_present(queue, &present_info);

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Destroy the swapchain.
    ///
    /// # Safety
    /// All handles must be valid and the swapchain must not be in use.
    pub unsafe fn destroy(&self, swapchain_loader: &ash::khr::swapchain::Device) {
        swapchain_loader.destroy_swapchain(self.swapchain, None);
    }
}

/// Select the best surface format, preferring SRGB.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    for format in available {
        if format.format == vk::Format::B8G8R8A8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return *format;
        }
    }

    available[0]
}

/// Select the best present mode.
///
/// With vsync off, tearing is enabled opportunistically: IMMEDIATE when the
/// platform advertises it, then MAILBOX, else the vsync'd FIFO fallback.
/// FIFO is always supported.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    for &preferred in &[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX] {
        if available.contains(&preferred) {
            return preferred;
        }
    }

    vk::PresentModeKHR::FIFO
}

/// Calculate swapchain extent from the surface capabilities.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// True when the requested size differs from the current extent. An equal
/// size means resize is a no-op: no buffer recreation and no fence wait.
pub fn extent_changed(current: vk::Extent2D, width: u32, height: u32) -> bool {
    current.width != width || current.height != height
}

/// Clamp the desired back buffer count to what the surface supports. A max
/// of zero means unbounded.
pub fn clamp_buffer_count(desired: u32, min: u32, max: u32) -> u32 {
    let count = desired.max(min);
    if max > 0 {
        count.min(max)
    } else {
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_forces_fifo() {
        let available = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            select_present_mode(&available, true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn tearing_preferred_when_advertised() {
        let available = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            select_present_mode(&available, false),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn falls_back_to_fifo_without_tearing_support() {
        let available = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&available, false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_clamped_to_surface_limits() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = calculate_extent(&caps, 8000, 16);
        assert_eq!(extent.width, 4096);
        assert_eq!(extent.height, 64);
    }

    #[test]
    fn fixed_extent_wins_over_request() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let extent = calculate_extent(&caps, 1920, 1080);
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);
    }

    #[test]
    fn equal_extent_means_no_recreation() {
        let current = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert!(!extent_changed(current, 1280, 720));
        assert!(extent_changed(current, 1280, 721));
        assert!(extent_changed(current, 640, 720));
        assert!(extent_changed(current, 0, 0));
    }

    #[test]
    fn buffer_count_clamping() {
        assert_eq!(clamp_buffer_count(3, 2, 8), 3);
        assert_eq!(clamp_buffer_count(1, 2, 8), 2);
        assert_eq!(clamp_buffer_count(16, 2, 8), 8);
        // Unbounded max
        assert_eq!(clamp_buffer_count(16, 2, 0), 16);
    }
}
