//! GPU context management.
//!
//! Lifecycle order is Device → Queue → SwapChain → Heaps → Command ring →
//! Fence; teardown runs in reverse after a final wait-idle so no GPU work is
//! in flight when resources are destroyed.

use crate::adapter::{enumerate_adapters, select_adapter, AdapterInfo};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, DebugMessenger};
use crate::memory::GpuAllocator;
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) debug_messenger: Option<DebugMessenger>,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) adapter: AdapterInfo,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) allocator: Mutex<GpuAllocator>,

    pub(crate) graphics_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get a shared handle to the device.
    pub fn device_arc(&self) -> Arc<ash::Device> {
        self.device.clone()
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Properties of the selected adapter.
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Minimum alignment for uniform buffer offsets on this adapter.
    pub fn uniform_offset_alignment(&self) -> u64 {
        let properties = unsafe {
            self.instance
                .get_physical_device_properties(self.physical_device)
        };
        properties.limits.min_uniform_buffer_offset_alignment
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocator frees all VkDeviceMemory before the device goes away
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);

            if let Some(messenger) = &self.debug_messenger {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    allow_software: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Atelier".to_string(),
            enable_validation: cfg!(debug_assertions),
            allow_software: false,
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Allow selecting software (CPU) adapters.
    pub fn allow_software(mut self, allow: bool) -> Self {
        self.allow_software = allow;
        self
    }

    /// Build the GPU context.
    pub fn build(self) -> Result<GpuContext> {
        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        // Create Vulkan instance
        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        let debug_messenger = if self.enable_validation {
            match unsafe { DebugMessenger::install(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    tracing::warn!("Debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        // Enumerate adapters and pick the one with the most dedicated memory
        let adapters = unsafe { enumerate_adapters(&instance) }?;
        let infos: Vec<AdapterInfo> = adapters.iter().map(|(_, info)| info.clone()).collect();
        let selected = select_adapter(&infos, self.allow_software)?;
        let (physical_device, adapter) = adapters[selected].clone();

        tracing::info!("Selected adapter: {}", adapter.summary());

        // Find the graphics queue family
        let graphics_queue_family =
            unsafe { find_graphics_queue_family(&instance, physical_device) }?;

        // Create the logical device
        let (device, graphics_queue) = unsafe {
            create_device(&instance, physical_device, graphics_queue_family)
                .map_err(|e| GpuError::DeviceCreation(e.to_string()))?
        };

        let device = Arc::new(device);

        // Create GPU allocator
        let allocator = unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        Ok(GpuContext {
            entry,
            instance,
            debug_messenger,
            physical_device,
            adapter,
            device,
            allocator: Mutex::new(allocator),
            graphics_queue_family,
            graphics_queue,
        })
    }
}

/// Find a queue family with graphics support.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32> {
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

    queue_families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or(GpuError::AdapterNotFound)
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static std::ffi::CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create the logical device and retrieve the graphics queue.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(std::slice::from_ref(&queue_priority));

    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Vulkan 1.3 features: synchronization2 carries the queue-submit path,
    // dynamic rendering removes render-pass objects from the presenter.
    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);

    // Vulkan 1.2 features: the timeline semaphore is the engine's frame fence.
    let mut vulkan_1_2_features = vk::PhysicalDeviceVulkan12Features::default()
        .timeline_semaphore(true)
        .buffer_device_address(true)
        .descriptor_indexing(true);

    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut vulkan_1_3_features)
        .push_next(&mut vulkan_1_2_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_create_info))
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(graphics_queue_family, 0);

    Ok((device, graphics_queue))
}
