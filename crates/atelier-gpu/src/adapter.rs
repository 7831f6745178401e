//! Graphics adapter enumeration and selection.
//!
//! Enumeration is a pure query: no device state is created until the
//! selected adapter is handed to [`crate::GpuContextBuilder`].

use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::CStr;

/// Minimum required Vulkan version (major, minor).
pub const MIN_API_VERSION: (u32, u32) = (1, 3);

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Properties of one enumerated adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Adapter name as reported by the driver.
    pub name: String,
    /// GPU vendor.
    pub vendor: GpuVendor,
    /// Physical device type as reported by the driver.
    pub device_type: vk::PhysicalDeviceType,
    /// Dedicated (device-local) memory in MiB.
    pub dedicated_memory_mb: u64,
    /// Supported Vulkan API version.
    pub api_version: u32,
}

impl AdapterInfo {
    /// Returns true for software rasterizers (CPU implementations such as
    /// llvmpipe or SwiftShader).
    pub fn is_software(&self) -> bool {
        self.device_type == vk::PhysicalDeviceType::CPU
    }

    /// Returns true if the adapter meets the minimum feature level.
    pub fn meets_feature_level(&self) -> bool {
        let major = vk::api_version_major(self.api_version);
        let minor = vk::api_version_minor(self.api_version);
        (major, minor) >= MIN_API_VERSION
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.dedicated_memory_mb,
        )
    }
}

/// Enumerate all adapters visible to the instance.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn enumerate_adapters(
    instance: &ash::Instance,
) -> Result<Vec<(vk::PhysicalDevice, AdapterInfo)>> {
    let devices = instance.enumerate_physical_devices()?;

    let mut adapters = Vec::with_capacity(devices.len());
    for device in devices {
        let properties = instance.get_physical_device_properties(device);
        let memory = instance.get_physical_device_memory_properties(device);

        let name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let dedicated_memory_mb: u64 = memory
            .memory_heaps
            .iter()
            .take(memory.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        adapters.push((
            device,
            AdapterInfo {
                name,
                vendor: GpuVendor::from_vendor_id(properties.vendor_id),
                device_type: properties.device_type,
                dedicated_memory_mb,
                api_version: properties.api_version,
            },
        ));
    }

    Ok(adapters)
}

/// Select the best adapter from an enumerated list.
///
/// Software adapters are excluded unless `allow_software` is set; adapters
/// below the minimum feature level are always excluded. Among the remaining
/// candidates the one with the largest dedicated memory wins, first
/// enumerated on ties.
pub fn select_adapter(adapters: &[AdapterInfo], allow_software: bool) -> Result<usize> {
    let mut best: Option<(usize, u64)> = None;

    for (index, adapter) in adapters.iter().enumerate() {
        if adapter.is_software() && !allow_software {
            continue;
        }
        if !adapter.meets_feature_level() {
            continue;
        }

        // Strict comparison keeps the first enumerated adapter on ties.
        match best {
            Some((_, memory)) if adapter.dedicated_memory_mb <= memory => {}
            _ => best = Some((index, adapter.dedicated_memory_mb)),
        }
    }

    best.map(|(index, _)| index).ok_or(GpuError::AdapterNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(name: &str, device_type: vk::PhysicalDeviceType, memory_mb: u64) -> AdapterInfo {
        AdapterInfo {
            name: name.to_string(),
            vendor: GpuVendor::Other(0),
            device_type,
            dedicated_memory_mb: memory_mb,
            api_version: vk::API_VERSION_1_3,
        }
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
    }

    #[test]
    fn selects_largest_dedicated_memory() {
        let adapters = vec![
            adapter("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU, 2048),
            adapter("discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
            adapter("older discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 4096),
        ];
        assert_eq!(select_adapter(&adapters, false).unwrap(), 1);
    }

    #[test]
    fn tie_break_keeps_first_enumerated() {
        let adapters = vec![
            adapter("first", vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
            adapter("second", vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
        ];
        assert_eq!(select_adapter(&adapters, false).unwrap(), 0);
    }

    #[test]
    fn software_excluded_unless_requested() {
        let adapters = vec![adapter("llvmpipe", vk::PhysicalDeviceType::CPU, 16384)];
        assert!(matches!(
            select_adapter(&adapters, false),
            Err(GpuError::AdapterNotFound)
        ));
        assert_eq!(select_adapter(&adapters, true).unwrap(), 0);
    }

    #[test]
    fn software_never_preferred_over_hardware() {
        let adapters = vec![
            adapter("llvmpipe", vk::PhysicalDeviceType::CPU, 65536),
            adapter("discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 4096),
        ];
        assert_eq!(select_adapter(&adapters, false).unwrap(), 1);
    }

    #[test]
    fn feature_level_gate() {
        let mut old = adapter("legacy", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        old.api_version = vk::API_VERSION_1_1;
        assert!(!old.meets_feature_level());
        assert!(matches!(
            select_adapter(&[old], false),
            Err(GpuError::AdapterNotFound)
        ));
    }

    #[test]
    fn empty_list_fails() {
        assert!(matches!(
            select_adapter(&[], false),
            Err(GpuError::AdapterNotFound)
        ));
    }
}
