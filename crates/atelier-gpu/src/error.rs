//! GPU error types.
//!
//! All device and resource creation failures are unrecoverable at this
//! layer; they propagate to the application boundary which reports them and
//! terminates. Swapchain recreation failures are kept distinct from device
//! loss so a resize can be retried at a different size.

use crate::descriptors::HeapKind;
use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No adapter passed the feature-level and software-exclusion checks.
    #[error("No suitable graphics adapter found")]
    AdapterNotFound,

    /// Logical device creation failed. Always fatal; there is no fallback
    /// adapter retry loop.
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// Creation of a heap, buffer, image, or fence failed.
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// A descriptor heap's append-only cursor reached its fixed capacity.
    #[error("Descriptor heap exhausted: {kind:?} heap at capacity {capacity}")]
    HeapExhausted { kind: HeapKind, capacity: u32 },

    /// A fence wait exceeded its timeout. Treated as a device-lost-grade
    /// condition.
    #[error("Fence wait for value {value} timed out after {waited_ms} ms")]
    SynchronizationTimeout { value: u64, waited_ms: u64 },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed. Distinct from device loss so a resize can
    /// be retried.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
