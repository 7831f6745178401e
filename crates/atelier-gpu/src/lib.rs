//! Vulkan device, descriptor, and frame-synchronization layer for the
//! Atelier engine.
//!
//! This crate provides:
//! - Adapter enumeration and selection
//! - Instance and logical device management
//! - Fixed-capacity descriptor heaps with append-only allocation
//! - The timeline-semaphore frame fence and the frame-slot ring that
//!   enforces wait-before-reset on per-frame resources
//! - Swapchain presentation and resize
//! - The persistently mapped per-frame constant buffer

pub mod adapter;
pub mod command;
pub mod constants;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod presenter;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use adapter::{enumerate_adapters, select_adapter, AdapterInfo, GpuVendor};
pub use command::SubmitContext;
pub use constants::{ConstantRing, FrameConstants};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    write_sampled_image, write_uniform_buffer, AttachmentHeap, AttachmentSlot, DescriptorHeap,
    DescriptorSetLayoutBuilder, DescriptorSlot, HeapCursor, HeapKind,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use presenter::Presenter;
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use sync::{
    create_binary_semaphore, FenceOps, FrameRing, FrameSlot, TimelineFence, DEFAULT_FENCE_TIMEOUT,
};
