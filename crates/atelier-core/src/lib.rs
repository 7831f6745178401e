//! Core types for the Atelier engine.
//!
//! This crate provides the foundational types used throughout the engine:
//! - Surface extents and frame indices
//! - Engine constants

pub mod types;

pub use types::{Extent2d, FrameNumber};

/// Engine-wide constants
pub mod constants {
    /// Default number of frames recorded ahead of the GPU
    pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;
    /// Default capacity of the shader-visible resource descriptor heap
    pub const DEFAULT_RESOURCE_HEAP_CAPACITY: u32 = 4096;
    /// Default capacity of the sampler descriptor heap
    pub const DEFAULT_SAMPLER_HEAP_CAPACITY: u32 = 64;
}
