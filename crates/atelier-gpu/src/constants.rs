//! Per-frame constant buffer.
//!
//! One upload-heap buffer holds a constants block per frame slot, mapped
//! once at creation and never unmapped until shutdown. Writes are plain
//! memory copies into the mapped pointer. CPU-overwrite of data the GPU is
//! still reading is prevented by keying writes to an acquired [`FrameSlot`]:
//! the slot only exists once its previous submission has retired, so each
//! slot's region is free by the time it is written again.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuBuffer;
use crate::sync::FrameSlot;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use gpu_allocator::MemoryLocation;

/// Constants updated once per frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub proj: Mat4,
    /// Combined world-to-clip matrix.
    pub view_proj: Mat4,
    /// Camera position (w unused).
    pub camera_position: Vec4,
    /// Seconds since startup.
    pub time_seconds: f32,
    /// Frame counter, wrapped to 32 bits for the shader.
    pub frame_number: u32,
    pub _padding: [u32; 2],
}

/// Round `size` up to the next multiple of `alignment` (a power of two).
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

/// N-buffered per-frame constant buffer.
pub struct ConstantRing {
    buffer: GpuBuffer,
    stride: u64,
    slots: usize,
}

impl ConstantRing {
    /// Create a ring with one constants block per frame slot, persistently
    /// mapped.
    pub fn new(gpu: &GpuContext, frames_in_flight: usize) -> Result<Self> {
        let stride = aligned_stride(
            std::mem::size_of::<FrameConstants>() as u64,
            gpu.uniform_offset_alignment().max(1),
        );
        let size = stride * frames_in_flight as u64;

        let buffer = gpu.allocator().lock().create_buffer(
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "frame constants",
        )?;

        if buffer.mapped_ptr().is_none() {
            return Err(GpuError::ResourceCreation(
                "frame constant buffer is not host-mapped".to_string(),
            ));
        }

        Ok(Self {
            buffer,
            stride,
            slots: frames_in_flight,
        })
    }

    /// The underlying buffer handle, for descriptor writes.
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    /// Byte offset of a slot's constants block.
    pub fn offset(&self, slot_index: usize) -> u64 {
        debug_assert!(slot_index < self.slots);
        self.stride * slot_index as u64
    }

    /// Size of one constants block (aligned stride).
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Copy this frame's constants into the slot's region of the mapped
    /// buffer.
    pub fn write(&self, slot: &FrameSlot, constants: &FrameConstants) -> Result<()> {
        self.buffer
            .write_bytes(self.offset(slot.index()), bytemuck::bytes_of(constants))
    }

    /// Free the buffer.
    ///
    /// # Safety
    /// No in-flight frame may reference the buffer.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let _ = gpu.allocator().lock().free_buffer(&mut self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_tightly_sized() {
        // Three matrices + one vec4 + four scalars, std430-friendly.
        assert_eq!(std::mem::size_of::<FrameConstants>(), 3 * 64 + 16 + 16);
        assert_eq!(std::mem::align_of::<FrameConstants>() % 4, 0);
    }

    #[test]
    fn stride_alignment() {
        assert_eq!(aligned_stride(224, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(257, 256), 512);
        assert_eq!(aligned_stride(1, 64), 64);
    }

    #[test]
    fn slot_offsets_do_not_overlap() {
        let stride = aligned_stride(std::mem::size_of::<FrameConstants>() as u64, 256);
        let offsets: Vec<u64> = (0..3).map(|i| stride * i).collect();
        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] >= std::mem::size_of::<FrameConstants>() as u64);
        }
    }
}
