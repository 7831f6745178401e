//! Descriptor heap management.
//!
//! Heaps are fixed-capacity tables of one descriptor kind with an
//! append-only allocation cursor. There is no per-slot free: slots are
//! consumed for the engine's lifetime, and exhaustion is fatal. The one
//! exception is [`AttachmentHeap::reset`], which rewinds a render-target or
//! depth-stencil heap wholesale when the presentation unit rebuilds its
//! back buffers.

use crate::error::{GpuError, Result};
use ash::vk;

/// Kind of descriptors a heap holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// Render-target views (one per back buffer).
    RenderTarget,
    /// Depth-stencil views.
    DepthStencil,
    /// Shader-visible resources: constant buffers, sampled images, storage
    /// buffers.
    Resource,
    /// Samplers.
    Sampler,
}

/// Append-only allocation cursor for a fixed-capacity heap.
#[derive(Debug)]
pub struct HeapCursor {
    kind: HeapKind,
    capacity: u32,
    next: u32,
}

impl HeapCursor {
    /// Create a cursor over `capacity` slots.
    pub fn new(kind: HeapKind, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            next: 0,
        }
    }

    /// Claim the next slot index.
    ///
    /// Fails with [`GpuError::HeapExhausted`] on the `capacity + 1`-th call.
    pub fn allocate(&mut self) -> Result<u32> {
        if self.next >= self.capacity {
            return Err(GpuError::HeapExhausted {
                kind: self.kind,
                capacity: self.capacity,
            });
        }
        let index = self.next;
        self.next += 1;
        Ok(index)
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots allocated so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }

    /// Remaining slots.
    pub fn remaining(&self) -> u32 {
        self.capacity - self.next
    }

    fn rewind(&mut self) {
        self.next = 0;
    }
}

/// A stable descriptor slot handed out by a [`DescriptorHeap`].
///
/// Valid until the heap is destroyed.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorSlot {
    /// Slot index within the heap.
    pub index: u32,
    /// The descriptor set bound to this slot.
    pub set: vk::DescriptorSet,
}

/// Fixed-capacity heap of shader-visible descriptors.
pub struct DescriptorHeap {
    cursor: HeapCursor,
    pool: vk::DescriptorPool,
}

impl DescriptorHeap {
    /// Create a heap for shader-visible descriptors.
    ///
    /// `kind` must be [`HeapKind::Resource`] or [`HeapKind::Sampler`];
    /// render-target and depth-stencil slots live in an [`AttachmentHeap`].
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, kind: HeapKind, capacity: u32) -> Result<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = match kind {
            HeapKind::Resource => vec![
                vk::DescriptorPoolSize::default()
                    .ty(vk::DescriptorType::UNIFORM_BUFFER)
                    .descriptor_count(capacity),
                vk::DescriptorPoolSize::default()
                    .ty(vk::DescriptorType::STORAGE_BUFFER)
                    .descriptor_count(capacity),
                vk::DescriptorPoolSize::default()
                    .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .descriptor_count(capacity),
            ],
            HeapKind::Sampler => vec![vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::SAMPLER)
                .descriptor_count(capacity)],
            HeapKind::RenderTarget | HeapKind::DepthStencil => {
                return Err(GpuError::InvalidState(format!(
                    "{kind:?} slots are attachment views, not descriptor sets"
                )));
            }
        };

        // No FREE_DESCRIPTOR_SET flag: slots are never returned.
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(capacity)
            .pool_sizes(&pool_sizes);

        let pool = device
            .create_descriptor_pool(&create_info, None)
            .map_err(|e| GpuError::ResourceCreation(format!("{kind:?} descriptor pool: {e}")))?;

        Ok(Self {
            cursor: HeapCursor::new(kind, capacity),
            pool,
        })
    }

    /// Allocate the next slot as a descriptor set with the given layout.
    ///
    /// # Safety
    /// The device must be valid and the layout compatible with this heap's
    /// pool sizes.
    pub unsafe fn allocate(
        &mut self,
        device: &ash::Device,
        layout: vk::DescriptorSetLayout,
    ) -> Result<DescriptorSlot> {
        // Cursor check first so exhaustion is deterministic and CPU-side.
        let index = self.cursor.allocate()?;

        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = device.allocate_descriptor_sets(&alloc_info)?;

        Ok(DescriptorSlot {
            index,
            set: sets[0],
        })
    }

    /// Heap capacity.
    pub fn capacity(&self) -> u32 {
        self.cursor.capacity()
    }

    /// Slots allocated so far.
    pub fn allocated(&self) -> u32 {
        self.cursor.allocated()
    }

    /// Destroy the heap and every descriptor set allocated from it.
    ///
    /// # Safety
    /// The device must be valid and no set from this heap may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_descriptor_pool(self.pool, None);
    }
}

/// A render-target or depth-stencil slot.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSlot {
    /// Slot index within the heap.
    pub index: u32,
    /// The image view bound to this slot.
    pub view: vk::ImageView,
}

/// Fixed-capacity heap of attachment views (render targets, depth buffers).
pub struct AttachmentHeap {
    cursor: HeapCursor,
    views: Vec<vk::ImageView>,
}

impl AttachmentHeap {
    /// Create an attachment heap; render-target heaps are sized to the back
    /// buffer count.
    pub fn new(kind: HeapKind, capacity: u32) -> Self {
        Self {
            cursor: HeapCursor::new(kind, capacity),
            views: Vec::with_capacity(capacity as usize),
        }
    }

    /// Create a view over `image` and bind it to the next slot.
    ///
    /// # Safety
    /// The device and image must be valid.
    pub unsafe fn attach(
        &mut self,
        device: &ash::Device,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<AttachmentSlot> {
        let index = self.cursor.allocate()?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = device
            .create_image_view(&view_info, None)
            .map_err(|e| GpuError::ResourceCreation(format!("attachment view: {e}")))?;
        self.views.push(view);

        Ok(AttachmentSlot { index, view })
    }

    /// The view in a given slot, if allocated.
    pub fn view(&self, index: u32) -> Option<vk::ImageView> {
        self.views.get(index as usize).copied()
    }

    /// Heap capacity.
    pub fn capacity(&self) -> u32 {
        self.cursor.capacity()
    }

    /// Slots allocated so far.
    pub fn allocated(&self) -> u32 {
        self.cursor.allocated()
    }

    /// Destroy all views and rewind the cursor.
    ///
    /// Used by the presentation unit when the back buffer set is recreated;
    /// the caller must have fence-waited all in-flight work first.
    ///
    /// # Safety
    /// The device must be valid and no view may be referenced by pending
    /// GPU work.
    pub unsafe fn reset(&mut self, device: &ash::Device) {
        for view in self.views.drain(..) {
            device.destroy_image_view(view, None);
        }
        self.cursor.rewind();
    }
}

/// Descriptor set layout builder.
pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add a binding.
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags),
        );
        self
    }

    /// Add a uniform buffer binding.
    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a sampled image binding.
    pub fn sampled_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
        )
    }

    /// Build the descriptor set layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);
        let layout = device.create_descriptor_set_layout(&layout_info, None)?;
        Ok(layout)
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a uniform buffer descriptor into a slot.
///
/// # Safety
/// Device and buffer must be valid.
pub unsafe fn write_uniform_buffer(
    device: &ash::Device,
    slot: &DescriptorSlot,
    binding: u32,
    buffer: vk::Buffer,
    offset: u64,
    range: u64,
) {
    let buffer_info = vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(slot.set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(std::slice::from_ref(&buffer_info));

    device.update_descriptor_sets(&[write], &[]);
}

/// Write a sampled image descriptor into a slot (texture display in the
/// editor UI goes through this).
///
/// # Safety
/// Device, view, and sampler must be valid.
pub unsafe fn write_sampled_image(
    device: &ash::Device,
    slot: &DescriptorSlot,
    binding: u32,
    view: vk::ImageView,
    sampler: vk::Sampler,
    layout: vk::ImageLayout,
) {
    let image_info = vk::DescriptorImageInfo::default()
        .image_view(view)
        .sampler(sampler)
        .image_layout(layout);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(slot.set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(std::slice::from_ref(&image_info));

    device.update_descriptor_sets(&[write], &[]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_exhausts_exactly_at_capacity() {
        let mut cursor = HeapCursor::new(HeapKind::Resource, 4);

        for expected in 0..4 {
            assert_eq!(cursor.allocate().unwrap(), expected);
        }

        // The capacity+1-th allocation fails, never earlier or later.
        assert!(matches!(
            cursor.allocate(),
            Err(GpuError::HeapExhausted {
                kind: HeapKind::Resource,
                capacity: 4,
            })
        ));
        assert_eq!(cursor.allocated(), 4);
    }

    #[test]
    fn cursor_indices_are_stable_and_sequential() {
        let mut cursor = HeapCursor::new(HeapKind::Sampler, 64);
        assert_eq!(cursor.allocate().unwrap(), 0);
        assert_eq!(cursor.allocate().unwrap(), 1);
        assert_eq!(cursor.remaining(), 62);
    }

    #[test]
    fn zero_capacity_heap_fails_immediately() {
        let mut cursor = HeapCursor::new(HeapKind::RenderTarget, 0);
        assert!(matches!(
            cursor.allocate(),
            Err(GpuError::HeapExhausted { capacity: 0, .. })
        ));
    }

    #[test]
    fn rewind_restores_full_capacity() {
        let mut cursor = HeapCursor::new(HeapKind::RenderTarget, 3);
        for _ in 0..3 {
            cursor.allocate().unwrap();
        }
        cursor.rewind();
        assert_eq!(cursor.allocated(), 0);
        assert_eq!(cursor.allocate().unwrap(), 0);
    }
}
