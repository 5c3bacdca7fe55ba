// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-frame ring of dynamic-offset uniform buffers.

use super::MAX_FRAMES_IN_FLIGHT;
use relume_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BindingResource,
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError,
};
use std::borrow::Cow;

/// Lower bound on the ring alignment, whatever the device reports.
pub const MIN_UNIFORM_ALIGNMENT: u32 = 256;

/// Elements a fresh chunk holds.
pub const DEFAULT_MAX_ELEMENTS: u32 = 256;

/// Where a pushed element lives: bind `bind_group` with `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlice {
    /// Bind group over the chunk holding the element.
    pub bind_group: BindGroupId,
    /// Dynamic offset of the element.
    pub offset: u32,
}

#[derive(Debug)]
struct BufferChunk {
    buffer: BufferId,
    bind_group: BindGroupId,
    capacity: u32,
    current_offset: u32,
}

#[derive(Debug, Default)]
struct RingSlot {
    chunks: Vec<BufferChunk>,
    active_chunk: usize,
}

/// Uniform storage for data that changes many times per frame.
///
/// Each frame in flight owns a slot made of chunks. Chunks grow on demand and
/// are rewound, not freed, when their slot comes around again.
#[derive(Debug)]
pub struct DynamicUniformRing {
    slots: Vec<RingSlot>,
    current: usize,
    element_size: u32,
    alignment: u32,
    layout: BindGroupLayoutId,
    binding: u32,
    label: &'static str,
}

fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

impl DynamicUniformRing {
    /// Creates a ring whose chunks are bound through `layout` at `binding`.
    pub fn new(
        device: &dyn GraphicsDevice,
        layout: BindGroupLayoutId,
        binding: u32,
        element_size: u32,
        max_elements: u32,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let alignment = device.min_uniform_alignment().max(MIN_UNIFORM_ALIGNMENT);
        let mut ring = Self {
            slots: (0..MAX_FRAMES_IN_FLIGHT).map(|_| RingSlot::default()).collect(),
            current: 0,
            element_size,
            alignment,
            layout,
            binding,
            label,
        };
        let capacity = ring.aligned_element_size() * max_elements.max(1);
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            let chunk = ring.create_chunk(device, slot, capacity)?;
            ring.slots[slot].chunks.push(chunk);
        }
        Ok(ring)
    }

    /// Space one element occupies.
    pub fn aligned_element_size(&self) -> u32 {
        align_up(self.element_size, self.alignment)
    }

    /// Moves to the next frame slot and rewinds it.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        let slot = &mut self.slots[self.current];
        for chunk in &mut slot.chunks {
            chunk.current_offset = 0;
        }
        slot.active_chunk = 0;
    }

    /// Index of the active frame slot.
    pub fn current_slot_index(&self) -> usize {
        self.current
    }

    /// Makes sure the active slot can take `elements` more pushes without
    /// allocating.
    pub fn reserve(&mut self, device: &dyn GraphicsDevice, elements: u32) -> Result<(), ResourceError> {
        let needed = self.aligned_element_size() * elements;
        let slot = &self.slots[self.current];
        let free: u32 = slot.chunks[slot.active_chunk..]
            .iter()
            .map(|c| c.capacity - c.current_offset)
            .sum();
        if free >= needed {
            return Ok(());
        }
        let last = slot.chunks.last().map_or(0, |c| c.capacity);
        let capacity = (last * 2).max(needed - free);
        let chunk = self.create_chunk(device, self.current, capacity)?;
        self.slots[self.current].chunks.push(chunk);
        Ok(())
    }

    /// Writes one element and returns where it lives.
    pub fn push(&mut self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<UniformSlice, ResourceError> {
        let size = align_up(data.len() as u32, self.alignment);
        let current = self.current;

        loop {
            let slot = &mut self.slots[current];
            let chunk = &slot.chunks[slot.active_chunk];
            if chunk.current_offset + size <= chunk.capacity {
                break;
            }
            if slot.active_chunk + 1 < slot.chunks.len() {
                slot.active_chunk += 1;
                continue;
            }
            let capacity = (chunk.capacity * 2).max(size * DEFAULT_MAX_ELEMENTS);
            let chunk = self.create_chunk(device, current, capacity)?;
            let slot = &mut self.slots[current];
            slot.chunks.push(chunk);
            slot.active_chunk = slot.chunks.len() - 1;
        }

        let slot = &mut self.slots[current];
        let chunk = &mut slot.chunks[slot.active_chunk];
        let offset = chunk.current_offset;
        device.write_buffer(chunk.buffer, offset as u64, data)?;
        chunk.current_offset += size;
        Ok(UniformSlice {
            bind_group: chunk.bind_group,
            offset,
        })
    }

    /// Destroys every chunk.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for chunk in self.slots.iter().flat_map(|s| &s.chunks) {
            if let Err(e) = device.destroy_bind_group(chunk.bind_group) {
                log::warn!("DynamicUniformRing({}): failed to destroy bind group: {e}", self.label);
            }
            if let Err(e) = device.destroy_buffer(chunk.buffer) {
                log::warn!("DynamicUniformRing({}): failed to destroy buffer: {e}", self.label);
            }
        }
    }

    fn create_chunk(
        &self,
        device: &dyn GraphicsDevice,
        slot: usize,
        capacity: u32,
    ) -> Result<BufferChunk, ResourceError> {
        let index = self.slots[slot].chunks.len();
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!(
                "{} [slot {} chunk {}]",
                self.label, slot, index
            ))),
            size: capacity as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some(self.label),
            layout: self.layout,
            entries: &[BindGroupEntry {
                binding: self.binding,
                resource: BindingResource::Buffer {
                    buffer,
                    offset: 0,
                    size: Some(self.element_size as u64),
                },
            }],
        })?;
        log::debug!(
            "DynamicUniformRing({}): new chunk of {} bytes in slot {}",
            self.label,
            capacity,
            slot
        );
        Ok(BufferChunk {
            buffer,
            bind_group,
            capacity,
            current_offset: 0,
        })
    }
}
