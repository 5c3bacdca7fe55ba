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

//! Double-buffered per-stream vertex buffers.

use super::MAX_FRAMES_IN_FLIGHT;
use crate::batch::{StreamKind, Vertex};
use relume_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError,
};
use std::borrow::Cow;

/// The GPU vertex buffer of one stream in one frame slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamBuffer {
    /// The buffer, absent until the stream first holds geometry.
    pub buffer: Option<BufferId>,
    /// Capacity in vertices.
    pub capacity: usize,
    /// Vertices uploaded this frame.
    pub vertex_count: usize,
}

/// `MAX_FRAMES_IN_FLIGHT` sets of four growable vertex buffers.
///
/// A frame writes into the active set while the GPU may still read the other.
#[derive(Debug, Default)]
pub struct FrameVertexStorage {
    sets: [[StreamBuffer; 4]; MAX_FRAMES_IN_FLIGHT],
    current: usize,
}

impl FrameVertexStorage {
    /// Creates storage without any buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next set active.
    pub fn swap_next(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Index of the active set.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The active buffer of a stream.
    pub fn current(&self, kind: StreamKind) -> &StreamBuffer {
        &self.sets[self.current][kind.index()]
    }

    /// Grows the active buffer of `kind` to hold at least `vertices`.
    /// Contents are not preserved when it grows.
    pub fn ensure_capacity(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: StreamKind,
        vertices: usize,
    ) -> Result<(), ResourceError> {
        let slot = self.current;
        let stream = &mut self.sets[slot][kind.index()];
        if stream.buffer.is_some() && stream.capacity >= vertices || vertices == 0 {
            return Ok(());
        }

        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!("{}_vertices [slot {}]", kind.name(), slot))),
            size: vertices as u64 * Vertex::STRIDE,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        if let Some(old) = stream.buffer.replace(buffer) {
            device.destroy_buffer(old)?;
        }
        log::debug!(
            "Grew {} vertex buffer of slot {} to {} vertices",
            kind.name(),
            slot,
            vertices
        );
        stream.capacity = vertices;
        stream.vertex_count = 0;
        Ok(())
    }

    /// Uploads the stream's vertices for this frame into the active buffer.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: StreamKind,
        vertices: &[Vertex],
    ) -> Result<(), ResourceError> {
        let stream = &mut self.sets[self.current][kind.index()];
        stream.vertex_count = vertices.len();
        if vertices.is_empty() {
            return Ok(());
        }
        let buffer = match stream.buffer {
            Some(buffer) if stream.capacity >= vertices.len() => buffer,
            _ => return Err(ResourceError::OutOfBounds),
        };
        device.write_buffer(buffer, 0, bytemuck::cast_slice(vertices))
    }

    /// Destroys every buffer.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for stream in self.sets.iter_mut().flatten() {
            if let Some(buffer) = stream.buffer.take() {
                if let Err(e) = device.destroy_buffer(buffer) {
                    log::warn!("FrameVertexStorage: failed to destroy buffer: {e}");
                }
            }
            *stream = StreamBuffer::default();
        }
    }
}
