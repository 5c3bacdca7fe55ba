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

//! Frame and resource pools.
//!
//! Everything the renderer allocates repeatedly is recycled: execute buffers
//! and material textures through size-class free lists, vertex and uniform
//! storage through per-frame slots.

mod execute_buffer;
mod material_slots;
mod size_class;
mod texture_pool;
mod uniform_ring;
mod vertex_storage;

pub use execute_buffer::ExecuteBufferPool;
pub use material_slots::MaterialSlots;
pub use size_class::{SizeClassPool, SlotKey};
pub use texture_pool::{ColorSpace, PooledTexture, TexturePool};
pub use uniform_ring::{DynamicUniformRing, UniformSlice, DEFAULT_MAX_ELEMENTS, MIN_UNIFORM_ALIGNMENT};
pub use vertex_storage::{FrameVertexStorage, StreamBuffer};

/// Frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
