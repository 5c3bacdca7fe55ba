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

//! GPU buffers.

use crate::relume_bitflags;
use std::borrow::Cow;

/// An opaque handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

relume_bitflags! {
    /// How a buffer may be used. Values match the native backend flags.
    pub struct BufferUsage: u32 {
        /// Mappable for CPU reads.
        const MAP_READ = 1 << 0;
        /// Mappable for CPU writes.
        const MAP_WRITE = 1 << 1;
        /// Source of a copy.
        const COPY_SRC = 1 << 2;
        /// Destination of a copy or queue write.
        const COPY_DST = 1 << 3;
        /// Index buffer.
        const INDEX = 1 << 4;
        /// Vertex buffer.
        const VERTEX = 1 << 5;
        /// Uniform buffer.
        const UNIFORM = 1 << 6;
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
    /// Whether the buffer starts mapped.
    pub mapped_at_creation: bool,
}
