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

//! Bind group layouts and bind groups.

use super::buffer::BufferId;
use super::shader::ShaderStages;
use super::texture::{SamplerId, TextureViewId};

/// An opaque handle to a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutId(pub usize);

/// An opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// The kind of resource a layout slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    /// A uniform buffer.
    UniformBuffer {
        /// Whether the offset is supplied at bind time.
        has_dynamic_offset: bool,
        /// Minimum size of the bound range.
        min_binding_size: Option<u64>,
    },
    /// A sampled 2D float texture.
    Texture {
        /// Whether the texture may be sampled with a filtering sampler.
        filterable: bool,
    },
    /// A sampler.
    Sampler {
        /// Whether the sampler filters.
        filtering: bool,
    },
}

/// One slot of a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    /// Binding index in the shader.
    pub binding: u32,
    /// Stages that see the binding.
    pub visibility: ShaderStages,
    /// Resource kind.
    pub ty: BindingType,
}

/// Describes a bind group layout.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// The slots.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// A resource bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// A range of a buffer. `size: None` binds to the end.
    Buffer {
        /// The buffer.
        buffer: BufferId,
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        size: Option<u64>,
    },
    /// A texture view.
    TextureView(TextureViewId),
    /// A sampler.
    Sampler(SamplerId),
}

/// One bound resource of a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// Binding index in the shader.
    pub binding: u32,
    /// The resource.
    pub resource: BindingResource,
}

/// Describes a bind group.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Layout the group conforms to.
    pub layout: BindGroupLayoutId,
    /// Bound resources.
    pub entries: &'a [BindGroupEntry],
}
