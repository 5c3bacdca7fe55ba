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

//! Command buffers and render pass descriptors.

use super::texture::TextureViewId;
use crate::math::LinearRgba;

/// An opaque handle to a finished command buffer, ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// What happens to an attachment when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Keep the existing contents.
    Load,
    /// Clear to the given value.
    Clear(V),
}

/// What happens to an attachment when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Keep the results.
    Store,
    /// Discard the results.
    Discard,
}

/// Load and store operations of one attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// At pass start.
    pub load: LoadOp<V>,
    /// At pass end.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clear on load, store at the end.
    pub const fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Load existing contents, store at the end.
    pub const fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassColorAttachment<'a> {
    /// The view rendered to.
    pub view: &'a TextureViewId,
    /// Load and store operations.
    pub ops: Operations<LinearRgba>,
}

/// The depth attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassDepthStencilAttachment<'a> {
    /// The depth view.
    pub view: &'a TextureViewId,
    /// Depth load and store operations.
    pub depth_ops: Option<Operations<f32>>,
}

/// Describes a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Color attachments, by location.
    pub color_attachments: &'a [RenderPassColorAttachment<'a>],
    /// Optional depth attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a>>,
}
