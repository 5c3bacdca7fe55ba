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

//! Render pipeline state.

use super::bind_group::BindGroupLayoutId;
use super::shader::ShaderModuleId;
use super::texture::TextureFormat;
use crate::relume_bitflags;

/// An opaque handle to a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineLayoutId(pub usize);

/// An opaque handle to a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub usize);

/// Describes a pipeline layout: the bind group layouts, in group order.
#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// One layout per bind group index.
    pub bind_group_layouts: &'a [BindGroupLayoutId],
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// Two `f32`.
    Float32x2,
    /// Three `f32`.
    Float32x3,
    /// Four `f32`.
    Float32x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
    /// `@location` in the shader.
    pub shader_location: u32,
}

/// Layout of one per-vertex buffer.
#[derive(Debug, Clone)]
pub struct VertexBufferLayout<'a> {
    /// Distance between consecutive vertices.
    pub array_stride: u64,
    /// The attributes.
    pub attributes: &'a [VertexAttribute],
}

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    /// `0`.
    Zero,
    /// `1`.
    One,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    OneMinusSrcAlpha,
}

/// Blend equation for one set of channels, always additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendComponent {
    /// Source multiplier.
    pub src_factor: BlendFactor,
    /// Destination multiplier.
    pub dst_factor: BlendFactor,
}

/// Blend state of a color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    /// Equation for rgb.
    pub color: BlendComponent,
    /// Equation for alpha.
    pub alpha: BlendComponent,
}

impl BlendState {
    /// `src + dst * (1 - src.a)`, for premultiplied colors.
    pub const PREMULTIPLIED_ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };
}

relume_bitflags! {
    /// Color channels written by a target.
    pub struct ColorWrites: u32 {
        /// Red.
        const RED = 1 << 0;
        /// Green.
        const GREEN = 1 << 1;
        /// Blue.
        const BLUE = 1 << 2;
        /// Alpha.
        const ALPHA = 1 << 3;
        /// Every channel.
        const ALL = 0b1111;
    }
}

/// One color output of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTargetState {
    /// Format of the attachment.
    pub format: TextureFormat,
    /// Blending, `None` replaces.
    pub blend: Option<BlendState>,
    /// Written channels.
    pub write_mask: ColorWrites,
}

/// Depth comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new depth is closer.
    Less,
    /// Passes if closer or equal.
    LessEqual,
    /// Always passes.
    Always,
}

/// Depth state of a pipeline. Stencil is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    /// Depth attachment format.
    pub format: TextureFormat,
    /// Whether passing fragments write depth.
    pub depth_write_enabled: bool,
    /// The depth test.
    pub depth_compare: CompareFunction,
}

/// Which face to cull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    /// Front faces.
    Front,
    /// Back faces.
    Back,
}

/// Describes a render pipeline drawing triangle lists.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Layout of the bind groups.
    pub layout: PipelineLayoutId,
    /// Module holding the vertex entry point.
    pub vertex_module: ShaderModuleId,
    /// Vertex entry point.
    pub vertex_entry_point: &'a str,
    /// Vertex buffer layouts, by slot.
    pub vertex_buffers: &'a [VertexBufferLayout<'a>],
    /// Module holding the fragment entry point.
    pub fragment_module: ShaderModuleId,
    /// Fragment entry point.
    pub fragment_entry_point: &'a str,
    /// Color outputs, by location.
    pub color_targets: &'a [ColorTargetState],
    /// Depth state, `None` without a depth attachment.
    pub depth_stencil: Option<DepthStencilState>,
    /// Culling, `None` draws both faces.
    pub cull_mode: Option<Face>,
}
