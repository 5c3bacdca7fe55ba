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

//! Textures, views and samplers.

use crate::math::Extent3D;
use crate::relume_bitflags;
use std::borrow::Cow;

/// An opaque handle to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// An opaque handle to a view into a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// An opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub usize);

/// The texel formats the pipeline works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA, stored as is.
    Rgba8Unorm,
    /// 8-bit RGBA with sRGB decoding on sample.
    Rgba8UnormSrgb,
    /// 16-bit float RGBA, used for every HDR intermediate.
    Rgba16Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Depth32Float => 4,
        }
    }

    /// Whether this is a depth format.
    pub const fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

relume_bitflags! {
    /// How a texture may be used. Values match the native backend flags.
    pub struct TextureUsage: u32 {
        /// Source of a copy (read back).
        const COPY_SRC = 1 << 0;
        /// Destination of a copy or queue write.
        const COPY_DST = 1 << 1;
        /// Sampled from a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Color or depth attachment of a render pass.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Describes a 2D texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size, a single layer for every texture in the pipeline.
    pub size: Extent3D,
    /// Number of mip levels.
    pub mip_level_count: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

/// Describes a view into a texture. The default covers the whole texture.
#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Reinterpreting format, `None` keeps the texture's.
    pub format: Option<TextureFormat>,
}

/// Texture coordinate addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile.
    Repeat,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Bilinear.
    Linear,
}

/// Describes a sampler to create.
#[derive(Debug, Clone)]
pub struct SamplerDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Addressing along u.
    pub address_mode_u: AddressMode,
    /// Addressing along v.
    pub address_mode_v: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: FilterMode,
    /// Anisotropic filtering clamp, 1 disables it.
    pub anisotropy_clamp: u16,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            anisotropy_clamp: 1,
        }
    }
}
