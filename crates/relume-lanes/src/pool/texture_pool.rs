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

//! Material textures, recycled by dimensions and color space.

use super::size_class::{SizeClassPool, SlotKey};
use relume_core::math::{Extent2D, Origin3D};
use relume_core::renderer::{
    AddressMode, FilterMode, GraphicsDevice, ResourceError, SamplerDescriptor, SamplerId,
    TextureDescriptor, TextureFormat, TextureId, TextureUsage, TextureViewDescriptor,
    TextureViewId,
};
use relume_core::RendererConfig;
use std::borrow::Cow;

/// How texel values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Color maps, decoded from sRGB on sample.
    Srgb,
    /// Data maps (displacement), sampled as stored.
    Linear,
}

impl ColorSpace {
    fn format(&self) -> TextureFormat {
        match self {
            ColorSpace::Srgb => TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => TextureFormat::Rgba8Unorm,
        }
    }
}

/// One pooled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledTexture {
    /// The texture.
    pub texture: TextureId,
    /// A view over all of it.
    pub view: TextureViewId,
    /// Its size.
    pub extent: Extent2D,
    /// Its color space.
    pub color_space: ColorSpace,
}

fn size_class(extent: Extent2D, color_space: ColorSpace) -> u64 {
    let space_bit = match color_space {
        ColorSpace::Srgb => 0,
        ColorSpace::Linear => 1,
    };
    ((extent.width as u64) << 33) | ((extent.height as u64) << 1) | space_bit
}

/// RGBA8 material textures plus the sampler they are all read with.
#[derive(Debug)]
pub struct TexturePool {
    pool: SizeClassPool<PooledTexture>,
    sampler: SamplerId,
}

impl TexturePool {
    /// Creates the pool and its sampler from the filtering options.
    pub fn new(device: &dyn GraphicsDevice, config: &RendererConfig) -> Result<Self, ResourceError> {
        let filter = if config.enable_texture_filtering {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        };
        // Anisotropy is only valid with linear filtering on every axis.
        let anisotropy_clamp = if config.enable_texture_filtering {
            config.anisotropy_clamp()
        } else {
            1
        };
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("material_sampler")),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            anisotropy_clamp,
        })?;
        log::debug!(
            "Material sampler created: {:?} filtering, anisotropy {}",
            filter,
            anisotropy_clamp
        );
        Ok(Self {
            pool: SizeClassPool::new(),
            sampler,
        })
    }

    /// The sampler shared by every material texture.
    pub fn sampler(&self) -> SamplerId {
        self.sampler
    }

    /// Returns a texture of the requested size and color space holding
    /// `rgba8`. A recycled texture is rewritten.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
        extent: Extent2D,
        color_space: ColorSpace,
        rgba8: &[u8],
    ) -> Result<SlotKey, ResourceError> {
        if rgba8.len() as u64 != extent.area() * 4 {
            return Err(ResourceError::OutOfBounds);
        }

        let key = self.pool.try_acquire(size_class(extent, color_space), || {
            let texture = device.create_texture(&TextureDescriptor {
                label: Some(Cow::Owned(format!(
                    "material_texture_{}x{}_{:?}",
                    extent.width, extent.height, color_space
                ))),
                size: extent.to_3d(),
                mip_level_count: 1,
                format: color_space.format(),
                usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            })?;
            let view = device.create_texture_view(texture, &TextureViewDescriptor::default())?;
            Ok::<_, ResourceError>(PooledTexture {
                texture,
                view,
                extent,
                color_space,
            })
        })?;

        if let Some(slot) = self.pool.get(key) {
            device.write_texture(
                slot.texture,
                rgba8,
                extent.width * 4,
                Origin3D::default(),
                extent.to_3d(),
            )?;
        }
        Ok(key)
    }

    /// Gives a texture back for reuse.
    pub fn release(&mut self, key: SlotKey) -> bool {
        self.pool.release(key)
    }

    /// A live texture.
    pub fn get(&self, key: SlotKey) -> Option<&PooledTexture> {
        self.pool.get(key)
    }

    /// Textures ever created.
    pub fn allocated(&self) -> usize {
        self.pool.len()
    }

    /// Destroys every texture and the sampler.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for slot in self.pool.values() {
            if let Err(e) = device.destroy_texture_view(slot.view) {
                log::warn!("TexturePool: failed to destroy view: {e}");
            }
            if let Err(e) = device.destroy_texture(slot.texture) {
                log::warn!("TexturePool: failed to destroy texture: {e}");
            }
        }
        if let Err(e) = device.destroy_sampler(self.sampler) {
            log::warn!("TexturePool: failed to destroy sampler: {e}");
        }
    }
}
