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

//! Render targets of the deferred pipeline.

use super::post_chain::BLOOM_CASCADE;
use super::ssao::NOISE_SIZE;
use relume_core::math::{Extent2D, Origin3D};
use relume_core::renderer::{
    GraphicsDevice, ResourceError, TextureDescriptor, TextureFormat, TextureId, TextureUsage,
    TextureViewDescriptor, TextureViewId,
};
use std::borrow::Cow;

/// Format of the G-buffer and every intermediate color buffer.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Format of the depth buffer.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Format of the final display image. Values are sRGB encoded by the shader.
pub const FINAL_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// A texture with its default view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// The texture.
    pub texture: TextureId,
    /// A view over it.
    pub view: TextureViewId,
    /// Its size.
    pub extent: Extent2D,
}

impl RenderTarget {
    /// Creates a single-mip 2D target.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        extent: Extent2D,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Result<Self, ResourceError> {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Owned(label.to_owned())),
            size: extent.to_3d(),
            mip_level_count: 1,
            format,
            usage,
        })?;
        let view = device.create_texture_view(texture, &TextureViewDescriptor::default())?;
        log::debug!(
            "Created render target '{}' ({}x{}, {:?})",
            label,
            extent.width,
            extent.height,
            format
        );
        Ok(Self {
            texture,
            view,
            extent,
        })
    }

    /// Destroys the view and the texture.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_texture_view(self.view) {
            log::warn!("Failed to destroy render target view: {e}");
        }
        if let Err(e) = device.destroy_texture(self.texture) {
            log::warn!("Failed to destroy render target: {e}");
        }
    }
}

/// Ping-pong pair of one bloom layer: `b` holds the horizontal pass, `a` the
/// layer result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomLayerTargets {
    /// Layer result.
    pub a: RenderTarget,
    /// Horizontal blur temp.
    pub b: RenderTarget,
}

/// Every display-sized buffer of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargets {
    /// Display size.
    pub extent: Extent2D,
    /// G-buffer albedo, premultiplied.
    pub albedo: RenderTarget,
    /// G-buffer emissive.
    pub emissive: RenderTarget,
    /// G-buffer face normal (xyz) and view depth (w).
    pub depth_normal: RenderTarget,
    /// Depth buffer.
    pub depth: RenderTarget,
    /// Ambient occlusion.
    pub occlusion: RenderTarget,
    /// Occlusion blur temp.
    pub post1: RenderTarget,
    /// Bloom bright pass.
    pub post2: RenderTarget,
    /// Lit color.
    pub working: RenderTarget,
    /// Final sRGB image.
    pub final_color: RenderTarget,
    /// Bloom cascade, largest first.
    pub bloom: Vec<BloomLayerTargets>,
}

impl RenderTargets {
    /// Allocates every target for a display size.
    pub fn new(device: &dyn GraphicsDevice, extent: Extent2D) -> Result<Self, ResourceError> {
        let sampled = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        let hdr = |label: &str| RenderTarget::new(device, label, extent, HDR_FORMAT, sampled);

        let mut bloom = Vec::with_capacity(BLOOM_CASCADE.len());
        for (i, layer) in BLOOM_CASCADE.iter().enumerate() {
            let size = extent.scaled_down(layer.divisor);
            bloom.push(BloomLayerTargets {
                a: RenderTarget::new(device, &format!("bloom_{i}_a"), size, HDR_FORMAT, sampled)?,
                b: RenderTarget::new(device, &format!("bloom_{i}_b"), size, HDR_FORMAT, sampled)?,
            });
        }

        Ok(Self {
            extent,
            albedo: hdr("gbuffer_albedo")?,
            emissive: hdr("gbuffer_emissive")?,
            depth_normal: RenderTarget::new(
                device,
                "gbuffer_depth_normal",
                extent,
                HDR_FORMAT,
                sampled | TextureUsage::COPY_SRC,
            )?,
            depth: RenderTarget::new(
                device,
                "gbuffer_depth",
                extent,
                DEPTH_FORMAT,
                TextureUsage::RENDER_ATTACHMENT,
            )?,
            occlusion: hdr("ssao_occlusion")?,
            post1: hdr("postbuffer_1")?,
            post2: hdr("postbuffer_2")?,
            working: RenderTarget::new(
                device,
                "working_color",
                extent,
                HDR_FORMAT,
                sampled | TextureUsage::COPY_SRC,
            )?,
            final_color: RenderTarget::new(
                device,
                "final_color",
                extent,
                FINAL_FORMAT,
                sampled | TextureUsage::COPY_SRC,
            )?,
            bloom,
        })
    }

    fn all(&self) -> impl Iterator<Item = &RenderTarget> {
        [
            &self.albedo,
            &self.emissive,
            &self.depth_normal,
            &self.depth,
            &self.occlusion,
            &self.post1,
            &self.post2,
            &self.working,
            &self.final_color,
        ]
        .into_iter()
        .chain(self.bloom.iter().flat_map(|l| [&l.a, &l.b]))
    }

    /// Destroys every target.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for target in self.all() {
            target.destroy(device);
        }
    }
}

/// Constant textures bound where an input is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeutralTextures {
    /// 1x1 opaque white: missing material maps, disabled occlusion.
    pub white: RenderTarget,
    /// 1x1 opaque black: bloom layers when bloom is off.
    pub black: RenderTarget,
    /// SSAO rotation noise.
    pub noise: RenderTarget,
}

impl NeutralTextures {
    /// Creates and uploads the textures.
    pub fn new(device: &dyn GraphicsDevice, noise_rgba8: &[u8]) -> Result<Self, ResourceError> {
        let usage = TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST;
        let one = Extent2D::new(1, 1);
        let noise_extent = Extent2D::new(NOISE_SIZE, NOISE_SIZE);
        let textures = Self {
            white: RenderTarget::new(device, "neutral_white", one, FINAL_FORMAT, usage)?,
            black: RenderTarget::new(device, "neutral_black", one, FINAL_FORMAT, usage)?,
            noise: RenderTarget::new(device, "ssao_noise", noise_extent, FINAL_FORMAT, usage)?,
        };
        let origin = Origin3D::default();
        device.write_texture(textures.white.texture, &[255; 4], 4, origin, one.to_3d())?;
        device.write_texture(textures.black.texture, &[0, 0, 0, 255], 4, origin, one.to_3d())?;
        device.write_texture(
            textures.noise.texture,
            noise_rgba8,
            NOISE_SIZE * 4,
            origin,
            noise_extent.to_3d(),
        )?;
        Ok(textures)
    }

    /// Destroys the textures.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for target in [&self.white, &self.black, &self.noise] {
            target.destroy(device);
        }
    }
}
