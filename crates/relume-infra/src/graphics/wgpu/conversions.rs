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

use relume_core::math::{Extent3D, LinearRgba, Origin3D};
use relume_core::renderer::{
    AddressMode, BindingType, BlendComponent, BlendFactor, BlendState, ColorWrites,
    CompareFunction, Face, FilterMode, LoadOp, ShaderStages, StoreOp, TextureFormat,
    TextureUsage, VertexFormat,
};

/// A local extension trait to convert our renderer's types into WGPU-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

// --- Dimensions and Origins ---

impl IntoWgpu<wgpu::Extent3d> for Extent3D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }
}

impl IntoWgpu<wgpu::Origin3d> for Origin3D {
    fn into_wgpu(self) -> wgpu::Origin3d {
        wgpu::Origin3d {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

// --- Textures and samplers ---

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl IntoWgpu<wgpu::TextureUsages> for TextureUsage {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        wgpu::TextureUsages::from_bits_truncate(self.bits())
    }
}

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::MipmapFilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::MipmapFilterMode {
        match self {
            FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
            FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
        }
    }
}

// --- Bindings ---

impl IntoWgpu<wgpu::ShaderStages> for ShaderStages {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        let mut stages = wgpu::ShaderStages::NONE;
        if self.contains(ShaderStages::VERTEX) {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.contains(ShaderStages::FRAGMENT) {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        stages
    }
}

impl IntoWgpu<wgpu::BindingType> for BindingType {
    fn into_wgpu(self) -> wgpu::BindingType {
        match self {
            BindingType::UniformBuffer {
                has_dynamic_offset,
                min_binding_size,
            } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset,
                min_binding_size: min_binding_size.and_then(wgpu::BufferSize::new),
            },
            BindingType::Texture { filterable } => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            BindingType::Sampler { filtering } => wgpu::BindingType::Sampler(if filtering {
                wgpu::SamplerBindingType::Filtering
            } else {
                wgpu::SamplerBindingType::NonFiltering
            }),
        }
    }
}

// --- Pipeline state ---

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        }
    }
}

impl IntoWgpu<wgpu::BlendComponent> for BlendComponent {
    fn into_wgpu(self) -> wgpu::BlendComponent {
        wgpu::BlendComponent {
            src_factor: self.src_factor.into_wgpu(),
            dst_factor: self.dst_factor.into_wgpu(),
            operation: wgpu::BlendOperation::Add,
        }
    }
}

impl IntoWgpu<wgpu::BlendState> for BlendState {
    fn into_wgpu(self) -> wgpu::BlendState {
        wgpu::BlendState {
            color: self.color.into_wgpu(),
            alpha: self.alpha.into_wgpu(),
        }
    }
}

impl IntoWgpu<wgpu::ColorWrites> for ColorWrites {
    fn into_wgpu(self) -> wgpu::ColorWrites {
        wgpu::ColorWrites::from_bits_truncate(self.bits())
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<wgpu::Face> for Face {
    fn into_wgpu(self) -> wgpu::Face {
        match self {
            Face::Front => wgpu::Face::Front,
            Face::Back => wgpu::Face::Back,
        }
    }
}

// --- Passes ---

impl IntoWgpu<wgpu::Color> for LinearRgba {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<wgpu::Color>> for LoadOp<LinearRgba> {
    fn into_wgpu(self) -> wgpu::LoadOp<wgpu::Color> {
        match self {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(color) => wgpu::LoadOp::Clear(color.into_wgpu()),
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<f32>> for LoadOp<f32> {
    fn into_wgpu(self) -> wgpu::LoadOp<f32> {
        match self {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(depth) => wgpu::LoadOp::Clear(depth),
        }
    }
}

impl IntoWgpu<wgpu::StoreOp> for StoreOp {
    fn into_wgpu(self) -> wgpu::StoreOp {
        match self {
            StoreOp::Store => wgpu::StoreOp::Store,
            StoreOp::Discard => wgpu::StoreOp::Discard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_bits_match_native_flags() {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC;
        let native: wgpu::TextureUsages = usage.into_wgpu();
        assert_eq!(
            native,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        );
        let all: wgpu::ColorWrites = ColorWrites::ALL.into_wgpu();
        assert_eq!(all, wgpu::ColorWrites::ALL);
    }

    #[test]
    fn test_shader_stage_conversion() {
        let both: wgpu::ShaderStages = (ShaderStages::VERTEX | ShaderStages::FRAGMENT).into_wgpu();
        assert_eq!(both, wgpu::ShaderStages::VERTEX_FRAGMENT);
        let fragment: wgpu::ShaderStages = ShaderStages::FRAGMENT.into_wgpu();
        assert_eq!(fragment, wgpu::ShaderStages::FRAGMENT);
    }

    #[test]
    fn test_premultiplied_blend_conversion() {
        let blend: wgpu::BlendState = BlendState::PREMULTIPLIED_ALPHA_BLENDING.into_wgpu();
        assert_eq!(blend, wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING);
    }

    #[test]
    fn test_dynamic_uniform_binding_conversion() {
        let ty: wgpu::BindingType = BindingType::UniformBuffer {
            has_dynamic_offset: true,
            min_binding_size: Some(64),
        }
        .into_wgpu();
        assert_eq!(
            ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(64),
            }
        );
    }

    #[test]
    fn test_clear_ops_conversion() {
        let load: wgpu::LoadOp<wgpu::Color> = LoadOp::Clear(LinearRgba::BLACK).into_wgpu();
        assert_eq!(load, wgpu::LoadOp::Clear(wgpu::Color::BLACK));
        let depth: wgpu::LoadOp<f32> = LoadOp::Clear(1.0).into_wgpu();
        assert_eq!(depth, wgpu::LoadOp::Clear(1.0));
    }
}
