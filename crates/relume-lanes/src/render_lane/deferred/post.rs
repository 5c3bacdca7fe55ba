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

//! Post pass resources: samplers, parameter buffers and the bind groups that
//! wire render targets into the full screen passes.
//!
//! Everything here references the display-sized targets and is rebuilt when
//! they are.

use super::pipelines::PostLayouts;
use crate::render_lane::post_chain::{bloom_weights, BlurDirection, BLOOM_THRESHOLD};
use crate::render_lane::ssao::SsaoUniforms;
use crate::render_lane::targets::{NeutralTextures, RenderTargets};
use bytemuck::{Pod, Zeroable};
use relume_core::math::{Extent2D, LinearRgba, Vec3};
use relume_core::renderer::{
    AddressMode, BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId,
    BindingResource, BufferDescriptor, BufferId, BufferUsage, CommandEncoder, FilterMode,
    GraphicsDevice, Operations, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipelineId, ResourceError, SamplerDescriptor, SamplerId, TextureViewId,
};
use std::borrow::Cow;

/// Parameters of the blur shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    /// Direction divided by the target size.
    pub texel_step: [f32; 2],
    _pad: [f32; 2],
}

impl BlurUniforms {
    /// Parameters for a blur along `direction` into a `target` sized image.
    pub fn new(direction: BlurDirection, target: Extent2D) -> Self {
        Self {
            texel_step: direction.texel_step(target),
            _pad: [0.0; 2],
        }
    }
}

/// Parameters of the bright pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LowPassUniforms {
    /// Values above this feed the cascade.
    pub threshold: f32,
    _pad: [f32; 3],
}

/// Parameters of the final pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FinalUniforms {
    /// Weight of each bloom layer.
    pub weights: [f32; 4],
}

/// Samplers of the post passes. They do not depend on the display size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSamplers {
    /// Bilinear, clamp to edge.
    pub linear: SamplerId,
    /// Nearest, clamp to edge.
    pub nearest: SamplerId,
    /// Nearest, repeat: tiles the SSAO noise.
    pub noise: SamplerId,
}

impl PostSamplers {
    /// Creates the samplers.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let make = |label: &'static str, address: AddressMode, filter: FilterMode| {
            device.create_sampler(&SamplerDescriptor {
                label: Some(Cow::Borrowed(label)),
                address_mode_u: address,
                address_mode_v: address,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: FilterMode::Nearest,
                anisotropy_clamp: 1,
            })
        };
        Ok(Self {
            linear: make("post_linear_sampler", AddressMode::ClampToEdge, FilterMode::Linear)?,
            nearest: make("post_nearest_sampler", AddressMode::ClampToEdge, FilterMode::Nearest)?,
            noise: make("ssao_noise_sampler", AddressMode::Repeat, FilterMode::Nearest)?,
        })
    }

    /// Destroys the samplers.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for sampler in [self.linear, self.nearest, self.noise] {
            if let Err(e) = device.destroy_sampler(sampler) {
                log::warn!("PostSamplers: failed to destroy sampler: {e}");
            }
        }
    }
}

/// Bind groups of one bloom layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomLayerBindings {
    /// Horizontal blur reading the previous layer (or the bright pass).
    pub horizontal_from_previous: BindGroupId,
    /// Horizontal blur reading this layer's `a`, for repeated passes.
    pub horizontal_from_self: BindGroupId,
    /// Vertical blur reading this layer's `b`.
    pub vertical: BindGroupId,
}

/// Parameter buffers and bind groups of every post pass.
#[derive(Debug)]
pub struct PostBindings {
    /// Occlusion from depth/normal.
    pub ssao: BindGroupId,
    /// Occlusion blur, horizontal: occlusion to post buffer 1.
    pub ssao_blur_horizontal: BindGroupId,
    /// Occlusion blur, vertical: post buffer 1 to occlusion.
    pub ssao_blur_vertical: BindGroupId,
    /// Composite reading the occlusion buffer.
    pub composite_occluded: BindGroupId,
    /// Composite reading neutral white instead.
    pub composite_unoccluded: BindGroupId,
    /// Bright pass: working color to post buffer 2.
    pub low_pass: BindGroupId,
    /// Per cascade layer.
    pub bloom: Vec<BloomLayerBindings>,
    /// Final pass reading the bloom layers.
    pub final_bloom: BindGroupId,
    /// Final pass reading neutral black instead.
    pub final_plain: BindGroupId,
    buffers: Vec<BufferId>,
    groups: Vec<BindGroupId>,
}

struct Builder<'a> {
    device: &'a dyn GraphicsDevice,
    buffers: Vec<BufferId>,
    groups: Vec<BindGroupId>,
}

impl Builder<'_> {
    fn uniform_buffer(&mut self, label: &str, data: &[u8]) -> Result<BufferId, ResourceError> {
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(label.to_owned())),
            size: data.len() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        self.device.write_buffer(buffer, 0, data)?;
        self.buffers.push(buffer);
        Ok(buffer)
    }

    fn group(
        &mut self,
        label: &str,
        layout: BindGroupLayoutId,
        resources: &[BindingResource],
    ) -> Result<BindGroupId, ResourceError> {
        let entries: Vec<BindGroupEntry> = resources
            .iter()
            .enumerate()
            .map(|(binding, resource)| BindGroupEntry {
                binding: binding as u32,
                resource: *resource,
            })
            .collect();
        let group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })?;
        self.groups.push(group);
        Ok(group)
    }
}

fn whole(buffer: BufferId) -> BindingResource {
    BindingResource::Buffer {
        buffer,
        offset: 0,
        size: None,
    }
}

fn view(id: TextureViewId) -> BindingResource {
    BindingResource::TextureView(id)
}

impl PostBindings {
    /// Wires the targets into every post pass.
    pub fn new(
        device: &dyn GraphicsDevice,
        layouts: &PostLayouts,
        samplers: &PostSamplers,
        targets: &RenderTargets,
        neutral: &NeutralTextures,
        ssao_kernel: &[Vec3; crate::render_lane::ssao::KERNEL_SIZE],
    ) -> Result<Self, ResourceError> {
        let mut b = Builder {
            device,
            buffers: Vec::new(),
            groups: Vec::new(),
        };
        let linear = BindingResource::Sampler(samplers.linear);
        let extent = targets.extent;

        // Ambient occlusion
        let ssao_params = SsaoUniforms::new(ssao_kernel, extent);
        let ssao_buffer = b.uniform_buffer("ssao_params", bytemuck::bytes_of(&ssao_params))?;
        let ssao = b.group(
            "post_ssao",
            layouts.ssao,
            &[
                view(targets.depth_normal.view),
                view(neutral.noise.view),
                BindingResource::Sampler(samplers.nearest),
                BindingResource::Sampler(samplers.noise),
                whole(ssao_buffer),
            ],
        )?;

        let blur_h = BlurUniforms::new(BlurDirection::Horizontal, extent);
        let blur_v = BlurUniforms::new(BlurDirection::Vertical, extent);
        let blur_h = b.uniform_buffer("ssao_blur_h_params", bytemuck::bytes_of(&blur_h))?;
        let blur_v = b.uniform_buffer("ssao_blur_v_params", bytemuck::bytes_of(&blur_v))?;
        let ssao_blur_horizontal = b.group(
            "post_ssao_blur_h",
            layouts.single_source,
            &[view(targets.occlusion.view), linear, whole(blur_h)],
        )?;
        let ssao_blur_vertical = b.group(
            "post_ssao_blur_v",
            layouts.single_source,
            &[view(targets.post1.view), linear, whole(blur_v)],
        )?;

        // Composite
        let composite_occluded = b.group(
            "post_composite_occluded",
            layouts.composite,
            &[
                view(targets.albedo.view),
                view(targets.emissive.view),
                view(targets.occlusion.view),
                linear,
            ],
        )?;
        let composite_unoccluded = b.group(
            "post_composite_unoccluded",
            layouts.composite,
            &[
                view(targets.albedo.view),
                view(targets.emissive.view),
                view(neutral.white.view),
                linear,
            ],
        )?;

        // Bloom
        let low_pass_params = LowPassUniforms {
            threshold: BLOOM_THRESHOLD,
            _pad: [0.0; 3],
        };
        let low_pass_buffer =
            b.uniform_buffer("low_pass_params", bytemuck::bytes_of(&low_pass_params))?;
        let low_pass = b.group(
            "post_low_pass",
            layouts.single_source,
            &[view(targets.working.view), linear, whole(low_pass_buffer)],
        )?;

        let mut bloom = Vec::with_capacity(targets.bloom.len());
        let mut previous = targets.post2.view;
        for (i, layer) in targets.bloom.iter().enumerate() {
            let size = layer.a.extent;
            let h = BlurUniforms::new(BlurDirection::Horizontal, size);
            let v = BlurUniforms::new(BlurDirection::Vertical, size);
            let h = b.uniform_buffer(&format!("bloom_{i}_h_params"), bytemuck::bytes_of(&h))?;
            let v = b.uniform_buffer(&format!("bloom_{i}_v_params"), bytemuck::bytes_of(&v))?;
            bloom.push(BloomLayerBindings {
                horizontal_from_previous: b.group(
                    "post_bloom_h_first",
                    layouts.single_source,
                    &[view(previous), linear, whole(h)],
                )?,
                horizontal_from_self: b.group(
                    "post_bloom_h",
                    layouts.single_source,
                    &[view(layer.a.view), linear, whole(h)],
                )?,
                vertical: b.group(
                    "post_bloom_v",
                    layouts.single_source,
                    &[view(layer.b.view), linear, whole(v)],
                )?,
            });
            previous = layer.a.view;
        }

        // Final
        let final_params = FinalUniforms {
            weights: bloom_weights(),
        };
        let final_buffer = b.uniform_buffer("final_params", bytemuck::bytes_of(&final_params))?;
        let layer_view = |i: usize| {
            targets
                .bloom
                .get(i)
                .map_or(neutral.black.view, |layer| layer.a.view)
        };
        let final_bloom = b.group(
            "post_final_bloom",
            layouts.final_pass,
            &[
                view(targets.working.view),
                view(layer_view(0)),
                view(layer_view(1)),
                view(layer_view(2)),
                view(layer_view(3)),
                linear,
                whole(final_buffer),
            ],
        )?;
        let black = view(neutral.black.view);
        let final_plain = b.group(
            "post_final_plain",
            layouts.final_pass,
            &[
                view(targets.working.view),
                black,
                black,
                black,
                black,
                linear,
                whole(final_buffer),
            ],
        )?;

        log::debug!(
            "PostBindings: {} bind groups, {} parameter buffers for {}x{}",
            b.groups.len(),
            b.buffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            ssao,
            ssao_blur_horizontal,
            ssao_blur_vertical,
            composite_occluded,
            composite_unoccluded,
            low_pass,
            bloom,
            final_bloom,
            final_plain,
            buffers: b.buffers,
            groups: b.groups,
        })
    }

    /// Destroys every bind group and buffer.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for group in &self.groups {
            if let Err(e) = device.destroy_bind_group(*group) {
                log::warn!("PostBindings: failed to destroy bind group: {e}");
            }
        }
        for buffer in &self.buffers {
            if let Err(e) = device.destroy_buffer(*buffer) {
                log::warn!("PostBindings: failed to destroy buffer: {e}");
            }
        }
    }
}

/// Records one full screen pass: clear `target`, draw a triangle.
pub fn fullscreen_pass(
    encoder: &mut dyn CommandEncoder,
    label: &str,
    pipeline: &RenderPipelineId,
    bind_group: &BindGroupId,
    target: &TextureViewId,
) {
    let color_attachments = [RenderPassColorAttachment {
        view: target,
        ops: Operations::clear(LinearRgba::TRANSPARENT),
    }];
    let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(label),
        color_attachments: &color_attachments,
        depth_stencil_attachment: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}
