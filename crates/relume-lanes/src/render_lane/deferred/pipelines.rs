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

//! Bind group layouts, shader modules and pipelines of the deferred renderer.

use crate::batch::Vertex;
use crate::render_lane::material_binder::MaterialUniforms;
use crate::render_lane::shaders::{
    post_shader_source, COMPOSITE_WGSL, GAME_PASS_WGSL, GAUSS3_WGSL, GAUSS7_WGSL, LOW_PASS_WGSL,
    SSAO_WGSL, TO_SRGB_WGSL,
};
use crate::render_lane::targets::{DEPTH_FORMAT, FINAL_FORMAT, HDR_FORMAT};
use relume_core::renderer::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId, BindingType, BlendState,
    ColorTargetState, ColorWrites, CompareFunction, DepthStencilState, GraphicsDevice,
    PipelineLayoutDescriptor, PipelineLayoutId, RenderError, RenderPipelineDescriptor,
    RenderPipelineId, ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData, ShaderStages,
    TextureFormat, VertexAttribute, VertexBufferLayout, VertexFormat,
};
use std::borrow::Cow;

/// Vertex attributes of [`Vertex`], in shader location order.
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32x2,
        offset: 16,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 24,
        shader_location: 2,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 40,
        shader_location: 3,
    },
];

fn texture(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture { filterable: true },
    }
}

fn sampler(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler { filtering: true },
    }
}

fn uniform(binding: u32, visibility: ShaderStages, dynamic: Option<u64>) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::UniformBuffer {
            has_dynamic_offset: dynamic.is_some(),
            min_binding_size: dynamic,
        },
    }
}

/// Layouts of the game passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLayouts {
    /// Group 0: frame uniforms.
    pub frame: BindGroupLayoutId,
    /// Group 1: albedo, emissive and displacement maps plus the sampler.
    pub material_textures: BindGroupLayoutId,
    /// Group 2: material uniforms, dynamic offset.
    pub material_uniforms: BindGroupLayoutId,
}

/// Layouts of the post passes. Each post pass binds one group at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLayouts {
    /// Depth/normal, noise, two samplers, kernel uniforms.
    pub ssao: BindGroupLayoutId,
    /// Source, sampler, parameters: blurs and the bright pass.
    pub single_source: BindGroupLayoutId,
    /// Albedo, emissive, occlusion, sampler.
    pub composite: BindGroupLayoutId,
    /// Working color, four bloom layers, sampler, weights.
    pub final_pass: BindGroupLayoutId,
}

/// Every GPU object the deferred renderer creates once.
#[derive(Debug)]
pub struct DeferredPipelines {
    /// Game pass layouts.
    pub game_layouts: GameLayouts,
    /// Post pass layouts.
    pub post_layouts: PostLayouts,
    /// G-buffer fill: three targets, depth write on.
    pub gbuffer: RenderPipelineId,
    /// Translucent world geometry over the working buffer, depth write off.
    pub transparency_blended: RenderPipelineId,
    /// Foreground geometry over the working buffer, depth write on.
    pub transparency_depth_write: RenderPipelineId,
    /// Occlusion from depth/normal.
    pub ssao: RenderPipelineId,
    /// 3-tap blur.
    pub gauss3: RenderPipelineId,
    /// Lit color.
    pub composite: RenderPipelineId,
    /// Bloom bright pass.
    pub low_pass: RenderPipelineId,
    /// 7-tap blur.
    pub gauss7: RenderPipelineId,
    /// sRGB conversion with bloom.
    pub to_srgb: RenderPipelineId,
    shader_modules: Vec<ShaderModuleId>,
    pipeline_layouts: Vec<PipelineLayoutId>,
}

impl DeferredPipelines {
    /// Creates layouts, compiles the shaders and builds every pipeline.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, RenderError> {
        log::info!("DeferredPipelines: Initializing GPU resources...");

        // 1. Bind group layouts
        let game_layouts = GameLayouts {
            frame: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("game_frame_layout"),
                entries: &[uniform(
                    0,
                    ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    None,
                )],
            })?,
            material_textures: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("game_material_textures_layout"),
                entries: &[texture(0), texture(1), texture(2), sampler(3)],
            })?,
            material_uniforms: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("game_material_uniforms_layout"),
                entries: &[uniform(
                    0,
                    ShaderStages::FRAGMENT,
                    Some(MaterialUniforms::SIZE as u64),
                )],
            })?,
        };

        let post_layouts = PostLayouts {
            ssao: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("post_ssao_layout"),
                entries: &[
                    texture(0),
                    texture(1),
                    sampler(2),
                    sampler(3),
                    uniform(4, ShaderStages::FRAGMENT, None),
                ],
            })?,
            single_source: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("post_single_source_layout"),
                entries: &[texture(0), sampler(1), uniform(2, ShaderStages::FRAGMENT, None)],
            })?,
            composite: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("post_composite_layout"),
                entries: &[texture(0), texture(1), texture(2), sampler(3)],
            })?,
            final_pass: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("post_final_layout"),
                entries: &[
                    texture(0),
                    texture(1),
                    texture(2),
                    texture(3),
                    texture(4),
                    sampler(5),
                    uniform(6, ShaderStages::FRAGMENT, None),
                ],
            })?,
        };

        let mut shader_modules = Vec::new();
        let mut pipeline_layouts = Vec::new();

        // 2. Game passes
        let game_shader = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some("game_pass_shader"),
            source: ShaderSourceData::Wgsl(Cow::Borrowed(GAME_PASS_WGSL)),
        })?;
        shader_modules.push(game_shader);

        let game_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("game_pipeline_layout"),
            bind_group_layouts: &[
                game_layouts.frame,
                game_layouts.material_textures,
                game_layouts.material_uniforms,
            ],
        })?;
        pipeline_layouts.push(game_layout);

        let vertex_buffers = [VertexBufferLayout {
            array_stride: Vertex::STRIDE,
            attributes: &VERTEX_ATTRIBUTES,
        }];
        let blended_target = |format: TextureFormat| ColorTargetState {
            format,
            blend: Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            write_mask: ColorWrites::ALL,
        };
        // Emissive and depth+normal are plain values: a later fragment replaces them.
        let replace_target = |format: TextureFormat| ColorTargetState {
            format,
            blend: None,
            write_mask: ColorWrites::ALL,
        };
        let depth = |depth_write_enabled: bool| DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare: CompareFunction::Less,
        };

        let gbuffer = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("gbuffer_pipeline"),
            layout: game_layout,
            vertex_module: game_shader,
            vertex_entry_point: "vs_main",
            vertex_buffers: &vertex_buffers,
            fragment_module: game_shader,
            fragment_entry_point: "fs_gbuffer",
            color_targets: &[
                blended_target(HDR_FORMAT),
                replace_target(HDR_FORMAT),
                replace_target(HDR_FORMAT),
            ],
            depth_stencil: Some(depth(true)),
            cull_mode: None,
        })?;

        let transparency_blended = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("transparency_blended_pipeline"),
            layout: game_layout,
            vertex_module: game_shader,
            vertex_entry_point: "vs_main",
            vertex_buffers: &vertex_buffers,
            fragment_module: game_shader,
            fragment_entry_point: "fs_transparency",
            color_targets: &[blended_target(HDR_FORMAT)],
            depth_stencil: Some(depth(false)),
            cull_mode: None,
        })?;

        let transparency_depth_write = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("transparency_depth_write_pipeline"),
            layout: game_layout,
            vertex_module: game_shader,
            vertex_entry_point: "vs_main",
            vertex_buffers: &vertex_buffers,
            fragment_module: game_shader,
            fragment_entry_point: "fs_transparency",
            color_targets: &[blended_target(HDR_FORMAT)],
            depth_stencil: Some(depth(true)),
            cull_mode: None,
        })?;

        // 3. Post passes
        let mut post = |label: &'static str,
                        layout: BindGroupLayoutId,
                        fragment: &str,
                        entry: &'static str,
                        format: TextureFormat|
         -> Result<RenderPipelineId, RenderError> {
            let source = post_shader_source(fragment);
            let module = device.create_shader_module(&ShaderModuleDescriptor {
                label: Some(label),
                source: ShaderSourceData::Wgsl(Cow::Owned(source)),
            })?;
            shader_modules.push(module);
            let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
            })?;
            pipeline_layouts.push(pipeline_layout);
            Ok(device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(label),
                layout: pipeline_layout,
                vertex_module: module,
                vertex_entry_point: "vs_fullscreen",
                vertex_buffers: &[],
                fragment_module: module,
                fragment_entry_point: entry,
                color_targets: &[ColorTargetState {
                    format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                }],
                depth_stencil: None,
                cull_mode: None,
            })?)
        };

        let ssao = post("post_ssao", post_layouts.ssao, SSAO_WGSL, "fs_ssao", HDR_FORMAT)?;
        let gauss3 = post(
            "post_gauss3",
            post_layouts.single_source,
            GAUSS3_WGSL,
            "fs_gauss3",
            HDR_FORMAT,
        )?;
        let composite = post(
            "post_composite",
            post_layouts.composite,
            COMPOSITE_WGSL,
            "fs_composite",
            HDR_FORMAT,
        )?;
        let low_pass = post(
            "post_low_pass",
            post_layouts.single_source,
            LOW_PASS_WGSL,
            "fs_low_pass",
            HDR_FORMAT,
        )?;
        let gauss7 = post(
            "post_gauss7",
            post_layouts.single_source,
            GAUSS7_WGSL,
            "fs_gauss7",
            HDR_FORMAT,
        )?;
        let to_srgb = post(
            "post_to_srgb",
            post_layouts.final_pass,
            TO_SRGB_WGSL,
            "fs_to_srgb",
            FINAL_FORMAT,
        )?;

        log::info!(
            "DeferredPipelines: GPU resources initialized ({} shader modules)",
            shader_modules.len()
        );

        Ok(Self {
            game_layouts,
            post_layouts,
            gbuffer,
            transparency_blended,
            transparency_depth_write,
            ssao,
            gauss3,
            composite,
            low_pass,
            gauss7,
            to_srgb,
            shader_modules,
            pipeline_layouts,
        })
    }

    /// Destroys every pipeline, layout and shader module.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for pipeline in [
            self.gbuffer,
            self.transparency_blended,
            self.transparency_depth_write,
            self.ssao,
            self.gauss3,
            self.composite,
            self.low_pass,
            self.gauss7,
            self.to_srgb,
        ] {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("DeferredPipelines: failed to destroy pipeline: {e}");
            }
        }
        for layout in &self.pipeline_layouts {
            if let Err(e) = device.destroy_pipeline_layout(*layout) {
                log::warn!("DeferredPipelines: failed to destroy pipeline layout: {e}");
            }
        }
        for layout in [
            self.game_layouts.frame,
            self.game_layouts.material_textures,
            self.game_layouts.material_uniforms,
            self.post_layouts.ssao,
            self.post_layouts.single_source,
            self.post_layouts.composite,
            self.post_layouts.final_pass,
        ] {
            if let Err(e) = device.destroy_bind_group_layout(layout) {
                log::warn!("DeferredPipelines: failed to destroy bind group layout: {e}");
            }
        }
        for module in &self.shader_modules {
            if let Err(e) = device.destroy_shader_module(*module) {
                log::warn!("DeferredPipelines: failed to destroy shader module: {e}");
            }
        }
    }
}
