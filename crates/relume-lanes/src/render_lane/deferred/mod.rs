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

//! The deferred renderer: from interpreted command streams to a final image.
//!
//! # Frame
//!
//! The host submits any number of execute buffers, then calls
//! [`DeferredRenderer::present`]. Presenting flushes the four triangle streams
//! into the active set of vertex buffers and records the ordered pass list of
//! [`passes::FRAME_PASSES`]:
//!
//! 1. **G-buffer**: every stream, forced opaque, into albedo, emissive and
//!    depth/normal targets.
//! 2. **Ambient occlusion** (optional): hemisphere sampling of depth/normal,
//!    then a separable 3-tap blur.
//! 3. **Composite**: `albedo * occlusion + emissive` into the working buffer.
//! 4. **Transparency**: translucent world geometry blended over the working
//!    buffer, then the foreground overlay over a cleared depth buffer.
//! 5. **Bloom** (optional): bright pass and a four layer blur cascade.
//! 6. **Final**: sRGB conversion of working color plus weighted bloom.
//!
//! The final image is handed back as a texture, see [`FrameOutput`].

pub mod passes;
pub mod pipelines;
pub mod post;

use self::passes::{planned_passes, PassKind};
use self::pipelines::DeferredPipelines;
use self::post::{fullscreen_pass, PostBindings, PostSamplers};
use super::batch_draw::{self, DrawRun};
use super::material_binder::{MaterialBindCommands, MaterialBinder};
use super::post_chain::BLOOM_CASCADE;
use super::ssao::{self, KERNEL_SIZE};
use super::targets::{NeutralTextures, RenderTargets};
use crate::batch::{FrameBatches, StreamKind};
use crate::command_lane::{CommandInterpreter, ExecuteReport, ScreenTransform, TlVertex, Viewport};
use crate::pool::{ColorSpace, FrameVertexStorage, PooledTexture, SlotKey, TexturePool};
use bytemuck::{Pod, Zeroable};
use relume_core::asset::MaterialTable;
use relume_core::math::{Extent2D, LinearRgba, Vec3};
use relume_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindingResource, BufferDescriptor,
    BufferId, BufferUsage, CommandEncoder, GraphicsDevice, Operations, RenderError, RenderPass,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    ResourceError, TextureId, TextureViewId,
};
use relume_core::RendererConfig;
use std::borrow::Cow;
use std::sync::Arc;

/// Bind group index of the frame uniforms in the game pipelines.
pub const FRAME_GROUP: u32 = 0;

/// Per-frame parameters of the game passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Display size in pixels.
    pub screen_size: [f32; 2],
    /// 1 when parallax mapping is enabled.
    pub parallax_enabled: f32,
    _pad: f32,
}

/// What a presented frame produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Triangles per stream, in [`StreamKind::ALL`] order.
    pub triangles: [usize; 4],
    /// Game pass draw calls.
    pub draw_calls: usize,
    /// Passes recorded.
    pub passes: usize,
}

/// The final image of a presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutput {
    /// `Rgba8Unorm` texture holding sRGB encoded values.
    pub texture: TextureId,
    /// View over `texture`.
    pub view: TextureViewId,
    /// Display size.
    pub extent: Extent2D,
    /// Index of the frame, starting at zero.
    pub frame_index: u64,
    /// Counters of the frame.
    pub stats: FrameStats,
}

/// Renders legacy command streams through the deferred pipeline.
///
/// Owns the interpreter, the frame's batches and every GPU resource; the
/// material table is queried, never mutated.
pub struct DeferredRenderer<M: MaterialTable> {
    device: Arc<dyn GraphicsDevice>,
    config: RendererConfig,
    materials: M,
    interpreter: CommandInterpreter,
    batches: FrameBatches,
    last_triangles: [usize; 4],
    vertex_storage: FrameVertexStorage,
    textures: TexturePool,
    binder: MaterialBinder,
    pipelines: DeferredPipelines,
    samplers: PostSamplers,
    neutral: NeutralTextures,
    ssao_kernel: [Vec3; KERNEL_SIZE],
    targets: RenderTargets,
    post: PostBindings,
    frame_buffer: BufferId,
    frame_group: BindGroupId,
    frame_index: u64,
}

impl<M: MaterialTable> std::fmt::Debug for DeferredRenderer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredRenderer")
            .field("display", &self.targets.extent)
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

struct PreparedStream {
    buffer: Option<BufferId>,
    runs: Vec<DrawRun>,
}

fn bind_runs(
    binder: &mut MaterialBinder,
    device: &dyn GraphicsDevice,
    materials: &dyn MaterialTable,
    runs: &[DrawRun],
    force_opaque: bool,
    posterize: bool,
) -> Result<Vec<MaterialBindCommands>, ResourceError> {
    runs.iter()
        .map(|run| binder.bind(device, materials, run.material, force_opaque, posterize))
        .collect()
}

fn draw_stream(
    pass: &mut dyn RenderPass<'_>,
    stream: &PreparedStream,
    bindings: &[MaterialBindCommands],
) -> usize {
    match stream.buffer {
        Some(buffer) if !stream.runs.is_empty() => {
            batch_draw::draw(pass, &buffer, &stream.runs, bindings);
            stream.runs.len()
        }
        _ => 0,
    }
}

impl<M: MaterialTable> DeferredRenderer<M> {
    /// Creates the renderer and every GPU resource for `config`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        config: RendererConfig,
        materials: M,
    ) -> Result<Self, RenderError> {
        let display = config.display_extent();
        if display.width == 0 || display.height == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "display resolution {}x{} is empty",
                display.width, display.height
            )));
        }
        log::info!(
            "DeferredRenderer: display {}x{}, internal {:?}, ssao {}, bloom {}",
            display.width,
            display.height,
            config.effective_internal_resolution(),
            config.enable_ssao,
            config.enable_bloom
        );

        let dev = device.as_ref();
        let pipelines = DeferredPipelines::new(dev)?;
        let textures = TexturePool::new(dev, &config)?;
        let (ssao_kernel, noise) = ssao::default_inputs();
        let neutral = NeutralTextures::new(dev, &noise)?;
        let samplers = PostSamplers::new(dev)?;
        let targets = RenderTargets::new(dev, display)?;
        let post = PostBindings::new(
            dev,
            &pipelines.post_layouts,
            &samplers,
            &targets,
            &neutral,
            &ssao_kernel,
        )?;
        let binder = MaterialBinder::new(
            dev,
            pipelines.game_layouts.material_textures,
            pipelines.game_layouts.material_uniforms,
            textures.sampler(),
            neutral.white.view,
        )?;

        let frame_buffer = dev.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("frame_uniforms")),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        let frame_group = dev.create_bind_group(&BindGroupDescriptor {
            label: Some("frame_uniforms"),
            layout: pipelines.game_layouts.frame,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer: frame_buffer,
                    offset: 0,
                    size: None,
                },
            }],
        })?;

        let transform = ScreenTransform::new(display, config.effective_internal_resolution());

        Ok(Self {
            device,
            config,
            materials,
            interpreter: CommandInterpreter::new(transform),
            batches: FrameBatches::new(),
            last_triangles: [0; 4],
            vertex_storage: FrameVertexStorage::new(),
            textures,
            binder,
            pipelines,
            samplers,
            neutral,
            ssao_kernel,
            targets,
            post,
            frame_buffer,
            frame_group,
            frame_index: 0,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The device everything is created on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The material table.
    pub fn materials(&self) -> &M {
        &self.materials
    }

    /// The material table, for the host to add or release materials between
    /// frames.
    pub fn materials_mut(&mut self) -> &mut M {
        &mut self.materials
    }

    /// The interpreter and its screen transform.
    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    /// Triangles collected since the last present.
    pub fn batches(&self) -> &FrameBatches {
        &self.batches
    }

    /// Display-sized buffers of the pipeline. Contents are those of the last
    /// presented frame.
    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    /// Current display size.
    pub fn display_extent(&self) -> Extent2D {
        self.targets.extent
    }

    /// Uploads a material texture through the texture pool.
    pub fn upload_texture(
        &mut self,
        extent: Extent2D,
        color_space: ColorSpace,
        rgba8: &[u8],
    ) -> Result<SlotKey, ResourceError> {
        self.textures
            .acquire(self.device.as_ref(), extent, color_space, rgba8)
    }

    /// A live material texture.
    pub fn texture(&self, key: SlotKey) -> Option<&PooledTexture> {
        self.textures.get(key)
    }

    /// Returns a material texture to the pool.
    pub fn release_texture(&mut self, key: SlotKey) -> bool {
        self.textures.release(key)
    }

    /// Starts collecting a frame: resets the render state and reserves
    /// stream storage from the previous frame's triangle counts.
    pub fn begin_submission(&mut self) {
        self.interpreter.reset_state();
        for kind in StreamKind::ALL {
            self.batches[kind].reserve_for_frame(self.last_triangles[kind.index()]);
        }
    }

    /// Interprets one execute buffer into the frame's batches.
    pub fn execute(
        &mut self,
        buffer: &[u8],
        vertices: &[TlVertex],
        viewport: &Viewport,
    ) -> ExecuteReport {
        let report = self
            .interpreter
            .execute(buffer, vertices, viewport, &mut self.batches);
        if !report.is_clean() {
            log::debug!(
                "Execute buffer finished with {} diagnostics",
                report.diagnostics.len()
            );
        }
        report
    }

    /// Renders the collected triangles and returns the final image.
    ///
    /// The render state is reset and the batches cleared whether or not
    /// rendering succeeded.
    pub fn present(&mut self) -> Result<FrameOutput, RenderError> {
        let result = self.render_frame();
        self.interpreter.reset_state();
        for kind in StreamKind::ALL {
            self.last_triangles[kind.index()] = self.batches[kind].len();
        }
        self.batches.clear_all();
        if let Err(e) = &result {
            log::error!("Frame {} failed: {e}", self.frame_index);
        }
        result
    }

    /// Reallocates the display-sized targets and updates the screen
    /// transform.
    pub fn resize(&mut self, display: Extent2D) -> Result<(), RenderError> {
        if display.width == 0 || display.height == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "display resolution {}x{} is empty",
                display.width, display.height
            )));
        }
        if display == self.targets.extent {
            return Ok(());
        }
        log::info!(
            "DeferredRenderer: resizing from {}x{} to {}x{}",
            self.targets.extent.width,
            self.targets.extent.height,
            display.width,
            display.height
        );

        let device = self.device.as_ref();
        let targets = RenderTargets::new(device, display)?;
        let post = PostBindings::new(
            device,
            &self.pipelines.post_layouts,
            &self.samplers,
            &targets,
            &self.neutral,
            &self.ssao_kernel,
        )?;
        self.post.destroy(device);
        self.targets.destroy(device);
        self.targets = targets;
        self.post = post;

        self.config.resolution = (display.width, display.height);
        self.interpreter.set_transform(ScreenTransform::new(
            display,
            self.config.effective_internal_resolution(),
        ));
        Ok(())
    }

    /// Copies a presented image back to memory, tightly packed RGBA8 rows.
    pub fn read_back(&self, output: &FrameOutput) -> Result<Vec<u8>, RenderError> {
        Ok(self.device.read_texture(output.texture, output.extent)?)
    }

    fn render_frame(&mut self) -> Result<FrameOutput, RenderError> {
        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        let posterize = self.config.enable_posterized_lighting;

        self.vertex_storage.swap_next();
        self.batches.sort_transparent();

        let mut prepared = Vec::with_capacity(StreamKind::ALL.len());
        let mut triangles = [0; 4];
        for kind in StreamKind::ALL {
            let batch = &self.batches[kind];
            batch_draw::fill(device, batch, &mut self.vertex_storage, kind)?;
            triangles[kind.index()] = batch.len();
            prepared.push(PreparedStream {
                buffer: self.vertex_storage.current(kind).buffer,
                runs: batch_draw::plan_draws(batch),
            });
        }
        let streams: &[PreparedStream] = &prepared;
        let stream = move |kind: StreamKind| &streams[kind.index()];

        let binds = |kind: StreamKind| stream(kind).runs.len() as u32;
        let expected = StreamKind::ALL.iter().map(|k| binds(*k)).sum::<u32>()
            + binds(StreamKind::WorldTransparent)
            + binds(StreamKind::ForegroundOpaque)
            + 2 * binds(StreamKind::ForegroundTransparent);
        self.binder.begin_frame(device, expected)?;

        let materials: &dyn MaterialTable = &self.materials;
        let mut opaque_binds = Vec::with_capacity(StreamKind::ALL.len());
        for kind in StreamKind::ALL {
            opaque_binds.push(bind_runs(
                &mut self.binder,
                device,
                materials,
                &stream(kind).runs,
                true,
                posterize,
            )?);
        }
        let blended_binds = |binder: &mut MaterialBinder, kind: StreamKind| {
            bind_runs(binder, device, materials, &stream(kind).runs, false, posterize)
        };
        let world_transparent = blended_binds(&mut self.binder, StreamKind::WorldTransparent)?;
        let foreground_transparent =
            blended_binds(&mut self.binder, StreamKind::ForegroundTransparent)?;

        let frame = FrameUniforms {
            screen_size: [
                self.targets.extent.width as f32,
                self.targets.extent.height as f32,
            ],
            parallax_enabled: if self.config.enable_parallax { 1.0 } else { 0.0 },
            _pad: 0.0,
        };
        device.write_buffer(self.frame_buffer, 0, bytemuck::bytes_of(&frame))?;

        let passes = planned_passes(&self.config);
        let mut draw_calls = 0;
        let mut encoder = device.create_command_encoder(Some("relume_frame"));
        for pass in &passes {
            log::trace!("Frame {}: {:?}", self.frame_index, pass);
            match pass {
                PassKind::GBuffer => {
                    draw_calls += self.encode_gbuffer(encoder.as_mut(), streams, &opaque_binds);
                }
                PassKind::AmbientOcclusion => self.encode_ambient_occlusion(encoder.as_mut()),
                PassKind::Composite => self.encode_composite(encoder.as_mut()),
                PassKind::Transparency => {
                    draw_calls += self.encode_transparency(
                        encoder.as_mut(),
                        streams,
                        &world_transparent,
                        &opaque_binds,
                        &foreground_transparent,
                    );
                }
                PassKind::Bloom => self.encode_bloom(encoder.as_mut()),
                PassKind::Final => self.encode_final(encoder.as_mut()),
            }
        }
        device.submit_command_buffer(encoder.finish());

        let output = FrameOutput {
            texture: self.targets.final_color.texture,
            view: self.targets.final_color.view,
            extent: self.targets.extent,
            frame_index: self.frame_index,
            stats: FrameStats {
                triangles,
                draw_calls,
                passes: passes.len(),
            },
        };
        log::debug!(
            "Frame {} presented: {:?} triangles, {} draw calls",
            self.frame_index,
            triangles,
            draw_calls
        );
        self.frame_index += 1;
        Ok(output)
    }

    fn encode_gbuffer(
        &self,
        encoder: &mut dyn CommandEncoder,
        streams: &[PreparedStream],
        binds: &[Vec<MaterialBindCommands>],
    ) -> usize {
        let t = &self.targets;
        let color_attachments = [
            RenderPassColorAttachment {
                view: &t.albedo.view,
                ops: Operations::clear(LinearRgba::TRANSPARENT),
            },
            RenderPassColorAttachment {
                view: &t.emissive.view,
                ops: Operations::clear(LinearRgba::TRANSPARENT),
            },
            RenderPassColorAttachment {
                view: &t.depth_normal.view,
                ops: Operations::clear(LinearRgba::TRANSPARENT),
            },
        ];
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("gbuffer"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &t.depth.view,
                depth_ops: Some(Operations::clear(1.0)),
            }),
        });
        pass.set_pipeline(&self.pipelines.gbuffer);
        pass.set_bind_group(FRAME_GROUP, &self.frame_group, &[]);

        let mut draws = 0;
        for kind in StreamKind::ALL {
            draws += draw_stream(pass.as_mut(), &streams[kind.index()], &binds[kind.index()]);
        }
        draws
    }

    fn encode_ambient_occlusion(&self, encoder: &mut dyn CommandEncoder) {
        let (p, b, t) = (&self.pipelines, &self.post, &self.targets);
        fullscreen_pass(encoder, "ssao", &p.ssao, &b.ssao, &t.occlusion.view);
        fullscreen_pass(encoder, "ssao_blur_h", &p.gauss3, &b.ssao_blur_horizontal, &t.post1.view);
        fullscreen_pass(encoder, "ssao_blur_v", &p.gauss3, &b.ssao_blur_vertical, &t.occlusion.view);
    }

    fn encode_composite(&self, encoder: &mut dyn CommandEncoder) {
        let group = if self.config.enable_ssao {
            &self.post.composite_occluded
        } else {
            &self.post.composite_unoccluded
        };
        fullscreen_pass(
            encoder,
            "composite",
            &self.pipelines.composite,
            group,
            &self.targets.working.view,
        );
    }

    fn encode_transparency(
        &self,
        encoder: &mut dyn CommandEncoder,
        streams: &[PreparedStream],
        world_transparent: &[MaterialBindCommands],
        opaque_binds: &[Vec<MaterialBindCommands>],
        foreground_transparent: &[MaterialBindCommands],
    ) -> usize {
        let t = &self.targets;
        let color_attachments = [RenderPassColorAttachment {
            view: &t.working.view,
            ops: Operations::load(),
        }];
        let stream = move |kind: StreamKind| &streams[kind.index()];
        let mut draws = 0;

        // Translucent world geometry, tested against the G-buffer depth.
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("transparency_world"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &t.depth.view,
                    depth_ops: Some(Operations::load()),
                }),
            });
            pass.set_pipeline(&self.pipelines.transparency_blended);
            pass.set_bind_group(FRAME_GROUP, &self.frame_group, &[]);
            draws += draw_stream(
                pass.as_mut(),
                stream(StreamKind::WorldTransparent),
                world_transparent,
            );
        }

        // The foreground overlay draws over everything: fresh depth, opaque
        // parts first, then its translucent parts once forced opaque and once
        // blended.
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("transparency_foreground"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &t.depth.view,
                depth_ops: Some(Operations::clear(1.0)),
            }),
        });
        pass.set_pipeline(&self.pipelines.transparency_depth_write);
        pass.set_bind_group(FRAME_GROUP, &self.frame_group, &[]);
        draws += draw_stream(
            pass.as_mut(),
            stream(StreamKind::ForegroundOpaque),
            &opaque_binds[StreamKind::ForegroundOpaque.index()],
        );
        draws += draw_stream(
            pass.as_mut(),
            stream(StreamKind::ForegroundTransparent),
            &opaque_binds[StreamKind::ForegroundTransparent.index()],
        );
        draws += draw_stream(
            pass.as_mut(),
            stream(StreamKind::ForegroundTransparent),
            foreground_transparent,
        );
        draws
    }

    fn encode_bloom(&self, encoder: &mut dyn CommandEncoder) {
        let (p, b, t) = (&self.pipelines, &self.post, &self.targets);
        fullscreen_pass(encoder, "bloom_low_pass", &p.low_pass, &b.low_pass, &t.post2.view);
        for ((layer, targets), bindings) in BLOOM_CASCADE.iter().zip(&t.bloom).zip(&b.bloom) {
            for i in 0..layer.num_passes {
                let horizontal = if i == 0 {
                    &bindings.horizontal_from_previous
                } else {
                    &bindings.horizontal_from_self
                };
                fullscreen_pass(encoder, "bloom_blur_h", &p.gauss7, horizontal, &targets.b.view);
                fullscreen_pass(
                    encoder,
                    "bloom_blur_v",
                    &p.gauss7,
                    &bindings.vertical,
                    &targets.a.view,
                );
            }
        }
    }

    fn encode_final(&self, encoder: &mut dyn CommandEncoder) {
        let group = if self.config.enable_bloom {
            &self.post.final_bloom
        } else {
            &self.post.final_plain
        };
        fullscreen_pass(
            encoder,
            "final",
            &self.pipelines.to_srgb,
            group,
            &self.targets.final_color.view,
        );
    }
}

impl<M: MaterialTable> Drop for DeferredRenderer<M> {
    fn drop(&mut self) {
        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        self.binder.destroy(device);
        self.vertex_storage.destroy(device);
        if let Err(e) = device.destroy_bind_group(self.frame_group) {
            log::warn!("DeferredRenderer: failed to destroy frame group: {e}");
        }
        if let Err(e) = device.destroy_buffer(self.frame_buffer) {
            log::warn!("DeferredRenderer: failed to destroy frame buffer: {e}");
        }
        self.post.destroy(device);
        self.targets.destroy(device);
        self.samplers.destroy(device);
        self.neutral.destroy(device);
        self.textures.destroy(device);
        self.pipelines.destroy(device);
        log::debug!("DeferredRenderer: GPU resources released");
    }
}
