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

use relume_core::renderer::{
    BindGroupId, BufferId, CommandBufferId, CommandEncoder, RenderPass, RenderPassDescriptor,
    RenderPipelineId,
};
use std::any::Any;
use std::ops::Range;

use super::conversions::IntoWgpu;
use super::device::WgpuDevice;

/// A render pass recording into a [`WgpuCommandEncoder`].
///
/// Ids are resolved against the device tables at record time; an id that is
/// no longer live is logged and the command skipped.
pub struct WgpuRenderPass<'a> {
    pub(crate) pass: wgpu::RenderPass<'a>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'pass> RenderPass<'pass> for WgpuRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId) {
        if let Some(pipeline) = self.device.get_wgpu_render_pipeline(*pipeline) {
            self.pass.set_pipeline(&pipeline);
        } else {
            log::warn!("WgpuRenderPass: RenderPipelineId {pipeline:?} not found.");
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]) {
        if let Some(group) = self.device.get_wgpu_bind_group(*bind_group) {
            self.pass.set_bind_group(index, &*group, offsets);
        } else {
            log::warn!("WgpuRenderPass: BindGroupId {bind_group:?} not found.");
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferId, offset: u64) {
        if let Some(wgpu_buffer) = self.device.get_wgpu_buffer(*buffer) {
            self.pass.set_vertex_buffer(slot, wgpu_buffer.slice(offset..));
        } else {
            log::warn!("WgpuRenderPass: Vertex BufferId {buffer:?} not found.");
        }
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.pass.draw(vertices, instances);
    }
}

/// Records one frame's worth of wgpu commands.
pub struct WgpuCommandEncoder {
    pub(crate) encoder: wgpu::CommandEncoder,
    pub(crate) device: WgpuDevice,
}

impl WgpuCommandEncoder {
    /// Mutable access to the underlying `wgpu::CommandEncoder`, for copies
    /// the abstract encoder does not expose.
    pub fn wgpu_encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        // Resolve every view first so the attachments can borrow them.
        let color_views: Vec<_> = descriptor
            .color_attachments
            .iter()
            .map(|att| {
                let view = self.device.get_wgpu_texture_view(*att.view);
                if view.is_none() {
                    log::warn!(
                        "WgpuCommandEncoder: color view {:?} of pass {:?} not found.",
                        att.view,
                        descriptor.label
                    );
                }
                (view, att.ops)
            })
            .collect();
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_views
            .iter()
            .map(|(view, ops)| {
                view.as_ref().map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: ops.load.into_wgpu(),
                        store: ops.store.into_wgpu(),
                    },
                })
            })
            .collect();

        let depth_view = descriptor
            .depth_stencil_attachment
            .as_ref()
            .and_then(|ds| self.device.get_wgpu_texture_view(*ds.view));
        let depth_stencil_attachment = match (&descriptor.depth_stencil_attachment, &depth_view) {
            (Some(ds), Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: ds.depth_ops.map(|ops| wgpu::Operations {
                    load: ops.load.into_wgpu(),
                    store: ops.store.into_wgpu(),
                }),
                stencil_ops: None,
            }),
            _ => None,
        };

        let pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: descriptor.label,
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        Box::new(WgpuRenderPass {
            pass,
            device: &self.device,
        })
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let Self { encoder, device } = *self;
        device.register_command_buffer(encoder.finish())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
