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

use crate::renderer::api::{
    BindGroupId, BufferId, CommandBufferId, RenderPassDescriptor, RenderPipelineId,
};
use std::any::Any;
use std::ops::Range;

/// An active render pass, used to record draw commands.
///
/// The pass borrows the [`CommandEncoder`] that created it and ends when it is
/// dropped.
pub trait RenderPass<'pass> {
    /// Sets the pipeline for subsequent draws.
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId);

    /// Binds a bind group at `index`. `offsets` supplies one value per
    /// dynamic-offset binding of the group, in binding order.
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]);

    /// Binds a vertex buffer to a slot, starting at `offset` bytes.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferId, offset: u64);

    /// Records a non-indexed draw.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);
}

/// Records GPU commands into a command buffer.
pub trait CommandEncoder {
    /// Begins a render pass. Only one pass can be open at a time.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder>;

    /// Consumes the encoder and returns the finished command buffer.
    fn finish(self: Box<Self>) -> CommandBufferId;

    /// Access to the concrete encoder.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
