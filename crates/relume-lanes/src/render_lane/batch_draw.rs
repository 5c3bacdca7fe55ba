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

//! Flushing a triangle batch into its vertex buffer and drawing it.

use super::material_binder::MaterialBindCommands;
use crate::batch::{StreamKind, TriangleBatch, Vertex};
use crate::pool::FrameVertexStorage;
use relume_core::asset::MaterialId;
use relume_core::renderer::{BufferId, GraphicsDevice, RenderPass, ResourceError};

/// Consecutive triangles sharing a material, drawn with one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRun {
    /// Material of every triangle in the run.
    pub material: MaterialId,
    /// First vertex in the stream's buffer.
    pub first_vertex: u32,
    /// Number of vertices, a multiple of three.
    pub vertex_count: u32,
}

/// Uploads a batch into the active vertex buffer of its stream.
///
/// The buffer is sized from the batch's capacity, not its length, so a
/// stream that fluctuates around a size does not reallocate every frame.
pub fn fill(
    device: &dyn GraphicsDevice,
    batch: &TriangleBatch,
    storage: &mut FrameVertexStorage,
    kind: StreamKind,
) -> Result<(), ResourceError> {
    storage.ensure_capacity(device, kind, batch.capacity() * 3)?;
    let vertices: Vec<Vertex> = batch.iter().flat_map(|t| t.vertices).collect();
    storage.upload(device, kind, &vertices)
}

/// Groups a batch into draw runs.
pub fn plan_draws(batch: &TriangleBatch) -> Vec<DrawRun> {
    let mut runs: Vec<DrawRun> = Vec::new();
    for (i, triangle) in batch.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.material == triangle.material => run.vertex_count += 3,
            _ => runs.push(DrawRun {
                material: triangle.material,
                first_vertex: i as u32 * 3,
                vertex_count: 3,
            }),
        }
    }
    runs
}

/// Records the runs of one stream: one material bind and one draw each.
///
/// `bindings[i]` is the material bind of `runs[i]`.
pub fn draw(
    pass: &mut dyn RenderPass<'_>,
    vertex_buffer: &BufferId,
    runs: &[DrawRun],
    bindings: &[MaterialBindCommands],
) {
    debug_assert_eq!(runs.len(), bindings.len());
    if runs.is_empty() {
        return;
    }
    pass.set_vertex_buffer(0, vertex_buffer, 0);
    for (run, binding) in runs.iter().zip(bindings) {
        binding.apply(pass);
        pass.draw(run.first_vertex..run.first_vertex + run.vertex_count, 0..1);
    }
}
