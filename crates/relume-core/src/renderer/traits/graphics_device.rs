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

use crate::math::{Extent2D, Extent3D, Origin3D};
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// A logical GPU device: creates resources, records and submits work.
///
/// Implementations are shared behind an `Arc` and must be usable from any
/// thread. Every `destroy_*` call on an unknown id returns
/// [`ResourceError::NotFound`].
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Compiles a shader module.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Releases a shader module.
    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Creates a bind group layout.
    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError>;

    /// Releases a bind group layout.
    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError>;

    /// Creates a bind group.
    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError>;

    /// Releases a bind group.
    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError>;

    /// Creates a pipeline layout.
    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError>;

    /// Releases a pipeline layout.
    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError>;

    /// Builds a render pipeline.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Releases a render pipeline.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Allocates a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Releases a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` into a buffer at `offset`. The write lands before the
    /// next submitted command buffer executes.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Allocates a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Uploads texels into a region of mip level 0.
    fn write_texture(
        &self,
        texture: TextureId,
        data: &[u8],
        bytes_per_row: u32,
        origin: Origin3D,
        size: Extent3D,
    ) -> Result<(), ResourceError>;

    /// Copies the top-left `size` region of a color texture back to memory,
    /// blocking until the GPU is done. Rows are tightly packed.
    fn read_texture(&self, texture: TextureId, size: Extent2D) -> Result<Vec<u8>, ResourceError>;

    /// Creates a view into a texture.
    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError>;

    /// Releases a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Releases a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Starts recording a command buffer.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a finished command buffer to the queue.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);

    /// Required alignment of dynamic uniform offsets.
    fn min_uniform_alignment(&self) -> u32;
}
