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

//! A recording graphics device for integration tests.
//!
//! Every resource is tracked by kind so tests can check that nothing leaks,
//! and every render pass is recorded with its attachments and commands.

#![allow(dead_code)]

use relume_core::math::{Extent2D, Extent3D, Origin3D};
use relume_core::renderer::*;
use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Shader,
    BindGroupLayout,
    BindGroup,
    PipelineLayout,
    Pipeline,
    Buffer,
    Texture,
    View,
    Sampler,
}

#[derive(Debug, Clone)]
pub struct MockResource {
    pub kind: Kind,
    pub label: String,
    pub size: u64,
    pub data: Vec<u8>,
    pub extent: Extent2D,
    pub texture: Option<TextureId>,
    pub color_blends: Vec<Option<BlendState>>,
}

impl MockResource {
    fn new(kind: Kind, label: Option<&str>) -> Self {
        Self {
            kind,
            label: label.unwrap_or_default().to_owned(),
            size: 0,
            data: Vec::new(),
            extent: Extent2D::default(),
            texture: None,
            color_blends: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPipeline(String),
    SetBindGroup {
        index: u32,
        group: BindGroupId,
        offsets: Vec<u32>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferId,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PassRecord {
    pub label: String,
    pub color_targets: Vec<(TextureViewId, LoadOp<relume_core::math::LinearRgba>)>,
    pub depth: Option<(TextureViewId, Option<LoadOp<f32>>)>,
    pub commands: Vec<Command>,
}

impl PassRecord {
    pub fn pipelines(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SetPipeline(label) => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<Range<u32>> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw { vertices, .. } => Some(vertices.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MockDevice {
    next_id: AtomicUsize,
    next_command_buffer: AtomicU64,
    resources: Mutex<HashMap<usize, MockResource>>,
    passes: Arc<Mutex<Vec<PassRecord>>>,
    submitted: AtomicUsize,
    destroy_failures: AtomicUsize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, resource: MockResource) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.resources.lock().unwrap().insert(id, resource);
        id
    }

    fn remove(&self, id: usize, kind: Kind) -> Result<(), ResourceError> {
        let mut resources = self.resources.lock().unwrap();
        if resources.get(&id).is_some_and(|r| r.kind == kind) {
            resources.remove(&id);
            Ok(())
        } else {
            self.destroy_failures.fetch_add(1, Ordering::Relaxed);
            Err(ResourceError::NotFound)
        }
    }

    fn label_of(&self, id: usize) -> String {
        self.resources
            .lock()
            .unwrap()
            .get(&id)
            .map(|r| r.label.clone())
            .unwrap_or_else(|| format!("<unknown {id}>"))
    }

    pub fn resource(&self, id: usize) -> Option<MockResource> {
        self.resources.lock().unwrap().get(&id).cloned()
    }

    pub fn live(&self, kind: Kind) -> usize {
        self.resources
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn live_total(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    pub fn labels(&self, kind: Kind) -> Vec<String> {
        let mut labels: Vec<String> = self
            .resources
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.kind == kind)
            .map(|r| r.label.clone())
            .collect();
        labels.sort();
        labels
    }

    pub fn pipeline_blends(&self, label: &str) -> Option<Vec<Option<BlendState>>> {
        self.resources
            .lock()
            .unwrap()
            .values()
            .find(|r| r.kind == Kind::Pipeline && r.label == label)
            .map(|r| r.color_blends.clone())
    }

    pub fn buffer_data(&self, id: BufferId) -> Vec<u8> {
        self.resource(id.0).map(|r| r.data).unwrap_or_default()
    }

    pub fn passes(&self) -> Vec<PassRecord> {
        self.passes.lock().unwrap().clone()
    }

    pub fn take_passes(&self) -> Vec<PassRecord> {
        std::mem::take(&mut *self.passes.lock().unwrap())
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn destroy_failures(&self) -> usize {
        self.destroy_failures.load(Ordering::Relaxed)
    }
}

struct MockEncoder {
    device_labels: HashMap<usize, String>,
    passes: Arc<Mutex<Vec<PassRecord>>>,
    id: u64,
}

struct MockRenderPass<'a> {
    record: PassRecord,
    labels: &'a HashMap<usize, String>,
    sink: Arc<Mutex<Vec<PassRecord>>>,
}

impl RenderPass<'_> for MockRenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId) {
        let label = self
            .labels
            .get(&pipeline.0)
            .cloned()
            .unwrap_or_else(|| format!("<unknown {}>", pipeline.0));
        self.record.commands.push(Command::SetPipeline(label));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId, offsets: &[u32]) {
        self.record.commands.push(Command::SetBindGroup {
            index,
            group: *bind_group,
            offsets: offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferId, _offset: u64) {
        self.record.commands.push(Command::SetVertexBuffer {
            slot,
            buffer: *buffer,
        });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record
            .commands
            .push(Command::Draw { vertices, instances });
    }
}

impl Drop for MockRenderPass<'_> {
    fn drop(&mut self) {
        let record = std::mem::take(&mut self.record);
        self.sink.lock().unwrap().push(record);
    }
}

impl CommandEncoder for MockEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        let record = PassRecord {
            label: descriptor.label.unwrap_or_default().to_owned(),
            color_targets: descriptor
                .color_attachments
                .iter()
                .map(|a| (*a.view, a.ops.load))
                .collect(),
            depth: descriptor
                .depth_stencil_attachment
                .as_ref()
                .map(|d| (*d.view, d.depth_ops.map(|o| o.load))),
            commands: Vec::new(),
        };
        Box::new(MockRenderPass {
            record,
            labels: &self.device_labels,
            sink: Arc::clone(&self.passes),
        })
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(self.id)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl GraphicsDevice for MockDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let ShaderSourceData::Wgsl(source) = &descriptor.source;
        if source.trim().is_empty() {
            return Err(ShaderError::CompilationError {
                label: descriptor.label.unwrap_or_default().to_owned(),
                details: "empty source".to_owned(),
            }
            .into());
        }
        Ok(ShaderModuleId(
            self.insert(MockResource::new(Kind::Shader, descriptor.label)),
        ))
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::Shader)
    }

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.insert(MockResource::new(
            Kind::BindGroupLayout,
            descriptor.label,
        ))))
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::BindGroupLayout)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        Ok(BindGroupId(
            self.insert(MockResource::new(Kind::BindGroup, descriptor.label)),
        ))
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::BindGroup)
    }

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        Ok(PipelineLayoutId(self.insert(MockResource::new(
            Kind::PipelineLayout,
            descriptor.label,
        ))))
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::PipelineLayout)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let mut resource = MockResource::new(Kind::Pipeline, descriptor.label);
        resource.color_blends = descriptor.color_targets.iter().map(|t| t.blend).collect();
        Ok(RenderPipelineId(self.insert(resource)))
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::Pipeline)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let mut resource = MockResource::new(Kind::Buffer, descriptor.label.as_deref());
        resource.size = descriptor.size;
        resource.data = vec![0; descriptor.size as usize];
        Ok(BufferId(self.insert(resource)))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::Buffer)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut resources = self.resources.lock().unwrap();
        let buffer = resources
            .get_mut(&id.0)
            .filter(|r| r.kind == Kind::Buffer)
            .ok_or(ResourceError::NotFound)?;
        let end = offset as usize + data.len();
        if end > buffer.data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let mut resource = MockResource::new(Kind::Texture, descriptor.label.as_deref());
        resource.extent = Extent2D::new(descriptor.size.width, descriptor.size.height);
        Ok(TextureId(self.insert(resource)))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::Texture)
    }

    fn write_texture(
        &self,
        texture: TextureId,
        data: &[u8],
        bytes_per_row: u32,
        _origin: Origin3D,
        size: Extent3D,
    ) -> Result<(), ResourceError> {
        let resource = self.resource(texture.0).ok_or(ResourceError::NotFound)?;
        if resource.kind != Kind::Texture {
            return Err(ResourceError::NotFound);
        }
        if (data.len() as u64) < bytes_per_row as u64 * size.height as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(())
    }

    fn read_texture(&self, texture: TextureId, size: Extent2D) -> Result<Vec<u8>, ResourceError> {
        match self.resource(texture.0) {
            Some(r) if r.kind == Kind::Texture => Ok(vec![0; size.area() as usize * 4]),
            _ => Err(ResourceError::NotFound),
        }
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let parent = self.resource(texture.0).ok_or(ResourceError::NotFound)?;
        let label = descriptor
            .label
            .as_deref()
            .map(str::to_owned)
            .unwrap_or(parent.label);
        let mut resource = MockResource::new(Kind::View, Some(&label));
        resource.texture = Some(texture);
        resource.extent = parent.extent;
        Ok(TextureViewId(self.insert(resource)))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::View)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        Ok(SamplerId(self.insert(MockResource::new(
            Kind::Sampler,
            descriptor.label.as_deref(),
        ))))
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.remove(id.0, Kind::Sampler)
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        let device_labels = self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.kind == Kind::Pipeline)
            .map(|(id, r)| (*id, r.label.clone()))
            .collect();
        Box::new(MockEncoder {
            device_labels,
            passes: Arc::clone(&self.passes),
            id: self.next_command_buffer.fetch_add(1, Ordering::Relaxed),
        })
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn min_uniform_alignment(&self) -> u32 {
        256
    }
}

/// Looks up the label of any tracked resource id.
pub fn label(device: &MockDevice, id: usize) -> String {
    device.label_of(id)
}
