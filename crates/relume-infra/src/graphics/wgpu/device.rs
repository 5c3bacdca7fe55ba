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

use super::command::WgpuCommandEncoder;
use super::context::WgpuContext;
use super::conversions::IntoWgpu;
use relume_core::math::{Extent2D, Extent3D, Origin3D};
use relume_core::renderer::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId,
    BindingResource, BufferDescriptor, BufferId, CommandBufferId, CommandEncoder, FilterMode,
    GraphicsDevice, PipelineError, PipelineLayoutDescriptor, PipelineLayoutId, RenderPipelineDescriptor,
    RenderPipelineId, ResourceError, SamplerDescriptor, SamplerId, ShaderError,
    ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData, TextureDescriptor, TextureFormat,
    TextureId, TextureViewDescriptor, TextureViewId,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct WgpuShaderModuleEntry {
    wgpu_module: Arc<wgpu::ShaderModule>,
}

#[derive(Debug)]
struct WgpuBindGroupLayoutEntry {
    wgpu_layout: Arc<wgpu::BindGroupLayout>,
}

#[derive(Debug)]
struct WgpuBindGroupEntry {
    wgpu_bind_group: Arc<wgpu::BindGroup>,
}

#[derive(Debug)]
struct WgpuPipelineLayoutEntry {
    wgpu_layout: Arc<wgpu::PipelineLayout>,
}

#[derive(Debug)]
struct WgpuRenderPipelineEntry {
    wgpu_pipeline: Arc<wgpu::RenderPipeline>,
}

#[derive(Debug)]
struct WgpuBufferEntry {
    wgpu_buffer: Arc<wgpu::Buffer>,
    size: u64,
}

#[derive(Debug)]
struct WgpuTextureEntry {
    wgpu_texture: Arc<wgpu::Texture>,
    format: TextureFormat,
    size: u64,
}

#[derive(Debug)]
struct WgpuTextureViewEntry {
    wgpu_view: Arc<wgpu::TextureView>,
}

#[derive(Debug)]
struct WgpuSamplerEntry {
    wgpu_sampler: Arc<wgpu::Sampler>,
}

/// The shared state behind every clone of a [`WgpuDevice`].
struct WgpuDeviceInternal {
    context: WgpuContext,

    shader_modules: Mutex<HashMap<ShaderModuleId, WgpuShaderModuleEntry>>,
    bind_group_layouts: Mutex<HashMap<BindGroupLayoutId, WgpuBindGroupLayoutEntry>>,
    bind_groups: Mutex<HashMap<BindGroupId, WgpuBindGroupEntry>>,
    pipeline_layouts: Mutex<HashMap<PipelineLayoutId, WgpuPipelineLayoutEntry>>,
    pipelines: Mutex<HashMap<RenderPipelineId, WgpuRenderPipelineEntry>>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    texture_views: Mutex<HashMap<TextureViewId, WgpuTextureViewEntry>>,
    samplers: Mutex<HashMap<SamplerId, WgpuSamplerEntry>>,
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,

    next_shader_id: AtomicUsize,
    next_bind_group_layout_id: AtomicUsize,
    next_bind_group_id: AtomicUsize,
    next_pipeline_layout_id: AtomicUsize,
    next_pipeline_id: AtomicUsize,
    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_texture_view_id: AtomicUsize,
    next_sampler_id: AtomicUsize,
    command_buffer_id_counter: AtomicU64,

    vram_allocated_bytes: AtomicUsize,
    vram_peak_bytes: AtomicU64,
}

/// A [`GraphicsDevice`] backed by wgpu.
///
/// Cloning is cheap: every clone shares the same resource tables. Resources
/// are addressed by the opaque ids handed out by the `create_*` calls, the
/// wgpu objects stay in the tables until the matching `destroy_*` call.
#[derive(Clone)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

fn label_of<'a>(label: &'a Option<std::borrow::Cow<'_, str>>) -> &'a str {
    label.as_deref().unwrap_or_default()
}

impl WgpuDevice {
    /// Wraps an initialized context.
    pub fn new(context: WgpuContext) -> Self {
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                shader_modules: Mutex::new(HashMap::new()),
                bind_group_layouts: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                pipeline_layouts: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                texture_views: Mutex::new(HashMap::new()),
                samplers: Mutex::new(HashMap::new()),
                pending_command_buffers: Mutex::new(HashMap::new()),
                next_shader_id: AtomicUsize::new(0),
                next_bind_group_layout_id: AtomicUsize::new(0),
                next_bind_group_id: AtomicUsize::new(0),
                next_pipeline_layout_id: AtomicUsize::new(0),
                next_pipeline_id: AtomicUsize::new(0),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                next_texture_view_id: AtomicUsize::new(0),
                next_sampler_id: AtomicUsize::new(0),
                command_buffer_id_counter: AtomicU64::new(0),
                vram_allocated_bytes: AtomicUsize::new(0),
                vram_peak_bytes: AtomicU64::new(0),
            }),
        }
    }

    /// Opens a headless device on the best available adapter.
    pub fn headless(force_fallback_adapter: bool) -> anyhow::Result<Self> {
        Ok(Self::new(WgpuContext::new_blocking(force_fallback_adapter)?))
    }

    /// The context the device was built on.
    pub fn context(&self) -> &WgpuContext {
        &self.internal.context
    }

    /// Bytes currently held by live buffers and textures.
    pub fn vram_allocated_bytes(&self) -> usize {
        self.internal.vram_allocated_bytes.load(Ordering::Relaxed)
    }

    /// Highest value [`Self::vram_allocated_bytes`] has reached.
    pub fn vram_peak_bytes(&self) -> u64 {
        self.internal.vram_peak_bytes.load(Ordering::Relaxed)
    }

    /// Number of resources currently registered, all kinds together.
    pub fn live_resources(&self) -> usize {
        let i = &self.internal;
        let count = |len: Result<usize, ResourceError>| len.unwrap_or(0);
        count(lock(&i.shader_modules, "shader_modules").map(|m| m.len()))
            + count(lock(&i.bind_group_layouts, "bind_group_layouts").map(|m| m.len()))
            + count(lock(&i.bind_groups, "bind_groups").map(|m| m.len()))
            + count(lock(&i.pipeline_layouts, "pipeline_layouts").map(|m| m.len()))
            + count(lock(&i.pipelines, "pipelines").map(|m| m.len()))
            + count(lock(&i.buffers, "buffers").map(|m| m.len()))
            + count(lock(&i.textures, "textures").map(|m| m.len()))
            + count(lock(&i.texture_views, "texture_views").map(|m| m.len()))
            + count(lock(&i.samplers, "samplers").map(|m| m.len()))
    }

    fn track_allocation(&self, bytes: u64) {
        let current = self
            .internal
            .vram_allocated_bytes
            .fetch_add(bytes as usize, Ordering::Relaxed) as u64
            + bytes;
        self.internal
            .vram_peak_bytes
            .fetch_max(current, Ordering::Relaxed);
    }

    fn track_release(&self, bytes: u64) {
        self.internal
            .vram_allocated_bytes
            .fetch_sub(bytes as usize, Ordering::Relaxed);
    }

    fn next_id(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn get_wgpu_render_pipeline(
        &self,
        id: RenderPipelineId,
    ) -> Option<Arc<wgpu::RenderPipeline>> {
        let pipelines = lock(&self.internal.pipelines, "pipelines").ok()?;
        pipelines.get(&id).map(|e| Arc::clone(&e.wgpu_pipeline))
    }

    pub(crate) fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        let groups = lock(&self.internal.bind_groups, "bind_groups").ok()?;
        groups.get(&id).map(|e| Arc::clone(&e.wgpu_bind_group))
    }

    pub(crate) fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        let buffers = lock(&self.internal.buffers, "buffers").ok()?;
        buffers.get(&id).map(|e| Arc::clone(&e.wgpu_buffer))
    }

    pub(crate) fn get_wgpu_texture_view(&self, id: TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        let views = lock(&self.internal.texture_views, "texture_views").ok()?;
        views.get(&id).map(|e| Arc::clone(&e.wgpu_view))
    }

    /// Registers a finished wgpu::CommandBuffer and returns its id.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        self.internal
            .pending_command_buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, buffer);
        id
    }

    /// Blocks until the queue is idle and pending map callbacks have run.
    pub fn poll_device_blocking(&self) -> Result<(), ResourceError> {
        self.internal
            .context
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| ResourceError::BackendError(format!("Device poll failed: {e}")))
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.internal.context.adapter_name)
            .field("backend", &self.internal.context.adapter_backend)
            .finish_non_exhaustive()
    }
}

impl GraphicsDevice for WgpuDevice {
    // --- Shader Module Operations ---

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let label = descriptor.label;
        let source = match &descriptor.source {
            ShaderSourceData::Wgsl(code) => wgpu::ShaderSource::Wgsl(code.clone()),
        };
        log::debug!("WgpuDevice: Creating wgpu::ShaderModule with label: {label:?}");

        let module = self
            .internal
            .context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor { label, source });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| m.message_type == wgpu::CompilationMessageType::Error)
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(ShaderError::CompilationError {
                label: label.unwrap_or_default().to_string(),
                details: errors.join("\n"),
            }
            .into());
        }

        let id = ShaderModuleId(Self::next_id(&self.internal.next_shader_id));
        lock(&self.internal.shader_modules, "shader_modules")?.insert(
            id,
            WgpuShaderModuleEntry {
                wgpu_module: Arc::new(module),
            },
        );
        log::debug!(
            "WgpuDevice: Created shader module '{}' with ID: {id:?}",
            label.unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        if lock(&self.internal.shader_modules, "shader_modules")?
            .remove(&id)
            .is_some()
        {
            log::debug!("WgpuDevice: Destroyed shader module with ID: {id:?}");
            Ok(())
        } else {
            Err(ShaderError::NotFound { id }.into())
        }
    }

    // --- Bind Group Operations ---

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into_wgpu(),
                ty: entry.ty.into_wgpu(),
                count: None,
            })
            .collect();
        let layout =
            self.internal
                .context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: descriptor.label,
                    entries: &entries,
                });

        let id = BindGroupLayoutId(Self::next_id(&self.internal.next_bind_group_layout_id));
        lock(&self.internal.bind_group_layouts, "bind_group_layouts")?.insert(
            id,
            WgpuBindGroupLayoutEntry {
                wgpu_layout: Arc::new(layout),
            },
        );
        Ok(id)
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        lock(&self.internal.bind_group_layouts, "bind_group_layouts")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        enum Resolved {
            Buffer(Arc<wgpu::Buffer>, u64, Option<u64>),
            View(Arc<wgpu::TextureView>),
            Sampler(Arc<wgpu::Sampler>),
        }

        let layout = lock(&self.internal.bind_group_layouts, "bind_group_layouts")?
            .get(&descriptor.layout)
            .map(|e| Arc::clone(&e.wgpu_layout))
            .ok_or(ResourceError::NotFound)?;

        // Clone the referenced objects out of their tables first, the wgpu
        // entries borrow from this list.
        let mut resolved = Vec::with_capacity(descriptor.entries.len());
        for entry in descriptor.entries {
            let resource = match entry.resource {
                BindingResource::Buffer {
                    buffer,
                    offset,
                    size,
                } => Resolved::Buffer(
                    self.get_wgpu_buffer(buffer).ok_or(ResourceError::NotFound)?,
                    offset,
                    size,
                ),
                BindingResource::TextureView(view) => Resolved::View(
                    self.get_wgpu_texture_view(view)
                        .ok_or(ResourceError::NotFound)?,
                ),
                BindingResource::Sampler(sampler) => Resolved::Sampler(
                    lock(&self.internal.samplers, "samplers")?
                        .get(&sampler)
                        .map(|e| Arc::clone(&e.wgpu_sampler))
                        .ok_or(ResourceError::NotFound)?,
                ),
            };
            resolved.push((entry.binding, resource));
        }

        let entries: Vec<wgpu::BindGroupEntry> = resolved
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    Resolved::Buffer(buffer, offset, size) => {
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer,
                            offset: *offset,
                            size: size.and_then(wgpu::BufferSize::new),
                        })
                    }
                    Resolved::View(view) => wgpu::BindingResource::TextureView(view),
                    Resolved::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        let group = self
            .internal
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: descriptor.label,
                layout: &layout,
                entries: &entries,
            });

        let id = BindGroupId(Self::next_id(&self.internal.next_bind_group_id));
        lock(&self.internal.bind_groups, "bind_groups")?.insert(
            id,
            WgpuBindGroupEntry {
                wgpu_bind_group: Arc::new(group),
            },
        );
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        lock(&self.internal.bind_groups, "bind_groups")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    // --- Pipeline Operations ---

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        log::debug!(
            "WgpuDevice: Creating pipeline layout with label: {:?}",
            descriptor.label
        );
        let layouts = {
            let table = lock(&self.internal.bind_group_layouts, "bind_group_layouts")?;
            descriptor
                .bind_group_layouts
                .iter()
                .map(|id| {
                    table.get(id).map(|e| Arc::clone(&e.wgpu_layout)).ok_or_else(|| {
                        PipelineError::LayoutCreationFailed(format!(
                            "unknown bind group layout {id:?} in '{}'",
                            descriptor.label.unwrap_or_default()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        let refs: Vec<Option<&wgpu::BindGroupLayout>> =
            layouts.iter().map(|l| Some(l.as_ref())).collect();

        let layout =
            self.internal
                .context
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: descriptor.label,
                    bind_group_layouts: &refs,
                    immediate_size: 0,
                });

        let id = PipelineLayoutId(Self::next_id(&self.internal.next_pipeline_layout_id));
        lock(&self.internal.pipeline_layouts, "pipeline_layouts")?.insert(
            id,
            WgpuPipelineLayoutEntry {
                wgpu_layout: Arc::new(layout),
            },
        );
        Ok(id)
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        lock(&self.internal.pipeline_layouts, "pipeline_layouts")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        log::debug!(
            "WgpuDevice: Creating render pipeline with label: {:?}",
            descriptor.label
        );
        let pipeline_label = || descriptor.label.map(String::from);

        // 1. Get the shader modules and the layout from their tables
        let (vs_module, fs_module) = {
            let modules = lock(&self.internal.shader_modules, "shader_modules")?;
            let get = |id: ShaderModuleId| {
                modules
                    .get(&id)
                    .map(|e| Arc::clone(&e.wgpu_module))
                    .ok_or(PipelineError::InvalidShaderModuleForPipeline {
                        id,
                        pipeline_label: pipeline_label(),
                    })
            };
            (
                get(descriptor.vertex_module)?,
                get(descriptor.fragment_module)?,
            )
        };
        let layout = lock(&self.internal.pipeline_layouts, "pipeline_layouts")?
            .get(&descriptor.layout)
            .map(|e| Arc::clone(&e.wgpu_layout))
            .ok_or_else(|| {
                PipelineError::LayoutCreationFailed(format!(
                    "unknown pipeline layout {:?} for '{}'",
                    descriptor.layout,
                    descriptor.label.unwrap_or_default()
                ))
            })?;

        // 2. Convert vertex buffers layout
        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers
            .iter()
            .map(|vb| {
                vb.attributes
                    .iter()
                    .map(|attr| wgpu::VertexAttribute {
                        format: attr.format.into_wgpu(),
                        offset: attr.offset,
                        shader_location: attr.shader_location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers
            .iter()
            .zip(&attributes)
            .map(|(vb, attributes)| wgpu::VertexBufferLayout {
                array_stride: vb.array_stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        // 3. Convert depth and color target states
        let depth_stencil = descriptor.depth_stencil.map(|ds| wgpu::DepthStencilState {
            format: ds.format.into_wgpu(),
            depth_write_enabled: Some(ds.depth_write_enabled),
            depth_compare: Some(ds.depth_compare.into_wgpu()),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        let targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into_wgpu(),
                    blend: target.blend.map(IntoWgpu::into_wgpu),
                    write_mask: target.write_mask.into_wgpu(),
                })
            })
            .collect();

        // 4. Create the render pipeline
        let pipeline =
            self.internal
                .context
                .device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: descriptor.label,
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &vs_module,
                        entry_point: Some(descriptor.vertex_entry_point),
                        compilation_options: Default::default(),
                        buffers: &vertex_buffers,
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        cull_mode: descriptor.cull_mode.map(IntoWgpu::into_wgpu),
                        ..Default::default()
                    },
                    depth_stencil,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: &fs_module,
                        entry_point: Some(descriptor.fragment_entry_point),
                        compilation_options: Default::default(),
                        targets: &targets,
                    }),
                    multiview_mask: None,
                    cache: None,
                });

        let id = RenderPipelineId(Self::next_id(&self.internal.next_pipeline_id));
        lock(&self.internal.pipelines, "pipelines")?.insert(
            id,
            WgpuRenderPipelineEntry {
                wgpu_pipeline: Arc::new(pipeline),
            },
        );
        log::info!(
            "WgpuDevice: Created render pipeline '{}' with ID: {id:?}",
            descriptor.label.unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        if lock(&self.internal.pipelines, "pipelines")?
            .remove(&id)
            .is_some()
        {
            log::debug!("WgpuDevice: Destroyed render pipeline with ID: {id:?}");
            Ok(())
        } else {
            Err(PipelineError::InvalidRenderPipeline { id }.into())
        }
    }

    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self
            .internal
            .context
            .device
            .create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: descriptor.size,
                usage: wgpu::BufferUsages::from_bits_truncate(descriptor.usage.bits()),
                mapped_at_creation: descriptor.mapped_at_creation,
            });

        let id = BufferId(Self::next_id(&self.internal.next_buffer_id));
        self.track_allocation(descriptor.size);
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(buffer),
                size: descriptor.size,
            },
        );
        log::debug!(
            "WgpuDevice: Created buffer '{}' with ID: {id:?}, size: {} bytes",
            label_of(&descriptor.label),
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.track_release(entry.size);
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let (buffer, size) = lock(&self.internal.buffers, "buffers")?
            .get(&id)
            .map(|e| (Arc::clone(&e.wgpu_buffer), e.size))
            .ok_or(ResourceError::NotFound)?;

        // Queue writes must cover a multiple of four bytes.
        let padded_len = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if offset + padded_len > size {
            return Err(ResourceError::OutOfBounds);
        }
        let queue = &self.internal.context.queue;
        if padded_len == data.len() as u64 {
            queue.write_buffer(&buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len as usize, 0);
            queue.write_buffer(&buffer, offset, &padded);
        }
        Ok(())
    }

    // --- Texture Operations ---

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self
            .internal
            .context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: descriptor.label.as_deref(),
                size: descriptor.size.into_wgpu(),
                mip_level_count: descriptor.mip_level_count,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: descriptor.format.into_wgpu(),
                usage: descriptor.usage.into_wgpu(),
                view_formats: &[],
            });

        // This is a simplified calculation that ignores mips and padding.
        let size_in_bytes = descriptor.size.width as u64
            * descriptor.size.height as u64
            * descriptor.size.depth_or_array_layers as u64
            * descriptor.format.bytes_per_pixel() as u64;

        let id = TextureId(Self::next_id(&self.internal.next_texture_id));
        self.track_allocation(size_in_bytes);
        lock(&self.internal.textures, "textures")?.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(texture),
                format: descriptor.format,
                size: size_in_bytes,
            },
        );
        log::debug!(
            "WgpuDevice: Created texture '{}' with ID: {id:?}, size: {size_in_bytes} bytes",
            label_of(&descriptor.label)
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.textures, "textures")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.track_release(entry.size);
        log::debug!("WgpuDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn write_texture(
        &self,
        texture: TextureId,
        data: &[u8],
        bytes_per_row: u32,
        origin: Origin3D,
        size: Extent3D,
    ) -> Result<(), ResourceError> {
        let wgpu_texture = lock(&self.internal.textures, "textures")?
            .get(&texture)
            .map(|e| Arc::clone(&e.wgpu_texture))
            .ok_or(ResourceError::NotFound)?;
        if (data.len() as u64) < bytes_per_row as u64 * size.height as u64 {
            return Err(ResourceError::OutOfBounds);
        }

        self.internal.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &wgpu_texture,
                mip_level: 0,
                origin: origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
            size.into_wgpu(),
        );
        Ok(())
    }

    fn read_texture(&self, texture: TextureId, size: Extent2D) -> Result<Vec<u8>, ResourceError> {
        let (wgpu_texture, format) = lock(&self.internal.textures, "textures")?
            .get(&texture)
            .map(|e| (Arc::clone(&e.wgpu_texture), e.format))
            .ok_or(ResourceError::NotFound)?;
        if format.is_depth() {
            return Err(ResourceError::BackendError(
                "depth textures cannot be read back".to_string(),
            ));
        }
        if size.width > wgpu_texture.width() || size.height > wgpu_texture.height() {
            return Err(ResourceError::OutOfBounds);
        }

        // Rows of the staging buffer are padded to COPY_BYTES_PER_ROW_ALIGNMENT.
        let unpadded_bytes_per_row = size.width * format.bytes_per_pixel();
        let padded_bytes_per_row =
            unpadded_bytes_per_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let device = &self.internal.context.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read_back_staging"),
            size: padded_bytes_per_row as u64 * size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("read_back"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &wgpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            size.to_3d().into_wgpu(),
        );
        self.internal
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.poll_device_blocking()?;
        rx.recv()
            .map_err(|e| ResourceError::BackendError(format!("Read back never mapped: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("Read back map failed: {e}")))?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * size.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        staging.unmap();
        Ok(pixels)
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let view = lock(&self.internal.textures, "textures")?
            .get(&texture)
            .ok_or(ResourceError::NotFound)?
            .wgpu_texture
            .create_view(&wgpu::TextureViewDescriptor {
                label: descriptor.label.as_deref(),
                format: descriptor.format.map(IntoWgpu::into_wgpu),
                ..Default::default()
            });

        let id = TextureViewId(Self::next_id(&self.internal.next_texture_view_id));
        lock(&self.internal.texture_views, "texture_views")?.insert(
            id,
            WgpuTextureViewEntry {
                wgpu_view: Arc::new(view),
            },
        );
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        lock(&self.internal.texture_views, "texture_views")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        // Anisotropy is only valid when every filter is linear.
        let all_linear = [
            descriptor.mag_filter,
            descriptor.min_filter,
            descriptor.mipmap_filter,
        ]
        .iter()
        .all(|f| *f == FilterMode::Linear);
        let anisotropy_clamp = if all_linear {
            descriptor.anisotropy_clamp.max(1)
        } else {
            if descriptor.anisotropy_clamp > 1 {
                log::warn!(
                    "WgpuDevice: Ignoring anisotropy {} on non-linear sampler '{}'",
                    descriptor.anisotropy_clamp,
                    label_of(&descriptor.label)
                );
            }
            1
        };

        let sampler = self
            .internal
            .context
            .device
            .create_sampler(&wgpu::SamplerDescriptor {
                label: descriptor.label.as_deref(),
                address_mode_u: descriptor.address_mode_u.into_wgpu(),
                address_mode_v: descriptor.address_mode_v.into_wgpu(),
                mag_filter: descriptor.mag_filter.into_wgpu(),
                min_filter: descriptor.min_filter.into_wgpu(),
                mipmap_filter: descriptor.mipmap_filter.into_wgpu(),
                anisotropy_clamp,
                ..Default::default()
            });

        let id = SamplerId(Self::next_id(&self.internal.next_sampler_id));
        lock(&self.internal.samplers, "samplers")?.insert(
            id,
            WgpuSamplerEntry {
                wgpu_sampler: Arc::new(sampler),
            },
        );
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        lock(&self.internal.samplers, "samplers")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    // --- Command Operations ---

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = self
            .internal
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuCommandEncoder {
            encoder,
            device: self.clone(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let buffer = self
            .internal
            .pending_command_buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&command_buffer);
        match buffer {
            Some(buffer) => {
                self.internal.context.queue.submit(std::iter::once(buffer));
            }
            None => log::error!(
                "Attempted to submit a CommandBufferId ({command_buffer:?}) that does not exist."
            ),
        }
    }

    fn min_uniform_alignment(&self) -> u32 {
        self.internal.context.min_uniform_alignment()
    }
}
