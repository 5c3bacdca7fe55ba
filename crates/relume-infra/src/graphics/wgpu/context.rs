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

use anyhow::anyhow;
use anyhow::Result;
use wgpu::{Adapter, Instance, RequestAdapterOptions};
use std::sync::Arc;

/// Holds the core WGPU state objects required for offscreen rendering.
///
/// No surface is created: every frame lands in a texture owned by the
/// renderer and reaches the host through a read back.
#[derive(Debug)]
pub struct WgpuContext {
    #[allow(dead_code)]
    pub instance: Instance,
    #[allow(dead_code)]
    pub adapter: Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Store info for easy access
    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
    pub adapter_device_type: wgpu::DeviceType,
    pub device_limits: wgpu::Limits,
}

impl WgpuContext {
    /// Asynchronously picks an adapter and opens a logical device on it.
    ///
    /// ## Arguments
    /// * `force_fallback_adapter` - Ask for the software adapter, used by
    ///   machines without a GPU.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or an error when no
    ///   adapter or device is available.
    pub async fn new(force_fallback_adapter: bool) -> Result<Self> {
        log::info!("Initializing headless WGPU context...");

        let instance = Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());

        // --- 1. Select Adapter ---
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?}, Type: {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        // --- 2. Create Logical Device and Command Queue from Adapter ---
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Relume Logical Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let device_limits = device.limits();
        log::debug!("Device limits: {device_limits:?}");

        Ok(WgpuContext {
            instance,
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
            device_limits,
        })
    }

    /// Blocking variant of [`WgpuContext::new`].
    pub fn new_blocking(force_fallback_adapter: bool) -> Result<Self> {
        pollster::block_on(Self::new(force_fallback_adapter))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Required alignment of dynamic uniform buffer offsets on this device.
    pub fn min_uniform_alignment(&self) -> u32 {
        self.device_limits.min_uniform_buffer_offset_alignment
    }
}
