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

//! Runs the wgpu backend against a real adapter. Every test returns early on
//! machines without one.

use relume_core::asset::Material;
use relume_core::math::{Extent2D, LinearRgba, Origin3D};
use relume_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError, TextureDescriptor,
    TextureFormat, TextureUsage,
};
use relume_core::RendererConfig;
use relume_infra::WgpuDevice;
use relume_lanes::command_lane::{ExecuteBufferWriter, TlVertex};
use relume_lanes::{DeferredRenderer, Viewport};
use std::sync::Arc;

const TEXTURE_HANDLE: u32 = 1;

fn device() -> Option<WgpuDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    match WgpuDevice::headless(false).or_else(|_| WgpuDevice::headless(true)) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

#[test]
fn texture_round_trips_through_read_back() {
    let Some(device) = device() else { return };
    let extent = Extent2D::new(70, 3);
    let texture = device
        .create_texture(&TextureDescriptor {
            label: Some("round_trip".into()),
            size: extent.to_3d(),
            mip_level_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::COPY_DST | TextureUsage::COPY_SRC,
        })
        .unwrap();
    // 70 * 4 bytes per row forces padding in the staging buffer.
    let texels: Vec<u8> = (0..extent.area() * 4).map(|i| (i % 251) as u8).collect();
    device
        .write_texture(
            texture,
            &texels,
            extent.width * 4,
            Origin3D::default(),
            extent.to_3d(),
        )
        .unwrap();

    assert_eq!(device.read_texture(texture, extent).unwrap(), texels);
    device.destroy_texture(texture).unwrap();
    assert_eq!(device.vram_allocated_bytes(), 0);
}

#[test]
fn invalid_ids_and_ranges_are_rejected() {
    let Some(device) = device() else { return };
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })
        .unwrap();

    assert!(device.write_buffer(buffer, 8, &[0; 8]).is_ok());
    assert!(matches!(
        device.write_buffer(buffer, 12, &[0; 8]),
        Err(ResourceError::OutOfBounds)
    ));
    assert!(matches!(
        device.destroy_buffer(BufferId(usize::MAX)),
        Err(ResourceError::NotFound)
    ));
    assert!(device.min_uniform_alignment().is_power_of_two());
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.live_resources(), 0);
}

#[test]
fn deferred_frame_renders_and_releases_everything() {
    let Some(device) = device() else { return };
    let config = RendererConfig {
        resolution: (160, 120),
        ..Default::default()
    };
    let materials = vec![Material {
        albedo_factor: LinearRgba::rgb(1.0, 0.2, 0.2),
        ..Default::default()
    }];
    let dyn_device: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    let mut renderer = DeferredRenderer::new(dyn_device, config, materials).unwrap();

    let vertices: Vec<TlVertex> = [(10.0, 10.0), (150.0, 20.0), (80.0, 110.0)]
        .iter()
        .map(|&(sx, sy)| TlVertex {
            sx,
            sy,
            sz: 0.5,
            rhw: 1.0,
            color: 0xFFFFFFFF,
            ..Default::default()
        })
        .collect();
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(TEXTURE_HANDLE, 1)]).triangles(&[[0, 1, 2]]).exit();

    for _ in 0..2 {
        renderer.begin_submission();
        let report = renderer.execute(w.as_bytes(), &vertices, &Viewport::default());
        assert!(report.is_clean(), "{:?}", report.diagnostics);
        let output = renderer.present().unwrap();
        let pixels = renderer.read_back(&output).unwrap();
        assert_eq!(pixels.len(), 160 * 120 * 4);
        assert_eq!(output.stats.triangles[0], 1);
    }

    drop(renderer);
    assert_eq!(device.live_resources(), 0);
}

/// A pre-transformed triangle covering the whole 160x120 display.
fn covering_triangle(sz: f32, w: f32, color: u32) -> [TlVertex; 3] {
    [(-10.0, -10.0), (400.0, -10.0), (-10.0, 300.0)].map(|(sx, sy)| TlVertex {
        sx,
        sy,
        sz,
        rhw: 1.0 / w,
        color,
        ..Default::default()
    })
}

fn small_config() -> RendererConfig {
    RendererConfig {
        resolution: (160, 120),
        ..Default::default()
    }
}

#[test]
fn overlapping_geometry_keeps_the_nearest_view_depth() {
    let Some(device) = device() else { return };
    let dyn_device: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    let mut renderer =
        DeferredRenderer::new(dyn_device, small_config(), vec![Material::default()]).unwrap();

    // Far triangle first, then a nearer one over the same pixels.
    let mut vertices = covering_triangle(0.9, 10.0, 0xFFFFFFFF).to_vec();
    vertices.extend(covering_triangle(0.2, 2.0, 0xFFFFFFFF));
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(TEXTURE_HANDLE, 1)])
        .triangles(&[[0, 1, 2], [3, 4, 5]])
        .exit();

    renderer.begin_submission();
    let report = renderer.execute(w.as_bytes(), &vertices, &Viewport::default());
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    let output = renderer.present().unwrap();
    assert_eq!(output.stats.triangles[0], 2);

    let depth_normal = renderer.targets().depth_normal;
    let bytes = device
        .read_texture(depth_normal.texture, depth_normal.extent)
        .unwrap();
    let texel = ((60 * 160 + 80) * 8) as usize;
    let centre: Vec<f32> = bytes[texel..texel + 8]
        .chunks_exact(2)
        .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
        .collect();
    assert_eq!(centre[3], 2.0, "depth+normal at centre: {centre:?}");
    let normal_len = (centre[0] * centre[0] + centre[1] * centre[1] + centre[2] * centre[2]).sqrt();
    assert!(
        normal_len == 0.0 || (normal_len - 1.0).abs() < 1e-2,
        "normal {centre:?}"
    );
}

#[test]
fn bloom_leaves_frames_below_threshold_untouched() {
    let Some(device) = device() else { return };
    let mut vertices = covering_triangle(0.5, 1.0, 0xFF404080).to_vec();
    vertices.extend([(20.0, 20.0), (140.0, 30.0), (70.0, 110.0)].map(|(sx, sy)| TlVertex {
        sx,
        sy,
        sz: 0.3,
        rhw: 0.5,
        color: 0xFFC0A060,
        ..Default::default()
    }));
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(TEXTURE_HANDLE, 1)])
        .triangles(&[[0, 1, 2], [3, 4, 5]])
        .exit();
    let material = Material {
        albedo_factor: LinearRgba::rgb(0.8, 0.7, 0.6),
        ..Default::default()
    };

    let mut frames = Vec::new();
    for enable_bloom in [false, true] {
        let config = RendererConfig {
            enable_bloom,
            ..small_config()
        };
        let dyn_device: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let mut renderer = DeferredRenderer::new(dyn_device, config, vec![material.clone()]).unwrap();
        renderer.begin_submission();
        let report = renderer.execute(w.as_bytes(), &vertices, &Viewport::default());
        assert!(report.is_clean(), "{:?}", report.diagnostics);
        let output = renderer.present().unwrap();
        frames.push(renderer.read_back(&output).unwrap());
    }

    assert_eq!(frames[0].len(), 160 * 120 * 4);
    let differing = frames[0]
        .iter()
        .zip(&frames[1])
        .filter(|(a, b)| a != b)
        .count();
    assert_eq!(differing, 0, "{differing} of {} bytes differ", frames[0].len());
}
