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

mod common;

use common::{Kind, MockDevice};
use relume_core::asset::MaterialId;
use relume_core::math::{Extent2D, LinearRgba, Vec2, Vec4};
use relume_core::renderer::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, GraphicsDevice, ResourceError,
    ShaderStages,
};
use relume_core::RendererConfig;
use relume_lanes::pool::{
    ColorSpace, DynamicUniformRing, FrameVertexStorage, TexturePool, UniformSlice,
};
use relume_lanes::render_lane::batch_draw;
use relume_lanes::{StreamKind, Triangle, TriangleBatch, Vertex};

fn uniform_layout(device: &MockDevice) -> relume_core::renderer::BindGroupLayoutId {
    device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("test_uniforms"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::UniformBuffer {
                    has_dynamic_offset: true,
                    min_binding_size: Some(64),
                },
            }],
        })
        .unwrap()
}

fn triangle() -> Triangle {
    let v = |x: f32| Vertex::new(Vec4::new(x, 1.0, -0.5, 1.0), Vec2::ZERO, LinearRgba::WHITE);
    Triangle::new(v(0.0), v(1.0), v(2.0), MaterialId(1))
}

#[test]
fn uniform_ring_grows_then_rewinds() {
    let device = MockDevice::new();
    let layout = uniform_layout(&device);
    let mut ring = DynamicUniformRing::new(&device, layout, 0, 64, 2, "test_ring").unwrap();
    assert_eq!(ring.aligned_element_size(), 256);
    assert_eq!(device.live(Kind::Buffer), 2);

    let first: Vec<_> = (0..3)
        .map(|i| ring.push(&device, &[i as u8; 64]).unwrap())
        .collect();
    assert_eq!(first[0].offset, 0);
    assert_eq!(first[1].offset, 256);
    assert_eq!(first[0].bind_group, first[1].bind_group);
    // The third element overflows the first chunk.
    assert_eq!(first[2].offset, 0);
    assert_ne!(first[2].bind_group, first[0].bind_group);
    assert_eq!(device.live(Kind::Buffer), 3);

    ring.advance();
    ring.advance();
    let again = ring.push(&device, &[7; 64]).unwrap();
    assert_eq!(
        again,
        UniformSlice {
            bind_group: first[0].bind_group,
            offset: 0,
        }
    );
    assert_eq!(device.live(Kind::Buffer), 3);

    ring.destroy(&device);
    assert_eq!(device.live(Kind::Buffer), 0);
    assert_eq!(device.destroy_failures(), 0);
}

#[test]
fn uniform_ring_reserve_avoids_mid_frame_growth() {
    let device = MockDevice::new();
    let layout = uniform_layout(&device);
    let mut ring = DynamicUniformRing::new(&device, layout, 0, 64, 2, "test_ring").unwrap();
    ring.advance();
    ring.reserve(&device, 5).unwrap();
    let buffers = device.live(Kind::Buffer);
    for i in 0..5 {
        ring.push(&device, &[i; 64]).unwrap();
    }
    assert_eq!(device.live(Kind::Buffer), buffers);
    ring.destroy(&device);
}

#[test]
fn texture_pool_recycles_matching_size_class() {
    let device = MockDevice::new();
    let mut pool = TexturePool::new(&device, &RendererConfig::default()).unwrap();

    let a = pool
        .acquire(&device, Extent2D::new(2, 2), ColorSpace::Srgb, &[1; 16])
        .unwrap();
    let texture = pool.get(a).unwrap().texture;
    assert!(pool.release(a));
    assert!(pool.get(a).is_none());

    let b = pool
        .acquire(&device, Extent2D::new(2, 2), ColorSpace::Srgb, &[2; 16])
        .unwrap();
    assert_eq!(pool.get(b).unwrap().texture, texture);
    assert_eq!(pool.allocated(), 1);

    let c = pool
        .acquire(&device, Extent2D::new(2, 2), ColorSpace::Linear, &[3; 16])
        .unwrap();
    assert_ne!(pool.get(c).unwrap().texture, texture);
    assert_eq!(pool.allocated(), 2);

    assert!(matches!(
        pool.acquire(&device, Extent2D::new(4, 4), ColorSpace::Srgb, &[0; 16]),
        Err(ResourceError::OutOfBounds)
    ));
    assert_eq!(pool.allocated(), 2);

    pool.destroy(&device);
    assert_eq!(device.live_total(), 0);
}

#[test]
fn stream_buffers_are_sized_from_batch_capacity() {
    let device = MockDevice::new();
    let mut storage = FrameVertexStorage::new();
    let kind = StreamKind::WorldTransparent;

    let mut batch = TriangleBatch::new();
    batch.reserve_for_frame(10);
    batch.push(triangle());
    batch_draw::fill(&device, &batch, &mut storage, kind).unwrap();

    let stream = *storage.current(kind);
    let buffer = stream.buffer.expect("buffer allocated");
    assert_eq!(stream.capacity, batch.capacity() * 3);
    assert_eq!(stream.vertex_count, 3);
    assert_eq!(
        device.resource(buffer.0).unwrap().size,
        (batch.capacity() * 3) as u64 * Vertex::STRIDE
    );
    assert_eq!(
        device.resource(buffer.0).unwrap().label,
        "world_transparent_vertices [slot 0]"
    );

    // Growing replaces the buffer, a batch that still fits reuses it.
    batch.reserve_for_frame(batch.capacity() * 4);
    batch_draw::fill(&device, &batch, &mut storage, kind).unwrap();
    let grown = storage.current(kind).buffer.unwrap();
    assert_ne!(grown, buffer);
    assert_eq!(device.live(Kind::Buffer), 1);
    batch.clear();
    batch_draw::fill(&device, &batch, &mut storage, kind).unwrap();
    assert_eq!(storage.current(kind).buffer, Some(grown));
    assert_eq!(storage.current(kind).vertex_count, 0);

    storage.destroy(&device);
    assert_eq!(device.live_total(), 0);
}

#[test]
fn empty_stream_never_allocates() {
    let device = MockDevice::new();
    let mut storage = FrameVertexStorage::new();
    batch_draw::fill(&device, &TriangleBatch::new(), &mut storage, StreamKind::WorldOpaque)
        .unwrap();
    assert_eq!(storage.current(StreamKind::WorldOpaque).buffer, None);
    assert_eq!(device.live_total(), 0);
}

#[test]
fn each_frame_slot_owns_its_buffers() {
    let device = MockDevice::new();
    let mut storage = FrameVertexStorage::new();
    let mut batch = TriangleBatch::new();
    batch.push(triangle());

    let mut per_slot = Vec::new();
    for _ in 0..4 {
        storage.swap_next();
        batch_draw::fill(&device, &batch, &mut storage, StreamKind::ForegroundOpaque).unwrap();
        per_slot.push((
            storage.current_index(),
            storage.current(StreamKind::ForegroundOpaque).buffer,
        ));
    }
    assert_eq!(per_slot[0], per_slot[2]);
    assert_eq!(per_slot[1], per_slot[3]);
    assert_ne!(per_slot[0].1, per_slot[1].1);
    assert_eq!(device.live(Kind::Buffer), 2);
}
