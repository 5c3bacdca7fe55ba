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

//! Geometry batching: the four per-frame triangle streams.
//!
//! Every triangle produced by the interpreter lands in exactly one
//! [`TriangleBatch`], chosen by [`StreamKind::select`]. Opaque batches keep
//! submission order, transparent ones are sorted back to front before they
//! are flushed to the GPU.

use relume_core::asset::MaterialId;
use relume_core::math::{LinearRgba, Vec2, Vec3, Vec4};
use std::ops::{Index, IndexMut};

/// One GPU vertex of the game passes.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Position after the screen transform: `(x*w, y*w, -z*w, w)`.
    pub position: Vec4,
    /// Texture coordinates.
    pub uv: Vec2,
    /// Linear, premultiplied vertex color.
    pub color: LinearRgba,
    /// Face normal of the owning triangle.
    pub normal: Vec3,
}

impl Vertex {
    /// Size of one vertex in a vertex buffer.
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    /// Creates a vertex whose normal is filled in by [`Triangle::new`].
    pub fn new(position: Vec4, uv: Vec2, color: LinearRgba) -> Self {
        Self {
            position,
            uv,
            color,
            normal: Vec3::ZERO,
        }
    }
}

/// Three vertices drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// The corners, in submission order.
    pub vertices: [Vertex; 3],
    /// Material the triangle is drawn with.
    pub material: MaterialId,
}

impl Triangle {
    /// Builds a triangle and stamps its face normal on every vertex.
    ///
    /// The normal is computed from the transformed xyz positions and is the
    /// zero vector for degenerate triangles.
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex, material: MaterialId) -> Self {
        let p0 = v0.position.truncate();
        let e1 = v1.position.truncate() - p0;
        let e2 = v2.position.truncate() - p0;
        let normal = e1.cross(e2).normalize();

        let mut vertices = [v0, v1, v2];
        for v in &mut vertices {
            v.normal = normal;
        }
        Self { vertices, material }
    }

    /// The face normal.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.vertices[0].normal
    }

    /// Sort key: mean view depth of the three corners.
    #[inline]
    pub fn depth_key(&self) -> f32 {
        (self.vertices[0].position.w + self.vertices[1].position.w + self.vertices[2].position.w)
            / 3.0
    }
}

/// Which part of the scene a triangle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderLayer {
    /// The level.
    #[default]
    World,
    /// The first-person weapon overlay, drawn on top of the world.
    Foreground,
}

/// One of the four triangle streams of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Opaque level geometry.
    WorldOpaque,
    /// Blended level geometry.
    WorldTransparent,
    /// Opaque weapon geometry.
    ForegroundOpaque,
    /// Blended weapon geometry.
    ForegroundTransparent,
}

impl StreamKind {
    /// All streams, in draw order.
    pub const ALL: [StreamKind; 4] = [
        StreamKind::WorldOpaque,
        StreamKind::WorldTransparent,
        StreamKind::ForegroundOpaque,
        StreamKind::ForegroundTransparent,
    ];

    /// Maps a render state to its stream.
    pub const fn select(layer: RenderLayer, is_transparent: bool) -> Self {
        match (layer, is_transparent) {
            (RenderLayer::World, false) => StreamKind::WorldOpaque,
            (RenderLayer::World, true) => StreamKind::WorldTransparent,
            (RenderLayer::Foreground, false) => StreamKind::ForegroundOpaque,
            (RenderLayer::Foreground, true) => StreamKind::ForegroundTransparent,
        }
    }

    /// Whether the stream is sorted back to front.
    pub const fn is_transparent(&self) -> bool {
        matches!(
            self,
            StreamKind::WorldTransparent | StreamKind::ForegroundTransparent
        )
    }

    /// Position of the stream in [`StreamKind::ALL`].
    pub const fn index(&self) -> usize {
        match self {
            StreamKind::WorldOpaque => 0,
            StreamKind::WorldTransparent => 1,
            StreamKind::ForegroundOpaque => 2,
            StreamKind::ForegroundTransparent => 3,
        }
    }

    /// A short name for labels and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            StreamKind::WorldOpaque => "world_opaque",
            StreamKind::WorldTransparent => "world_transparent",
            StreamKind::ForegroundOpaque => "foreground_opaque",
            StreamKind::ForegroundTransparent => "foreground_transparent",
        }
    }
}

/// An ordered list of triangles for one stream.
#[derive(Debug, Clone, Default)]
pub struct TriangleBatch {
    triangles: Vec<Triangle>,
}

impl TriangleBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a triangle.
    #[inline]
    pub fn push(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// Stable sort by descending depth key, farthest first.
    pub fn sort_back_to_front(&mut self) {
        self.triangles
            .sort_by(|a, b| b.depth_key().total_cmp(&a.depth_key()));
    }

    /// Removes every triangle, keeping the allocation.
    pub fn clear(&mut self) {
        self.triangles.clear();
    }

    /// Number of triangles.
    #[inline]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the batch holds no triangle.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Allocated triangle capacity. GPU storage is sized from this.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.triangles.capacity()
    }

    /// Iterates the triangles in draw order.
    pub fn iter(&self) -> std::slice::Iter<'_, Triangle> {
        self.triangles.iter()
    }

    /// The triangles as a slice.
    pub fn as_slice(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Makes room for at least `expected` triangles, at least doubling the
    /// capacity when it has to grow.
    pub fn reserve_for_frame(&mut self, expected: usize) {
        let capacity = self.triangles.capacity();
        if capacity < expected {
            let target = expected.max(capacity * 2);
            self.triangles.reserve_exact(target - self.triangles.len());
        }
    }
}

impl<'a> IntoIterator for &'a TriangleBatch {
    type Item = &'a Triangle;
    type IntoIter = std::slice::Iter<'a, Triangle>;

    fn into_iter(self) -> Self::IntoIter {
        self.triangles.iter()
    }
}

/// The four streams of a frame.
#[derive(Debug, Clone, Default)]
pub struct FrameBatches {
    batches: [TriangleBatch; 4],
}

impl FrameBatches {
    /// Creates four empty batches.
    pub fn new() -> Self {
        Self::default()
    }

    /// The batch of a stream.
    #[inline]
    pub fn get(&self, kind: StreamKind) -> &TriangleBatch {
        &self.batches[kind.index()]
    }

    /// The batch of a stream, mutably.
    #[inline]
    pub fn get_mut(&mut self, kind: StreamKind) -> &mut TriangleBatch {
        &mut self.batches[kind.index()]
    }

    /// Sorts the transparent streams back to front.
    pub fn sort_transparent(&mut self) {
        for kind in StreamKind::ALL {
            if kind.is_transparent() {
                self.get_mut(kind).sort_back_to_front();
            }
        }
    }

    /// Clears every stream.
    pub fn clear_all(&mut self) {
        self.batches.iter_mut().for_each(TriangleBatch::clear);
    }

    /// Triangle count over all streams.
    pub fn total_triangles(&self) -> usize {
        self.batches.iter().map(TriangleBatch::len).sum()
    }
}

impl Index<StreamKind> for FrameBatches {
    type Output = TriangleBatch;

    fn index(&self, kind: StreamKind) -> &TriangleBatch {
        self.get(kind)
    }
}

impl IndexMut<StreamKind> for FrameBatches {
    fn index_mut(&mut self, kind: StreamKind) -> &mut TriangleBatch {
        self.get_mut(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri_at_depth(w: f32, material: u32) -> Triangle {
        let v = |x: f32, y: f32| Vertex::new(Vec4::new(x, y, 0.0, w), Vec2::ZERO, LinearRgba::WHITE);
        Triangle::new(v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0), MaterialId(material))
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(Vertex::STRIDE, 52);
    }

    #[test]
    fn face_normal_is_stamped_on_every_vertex() {
        let t = tri_at_depth(1.0, 0);
        assert_eq!(t.normal(), Vec3::new(0.0, 0.0, 1.0));
        assert!(t.vertices.iter().all(|v| v.normal == t.normal()));
    }

    #[test]
    fn degenerate_triangle_has_zero_normal() {
        let v = Vertex::new(Vec4::new(1.0, 1.0, 1.0, 1.0), Vec2::ZERO, LinearRgba::WHITE);
        let t = Triangle::new(v, v, v, MaterialId::DEFAULT);
        assert_eq!(t.normal(), Vec3::ZERO);
    }

    #[test]
    fn depth_key_is_mean_w() {
        let mut t = tri_at_depth(1.0, 0);
        t.vertices[1].position.w = 4.0;
        assert_relative_eq!(t.depth_key(), 2.0);
    }

    #[test]
    fn select_is_a_four_way_partition() {
        let mut seen = std::collections::HashSet::new();
        for layer in [RenderLayer::World, RenderLayer::Foreground] {
            for transparent in [false, true] {
                let kind = StreamKind::select(layer, transparent);
                assert_eq!(kind.is_transparent(), transparent);
                assert!(seen.insert(kind));
            }
        }
        assert_eq!(seen.len(), 4);
        for (i, kind) in StreamKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn sort_is_back_to_front_stable_and_idempotent() {
        let mut batch = TriangleBatch::new();
        batch.push(tri_at_depth(1.0, 1));
        batch.push(tri_at_depth(5.0, 2));
        batch.push(tri_at_depth(1.0, 3));
        batch.push(tri_at_depth(3.0, 4));

        batch.sort_back_to_front();
        let order: Vec<u32> = batch.iter().map(|t| t.material.0).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);

        batch.sort_back_to_front();
        let again: Vec<u32> = batch.iter().map(|t| t.material.0).collect();
        assert_eq!(again, order);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut batch = TriangleBatch::new();
        batch.reserve_for_frame(100);
        let capacity = batch.capacity();
        assert!(capacity >= 100);
        batch.push(tri_at_depth(1.0, 0));
        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.capacity(), capacity);
    }

    #[test]
    fn reserve_grows_geometrically() {
        let mut batch = TriangleBatch::new();
        batch.reserve_for_frame(64);
        let first = batch.capacity();
        batch.reserve_for_frame(first + 1);
        assert!(batch.capacity() >= first * 2);
    }

    #[test]
    fn frame_batches_only_sort_transparent_streams() {
        let mut frame = FrameBatches::new();
        for kind in StreamKind::ALL {
            frame[kind].push(tri_at_depth(1.0, 1));
            frame[kind].push(tri_at_depth(2.0, 2));
        }
        frame.sort_transparent();
        assert_eq!(frame.total_triangles(), 8);
        for kind in StreamKind::ALL {
            let first = frame[kind].iter().next().map(|t| t.material.0);
            let expected = if kind.is_transparent() { 2 } else { 1 };
            assert_eq!(first, Some(expected), "{}", kind.name());
        }
        frame.clear_all();
        assert_eq!(frame.total_triangles(), 0);
    }
}
