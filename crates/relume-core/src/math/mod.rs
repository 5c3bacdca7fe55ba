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

//! Math primitives used by the renderer: small vectors, linear colors and
//! texture extents.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub mod color;
pub mod dimension;
pub mod vector;

pub use self::color::LinearRgba;
pub use self::dimension::{Extent2D, Extent3D, Origin3D};
pub use self::vector::{Vec2, Vec3, Vec4};

/// Linearly interpolates between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
