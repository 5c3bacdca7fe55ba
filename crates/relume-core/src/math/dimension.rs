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

//! Integer extents and origins for textures and render targets.

/// A two-dimensional extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by the extent.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Divides both sides by `divisor`, never going below one pixel.
    pub fn scaled_down(&self, divisor: u32) -> Self {
        Self {
            width: (self.width / divisor.max(1)).max(1),
            height: (self.height / divisor.max(1)).max(1),
        }
    }

    /// Returns the 3D extent with a single layer.
    pub const fn to_3d(&self) -> Extent3D {
        Extent3D {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl From<(u32, u32)> for Extent2D {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// A three-dimensional extent, representing width, height, and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth or number of array layers.
    pub depth_or_array_layers: u32,
}

/// A three-dimensional origin, representing an (x, y, z) offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3D {
    /// The x-coordinate of the origin.
    pub x: u32,
    /// The y-coordinate of the origin.
    pub y: u32,
    /// The z-coordinate or array layer of the origin.
    pub z: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_down_clamps_to_one_pixel() {
        let e = Extent2D::new(640, 480);
        assert_eq!(e.scaled_down(2), Extent2D::new(320, 240));
        assert_eq!(e.scaled_down(1024), Extent2D::new(1, 1));
        assert_eq!(e.scaled_down(0), e);
    }
}
