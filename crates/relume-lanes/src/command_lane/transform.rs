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

//! Mapping from legacy screen-space vertices to pipeline positions.

use super::wire::TlVertex;
use relume_core::math::{Extent2D, Vec2, Vec4};

/// A pixel rectangle on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayArea {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl DisplayArea {
    /// Fits a content aspect ratio inside `display`, centred, with bars on
    /// the sides (pillarbox) or on top and bottom (letterbox).
    pub fn fit(display: Extent2D, internal: Extent2D) -> Self {
        let aspect = internal.width as f32 / internal.height.max(1) as f32;

        let width_if_height_fits = (aspect * display.height as f32) as u32;
        if width_if_height_fits <= display.width {
            return Self {
                x: (display.width - width_if_height_fits) / 2,
                y: 0,
                width: width_if_height_fits,
                height: display.height,
            };
        }

        let height_if_width_fits = (display.width as f32 / aspect) as u32;
        Self {
            x: 0,
            y: display.height.saturating_sub(height_if_width_fits) / 2,
            width: display.width,
            height: height_if_width_fits,
        }
    }

    /// Whether a display pixel lies inside the area.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Converts pre-transformed vertices into the homogeneous positions the game
/// passes consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTransform {
    scale: Vec2,
    offset: Vec2,
    area: DisplayArea,
}

impl ScreenTransform {
    /// Builds the transform for a display resolution and the resolution the
    /// legacy content renders at.
    pub fn new(display: Extent2D, internal: Extent2D) -> Self {
        let dw = display.width.max(1) as f32;
        let dh = display.height.max(1) as f32;
        let area = DisplayArea::fit(display, internal);
        Self {
            scale: Vec2::new(2.0 / dw, 2.0 / dh),
            offset: Vec2::new(area.x as f32 / dw * 2.0, area.y as f32 / dh * 2.0),
            area,
        }
    }

    /// The letterboxed area the content occupies. The host remaps cursor
    /// coordinates through it.
    pub fn display_area(&self) -> DisplayArea {
        self.area
    }

    /// Pixel to NDC scale.
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// NDC offset of the area's top-left corner.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Maps one vertex to `(x*w, y*w, -z*w, w)`, with `w = 1 / rhw`.
    ///
    /// A zero `rhw` (full screen overlays) is treated as `w = 1`.
    pub fn transform(&self, v: &TlVertex) -> Vec4 {
        let w = if v.rhw != 0.0 { 1.0 / v.rhw } else { 1.0 };
        Vec4::new(
            w * (v.sx * self.scale.x - 1.0 + self.offset.x),
            w * (-v.sy * self.scale.y + 1.0 - self.offset.y),
            w * -v.sz,
            w,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matching_aspect_fills_the_display() {
        let area = DisplayArea::fit(Extent2D::new(640, 480), Extent2D::new(640, 480));
        assert_eq!(
            area,
            DisplayArea {
                x: 0,
                y: 0,
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn narrow_content_is_pillarboxed() {
        let area = DisplayArea::fit(Extent2D::new(1920, 1080), Extent2D::new(640, 480));
        assert_eq!(area.width, 1440);
        assert_eq!(area.height, 1080);
        assert_eq!(area.x, 240);
        assert_eq!(area.y, 0);
        assert!(area.contains(240, 0));
        assert!(!area.contains(239, 0));
    }

    #[test]
    fn wide_content_is_letterboxed() {
        let area = DisplayArea::fit(Extent2D::new(640, 480), Extent2D::new(1920, 1080));
        assert_eq!(area.width, 640);
        assert_eq!(area.height, 360);
        assert_eq!(area.x, 0);
        assert_eq!(area.y, 60);
    }

    #[test]
    fn corners_map_to_ndc() {
        let t = ScreenTransform::new(Extent2D::new(640, 480), Extent2D::new(640, 480));
        let top_left = t.transform(&TlVertex {
            rhw: 1.0,
            ..Default::default()
        });
        assert_eq!(top_left, Vec4::new(-1.0, 1.0, -0.0, 1.0));

        let bottom_right = t.transform(&TlVertex {
            sx: 640.0,
            sy: 480.0,
            sz: 0.5,
            rhw: 1.0,
            ..Default::default()
        });
        assert_relative_eq!(bottom_right.x, 1.0);
        assert_relative_eq!(bottom_right.y, -1.0);
        assert_relative_eq!(bottom_right.z, -0.5);
    }

    #[test]
    fn positions_are_scaled_by_w() {
        let t = ScreenTransform::new(Extent2D::new(640, 480), Extent2D::new(640, 480));
        let p = t.transform(&TlVertex {
            sx: 320.0,
            sy: 240.0,
            sz: 0.25,
            rhw: 0.5,
            ..Default::default()
        });
        assert_relative_eq!(p.w, 2.0);
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 0.0);
        assert_relative_eq!(p.z, -0.5);
    }

    #[test]
    fn zero_rhw_means_unit_w() {
        let t = ScreenTransform::new(Extent2D::new(640, 480), Extent2D::new(640, 480));
        let p = t.transform(&TlVertex {
            sx: 640.0,
            sz: 1.0,
            ..Default::default()
        });
        assert_eq!(p.w, 1.0);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.z, -1.0);
    }

    #[test]
    fn pillarbox_offset_shifts_x() {
        let t = ScreenTransform::new(Extent2D::new(1920, 1080), Extent2D::new(640, 480));
        assert_relative_eq!(t.offset().x, 240.0 / 1920.0 * 2.0);
        assert_relative_eq!(t.offset().y, 0.0);
    }
}
