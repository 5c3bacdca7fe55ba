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

//! Defines the `LinearRgba` color type and the sRGB transfer functions.

use crate::math::vector::Vec4;

/// A color in **linear RGBA** space with `f32` components.
///
/// Every color that reaches the pipeline is linear: vertex colors are decoded
/// from the legacy packed sRGB form, blended in linear space and only encoded
/// again by the final display pass. Components may exceed `1.0` (HDR).
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LinearRgba {
    /// The red component in linear space.
    pub r: f32,
    /// The green component in linear space.
    pub g: f32,
    /// The blue component in linear space.
    pub b: f32,
    /// The alpha (opacity) component, never gamma encoded.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white (`[1.0, 1.0, 1.0, 1.0]`).
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black (`[0.0, 0.0, 0.0, 1.0]`).
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black (`[0.0, 0.0, 0.0, 0.0]`).
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new `LinearRgba` with explicit RGBA values.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque `LinearRgba` (alpha = 1.0).
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Decodes 8-bit sRGB channels. RGB are linearized, alpha is only normalized.
    pub fn from_srgb_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: srgb_to_linear(r as f32 / 255.0),
            g: srgb_to_linear(g as f32 / 255.0),
            b: srgb_to_linear(b as f32 / 255.0),
            a: a as f32 / 255.0,
        }
    }

    /// Decodes a legacy packed `0xAARRGGBB` color (the D3DCOLOR layout).
    pub fn from_packed_argb(packed: u32) -> Self {
        let [b, g, r, a] = packed.to_le_bytes();
        Self::from_srgb_rgba8(r, g, b, a)
    }

    /// Returns the color with RGB scaled by alpha.
    #[inline]
    pub fn premultiplied(&self) -> Self {
        Self::new(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    /// Encodes the RGB channels back to sRGB. Alpha is left untouched.
    pub fn to_srgb(&self) -> [f32; 4] {
        [
            linear_to_srgb(self.r),
            linear_to_srgb(self.g),
            linear_to_srgb(self.b),
            self.a,
        ]
    }

    /// Converts this color to a [`Vec4`].
    #[inline]
    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    /// Returns the components as an array.
    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for LinearRgba {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// Converts one sRGB encoded component to linear space.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Converts one linear component to sRGB space.
#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transfer_functions_are_inverse() {
        for i in 0..=255u8 {
            let c = i as f32 / 255.0;
            assert_relative_eq!(linear_to_srgb(srgb_to_linear(c)), c, epsilon = 1e-5);
        }
    }

    #[test]
    fn packed_argb_channel_order() {
        let c = LinearRgba::from_packed_argb(0x80FF0000);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 0.0);
        assert_relative_eq!(c.b, 0.0);
        assert_relative_eq!(c.a, 128.0 / 255.0);

        let blue = LinearRgba::from_packed_argb(0xFF0000FF);
        assert_relative_eq!(blue.b, 1.0);
        assert_relative_eq!(blue.r, 0.0);
        assert_relative_eq!(blue.a, 1.0);
    }

    #[test]
    fn mid_grey_linearizes_to_reference_value() {
        // 0x80 in sRGB is 0.2158605 in linear space.
        let c = LinearRgba::from_packed_argb(0xFF808080);
        assert_relative_eq!(c.r, 0.215_860_5, epsilon = 1e-5);
        assert_relative_eq!(c.g, c.r);
        assert_relative_eq!(c.b, c.r);
    }

    #[test]
    fn premultiply_scales_rgb_only() {
        let c = LinearRgba::new(0.5, 1.0, 0.25, 0.5).premultiplied();
        assert_eq!(c, LinearRgba::new(0.25, 0.5, 0.125, 0.5));
    }
}
