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

//! CPU reference of the bloom post chain.
//!
//! Mirrors `low_pass.wgsl`, `gauss3.wgsl`, `gauss7.wgsl` and `to_srgb.wgsl`
//! with the same sampling (bilinear, clamp to edge, texel centres). Used to
//! check post-processing properties without a GPU.

use relume_core::math::color::linear_to_srgb;
use relume_core::math::Extent2D;

/// Brightness above which pixels feed the bloom cascade.
pub const BLOOM_THRESHOLD: f32 = 1.0;

/// One level of the bloom cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomLayer {
    /// Size divisor relative to the display.
    pub divisor: u32,
    /// Horizontal plus vertical blur iterations.
    pub num_passes: u32,
    /// Contribution to the final image.
    pub weight: f32,
}

/// The cascade, from the largest layer to the smallest.
pub const BLOOM_CASCADE: [BloomLayer; 4] = [
    BloomLayer { divisor: 2, num_passes: 1, weight: 0.5 },
    BloomLayer { divisor: 4, num_passes: 2, weight: 0.35 },
    BloomLayer { divisor: 8, num_passes: 2, weight: 0.25 },
    BloomLayer { divisor: 16, num_passes: 3, weight: 0.15 },
];

/// Weights of the cascade, in layer order.
pub fn bloom_weights() -> [f32; 4] {
    BLOOM_CASCADE.map(|layer| layer.weight)
}

/// A float RGBA image, row major.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    /// Size in pixels.
    pub extent: Extent2D,
    /// `extent.width * extent.height` pixels.
    pub pixels: Vec<[f32; 4]>,
}

impl RgbaImage {
    /// A black, fully transparent image.
    pub fn new(extent: Extent2D) -> Self {
        Self {
            extent,
            pixels: vec![[0.0; 4]; extent.area() as usize],
        }
    }

    /// Builds an image from a per-pixel function.
    pub fn from_fn(extent: Extent2D, mut f: impl FnMut(u32, u32) -> [f32; 4]) -> Self {
        let mut pixels = Vec::with_capacity(extent.area() as usize);
        for y in 0..extent.height {
            for x in 0..extent.width {
                pixels.push(f(x, y));
            }
        }
        Self { extent, pixels }
    }

    /// The pixel at `(x, y)`, clamped to the edges.
    pub fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.extent.width as i64 - 1) as usize;
        let y = y.clamp(0, self.extent.height as i64 - 1) as usize;
        self.pixels[y * self.extent.width as usize + x]
    }

    /// Bilinear sample at normalized coordinates.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let tx = u * self.extent.width as f32 - 0.5;
        let ty = v * self.extent.height as f32 - 0.5;
        let x0 = tx.floor();
        let y0 = ty.floor();
        let fx = tx - x0;
        let fy = ty - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.texel(x0, y0);
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);
        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Quantizes to 8-bit channels, as an `Rgba8Unorm` target stores them.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }

    fn uv(&self, x: u32, y: u32) -> (f32, f32) {
        (
            (x as f32 + 0.5) / self.extent.width as f32,
            (y as f32 + 0.5) / self.extent.height as f32,
        )
    }
}

/// Separable blur kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurKernel {
    /// `[1, 2, 1] / 4`, for the occlusion buffer.
    Gauss3,
    /// `[1, 6, 15, 20, 15, 6, 1] / 64`, for bloom.
    Gauss7,
}

impl BlurKernel {
    /// Tap weights, centred.
    pub fn weights(&self) -> &'static [f32] {
        match self {
            BlurKernel::Gauss3 => &[0.25, 0.5, 0.25],
            BlurKernel::Gauss7 => &[
                0.015625, 0.09375, 0.234375, 0.3125, 0.234375, 0.09375, 0.015625,
            ],
        }
    }
}

/// Blur axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurDirection {
    /// Along x.
    Horizontal,
    /// Along y.
    Vertical,
}

impl BlurDirection {
    /// Step between taps in normalized coordinates of a `target` sized image.
    pub fn texel_step(&self, target: Extent2D) -> [f32; 2] {
        match self {
            BlurDirection::Horizontal => [1.0 / target.width as f32, 0.0],
            BlurDirection::Vertical => [0.0, 1.0 / target.height as f32],
        }
    }
}

/// Keeps what exceeds `threshold`, alpha forced to one.
pub fn low_pass(src: &RgbaImage, threshold: f32) -> RgbaImage {
    RgbaImage {
        extent: src.extent,
        pixels: src
            .pixels
            .iter()
            .map(|p| {
                [
                    (p[0] - threshold).max(0.0),
                    (p[1] - threshold).max(0.0),
                    (p[2] - threshold).max(0.0),
                    1.0,
                ]
            })
            .collect(),
    }
}

/// One separable blur pass from `src` into a `target` sized image.
pub fn gauss_blur(
    src: &RgbaImage,
    target: Extent2D,
    direction: BlurDirection,
    kernel: BlurKernel,
) -> RgbaImage {
    let weights = kernel.weights();
    let half = (weights.len() / 2) as i32;
    let step = direction.texel_step(target);
    let mut out = RgbaImage::new(target);
    for y in 0..target.height {
        for x in 0..target.width {
            let (u, v) = out.uv(x, y);
            let mut sum = [0.0; 4];
            for (i, w) in weights.iter().enumerate() {
                let k = (i as i32 - half) as f32;
                let s = src.sample(u + step[0] * k, v + step[1] * k);
                for c in 0..4 {
                    sum[c] += s[c] * w;
                }
            }
            out.pixels[(y * target.width + x) as usize] = sum;
        }
    }
    out
}

/// Runs the bloom cascade on a working color image, returning each layer's
/// final `a` image.
pub fn bloom_cascade(working: &RgbaImage) -> Vec<RgbaImage> {
    let mut src = low_pass(working, BLOOM_THRESHOLD);
    let mut layers = Vec::with_capacity(BLOOM_CASCADE.len());
    for layer in BLOOM_CASCADE {
        let size = working.extent.scaled_down(layer.divisor);
        for _ in 0..layer.num_passes {
            let b = gauss_blur(&src, size, BlurDirection::Horizontal, BlurKernel::Gauss7);
            src = gauss_blur(&b, size, BlurDirection::Vertical, BlurKernel::Gauss7);
        }
        layers.push(src.clone());
    }
    layers
}

/// Final display conversion: working color plus weighted bloom layers,
/// encoded to sRGB with alpha one.
pub fn compose_final(working: &RgbaImage, layers: &[RgbaImage], weights: &[f32]) -> RgbaImage {
    let mut out = RgbaImage::new(working.extent);
    for y in 0..working.extent.height {
        for x in 0..working.extent.width {
            let (u, v) = out.uv(x, y);
            let mut hdr = working.sample(u, v);
            for (layer, w) in layers.iter().zip(weights) {
                let s = layer.sample(u, v);
                for c in 0..3 {
                    hdr[c] += s[c] * w;
                }
            }
            out.pixels[(y * working.extent.width + x) as usize] = [
                linear_to_srgb(hdr[0]),
                linear_to_srgb(hdr[1]),
                linear_to_srgb(hdr[2]),
                1.0,
            ];
        }
    }
    out
}
