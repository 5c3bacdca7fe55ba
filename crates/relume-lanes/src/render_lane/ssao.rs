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

//! Screen-space ambient occlusion inputs: sample kernel and rotation noise.

use bytemuck::{Pod, Zeroable};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use relume_core::math::{lerp, Extent2D, Vec3};

/// Hemisphere samples per pixel.
pub const KERNEL_SIZE: usize = 16;

/// Side of the square rotation noise texture.
pub const NOISE_SIZE: u32 = 4;

/// Seed of the kernel and noise generator. Fixed so frames are reproducible.
pub const SSAO_SEED: u64 = 0x5ca1_ab1e;

/// Sample radius, in view depth units.
pub const DEFAULT_RADIUS: f32 = 0.5;

/// Depth bias against self occlusion.
pub const DEFAULT_BIAS: f32 = 0.025;

/// Uniform block of `ssao.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SsaoUniforms {
    /// Kernel samples, xyz used.
    pub kernel: [[f32; 4]; KERNEL_SIZE],
    /// Screen size divided by the noise size, to tile the noise.
    pub noise_scale: [f32; 2],
    /// Sample radius.
    pub radius: f32,
    /// Depth bias.
    pub bias: f32,
}

impl SsaoUniforms {
    /// Builds the block for a target size.
    pub fn new(kernel: &[Vec3; KERNEL_SIZE], target: Extent2D) -> Self {
        let mut samples = [[0.0; 4]; KERNEL_SIZE];
        for (dst, k) in samples.iter_mut().zip(kernel) {
            *dst = [k.x, k.y, k.z, 0.0];
        }
        Self {
            kernel: samples,
            noise_scale: [
                target.width as f32 / NOISE_SIZE as f32,
                target.height as f32 / NOISE_SIZE as f32,
            ],
            radius: DEFAULT_RADIUS,
            bias: DEFAULT_BIAS,
        }
    }
}

/// Hemisphere kernel around +z, denser near the origin.
pub fn generate_kernel(rng: &mut Pcg32) -> [Vec3; KERNEL_SIZE] {
    let mut kernel = [Vec3::ZERO; KERNEL_SIZE];
    for (i, sample) in kernel.iter_mut().enumerate() {
        let t = i as f32 / KERNEL_SIZE as f32;
        let scale = lerp(0.1, 1.0, t * t);
        let dir = Vec3::new(
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>(),
        )
        .normalize();
        *sample = dir * (rng.random::<f32>() * scale);
    }
    kernel
}

/// RGBA8 texels of the rotation noise: random xy directions in the tangent
/// plane, mapped from `[-1, 1]` to `[0, 255]`.
pub fn generate_noise(rng: &mut Pcg32) -> Vec<u8> {
    let texels = (NOISE_SIZE * NOISE_SIZE) as usize;
    let mut data = Vec::with_capacity(texels * 4);
    for _ in 0..texels {
        let x: f32 = rng.random::<f32>() * 2.0 - 1.0;
        let y: f32 = rng.random::<f32>() * 2.0 - 1.0;
        data.extend_from_slice(&[
            ((x * 0.5 + 0.5) * 255.0).round() as u8,
            ((y * 0.5 + 0.5) * 255.0).round() as u8,
            128,
            255,
        ]);
    }
    data
}

/// Kernel and noise from the fixed seed.
pub fn default_inputs() -> ([Vec3; KERNEL_SIZE], Vec<u8>) {
    let mut rng = Pcg32::seed_from_u64(SSAO_SEED);
    let kernel = generate_kernel(&mut rng);
    let noise = generate_noise(&mut rng);
    (kernel, noise)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_lies_in_the_upper_hemisphere() {
        let (kernel, _) = default_inputs();
        for (i, k) in kernel.iter().enumerate() {
            let t = i as f32 / KERNEL_SIZE as f32;
            let max_len = lerp(0.1, 1.0, t * t);
            assert!(k.z >= 0.0, "sample {i} points down");
            assert!(k.length() <= max_len + 1e-5, "sample {i} too long");
        }
    }

    #[test]
    fn inputs_are_deterministic() {
        let (a, na) = default_inputs();
        let (b, nb) = default_inputs();
        assert_eq!(a, b);
        assert_eq!(na, nb);
        assert_eq!(na.len(), 64);
    }

    #[test]
    fn uniform_block_layout() {
        let (kernel, _) = default_inputs();
        let u = SsaoUniforms::new(&kernel, Extent2D::new(640, 480));
        assert_eq!(std::mem::size_of::<SsaoUniforms>(), 272);
        assert_eq!(u.noise_scale, [160.0, 120.0]);
        assert_eq!(u.kernel[3][3], 0.0);
    }
}
