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

use relume_core::math::Extent2D;
use relume_lanes::render_lane::post_chain::{
    bloom_cascade, bloom_weights, compose_final, RgbaImage, BLOOM_THRESHOLD,
};

fn without_bloom(working: &RgbaImage) -> Vec<u8> {
    compose_final(working, &[], &[]).to_rgba8()
}

fn with_bloom(working: &RgbaImage) -> Vec<u8> {
    compose_final(working, &bloom_cascade(working), &bloom_weights()).to_rgba8()
}

#[test]
fn scene_below_threshold_is_unchanged_by_bloom() {
    let extent = Extent2D::new(96, 64);
    let working = RgbaImage::from_fn(extent, |x, y| {
        let t = (x + y) as f32 / (extent.width + extent.height) as f32;
        [t * BLOOM_THRESHOLD, 0.5, 1.0 - t, 1.0]
    });

    assert_eq!(with_bloom(&working), without_bloom(&working));
}

#[test]
fn bloom_stays_around_bright_regions() {
    let extent = Extent2D::new(512, 512);
    let working = RgbaImage::from_fn(extent, |x, y| {
        if x < 8 && y < 8 {
            [4.0, 4.0, 4.0, 1.0]
        } else {
            [0.1, 0.1, 0.1, 1.0]
        }
    });
    let plain = without_bloom(&working);
    let bloomed = with_bloom(&working);
    let at = |image: &[u8], x: u32, y: u32| {
        let i = ((y * extent.width + x) * 4) as usize;
        [image[i], image[i + 1], image[i + 2], image[i + 3]]
    };

    assert!(at(&bloomed, 10, 4)[0] > at(&plain, 10, 4)[0]);
    assert_eq!(at(&bloomed, 500, 500), at(&plain, 500, 500));
    assert_eq!(at(&bloomed, 10, 4)[3], 255);
}
