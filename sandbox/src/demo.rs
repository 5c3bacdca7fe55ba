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

//! A built-in scene that touches every stream of the pipeline.

use crate::capture::CaptureFrame;
use relume_core::math::Extent2D;
use relume_lanes::command_lane::{ExecuteBufferWriter, TlVertex};

const TEXTURE_HANDLE: u32 = 1;
const Z_WRITE_ENABLE: u32 = 14;
const ALPHA_BLEND_ENABLE: u32 = 27;

fn quad(vertices: &mut Vec<TlVertex>, rect: [f32; 4], depth: f32, color: u32) -> [[u16; 3]; 2] {
    let base = vertices.len() as u16;
    let [x0, y0, x1, y1] = rect;
    for (sx, sy) in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
        vertices.push(TlVertex {
            sx,
            sy,
            sz: depth,
            rhw: 1.0 / (1.0 + depth * 20.0),
            color,
            tu: if sx == x0 { 0.0 } else { 1.0 },
            tv: if sy == y0 { 0.0 } else { 1.0 },
            ..Default::default()
        });
    }
    [[base, base + 1, base + 2], [base, base + 2, base + 3]]
}

/// Builds `frames` frames of the demo scene laid out for the `internal`
/// resolution. The emissive block drifts a little every frame.
pub fn demo_frames(internal: Extent2D, frames: usize) -> Vec<CaptureFrame> {
    let (w, h) = (internal.width as f32, internal.height as f32);
    (0..frames.max(1))
        .map(|frame| {
            let drift = frame as f32 * w * 0.01;
            let mut vertices = Vec::new();
            let floor = quad(&mut vertices, [0.0, h * 0.55, w, h], 0.8, 0xFF8C8C8C);
            let wall = quad(&mut vertices, [w * 0.1, h * 0.1, w * 0.6, h * 0.6], 0.6, 0xFFC0A080);
            let lamp = quad(
                &mut vertices,
                [w * 0.65 + drift, h * 0.2, w * 0.8 + drift, h * 0.35],
                0.5,
                0xFFFFFFFF,
            );
            let glass = quad(&mut vertices, [w * 0.3, h * 0.3, w * 0.7, h * 0.8], 0.4, 0x80407FFF);
            let weapon = quad(&mut vertices, [w * 0.6, h * 0.7, w * 0.9, h], 0.05, 0xFF606060);
            let muzzle = quad(&mut vertices, [w * 0.55, h * 0.6, w * 0.65, h * 0.72], 0.04, 0xC0FFD080);

            let mut w = ExecuteBufferWriter::new();
            w.process_vertices(2, 0, 0, vertices.len() as u32)
                .states(&[(TEXTURE_HANDLE, 1)])
                .triangles(&floor)
                .states(&[(TEXTURE_HANDLE, 2)])
                .triangles(&wall)
                .states(&[(TEXTURE_HANDLE, 4)])
                .triangles(&lamp)
                .states(&[(ALPHA_BLEND_ENABLE, 1), (TEXTURE_HANDLE, 6)])
                .triangles(&glass)
                .states(&[(Z_WRITE_ENABLE, 0), (ALPHA_BLEND_ENABLE, 0), (TEXTURE_HANDLE, 3)])
                .triangles(&weapon)
                .states(&[(ALPHA_BLEND_ENABLE, 1), (TEXTURE_HANDLE, 0)])
                .triangles(&muzzle)
                .exit();
            CaptureFrame {
                vertices,
                commands: w.into_bytes(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relume_lanes::command_lane::ScreenTransform;
    use relume_lanes::{CommandInterpreter, FrameBatches, StreamKind, Viewport};

    #[test]
    fn demo_fills_all_four_streams_cleanly() {
        let internal = Extent2D::new(320, 240);
        let frames = demo_frames(internal, 2);
        assert_eq!(frames.len(), 2);
        assert_ne!(frames[0].vertices, frames[1].vertices);

        let mut interpreter = CommandInterpreter::new(ScreenTransform::new(internal, internal));
        let mut batches = FrameBatches::new();
        let report = interpreter.execute(
            &frames[0].commands,
            &frames[0].vertices,
            &Viewport::default(),
            &mut batches,
        );
        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert_eq!(batches[StreamKind::WorldOpaque].len(), 6);
        assert_eq!(batches[StreamKind::WorldTransparent].len(), 2);
        assert_eq!(batches[StreamKind::ForegroundOpaque].len(), 2);
        assert_eq!(batches[StreamKind::ForegroundTransparent].len(), 2);
    }
}
