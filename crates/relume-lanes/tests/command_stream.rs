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

use relume_core::asset::MaterialId;
use relume_core::math::{Extent2D, LinearRgba};
use relume_lanes::command_lane::{ExecuteBufferWriter, ScreenTransform, TlVertex};
use relume_lanes::{CommandInterpreter, Diagnostic, FrameBatches, StreamKind, Viewport};

const TEXTURE_HANDLE: u32 = 1;
const Z_WRITE_ENABLE: u32 = 14;
const ALPHA_BLEND_ENABLE: u32 = 27;

fn interpreter() -> CommandInterpreter {
    CommandInterpreter::new(ScreenTransform::new(
        Extent2D::new(640, 480),
        Extent2D::new(640, 480),
    ))
}

fn vertices(count: usize) -> Vec<TlVertex> {
    (0..count)
        .map(|i| TlVertex {
            sx: (i * 37 % 640) as f32,
            sy: (i * 53 % 480) as f32,
            sz: 0.5,
            rhw: 1.0 / (1.0 + i as f32),
            color: 0xFF808080,
            ..Default::default()
        })
        .collect()
}

fn run(buffer: &[u8], vertices: &[TlVertex]) -> (FrameBatches, relume_lanes::ExecuteReport) {
    let mut batches = FrameBatches::new();
    let report = interpreter().execute(buffer, vertices, &Viewport::default(), &mut batches);
    (batches, report)
}

#[test]
fn texture_handle_then_triangle_lands_in_world_opaque() {
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(TEXTURE_HANDLE, 5)]).triangles(&[[0, 1, 2]]);
    let (batches, report) = run(w.as_bytes(), &vertices(3));

    assert!(report.is_clean());
    assert_eq!(report.triangles_appended, 1);
    let opaque = &batches[StreamKind::WorldOpaque];
    assert_eq!(opaque.len(), 1);
    assert_eq!(opaque.as_slice()[0].material, MaterialId(5));
    assert_eq!(batches.total_triangles(), 1);
}

#[test]
fn alpha_blend_routes_to_world_transparent() {
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(ALPHA_BLEND_ENABLE, 1), (TEXTURE_HANDLE, 5)])
        .triangles(&[[0, 1, 2]]);
    let (batches, _) = run(w.as_bytes(), &vertices(3));

    assert!(batches[StreamKind::WorldOpaque].is_empty());
    let transparent = &batches[StreamKind::WorldTransparent];
    assert_eq!(transparent.len(), 1);
    assert_eq!(transparent.as_slice()[0].material, MaterialId(5));
}

#[test]
fn triangles_partition_by_layer_and_transparency() {
    let mut w = ExecuteBufferWriter::new();
    w.triangles(&[[0, 1, 2]])
        .states(&[(ALPHA_BLEND_ENABLE, 1)])
        .triangles(&[[1, 2, 3], [2, 3, 4]])
        .states(&[(Z_WRITE_ENABLE, 0), (ALPHA_BLEND_ENABLE, 0)])
        .triangles(&[[3, 4, 5]])
        .states(&[(ALPHA_BLEND_ENABLE, 1)])
        .triangles(&[[4, 5, 0], [5, 0, 1], [0, 2, 4]])
        // Re-enabling depth writes does not leave the foreground layer.
        .states(&[(Z_WRITE_ENABLE, 1)])
        .triangles(&[[1, 3, 5]]);
    let (batches, report) = run(w.as_bytes(), &vertices(6));

    assert!(report.is_clean());
    assert_eq!(batches[StreamKind::WorldOpaque].len(), 1);
    assert_eq!(batches[StreamKind::WorldTransparent].len(), 2);
    assert_eq!(batches[StreamKind::ForegroundOpaque].len(), 1);
    assert_eq!(batches[StreamKind::ForegroundTransparent].len(), 4);
    assert_eq!(batches.total_triangles(), report.triangles_appended);
}

#[test]
fn unknown_opcode_mid_stream_does_not_stop_later_triangles() {
    let mut w = ExecuteBufferWriter::new();
    w.triangles(&[[0, 1, 2]])
        .group(0x42, 12, &[&[0xAA; 12], &[0xBB; 12]])
        .triangles(&[[2, 1, 0]]);
    let (batches, report) = run(w.as_bytes(), &vertices(3));

    assert_eq!(batches[StreamKind::WorldOpaque].len(), 2);
    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::UnknownOpcode {
            opcode: 0x42,
            offset: 12,
            count: 2,
        }]
    );
    assert_eq!(report.bytes_consumed, w.as_bytes().len());
}

#[test]
fn consumed_bytes_match_record_sizes_times_counts() {
    let mut w = ExecuteBufferWriter::new();
    w.process_vertices(2, 0, 0, 4)
        .states(&[(TEXTURE_HANDLE, 2), (9, 2), (ALPHA_BLEND_ENABLE, 0)])
        // Oversized records: the interpreter must step by the declared size.
        .group(3, 12, &[&[0, 0, 1, 0, 2, 0], &[1, 0, 2, 0, 3, 0]])
        .group(0x50, 3, &[&[1, 2, 3]])
        .exit();
    let bytes = w.as_bytes();
    let (batches, report) = run(bytes, &vertices(4));

    let expected_records = 16 + 3 * 8 + 2 * 12 + 3;
    assert_eq!(report.groups, 5);
    assert_eq!(report.records, 1 + 3 + 2 + 1 + 1);
    assert_eq!(report.record_bytes, expected_records);
    assert_eq!(report.bytes_consumed, bytes.len());
    assert_eq!(report.bytes_consumed, expected_records + 5 * 4);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(batches[StreamKind::WorldOpaque].len(), 2);
    assert!(batches[StreamKind::WorldOpaque]
        .iter()
        .all(|t| t.material == MaterialId(2)));
}

#[test]
fn truncated_buffer_stops_at_last_complete_group() {
    let mut w = ExecuteBufferWriter::new();
    w.triangles(&[[0, 1, 2]]);
    let complete = w.as_bytes().len();
    w.triangles(&[[0, 1, 2], [1, 2, 0]]);
    let full = w.into_bytes();

    for cut in complete + 1..full.len() {
        let (batches, report) = run(&full[..cut], &vertices(3));
        assert_eq!(batches[StreamKind::WorldOpaque].len(), 1, "cut at {cut}");
        assert!(report.was_truncated(), "cut at {cut}");
        assert_eq!(report.bytes_consumed, complete);
        assert_eq!(report.groups, 1);
    }
}

#[test]
fn header_cut_short_is_reported_not_read() {
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(TEXTURE_HANDLE, 1)]);
    let mut bytes = w.into_bytes();
    bytes.extend_from_slice(&[3, 8]);
    let (_, report) = run(&bytes, &[]);

    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::Truncated {
            offset: 12,
            needed: 4,
            available: 2,
        }]
    );
}

#[test]
fn sorted_transparent_batch_is_stable_and_idempotent() {
    // Vertices 0..3 share a depth, so triangles built from them tie.
    let mut verts = vertices(6);
    for v in &mut verts[..3] {
        v.rhw = 0.5;
    }
    let mut w = ExecuteBufferWriter::new();
    w.states(&[(ALPHA_BLEND_ENABLE, 1)]);
    for material in 1..=4u32 {
        w.states(&[(TEXTURE_HANDLE, material)])
            .triangles(&[[0, 1, 2]]);
    }
    w.states(&[(TEXTURE_HANDLE, 9)]).triangles(&[[3, 4, 5]]);
    let (mut batches, _) = run(w.as_bytes(), &verts);

    batches.sort_transparent();
    let once: Vec<_> = batches[StreamKind::WorldTransparent]
        .iter()
        .map(|t| t.material)
        .collect();
    batches.sort_transparent();
    let twice: Vec<_> = batches[StreamKind::WorldTransparent]
        .iter()
        .map(|t| t.material)
        .collect();

    // The far triangle comes first, ties keep submission order.
    assert_eq!(once, [9, 1, 2, 3, 4].map(MaterialId).to_vec());
    assert_eq!(once, twice);
}

#[test]
fn packed_color_converts_to_linear_premultiplied() {
    let mut verts = vertices(3);
    verts[0].color = 0x80FF4000;
    let mut w = ExecuteBufferWriter::new();
    w.triangles(&[[0, 1, 2]]);
    let (batches, _) = run(w.as_bytes(), &verts);

    let color = batches[StreamKind::WorldOpaque].as_slice()[0].vertices[0].color;
    let a = 128.0 / 255.0;
    let expected = LinearRgba::new(
        1.0 * a,
        relume_core::math::color::srgb_to_linear(64.0 / 255.0) * a,
        0.0,
        a,
    );
    approx::assert_relative_eq!(color.r, expected.r, epsilon = 1e-6);
    approx::assert_relative_eq!(color.g, expected.g, epsilon = 1e-6);
    approx::assert_relative_eq!(color.b, expected.b, epsilon = 1e-6);
    approx::assert_relative_eq!(color.a, expected.a, epsilon = 1e-6);
}

#[test]
fn copy_with_extra_flags_is_reported_but_not_fatal() {
    const UPDATE_EXTENTS: u32 = 0x8;
    let mut w = ExecuteBufferWriter::new();
    w.process_vertices(2 | UPDATE_EXTENTS, 0, 0, 3)
        .triangles(&[[0, 1, 2]])
        .exit();
    let (batches, report) = run(w.as_bytes(), &vertices(3));

    assert_eq!(report.diagnostics.len(), 1);
    assert!(matches!(
        report.diagnostics[0],
        Diagnostic::Unimplemented { .. }
    ));
    assert_eq!(batches[StreamKind::WorldOpaque].len(), 1);
}
