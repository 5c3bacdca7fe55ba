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

//! Walks execute buffers and turns them into batched triangles.

use super::diagnostic::Diagnostic;
use super::state::{RenderState, RenderStateKind, StateDisposition};
use super::transform::ScreenTransform;
use super::wire::{
    InstructionHeader, Opcode, ProcessVerticesRecord, StateRecord, TlVertex, TriangleRecord,
    HEADER_SIZE,
};
use crate::batch::{FrameBatches, Triangle, Vertex};
use relume_core::math::{LinearRgba, Vec2};

/// The legacy viewport a buffer is executed against.
///
/// Positions come from the configured [`ScreenTransform`], the viewport is
/// only carried for logging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Legacy projection scale.
    pub scale: Vec2,
    /// Legacy clip extent.
    pub max: Vec2,
}

/// What one [`CommandInterpreter::execute`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Complete groups walked.
    pub groups: usize,
    /// Records in those groups.
    pub records: usize,
    /// Bytes walked, headers included.
    pub bytes_consumed: usize,
    /// Record bytes walked, `sum(record_size * count)`.
    pub record_bytes: usize,
    /// Triangles added to the batches.
    pub triangles_appended: usize,
    /// Every problem raised, in stream order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ExecuteReport {
    /// Whether the stream produced no diagnostic.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether interpretation stopped early on a truncated stream.
    pub fn was_truncated(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Truncated { .. }))
    }

    fn raise(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }
}

/// Interprets legacy execute buffers.
///
/// Owns the render state (transparency, layer, material). The state is reset
/// at the start of every submission and by [`CommandInterpreter::reset_state`]
/// after a present.
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    transform: ScreenTransform,
    state: RenderState,
}

impl CommandInterpreter {
    /// Creates an interpreter with the given screen transform.
    pub fn new(transform: ScreenTransform) -> Self {
        Self {
            transform,
            state: RenderState::default(),
        }
    }

    /// The current screen transform.
    pub fn transform(&self) -> &ScreenTransform {
        &self.transform
    }

    /// Replaces the screen transform, after a resolution change.
    pub fn set_transform(&mut self, transform: ScreenTransform) {
        self.transform = transform;
    }

    /// The current render state.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Restores the default render state.
    pub fn reset_state(&mut self) {
        self.state = RenderState::default();
    }

    /// Interprets one execute buffer, appending its triangles to `batches`.
    pub fn execute(
        &mut self,
        buffer: &[u8],
        vertices: &[TlVertex],
        viewport: &Viewport,
        batches: &mut FrameBatches,
    ) -> ExecuteReport {
        log::trace!(
            "Executing {} bytes against {} vertices, viewport {:?}",
            buffer.len(),
            vertices.len(),
            viewport
        );
        self.reset_state();

        let mut report = ExecuteReport::default();
        let mut cursor = 0usize;

        while cursor < buffer.len() {
            let Some(header) = InstructionHeader::parse(&buffer[cursor..]) else {
                report.raise(Diagnostic::Truncated {
                    offset: cursor,
                    needed: HEADER_SIZE,
                    available: buffer.len() - cursor,
                });
                break;
            };

            let body_start = cursor + HEADER_SIZE;
            let payload_len = header.payload_len();
            let available = buffer.len() - body_start;
            if payload_len > available {
                report.raise(Diagnostic::Truncated {
                    offset: cursor,
                    needed: HEADER_SIZE + payload_len,
                    available: buffer.len() - cursor,
                });
                break;
            }

            let body = &buffer[body_start..body_start + payload_len];
            self.execute_group(cursor, &header, body, vertices, batches, &mut report);

            cursor = body_start + payload_len;
            report.groups += 1;
            report.records += header.count as usize;
            report.record_bytes += payload_len;
            report.bytes_consumed = cursor;
        }

        report
    }

    fn execute_group(
        &mut self,
        offset: usize,
        header: &InstructionHeader,
        body: &[u8],
        vertices: &[TlVertex],
        batches: &mut FrameBatches,
        report: &mut ExecuteReport,
    ) {
        let opcode = Opcode::from_raw(header.opcode);
        match opcode {
            // The group ends here, its remaining records are skipped.
            Opcode::Exit => return,
            Opcode::Unknown(raw) => {
                report.raise(Diagnostic::UnknownOpcode {
                    opcode: raw,
                    offset,
                    count: header.count,
                });
                return;
            }
            _ => {}
        }

        let required = opcode.payload_size();
        let record_size = header.record_size as usize;
        if record_size < required {
            if header.count > 0 {
                report.raise(Diagnostic::RecordTooSmall {
                    opcode: header.opcode,
                    record_size: header.record_size,
                    required,
                });
            }
            return;
        }

        for record in body.chunks_exact(record_size) {
            match opcode {
                Opcode::ProcessVertices => {
                    self.process_vertices(&ProcessVerticesRecord::parse(record), report)
                }
                Opcode::StateRender => self.state_render(&StateRecord::parse(record), report),
                Opcode::Triangle => {
                    self.triangle(&TriangleRecord::parse(record), vertices, batches, report)
                }
                Opcode::Exit | Opcode::Unknown(_) => {}
            }
        }
    }

    fn process_vertices(&mut self, record: &ProcessVerticesRecord, report: &mut ExecuteReport) {
        if !record.is_identity_copy() {
            report.raise(Diagnostic::Unimplemented {
                operation: format!(
                    "Process vertices opcode: {} {} {} {}",
                    record.flags, record.count, record.start, record.dest
                ),
            });
        }
    }

    fn state_render(&mut self, record: &StateRecord, report: &mut ExecuteReport) {
        let kind = RenderStateKind::from_raw(record.state);
        match kind.disposition() {
            StateDisposition::Applied => {
                self.state.apply(kind, record.arg);
            }
            StateDisposition::Ignored => {}
            StateDisposition::Unknown => report.raise(Diagnostic::UnknownRenderState {
                state: record.state,
                arg: record.arg,
            }),
        }
    }

    fn triangle(
        &mut self,
        record: &TriangleRecord,
        vertices: &[TlVertex],
        batches: &mut FrameBatches,
        report: &mut ExecuteReport,
    ) {
        let indices = record.indices();
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            report.raise(Diagnostic::VertexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
            return;
        }

        let [v0, v1, v2] = indices.map(|i| self.convert_vertex(&vertices[i as usize]));
        batches
            .get_mut(self.state.stream())
            .push(Triangle::new(v0, v1, v2, self.state.current_material));
        report.triangles_appended += 1;
    }

    fn convert_vertex(&self, v: &TlVertex) -> Vertex {
        Vertex::new(
            self.transform.transform(v),
            Vec2::new(v.tu, v.tv),
            LinearRgba::from_packed_argb(v.color).premultiplied(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::StreamKind;
    use crate::command_lane::wire::ExecuteBufferWriter;
    use relume_core::asset::MaterialId;
    use relume_core::math::Extent2D;

    fn interpreter() -> CommandInterpreter {
        CommandInterpreter::new(ScreenTransform::new(
            Extent2D::new(640, 480),
            Extent2D::new(640, 480),
        ))
    }

    fn quad_vertices() -> Vec<TlVertex> {
        [(0.0, 0.0), (640.0, 0.0), (0.0, 480.0), (640.0, 480.0)]
            .iter()
            .map(|&(sx, sy)| TlVertex {
                sx,
                sy,
                sz: 0.5,
                rhw: 1.0,
                color: 0xFFFFFFFF,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn state_resets_at_each_submission() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut w = ExecuteBufferWriter::new();
        w.states(&[(27, 1), (14, 0), (1, 3)]);
        interp.execute(w.as_bytes(), &[], &Viewport::default(), &mut batches);
        assert_eq!(interp.state().stream(), StreamKind::ForegroundTransparent);

        let mut w = ExecuteBufferWriter::new();
        w.triangles(&[[0, 1, 2]]);
        interp.execute(w.as_bytes(), &quad_vertices(), &Viewport::default(), &mut batches);
        let tri = batches[StreamKind::WorldOpaque].iter().next().copied();
        assert_eq!(tri.map(|t| t.material), Some(MaterialId::DEFAULT));
    }

    #[test]
    fn colors_are_linear_and_premultiplied() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut vertices = quad_vertices();
        vertices[0].color = 0x80FFFFFF;
        let mut w = ExecuteBufferWriter::new();
        w.triangles(&[[0, 1, 2]]);
        interp.execute(w.as_bytes(), &vertices, &Viewport::default(), &mut batches);

        let tri = batches[StreamKind::WorldOpaque].as_slice()[0];
        let c = tri.vertices[0].color;
        approx::assert_relative_eq!(c.a, 128.0 / 255.0);
        approx::assert_relative_eq!(c.r, c.a);
    }

    #[test]
    fn exit_skips_the_rest_of_its_group_only() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut w = ExecuteBufferWriter::new();
        w.group(Opcode::EXIT, 8, &[&[3u8, 8, 1, 0, 0, 0, 1, 0], &[0u8; 8]]);
        w.triangles(&[[0, 1, 2]]);
        let report = interp.execute(w.as_bytes(), &quad_vertices(), &Viewport::default(), &mut batches);
        assert!(report.is_clean());
        assert_eq!(report.groups, 2);
        assert_eq!(report.record_bytes, 16 + 8);
        assert_eq!(report.triangles_appended, 1);
    }

    #[test]
    fn record_too_small_skips_group() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut w = ExecuteBufferWriter::new();
        w.group(Opcode::TRIANGLE, 4, &[&[0u8, 0, 1, 0]]);
        w.triangles(&[[0, 1, 2]]);
        let report = interp.execute(w.as_bytes(), &quad_vertices(), &Viewport::default(), &mut batches);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::RecordTooSmall {
                opcode: Opcode::TRIANGLE,
                record_size: 4,
                required: 8
            }]
        );
        assert_eq!(report.triangles_appended, 1);
        assert_eq!(report.bytes_consumed, w.as_bytes().len());
    }

    #[test]
    fn out_of_range_index_drops_triangle() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut w = ExecuteBufferWriter::new();
        w.triangles(&[[0, 1, 9], [1, 2, 3]]);
        let report = interp.execute(w.as_bytes(), &quad_vertices(), &Viewport::default(), &mut batches);
        assert_eq!(report.triangles_appended, 1);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::VertexOutOfRange {
                index: 9,
                vertex_count: 4
            }]
        );
        assert!(report.diagnostics[0].is_malformed());
    }

    #[test]
    fn process_vertices_other_than_identity_copy_is_reported() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut w = ExecuteBufferWriter::new();
        w.process_vertices(2, 0, 0, 4).process_vertices(0, 0, 0, 4);
        let report = interp.execute(w.as_bytes(), &quad_vertices(), &Viewport::default(), &mut batches);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(matches!(
            report.diagnostics[0],
            Diagnostic::Unimplemented { .. }
        ));
        assert!(!report.diagnostics[0].is_malformed());
    }

    #[test]
    fn unknown_render_state_is_reported_and_skipped() {
        let mut interp = interpreter();
        let mut batches = FrameBatches::new();
        let mut w = ExecuteBufferWriter::new();
        w.states(&[(99, 7), (1, 2)]);
        let report = interp.execute(w.as_bytes(), &[], &Viewport::default(), &mut batches);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::UnknownRenderState { state: 99, arg: 7 }]
        );
        assert_eq!(interp.state().current_material, MaterialId(2));
    }
}
