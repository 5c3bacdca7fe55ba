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

//! Problems found while interpreting a command stream.

/// A problem in a command stream. None of them stop interpretation except
/// [`Diagnostic::Truncated`], which ends it at the last complete group.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// An opcode outside the legacy set. Its group is skipped.
    #[error("Unimplemented execute buffer opcode {opcode} was ignored ({count} records at offset {offset})")]
    UnknownOpcode {
        /// The raw opcode.
        opcode: u8,
        /// Offset of the group header.
        offset: usize,
        /// Records skipped.
        count: u16,
    },

    /// A render state outside the legacy numbering.
    #[error("Ignored unknown render state {state} (argument {arg})")]
    UnknownRenderState {
        /// The raw state number.
        state: u32,
        /// Its argument.
        arg: u32,
    },

    /// A recognised operation the renderer does not implement.
    #[error("Unimplemented function: {operation}")]
    Unimplemented {
        /// What was requested.
        operation: String,
    },

    /// A header or group runs past the end of the buffer.
    #[error("Command stream truncated at offset {offset}: {needed} bytes needed, {available} left")]
    Truncated {
        /// Offset of the incomplete header or group.
        offset: usize,
        /// Bytes the header or group needs.
        needed: usize,
        /// Bytes actually left.
        available: usize,
    },

    /// Records are smaller than their opcode's payload. The group is skipped.
    #[error("Records of {record_size} bytes are too small for opcode {opcode}, which needs {required}")]
    RecordTooSmall {
        /// The raw opcode.
        opcode: u8,
        /// Declared record size.
        record_size: u8,
        /// Bytes the opcode reads per record.
        required: usize,
    },

    /// A triangle index outside the vertex array. The triangle is dropped.
    #[error("Triangle references vertex {index} but only {vertex_count} vertices were supplied")]
    VertexOutOfRange {
        /// The offending index.
        index: u16,
        /// Length of the vertex array.
        vertex_count: usize,
    },
}

impl Diagnostic {
    /// Whether the stream itself is malformed, as opposed to using a feature
    /// the renderer does not implement.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Diagnostic::Truncated { .. }
                | Diagnostic::RecordTooSmall { .. }
                | Diagnostic::VertexOutOfRange { .. }
        )
    }

    /// Logs the diagnostic: malformed input at error level, the rest as warnings.
    pub fn log(&self) {
        if self.is_malformed() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }
    }
}
