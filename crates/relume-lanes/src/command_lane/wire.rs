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

//! Binary layout of legacy execute buffers. All fields are little endian.

/// Size of an instruction header.
pub const HEADER_SIZE: usize = 4;
/// Size of a `PROCESSVERTICES` record.
pub const PROCESS_VERTICES_SIZE: usize = 16;
/// Size of a `STATERENDER` record.
pub const STATE_SIZE: usize = 8;
/// Size of a `TRIANGLE` record.
pub const TRIANGLE_SIZE: usize = 8;
/// `PROCESSVERTICES` flags of a plain copy.
pub const PROCESS_VERTICES_COPY: u32 = 2;

/// Instruction opcodes, in the legacy numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Triangle list records.
    Triangle,
    /// Render state records.
    StateRender,
    /// Vertex processing records.
    ProcessVertices,
    /// End of the current group.
    Exit,
    /// Anything else.
    Unknown(u8),
}

impl Opcode {
    /// `D3DOP_TRIANGLE`.
    pub const TRIANGLE: u8 = 3;
    /// `D3DOP_STATERENDER`.
    pub const STATE_RENDER: u8 = 8;
    /// `D3DOP_PROCESSVERTICES`.
    pub const PROCESS_VERTICES: u8 = 9;
    /// `D3DOP_EXIT`.
    pub const EXIT: u8 = 11;

    /// Decodes a raw opcode byte.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            Self::TRIANGLE => Opcode::Triangle,
            Self::STATE_RENDER => Opcode::StateRender,
            Self::PROCESS_VERTICES => Opcode::ProcessVertices,
            Self::EXIT => Opcode::Exit,
            other => Opcode::Unknown(other),
        }
    }

    /// Minimum record size the opcode needs, `0` when it reads no payload.
    pub const fn payload_size(&self) -> usize {
        match self {
            Opcode::Triangle => TRIANGLE_SIZE,
            Opcode::StateRender => STATE_SIZE,
            Opcode::ProcessVertices => PROCESS_VERTICES_SIZE,
            Opcode::Exit | Opcode::Unknown(_) => 0,
        }
    }
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// The header opening an instruction group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionHeader {
    /// Raw opcode byte.
    pub opcode: u8,
    /// Size of each record of the group.
    pub record_size: u8,
    /// Number of records.
    pub count: u16,
}

impl InstructionHeader {
    /// Reads a header from the start of `bytes`, `None` if fewer than four
    /// bytes remain.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            opcode: bytes[0],
            record_size: bytes[1],
            count: u16_at(bytes, 2),
        })
    }

    /// Bytes occupied by the group's records.
    pub fn payload_len(&self) -> usize {
        self.record_size as usize * self.count as usize
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [c0, c1] = self.count.to_le_bytes();
        [self.opcode, self.record_size, c0, c1]
    }
}

/// Vertex processing operations, `flags & 0x7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessVerticesOp {
    /// Transform and light.
    TransformLight,
    /// Transform only.
    Transform,
    /// Plain copy of pre-transformed vertices.
    Copy,
    /// Any other value.
    Other(u32),
}

/// A `PROCESSVERTICES` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessVerticesRecord {
    /// Operation and option flags.
    pub flags: u32,
    /// First source vertex.
    pub start: u16,
    /// First destination vertex.
    pub dest: u16,
    /// Number of vertices.
    pub count: u32,
}

impl ProcessVerticesRecord {
    /// Reads a record. `bytes` must hold at least [`PROCESS_VERTICES_SIZE`] bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        Self {
            flags: u32_at(bytes, 0),
            start: u16_at(bytes, 4),
            dest: u16_at(bytes, 6),
            count: u32_at(bytes, 8),
        }
    }

    /// The operation encoded in the low three bits.
    pub fn op(&self) -> ProcessVerticesOp {
        match self.flags & 0x7 {
            0 => ProcessVerticesOp::TransformLight,
            1 => ProcessVerticesOp::Transform,
            2 => ProcessVerticesOp::Copy,
            other => ProcessVerticesOp::Other(other),
        }
    }

    /// The only supported form: a plain copy from vertex 0 into vertex 0.
    /// Extra flag bits such as UPDATEEXTENTS or NOCOLOR make it unsupported.
    pub fn is_identity_copy(&self) -> bool {
        self.flags == PROCESS_VERTICES_COPY && self.start == 0 && self.dest == 0
    }
}

/// A `STATERENDER` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRecord {
    /// Raw render state number.
    pub state: u32,
    /// State value.
    pub arg: u32,
}

impl StateRecord {
    /// Reads a record. `bytes` must hold at least [`STATE_SIZE`] bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        Self {
            state: u32_at(bytes, 0),
            arg: u32_at(bytes, 4),
        }
    }
}

/// A `TRIANGLE` record: three indices into the vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleRecord {
    /// First corner.
    pub v1: u16,
    /// Second corner.
    pub v2: u16,
    /// Third corner.
    pub v3: u16,
    /// Edge and strip flags, unused.
    pub flags: u16,
}

impl TriangleRecord {
    /// Reads a record. `bytes` must hold at least [`TRIANGLE_SIZE`] bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        Self {
            v1: u16_at(bytes, 0),
            v2: u16_at(bytes, 2),
            v3: u16_at(bytes, 4),
            flags: u16_at(bytes, 6),
        }
    }

    /// The corner indices.
    pub fn indices(&self) -> [u16; 3] {
        [self.v1, self.v2, self.v3]
    }
}

/// A pre-transformed, pre-lit legacy vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TlVertex {
    /// Screen x in pixels.
    pub sx: f32,
    /// Screen y in pixels.
    pub sy: f32,
    /// Depth in `[0, 1]`.
    pub sz: f32,
    /// Reciprocal of the view-space w.
    pub rhw: f32,
    /// Packed `0xAARRGGBB` diffuse color.
    pub color: u32,
    /// Packed specular color, unused.
    pub specular: u32,
    /// Texture u.
    pub tu: f32,
    /// Texture v.
    pub tv: f32,
}

impl TlVertex {
    /// Size of one vertex in a capture.
    pub const SIZE: usize = std::mem::size_of::<TlVertex>();

    /// Decodes a packed vertex array. Trailing bytes that do not form a
    /// whole vertex are ignored.
    pub fn decode_all(bytes: &[u8]) -> Vec<TlVertex> {
        let whole = bytes.len() - bytes.len() % Self::SIZE;
        bytemuck::pod_collect_to_vec(&bytes[..whole])
    }
}

/// Builds execute buffers. Used by the replay tool's demo scene and by tests.
#[derive(Debug, Clone, Default)]
pub struct ExecuteBufferWriter {
    bytes: Vec<u8>,
}

impl ExecuteBufferWriter {
    /// Starts an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw group: header plus records of `record_size` bytes each.
    pub fn group(&mut self, opcode: u8, record_size: u8, records: &[&[u8]]) -> &mut Self {
        let header = InstructionHeader {
            opcode,
            record_size,
            count: records.len() as u16,
        };
        self.bytes.extend_from_slice(&header.to_bytes());
        for record in records {
            let mut padded = record.to_vec();
            padded.resize(record_size as usize, 0);
            self.bytes.extend_from_slice(&padded);
        }
        self
    }

    /// Appends one `STATERENDER` group.
    pub fn states(&mut self, states: &[(u32, u32)]) -> &mut Self {
        let records: Vec<[u8; STATE_SIZE]> = states
            .iter()
            .map(|&(state, arg)| {
                let mut r = [0u8; STATE_SIZE];
                r[..4].copy_from_slice(&state.to_le_bytes());
                r[4..].copy_from_slice(&arg.to_le_bytes());
                r
            })
            .collect();
        let slices: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
        self.group(Opcode::STATE_RENDER, STATE_SIZE as u8, &slices)
    }

    /// Appends one `TRIANGLE` group.
    pub fn triangles(&mut self, triangles: &[[u16; 3]]) -> &mut Self {
        let records: Vec<[u8; TRIANGLE_SIZE]> = triangles
            .iter()
            .map(|t| {
                let mut r = [0u8; TRIANGLE_SIZE];
                r[0..2].copy_from_slice(&t[0].to_le_bytes());
                r[2..4].copy_from_slice(&t[1].to_le_bytes());
                r[4..6].copy_from_slice(&t[2].to_le_bytes());
                r
            })
            .collect();
        let slices: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
        self.group(Opcode::TRIANGLE, TRIANGLE_SIZE as u8, &slices)
    }

    /// Appends one `PROCESSVERTICES` record in its own group.
    pub fn process_vertices(&mut self, flags: u32, start: u16, dest: u16, count: u32) -> &mut Self {
        let mut r = [0u8; PROCESS_VERTICES_SIZE];
        r[0..4].copy_from_slice(&flags.to_le_bytes());
        r[4..6].copy_from_slice(&start.to_le_bytes());
        r[6..8].copy_from_slice(&dest.to_le_bytes());
        r[8..12].copy_from_slice(&count.to_le_bytes());
        self.group(
            Opcode::PROCESS_VERTICES,
            PROCESS_VERTICES_SIZE as u8,
            &[r.as_slice()],
        )
    }

    /// Appends an `EXIT` group with a single empty record.
    pub fn exit(&mut self) -> &mut Self {
        self.group(Opcode::EXIT, 0, &[&[]])
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
