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

//! Capture files: a recorded sequence of execute calls.
//!
//! Layout, little endian: the magic `RLCP`, a `u32` version, then one block
//! per frame made of a `u32` vertex byte count, the packed vertices, a `u32`
//! command byte count and the execute buffer.

use anyhow::{Context, Result, bail};
use relume_lanes::command_lane::TlVertex;
use std::io::Write;

const MAGIC: &[u8; 4] = b"RLCP";
const VERSION: u32 = 1;

/// One recorded execute call.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFrame {
    pub vertices: Vec<TlVertex>,
    pub commands: Vec<u8>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        let slice = self.bytes.get(self.offset..end)?;
        self.offset = end;
        Some(slice)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn block(&mut self) -> Option<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }
}

/// Parses a capture file. A frame cut short at the end of the file is
/// dropped with a warning.
pub fn read_capture(bytes: &[u8]) -> Result<Vec<CaptureFrame>> {
    let mut cursor = Cursor { bytes, offset: 0 };
    if cursor.take(4) != Some(MAGIC.as_slice()) {
        bail!("not a relume capture (bad magic)");
    }
    let version = cursor.u32().context("capture header is truncated")?;
    if version != VERSION {
        bail!("unsupported capture version {version}");
    }

    let mut frames = Vec::new();
    while !cursor.is_empty() {
        let start = cursor.offset;
        let Some((vertices, commands)) = cursor.block().zip(cursor.block()) else {
            log::warn!(
                "Capture frame {} at byte {start} is truncated, dropping it",
                frames.len()
            );
            break;
        };
        if vertices.len() % TlVertex::SIZE != 0 {
            log::warn!(
                "Capture frame {} has {} trailing vertex bytes",
                frames.len(),
                vertices.len() % TlVertex::SIZE
            );
        }
        frames.push(CaptureFrame {
            vertices: TlVertex::decode_all(vertices),
            commands: commands.to_vec(),
        });
    }
    Ok(frames)
}

/// Writes frames in the format [`read_capture`] accepts.
pub fn write_capture(frames: &[CaptureFrame], out: &mut impl Write) -> std::io::Result<()> {
    out.write_all(MAGIC)?;
    out.write_all(&VERSION.to_le_bytes())?;
    for frame in frames {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&frame.vertices);
        out.write_all(&(vertex_bytes.len() as u32).to_le_bytes())?;
        out.write_all(vertex_bytes)?;
        out.write_all(&(frame.commands.len() as u32).to_le_bytes())?;
        out.write_all(&frame.commands)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u32) -> CaptureFrame {
        CaptureFrame {
            vertices: vec![
                TlVertex {
                    sx: n as f32,
                    color: 0xFF00FF00,
                    ..Default::default()
                };
                3
            ],
            commands: vec![n as u8; 8],
        }
    }

    #[test]
    fn frames_survive_a_write_read_cycle() {
        let frames = vec![frame(1), frame(2)];
        let mut bytes = Vec::new();
        write_capture(&frames, &mut bytes).unwrap();
        assert_eq!(read_capture(&bytes).unwrap(), frames);
    }

    #[test]
    fn truncated_last_frame_is_dropped() {
        let mut bytes = Vec::new();
        write_capture(&[frame(1), frame(2)], &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert_eq!(read_capture(&bytes).unwrap(), vec![frame(1)]);
    }

    #[test]
    fn foreign_files_are_rejected() {
        assert!(read_capture(b"PNG\x0d\x0a").is_err());
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        assert!(read_capture(&bytes).is_err());
    }
}
