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

//! The command stream interpreter.
//!
//! Legacy content submits execute buffers: a byte stream of instruction
//! groups (render state changes, vertex processing, triangle lists) plus an
//! array of pre-transformed vertices. This lane decodes them ([`wire`]),
//! tracks the draw state ([`state`]), maps vertices to pipeline positions
//! ([`transform`]) and files each triangle into one of the frame's streams.

mod diagnostic;
mod interpreter;
pub mod state;
pub mod transform;
pub mod wire;

pub use diagnostic::Diagnostic;
pub use interpreter::{CommandInterpreter, ExecuteReport, Viewport};
pub use state::{RenderState, RenderStateKind, StateDisposition};
pub use transform::{DisplayArea, ScreenTransform};
pub use wire::{ExecuteBufferWriter, Opcode, TlVertex};
