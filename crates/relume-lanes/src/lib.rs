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

//! Hot-path pipelines of relume.
//!
//! - [`command_lane`] decodes legacy execute buffers and files triangles
//!   into the frame's streams.
//! - [`batch`] holds the four per-frame triangle streams.
//! - [`render_lane`] turns the streams into a final image through the
//!   deferred pipeline.
//! - [`pool`] recycles the buffers, textures and material slots the other
//!   lanes allocate.

#![warn(missing_docs)]

pub mod batch;
pub mod command_lane;
pub mod pool;
pub mod render_lane;

pub use batch::{FrameBatches, StreamKind, Triangle, TriangleBatch, Vertex};
pub use command_lane::{CommandInterpreter, Diagnostic, ExecuteReport, Viewport};
pub use render_lane::{DeferredRenderer, FrameOutput};
