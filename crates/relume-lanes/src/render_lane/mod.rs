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

//! GPU side of the renderer: material binding, batch flushing and the
//! deferred pipeline with its post-processing chain.

pub mod batch_draw;
pub mod deferred;
pub mod material_binder;
pub mod post_chain;
pub mod shaders;
pub mod ssao;
pub mod targets;

pub use batch_draw::DrawRun;
pub use deferred::passes::{planned_passes, PassKind, FRAME_PASSES};
pub use deferred::{DeferredRenderer, FrameOutput, FrameStats};
pub use material_binder::{MaterialBindCommands, MaterialBinder, MaterialUniforms};
