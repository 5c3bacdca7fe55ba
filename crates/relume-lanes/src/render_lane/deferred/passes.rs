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

//! The ordered pass list of a frame.

use relume_core::RendererConfig;

/// One pass of the deferred pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Fills albedo, emissive and depth/normal from every stream.
    GBuffer,
    /// Screen-space ambient occlusion and its blur.
    AmbientOcclusion,
    /// Lit color from the G-buffer into the working buffer.
    Composite,
    /// Forward pass over the working buffer for translucent and overlay
    /// geometry.
    Transparency,
    /// Bright pass and blur cascade.
    Bloom,
    /// sRGB conversion into the final image.
    Final,
}

/// A pass and the predicate deciding whether it runs this frame.
#[derive(Debug, Clone, Copy)]
pub struct PassDescriptor {
    /// The pass.
    pub kind: PassKind,
    /// Evaluated at frame start.
    pub should_run: fn(&RendererConfig) -> bool,
}

fn always(_: &RendererConfig) -> bool {
    true
}

fn ssao_enabled(config: &RendererConfig) -> bool {
    config.enable_ssao
}

fn bloom_enabled(config: &RendererConfig) -> bool {
    config.enable_bloom
}

/// Every pass in execution order.
pub const FRAME_PASSES: [PassDescriptor; 6] = [
    PassDescriptor {
        kind: PassKind::GBuffer,
        should_run: always,
    },
    PassDescriptor {
        kind: PassKind::AmbientOcclusion,
        should_run: ssao_enabled,
    },
    PassDescriptor {
        kind: PassKind::Composite,
        should_run: always,
    },
    PassDescriptor {
        kind: PassKind::Transparency,
        should_run: always,
    },
    PassDescriptor {
        kind: PassKind::Bloom,
        should_run: bloom_enabled,
    },
    PassDescriptor {
        kind: PassKind::Final,
        should_run: always,
    },
];

/// The passes that run under `config`, in order.
pub fn planned_passes(config: &RendererConfig) -> Vec<PassKind> {
    FRAME_PASSES
        .iter()
        .filter(|pass| (pass.should_run)(config))
        .map(|pass| pass.kind)
        .collect()
}
