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

//! Built-in WGSL sources of the deferred pipeline.
//!
//! The post fragment shaders rely on the `FullscreenOutput` struct declared in
//! [`FULLSCREEN_WGSL`]; build their modules with [`post_shader_source`].

/// Vertex stage and surface evaluation of the game passes.
pub const GAME_PASS_WGSL: &str = include_str!("game_pass.wgsl");

/// Full screen triangle shared by every post pass.
pub const FULLSCREEN_WGSL: &str = include_str!("fullscreen.wgsl");

/// Ambient occlusion from the depth/normal target.
pub const SSAO_WGSL: &str = include_str!("ssao.wgsl");

/// Three tap separable blur, for the occlusion buffer.
pub const GAUSS3_WGSL: &str = include_str!("gauss3.wgsl");

/// Seven tap separable blur, for the bloom cascade.
pub const GAUSS7_WGSL: &str = include_str!("gauss7.wgsl");

/// Bright pass feeding the bloom cascade.
pub const LOW_PASS_WGSL: &str = include_str!("low_pass.wgsl");

/// Lit albedo plus emissive, modulated by occlusion.
pub const COMPOSITE_WGSL: &str = include_str!("composite.wgsl");

/// Final display conversion with bloom.
pub const TO_SRGB_WGSL: &str = include_str!("to_srgb.wgsl");

/// Prepends the full screen vertex stage to a post fragment shader.
pub fn post_shader_source(fragment: &str) -> String {
    format!("{FULLSCREEN_WGSL}\n{fragment}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_pass_has_all_entry_points() {
        assert!(GAME_PASS_WGSL.contains("@vertex"));
        assert!(GAME_PASS_WGSL.contains("fn vs_main"));
        assert!(GAME_PASS_WGSL.contains("fn fs_gbuffer"));
        assert!(GAME_PASS_WGSL.contains("fn fs_transparency"));
    }

    #[test]
    fn post_shaders_have_fragment_stages() {
        for (src, entry) in [
            (SSAO_WGSL, "fn fs_ssao"),
            (GAUSS3_WGSL, "fn fs_gauss3"),
            (GAUSS7_WGSL, "fn fs_gauss7"),
            (LOW_PASS_WGSL, "fn fs_low_pass"),
            (COMPOSITE_WGSL, "fn fs_composite"),
            (TO_SRGB_WGSL, "fn fs_to_srgb"),
        ] {
            assert!(src.contains("@fragment"), "{entry}");
            assert!(src.contains(entry), "{entry}");
            assert!(!src.contains("@vertex"), "{entry}");
        }
    }

    #[test]
    fn post_source_includes_fullscreen_stage() {
        let src = post_shader_source(GAUSS3_WGSL);
        assert!(src.contains("fn vs_fullscreen"));
        assert!(src.contains("fn fs_gauss3"));
        assert!(src.find("FullscreenOutput {") < src.find("fn fs_gauss3"));
    }
}
