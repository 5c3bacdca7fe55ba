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

//! Renderer configuration, loaded from a JSON file.
//!
//! Every field is optional in the file. Missing fields take the defaults
//! below, and a file that cannot be read or parsed leaves the whole
//! configuration at its defaults: a bad config never stops a session.

use crate::math::Extent2D;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The file name looked up next to the host executable.
pub const DEFAULT_CONFIG_FILE: &str = "relume.json";

/// User facing renderer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Display (output) resolution in pixels.
    pub resolution: (u32, u32),
    /// Resolution the legacy content believes it renders at. Falls back to
    /// `resolution` when unset. Its aspect ratio drives letterboxing.
    pub internal_resolution: Option<(u32, u32)>,
    /// Requests an exclusive fullscreen mode from the presentation host.
    pub fullscreen: bool,
    /// Scale applied by the host to the HUD overlay.
    pub hud_scale: f32,
    /// Maximum anisotropic filtering level for material textures.
    pub max_anisotropy: f32,
    /// Enables the bloom cascade.
    pub enable_bloom: bool,
    /// Enables screen-space ambient occlusion.
    pub enable_ssao: bool,
    /// Enables parallax mapping from displacement maps.
    pub enable_parallax: bool,
    /// Linear (instead of nearest) filtering for material textures.
    pub enable_texture_filtering: bool,
    /// Quantizes lighting for a retro look.
    pub enable_posterized_lighting: bool,
    /// Command line the host launches.
    pub command: String,
    /// Root of the replacement data (materials, captures).
    pub data_path: String,
    /// Optional log file. Logs go to stderr when unset.
    pub log_path: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            resolution: (640, 480),
            internal_resolution: None,
            fullscreen: false,
            hud_scale: 1.0,
            max_anisotropy: 2.0,
            enable_bloom: true,
            enable_ssao: true,
            enable_parallax: true,
            enable_texture_filtering: true,
            enable_posterized_lighting: false,
            command: "jk.exe".to_owned(),
            data_path: "jkgm".to_owned(),
            log_path: None,
        }
    }
}

/// An error raised while reading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        /// The path that failed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid JSON for [`RendererConfig`].
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read configuration file '{path}': {source}")
            }
            ConfigError::Parse(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl RendererConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reads a configuration file, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Failed to load configuration file, this session uses the default options: {e}"
                );
                Self::default()
            }
        }
    }

    /// The display resolution as an extent.
    pub fn display_extent(&self) -> Extent2D {
        Extent2D::from(self.resolution)
    }

    /// The internal resolution, or the display resolution when unset.
    pub fn effective_internal_resolution(&self) -> Extent2D {
        Extent2D::from(self.internal_resolution.unwrap_or(self.resolution))
    }

    /// Sampler anisotropy clamp: at least 1, at most 16.
    pub fn anisotropy_clamp(&self) -> u16 {
        let level = self.max_anisotropy.max(1.0);
        if level.is_finite() {
            (level.round() as u16).clamp(1, 16)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let c = RendererConfig::default();
        assert_eq!(c.resolution, (640, 480));
        assert_eq!(c.internal_resolution, None);
        assert!(c.enable_bloom);
        assert!(c.enable_ssao);
        assert!(c.enable_parallax);
        assert!(c.enable_texture_filtering);
        assert!(!c.enable_posterized_lighting);
        assert_eq!(c.max_anisotropy, 2.0);
        assert_eq!(c.hud_scale, 1.0);
        assert_eq!(c.command, "jk.exe");
        assert_eq!(c.data_path, "jkgm");
        assert_eq!(c.log_path, None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = RendererConfig::from_json_str(
            r#"{ "resolution": [1920, 1080], "enable_bloom": false, "internal_resolution": null }"#,
        )
        .unwrap();
        assert_eq!(c.display_extent(), Extent2D::new(1920, 1080));
        assert_eq!(c.effective_internal_resolution(), Extent2D::new(1920, 1080));
        assert!(!c.enable_bloom);
        assert!(c.enable_ssao);
    }

    #[test]
    fn internal_resolution_overrides_display() {
        let c = RendererConfig::from_json_str(r#"{ "internal_resolution": [640, 480], "resolution": [1920, 1080] }"#)
            .unwrap();
        assert_eq!(c.effective_internal_resolution(), Extent2D::new(640, 480));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            RendererConfig::from_json_str("{ resolution: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file_and_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "enable_ssao": false, "max_anisotropy": 8.0 }}"#).unwrap();
        let c = RendererConfig::load(file.path()).unwrap();
        assert!(!c.enable_ssao);
        assert_eq!(c.anisotropy_clamp(), 8);

        let missing = file.path().with_extension("does-not-exist");
        assert!(matches!(
            RendererConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(RendererConfig::load_or_default(&missing), RendererConfig::default());
    }

    #[test]
    fn anisotropy_never_below_one() {
        let c = RendererConfig {
            max_anisotropy: 0.0,
            ..Default::default()
        };
        assert_eq!(c.anisotropy_clamp(), 1);
        let c = RendererConfig {
            max_anisotropy: 64.0,
            ..Default::default()
        };
        assert_eq!(c.anisotropy_clamp(), 16);
    }
}
