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

//! Legacy render states and the subset the renderer honours.

use crate::batch::{RenderLayer, StreamKind};
use relume_core::asset::MaterialId;

/// What the interpreter does with a render state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateDisposition {
    /// Changes the renderer's state.
    Applied,
    /// Recognised and deliberately ignored.
    Ignored,
    /// Not part of the legacy numbering.
    Unknown,
}

/// Every legacy render state, by its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStateKind {
    /// 1: selects the material.
    TextureHandle,
    /// 2
    Antialias,
    /// 4
    TexturePerspective,
    /// 5
    WrapU,
    /// 6
    WrapV,
    /// 7
    ZEnable,
    /// 8
    FillMode,
    /// 9
    ShadeMode,
    /// 11
    MonoEnable,
    /// 14: a zero value starts the foreground overlay.
    ZWriteEnable,
    /// 15
    AlphaTestEnable,
    /// 17
    TextureMag,
    /// 18
    TextureMin,
    /// 19
    SrcBlend,
    /// 20
    DestBlend,
    /// 21
    TextureMapBlend,
    /// 22
    CullMode,
    /// 23
    ZFunc,
    /// 25
    AlphaFunc,
    /// 26
    DitherEnable,
    /// 27: toggles transparency.
    AlphaBlendEnable,
    /// 28
    FogEnable,
    /// 29
    SpecularEnable,
    /// 31
    Subpixel,
    /// 32
    SubpixelX,
    /// 33
    StippledAlpha,
    /// Any other number.
    Unknown(u32),
}

impl RenderStateKind {
    /// Decodes a raw state number.
    pub const fn from_raw(raw: u32) -> Self {
        use RenderStateKind::*;
        match raw {
            1 => TextureHandle,
            2 => Antialias,
            4 => TexturePerspective,
            5 => WrapU,
            6 => WrapV,
            7 => ZEnable,
            8 => FillMode,
            9 => ShadeMode,
            11 => MonoEnable,
            14 => ZWriteEnable,
            15 => AlphaTestEnable,
            17 => TextureMag,
            18 => TextureMin,
            19 => SrcBlend,
            20 => DestBlend,
            21 => TextureMapBlend,
            22 => CullMode,
            23 => ZFunc,
            25 => AlphaFunc,
            26 => DitherEnable,
            27 => AlphaBlendEnable,
            28 => FogEnable,
            29 => SpecularEnable,
            31 => Subpixel,
            32 => SubpixelX,
            33 => StippledAlpha,
            other => Unknown(other),
        }
    }

    /// How the interpreter treats this state.
    pub const fn disposition(&self) -> StateDisposition {
        use RenderStateKind::*;
        match self {
            TextureHandle | AlphaBlendEnable | ZWriteEnable => StateDisposition::Applied,
            Unknown(_) => StateDisposition::Unknown,
            _ => StateDisposition::Ignored,
        }
    }
}

/// The interpreter's current draw state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderState {
    /// Whether alpha blending is enabled.
    pub is_transparent: bool,
    /// World or foreground overlay.
    pub layer: RenderLayer,
    /// Material of subsequent triangles.
    pub current_material: MaterialId,
}

impl RenderState {
    /// The stream new triangles go to.
    #[inline]
    pub fn stream(&self) -> StreamKind {
        StreamKind::select(self.layer, self.is_transparent)
    }

    /// Applies a render state. Returns `false` when the state is not one the
    /// renderer acts on.
    pub fn apply(&mut self, kind: RenderStateKind, arg: u32) -> bool {
        match kind {
            RenderStateKind::TextureHandle => {
                self.current_material = MaterialId(arg);
                true
            }
            RenderStateKind::AlphaBlendEnable => {
                self.is_transparent = arg != 0;
                true
            }
            RenderStateKind::ZWriteEnable => {
                // Disabling depth writes is how the legacy content starts the weapon overlay.
                if arg == 0 {
                    self.layer = RenderLayer::Foreground;
                }
                true
            }
            _ => false,
        }
    }
}
