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

//! The material model consumed by the renderer.
//!
//! Materials live in a table owned by the host. The renderer only ever reads
//! them through [`MaterialTable`], keyed by the [`MaterialId`] carried on each
//! triangle.

use crate::math::LinearRgba;
use crate::renderer::api::TextureViewId;

/// Identifier of a material, as carried by the legacy texture-handle state.
///
/// Id `0` is reserved for "no material" and never aliases a table entry.
/// Non-zero ids address the table slot `id - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// The untextured default material.
    pub const DEFAULT: Self = Self(0);

    /// Returns `true` for the reserved default id.
    #[inline]
    pub const fn is_default(&self) -> bool {
        self.0 == 0
    }

    /// The table slot addressed by this id, `None` for the default id.
    #[inline]
    pub fn slot(&self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

/// Defines how the alpha channel of a material's albedo is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    /// Alpha is ignored, the surface is fully opaque.
    #[default]
    Opaque,
    /// Fragments whose alpha falls below [`Material::alpha_cutoff`] are discarded.
    Mask,
}

/// A replacement material for one legacy texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Base color map.
    pub albedo_map: Option<TextureViewId>,
    /// Emissive map, added on top of the lit albedo.
    pub emissive_map: Option<TextureViewId>,
    /// Height map used for parallax.
    pub displacement_map: Option<TextureViewId>,
    /// Multiplied into the albedo sample.
    pub albedo_factor: LinearRgba,
    /// Multiplied into the emissive sample. Only rgb is used.
    pub emissive_factor: LinearRgba,
    /// How alpha is interpreted.
    pub alpha_mode: AlphaMode,
    /// Threshold for [`AlphaMode::Mask`].
    pub alpha_cutoff: f32,
    /// Scale of the parallax offset.
    pub displacement_factor: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo_map: None,
            emissive_map: None,
            displacement_map: None,
            albedo_factor: LinearRgba::WHITE,
            emissive_factor: LinearRgba::BLACK,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            displacement_factor: 0.0,
        }
    }
}

/// Read access to the host's material table.
pub trait MaterialTable {
    /// Returns the material for a non-default id.
    ///
    /// # Panics
    ///
    /// Implementations panic when `id` is [`MaterialId::DEFAULT`] or does not
    /// address an existing entry. Callers only pass ids handed out by the table.
    fn material(&self, id: MaterialId) -> &Material;
}

impl MaterialTable for Vec<Material> {
    fn material(&self, id: MaterialId) -> &Material {
        let slot = id.0 as usize;
        assert!(slot != 0, "material id 0 has no table entry");
        &self[slot - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_id_has_no_slot() {
        assert!(MaterialId::DEFAULT.is_default());
        assert_eq!(MaterialId::DEFAULT.slot(), None);
        assert_eq!(MaterialId(5).slot(), Some(4));
    }

    #[test]
    fn vec_table_is_one_based() {
        let table = vec![
            Material::default(),
            Material {
                alpha_mode: AlphaMode::Mask,
                ..Default::default()
            },
        ];
        assert_eq!(table.material(MaterialId(2)).alpha_mode, AlphaMode::Mask);
        assert_eq!(table.material(MaterialId(1)).alpha_mode, AlphaMode::Opaque);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn out_of_range_id_panics() {
        let table = vec![Material::default()];
        let _ = table.material(MaterialId(3));
    }
}
