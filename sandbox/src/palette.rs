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

use relume_core::asset::{AlphaMode, Material, MaterialId, MaterialTable};
use relume_core::math::LinearRgba;
use relume_lanes::pool::MaterialSlots;

/// Synthetic materials for replays. Captures reference texture handles that
/// were never uploaded here, so every non-zero id wraps onto one of the
/// palette's slots.
#[derive(Debug)]
pub struct Palette {
    slots: MaterialSlots,
    len: u32,
}

fn tinted(i: usize) -> Material {
    let hue = i as f32 * 0.618_034;
    let channel = |phase: f32| 0.35 + 0.6 * (0.5 + 0.5 * ((hue + phase) * 6.283).cos());
    Material {
        albedo_factor: LinearRgba::rgb(channel(0.0), channel(0.33), channel(0.67)),
        emissive_factor: if i % 7 == 3 {
            LinearRgba::rgb(2.5, 2.0, 1.2)
        } else {
            LinearRgba::BLACK
        },
        alpha_mode: if i % 5 == 4 {
            AlphaMode::Mask
        } else {
            AlphaMode::Opaque
        },
        ..Default::default()
    }
}

impl Palette {
    pub fn new(size: usize) -> Self {
        let mut slots = MaterialSlots::new();
        for i in 0..size.max(1) {
            slots.acquire(tinted(i));
        }
        let len = slots.live() as u32;
        Self { slots, len }
    }

    /// The palette slot a captured id resolves to.
    pub fn resolve(&self, id: MaterialId) -> MaterialId {
        assert!(!id.is_default(), "material id 0 has no palette entry");
        MaterialId((id.0 - 1) % self.len + 1)
    }
}

impl MaterialTable for Palette {
    fn material(&self, id: MaterialId) -> &Material {
        self.slots.material(self.resolve(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_id_wraps_onto_an_entry() {
        let palette = Palette::new(8);
        assert_eq!(palette.resolve(MaterialId(9)), MaterialId(1));
        assert_eq!(palette.resolve(MaterialId(8)), MaterialId(8));
        assert_eq!(palette.material(MaterialId(1)), palette.material(MaterialId(9)));
        assert_ne!(
            palette.material(MaterialId(1)).albedo_factor,
            palette.material(MaterialId(2)).albedo_factor
        );
        assert_eq!(palette.material(MaterialId(4)).emissive_factor.r, 2.5);
        assert_eq!(palette.material(MaterialId(5)).alpha_mode, AlphaMode::Mask);
    }

    #[test]
    #[should_panic(expected = "material id 0")]
    fn default_id_is_not_a_palette_entry() {
        let _ = Palette::new(4).material(MaterialId::DEFAULT);
    }
}
