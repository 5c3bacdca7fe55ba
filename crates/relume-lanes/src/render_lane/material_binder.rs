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

//! Per-draw material binding for the game passes.
//!
//! A material is bound as two groups: its three texture maps plus the
//! material sampler (cached by the map triple), and a uniform block pushed
//! into the per-frame dynamic uniform ring.

use crate::pool::{DynamicUniformRing, UniformSlice};
use bytemuck::{Pod, Zeroable};
use relume_core::asset::{AlphaMode, MaterialId, MaterialTable};
use relume_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BindingResource,
    GraphicsDevice, RenderPass, ResourceError, SamplerId, TextureViewId,
};
use std::collections::HashMap;

/// Bind group index of the material textures in the game pipelines.
pub const MATERIAL_TEXTURE_GROUP: u32 = 1;
/// Bind group index of the material uniforms in the game pipelines.
pub const MATERIAL_UNIFORM_GROUP: u32 = 2;

/// Uniform block of one material, as read by `game_pass.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniforms {
    /// `[has_albedo, has_emissive, alpha_mask, posterize]`, each 0 or 1.
    pub features: [f32; 4],
    /// Multiplies the albedo sample.
    pub albedo_factor: [f32; 4],
    /// Multiplies the emissive sample (rgb).
    pub emissive_factor: [f32; 4],
    /// `[alpha_cutoff, displacement_factor, 0, 0]`.
    pub params: [f32; 4],
}

impl MaterialUniforms {
    /// Size of the block in bytes.
    pub const SIZE: u32 = std::mem::size_of::<MaterialUniforms>() as u32;

    /// Whether the block enables alpha-masked discard.
    pub fn alpha_mask(&self) -> bool {
        self.features[2] != 0.0
    }
}

/// The three maps a material samples, in binding order.
pub type MapTriple = [TextureViewId; 3];

fn flag(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// Computes the uniform block and texture maps of a material.
///
/// Missing maps resolve to `neutral`. `force_opaque` disables alpha masking,
/// used when translucent geometry is written into opaque targets.
pub fn resolve_material(
    materials: &dyn MaterialTable,
    id: MaterialId,
    force_opaque: bool,
    posterize: bool,
    neutral: TextureViewId,
) -> (MaterialUniforms, MapTriple) {
    if id.is_default() {
        return (
            MaterialUniforms {
                features: [0.0, 0.0, 0.0, flag(posterize)],
                albedo_factor: [1.0; 4],
                emissive_factor: [0.0; 4],
                params: [0.0; 4],
            },
            [neutral; 3],
        );
    }

    let material = materials.material(id);
    let alpha_mask = material.alpha_mode == AlphaMode::Mask && !force_opaque;
    let uniforms = MaterialUniforms {
        features: [
            flag(material.albedo_map.is_some()),
            flag(material.emissive_map.is_some()),
            flag(alpha_mask),
            flag(posterize),
        ],
        albedo_factor: material.albedo_factor.to_array(),
        emissive_factor: material.emissive_factor.to_array(),
        params: [material.alpha_cutoff, material.displacement_factor, 0.0, 0.0],
    };
    let maps = [
        material.albedo_map.unwrap_or(neutral),
        material.emissive_map.unwrap_or(neutral),
        material.displacement_map.unwrap_or(neutral),
    ];
    (uniforms, maps)
}

/// The binds a draw needs for its material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialBindCommands {
    /// Texture maps and sampler.
    pub textures: BindGroupId,
    /// Material uniforms in the dynamic ring.
    pub uniforms: UniformSlice,
}

impl MaterialBindCommands {
    /// Binds both groups on `pass`.
    pub fn apply(&self, pass: &mut dyn RenderPass<'_>) {
        pass.set_bind_group(MATERIAL_TEXTURE_GROUP, &self.textures, &[]);
        pass.set_bind_group(
            MATERIAL_UNIFORM_GROUP,
            &self.uniforms.bind_group,
            &[self.uniforms.offset],
        );
    }
}

/// Turns material references into bind commands.
#[derive(Debug)]
pub struct MaterialBinder {
    texture_layout: BindGroupLayoutId,
    sampler: SamplerId,
    neutral: TextureViewId,
    ring: DynamicUniformRing,
    texture_groups: HashMap<MapTriple, BindGroupId>,
}

impl MaterialBinder {
    /// Creates a binder.
    ///
    /// `texture_layout` has the three maps at bindings 0..=2 and the sampler
    /// at 3; `uniform_layout` has a dynamic uniform buffer at binding 0.
    pub fn new(
        device: &dyn GraphicsDevice,
        texture_layout: BindGroupLayoutId,
        uniform_layout: BindGroupLayoutId,
        sampler: SamplerId,
        neutral: TextureViewId,
    ) -> Result<Self, ResourceError> {
        let ring = DynamicUniformRing::new(
            device,
            uniform_layout,
            0,
            MaterialUniforms::SIZE,
            crate::pool::DEFAULT_MAX_ELEMENTS,
            "material_uniforms",
        )?;
        Ok(Self {
            texture_layout,
            sampler,
            neutral,
            ring,
            texture_groups: HashMap::new(),
        })
    }

    /// Starts a frame: moves the ring to the next slot and makes room for
    /// `expected_binds` materials.
    pub fn begin_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        expected_binds: u32,
    ) -> Result<(), ResourceError> {
        self.ring.advance();
        self.ring.reserve(device, expected_binds)
    }

    /// Resolves one material bind.
    pub fn bind(
        &mut self,
        device: &dyn GraphicsDevice,
        materials: &dyn MaterialTable,
        id: MaterialId,
        force_opaque: bool,
        posterize: bool,
    ) -> Result<MaterialBindCommands, ResourceError> {
        let (uniforms, maps) = resolve_material(materials, id, force_opaque, posterize, self.neutral);
        let textures = self.texture_group(device, maps)?;
        let uniforms = self.ring.push(device, bytemuck::bytes_of(&uniforms))?;
        Ok(MaterialBindCommands { textures, uniforms })
    }

    /// Texture bind groups currently cached.
    pub fn cached_texture_groups(&self) -> usize {
        self.texture_groups.len()
    }

    /// Drops every cached texture group, after material textures changed.
    pub fn invalidate_textures(&mut self, device: &dyn GraphicsDevice) {
        for (_, group) in self.texture_groups.drain() {
            if let Err(e) = device.destroy_bind_group(group) {
                log::warn!("MaterialBinder: failed to destroy texture group: {e}");
            }
        }
    }

    /// Releases the ring and the cached groups.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.invalidate_textures(device);
        self.ring.destroy(device);
    }

    fn texture_group(
        &mut self,
        device: &dyn GraphicsDevice,
        maps: MapTriple,
    ) -> Result<BindGroupId, ResourceError> {
        if let Some(group) = self.texture_groups.get(&maps) {
            return Ok(*group);
        }
        let group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("material_textures"),
            layout: self.texture_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(maps[0]),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(maps[1]),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::TextureView(maps[2]),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: BindingResource::Sampler(self.sampler),
                },
            ],
        })?;
        log::debug!("MaterialBinder: new texture group for maps {:?}", maps);
        self.texture_groups.insert(maps, group);
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relume_core::asset::Material;
    use relume_core::math::LinearRgba;

    const WHITE: TextureViewId = TextureViewId(900);

    fn table() -> Vec<Material> {
        vec![
            Material {
                albedo_map: Some(TextureViewId(1)),
                alpha_mode: AlphaMode::Mask,
                alpha_cutoff: 0.25,
                ..Default::default()
            },
            Material {
                emissive_map: Some(TextureViewId(2)),
                displacement_map: Some(TextureViewId(3)),
                emissive_factor: LinearRgba::rgb(2.0, 1.0, 0.5),
                displacement_factor: 0.1,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn default_material_is_neutral() {
        let (u, maps) = resolve_material(&table(), MaterialId::DEFAULT, false, true, WHITE);
        assert_eq!(u.features, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(u.albedo_factor, [1.0; 4]);
        assert_eq!(u.emissive_factor, [0.0; 4]);
        assert_eq!(u.params, [0.0; 4]);
        assert_eq!(maps, [WHITE; 3]);
    }

    #[test]
    fn masked_material_features() {
        let (u, maps) = resolve_material(&table(), MaterialId(1), false, false, WHITE);
        assert_eq!(u.features, [1.0, 0.0, 1.0, 0.0]);
        assert_eq!(u.params[0], 0.25);
        assert_eq!(maps, [TextureViewId(1), WHITE, WHITE]);
        assert!(u.alpha_mask());
    }

    #[test]
    fn force_opaque_disables_mask() {
        let (u, _) = resolve_material(&table(), MaterialId(1), true, false, WHITE);
        assert_eq!(u.features, [1.0, 0.0, 0.0, 0.0]);
        assert!(!u.alpha_mask());
    }

    #[test]
    fn emissive_and_displacement_come_from_the_table() {
        let (u, maps) = resolve_material(&table(), MaterialId(2), false, false, WHITE);
        assert_eq!(u.features, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(u.emissive_factor, [2.0, 1.0, 0.5, 1.0]);
        assert_eq!(u.params[1], 0.1);
        assert_eq!(maps, [WHITE, TextureViewId(2), TextureViewId(3)]);
    }

    #[test]
    #[should_panic]
    fn out_of_range_material_panics() {
        resolve_material(&table(), MaterialId(3), false, false, WHITE);
    }

    #[test]
    fn uniform_block_is_64_bytes() {
        assert_eq!(MaterialUniforms::SIZE, 64);
    }
}
