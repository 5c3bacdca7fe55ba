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

//! The in-memory material table.

use relume_core::asset::{Material, MaterialId, MaterialTable};
use std::collections::VecDeque;

/// A material table with slot reuse.
///
/// Ids are `slot + 1`, so id 0 never names an entry. Released slots are
/// handed out again, oldest first.
#[derive(Debug, Default)]
pub struct MaterialSlots {
    slots: Vec<Option<Material>>,
    free: VecDeque<usize>,
}

impl MaterialSlots {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a material and returns its id.
    pub fn acquire(&mut self, material: Material) -> MaterialId {
        let index = match self.free.pop_front() {
            Some(index) => {
                self.slots[index] = Some(material);
                index
            }
            None => {
                self.slots.push(Some(material));
                self.slots.len() - 1
            }
        };
        MaterialId(index as u32 + 1)
    }

    /// Frees the slot of `id`. Returns `false` when it was not in use.
    pub fn release(&mut self, id: MaterialId) -> bool {
        let Some(index) = id.slot() else {
            return false;
        };
        match self.slots.get_mut(index) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push_back(index);
                true
            }
            _ => false,
        }
    }

    /// The material of a live id.
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.slots.get(id.slot()?)?.as_ref()
    }

    /// Replaces the material of a live id.
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.slots.get_mut(id.slot()?)?.as_mut()
    }

    /// Number of live materials.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl MaterialTable for MaterialSlots {
    fn material(&self, id: MaterialId) -> &Material {
        let Some(index) = id.slot() else {
            panic!("material id 0 has no table entry");
        };
        match &self.slots[index] {
            Some(material) => material,
            None => panic!("material {} was released", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relume_core::asset::AlphaMode;

    #[test]
    fn ids_are_one_based_and_slots_reused() {
        let mut table = MaterialSlots::new();
        let a = table.acquire(Material::default());
        let b = table.acquire(Material {
            alpha_mode: AlphaMode::Mask,
            ..Default::default()
        });
        assert_eq!(a, MaterialId(1));
        assert_eq!(b, MaterialId(2));
        assert_eq!(table.material(b).alpha_mode, AlphaMode::Mask);

        assert!(table.release(a));
        assert!(!table.release(a));
        assert_eq!(table.get(a), None);

        let c = table.acquire(Material::default());
        assert_eq!(c, a);
        assert_eq!(table.live(), 2);
        assert!(!table.release(MaterialId::DEFAULT));
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn unknown_id_panics() {
        let table = MaterialSlots::new();
        let _ = table.material(MaterialId(4));
    }
}
