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

//! An arena whose free slots are grouped by size class.

use std::collections::{HashMap, VecDeque};

/// A handle to a slot of a [`SizeClassPool`].
///
/// Keys carry the generation of the slot they were issued for. Once the slot
/// is released the key goes stale and every lookup with it returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    /// Position of the slot in the arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    size_class: u64,
    generation: u32,
    in_use: bool,
}

/// Slots that are recycled by size class instead of being freed.
///
/// Releasing a slot keeps its value around. The next acquire of the same
/// size class gets the oldest released slot back, contents included, so the
/// caller must treat reused values as stale.
#[derive(Debug)]
pub struct SizeClassPool<T> {
    slots: Vec<Slot<T>>,
    free: HashMap<u64, VecDeque<u32>>,
}

impl<T> Default for SizeClassPool<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: HashMap::new(),
        }
    }
}

impl<T> SizeClassPool<T> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a slot of `size_class`, reusing the oldest released one or
    /// creating a new value with `make`.
    pub fn acquire(&mut self, size_class: u64, make: impl FnOnce() -> T) -> SlotKey {
        match self.try_acquire(size_class, || Ok::<T, std::convert::Infallible>(make())) {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }

    /// Like [`SizeClassPool::acquire`] for fallible constructors. Nothing is
    /// changed when `make` fails.
    pub fn try_acquire<E>(
        &mut self,
        size_class: u64,
        make: impl FnOnce() -> Result<T, E>,
    ) -> Result<SlotKey, E> {
        if let Some(index) = self.free.get_mut(&size_class).and_then(VecDeque::pop_front) {
            let slot = &mut self.slots[index as usize];
            slot.in_use = true;
            return Ok(SlotKey {
                index,
                generation: slot.generation,
            });
        }

        let value = make()?;
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            value,
            size_class,
            generation: 0,
            in_use: true,
        });
        Ok(SlotKey {
            index,
            generation: 0,
        })
    }

    /// Returns a slot to its free list. Returns `false` for stale keys.
    pub fn release(&mut self, key: SlotKey) -> bool {
        let Some(slot) = self.live_slot_mut(key) else {
            return false;
        };
        slot.in_use = false;
        slot.generation = slot.generation.wrapping_add(1);
        let size_class = slot.size_class;
        self.free.entry(size_class).or_default().push_back(key.index);
        true
    }

    /// The value of a live slot.
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        self.slots
            .get(key.index())
            .filter(|s| s.in_use && s.generation == key.generation)
            .map(|s| &s.value)
    }

    /// The value of a live slot, mutably.
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.live_slot_mut(key).map(|s| &mut s.value)
    }

    /// The size class a live slot was acquired with.
    pub fn size_class(&self, key: SlotKey) -> Option<u64> {
        self.slots
            .get(key.index())
            .filter(|s| s.in_use && s.generation == key.generation)
            .map(|s| s.size_class)
    }

    /// Number of slots ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was ever created.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots currently handed out.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// Every value, live or free. Used to release backing resources.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map(|s| &s.value)
    }

    fn live_slot_mut(&mut self, key: SlotKey) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(key.index())
            .filter(|s| s.in_use && s.generation == key.generation)
    }
}
