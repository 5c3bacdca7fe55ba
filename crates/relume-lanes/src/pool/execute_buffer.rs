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

//! Recycled storage for execute buffers.

use super::size_class::{SizeClassPool, SlotKey};

/// Byte buffers recycled by exact size.
///
/// A reacquired buffer keeps whatever the previous owner wrote into it. The
/// host overwrites it before submitting.
#[derive(Debug, Default)]
pub struct ExecuteBufferPool {
    pool: SizeClassPool<Vec<u8>>,
}

impl ExecuteBufferPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a buffer of exactly `size` bytes.
    pub fn acquire(&mut self, size: usize) -> SlotKey {
        self.pool.acquire(size as u64, || vec![0; size])
    }

    /// Gives a buffer back.
    pub fn release(&mut self, key: SlotKey) -> bool {
        self.pool.release(key)
    }

    /// The bytes of a live buffer.
    pub fn buffer(&self, key: SlotKey) -> Option<&[u8]> {
        self.pool.get(key).map(Vec::as_slice)
    }

    /// The bytes of a live buffer, for writing.
    pub fn buffer_mut(&mut self, key: SlotKey) -> Option<&mut [u8]> {
        self.pool.get_mut(key).map(Vec::as_mut_slice)
    }

    /// Buffers ever allocated.
    pub fn allocated(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_size_reuses_storage_with_stale_contents() {
        let mut pool = ExecuteBufferPool::new();
        let a = pool.acquire(64);
        pool.buffer_mut(a).unwrap()[0] = 0xAB;
        pool.release(a);

        let b = pool.acquire(64);
        assert_eq!(pool.buffer(b).map(|b| b[0]), Some(0xAB));
        assert_eq!(pool.allocated(), 1);

        let c = pool.acquire(128);
        assert_eq!(pool.buffer(c).map(<[u8]>::len), Some(128));
        assert_eq!(pool.allocated(), 2);
        assert_eq!(pool.buffer(a), None);
    }
}
