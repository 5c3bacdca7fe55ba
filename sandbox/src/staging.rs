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

use anyhow::{Context, Result};
use relume_lanes::pool::ExecuteBufferPool;

/// Feeds captured command streams through recycled execute buffers, the way
/// a host fills the buffers it locked from the driver. Frames of equal size
/// share one allocation.
#[derive(Debug, Default)]
pub struct ExecuteBufferStaging {
    pool: ExecuteBufferPool,
}

impl ExecuteBufferStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `commands` into a pooled buffer, runs `submit` over it and gives
    /// the buffer back.
    pub fn submit<R>(&mut self, commands: &[u8], submit: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let key = self.pool.acquire(commands.len());
        self.pool
            .buffer_mut(key)
            .context("freshly acquired execute buffer is missing")?
            .copy_from_slice(commands);
        let result = self
            .pool
            .buffer(key)
            .map(submit)
            .context("staged execute buffer is missing");
        self.pool.release(key);
        result
    }

    /// Buffers allocated so far.
    pub fn allocated(&self) -> usize {
        self.pool.allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_sized_frames_share_a_buffer() {
        let mut staging = ExecuteBufferStaging::new();
        let first = staging.submit(&[1, 2, 3, 4], <[u8]>::to_vec).unwrap();
        let second = staging.submit(&[5, 6, 7, 8], <[u8]>::to_vec).unwrap();
        assert_eq!(first, [1, 2, 3, 4]);
        assert_eq!(second, [5, 6, 7, 8]);
        assert_eq!(staging.allocated(), 1);

        staging.submit(&[0; 12], |bytes| assert_eq!(bytes.len(), 12)).unwrap();
        assert_eq!(staging.allocated(), 2);
    }
}
