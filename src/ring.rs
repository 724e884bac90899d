// Copyright 2025 Dustin McAfee
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

//! Single-producer/single-consumer bounded byte ring.
//!
//! One lock guards the monotonically increasing `in`/`out` counters and
//! the backing buffer; there is no condition variable. A stage that finds
//! its ring empty (or full) is expected to poll — loop with `continue` on
//! the producer side, or a short sleep on the consumer side — rather than
//! block on this type.

use std::sync::Mutex;

struct Inner {
    buffer: Vec<u8>,
    mask: usize,
    in_: usize,
    out: usize,
}

/// A bounded SPSC ring with power-of-two capacity.
///
/// `put` writes `min(size, capacity - (in - out))` bytes and returns the
/// number written; `get` reads `min(size, in - out)` bytes and returns the
/// number read. Neither call ever blocks. A short write/read is not an
/// error at this layer — the caller (a pipeline stage) decides whether a
/// partial record is fatal for that iteration.
pub struct Ring {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Ring {
    /// Allocate a new ring. `requested` is rounded up to the next power of
    /// two, matching the C original's `roundup_power_of_2`.
    pub fn new(requested: usize) -> Self {
        let capacity = requested.next_power_of_two().max(1);
        Ring {
            inner: Mutex::new(Inner {
                buffer: vec![0u8; capacity],
                mask: capacity - 1,
                in_: 0,
                out: 0,
            }),
            capacity,
        }
    }

    /// Ring capacity in bytes (always a power of two).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently queued (not yet consumed).
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("ring mutex poisoned");
        inner.in_ - inner.out
    }

    /// Whether the ring currently holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write as many bytes of `data` as fit; returns the number written.
    pub fn put(&self, data: &[u8]) -> usize {
        let mut inner = self.inner.lock().expect("ring mutex poisoned");
        let free = self.capacity - (inner.in_ - inner.out);
        let size = data.len().min(free);

        let mask = inner.mask;
        let start = inner.in_ & mask;
        let first = size.min(self.capacity - start);
        inner.buffer[start..start + first].copy_from_slice(&data[..first]);
        if size > first {
            inner.buffer[..size - first].copy_from_slice(&data[first..size]);
        }
        inner.in_ += size;

        size
    }

    /// Read up to `out.len()` bytes into `out`; returns the number read.
    /// When the ring drains to empty, the counters collapse back to 0.
    pub fn get(&self, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().expect("ring mutex poisoned");
        let available = inner.in_ - inner.out;
        let size = out.len().min(available);

        let mask = inner.mask;
        let start = inner.out & mask;
        let first = size.min(self.capacity - start);
        out[..first].copy_from_slice(&inner.buffer[start..start + first]);
        if size > first {
            out[first..size].copy_from_slice(&inner.buffer[..size - first]);
        }
        inner.out += size;

        if inner.in_ == inner.out {
            inner.in_ = 0;
            inner.out = 0;
        }

        size
    }

    /// Write exactly one record, or drop it. Mirrors the pipeline's
    /// backpressure policy (§5): a producer whose ring is full loses the
    /// frame and the caller is expected to log a warning, not retry.
    pub fn put_record(&self, record: &[u8]) -> bool {
        self.put(record) == record.len()
    }

    /// Read exactly one record of `record.len()` bytes, or none at all.
    pub fn get_record(&self, record: &mut [u8]) -> bool {
        let mut inner = self.inner.lock().expect("ring mutex poisoned");
        let available = inner.in_ - inner.out;
        if available < record.len() {
            return false;
        }
        let mask = inner.mask;
        let size = record.len();
        let start = inner.out & mask;
        let first = size.min(self.capacity - start);
        record[..first].copy_from_slice(&inner.buffer[start..start + first]);
        if size > first {
            record[first..size].copy_from_slice(&inner.buffer[..size - first]);
        }
        inner.out += size;
        if inner.in_ == inner.out {
            inner.in_ = 0;
            inner.out = 0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let ring = Ring::new(100);
        assert_eq!(ring.capacity(), 128);
    }

    #[test]
    fn put_get_roundtrip() {
        let ring = Ring::new(16);
        let data = [1u8, 2, 3, 4];
        assert_eq!(ring.put(&data), 4);
        let mut buf = [0u8; 4];
        assert_eq!(ring.get(&mut buf), 4);
        assert_eq!(buf, data);
    }

    #[test]
    fn put_truncates_when_full() {
        let ring = Ring::new(4);
        let data = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(ring.put(&data), 4);
    }

    #[test]
    fn get_truncates_when_empty() {
        let ring = Ring::new(8);
        let mut buf = [0u8; 4];
        assert_eq!(ring.get(&mut buf), 0);
    }

    #[test]
    fn counters_collapse_on_drain() {
        let ring = Ring::new(8);
        for _ in 0..100 {
            assert_eq!(ring.put(&[9u8; 4]), 4);
            let mut buf = [0u8; 4];
            assert_eq!(ring.get(&mut buf), 4);
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn wraps_around_buffer_boundary() {
        let ring = Ring::new(8);
        let mut scratch = [0u8; 6];
        assert_eq!(ring.put(&[1, 2, 3, 4, 5, 6]), 6);
        assert_eq!(ring.get(&mut scratch), 6);
        assert_eq!(scratch, [1, 2, 3, 4, 5, 6]);
        let data = [7u8, 8, 9, 10];
        assert_eq!(ring.put(&data), 4);
        let mut buf = [0u8; 4];
        assert_eq!(ring.get(&mut buf), 4);
        assert_eq!(buf, data);
    }

    #[test]
    fn record_helpers_are_all_or_nothing() {
        let ring = Ring::new(8);
        assert!(ring.put_record(&[1, 2, 3, 4, 5]));
        let mut buf = [0u8; 6];
        assert!(!ring.get_record(&mut buf));
        let mut buf = [0u8; 5];
        assert!(ring.get_record(&mut buf));
    }
}
