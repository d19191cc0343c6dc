//! Fenced ring sub-allocator for staging memory.
//!
//! The ring hands out consecutive regions of a fixed-size arena and wraps
//! around when it reaches the end. Every region is tagged with the fence of
//! the frame that wrote it; space only becomes writable again once
//! [`RingAllocator::retire`] sees that the GPU passed the fence.
//!
//! ```
//! use strata_graphics::memory::RingAllocator;
//!
//! let mut ring = RingAllocator::new(1024, 256);
//! let first = ring.allocate(100, 1).unwrap();
//! let second = ring.allocate(100, 1).unwrap();
//! assert_eq!((first.offset, second.offset), (0, 256));
//!
//! // Frame 1 is still on the GPU, the arena is full after two more regions.
//! ring.allocate(256, 2).unwrap();
//! ring.allocate(256, 2).unwrap();
//! assert!(ring.allocate(1, 2).is_none());
//!
//! ring.retire(1);
//! assert_eq!(ring.allocate(100, 2).unwrap().offset, 0);
//! ```

use std::collections::VecDeque;

/// A sub-allocation from a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingAllocation {
    /// Byte offset into the arena.
    pub offset: u64,
    /// Size of the allocation in bytes.
    pub size: u64,
}

impl RingAllocation {
    /// Create a new ring allocation.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the end offset (offset + size).
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    fence: u64,
    /// Bytes consumed, including alignment padding and skipped tail space.
    consumed: u64,
}

/// Ring sub-allocator with fence-based reclamation.
#[derive(Debug)]
pub struct RingAllocator {
    capacity: u64,
    alignment: u64,
    head: u64,
    used: u64,
    in_flight: VecDeque<InFlight>,
    wrap_count: u64,
}

impl RingAllocator {
    /// Create a ring over `capacity` bytes. Regions start at multiples of
    /// `alignment`, which must be a power of two.
    pub fn new(capacity: u64, alignment: u64) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be a power of 2");
        Self {
            capacity: align_up(capacity, alignment),
            alignment,
            head: 0,
            used: 0,
            in_flight: VecDeque::new(),
            wrap_count: 0,
        }
    }

    /// Get the total capacity of the ring.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes not yet reclaimed, including padding.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Get the number of times the ring has wrapped around.
    pub fn wrap_count(&self) -> u64 {
        self.wrap_count
    }

    /// Fence of the newest region still in flight.
    pub fn newest_fence(&self) -> Option<u64> {
        self.in_flight.back().map(|region| region.fence)
    }

    /// Newest fence strictly below `fence` that still holds space.
    pub fn newest_fence_before(&self, fence: u64) -> Option<u64> {
        self.in_flight
            .iter()
            .rev()
            .map(|region| region.fence)
            .find(|&value| value < fence)
    }

    /// Allocate `size` bytes written during the frame signalled by `fence`.
    ///
    /// Returns `None` if there isn't enough contiguous space.
    pub fn allocate(&mut self, size: u64, fence: u64) -> Option<RingAllocation> {
        if size == 0 {
            return Some(RingAllocation::new(self.head, 0));
        }

        let aligned = align_up(self.head, self.alignment);
        let (offset, consumed) = if aligned + size <= self.capacity {
            (aligned, aligned - self.head + size)
        } else {
            (0, self.capacity - self.head + size)
        };
        if self.used + consumed > self.capacity {
            return None;
        }

        if offset == 0 && self.head != 0 {
            self.wrap_count += 1;
        }
        self.head = offset + size;
        self.used += consumed;
        match self.in_flight.back_mut() {
            Some(region) if region.fence == fence => region.consumed += consumed,
            _ => self.in_flight.push_back(InFlight { fence, consumed }),
        }

        Some(RingAllocation::new(offset, size))
    }

    /// Reclaim every region whose fence is at most `completed`.
    pub fn retire(&mut self, completed: u64) {
        while let Some(region) = self.in_flight.front() {
            if region.fence > completed {
                break;
            }
            self.used -= region.consumed;
            self.in_flight.pop_front();
        }
        if self.used == 0 {
            self.head = 0;
        }
    }
}

/// Align a value up to the given alignment.
#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_allocation() {
        let mut ring = RingAllocator::new(1024, 64);

        let alloc1 = ring.allocate(128, 1).unwrap();
        assert_eq!(alloc1.offset, 0);
        assert_eq!(alloc1.size, 128);

        // Already aligned
        let alloc2 = ring.allocate(64, 1).unwrap();
        assert_eq!(alloc2.offset, 128);

        let alloc3 = ring.allocate(100, 1).unwrap();
        assert_eq!(alloc3.offset, 192);
        assert_eq!(alloc3.end(), 292);
        assert_eq!(ring.used(), 292);
    }

    #[test]
    fn test_ring_alignment() {
        let mut ring = RingAllocator::new(1024, 256);
        ring.allocate(100, 1).unwrap();
        let alloc = ring.allocate(50, 1).unwrap();
        // Aligned up from 100
        assert_eq!(alloc.offset, 256);
        assert_eq!(ring.used(), 306);
    }

    #[test]
    fn test_ring_overflow_until_retired() {
        let mut ring = RingAllocator::new(512, 64);
        ring.allocate(400, 1).unwrap();
        assert!(ring.allocate(200, 2).is_none());

        // 448 + 64 == capacity
        let tail = ring.allocate(64, 2).unwrap();
        assert_eq!(tail.offset, 448);
        assert!(ring.allocate(1, 2).is_none());

        ring.retire(1);
        let wrapped = ring.allocate(200, 3).unwrap();
        assert_eq!(wrapped.offset, 0);
        assert_eq!(ring.wrap_count(), 1);
    }

    #[test]
    fn test_ring_wrap_does_not_overrun_tail() {
        let mut ring = RingAllocator::new(1024, 1);
        ring.allocate(600, 1).unwrap();
        ring.allocate(300, 2).unwrap();
        ring.retire(1);
        // 124 bytes left at the end, 600 free at the start
        assert!(ring.allocate(700, 3).is_none());
        let alloc = ring.allocate(500, 3).unwrap();
        assert_eq!(alloc.offset, 0);
        assert!(ring.allocate(200, 3).is_none());
        assert_eq!(ring.newest_fence_before(3), Some(2));
    }

    #[test]
    fn test_ring_zero_allocation() {
        let mut ring = RingAllocator::new(512, 64);
        let alloc = ring.allocate(0, 1).unwrap();
        assert_eq!(alloc.size, 0);
        assert_eq!(ring.used(), 0);
        assert_eq!(ring.newest_fence(), None);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
