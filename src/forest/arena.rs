//! Contiguous node storage with two backings: an owned, growable buffer
//! used while building, and a read-only memory mapping used after load.
//!
//! Exactly one backing is live at a time. Growth may relocate the buffer,
//! so node views must never be held across an allocation; callers re-derive
//! them from ids (the borrow checker enforces this).

use memmap2::Mmap;

use crate::config::ARENA_GROWTH_FACTOR;

enum Backing {
    /// Owned and resizable. Word storage keeps the base 4-byte aligned so
    /// `f32`/`i32` views into records are always valid.
    Heap(Vec<u32>),
    /// Read-only mapping of a saved index file. Dropping it unmaps the
    /// region; the file handle is released when the mapping is created.
    Mapped(Mmap),
}

pub(crate) struct NodeArena {
    backing: Backing,
    node_size: usize,
}

impl NodeArena {
    /// Empty heap-backed arena for records of `node_size` bytes.
    pub fn new(node_size: usize) -> Self {
        debug_assert_eq!(node_size % 4, 0);
        Self {
            backing: Backing::Heap(Vec::new()),
            node_size,
        }
    }

    /// Arena over a mapped index file. The caller has already verified that
    /// the mapping is a whole number of records.
    pub fn from_mmap(map: Mmap, node_size: usize) -> Self {
        Self {
            backing: Backing::Mapped(map),
            node_size,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Capacity in nodes.
    pub fn capacity(&self) -> usize {
        self.bytes().len() / self.node_size
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Heap(buf) => bytemuck::cast_slice(buf),
            Backing::Mapped(map) => map,
        }
    }

    fn heap_mut(&mut self) -> &mut Vec<u32> {
        match &mut self.backing {
            Backing::Heap(buf) => buf,
            // Mutation is gated on the index's loaded flag before entry.
            Backing::Mapped(_) => unreachable!("mutating a memory-mapped arena"),
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(self.heap_mut())
    }

    /// Ensure capacity for at least `n` nodes. Grows to
    /// `max(n, ceil((capacity + 1) * 1.3))`, zero-filling the new space;
    /// existing records keep their contents across the relocation.
    pub fn reserve(&mut self, n: usize) {
        let cap = self.capacity();
        if n > cap {
            let grown = ((cap + 1) as f64 * ARENA_GROWTH_FACTOR).ceil() as usize;
            let new_cap = n.max(grown);
            tracing::debug!(nodes = new_cap, "reallocating node arena");
            let words = new_cap * self.node_size / 4;
            self.heap_mut().resize(words, 0);
        }
    }

    pub fn node_bytes(&self, id: i32) -> &[u8] {
        let start = id as usize * self.node_size;
        &self.bytes()[start..start + self.node_size]
    }

    pub fn node_bytes_mut(&mut self, id: i32) -> &mut [u8] {
        let size = self.node_size;
        let start = id as usize * size;
        &mut self.bytes_mut()[start..start + size]
    }

    /// Byte-for-byte copy of record `src` onto record `dst`.
    pub fn copy_node(&mut self, dst: i32, src: i32) {
        let size = self.node_size;
        let src_start = src as usize * size;
        let dst_start = dst as usize * size;
        self.bytes_mut()
            .copy_within(src_start..src_start + size, dst_start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: usize = 16;

    #[test]
    fn test_new_is_empty() {
        let arena = NodeArena::new(NODE);
        assert_eq!(arena.capacity(), 0);
        assert!(arena.bytes().is_empty());
        assert!(!arena.is_mapped());
    }

    #[test]
    fn test_reserve_growth_policy() {
        let mut arena = NodeArena::new(NODE);
        // From empty: max(1, ceil(1 * 1.3)) = 2.
        arena.reserve(1);
        assert_eq!(arena.capacity(), 2);
        // Within capacity: no change.
        arena.reserve(2);
        assert_eq!(arena.capacity(), 2);
        // Jump past the growth factor: takes the request.
        arena.reserve(10);
        assert_eq!(arena.capacity(), 10);
        // One past capacity: growth factor wins. ceil(11 * 1.3) = 15.
        arena.reserve(11);
        assert_eq!(arena.capacity(), 15);
    }

    #[test]
    fn test_growth_zero_fills_and_preserves() {
        let mut arena = NodeArena::new(NODE);
        arena.reserve(1);
        arena.node_bytes_mut(0).copy_from_slice(&[0xAB; NODE]);
        arena.reserve(100);
        assert_eq!(arena.node_bytes(0), &[0xAB; NODE]);
        for id in 1..100 {
            assert_eq!(arena.node_bytes(id), &[0u8; NODE], "node {id} not zeroed");
        }
    }

    #[test]
    fn test_copy_node() {
        let mut arena = NodeArena::new(NODE);
        arena.reserve(3);
        arena.node_bytes_mut(1).copy_from_slice(&[7u8; NODE]);
        arena.copy_node(2, 1);
        assert_eq!(arena.node_bytes(2), &[7u8; NODE]);
        assert_eq!(arena.node_bytes(1), &[7u8; NODE]);
    }

    #[test]
    fn test_node_addressing() {
        let mut arena = NodeArena::new(NODE);
        arena.reserve(4);
        arena.node_bytes_mut(3)[0] = 1;
        assert_eq!(arena.bytes()[3 * NODE], 1);
        assert_eq!(arena.node_bytes(2), &[0u8; NODE]);
    }
}
