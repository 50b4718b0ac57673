//! Packed node records and typed views over them.
//!
//! Every node in an index occupies the same number of bytes, so the arena is
//! addressable as `base + id * node_size` and a saved file is nothing but a
//! run of records. A record starts with its descendant count, then (for
//! Minkowski metrics) the split-plane offset, then the children pair, then
//! the coordinate run:
//!
//! ```text
//! n_descendants: i32 | [a: f32] | children: [i32; 2] | v: [f32; dimension]
//! ```
//!
//! The descendant count encodes the node kind. `1` is a leaf holding a data
//! point. `2..=max_bucket` is a bucket: the children pair and coordinate run
//! are reinterpreted as a flat list of descendant ids. Anything larger is an
//! internal split whose coordinates are the plane normal.
//!
//! All field offsets are multiples of 4 and both arena backings are at least
//! 4-byte aligned, so the `bytemuck` slice casts here never fail.

use std::marker::PhantomData;
use std::mem::size_of;

use crate::forest::distance::Metric;

/// Byte offset of the coordinate run within a record.
pub const fn vector_offset<M: Metric>() -> usize {
    M::CHILDREN_OFFSET + 2 * size_of::<i32>()
}

/// Size in bytes of one node record at the given dimension.
pub const fn node_size<M: Metric>(dimension: usize) -> usize {
    vector_offset::<M>() + dimension * size_of::<f32>()
}

/// Largest descendant count a bucket node can hold: the children pair plus
/// the coordinate run, reused as raw id storage.
pub const fn max_bucket<M: Metric>(node_size: usize) -> usize {
    (node_size - M::CHILDREN_OFFSET) / size_of::<i32>()
}

/// Shared view of a single node record.
pub struct NodeRef<'a, M> {
    bytes: &'a [u8],
    _metric: PhantomData<M>,
}

impl<M> Clone for NodeRef<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for NodeRef<'_, M> {}

impl<'a, M: Metric> NodeRef<'a, M> {
    /// `bytes` must be exactly one record, 4-byte aligned.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            _metric: PhantomData,
        }
    }

    #[inline]
    pub fn n_descendants(self) -> i32 {
        bytemuck::pod_read_unaligned(&self.bytes[..4])
    }

    #[inline]
    pub fn child(self, side: usize) -> i32 {
        let at = M::CHILDREN_OFFSET + side * 4;
        bytemuck::pod_read_unaligned(&self.bytes[at..at + 4])
    }

    /// Split-plane offset `a`. Only stored by Minkowski layouts; angular
    /// records have no such field and never read it.
    #[inline]
    pub fn plane_offset(self) -> f32 {
        bytemuck::pod_read_unaligned(&self.bytes[4..8])
    }

    /// The coordinate run: a data point for leaves, a plane normal for splits.
    #[inline]
    pub fn vector(self) -> &'a [f32] {
        bytemuck::cast_slice(&self.bytes[vector_offset::<M>()..])
    }

    /// Descendant ids of a bucket node, stored across the children pair and
    /// coordinate run.
    #[inline]
    pub fn descendant_ids(self) -> &'a [i32] {
        let count = self.n_descendants() as usize;
        let start = M::CHILDREN_OFFSET;
        bytemuck::cast_slice(&self.bytes[start..start + count * 4])
    }
}

/// Exclusive view of a single node record.
pub struct NodeMut<'a, M> {
    bytes: &'a mut [u8],
    _metric: PhantomData<M>,
}

impl<'a, M: Metric> NodeMut<'a, M> {
    /// `bytes` must be exactly one record, 4-byte aligned.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            bytes,
            _metric: PhantomData,
        }
    }

    pub fn as_ref(&self) -> NodeRef<'_, M> {
        NodeRef::new(self.bytes)
    }

    pub fn set_n_descendants(&mut self, n: i32) {
        self.bytes[..4].copy_from_slice(&n.to_ne_bytes());
    }

    pub fn set_child(&mut self, side: usize, id: i32) {
        let at = M::CHILDREN_OFFSET + side * 4;
        self.bytes[at..at + 4].copy_from_slice(&id.to_ne_bytes());
    }

    pub fn set_plane_offset(&mut self, a: f32) {
        self.bytes[4..8].copy_from_slice(&a.to_ne_bytes());
    }

    pub fn vector_mut(&mut self) -> &mut [f32] {
        bytemuck::cast_slice_mut(&mut self.bytes[vector_offset::<M>()..])
    }

    /// Store a bucket's descendant ids over the children pair and coordinate
    /// run. The count itself is written separately via `set_n_descendants`.
    pub fn set_descendant_ids(&mut self, ids: &[i32]) {
        let start = M::CHILDREN_OFFSET;
        self.bytes[start..start + ids.len() * 4].copy_from_slice(bytemuck::cast_slice(ids));
    }
}
