//! Best-first search across all trees of the forest.
//!
//! Traversal is driven by a max-heap of `(bound, node)` pairs, where the
//! bound is the best signed margin still available on the path to that
//! subtree. Descending through a split clamps the child bounds with
//! `min(bound, ±margin)`, so bounds are non-increasing along any
//! root-to-leaf path and popping the largest bound first is a correct
//! best-first order.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::forest::distance::Metric;
use crate::forest::index::ForestIndex;

impl<M: Metric> ForestIndex<M> {
    /// Approximate `n` nearest neighbors of a stored item, the item itself
    /// included. `item` must be in `[0, n_items)`.
    ///
    /// See [`get_nns_by_vector`](Self::get_nns_by_vector).
    pub fn get_nns_by_item(&self, item: i32, n: usize, search_k: Option<usize>) -> Vec<(i32, f32)> {
        self.nearest_neighbors(self.node(item).vector(), n, search_k)
    }

    /// Approximate `n` nearest neighbors of an arbitrary query vector, as
    /// `(id, distance)` pairs ordered by ascending distance (ties by id).
    ///
    /// `search_k` is the candidate budget collected before ranking and
    /// trades latency for recall; it defaults to `n` times the number of
    /// trees. Fewer than `n` results are returned when the budget (or the
    /// index) is exhausted first.
    pub fn get_nns_by_vector(
        &self,
        vector: &[f32],
        n: usize,
        search_k: Option<usize>,
    ) -> Vec<(i32, f32)> {
        self.nearest_neighbors(vector, n, search_k)
    }

    fn nearest_neighbors(&self, query: &[f32], n: usize, search_k: Option<usize>) -> Vec<(i32, f32)> {
        let search_k = search_k.unwrap_or(n * self.roots.len());

        // Seed every root with an unbounded priority so each tree
        // contributes at least one path.
        let mut queue: BinaryHeap<(OrderedFloat<f32>, i32)> = BinaryHeap::new();
        for &root in &self.roots {
            queue.push((OrderedFloat(f32::INFINITY), root));
        }

        let mut candidates: Vec<i32> = Vec::new();
        while candidates.len() < search_k {
            let Some((OrderedFloat(bound), id)) = queue.pop() else {
                break;
            };
            let node = self.node(id);
            let descendants = node.n_descendants();
            if descendants == 1 && id < self.n_items {
                candidates.push(id);
            } else if descendants as usize <= self.max_bucket {
                candidates.extend_from_slice(node.descendant_ids());
            } else {
                let margin = M::margin(node, query);
                queue.push((OrderedFloat(bound.min(margin)), node.child(1)));
                queue.push((OrderedFloat(bound.min(-margin)), node.child(0)));
            }
        }

        // An item is reachable through several trees; sort by id so
        // duplicates are adjacent and each distance is computed once.
        candidates.sort_unstable();
        let mut ranked: Vec<(OrderedFloat<f32>, i32)> = Vec::with_capacity(candidates.len());
        let mut last = -1;
        for &id in &candidates {
            if id == last {
                continue;
            }
            last = id;
            ranked.push((
                OrderedFloat(M::distance(query, self.node(id).vector())),
                id,
            ));
        }

        // Only the best `n` need to be in order: partition, then sort the
        // prefix. Equal distances rank by ascending id.
        let keep = n.min(ranked.len());
        if keep < ranked.len() {
            ranked.select_nth_unstable(keep);
            ranked.truncate(keep);
        }
        ranked.sort_unstable();

        ranked
            .into_iter()
            .map(|(OrderedFloat(d), id)| (id, M::normalized_distance(d)))
            .collect()
    }
}
