//! Forest construction: recursive hyperplane splitting over the item set.
//!
//! Node ids are assigned post-order: an internal node is always committed
//! after both of its children, so its id is larger than theirs. The smaller
//! child is recursed into first, keeping small subtrees contiguous with the
//! parent record committed right after them.
//!
//! The arena may relocate whenever a record is allocated, so node views are
//! never held across a recursive call; the split plane under construction
//! lives in an owned scratch record until it is committed.

use crate::config::AUTO_BUILD_NODE_FACTOR;
use crate::error::ForestError;
use crate::forest::distance::Metric;
use crate::forest::index::ForestIndex;
use crate::forest::node::{NodeMut, NodeRef};

impl<M: Metric> ForestIndex<M> {
    /// Grow `trees` trees over the current items, then append a copy of
    /// every root at the end of the arena. The file format has no header,
    /// so loaders recover the roots by scanning backward from the tail.
    ///
    /// `None` selects auto mode: trees are added until the arena holds
    /// twice as many nodes as items. More trees give better recall at the
    /// cost of a larger index.
    pub fn build(&mut self, trees: Option<usize>) -> Result<(), ForestError> {
        if self.loaded {
            tracing::warn!("cannot build a loaded index");
            return Err(ForestError::IndexLoaded);
        }

        self.n_nodes = self.n_items;
        loop {
            let done = match trees {
                None => self.n_nodes >= self.n_items * AUTO_BUILD_NODE_FACTOR,
                Some(q) => self.roots.len() >= q,
            };
            if done {
                break;
            }
            if self.verbose {
                tracing::info!("pass {}...", self.roots.len());
            }

            let indices: Vec<i32> = (0..self.n_items).collect();
            let root = self.make_tree(indices);
            self.roots.push(root);

            // A tree over at most one item allocates nothing, so the auto
            // bound would never be reached; one tree is all there is.
            if trees.is_none() && self.n_items <= 1 {
                break;
            }
        }

        self.arena
            .reserve(self.n_nodes as usize + self.roots.len());
        for (i, &root) in self.roots.iter().enumerate() {
            self.arena.copy_node(self.n_nodes + i as i32, root);
        }
        self.n_nodes += self.roots.len() as i32;

        if self.verbose {
            tracing::info!("has {} nodes", self.n_nodes);
        }
        Ok(())
    }

    /// Drop every non-leaf node and all roots, returning the index to the
    /// populating state so items can be added and `build` run again.
    pub fn unbuild(&mut self) -> Result<(), ForestError> {
        if self.loaded {
            tracing::warn!("cannot unbuild a loaded index");
            return Err(ForestError::IndexLoaded);
        }
        self.roots.clear();
        self.n_nodes = self.n_items;
        Ok(())
    }

    /// Build a subtree over `indices` and return its node id.
    fn make_tree(&mut self, indices: Vec<i32>) -> i32 {
        if indices.len() == 1 {
            return indices[0];
        }

        if indices.len() <= self.max_bucket {
            self.arena.reserve(self.n_nodes as usize + 1);
            let id = self.n_nodes;
            self.n_nodes += 1;
            let mut bucket = NodeMut::<M>::new(self.arena.node_bytes_mut(id));
            bucket.set_n_descendants(indices.len() as i32);
            bucket.set_descendant_ids(&indices);
            return id;
        }

        let mut scratch = vec![0u32; self.node_size / 4];
        let mut halves: [Vec<i32>; 2] = [Vec::new(), Vec::new()];
        {
            // Disjoint borrows: the arena is read while the random source
            // advances.
            let arena = &self.arena;
            let rng = &mut self.rng;
            let mut split = NodeMut::<M>::new(bytemuck::cast_slice_mut(&mut scratch));

            let children: Vec<NodeRef<'_, M>> = indices
                .iter()
                .map(|&j| NodeRef::new(arena.node_bytes(j)))
                .collect();
            M::create_split(&children, rng, &mut split);

            for &j in &indices {
                let point = NodeRef::<M>::new(arena.node_bytes(j)).vector();
                let side = M::side(split.as_ref(), point, rng);
                halves[usize::from(side)].push(j);
            }

            // No separating plane found (duplicate or degenerate data):
            // zero the normal and deal every id a random side until both
            // halves are populated.
            while halves[0].is_empty() || halves[1].is_empty() {
                if self.verbose && indices.len() > 100_000 {
                    tracing::info!("failed splitting {} items", indices.len());
                }
                halves[0].clear();
                halves[1].clear();
                split.vector_mut().fill(0.0);
                for &j in &indices {
                    halves[usize::from(rng.flip())].push(j);
                }
            }

            split.set_n_descendants(indices.len() as i32);
        }

        // Recurse into the smaller half first.
        let flip = usize::from(halves[0].len() > halves[1].len());
        let [mut first, mut second] = halves;
        if flip == 1 {
            std::mem::swap(&mut first, &mut second);
        }
        let first_id = self.make_tree(first);
        let second_id = self.make_tree(second);

        let mut split = NodeMut::<M>::new(bytemuck::cast_slice_mut(&mut scratch));
        split.set_child(flip, first_id);
        split.set_child(1 - flip, second_id);

        self.arena.reserve(self.n_nodes as usize + 1);
        let id = self.n_nodes;
        self.n_nodes += 1;
        self.arena
            .node_bytes_mut(id)
            .copy_from_slice(bytemuck::cast_slice(&scratch));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::distance::{Angular, Euclidean, Manhattan};

    fn grid_index(n: i32) -> ForestIndex<Euclidean> {
        let mut index = ForestIndex::new(2);
        index.set_seed(1);
        for i in 0..n {
            index
                .add_item(i, &[(i % 17) as f32, (i / 17) as f32])
                .unwrap();
        }
        index
    }

    #[test]
    fn test_build_produces_requested_trees() {
        let mut index = grid_index(100);
        index.build(Some(7)).unwrap();
        assert_eq!(index.roots.len(), 7);
        // Every root spans the whole item set.
        for &root in &index.roots {
            assert_eq!(index.node(root).n_descendants(), 100);
        }
    }

    #[test]
    fn test_auto_build_reaches_node_budget() {
        let mut index = grid_index(200);
        index.build(None).unwrap();
        assert!(!index.roots.is_empty());
        assert!(index.n_nodes() - (index.roots.len() as i32) >= 2 * index.n_items());
    }

    #[test]
    fn test_root_copies_sit_at_the_tail() {
        let mut index = grid_index(64);
        index.build(Some(3)).unwrap();
        let tail_start = index.n_nodes() - index.roots.len() as i32;
        for (i, &root) in index.roots.iter().enumerate() {
            assert_eq!(
                index.arena.node_bytes(tail_start + i as i32),
                index.arena.node_bytes(root),
                "tail copy {i} differs from root {root}"
            );
        }
    }

    #[test]
    fn test_leaves_untouched_by_build() {
        let mut index = grid_index(50);
        index.build(Some(2)).unwrap();
        for i in 0..50 {
            assert_eq!(index.node(i).n_descendants(), 1, "item {i} is not a leaf");
            assert_eq!(index.get_item(i), &[(i % 17) as f32, (i / 17) as f32]);
        }
    }

    #[test]
    fn test_internal_nodes_count_descendants() {
        let mut index = grid_index(120);
        index.build(Some(1)).unwrap();
        // Walk the single tree and check every subtree's descendant count
        // matches the number of leaves below it.
        fn count(index: &ForestIndex<Euclidean>, id: i32) -> i32 {
            let node = index.node(id);
            let d = node.n_descendants();
            if d == 1 {
                1
            } else if d as usize <= index.max_bucket {
                d
            } else {
                let left = count(index, node.child(0));
                let right = count(index, node.child(1));
                assert_eq!(d, left + right, "descendant count mismatch at node {id}");
                d
            }
        }
        assert_eq!(count(&index, index.roots[0]), 120);
    }

    #[test]
    fn test_small_item_set_becomes_bucket_root() {
        // 3 items in dimension 2: max_bucket is 4, so one bucket node.
        let mut index = ForestIndex::<Euclidean>::new(2);
        for i in 0..3 {
            index.add_item(i, &[i as f32, 0.0]).unwrap();
        }
        index.build(Some(1)).unwrap();
        let root = index.node(index.roots[0]);
        assert_eq!(root.n_descendants(), 3);
        let mut ids = root.descendant_ids().to_vec();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_item_build_completes() {
        for trees in [Some(4), None] {
            let mut index = ForestIndex::<Angular>::new(2);
            index.add_item(0, &[1.0, 0.0]).unwrap();
            index.build(trees).unwrap();
            assert!(!index.roots.is_empty());
            assert!(index.roots.iter().all(|&r| r == 0));
        }
    }

    #[test]
    fn test_identical_items_split_by_fallback() {
        let mut index = ForestIndex::<Manhattan>::new(4);
        for i in 0..1000 {
            index.add_item(i, &[0.5, 0.5, 0.5, 0.5]).unwrap();
        }
        index.build(None).unwrap();
        assert!(index.n_nodes() >= 2 * index.n_items());
        for &root in &index.roots {
            assert_eq!(index.node(root).n_descendants(), 1000);
        }
    }

    #[test]
    fn test_unbuild_resets_to_items() {
        let mut index = grid_index(80);
        index.build(Some(5)).unwrap();
        assert!(index.n_nodes() > 80);
        index.unbuild().unwrap();
        assert_eq!(index.n_nodes(), 80);
        assert!(index.roots.is_empty());
        // And it can be rebuilt.
        index.build(Some(2)).unwrap();
        assert_eq!(index.roots.len(), 2);
    }

    #[test]
    fn test_rebuild_same_seed_same_arena() {
        let mut a = grid_index(150);
        a.build(Some(4)).unwrap();
        let bytes_a = a.arena.bytes()[..a.n_nodes() as usize * a.node_size].to_vec();

        let mut b = grid_index(150);
        b.build(Some(4)).unwrap();
        let bytes_b = b.arena.bytes()[..b.n_nodes() as usize * b.node_size].to_vec();

        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn test_unbuild_then_rebuild_with_same_seed_matches() {
        let mut index = grid_index(150);
        index.build(Some(4)).unwrap();
        let before = index.arena.bytes()[..index.n_nodes() as usize * index.node_size].to_vec();

        index.unbuild().unwrap();
        index.set_seed(1);
        index.build(Some(4)).unwrap();
        let after = index.arena.bytes()[..index.n_nodes() as usize * index.node_size].to_vec();

        assert_eq!(before, after);
    }

    #[test]
    fn test_build_empty_index_with_tree_count() {
        let mut index = ForestIndex::<Euclidean>::new(2);
        index.build(Some(2)).unwrap();
        assert_eq!(index.roots.len(), 2);
        // Roots over no items are empty buckets.
        assert_eq!(index.node(index.roots[0]).n_descendants(), 0);
    }
}
