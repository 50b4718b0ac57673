//! Persistence: raw arena write on save, memory-mapped read on load.
//!
//! An index file is nothing but the arena: `n_nodes` packed records, no
//! header, no magic, host endianness. The structure is recovered from the
//! build invariant that a copy of every root is appended at the end of the
//! arena: a loader scans backward collecting the run of records with equal
//! descendant counts, and that common count is the item count.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::MmapOptions;

use crate::error::ForestError;
use crate::forest::arena::NodeArena;
use crate::forest::distance::Metric;
use crate::forest::index::ForestIndex;

impl<M: Metric> ForestIndex<M> {
    /// Write the arena to `path`, then release it and re-open the file
    /// memory-mapped, so this instance transitions into the loaded state.
    ///
    /// If the write fails the in-memory index is left intact; if the
    /// re-open fails the index is left empty, like a failed [`load`](Self::load).
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        let len = self.n_nodes as usize * self.node_size;
        file.write_all(&self.arena.bytes()[..len])?;
        drop(file);

        self.unload();
        self.load(path)
    }

    /// Memory-map the index file at `path` and recover the forest structure
    /// from the record tail. Any previous state (heap or mapped) is
    /// released first; on failure the index is left empty.
    ///
    /// The recovered item count is the shared descendant count of the tail
    /// run, which holds for any file this crate writes because every root
    /// spans the full item set. Only whole-record file sizes are accepted;
    /// deeper corruption is undetectable in a headerless format.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        self.reinitialize();

        let file = File::open(path.as_ref())?;
        // Safety contract of memmap2: the file must not be truncated or
        // rewritten while mapped. Exclusive ownership of index files is
        // already part of this crate's concurrency contract.
        #[cfg(target_os = "linux")]
        let map = unsafe { MmapOptions::new().populate().map(&file)? };
        #[cfg(not(target_os = "linux"))]
        let map = unsafe { MmapOptions::new().map(&file)? };

        let size = map.len();
        if size % self.node_size != 0 {
            return Err(ForestError::MalformedFile {
                size: size as u64,
                node_size: self.node_size,
            });
        }
        self.arena = NodeArena::from_mmap(map, self.node_size);
        debug_assert!(self.arena.is_mapped());
        self.n_nodes = (size / self.node_size) as i32;

        // Collect the tail run of equal descendant counts.
        let mut degree = -1;
        for id in (0..self.n_nodes).rev() {
            let d = self.node(id).n_descendants();
            if degree == -1 || d == degree {
                self.roots.push(id);
                degree = d;
            } else {
                break;
            }
        }
        // The last true root joins the scan when it shares its descendant
        // count with the appended copies; it is then counted twice, once as
        // itself and once through its copy. Drop the extra entry.
        if self.roots.len() > 1
            && self.node(self.roots[0]).child(0)
                == self.node(self.roots[self.roots.len() - 1]).child(0)
        {
            self.roots.pop();
        }

        self.n_items = degree;
        self.loaded = true;
        if self.verbose {
            tracing::info!("found {} roots with degree {}", self.roots.len(), degree);
        }
        Ok(())
    }

    /// Release the arena (unmapping the file in the loaded state, freeing
    /// the buffer otherwise) and reset to the freshly-created state.
    pub fn unload(&mut self) {
        self.reinitialize();
        if self.verbose {
            tracing::info!("unloaded");
        }
    }

    fn reinitialize(&mut self) {
        self.arena = NodeArena::new(self.node_size);
        self.n_items = 0;
        self.n_nodes = 0;
        self.roots.clear();
        self.loaded = false;
    }
}
