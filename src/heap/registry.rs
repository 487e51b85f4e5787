//! Name -> dense index registry for multiple named symmetric heaps
//! (spec §4.1).
//!
//! `name_to_index` is idempotent and assigns indices monotonically on
//! first sight; `index_to_name` is a linear scan, matching spec.md's
//! "Registry" contract exactly (it is not a hot path — heaps are
//! registered once at startup, not per-collective).

use crate::heap::Heap;
use crate::sync::SpinMutex;

const MAX_HEAPS: usize = 64;

pub struct Registry {
    names: SpinMutex<Vec<String>>,
    heaps: Box<[Heap]>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            names: SpinMutex::new(Vec::new()),
            heaps: (0..MAX_HEAPS).map(|_| Heap::empty()).collect(),
        }
    }

    /// Returns the dense index for `name`, creating one on first sight.
    pub fn name_to_index(&self, name: &str) -> usize {
        let mut names = self.names.lock();
        if let Some(idx) = names.iter().position(|n| n == name) {
            return idx;
        }
        assert!(
            names.len() < MAX_HEAPS,
            "oshmem: too many named heaps (max {MAX_HEAPS})"
        );
        names.push(name.to_string());
        names.len() - 1
    }

    /// Linear scan from index back to name; `None` if `idx` was never
    /// assigned.
    pub fn index_to_name(&self, idx: usize) -> Option<String> {
        self.names.lock().get(idx).cloned()
    }

    /// Borrows the allocator instance for a previously-registered index.
    pub fn heap(&self, idx: usize) -> &Heap {
        &self.heaps[idx]
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_to_index_is_idempotent() {
        let reg = Registry::new();
        let a = reg.name_to_index("heap.main");
        let b = reg.name_to_index("heap.main");
        assert_eq!(a, b);
    }

    #[test]
    fn index_to_name_round_trips() {
        let reg = Registry::new();
        for name in ["alpha", "beta", "gamma"] {
            let idx = reg.name_to_index(name);
            assert_eq!(reg.index_to_name(idx).as_deref(), Some(name));
        }
    }

    #[test]
    fn distinct_names_get_distinct_indices() {
        let reg = Registry::new();
        let a = reg.name_to_index("a");
        let b = reg.name_to_index("b");
        assert_ne!(a, b);
    }
}
