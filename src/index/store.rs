use ahash::RandomState;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Dense ID <-> name bijection.
/// IDs are the insertion positions of an `IndexSet`, so they are contiguous
/// in 0..len and iteration always proceeds in ID order. Removal renumbers
/// every surviving ID down by the count of removed IDs strictly below it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameStore {
    names: IndexSet<Box<str>, RandomState>,
}

impl NameStore {
    pub fn new() -> Self {
        Self {
            names: IndexSet::with_hasher(RandomState::new()),
        }
    }

    /// Insert a new name, returning its dense ID.
    /// A duplicate name is a construction error, not an upsert.
    pub fn add(&mut self, name: &str) -> Result<u32, IndexError> {
        if self.names.contains(name) {
            return Err(IndexError::DuplicateName(name.to_string()));
        }
        let (id, _) = self.names.insert_full(Box::from(name));
        Ok(id as u32)
    }

    /// Resolve a name to its ID.
    pub fn id(&self, name: &str) -> Option<u32> {
        self.names.get_index_of(name).map(|i| i as u32)
    }

    /// Resolve an ID back to its name.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get_index(id as usize).map(|s| s.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s.as_ref()))
    }

    /// Remove a set of IDs and rebuild the dense numbering.
    /// Survivors keep their relative order. The returned remap is what every
    /// referencing structure must be rewritten through.
    pub fn remove(&mut self, ids: &[u32]) -> IdRemap {
        let remap = IdRemap::new(self.names.len(), ids);
        let mut next: IndexSet<Box<str>, RandomState> =
            IndexSet::with_capacity_and_hasher(remap.survivor_count(), RandomState::new());
        for (old, name) in self.names.iter().enumerate() {
            if remap.get(old as u32).is_some() {
                next.insert(name.clone());
            }
        }
        self.names = next;
        remap
    }
}

/// Explicit old-ID -> new-ID map built once per removal and applied to every
/// incidence structure in one pass. Because survivors only shift down, the
/// map is monotone: rewriting a sorted ID list through it keeps it sorted.
#[derive(Debug, Clone)]
pub struct IdRemap {
    map: Vec<Option<u32>>,
    survivors: usize,
}

impl IdRemap {
    /// `removed` may be unsorted and may contain duplicates; out-of-range
    /// entries are ignored.
    pub fn new(len: usize, removed: &[u32]) -> Self {
        let mut gone = vec![false; len];
        for &id in removed {
            if let Some(slot) = gone.get_mut(id as usize) {
                *slot = true;
            }
        }
        let mut map = Vec::with_capacity(len);
        let mut next = 0u32;
        for g in gone {
            if g {
                map.push(None);
            } else {
                map.push(Some(next));
                next += 1;
            }
        }
        Self {
            map,
            survivors: next as usize,
        }
    }

    /// Identity remap over `len` IDs (nothing removed).
    pub fn identity(len: usize) -> Self {
        Self {
            map: (0..len as u32).map(Some).collect(),
            survivors: len,
        }
    }

    /// New ID of `old`, or `None` if it was removed.
    pub fn get(&self, old: u32) -> Option<u32> {
        self.map.get(old as usize).copied().flatten()
    }

    pub fn old_len(&self) -> usize {
        self.map.len()
    }

    pub fn survivor_count(&self) -> usize {
        self.survivors
    }

    /// Rewrite a sorted ID list in place, dropping removed entries.
    /// Monotonicity of the map preserves sortedness.
    pub fn rewrite_sorted(&self, ids: &mut Vec<u32>) {
        ids.retain_mut(|id| match self.get(*id) {
            Some(new) => {
                *id = new;
                true
            }
            None => false,
        });
    }

    /// Rewrite a sorted ID list with a parallel payload vector, keeping the
    /// two aligned.
    pub fn rewrite_sorted_with<T>(&self, ids: &mut Vec<u32>, payload: &mut Vec<T>) {
        debug_assert_eq!(ids.len(), payload.len());
        let mut write = 0usize;
        for read in 0..ids.len() {
            if let Some(new) = self.get(ids[read]) {
                ids[write] = new;
                payload.swap(write, read);
                write += 1;
            }
        }
        ids.truncate(write);
        payload.truncate(write);
    }
}

/// Dense document name <-> ID store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    names: NameStore,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            names: NameStore::new(),
        }
    }

    pub fn add_document(&mut self, name: &str) -> Result<u32, IndexError> {
        self.names.add(name)
    }

    pub fn document(&self, name: &str) -> Option<u32> {
        self.names.id(name)
    }

    pub fn document_name(&self, id: u32) -> Option<&str> {
        self.names.name(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter()
    }

    pub fn remove_documents(&mut self, ids: &[u32]) -> IdRemap {
        self.names.remove(ids)
    }
}

/// Dense feature (vocabulary term) name <-> ID store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureStore {
    names: NameStore,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self {
            names: NameStore::new(),
        }
    }

    pub fn add_feature(&mut self, name: &str) -> Result<u32, IndexError> {
        self.names.add(name)
    }

    pub fn feature(&self, name: &str) -> Option<u32> {
        self.names.id(name)
    }

    pub fn feature_name(&self, id: u32) -> Option<&str> {
        self.names.name(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter()
    }

    pub fn remove_features(&mut self, ids: &[u32]) -> IdRemap {
        self.names.remove(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_in_insertion_order() {
        let mut store = NameStore::new();
        assert_eq!(store.add("alpha").unwrap(), 0);
        assert_eq!(store.add("beta").unwrap(), 1);
        assert_eq!(store.add("gamma").unwrap(), 2);
        assert_eq!(store.id("beta"), Some(1));
        assert_eq!(store.name(2), Some("gamma"));
        assert_eq!(store.name(3), None);
        let collected: Vec<_> = store.iter().collect();
        assert_eq!(collected, vec![(0, "alpha"), (1, "beta"), (2, "gamma")]);
    }

    #[test]
    fn duplicate_name_is_a_construction_error() {
        let mut store = NameStore::new();
        store.add("alpha").unwrap();
        assert!(matches!(
            store.add("alpha"),
            Err(IndexError::DuplicateName(_))
        ));
        // Store unchanged by the failed insert.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removal_shifts_survivors_down_preserving_order() {
        let mut store = NameStore::new();
        for name in ["a", "b", "c", "d", "e"] {
            store.add(name).unwrap();
        }
        let remap = store.remove(&[1, 3]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.id("a"), Some(0));
        assert_eq!(store.id("c"), Some(1));
        assert_eq!(store.id("e"), Some(2));
        assert_eq!(store.id("b"), None);
        assert_eq!(remap.get(0), Some(0));
        assert_eq!(remap.get(1), None);
        assert_eq!(remap.get(2), Some(1));
        assert_eq!(remap.get(3), None);
        assert_eq!(remap.get(4), Some(2));
        assert_eq!(remap.survivor_count(), 3);
    }

    #[test]
    fn remove_then_re_add_keeps_ids_dense() {
        let mut store = DocumentStore::new();
        for name in ["d0", "d1", "d2"] {
            store.add_document(name).unwrap();
        }
        store.remove_documents(&[0, 2]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.add_document("d3").unwrap(), 1);
        assert_eq!(store.add_document("d0").unwrap(), 2);
        // Count of valid iterator elements always equals len.
        assert_eq!(store.iter().count(), store.len());
    }

    #[test]
    fn remap_rewrite_keeps_sorted_lists_sorted() {
        let remap = IdRemap::new(8, &[2, 5]);
        let mut ids = vec![0, 2, 3, 5, 7];
        remap.rewrite_sorted(&mut ids);
        // Survivors 0, 3, 7 land on 0, 2, 5 after the two removals below.
        assert_eq!(ids, vec![0, 2, 5]);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let mut ids = vec![1, 2, 4, 6];
        let mut vals = vec!["a", "b", "c", "d"];
        remap.rewrite_sorted_with(&mut ids, &mut vals);
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(vals, vec!["a", "c", "d"]);
    }

    #[test]
    fn remap_ignores_out_of_range_and_duplicate_removals() {
        let remap = IdRemap::new(3, &[1, 1, 99]);
        assert_eq!(remap.get(0), Some(0));
        assert_eq!(remap.get(1), None);
        assert_eq!(remap.get(2), Some(1));
        assert_eq!(remap.survivor_count(), 2);
    }
}
