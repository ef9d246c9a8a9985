use serde::{Deserialize, Serialize};

use crate::error::IndexError;

use super::store::{IdRemap, NameStore};

/// Dense category name <-> ID store plus a parent DAG.
/// Each category keeps a sorted, deduplicated list of its parent IDs.
/// Acyclicity is enforced at edge insertion with an ancestor walk, not as a
/// structural runtime invariant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryStore {
    names: NameStore,
    parents: Vec<Vec<u32>>,
}

impl CategoryStore {
    pub fn new() -> Self {
        Self {
            names: NameStore::new(),
            parents: Vec::new(),
        }
    }

    pub fn add_category(&mut self, name: &str) -> Result<u32, IndexError> {
        let id = self.names.add(name)?;
        self.parents.push(Vec::new());
        Ok(id)
    }

    pub fn category(&self, name: &str) -> Option<u32> {
        self.names.id(name)
    }

    pub fn category_name(&self, id: u32) -> Option<&str> {
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

    /// Add a hierarchy edge `child -> parent`.
    /// Rejects self-loops and any edge whose insertion would close a cycle
    /// (checked by walking the ancestor chain of `parent`). Inserting an
    /// already-present edge is a no-op.
    pub fn add_parent(&mut self, child: u32, parent: u32) -> Result<(), IndexError> {
        if child as usize >= self.parents.len() {
            return Err(IndexError::UnknownCategory(child));
        }
        if parent as usize >= self.parents.len() {
            return Err(IndexError::UnknownCategory(parent));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(IndexError::HierarchyCycle { child, parent });
        }
        let row = &mut self.parents[child as usize];
        if let Err(pos) = row.binary_search(&parent) {
            row.insert(pos, parent);
        }
        Ok(())
    }

    /// Direct parents of `cat`, sorted ascending.
    pub fn parents(&self, cat: u32) -> &[u32] {
        self.parents
            .get(cat as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Transitive ancestor set of `cat`, sorted ascending.
    pub fn ancestors(&self, cat: u32) -> Vec<u32> {
        let mut seen = vec![false; self.parents.len()];
        let mut stack: Vec<u32> = self.parents(cat).to_vec();
        let mut out = Vec::new();
        while let Some(p) = stack.pop() {
            let slot = &mut seen[p as usize];
            if !*slot {
                *slot = true;
                out.push(p);
                stack.extend_from_slice(self.parents(p));
            }
        }
        out.sort_unstable();
        out
    }

    /// Whether `anc` is reachable by following parent edges from `of`.
    fn is_ancestor(&self, anc: u32, of: u32) -> bool {
        let mut seen = vec![false; self.parents.len()];
        let mut stack: Vec<u32> = self.parents(of).to_vec();
        while let Some(p) = stack.pop() {
            if p == anc {
                return true;
            }
            let slot = &mut seen[p as usize];
            if !*slot {
                *slot = true;
                stack.extend_from_slice(self.parents(p));
            }
        }
        false
    }

    /// Remove a set of categories, renumber the survivors, and rewrite the
    /// hierarchy. Edges referencing a removed category are dropped, not
    /// re-linked to grandparents.
    pub fn remove_categories(&mut self, ids: &[u32]) -> IdRemap {
        let remap = self.names.remove(ids);
        let mut next = Vec::with_capacity(remap.survivor_count());
        for (old, row) in self.parents.drain(..).enumerate() {
            if remap.get(old as u32).is_none() {
                continue;
            }
            let mut row = row;
            remap.rewrite_sorted(&mut row);
            next.push(row);
        }
        self.parents = next;
        remap
    }
}
