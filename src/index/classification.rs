use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

use super::category::CategoryStore;
use super::store::IdRemap;

/// Which lookup direction the built relation materializes.
/// The three layouts trade lookup direction for memory; `has` agrees across
/// all of them for the same assignment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationLayout {
    /// Fast "categories of document".
    DocumentIndexed,
    /// Fast "documents in category".
    CategoryIndexed,
    /// Both directions, larger memory.
    Bidirectional,
}

/// One side of the incidence relation: sorted IDs with a parallel primary
/// flag per entry. Membership is a binary search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IncidenceRow {
    ids: Vec<u32>,
    primary: Vec<bool>,
}

impl IncidenceRow {
    fn find(&self, id: u32) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }
}

/// Add-only builder for a [`ClassificationRelation`].
/// Assignment is idempotent: re-setting an existing pair only upgrades its
/// primary flag, it never duplicates the pair.
///
/// Under the category-indexed and bidirectional layouts, a builder
/// constructed through [`with_hierarchy`](Self::with_hierarchy) tags every
/// ancestor of an assigned category as a secondary assignment (hierarchical
/// tagging). The document-indexed layout never propagates.
#[derive(Debug, Clone)]
pub struct ClassificationBuilder {
    layout: ClassificationLayout,
    category_count: usize,
    /// Transitive ancestors per category, snapshotted at construction.
    /// Empty for flat (count-only) builders.
    ancestors: Vec<Vec<u32>>,
    rows: Vec<BTreeMap<u32, bool>>,
}

impl ClassificationBuilder {
    /// Builder over a flat category space of `category_count` IDs.
    pub fn new(document_count: usize, category_count: usize, layout: ClassificationLayout) -> Self {
        Self {
            layout,
            category_count,
            ancestors: Vec::new(),
            rows: vec![BTreeMap::new(); document_count],
        }
    }

    /// Builder over `categories`, snapshotting its ancestor closure so
    /// assignments propagate up the hierarchy (category-indexed and
    /// bidirectional layouts only).
    pub fn with_hierarchy(
        document_count: usize,
        categories: &CategoryStore,
        layout: ClassificationLayout,
    ) -> Self {
        let ancestors = (0..categories.len() as u32)
            .map(|cat| categories.ancestors(cat))
            .collect();
        Self {
            layout,
            category_count: categories.len(),
            ancestors,
            rows: vec![BTreeMap::new(); document_count],
        }
    }

    /// Assign `doc` to `cat`. `primary` upgrades but never downgrades.
    /// Ancestors of `cat` become secondary assignments when this builder
    /// knows the hierarchy and the layout propagates.
    pub fn set(&mut self, doc: u32, cat: u32, primary: bool) -> Result<&mut Self, IndexError> {
        self.set_one(doc, cat, primary)?;
        if matches!(
            self.layout,
            ClassificationLayout::CategoryIndexed | ClassificationLayout::Bidirectional
        ) {
            if let Some(ancestors) = self.ancestors.get(cat as usize).cloned() {
                for anc in ancestors {
                    self.set_one(doc, anc, false)?;
                }
            }
        }
        Ok(self)
    }

    fn set_one(&mut self, doc: u32, cat: u32, primary: bool) -> Result<(), IndexError> {
        if cat as usize >= self.category_count {
            return Err(IndexError::UnknownCategory(cat));
        }
        let row = self
            .rows
            .get_mut(doc as usize)
            .ok_or(IndexError::UnknownDocument(doc))?;
        let flag = row.entry(cat).or_insert(false);
        *flag |= primary;
        Ok(())
    }

    /// Freeze into the read-mostly relation.
    pub fn build(self) -> ClassificationRelation {
        let document_count = self.rows.len();
        let category_count = self.category_count;

        let by_document: Vec<IncidenceRow> = match self.layout {
            ClassificationLayout::DocumentIndexed | ClassificationLayout::Bidirectional => self
                .rows
                .iter()
                .map(|row| IncidenceRow {
                    ids: row.keys().copied().collect(),
                    primary: row.values().copied().collect(),
                })
                .collect(),
            ClassificationLayout::CategoryIndexed => Vec::new(),
        };

        let by_category: Vec<IncidenceRow> = match self.layout {
            ClassificationLayout::CategoryIndexed | ClassificationLayout::Bidirectional => {
                let mut rows = vec![IncidenceRow::default(); category_count];
                // Document order is ascending, so each category row comes out
                // sorted without an extra pass.
                for (doc, row) in self.rows.iter().enumerate() {
                    for (&cat, &primary) in row {
                        let target = &mut rows[cat as usize];
                        target.ids.push(doc as u32);
                        target.primary.push(primary);
                    }
                }
                rows
            }
            ClassificationLayout::DocumentIndexed => Vec::new(),
        };

        ClassificationRelation {
            layout: self.layout,
            document_count,
            category_count,
            by_document,
            by_category,
        }
    }
}

/// Document <-> category incidence relation with per-pair primary flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRelation {
    layout: ClassificationLayout,
    document_count: usize,
    category_count: usize,
    by_document: Vec<IncidenceRow>,
    by_category: Vec<IncidenceRow>,
}

impl ClassificationRelation {
    /// Empty relation over zero documents and categories.
    pub fn empty() -> Self {
        ClassificationBuilder::new(0, 0, ClassificationLayout::Bidirectional).build()
    }

    pub fn layout(&self) -> ClassificationLayout {
        self.layout
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn category_count(&self) -> usize {
        self.category_count
    }

    fn has_document_side(&self) -> bool {
        !matches!(self.layout, ClassificationLayout::CategoryIndexed)
    }

    fn has_category_side(&self) -> bool {
        !matches!(self.layout, ClassificationLayout::DocumentIndexed)
    }

    /// Whether `doc` is assigned to `cat`. Works under every layout.
    pub fn has(&self, doc: u32, cat: u32) -> bool {
        if self.has_document_side() {
            self.by_document
                .get(doc as usize)
                .is_some_and(|row| row.find(cat).is_some())
        } else {
            self.by_category
                .get(cat as usize)
                .is_some_and(|row| row.find(doc).is_some())
        }
    }

    /// Whether `doc` is assigned to `cat` as a primary assignment.
    pub fn is_primary(&self, doc: u32, cat: u32) -> bool {
        if self.has_document_side() {
            self.by_document
                .get(doc as usize)
                .and_then(|row| row.find(cat).map(|i| row.primary[i]))
                .unwrap_or(false)
        } else {
            self.by_category
                .get(cat as usize)
                .and_then(|row| row.find(doc).map(|i| row.primary[i]))
                .unwrap_or(false)
        }
    }

    /// Sorted category IDs assigned to `doc`.
    ///
    /// Requires a layout with a document side.
    pub fn categories_of(&self, doc: u32) -> &[u32] {
        assert!(
            self.has_document_side(),
            "categories_of requires a document-indexed layout"
        );
        self.by_document
            .get(doc as usize)
            .map(|row| row.ids.as_slice())
            .unwrap_or(&[])
    }

    /// Sorted document IDs assigned to `cat`.
    ///
    /// Requires a layout with a category side.
    pub fn documents_in(&self, cat: u32) -> &[u32] {
        assert!(
            self.has_category_side(),
            "documents_in requires a category-indexed layout"
        );
        self.by_category
            .get(cat as usize)
            .map(|row| row.ids.as_slice())
            .unwrap_or(&[])
    }

    /// The document's primary category, falling back to its first assigned
    /// category when no assignment is flagged primary.
    ///
    /// Requires a layout with a document side.
    pub fn primary_category_of(&self, doc: u32) -> Option<u32> {
        assert!(
            self.has_document_side(),
            "primary_category_of requires a document-indexed layout"
        );
        let row = self.by_document.get(doc as usize)?;
        row.primary
            .iter()
            .position(|&p| p)
            .or(if row.ids.is_empty() { None } else { Some(0) })
            .map(|i| row.ids[i])
    }

    /// Iterate all `(doc, cat, primary)` assignments.
    ///
    /// Requires a layout with a document side.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (u32, u32, bool)> + '_ {
        assert!(
            self.has_document_side(),
            "iter_pairs requires a document-indexed layout"
        );
        self.by_document.iter().enumerate().flat_map(|(doc, row)| {
            row.ids
                .iter()
                .zip(row.primary.iter())
                .map(move |(&cat, &primary)| (doc as u32, cat, primary))
        })
    }

    pub fn pair_count(&self) -> usize {
        if self.has_document_side() {
            self.by_document.iter().map(|row| row.ids.len()).sum()
        } else {
            self.by_category.iter().map(|row| row.ids.len()).sum()
        }
    }

    /// Rewrite the relation after a document removal.
    pub fn remap_documents(&mut self, remap: &IdRemap) {
        if self.has_document_side() {
            let mut next = Vec::with_capacity(remap.survivor_count());
            for (old, row) in self.by_document.drain(..).enumerate() {
                if remap.get(old as u32).is_some() {
                    next.push(row);
                }
            }
            self.by_document = next;
        }
        for row in &mut self.by_category {
            remap.rewrite_sorted_with(&mut row.ids, &mut row.primary);
        }
        self.document_count = remap.survivor_count();
    }

    /// Rewrite the relation after a category removal.
    pub fn remap_categories(&mut self, remap: &IdRemap) {
        for row in &mut self.by_document {
            remap.rewrite_sorted_with(&mut row.ids, &mut row.primary);
        }
        if self.has_category_side() {
            let mut next = Vec::with_capacity(remap.survivor_count());
            for (old, row) in self.by_category.drain(..).enumerate() {
                if remap.get(old as u32).is_some() {
                    next.push(row);
                }
            }
            self.by_category = next;
        }
        self.category_count = remap.survivor_count();
    }
}
