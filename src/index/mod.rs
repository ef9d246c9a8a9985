pub mod category;
pub mod classification;
pub mod content;
pub mod store;

use num::Num;
use serde::{Deserialize, Serialize};

use self::category::CategoryStore;
use self::classification::ClassificationRelation;
use self::content::ContentRelation;
use self::store::{DocumentStore, FeatureStore, IdRemap};

/// The in-memory compact index: dense document/category/feature stores plus
/// the classification and content incidence relations, kept consistent as a
/// unit.
///
/// Lifecycle: stores are populated add-only, the relations are frozen in via
/// their builders, then the index is read-mostly. The removal operations are
/// the only in-place mutators; each builds one [`IdRemap`] and rewrites every
/// member structure through it, so IDs stay dense and all cross-references
/// stay valid. `Clone` is a deep copy sharing no mutable state; cloning is
/// the isolation mechanism for independent experiments.
///
/// `N` is the content frequency parameter (any `num::Num + Copy`, default
/// `u32`); similarity functions convert through `f64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactIndex<N = u32> {
    documents: DocumentStore,
    categories: CategoryStore,
    features: FeatureStore,
    classification: ClassificationRelation,
    content: ContentRelation<N>,
}

impl<N> Default for CompactIndex<N>
where
    N: Num + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N> CompactIndex<N>
where
    N: Num + Copy,
{
    pub fn new() -> Self {
        Self {
            documents: DocumentStore::new(),
            categories: CategoryStore::new(),
            features: FeatureStore::new(),
            classification: ClassificationRelation::empty(),
            content: ContentRelation::empty(),
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut DocumentStore {
        &mut self.documents
    }

    pub fn categories(&self) -> &CategoryStore {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut CategoryStore {
        &mut self.categories
    }

    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut FeatureStore {
        &mut self.features
    }

    pub fn classification(&self) -> &ClassificationRelation {
        &self.classification
    }

    pub fn content(&self) -> &ContentRelation<N> {
        &self.content
    }

    /// Freeze a built classification relation into the index.
    pub fn set_classification(&mut self, relation: ClassificationRelation) {
        self.classification = relation;
    }

    /// Freeze a built content relation into the index.
    pub fn set_content(&mut self, relation: ContentRelation<N>) {
        self.content = relation;
    }

    /// Remove documents and renumber every referencing structure.
    pub fn remove_documents(&mut self, ids: &[u32]) -> IdRemap {
        let remap = self.documents.remove_documents(ids);
        self.classification.remap_documents(&remap);
        self.content.remap_documents(&remap);
        remap
    }

    /// Remove categories, renumber, and rewrite the hierarchy and the
    /// classification relation.
    pub fn remove_categories(&mut self, ids: &[u32]) -> IdRemap {
        let remap = self.categories.remove_categories(ids);
        self.classification.remap_categories(&remap);
        remap
    }

    /// Remove features and rewrite the content matrix.
    pub fn remove_features(&mut self, ids: &[u32]) -> IdRemap {
        let remap = self.features.remove_features(ids);
        self.content.remap_features(&remap);
        remap
    }
}

#[cfg(test)]
mod tests {
    use super::classification::{ClassificationBuilder, ClassificationLayout};
    use super::content::ContentBuilder;
    use super::*;

    fn build_index() -> CompactIndex<u32> {
        let mut index = CompactIndex::new();
        for d in ["d0", "d1", "d2", "d3"] {
            index.documents_mut().add_document(d).unwrap();
        }
        for c in ["catA", "catB"] {
            index.categories_mut().add_category(c).unwrap();
        }
        for f in ["f0", "f1", "f2"] {
            index.features_mut().add_feature(f).unwrap();
        }

        let mut cls = ClassificationBuilder::new(4, 2, ClassificationLayout::Bidirectional);
        cls.set(0, 0, true).unwrap();
        cls.set(1, 0, true).unwrap();
        cls.set(2, 1, true).unwrap();
        cls.set(3, 1, true).unwrap();
        index.set_classification(cls.build());

        let mut content = ContentBuilder::new(4, 3);
        content.set_frequency(0, 0, 3u32).unwrap();
        content.set_frequency(1, 0, 2).unwrap();
        content.set_frequency(2, 1, 4).unwrap();
        content.set_frequency(3, 2, 1).unwrap();
        index.set_content(content.build(true));
        index
    }

    #[test]
    fn category_removal_is_consistent_across_the_whole_index() {
        let mut index = build_index();
        index.remove_categories(&[0]);
        assert_eq!(index.categories().len(), 1);
        assert_eq!(index.categories().category("catB"), Some(0));
        // No document is a member of the removed category under any surviving ID.
        for d in 0..4 {
            assert_eq!(index.classification().has(d, 0), d >= 2);
        }
        assert_eq!(index.classification().category_count(), 1);
    }

    #[test]
    fn document_removal_is_consistent_across_the_whole_index() {
        let mut index = build_index();
        index.remove_documents(&[0, 2]);
        assert_eq!(index.documents().len(), 2);
        assert_eq!(index.documents().document("d1"), Some(0));
        assert_eq!(index.documents().document("d3"), Some(1));
        assert!(index.classification().has(0, 0));
        assert!(index.classification().has(1, 1));
        assert_eq!(index.content().frequency(0, 0), 2);
        assert_eq!(index.content().frequency(1, 2), 1);
        assert_eq!(index.content().documents_with(0), &[0]);
    }

    #[test]
    fn feature_removal_is_consistent_across_the_whole_index() {
        let mut index = build_index();
        index.remove_features(&[0]);
        assert_eq!(index.features().len(), 2);
        assert_eq!(index.features().feature("f1"), Some(0));
        assert_eq!(index.content().frequency(2, 0), 4);
        assert_eq!(index.content().frequency(0, 0), 0);
        assert_eq!(index.content().feature_count(), 2);
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let original = build_index();
        let mut cloned = original.clone();
        cloned.remove_documents(&[0]);
        assert_eq!(original.documents().len(), 4);
        assert_eq!(cloned.documents().len(), 3);
        assert!(original.classification().has(0, 0));
    }
}
