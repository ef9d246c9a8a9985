use std::collections::BTreeMap;

use num::Num;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

use super::store::IdRemap;

/// One document's sparse feature row: sorted unique feature IDs with a
/// parallel frequency array. Zero frequencies are pruned at build time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseRow<N> {
    features: Vec<u32>,
    frequencies: Vec<N>,
}

impl<N> SparseRow<N>
where
    N: Num + Copy,
{
    /// `(feature IDs, frequencies)`, both sides aligned.
    pub fn parts(&self) -> (&[u32], &[N]) {
        (&self.features, &self.frequencies)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Frequency of `feature` in this row, zero if absent.
    pub fn frequency(&self, feature: u32) -> N {
        match self.features.binary_search(&feature) {
            Ok(i) => self.frequencies[i],
            Err(_) => N::zero(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, N)> + '_ {
        self.features
            .iter()
            .zip(self.frequencies.iter())
            .map(|(&f, &v)| (f, v))
    }
}

/// Add-only builder for a [`ContentRelation`].
#[derive(Debug, Clone)]
pub struct ContentBuilder<N> {
    feature_count: usize,
    rows: Vec<BTreeMap<u32, N>>,
}

impl<N> ContentBuilder<N>
where
    N: Num + Copy,
{
    pub fn new(document_count: usize, feature_count: usize) -> Self {
        Self {
            feature_count,
            rows: vec![BTreeMap::new(); document_count],
        }
    }

    /// Set the frequency of `feature` in `doc`. A zero frequency removes the
    /// entry (pruned representation).
    pub fn set_frequency(&mut self, doc: u32, feature: u32, freq: N) -> Result<&mut Self, IndexError> {
        if feature as usize >= self.feature_count {
            return Err(IndexError::UnknownFeature(feature));
        }
        let row = self
            .rows
            .get_mut(doc as usize)
            .ok_or(IndexError::UnknownDocument(doc))?;
        if freq.is_zero() {
            row.remove(&feature);
        } else {
            row.insert(feature, freq);
        }
        Ok(self)
    }

    /// Freeze into the read-mostly relation. `with_postings` additionally
    /// materializes the feature -> documents transpose (the "full" variant).
    pub fn build(self, with_postings: bool) -> ContentRelation<N> {
        let rows: Vec<SparseRow<N>> = self
            .rows
            .iter()
            .map(|row| SparseRow {
                features: row.keys().copied().collect(),
                frequencies: row.values().copied().collect(),
            })
            .collect();
        let postings = with_postings.then(|| Self::transpose(&rows, self.feature_count));
        ContentRelation {
            feature_count: self.feature_count,
            rows,
            postings,
        }
    }

    fn transpose(rows: &[SparseRow<N>], feature_count: usize) -> Vec<Vec<u32>> {
        let mut postings = vec![Vec::new(); feature_count];
        // Ascending document order keeps every posting list sorted.
        for (doc, row) in rows.iter().enumerate() {
            for &feature in &row.features {
                postings[feature as usize].push(doc as u32);
            }
        }
        postings
    }
}

/// Document -> feature sparse frequency matrix, optionally with the symmetric
/// feature -> document view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRelation<N> {
    feature_count: usize,
    rows: Vec<SparseRow<N>>,
    postings: Option<Vec<Vec<u32>>>,
}

impl<N> ContentRelation<N>
where
    N: Num + Copy,
{
    pub fn empty() -> Self {
        ContentBuilder::new(0, 0).build(false)
    }

    pub fn document_count(&self) -> usize {
        self.rows.len()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn row(&self, doc: u32) -> Option<&SparseRow<N>> {
        self.rows.get(doc as usize)
    }

    /// Frequency of `feature` in `doc`, zero if either is absent.
    pub fn frequency(&self, doc: u32, feature: u32) -> N {
        self.rows
            .get(doc as usize)
            .map(|row| row.frequency(feature))
            .unwrap_or_else(N::zero)
    }

    /// Sorted document IDs containing `feature`.
    ///
    /// Requires the full (postings) variant.
    pub fn documents_with(&self, feature: u32) -> &[u32] {
        let postings = self
            .postings
            .as_ref()
            .expect("documents_with requires the full content variant");
        postings
            .get(feature as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_postings(&self) -> bool {
        self.postings.is_some()
    }

    /// Rewrite the matrix after a document removal.
    pub fn remap_documents(&mut self, remap: &IdRemap) {
        let mut next = Vec::with_capacity(remap.survivor_count());
        for (old, row) in self.rows.drain(..).enumerate() {
            if remap.get(old as u32).is_some() {
                next.push(row);
            }
        }
        self.rows = next;
        if let Some(postings) = &mut self.postings {
            for list in postings.iter_mut() {
                remap.rewrite_sorted(list);
            }
        }
    }

    /// Rewrite the matrix after a feature removal.
    pub fn remap_features(&mut self, remap: &IdRemap) {
        for row in &mut self.rows {
            remap.rewrite_sorted_with(&mut row.features, &mut row.frequencies);
        }
        if let Some(postings) = &mut self.postings {
            let mut next = Vec::with_capacity(remap.survivor_count());
            for (old, list) in postings.drain(..).enumerate() {
                if remap.get(old as u32).is_some() {
                    next.push(list);
                }
            }
            *postings = next;
        }
        self.feature_count = remap.survivor_count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_content() -> ContentRelation<u32> {
        let mut builder = ContentBuilder::new(3, 4);
        builder.set_frequency(0, 0, 2).unwrap();
        builder.set_frequency(0, 3, 1).unwrap();
        builder.set_frequency(1, 1, 5).unwrap();
        builder.set_frequency(1, 3, 2).unwrap();
        builder.set_frequency(2, 2, 7).unwrap();
        builder.build(true)
    }

    #[test]
    fn rows_are_sorted_unique_and_zero_pruned() {
        let mut builder = ContentBuilder::new(1, 4);
        builder.set_frequency(0, 3, 2u32).unwrap();
        builder.set_frequency(0, 1, 9).unwrap();
        builder.set_frequency(0, 3, 4).unwrap(); // overwrite, no duplicate
        builder.set_frequency(0, 1, 0).unwrap(); // zero prunes
        let content = builder.build(false);
        let (feats, freqs) = content.row(0).unwrap().parts();
        assert_eq!(feats, &[3]);
        assert_eq!(freqs, &[4]);
        assert_eq!(content.frequency(0, 1), 0);
        assert_eq!(content.frequency(0, 3), 4);
    }

    #[test]
    fn postings_mirror_the_rows() {
        let content = small_content();
        assert_eq!(content.documents_with(3), &[0, 1]);
        assert_eq!(content.documents_with(2), &[2]);
        assert_eq!(content.documents_with(0), &[0]);
    }

    #[test]
    fn document_removal_drops_rows_and_rewrites_postings() {
        let mut content = small_content();
        let remap = IdRemap::new(3, &[0]);
        content.remap_documents(&remap);
        assert_eq!(content.document_count(), 2);
        // Old doc 1 is now 0.
        assert_eq!(content.frequency(0, 1), 5);
        assert_eq!(content.documents_with(3), &[0]);
        assert_eq!(content.documents_with(0), &[] as &[u32]);
    }

    #[test]
    fn feature_removal_rewrites_rows_and_drops_posting_lists() {
        let mut content = small_content();
        let remap = IdRemap::new(4, &[1]);
        content.remap_features(&remap);
        assert_eq!(content.feature_count(), 3);
        // Old feature 3 is now 2.
        assert_eq!(content.frequency(0, 2), 1);
        assert_eq!(content.frequency(1, 2), 2);
        // Doc 1 lost its feature-1 entry.
        assert_eq!(content.row(1).unwrap().len(), 1);
        assert_eq!(content.documents_with(2), &[0, 1]);
    }

    #[test]
    fn out_of_range_ids_are_rejected_by_the_builder() {
        let mut builder = ContentBuilder::new(1, 1);
        assert!(matches!(
            builder.set_frequency(0, 9, 1u32),
            Err(IndexError::UnknownFeature(9))
        ));
        assert!(matches!(
            builder.set_frequency(9, 0, 1u32),
            Err(IndexError::UnknownDocument(9))
        ));
    }
}
