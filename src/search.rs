use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use num::Num;
use rayon::prelude::*;
use static_assertions::const_assert;

use crate::index::CompactIndex;
use crate::similarity::{Similarity, SimilarityMatrix};

/// One retrieved neighbor: `(document ID, similarity score)`.
/// Total order by score then document ID: the tie-break both the bounded
/// working set and the final ranking rely on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarDocument {
    pub doc: u32,
    pub score: f64,
}

const_assert!(core::mem::size_of::<SimilarDocument>() == 16);

impl Eq for SimilarDocument {}

impl PartialOrd for SimilarDocument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimilarDocument {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

/// Per-call search configuration, passed explicitly instead of living as
/// mutable state on a shared searcher (nested fold/cross-validation calls
/// would otherwise have to save and restore it).
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchContext<'a> {
    /// The query pool and the candidate pool are the same physical index.
    /// Excludes the query document from the candidates and makes the
    /// precomputed-matrix path legal.
    pub same_index: bool,
    /// Precomputed similarity matrix over the candidate index. Only
    /// consulted when `same_index` is set; its keys are candidate-index
    /// document IDs, which only coincide with query IDs in that case.
    pub matrix: Option<&'a SimilarityMatrix>,
}

impl<'a> SearchContext<'a> {
    pub fn same_index() -> Self {
        Self {
            same_index: true,
            matrix: None,
        }
    }

    pub fn with_matrix(matrix: &'a SimilarityMatrix) -> Self {
        Self {
            same_index: true,
            matrix: Some(matrix),
        }
    }
}

/// Top-N nearest-neighbor retrieval under a pluggable similarity function.
#[derive(Debug, Clone)]
pub struct KnnSearcher<S> {
    similarity: S,
}

impl<S> KnnSearcher<S> {
    pub fn new(similarity: S) -> Self {
        Self { similarity }
    }

    pub fn similarity(&self) -> &S {
        &self.similarity
    }

    /// Retrieve the `top_n` most similar candidate documents for
    /// `query_doc`, descending by score, length `min(top_n, pool size)`.
    ///
    /// `candidates` restricts the pool to a subset of `candidate_index`'s
    /// documents (fold training splits reuse one physical index this way);
    /// `None` means the whole index. Scores come from the precomputed matrix
    /// when the context allows it, otherwise from the similarity function.
    ///
    /// Candidates are scored in parallel and fed through bounded min-heaps of
    /// capacity `top_n`, a running top-N selection rather than a full sort.
    pub fn search<N>(
        &self,
        query_index: &CompactIndex<N>,
        query_doc: u32,
        candidate_index: &CompactIndex<N>,
        candidates: Option<&[u32]>,
        top_n: usize,
        ctx: &SearchContext<'_>,
    ) -> Vec<SimilarDocument>
    where
        N: Num + Copy + Into<f64> + Send + Sync,
        S: Similarity<N>,
    {
        if top_n == 0 {
            return Vec::new();
        }
        let keep = |c: u32| !(ctx.same_index && c == query_doc);
        let pool: Vec<u32> = match candidates {
            Some(list) => list.iter().copied().filter(|&c| keep(c)).collect(),
            None => (0..candidate_index.documents().len() as u32)
                .filter(|&c| keep(c))
                .collect(),
        };

        let matrix = if ctx.same_index { ctx.matrix } else { None };
        let heap = pool
            .par_iter()
            .map(|&cand| {
                let score = match matrix {
                    Some(m) => m.get(query_doc, cand),
                    None => self
                        .similarity
                        .compute(query_doc, query_index, cand, candidate_index),
                };
                SimilarDocument { doc: cand, score }
            })
            .fold(BinaryHeap::new, |mut heap, entry| {
                push_bounded(&mut heap, entry, top_n);
                heap
            })
            .reduce(BinaryHeap::new, |mut merged, heap| {
                for Reverse(entry) in heap {
                    push_bounded(&mut merged, entry, top_n);
                }
                merged
            });

        let mut out: Vec<SimilarDocument> = heap.into_iter().map(|Reverse(e)| e).collect();
        out.sort_unstable_by(|a, b| b.cmp(a));
        out
    }
}

/// Insert into a min-heap working set of capacity `cap`, evicting the
/// current minimum once full.
fn push_bounded(heap: &mut BinaryHeap<Reverse<SimilarDocument>>, entry: SimilarDocument, cap: usize) {
    if heap.len() < cap {
        heap.push(Reverse(entry));
    } else if let Some(min) = heap.peek() {
        if entry > min.0 {
            heap.pop();
            heap.push(Reverse(entry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::content::ContentBuilder;
    use crate::similarity::EuclideanSimilarity;

    /// Similarity driven by a fixed score table, for deterministic ranking
    /// tests.
    struct TableSimilarity {
        scores: Vec<Vec<f64>>,
    }

    impl Similarity<u32> for TableSimilarity {
        fn compute(
            &self,
            a: u32,
            _index_a: &CompactIndex<u32>,
            b: u32,
            _index_b: &CompactIndex<u32>,
        ) -> f64 {
            self.scores[a as usize][b as usize]
        }
    }

    fn empty_index(docs: usize) -> CompactIndex<u32> {
        let mut index = CompactIndex::new();
        for d in 0..docs {
            index
                .documents_mut()
                .add_document(&format!("d{d}"))
                .unwrap();
        }
        index.set_content(ContentBuilder::new(docs, 0).build(false));
        index
    }

    #[test]
    fn results_are_descending_and_bounded() {
        let index = empty_index(5);
        let searcher = KnnSearcher::new(TableSimilarity {
            scores: vec![vec![0.0, 0.3, 0.9, 0.1, 0.6]; 5],
        });
        let ctx = SearchContext::same_index();
        let hits = searcher.search(&index, 0, &index, None, 3, &ctx);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].doc, 2);
        assert_eq!(hits[1].doc, 4);
        assert_eq!(hits[2].doc, 1);
        assert!(hits.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn query_document_is_excluded_only_for_same_index_pools() {
        let index = empty_index(3);
        let searcher = KnnSearcher::new(TableSimilarity {
            scores: vec![vec![1.0, 0.5, 0.2]; 3],
        });
        let same = searcher.search(&index, 0, &index, None, 10, &SearchContext::same_index());
        assert!(same.iter().all(|h| h.doc != 0));
        assert_eq!(same.len(), 2);

        let cross = searcher.search(&index, 0, &index, None, 10, &SearchContext::default());
        assert_eq!(cross.len(), 3);
        assert_eq!(cross[0].doc, 0);
    }

    #[test]
    fn ties_break_on_document_id() {
        let index = empty_index(4);
        let searcher = KnnSearcher::new(TableSimilarity {
            scores: vec![vec![0.5; 4]; 4],
        });
        let hits = searcher.search(&index, 3, &index, None, 2, &SearchContext::same_index());
        // All scores equal: descending order tie-breaks on higher doc first.
        assert_eq!(hits[0].doc, 2);
        assert_eq!(hits[1].doc, 1);
    }

    #[test]
    fn search_is_idempotent_without_index_mutation() {
        let mut index = empty_index(6);
        let mut builder = ContentBuilder::new(6, 4);
        for d in 0..6u32 {
            builder.set_frequency(d, d % 4, d + 1).unwrap();
            builder.set_frequency(d, (d + 1) % 4, 2).unwrap();
        }
        for f in 0..4 {
            index.features_mut().add_feature(&format!("f{f}")).unwrap();
        }
        index.set_content(builder.build(false));

        let searcher = KnnSearcher::new(EuclideanSimilarity::new());
        let ctx = SearchContext::same_index();
        let first = searcher.search(&index, 2, &index, None, 4, &ctx);
        let second = searcher.search(&index, 2, &index, None, 4, &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn candidate_subset_restricts_the_pool() {
        let index = empty_index(5);
        let searcher = KnnSearcher::new(TableSimilarity {
            scores: vec![vec![0.0, 0.9, 0.8, 0.7, 0.6]; 5],
        });
        let hits = searcher.search(
            &index,
            0,
            &index,
            Some(&[3, 4]),
            10,
            &SearchContext::same_index(),
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc, 3);
        assert_eq!(hits[1].doc, 4);
    }

    #[test]
    fn matrix_path_matches_direct_computation() {
        let mut index = empty_index(4);
        let mut builder = ContentBuilder::new(4, 3);
        for f in 0..3 {
            index.features_mut().add_feature(&format!("f{f}")).unwrap();
        }
        builder.set_frequency(0, 0, 2u32).unwrap();
        builder.set_frequency(1, 0, 2).unwrap();
        builder.set_frequency(2, 1, 1).unwrap();
        builder.set_frequency(3, 2, 9).unwrap();
        index.set_content(builder.build(false));

        let sim = EuclideanSimilarity::new();
        let matrix = SimilarityMatrix::precompute(&index, &sim);
        let searcher = KnnSearcher::new(sim);
        let direct = searcher.search(&index, 0, &index, None, 3, &SearchContext::same_index());
        let cached = searcher.search(&index, 0, &index, None, 3, &SearchContext::with_matrix(&matrix));
        assert_eq!(direct, cached);
    }
}
