use num::Num;

use crate::index::CompactIndex;
use crate::search::{KnnSearcher, SearchContext, SimilarDocument};
use crate::similarity::Similarity;

use super::{CategoryScore, ClassificationResult, Classifier, KnnCustomizer, KnnPolicy};

/// Per-category kNN classifier over a fixed training index.
///
/// Binds the training index for its lifetime; the customizer is
/// runtime-replaceable so an optimizer can sweep configurations against one
/// classifier instance. Retrieval happens once per query at
/// [`KnnCustomizer::max_k`]; each category scores a `k(cat)` prefix of that
/// single descending ranked list.
#[derive(Debug)]
pub struct KnnClassifier<'a, N, S> {
    training: &'a CompactIndex<N>,
    customizer: KnnCustomizer,
    searcher: KnnSearcher<S>,
    /// Restriction of the training pool to a document subset (fold splits
    /// reusing one physical index). `None` means every training document.
    candidates: Option<Vec<u32>>,
}

impl<'a, N, S> KnnClassifier<'a, N, S>
where
    N: Num + Copy + Into<f64> + Send + Sync,
    S: Similarity<N>,
{
    pub fn new(training: &'a CompactIndex<N>, customizer: KnnCustomizer, searcher: KnnSearcher<S>) -> Self {
        Self {
            training,
            customizer,
            searcher,
            candidates: None,
        }
    }

    pub fn with_candidates(
        training: &'a CompactIndex<N>,
        customizer: KnnCustomizer,
        searcher: KnnSearcher<S>,
        candidates: Vec<u32>,
    ) -> Self {
        Self {
            training,
            customizer,
            searcher,
            candidates: Some(candidates),
        }
    }

    pub fn training(&self) -> &'a CompactIndex<N> {
        self.training
    }

    pub fn customizer(&self) -> &KnnCustomizer {
        &self.customizer
    }

    pub fn customizer_mut(&mut self) -> &mut KnnCustomizer {
        &mut self.customizer
    }

    pub fn set_customizer(&mut self, customizer: KnnCustomizer) {
        self.customizer = customizer;
    }

    /// The query's ranked neighbor list, retrieved once at `max_k`.
    pub fn neighbors(
        &self,
        index: &CompactIndex<N>,
        doc: u32,
        ctx: &SearchContext<'_>,
    ) -> Vec<SimilarDocument> {
        self.searcher.search(
            index,
            doc,
            self.training,
            self.candidates.as_deref(),
            self.customizer.max_k() as usize,
            ctx,
        )
    }

    fn score_category(&self, neighbors: &[SimilarDocument], cat: u32) -> f64 {
        let k = self.customizer.k(cat) as usize;
        // k = 0 means no neighborhood at all; score without evidence is 0,
        // never 0/0.
        if k == 0 {
            return 0.0;
        }
        let prefix = &neighbors[..k.min(neighbors.len())];
        let classification = self.training.classification();
        match self.customizer.policy() {
            KnnPolicy::Classic => prefix
                .iter()
                .filter(|n| classification.has(n.doc, cat))
                .map(|n| n.score)
                .sum(),
            KnnPolicy::Galavotti => {
                let signed: f64 = prefix
                    .iter()
                    .map(|n| {
                        if classification.has(n.doc, cat) {
                            n.score
                        } else {
                            -n.score
                        }
                    })
                    .sum();
                signed / k as f64
            }
        }
    }
}

impl<N, S> Classifier<N> for KnnClassifier<'_, N, S>
where
    N: Num + Copy + Into<f64> + Send + Sync,
    S: Similarity<N>,
{
    fn classify(
        &self,
        index: &CompactIndex<N>,
        doc: u32,
        ctx: &SearchContext<'_>,
    ) -> ClassificationResult {
        let neighbors = self.neighbors(index, doc, ctx);
        let scores = (0..self.training.categories().len() as u32)
            .map(|cat| CategoryScore {
                category: cat,
                score: self.score_category(&neighbors, cat),
                range: self.customizer.range(cat),
            })
            .collect();
        ClassificationResult {
            document: doc,
            scores,
        }
    }

    fn category_count(&self) -> usize {
        self.training.categories().len()
    }

    fn efficacy(&self, cat: u32) -> f64 {
        self.customizer.efficacy(cat)
    }
}
