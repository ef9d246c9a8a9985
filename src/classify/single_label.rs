use num::Num;

use crate::index::CompactIndex;
use crate::search::{KnnSearcher, SearchContext};
use crate::similarity::Similarity;

use super::{CategoryScore, ClassificationResult, Classifier, ClassifierRange, KnnCustomizer};

/// Single-winner kNN classifier.
///
/// Every neighbor contributes its similarity to every category it belongs
/// to; the arg-max category wins and reports its total minus the mean total
/// over all categories as a margin. Every other category reports 0.0
/// regardless of neighbor evidence; the zeros carry no information and are
/// not comparable across documents, so only the winner's identity should be
/// consumed by multi-label-sensitive callers.
///
/// Requires the training classification to have a document side
/// (document-indexed or bidirectional layout).
#[derive(Debug)]
pub struct SingleLabelKnnClassifier<'a, N, S> {
    training: &'a CompactIndex<N>,
    customizer: KnnCustomizer,
    searcher: KnnSearcher<S>,
    candidates: Option<Vec<u32>>,
}

impl<'a, N, S> SingleLabelKnnClassifier<'a, N, S>
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

    pub fn customizer(&self) -> &KnnCustomizer {
        &self.customizer
    }

    pub fn customizer_mut(&mut self) -> &mut KnnCustomizer {
        &mut self.customizer
    }
}

impl<N, S> Classifier<N> for SingleLabelKnnClassifier<'_, N, S>
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
        let category_count = self.training.categories().len();
        let neighbors = self.searcher.search(
            index,
            doc,
            self.training,
            self.candidates.as_deref(),
            self.customizer.max_k() as usize,
            ctx,
        );

        let mut totals = vec![0.0_f64; category_count];
        let classification = self.training.classification();
        for neighbor in &neighbors {
            for &cat in classification.categories_of(neighbor.doc) {
                totals[cat as usize] += neighbor.score;
            }
        }

        let winner = totals
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(cat, _)| cat);
        let mean = if category_count == 0 {
            0.0
        } else {
            totals.iter().sum::<f64>() / category_count as f64
        };

        // Winner carries its mean-subtracted margin; everyone else reports
        // a flat zero. Margins above 1 saturate under range normalization.
        let range = ClassifierRange::new(0.0, 1.0, -1.0);
        let scores = (0..category_count)
            .map(|cat| CategoryScore {
                category: cat as u32,
                score: if Some(cat) == winner {
                    totals[cat] - mean
                } else {
                    0.0
                },
                range,
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
