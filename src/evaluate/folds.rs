//! k-fold cross-validated threshold optimization.

use num::Num;
use tracing::{debug, info};

use crate::classify::knn::KnnClassifier;
use crate::classify::{ClassifierRange, KnnCustomizer, KnnPolicy};
use crate::error::OptimizeError;
use crate::index::CompactIndex;
use crate::search::{KnnSearcher, SearchContext};
use crate::similarity::{Similarity, SimilarityMatrix};

use super::optimize::{OptimalConfiguration, ThresholdOptimizer};

/// Splits an index into round-robin folds and runs a grid search on each,
/// then averages the per-fold winners into one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFoldValidator {
    folds: usize,
}

impl KFoldValidator {
    /// Panics if `folds < 2`; a single fold has no held-out documents.
    pub fn new(folds: usize) -> Self {
        assert!(folds >= 2, "cross-validation needs at least two folds");
        Self { folds }
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Round-robin (training, validation) splits: document `d` is held out
    /// by fold `d % folds`. Every document is validated exactly once.
    pub fn split(&self, doc_count: usize) -> Vec<(Vec<u32>, Vec<u32>)> {
        (0..self.folds)
            .map(|fold| {
                let mut train = Vec::new();
                let mut validation = Vec::new();
                for doc in 0..doc_count as u32 {
                    if doc as usize % self.folds == fold {
                        validation.push(doc);
                    } else {
                        train.push(doc);
                    }
                }
                (train, validation)
            })
            .collect()
    }

    /// Run `optimizer` on every fold of `index` and average the winners.
    ///
    /// Similarities are precomputed once into a matrix shared by every fold;
    /// each fold restricts the classifier's candidate pool to its training
    /// documents instead of copying the index.
    pub fn optimize<N, S>(
        &self,
        index: &CompactIndex<N>,
        similarity: S,
        policy: KnnPolicy,
        optimizer: &ThresholdOptimizer,
    ) -> Result<KnnCustomizer, OptimizeError>
    where
        N: Num + Copy + Into<f64> + Send + Sync,
        S: Similarity<N>,
    {
        let matrix = SimilarityMatrix::precompute(index, &similarity);
        let ctx = SearchContext::with_matrix(&matrix);
        let gold = index.classification();

        let mut configurations = Vec::with_capacity(self.folds);
        for (fold, (train, validation)) in self.split(index.documents().len()).into_iter().enumerate() {
            let mut classifier = KnnClassifier::with_candidates(
                index,
                KnnCustomizer::new(policy),
                KnnSearcher::new(&similarity),
                train,
            );
            let optimal = optimizer.optimize(&mut classifier, &validation, gold, &ctx)?;
            debug!(fold, effectiveness = ?optimal.effectiveness, "fold optimized");
            configurations.push(optimal);
        }

        let customizer = assign_best_configuration(policy, &configurations);
        info!(folds = self.folds, "cross-validation finished");
        Ok(customizer)
    }
}

/// Average the per-fold winners into one customizer: mean k (floored, at
/// least 1), mean decision border inside the policy default range for that
/// k, mean effectiveness as the category's efficacy.
pub fn assign_best_configuration(
    policy: KnnPolicy,
    configurations: &[OptimalConfiguration],
) -> KnnCustomizer {
    let mut customizer = KnnCustomizer::new(policy);
    let Some(first) = configurations.first() else {
        return customizer;
    };
    let folds = configurations.len() as f64;

    for cat in 0..first.effectiveness.len() as u32 {
        let mean_k = configurations
            .iter()
            .map(|c| c.customizer.k(cat) as f64)
            .sum::<f64>()
            / folds;
        let mean_border = configurations
            .iter()
            .map(|c| c.customizer.range(cat).border)
            .sum::<f64>()
            / folds;
        let mean_efficacy = configurations
            .iter()
            .map(|c| c.customizer.efficacy(cat))
            .sum::<f64>()
            / folds;

        let k = (mean_k.floor() as u32).max(1);
        let default = policy.default_range(k);
        customizer
            .set_k(cat, k)
            .set_range(cat, ClassifierRange::new(mean_border, default.maximum, default.minimum))
            .set_efficacy(cat, mean_efficacy);
    }
    customizer
}
