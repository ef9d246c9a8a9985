//! Grid search over neighborhood sizes and decision borders.

use num::Num;
use tracing::debug;

use crate::classify::knn::KnnClassifier;
use crate::classify::{
    ClassificationResult, Classifier, ClassifierRange, KnnCustomizer,
};
use crate::error::OptimizeError;
use crate::index::classification::ClassificationRelation;
use crate::search::SearchContext;
use crate::similarity::Similarity;

use super::contingency::{ContingencyTable, Measure};

/// The (k, border) grid a [`ThresholdOptimizer`] sweeps. Borders are raw
/// decision scores, so their useful span depends on the classifier's scoring
/// policy (roughly `[0, k]` for the classic policy, `[-1, 1]` for the
/// normalized one).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSettings {
    pub min_k: u32,
    pub max_k: u32,
    pub step_k: u32,
    pub min_border: f64,
    pub max_border: f64,
    pub step_border: f64,
}

impl GridSettings {
    fn k_values(&self) -> Vec<u32> {
        if self.step_k == 0 || self.min_k == 0 || self.min_k > self.max_k {
            return Vec::new();
        }
        (self.min_k..=self.max_k).step_by(self.step_k as usize).collect()
    }

    fn borders(&self) -> Vec<f64> {
        if self.step_border <= 0.0 || self.min_border > self.max_border {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut b = self.min_border;
        // Half-step slack so the maximum survives accumulation error.
        while b <= self.max_border + self.step_border * 0.5 {
            out.push(b);
            b += self.step_border;
        }
        out
    }
}

/// The per-category winner of a grid search, ready to classify with.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalConfiguration {
    pub customizer: KnnCustomizer,
    /// Best validation measure value per category, in category-ID order.
    pub effectiveness: Vec<f64>,
}

/// Exhaustive sweep of a (k, border) grid against a validation document set,
/// keeping the strictly best configuration per category.
///
/// Retrieval is the expensive part, so each k classifies the validation set
/// once and every border of the row is scored against those cached results.
#[derive(Debug, Clone)]
pub struct ThresholdOptimizer {
    grid: GridSettings,
    measure: Measure,
}

impl ThresholdOptimizer {
    pub fn new(grid: GridSettings, measure: Measure) -> Self {
        Self { grid, measure }
    }

    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// Sweep the grid and install the winning configuration on `classifier`.
    ///
    /// `validation` documents are classified against the classifier's
    /// training pool and judged against `gold`.
    pub fn optimize<N, S>(
        &self,
        classifier: &mut KnnClassifier<'_, N, S>,
        validation: &[u32],
        gold: &ClassificationRelation,
        ctx: &SearchContext<'_>,
    ) -> Result<OptimalConfiguration, OptimizeError>
    where
        N: Num + Copy + Into<f64> + Send + Sync,
        S: Similarity<N>,
    {
        let k_values = self.grid.k_values();
        let borders = self.grid.borders();
        if k_values.is_empty() || borders.is_empty() {
            return Err(OptimizeError::EmptyGrid);
        }
        if validation.is_empty() {
            return Err(OptimizeError::EmptyValidation);
        }

        let category_count = classifier.category_count();
        let policy = classifier.customizer().policy();
        let mut best = vec![(self.measure.worst(), k_values[0], borders[0]); category_count];

        for &k in &k_values {
            for cat in 0..category_count as u32 {
                classifier.customizer_mut().set_k(cat, k);
            }
            let results: Vec<ClassificationResult> = validation
                .iter()
                .map(|&doc| classifier.classify(classifier.training(), doc, ctx))
                .collect();

            for &border in &borders {
                let table = self.tally(&results, gold, category_count, policy.default_range(k), border);
                for (cat, slot) in best.iter_mut().enumerate() {
                    let value = self.measure.evaluate(&table, cat as u32);
                    if self.measure.better(value, slot.0) {
                        *slot = (value, k, border);
                    }
                }
                debug!(
                    k,
                    border,
                    micro = self.measure.evaluate_micro(&table),
                    "grid row evaluated"
                );
            }
        }

        let mut customizer = KnnCustomizer::new(policy);
        let mut effectiveness = Vec::with_capacity(category_count);
        for (cat, &(value, k, border)) in best.iter().enumerate() {
            let cat = cat as u32;
            let default = policy.default_range(k);
            customizer
                .set_k(cat, k)
                .set_range(cat, ClassifierRange::new(border, default.maximum, default.minimum))
                .set_efficacy(cat, value);
            effectiveness.push(value);
        }
        classifier.set_customizer(customizer.clone());
        Ok(OptimalConfiguration {
            customizer,
            effectiveness,
        })
    }

    fn tally(
        &self,
        results: &[ClassificationResult],
        gold: &ClassificationRelation,
        category_count: usize,
        default_range: ClassifierRange,
        border: f64,
    ) -> ContingencyTable {
        let candidate = ClassifierRange::new(border, default_range.maximum, default_range.minimum);
        let mut table = ContingencyTable::new(category_count);
        for result in results {
            for cat in 0..category_count as u32 {
                let Some(cs) = result.score(cat) else { continue };
                let weight = match self.measure {
                    Measure::ConfidenceWeightedF1 => candidate.normalized_margin(cs.score).abs(),
                    _ => 1.0,
                };
                table.record(cat, cs.score >= border, gold.has(result.document, cat), weight);
            }
        }
        table
    }
}
