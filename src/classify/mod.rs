pub mod committee;
pub mod config;
pub mod knn;
pub mod single_label;

use num::Num;
use serde::{Deserialize, Serialize};

use crate::index::CompactIndex;
use crate::search::SearchContext;

/// Global neighborhood floor: the searcher always retrieves at least this
/// many neighbors so per-category k prefixes can be taken from one ranked
/// list.
pub const DEFAULT_K: u32 = 30;

/// Valid score interval and decision threshold for one category under one
/// classifier. `border` is the operating point separating "assigned" from
/// "not assigned".
///
/// Field order is the persistence record layout: border, maximum, minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRange {
    pub border: f64,
    pub maximum: f64,
    pub minimum: f64,
}

impl ClassifierRange {
    pub fn new(border: f64, maximum: f64, minimum: f64) -> Self {
        Self {
            border,
            maximum,
            minimum,
        }
    }

    /// Normalize a raw score into [-1, 1] around the border: positive side
    /// scaled by `(maximum - border)`, negative side by `(border - minimum)`,
    /// each independently. A degenerate interval clamps to the full +/-1.
    pub fn normalized_margin(&self, score: f64) -> f64 {
        if score >= self.border {
            let span = self.maximum - self.border;
            if span <= 0.0 {
                1.0
            } else {
                ((score - self.border) / span).clamp(0.0, 1.0)
            }
        } else {
            let span = self.border - self.minimum;
            if span <= 0.0 {
                -1.0
            } else {
                // (score - border) is negative; (minimum - border) is negative.
                (-(score - self.border) / (self.minimum - self.border)).clamp(-1.0, 0.0)
            }
        }
    }
}

/// Scoring semantics of the per-category kNN classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnnPolicy {
    /// Sum of neighbor similarity over positive neighbors; range [0, k],
    /// default border k/2.
    Classic,
    /// Signed similarity sum divided by k; range [-1, 1], default border 0.
    /// Assumes a similarity bounded to [0, 1].
    Galavotti,
}

impl KnnPolicy {
    /// The policy's default decision range for a category with neighborhood
    /// size `k`.
    pub fn default_range(&self, k: u32) -> ClassifierRange {
        match self {
            KnnPolicy::Classic => ClassifierRange::new(k as f64 / 2.0, k as f64, 0.0),
            KnnPolicy::Galavotti => ClassifierRange::new(0.0, 1.0, -1.0),
        }
    }
}

/// Runtime-replaceable kNN configuration: per-category neighborhood sizes,
/// decision ranges, historical efficacy, and the scoring policy.
///
/// Per-category values are sorted `(category, value)` pair lists resolved by
/// binary search; absent categories fall back to the policy defaults. The
/// struct field order is the persistence field order; see
/// [`config`](crate::classify::config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnCustomizer {
    k_values: Vec<(u32, u32)>,
    ranges: Vec<(u32, ClassifierRange)>,
    efficacy: Vec<(u32, f64)>,
    policy: KnnPolicy,
}

impl KnnCustomizer {
    pub fn new(policy: KnnPolicy) -> Self {
        Self {
            k_values: Vec::new(),
            ranges: Vec::new(),
            efficacy: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> KnnPolicy {
        self.policy
    }

    /// Neighborhood size for `cat` ([`DEFAULT_K`] if unset).
    pub fn k(&self, cat: u32) -> u32 {
        lookup(&self.k_values, cat).unwrap_or(DEFAULT_K)
    }

    pub fn set_k(&mut self, cat: u32, k: u32) -> &mut Self {
        upsert(&mut self.k_values, cat, k);
        self
    }

    /// Decision range for `cat`: the stored override, or the policy default
    /// for the category's k.
    pub fn range(&self, cat: u32) -> ClassifierRange {
        lookup(&self.ranges, cat).unwrap_or_else(|| self.policy.default_range(self.k(cat)))
    }

    pub fn set_range(&mut self, cat: u32, range: ClassifierRange) -> &mut Self {
        upsert(&mut self.ranges, cat, range);
        self
    }

    /// Historical effectiveness weight for `cat` (1.0 if unset).
    pub fn efficacy(&self, cat: u32) -> f64 {
        lookup(&self.efficacy, cat).unwrap_or(1.0)
    }

    pub fn set_efficacy(&mut self, cat: u32, efficacy: f64) -> &mut Self {
        upsert(&mut self.efficacy, cat, efficacy);
        self
    }

    /// Neighborhood size the searcher must retrieve so every per-category
    /// prefix fits: the maximum over all configured k values and
    /// [`DEFAULT_K`].
    pub fn max_k(&self) -> u32 {
        self.k_values
            .iter()
            .map(|&(_, k)| k)
            .fold(DEFAULT_K, u32::max)
    }

    pub fn k_values(&self) -> &[(u32, u32)] {
        &self.k_values
    }

    pub fn ranges(&self) -> &[(u32, ClassifierRange)] {
        &self.ranges
    }

    pub fn efficacies(&self) -> &[(u32, f64)] {
        &self.efficacy
    }
}

fn lookup<T: Copy>(pairs: &[(u32, T)], cat: u32) -> Option<T> {
    pairs
        .binary_search_by_key(&cat, |&(c, _)| c)
        .ok()
        .map(|i| pairs[i].1)
}

fn upsert<T>(pairs: &mut Vec<(u32, T)>, cat: u32, value: T) {
    match pairs.binary_search_by_key(&cat, |&(c, _)| c) {
        Ok(i) => pairs[i].1 = value,
        Err(i) => pairs.insert(i, (cat, value)),
    }
}

/// Score of one category for one classified document, with the range the
/// decision is taken against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScore {
    pub category: u32,
    pub score: f64,
    pub range: ClassifierRange,
}

impl CategoryScore {
    pub fn is_assigned(&self) -> bool {
        self.score >= self.range.border
    }
}

/// Per-category scores for one classified document. `scores` holds exactly
/// one entry per category, indexed by category ID.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub document: u32,
    pub scores: Vec<CategoryScore>,
}

impl ClassificationResult {
    pub fn score(&self, cat: u32) -> Option<&CategoryScore> {
        self.scores.get(cat as usize)
    }

    pub fn is_assigned(&self, cat: u32) -> bool {
        self.score(cat).is_some_and(CategoryScore::is_assigned)
    }

    /// The arg-max category (first winner on ties), if any category exists.
    pub fn best_category(&self) -> Option<u32> {
        self.scores
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score).then(b.category.cmp(&a.category)))
            .map(|cs| cs.category)
    }
}

/// The seam committees compose over: anything that can score every category
/// of its training index for a query document.
pub trait Classifier<N>
where
    N: Num + Copy + Into<f64> + Send + Sync,
{
    /// Score every category for `doc` of `index`. `ctx` carries the
    /// same-index flag and optional precomputed matrix for the underlying
    /// neighbor retrieval.
    fn classify(
        &self,
        index: &CompactIndex<N>,
        doc: u32,
        ctx: &SearchContext<'_>,
    ) -> ClassificationResult;

    /// Number of categories this classifier scores.
    fn category_count(&self) -> usize;

    /// Historical effectiveness for `cat`, used as an aggregation weight.
    fn efficacy(&self, cat: u32) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_margin_scales_each_side_independently() {
        let range = ClassifierRange::new(1.0, 3.0, -1.0);
        assert_eq!(range.normalized_margin(3.0), 1.0);
        assert_eq!(range.normalized_margin(2.0), 0.5);
        assert_eq!(range.normalized_margin(1.0), 0.0);
        assert_eq!(range.normalized_margin(0.0), -0.5);
        assert_eq!(range.normalized_margin(-1.0), -1.0);
        // Out-of-range scores clamp instead of exceeding the unit interval.
        assert_eq!(range.normalized_margin(99.0), 1.0);
        assert_eq!(range.normalized_margin(-99.0), -1.0);
    }

    #[test]
    fn degenerate_interval_clamps_to_unit() {
        let range = ClassifierRange::new(0.5, 0.5, 0.5);
        assert_eq!(range.normalized_margin(0.5), 1.0);
        assert_eq!(range.normalized_margin(0.4), -1.0);
    }

    #[test]
    fn customizer_defaults_follow_the_policy() {
        let customizer = KnnCustomizer::new(KnnPolicy::Classic);
        assert_eq!(customizer.k(7), DEFAULT_K);
        let range = customizer.range(7);
        assert_eq!(range.border, DEFAULT_K as f64 / 2.0);
        assert_eq!(range.maximum, DEFAULT_K as f64);
        assert_eq!(range.minimum, 0.0);

        let galavotti = KnnCustomizer::new(KnnPolicy::Galavotti);
        let range = galavotti.range(0);
        assert_eq!(range.border, 0.0);
        assert_eq!(range.maximum, 1.0);
        assert_eq!(range.minimum, -1.0);
    }

    #[test]
    fn max_k_is_the_cap_over_overrides_and_the_floor() {
        let mut customizer = KnnCustomizer::new(KnnPolicy::Classic);
        assert_eq!(customizer.max_k(), DEFAULT_K);
        customizer.set_k(0, 5).set_k(1, 45).set_k(2, 12);
        assert_eq!(customizer.max_k(), 45);
        assert_eq!(customizer.k(0), 5);
        assert_eq!(customizer.k(9), DEFAULT_K);
    }

    #[test]
    fn per_category_pairs_stay_sorted_through_upserts() {
        let mut customizer = KnnCustomizer::new(KnnPolicy::Galavotti);
        customizer.set_efficacy(5, 0.8).set_efficacy(1, 0.2).set_efficacy(3, 0.5);
        customizer.set_efficacy(1, 0.9); // upsert, no duplicate
        let cats: Vec<u32> = customizer.efficacies().iter().map(|&(c, _)| c).collect();
        assert_eq!(cats, vec![1, 3, 5]);
        assert_eq!(customizer.efficacy(1), 0.9);
    }

    #[test]
    fn best_category_is_first_winner_on_ties() {
        let range = ClassifierRange::new(0.0, 1.0, -1.0);
        let result = ClassificationResult {
            document: 0,
            scores: vec![
                CategoryScore { category: 0, score: 0.7, range },
                CategoryScore { category: 1, score: 0.7, range },
                CategoryScore { category: 2, score: 0.1, range },
            ],
        };
        assert_eq!(result.best_category(), Some(0));
    }
}
