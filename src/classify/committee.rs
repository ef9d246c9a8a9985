use num::Num;

use crate::index::CompactIndex;
use crate::search::{KnnSearcher, SearchContext};
use crate::similarity::Similarity;

use super::{CategoryScore, ClassificationResult, Classifier, ClassifierRange};

/// External per-(category, document) weighting injected into the
/// [`CommitteeScoring::MatrixCost`] policy, e.g. from a separate
/// weight-learning pass. Missing cells weigh 1.0.
#[derive(Debug, Clone, Default)]
pub struct CostMatrix {
    weights: Vec<Vec<f64>>,
}

impl CostMatrix {
    pub fn new(weights: Vec<Vec<f64>>) -> Self {
        Self { weights }
    }

    pub fn get(&self, cat: u32, doc: u32) -> f64 {
        self.weights
            .get(cat as usize)
            .and_then(|row| row.get(doc as usize))
            .copied()
            .unwrap_or(1.0)
    }
}

/// How a committee folds its members' per-category scores into one.
#[derive(Debug, Clone)]
pub enum CommitteeScoring {
    /// Sum of each member's normalized margin per category.
    EachScore,
    /// Normalized margins weighted by each member's per-category efficacy
    /// and divided by the efficacy sum (a proper weighted average).
    WeightedScore,
    /// Raw member scores multiplied by an external per-(category, document)
    /// cost weight.
    MatrixCost(CostMatrix),
}

/// Multi-label committee: an ordered list of base classifiers sharing a
/// training index view, combined by a pluggable scoring policy.
pub struct Committee<'a, N> {
    members: Vec<Box<dyn Classifier<N> + 'a>>,
    scoring: CommitteeScoring,
}

impl<'a, N> Committee<'a, N>
where
    N: Num + Copy + Into<f64> + Send + Sync,
{
    /// Panics if `members` is empty; a committee without members has no
    /// defined decision.
    pub fn new(members: Vec<Box<dyn Classifier<N> + 'a>>, scoring: CommitteeScoring) -> Self {
        assert!(!members.is_empty(), "committee needs at least one member");
        Self { members, scoring }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Dispatch to every member and aggregate under the scoring policy.
    pub fn classify(
        &self,
        index: &CompactIndex<N>,
        doc: u32,
        ctx: &SearchContext<'_>,
    ) -> ClassificationResult {
        let results: Vec<ClassificationResult> = self
            .members
            .iter()
            .map(|m| m.classify(index, doc, ctx))
            .collect();
        let category_count = self.members[0].category_count();
        let member_count = self.members.len() as f64;

        let scores = (0..category_count as u32)
            .map(|cat| {
                let (score, range) = match &self.scoring {
                    CommitteeScoring::EachScore => {
                        let sum: f64 = results
                            .iter()
                            .filter_map(|r| r.score(cat))
                            .map(|cs| cs.range.normalized_margin(cs.score))
                            .sum();
                        (sum, ClassifierRange::new(0.0, member_count, -member_count))
                    }
                    CommitteeScoring::WeightedScore => {
                        let mut weighted = 0.0;
                        let mut total_efficacy = 0.0;
                        for (member, result) in self.members.iter().zip(&results) {
                            if let Some(cs) = result.score(cat) {
                                let efficacy = member.efficacy(cat);
                                weighted += efficacy * cs.range.normalized_margin(cs.score);
                                total_efficacy += efficacy;
                            }
                        }
                        let score = if total_efficacy > 0.0 {
                            weighted / total_efficacy
                        } else {
                            0.0
                        };
                        (score, ClassifierRange::new(0.0, 1.0, -1.0))
                    }
                    CommitteeScoring::MatrixCost(cost) => {
                        let weight = cost.get(cat, doc);
                        let sum: f64 = results
                            .iter()
                            .filter_map(|r| r.score(cat))
                            .map(|cs| cs.score * weight)
                            .sum();
                        (sum, ClassifierRange::new(0.0, member_count, -member_count))
                    }
                };
                CategoryScore {
                    category: cat,
                    score,
                    range,
                }
            })
            .collect();
        ClassificationResult {
            document: doc,
            scores,
        }
    }
}

/// How a single-label committee resolves its members' votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleLabelVoting {
    /// Adopt the full result of the member with the highest agreement
    /// weight.
    BestMember,
    /// Accumulate each member's agreement weight on the category it predicts
    /// for the query and arg-max the totals.
    WeightedVote,
}

/// Single-label committee with neighborhood-weighted agreement.
///
/// Each member's vote is weighted by how well it predicts the true labels of
/// the query's most similar training documents: for every top-N neighbor the
/// member re-classifies it against the training set and earns
/// `sim(query, neighbor)` when its prediction matches the neighbor's primary
/// label, minus that when it doesn't, optionally scaled by the member's own
/// confidence in the prediction.
pub struct SingleLabelCommittee<'a, N, S> {
    training: &'a CompactIndex<N>,
    members: Vec<Box<dyn Classifier<N> + 'a>>,
    searcher: KnnSearcher<S>,
    voting: SingleLabelVoting,
    confidence_weighted: bool,
    top_n: usize,
}

impl<'a, N, S> SingleLabelCommittee<'a, N, S>
where
    N: Num + Copy + Into<f64> + Send + Sync,
    S: Similarity<N>,
{
    pub fn new(
        training: &'a CompactIndex<N>,
        members: Vec<Box<dyn Classifier<N> + 'a>>,
        searcher: KnnSearcher<S>,
        voting: SingleLabelVoting,
        top_n: usize,
    ) -> Self {
        assert!(!members.is_empty(), "committee needs at least one member");
        Self {
            training,
            members,
            searcher,
            voting,
            confidence_weighted: false,
            top_n,
        }
    }

    pub fn confidence_weighted(mut self, enabled: bool) -> Self {
        self.confidence_weighted = enabled;
        self
    }

    /// Agreement weight of every member for this query.
    fn member_weights(
        &self,
        index: &CompactIndex<N>,
        doc: u32,
        ctx: &SearchContext<'_>,
    ) -> Vec<f64> {
        let neighbors =
            self.searcher
                .search(index, doc, self.training, None, self.top_n, ctx);
        // Neighbors live in the training index, so re-classifying them is a
        // same-index operation and may use the caller's matrix.
        let inner_ctx = SearchContext {
            same_index: true,
            matrix: ctx.matrix,
        };
        let classification = self.training.classification();

        self.members
            .iter()
            .map(|member| {
                let mut weight = 0.0;
                for neighbor in &neighbors {
                    let result = member.classify(self.training, neighbor.doc, &inner_ctx);
                    let predicted = result.best_category();
                    let truth = classification.primary_category_of(neighbor.doc);
                    let agree = if predicted.is_some() && predicted == truth {
                        1.0
                    } else {
                        -1.0
                    };
                    let confidence = if self.confidence_weighted {
                        predicted
                            .and_then(|c| result.score(c))
                            .map(|cs| cs.range.normalized_margin(cs.score).abs())
                            .unwrap_or(0.0)
                    } else {
                        1.0
                    };
                    weight += neighbor.score * agree * confidence;
                }
                weight
            })
            .collect()
    }

    pub fn classify(
        &self,
        index: &CompactIndex<N>,
        doc: u32,
        ctx: &SearchContext<'_>,
    ) -> ClassificationResult {
        let weights = self.member_weights(index, doc, ctx);
        match self.voting {
            SingleLabelVoting::BestMember => {
                let best = weights
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.members[best].classify(index, doc, ctx)
            }
            SingleLabelVoting::WeightedVote => {
                let category_count = self.members[0].category_count();
                let mut votes = vec![0.0_f64; category_count];
                for (member, &weight) in self.members.iter().zip(&weights) {
                    if let Some(predicted) = member.classify(index, doc, ctx).best_category() {
                        votes[predicted as usize] += weight;
                    }
                }
                let span = weights.iter().map(|w| w.abs()).sum::<f64>().max(1.0);
                let range = ClassifierRange::new(0.0, span, -span);
                let scores = votes
                    .into_iter()
                    .enumerate()
                    .map(|(cat, score)| CategoryScore {
                        category: cat as u32,
                        score,
                        range,
                    })
                    .collect();
                ClassificationResult {
                    document: doc,
                    scores,
                }
            }
        }
    }
}
