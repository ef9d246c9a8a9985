/// This crate is a kNN Text Categorization Engine over a compact columnar index.
pub mod classify;
pub mod error;
pub mod evaluate;
pub mod index;
pub mod search;
pub mod similarity;

/// Compact Index
/// The top-level storage struct of this crate, holding a document collection
/// ready for similarity search and categorization.
///
/// Internally, it holds:
/// - A document name store with dense integer IDs
/// - A category name store with parent links (hierarchies allowed)
/// - A feature name store
/// - The document-category classification relation
/// - The document-feature content relation (sparse frequency rows)
///
/// `CompactIndex<N>` has the following generic parameter:
/// - `N`: Frequency value type (e.g., u32, f32, f64)
///
/// IDs stay dense: removing documents, categories, or features renumbers the
/// survivors and rewrites every relation in one pass, so an ID is always a
/// valid position into the columnar storage.
pub use index::CompactIndex;

/// Similarity Trait and Implementations
/// `Similarity` defines pairwise document similarity over the sparse content
/// rows; `EuclideanSimilarity` and `CosineSimilarity` are provided, and
/// `CachedSimilarity` memoizes any of them behind a concurrent pair cache.
/// `SimilarityMatrix` precomputes the full half-matrix in parallel for
/// repeated same-index retrieval (cross-validation sweeps).
pub use similarity::{
    CachedSimilarity, CosineSimilarity, EuclideanSimilarity, Similarity, SimilarityMatrix,
};

/// kNN Searcher
/// Bounded top-N retrieval of the documents most similar to a query
/// document, in parallel over the candidate pool. `SearchContext` carries the
/// per-call retrieval configuration (same-index flag, optional precomputed
/// matrix); `SimilarDocument` is one ranked hit.
pub use search::{KnnSearcher, SearchContext, SimilarDocument};

/// kNN Classifiers
/// `KnnClassifier` scores every category of its training index for a query
/// document from the query's ranked neighbor list, under a classic
/// (positive-evidence) or Galavotti (signed, normalized) scoring policy.
/// `SingleLabelKnnClassifier` picks one winning category per document.
/// `KnnCustomizer` holds the tunable per-category parameters (k, decision
/// range, efficacy) and serializes to CBOR for reuse across runs.
pub use classify::knn::KnnClassifier;
pub use classify::single_label::SingleLabelKnnClassifier;
pub use classify::{
    CategoryScore, ClassificationResult, Classifier, ClassifierRange, KnnCustomizer, KnnPolicy,
};

/// Classifier Committees
/// `Committee` combines several classifiers' per-category scores under a
/// pluggable scoring policy; `SingleLabelCommittee` resolves single-label
/// votes weighted by each member's agreement with the query's neighborhood.
pub use classify::committee::{
    Committee, CommitteeScoring, CostMatrix, SingleLabelCommittee, SingleLabelVoting,
};

/// Evaluation and Tuning
/// `ContingencyTable` tallies predictions against a gold classification and
/// `Measure` turns the cells into effectiveness values. `ThresholdOptimizer`
/// grid-searches (k, border) per category and `KFoldValidator` runs it under
/// k-fold cross-validation, averaging the per-fold winners.
pub use evaluate::{
    ContingencyTable, GridSettings, KFoldValidator, Measure, OptimalConfiguration,
    ThresholdOptimizer,
};
