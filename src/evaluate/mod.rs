//! Effectiveness measurement and parameter tuning: contingency tables over a
//! gold classification, the effectiveness measures computed from them, a
//! (k, border) grid search, and k-fold cross-validation on top of it.

pub mod contingency;
pub mod folds;
pub mod optimize;

pub use contingency::{ContingencyCells, ContingencyTable, Measure};
pub use folds::{assign_best_configuration, KFoldValidator};
pub use optimize::{GridSettings, OptimalConfiguration, ThresholdOptimizer};
