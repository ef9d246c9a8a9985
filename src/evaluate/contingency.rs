//! Per-category contingency accounting for classifier evaluation.

use crate::index::classification::ClassificationRelation;

/// Per-category 2x2 confusion cells. Cells are `f64` so observations can
/// carry fractional weights (confidence-weighted evaluation records a
/// document's margin magnitude instead of a flat 1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContingencyCells {
    pub true_positive: f64,
    pub false_positive: f64,
    pub false_negative: f64,
    pub true_negative: f64,
}

impl ContingencyCells {
    fn total(&self) -> f64 {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }
}

/// One [`ContingencyCells`] per category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContingencyTable {
    cells: Vec<ContingencyCells>,
}

impl ContingencyTable {
    pub fn new(category_count: usize) -> Self {
        Self {
            cells: vec![ContingencyCells::default(); category_count],
        }
    }

    pub fn category_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self, cat: u32) -> ContingencyCells {
        self.cells
            .get(cat as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Record one (prediction, gold) observation for `cat` with the given
    /// weight. Out-of-range categories are ignored.
    pub fn record(&mut self, cat: u32, predicted: bool, gold: bool, weight: f64) {
        let Some(cells) = self.cells.get_mut(cat as usize) else {
            return;
        };
        match (predicted, gold) {
            (true, true) => cells.true_positive += weight,
            (true, false) => cells.false_positive += weight,
            (false, true) => cells.false_negative += weight,
            (false, false) => cells.true_negative += weight,
        }
    }

    /// Tally predicted memberships against a gold relation for the listed
    /// documents, every observation weighing 1.
    pub fn from_relations(
        category_count: usize,
        documents: &[u32],
        predicted: impl Fn(u32, u32) -> bool,
        gold: &ClassificationRelation,
    ) -> Self {
        let mut table = Self::new(category_count);
        for &doc in documents {
            for cat in 0..category_count as u32 {
                table.record(cat, predicted(doc, cat), gold.has(doc, cat), 1.0);
            }
        }
        table
    }

    /// Cells summed over every category, for micro-averaged measures.
    pub fn micro(&self) -> ContingencyCells {
        let mut sum = ContingencyCells::default();
        for cells in &self.cells {
            sum.true_positive += cells.true_positive;
            sum.false_positive += cells.false_positive;
            sum.false_negative += cells.false_negative;
            sum.true_negative += cells.true_negative;
        }
        sum
    }
}

/// Effectiveness measure computed from contingency cells. Empty denominators
/// evaluate to 0.0 rather than NaN so grid comparison stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Accuracy,
    Error,
    F1,
    Precision,
    Recall,
    /// F1 over margin-weighted observations. The caller is responsible for
    /// recording weighted cells; the arithmetic is plain F1.
    ConfidenceWeightedF1,
}

impl Measure {
    pub fn evaluate_cells(&self, cells: ContingencyCells) -> f64 {
        let tp = cells.true_positive;
        let fp = cells.false_positive;
        let fn_ = cells.false_negative;
        let tn = cells.true_negative;
        match self {
            Measure::Accuracy => ratio(tp + tn, cells.total()),
            Measure::Error => ratio(fp + fn_, cells.total()),
            Measure::Precision => ratio(tp, tp + fp),
            Measure::Recall => ratio(tp, tp + fn_),
            Measure::F1 | Measure::ConfidenceWeightedF1 => ratio(2.0 * tp, 2.0 * tp + fp + fn_),
        }
    }

    pub fn evaluate(&self, table: &ContingencyTable, cat: u32) -> f64 {
        self.evaluate_cells(table.cells(cat))
    }

    pub fn evaluate_micro(&self, table: &ContingencyTable) -> f64 {
        self.evaluate_cells(table.micro())
    }

    /// Whether `candidate` strictly improves on `incumbent` under this
    /// measure. Error rates improve downward, everything else upward. Ties
    /// never improve, so the first configuration reaching a value wins a
    /// sweep.
    pub fn better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Measure::Error => candidate < incumbent,
            _ => candidate > incumbent,
        }
    }

    /// Starting value a sweep initializes its incumbent to.
    pub fn worst(&self) -> f64 {
        match self {
            Measure::Error => f64::INFINITY,
            _ => f64::NEG_INFINITY,
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::classification::{ClassificationBuilder, ClassificationLayout};

    fn table() -> ContingencyTable {
        let mut t = ContingencyTable::new(2);
        // cat 0: tp=3 fp=1 fn=2 tn=4
        for _ in 0..3 {
            t.record(0, true, true, 1.0);
        }
        t.record(0, true, false, 1.0);
        t.record(0, false, true, 1.0);
        t.record(0, false, true, 1.0);
        for _ in 0..4 {
            t.record(0, false, false, 1.0);
        }
        // cat 1: tp=1 fp=0 fn=0 tn=9
        t.record(1, true, true, 1.0);
        for _ in 0..9 {
            t.record(1, false, false, 1.0);
        }
        t
    }

    #[test]
    fn per_category_measures() {
        let t = table();
        assert_eq!(Measure::Accuracy.evaluate(&t, 0), 0.7);
        assert_eq!(Measure::Error.evaluate(&t, 0), 0.3);
        assert_eq!(Measure::Precision.evaluate(&t, 0), 0.75);
        assert_eq!(Measure::Recall.evaluate(&t, 0), 0.6);
        let f1 = Measure::F1.evaluate(&t, 0);
        assert!((f1 - 2.0 * 0.75 * 0.6 / (0.75 + 0.6)).abs() < 1e-12);
        assert_eq!(Measure::F1.evaluate(&t, 1), 1.0);
    }

    #[test]
    fn micro_average_pools_cells_before_dividing() {
        let t = table();
        // pooled: tp=4 fp=1 fn=2
        let micro = Measure::F1.evaluate_micro(&t);
        assert!((micro - 8.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn empty_denominators_yield_zero() {
        let t = ContingencyTable::new(1);
        for m in [
            Measure::Accuracy,
            Measure::Error,
            Measure::F1,
            Measure::Precision,
            Measure::Recall,
        ] {
            assert_eq!(m.evaluate(&t, 0), 0.0);
        }
    }

    #[test]
    fn error_improves_downward_and_ties_never_improve() {
        assert!(Measure::Error.better(0.1, 0.2));
        assert!(!Measure::Error.better(0.2, 0.1));
        assert!(!Measure::Error.better(0.2, 0.2));
        assert!(Measure::F1.better(0.9, 0.8));
        assert!(!Measure::F1.better(0.8, 0.8));
        assert!(Measure::F1.better(0.0, Measure::F1.worst()));
    }

    #[test]
    fn fractional_weights_accumulate() {
        let mut t = ContingencyTable::new(1);
        t.record(0, true, true, 0.25);
        t.record(0, true, true, 0.5);
        t.record(0, true, false, 0.25);
        let cells = t.cells(0);
        assert_eq!(cells.true_positive, 0.75);
        assert_eq!(cells.false_positive, 0.25);
        assert_eq!(Measure::Precision.evaluate(&t, 0), 0.75);
    }

    #[test]
    fn from_relations_matches_manual_tallies() {
        let mut b = ClassificationBuilder::new(3, 2, ClassificationLayout::DocumentIndexed);
        b.set(0, 0, true).unwrap();
        b.set(1, 0, false).unwrap();
        b.set(2, 1, true).unwrap();
        let gold = b.build();
        // Predict cat 0 for every document, cat 1 for none.
        let t = ContingencyTable::from_relations(2, &[0, 1, 2], |_, cat| cat == 0, &gold);
        assert_eq!(t.cells(0).true_positive, 2.0);
        assert_eq!(t.cells(0).false_positive, 1.0);
        assert_eq!(t.cells(1).false_negative, 1.0);
        assert_eq!(t.cells(1).true_negative, 2.0);
    }
}
