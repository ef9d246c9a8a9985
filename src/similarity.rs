use std::cmp::Ordering;

use ahash::RandomState;
use dashmap::DashMap;
use num::Num;
use rayon::prelude::*;

use crate::index::CompactIndex;

/// Pairwise document similarity over the sparse content rows.
///
/// The returned value is used as a total preorder key by the searcher;
/// symmetry when both sides are the same index is the caller's
/// responsibility, not enforced here. Some classifiers additionally assume
/// scores in [0, 1]; that is a configuration precondition, not part of this
/// contract.
pub trait Similarity<N>: Send + Sync
where
    N: Num + Copy + Into<f64> + Send + Sync,
{
    fn compute(&self, a: u32, index_a: &CompactIndex<N>, b: u32, index_b: &CompactIndex<N>) -> f64;
}

impl<N, S> Similarity<N> for &S
where
    N: Num + Copy + Into<f64> + Send + Sync,
    S: Similarity<N> + ?Sized,
{
    fn compute(&self, a: u32, index_a: &CompactIndex<N>, b: u32, index_b: &CompactIndex<N>) -> f64 {
        (**self).compute(a, index_a, b, index_b)
    }
}

/// Euclidean distance over the sparse frequency rows, folded into a
/// similarity as `1 / (1 + d)`. Bounded to (0, 1], which satisfies the
/// Galavotti precondition.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanSimilarity;

impl EuclideanSimilarity {
    pub fn new() -> Self {
        EuclideanSimilarity
    }
}

impl<N> Similarity<N> for EuclideanSimilarity
where
    N: Num + Copy + Into<f64> + Send + Sync,
{
    fn compute(&self, a: u32, index_a: &CompactIndex<N>, b: u32, index_b: &CompactIndex<N>) -> f64 {
        let mut sum_sq = 0.0_f64;
        merge_rows(index_a, a, index_b, b, |fa, fb| {
            let d = fa - fb;
            sum_sq += d * d;
        });
        1.0 / (1.0 + sum_sq.sqrt())
    }
}

/// Cosine similarity over the sparse frequency rows via a sorted merge-join.
/// In [0, 1] for non-negative frequencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSimilarity;

impl CosineSimilarity {
    pub fn new() -> Self {
        CosineSimilarity
    }
}

impl<N> Similarity<N> for CosineSimilarity
where
    N: Num + Copy + Into<f64> + Send + Sync,
{
    fn compute(&self, a: u32, index_a: &CompactIndex<N>, b: u32, index_b: &CompactIndex<N>) -> f64 {
        let mut dot = 0.0_f64;
        let mut norm_a = 0.0_f64;
        let mut norm_b = 0.0_f64;
        merge_rows(index_a, a, index_b, b, |fa, fb| {
            dot += fa * fb;
            norm_a += fa * fa;
            norm_b += fb * fb;
        });
        // Zero division safety with f64::EPSILON
        dot / (norm_a.sqrt() * norm_b.sqrt() + f64::EPSILON)
    }
}

/// Merge-join two sorted sparse rows, invoking `visit(fa, fb)` for every
/// feature present on either side (the absent side contributes zero).
fn merge_rows<N, F>(index_a: &CompactIndex<N>, a: u32, index_b: &CompactIndex<N>, b: u32, mut visit: F)
where
    N: Num + Copy + Into<f64>,
    F: FnMut(f64, f64),
{
    let empty: (&[u32], &[N]) = (&[], &[]);
    let (ids_a, vals_a) = index_a.content().row(a).map(|r| r.parts()).unwrap_or(empty);
    let (ids_b, vals_b) = index_b.content().row(b).map(|r| r.parts()).unwrap_or(empty);
    let mut ia = 0usize;
    let mut ib = 0usize;
    while ia < ids_a.len() && ib < ids_b.len() {
        match ids_a[ia].cmp(&ids_b[ib]) {
            Ordering::Equal => {
                visit(vals_a[ia].into(), vals_b[ib].into());
                ia += 1;
                ib += 1;
            }
            Ordering::Less => {
                visit(vals_a[ia].into(), 0.0);
                ia += 1;
            }
            Ordering::Greater => {
                visit(0.0, vals_b[ib].into());
                ib += 1;
            }
        }
    }
    while ia < ids_a.len() {
        visit(vals_a[ia].into(), 0.0);
        ia += 1;
    }
    while ib < ids_b.len() {
        visit(0.0, vals_b[ib].into());
        ib += 1;
    }
}

/// Lazy half-matrix cache around another similarity, keyed `(min, max)` to
/// exploit symmetry. Only meaningful when both sides of every call draw from
/// the same underlying index; that is the caller's configuration to get
/// right.
#[derive(Debug)]
pub struct CachedSimilarity<S> {
    inner: S,
    cache: DashMap<(u32, u32), f64, RandomState>,
}

impl<S> CachedSimilarity<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached pair, e.g. after the underlying index mutated.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<N, S> Similarity<N> for CachedSimilarity<S>
where
    N: Num + Copy + Into<f64> + Send + Sync,
    S: Similarity<N>,
{
    fn compute(&self, a: u32, index_a: &CompactIndex<N>, b: u32, index_b: &CompactIndex<N>) -> f64 {
        let key = (a.min(b), a.max(b));
        if let Some(hit) = self.cache.get(&key) {
            return *hit;
        }
        let value = self.inner.compute(a, index_a, b, index_b);
        self.cache.insert(key, value);
        value
    }
}

/// Eagerly precomputed half matrix of all pairwise similarities over one
/// index. Owned by whoever drives repeated searches over the same pool (the
/// fold validator), and passed into searches explicitly.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    len: usize,
    cells: Vec<f64>,
}

impl SimilarityMatrix {
    /// Compute every pair `(i, j)`, `i <= j`, in parallel.
    pub fn precompute<N, S>(index: &CompactIndex<N>, similarity: &S) -> Self
    where
        N: Num + Copy + Into<f64> + Send + Sync,
        S: Similarity<N>,
    {
        let len = index.documents().len();
        let cells: Vec<f64> = (0..len)
            .into_par_iter()
            .flat_map_iter(|j| {
                (0..=j).map(move |i| similarity.compute(i as u32, index, j as u32, index))
            })
            .collect();
        Self { len, cells }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Symmetric lookup. IDs must be document IDs of the index the matrix
    /// was computed over.
    pub fn get(&self, a: u32, b: u32) -> f64 {
        let (i, j) = (a.min(b) as usize, a.max(b) as usize);
        debug_assert!(j < self.len, "document id out of matrix range");
        self.cells[j * (j + 1) / 2 + i]
    }
}
