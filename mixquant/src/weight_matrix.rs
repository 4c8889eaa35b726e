//! Sparse transcript-by-fragment weight store.
//!
//! Each row is a transcript and holds `(column, weight)` pairs for the fragments
//! compatible with it. Rows are built independently (a worker owns the rows of
//! its locus), then the whole matrix is compacted once: rows are shrunk to their
//! exact size, unused columns are removed, and every row is sorted by column.
use serde::{Deserialize, Serialize};

/// Below this capacity a row doubles when full; above it grows linearly.
const ROW_DOUBLING_LIMIT: usize = 100;
/// Ranges at most this long are insertion-sorted.
const SMALL_RANGE: usize = 7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    idxs: Vec<u32>,
    weights: Vec<f32>,
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}

impl Row {
    pub fn new() -> Self {
        Self {
            idxs: Vec::with_capacity(1),
            weights: Vec::with_capacity(1),
        }
    }
    pub fn len(&self) -> usize {
        self.idxs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.idxs.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.idxs.capacity()
    }
    pub fn idxs(&self) -> &[u32] {
        &self.idxs
    }
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.idxs.iter().copied().zip(self.weights.iter().copied())
    }
    /// Append an entry. The caller guarantees `idx` is not in the row yet.
    pub fn push(&mut self, idx: u32, weight: f32) {
        if self.idxs.len() == self.idxs.capacity() {
            let cap = self.idxs.capacity();
            let extra = match cap {
                0 => 1,
                _ if cap < ROW_DOUBLING_LIMIT => cap,
                _ => ROW_DOUBLING_LIMIT,
            };
            self.idxs.reserve_exact(extra);
            self.weights.reserve_exact(extra);
        }
        self.idxs.push(idx);
        self.weights.push(weight);
    }
    fn shrink_to_fit(&mut self) {
        self.idxs.shrink_to_fit();
        self.weights.shrink_to_fit();
    }
    fn remap<F: Fn(u32) -> u32>(&mut self, map: F) {
        self.idxs.iter_mut().for_each(|idx| *idx = map(*idx));
    }
    fn sort(&mut self) {
        sort_row(&mut self.idxs, &mut self.weights);
    }
}

/// Sort `idxs` ascending, carrying `weights` along.
/// Quicksort with an explicit range stack, median-of-three pivots and
/// insertion sort on small ranges. Falls back to a library sort when a range
/// recurses too deep.
fn sort_row(idxs: &mut [u32], weights: &mut [f32]) {
    let len = idxs.len();
    if len < 2 {
        return;
    }
    let max_depth = 2 * (usize::BITS - len.leading_zeros()) as usize;
    let mut stack = vec![(0, len, 0)];
    while let Some((lo, hi, depth)) = stack.pop() {
        if hi - lo <= SMALL_RANGE {
            insertion_sort(&mut idxs[lo..hi], &mut weights[lo..hi]);
        } else if max_depth < depth {
            fallback_sort(&mut idxs[lo..hi], &mut weights[lo..hi]);
        } else {
            let pivot = partition(&mut idxs[lo..hi], &mut weights[lo..hi]) + lo;
            stack.push((lo, pivot, depth + 1));
            stack.push((pivot + 1, hi, depth + 1));
        }
    }
}

fn insertion_sort(idxs: &mut [u32], weights: &mut [f32]) {
    for i in 1..idxs.len() {
        let mut j = i;
        while 0 < j && idxs[j] < idxs[j - 1] {
            idxs.swap(j, j - 1);
            weights.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn fallback_sort(idxs: &mut [u32], weights: &mut [f32]) {
    let mut pairs: Vec<(u32, f32)> = idxs.iter().copied().zip(weights.iter().copied()).collect();
    pairs.sort_unstable_by_key(|&(idx, _)| idx);
    for (k, (idx, w)) in pairs.into_iter().enumerate() {
        idxs[k] = idx;
        weights[k] = w;
    }
}

/// Lomuto partition around the median of the first, middle and last element.
/// Returns the final position of the pivot.
fn partition(idxs: &mut [u32], weights: &mut [f32]) -> usize {
    let swap = |idxs: &mut [u32], weights: &mut [f32], a: usize, b: usize| {
        idxs.swap(a, b);
        weights.swap(a, b);
    };
    let (mid, last) = (idxs.len() / 2, idxs.len() - 1);
    if idxs[mid] < idxs[0] {
        swap(idxs, weights, 0, mid);
    }
    if idxs[last] < idxs[0] {
        swap(idxs, weights, 0, last);
    }
    if idxs[mid] < idxs[last] {
        swap(idxs, weights, mid, last);
    }
    let pivot = idxs[last];
    let mut store = 0;
    for k in 0..last {
        if idxs[k] <= pivot {
            swap(idxs, weights, k, store);
            store += 1;
        }
    }
    swap(idxs, weights, store, last);
    store
}

/// One stored weight: transcript `i`, fragment `j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub i: u32,
    pub j: u32,
    pub w: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightMatrix {
    rows: Vec<Row>,
    ncol: usize,
}

impl WeightMatrix {
    /// An empty matrix with `nrow` transcripts.
    pub fn new(nrow: usize) -> Self {
        let rows = (0..nrow).map(|_| Row::new()).collect();
        Self { rows, ncol: 0 }
    }
    pub fn nrow(&self) -> usize {
        self.rows.len()
    }
    pub fn ncol(&self) -> usize {
        self.ncol
    }
    /// Make sure the matrix spans at least `ncol` columns.
    pub fn set_ncol(&mut self, ncol: usize) {
        self.ncol = self.ncol.max(ncol);
    }
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
    pub fn row(&self, i: usize) -> &Row {
        &self.rows[i]
    }
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
    /// Insert `(i, j, w)`. Each `(i, j)` must be inserted at most once.
    pub fn push(&mut self, i: usize, j: u32, w: f32) {
        self.rows[i].push(j, w);
        self.ncol = self.ncol.max(j as usize + 1);
    }
    /// Append every entry of `row` to row `i`.
    pub fn extend_row(&mut self, i: usize, row: Row) {
        if let Some(&max) = row.idxs.iter().max() {
            self.ncol = self.ncol.max(max as usize + 1);
        }
        if self.rows[i].is_empty() {
            self.rows[i] = row;
        } else {
            row.iter().for_each(|(j, w)| self.rows[i].push(j, w));
        }
    }
    /// Shrink every row, drop columns without any entry, renumber the rest densely
    /// in their original order and sort every row by column.
    /// Returns the map from old column to new column (None for dropped columns).
    pub fn compact(&mut self) -> Vec<Option<u32>> {
        let mut used = vec![false; self.ncol];
        for row in self.rows.iter() {
            row.idxs.iter().for_each(|&j| used[j as usize] = true);
        }
        let mut next = 0;
        let map: Vec<Option<u32>> = used
            .iter()
            .map(|&is_used| {
                is_used.then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        for row in self.rows.iter_mut() {
            row.shrink_to_fit();
            // Every column in a row is marked used.
            row.remap(|j| map[j as usize].unwrap_or(u32::MAX));
            row.sort();
        }
        trace!("COMPACT\t{}\t{}", self.ncol, next);
        self.ncol = next as usize;
        map
    }
    /// Move column `j` to `perm[j]` and re-sort every row.
    pub fn reorder_columns(&mut self, perm: &[u32]) {
        assert_eq!(perm.len(), self.ncol);
        for row in self.rows.iter_mut() {
            row.remap(|j| perm[j as usize]);
            row.sort();
        }
    }
    /// All entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Entry> + '_ {
        self.rows.iter().enumerate().flat_map(|(i, row)| {
            row.iter().map(move |(j, w)| Entry { i: i as u32, j, w })
        })
    }
}
