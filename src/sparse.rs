//! Sparse user×category counts: a memory-bounded triplet accumulator and the
//! consolidated CSR matrix it produces.

use crate::error::PrepError;
use crate::ids::IdAssignment;
use crate::mem::is_low_memory;
use crate::merge::{split_pair_key, FreqMap};
use ahash::RandomState;
use anyhow::Result;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::ops::Range;

/// `(row, col, value)` entry. Duplicate coordinates are partial counts to be summed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triplet {
    pub row: u32,
    pub col: u32,
    pub value: u64,
}

impl Triplet {
    pub fn new(row: u32, col: u32, value: u64) -> Self {
        Self { row, col, value }
    }
}

/// Incremental triplet sink. New triplets land in a raw buffer; once the buffer
/// reaches `threshold` (or memory runs low) it is folded into a coordinate-keyed
/// map, summing duplicates. Each fold costs time proportional to the buffer only.
#[derive(Clone, Debug)]
pub struct TripletAccumulator {
    cells: HashMap<(u32, u32), u64, RandomState>,
    pending: Vec<Triplet>,
    threshold: usize,
    consolidations: u64,
}

impl TripletAccumulator {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            cells: HashMap::default(),
            pending: Vec::with_capacity(threshold.min(1 << 16)),
            threshold,
            consolidations: 0,
        }
    }

    pub fn push(&mut self, row: u32, col: u32, value: u64) {
        self.pending.push(Triplet { row, col, value });
        if self.pending.len() >= self.threshold
            || (self.pending.len() % 4096 == 0 && is_low_memory(0.10))
        {
            self.consolidate();
        }
    }

    pub fn extend<I: IntoIterator<Item = Triplet>>(&mut self, triplets: I) {
        for t in triplets {
            self.push(t.row, t.col, t.value);
        }
    }

    /// Fold the raw buffer into the consolidated cells. Zero values never create a cell.
    pub fn consolidate(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let before = self.pending.len();
        for t in self.pending.drain(..) {
            if t.value == 0 {
                continue;
            }
            *self.cells.entry((t.row, t.col)).or_insert(0) += t.value;
        }
        self.consolidations += 1;
        tracing::debug!(buffered = before, cells = self.cells.len(), "consolidated triplets");
    }

    /// Concatenate `other` into this accumulator and consolidate.
    pub fn merge(&mut self, mut other: TripletAccumulator) {
        other.consolidate();
        self.consolidate();
        if self.cells.len() < other.cells.len() {
            std::mem::swap(&mut self.cells, &mut other.cells);
        }
        for (k, v) in other.cells {
            *self.cells.entry(k).or_insert(0) += v;
        }
        self.consolidations += other.consolidations;
    }

    /// Distinct nonzero coordinates (after consolidating).
    pub fn nnz(&mut self) -> usize {
        self.consolidate();
        self.cells.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn consolidations(&self) -> u64 {
        self.consolidations
    }

    /// Consolidated triplets sorted by (row, col).
    pub fn triplets(&mut self) -> Vec<Triplet> {
        self.consolidate();
        let mut out: Vec<Triplet> = self.cells.iter().map(|(&(r, c), &v)| Triplet::new(r, c, v)).collect();
        out.sort_unstable();
        out
    }

    /// Matrix of the declared shape. Triplets outside it are a shape mismatch.
    pub fn into_matrix(mut self, rows: usize, cols: usize) -> Result<SparseMatrix> {
        let triplets = self.triplets();
        SparseMatrix::from_sorted_unique(rows, cols, triplets)
    }
}

/// Add the counts of a `"user category" -> count` mapping, skipping pairs whose user
/// or category has no id. Returns how many keys were skipped.
pub fn push_pair_counts(
    acc: &mut TripletAccumulator,
    counts: &FreqMap,
    users: &IdAssignment,
    categories: &IdAssignment,
) -> usize {
    let mut skipped = 0;
    for (key, &count) in counts {
        let ids = split_pair_key(key).and_then(|(u, c)| Some((users.id(u)?, categories.id(c)?)));
        match ids {
            Some((u, c)) => acc.push(u, c, count),
            None => skipped += 1,
        }
    }
    skipped
}

/// Consolidated `rows × cols` count matrix, stored as a CSR `sprs` matrix. Every
/// stored value is nonzero and each coordinate appears once.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    inner: CsMat<u64>,
}

impl SparseMatrix {
    pub fn empty(rows: usize, cols: usize) -> Self {
        let tri: TriMat<u64> = TriMat::new((rows, cols));
        Self { inner: tri.to_csr() }
    }

    /// Sum duplicates, drop zeros, check bounds.
    pub fn from_triplets<I: IntoIterator<Item = Triplet>>(rows: usize, cols: usize, triplets: I) -> Result<Self> {
        let mut acc = TripletAccumulator::new(usize::MAX);
        acc.extend(triplets);
        acc.into_matrix(rows, cols)
    }

    fn from_sorted_unique(rows: usize, cols: usize, triplets: Vec<Triplet>) -> Result<Self> {
        let mut tri: TriMat<u64> = TriMat::with_capacity((rows, cols), triplets.len());
        for t in &triplets {
            if t.row as usize >= rows {
                return Err(PrepError::shape("matrix rows", rows, t.row as usize + 1).into());
            }
            if t.col as usize >= cols {
                return Err(PrepError::shape("matrix columns", cols, t.col as usize + 1).into());
            }
            tri.add_triplet(t.row as usize, t.col as usize, t.value);
        }
        Ok(Self { inner: tri.to_csr() })
    }

    /// Rebuild from persisted triplets: the shape is one past the largest row and
    /// column seen, zero-valued lines included, which is what the trailing
    /// `(R-1, C-1, 0)` sentinel is for. An empty file reads back as `0 x 0`; use
    /// [`SparseMatrix::from_persisted_with_shape`] when the shape is known.
    pub fn from_persisted(triplets: Vec<Triplet>) -> Result<Self> {
        let rows = triplets.iter().map(|t| t.row as usize + 1).max().unwrap_or(0);
        let cols = triplets.iter().map(|t| t.col as usize + 1).max().unwrap_or(0);
        Self::from_triplets(rows, cols, triplets)
    }

    /// Rebuild persisted triplets against the expected `(rows, cols)`. A matrix with
    /// an empty dimension is persisted without a sentinel, so any line in it is a
    /// mismatch. Otherwise the sentinel must pin exactly `shape`.
    pub fn from_persisted_with_shape(triplets: Vec<Triplet>, shape: (usize, usize)) -> Result<Self> {
        if shape.0 == 0 || shape.1 == 0 {
            return Self::from_triplets(shape.0, shape.1, triplets);
        }
        let matrix = Self::from_persisted(triplets)?;
        if matrix.rows() != shape.0 {
            return Err(PrepError::shape("persisted matrix rows", shape.0, matrix.rows()).into());
        }
        if matrix.cols() != shape.1 {
            return Err(PrepError::shape("persisted matrix columns", shape.1, matrix.cols()).into());
        }
        Ok(matrix)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    pub fn rows(&self) -> usize {
        self.inner.rows()
    }

    pub fn cols(&self) -> usize {
        self.inner.cols()
    }

    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    pub fn total(&self) -> u64 {
        self.inner.data().iter().sum()
    }

    fn row_range(&self, row: usize) -> Range<usize> {
        if row >= self.rows() {
            return 0..0;
        }
        self.inner.indptr().outer_inds_sz(row)
    }

    /// Stored `(col, value)` entries of `row`, by column.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (u32, u64)> + '_ {
        let range = self.row_range(row);
        self.inner.indices()[range.clone()]
            .iter()
            .map(|&c| c as u32)
            .zip(self.inner.data()[range].iter().copied())
    }

    /// Stored values of `row`.
    pub fn row_values(&self, row: usize) -> &[u64] {
        &self.inner.data()[self.row_range(row)]
    }

    pub fn get(&self, row: usize, col: usize) -> u64 {
        if row >= self.rows() || col >= self.cols() {
            return 0;
        }
        self.inner.get(row, col).copied().unwrap_or(0)
    }

    /// Nonzero triplets by (row, col).
    pub fn triplets(&self) -> impl Iterator<Item = Triplet> + '_ {
        self.inner.iter().map(|(&v, (r, c))| Triplet::new(r as u32, c as u32, v))
    }

    /// What gets persisted: the nonzero triplets, then the zero-valued sentinel at
    /// `(R-1, C-1)` so a reader recovers the full shape even when the last row or
    /// column is empty. A matrix with no rows or no columns has no sentinel.
    pub fn to_persisted(&self) -> Vec<Triplet> {
        let mut out: Vec<Triplet> = self.triplets().collect();
        let (rows, cols) = self.shape();
        if rows > 0 && cols > 0 {
            out.push(Triplet::new(rows as u32 - 1, cols as u32 - 1, 0));
        }
        out
    }
}
