//! Triplet accumulation and conversion to compressed sparse column storage.
//!
//! The Jacobian is assembled as an append-only list of `(row, col, value)` triplets and
//! converted once per evaluation with [`SparseColMat::try_new_from_triplets`], which sorts
//! the entries column-major and sums duplicates.

use faer::sparse::{SparseColMat, Triplet};
use thiserror::Error;
use tracing::error;

/// Type alias for sparse matrices using faer
pub type SparseMatrix = SparseColMat<usize, f64>;

/// Sparse accumulation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SparseError {
    #[error("Entry ({row}, {col}) is outside a {nrows}x{ncols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },

    #[error("Failed to build compressed matrix: {0}")]
    Creation(String),
}

impl SparseError {
    /// Log the error with `tracing::error!` and return it.
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Sparse matrix under construction.
///
/// Entries are appended without lookup; a `(row, col)` pair may appear several times and
/// its contributions are summed by [`TripletAccumulator::to_compressed`].
#[derive(Debug, Clone, Default)]
pub struct TripletAccumulator {
    nrows: usize,
    ncols: usize,
    triplets: Vec<Triplet<usize, usize, f64>>,
}

impl TripletAccumulator {
    /// Empty accumulator for an `nrows × ncols` matrix.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            triplets: Vec::new(),
        }
    }

    /// Empty accumulator with room for `capacity` entries.
    pub fn with_capacity(nrows: usize, ncols: usize, capacity: usize) -> Self {
        Self {
            nrows,
            ncols,
            triplets: Vec::with_capacity(capacity),
        }
    }

    /// Change the declared shape and discard all entries, keeping the allocation.
    pub fn reshape(&mut self, nrows: usize, ncols: usize) {
        self.nrows = nrows;
        self.ncols = ncols;
        self.triplets.clear();
    }

    /// Append an entry. Bounds are only checked by `debug_assert!`.
    #[inline]
    pub fn add_item(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.nrows && col < self.ncols);
        self.triplets.push(Triplet::new(row, col, value));
    }

    /// Append an entry after validating it against the declared shape.
    ///
    /// # Errors
    ///
    /// [`SparseError::IndexOutOfBounds`] if `row >= nrows` or `col >= ncols`.
    #[inline]
    pub fn add_item_checked(&mut self, row: usize, col: usize, value: f64) -> Result<(), SparseError> {
        if row >= self.nrows || col >= self.ncols {
            return Err(SparseError::IndexOutOfBounds {
                row,
                col,
                nrows: self.nrows,
                ncols: self.ncols,
            });
        }
        self.triplets.push(Triplet::new(row, col, value));
        Ok(())
    }

    /// Append every entry of `other`, preserving its order.
    pub fn extend_from(&mut self, other: &TripletAccumulator) {
        self.triplets.extend_from_slice(&other.triplets);
    }

    /// Number of stored entries, duplicates included.
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Declared `(nrows, ncols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Stored entries in insertion order.
    pub fn triplets(&self) -> &[Triplet<usize, usize, f64>] {
        &self.triplets
    }

    /// Build the compressed sparse column matrix, summing duplicate entries.
    pub fn to_compressed(&self) -> Result<SparseMatrix, SparseError> {
        SparseColMat::try_new_from_triplets(self.nrows, self.ncols, &self.triplets).map_err(|e| {
            SparseError::Creation(format!(
                "{}x{} matrix from {} triplets: {:?}",
                self.nrows,
                self.ncols,
                self.triplets.len(),
                e
            ))
            .log()
        })
    }
}

/// Read entry `(row, col)` of a compressed matrix, zero when it is not stored.
pub fn sparse_entry(matrix: &SparseMatrix, row: usize, col: usize) -> f64 {
    let symbolic = matrix.symbolic();
    let row_indices = symbolic.row_idx_of_col_raw(col);
    let col_values = matrix.val_of_col(col);
    row_indices
        .iter()
        .position(|&r| r == row)
        .map_or(0.0, |idx| col_values[idx])
}

/// Expand a compressed matrix into a dense row-major `Vec` of rows.
pub fn to_dense_rows(matrix: &SparseMatrix) -> Vec<Vec<f64>> {
    let mut dense = vec![vec![0.0; matrix.ncols()]; matrix.nrows()];
    let symbolic = matrix.symbolic();
    for col in 0..matrix.ncols() {
        let row_indices = symbolic.row_idx_of_col_raw(col);
        let col_values = matrix.val_of_col(col);
        for (idx, &row) in row_indices.iter().enumerate() {
            dense[row][col] += col_values[idx];
        }
    }
    dense
}
