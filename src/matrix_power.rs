//! Matrix-power driver
//!
//! Three interchangeable backends behind one [`MatrixPower`] façade: a
//! sparse-times-sparse iterated product for sparse generators, a
//! dense in-place product with a swapped scratch buffer for dense ones, and a
//! lazy matrix-exponential representation (store the generator and an
//! exponent counter, materialize rows on demand) for when explicit powers
//! would be wasteful to keep around.
//!
//! `advance()` moves the driver from `Φ^k` to `Φ^{k+1}` where `Φ = exp(A·δ)`
//! is the one-step discrete transition matrix for step size `δ`; `row(i)`
//! and `sub(i_block, j_block)` read out of the *current* power without
//! mutating it.

use crate::partition::Block;
use ndarray::{Array1, Array2};

/// Errors raised by a [`MatrixPower`] backend or its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("row index {row} out of bounds for dimension {dim}")]
    RowOutOfBounds { row: usize, dim: usize },
    #[error("external row-extractor failed: {reason}")]
    ExtractorFailed { reason: String },
}

/// Read access into the current matrix power `Φ^k`; advancing moves to
/// `Φ^{k+1}`. Implementations never recompute `Φ^1`, `Φ^2`, … from scratch —
/// each `advance()` builds on the previous state.
pub trait MatrixPower {
    /// Ambient dimension `n` (the matrix is `n x n`).
    fn dim(&self) -> usize;
    /// Current exponent `k` (starts at 0, meaning `Φ^0 = I`).
    fn step(&self) -> usize;
    /// Row `i` of `Φ^k`, full width.
    fn row(&self, i: usize) -> Result<Array1<f64>, ExternalError>;
    /// The submatrix of `Φ^k` restricted to rows in `i_block`, columns in
    /// `j_block`.
    fn sub(&self, i_block: &Block, j_block: &Block) -> Result<Array2<f64>, ExternalError>;
    /// Advance from `Φ^k` to `Φ^{k+1}` in place.
    fn advance(&mut self) -> Result<(), ExternalError>;
}

/// CSR-ish sparse matrix: each row is a sorted `(col, val)` list.
#[derive(Debug, Clone)]
struct SparseMatrix {
    dim: usize,
    rows: Vec<Vec<(usize, f64)>>,
}

impl SparseMatrix {
    fn identity(dim: usize) -> Self {
        Self { dim, rows: (0..dim).map(|i| vec![(i, 1.0)]).collect() }
    }

    fn from_triplets(dim: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut rows = vec![Vec::new(); dim];
        for &(r, c, v) in triplets {
            rows[r].push((c, v));
        }
        for row in &mut rows {
            row.sort_by_key(|&(c, _)| c);
        }
        Self { dim, rows }
    }

    fn row_dense(&self, i: usize) -> Array1<f64> {
        let mut out = Array1::zeros(self.dim);
        for &(c, v) in &self.rows[i] {
            out[c] = v;
        }
        out
    }

    /// Sparse × sparse product: `self` (this power) times `generator`.
    fn mul(&self, generator: &SparseMatrix) -> SparseMatrix {
        let mut rows = vec![Vec::new(); self.dim];
        for i in 0..self.dim {
            let mut acc = vec![0.0; self.dim];
            for &(k, v) in &self.rows[i] {
                for &(j, g) in &generator.rows[k] {
                    acc[j] += v * g;
                }
            }
            rows[i] = acc
                .into_iter()
                .enumerate()
                .filter(|&(_, v)| v != 0.0)
                .collect();
        }
        SparseMatrix { dim: self.dim, rows }
    }
}

/// Sparse explicit backend: maintains `Φ^k` as a sparse matrix, advancing by
/// an iterated sparse×sparse product against the one-step generator.
#[derive(Debug, Clone)]
pub struct SparseMatrixPower {
    generator: SparseMatrix,
    current: SparseMatrix,
    k: usize,
}

impl SparseMatrixPower {
    pub fn new(dim: usize, triplets: &[(usize, usize, f64)]) -> Result<Self, ExternalError> {
        for &(r, c, _) in triplets {
            if r >= dim || c >= dim {
                return Err(ExternalError::RowOutOfBounds { row: r.max(c), dim });
            }
        }
        let generator = SparseMatrix::from_triplets(dim, triplets);
        Ok(Self { current: SparseMatrix::identity(dim), generator, k: 0 })
    }
}

impl MatrixPower for SparseMatrixPower {
    fn dim(&self) -> usize {
        self.generator.dim
    }

    fn step(&self) -> usize {
        self.k
    }

    fn row(&self, i: usize) -> Result<Array1<f64>, ExternalError> {
        if i >= self.dim() {
            return Err(ExternalError::RowOutOfBounds { row: i, dim: self.dim() });
        }
        Ok(self.current.row_dense(i))
    }

    fn sub(&self, i_block: &Block, j_block: &Block) -> Result<Array2<f64>, ExternalError> {
        sub_from_rows(i_block, j_block, |i| self.row(i))
    }

    fn advance(&mut self) -> Result<(), ExternalError> {
        self.current = self.current.mul(&self.generator);
        self.k += 1;
        Ok(())
    }
}

/// Dense explicit backend: in-place matrix product with a preallocated
/// scratch buffer, swapped in after each multiply (no per-step allocation).
#[derive(Debug, Clone)]
pub struct DenseMatrixPower {
    generator: Array2<f64>,
    current: Array2<f64>,
    scratch: Array2<f64>,
    k: usize,
}

impl DenseMatrixPower {
    pub fn new(generator: Array2<f64>) -> Result<Self, ExternalError> {
        let (rows, cols) = generator.dim();
        if rows != cols {
            return Err(ExternalError::NotSquare { rows, cols });
        }
        let current = Array2::eye(rows);
        let scratch = Array2::zeros((rows, rows));
        Ok(Self { generator, current, scratch, k: 0 })
    }
}

impl MatrixPower for DenseMatrixPower {
    fn dim(&self) -> usize {
        self.generator.nrows()
    }

    fn step(&self) -> usize {
        self.k
    }

    fn row(&self, i: usize) -> Result<Array1<f64>, ExternalError> {
        if i >= self.dim() {
            return Err(ExternalError::RowOutOfBounds { row: i, dim: self.dim() });
        }
        Ok(self.current.row(i).to_owned())
    }

    fn sub(&self, i_block: &Block, j_block: &Block) -> Result<Array2<f64>, ExternalError> {
        sub_from_rows(i_block, j_block, |i| self.row(i))
    }

    fn advance(&mut self) -> Result<(), ExternalError> {
        self.scratch.assign(&self.current.dot(&self.generator));
        std::mem::swap(&mut self.current, &mut self.scratch);
        self.k += 1;
        Ok(())
    }
}

/// Pluggable `exp(M·k)` row extractor, the "external collaborator" the
/// lazy-exponential backend delegates actual matrix-exponential evaluation
/// to. The default ([`TruncatedSeriesExtractor`]) is a
/// self-contained truncated Taylor series; a production deployment would
/// likely substitute a dedicated `expm`-style crate here without changing
/// [`LazyExpMatrixPower`]'s logic.
pub trait ExpRowExtractor {
    fn row(&self, generator: &Array2<f64>, k: usize, row: usize) -> Result<Array1<f64>, ExternalError>;
}

/// `e_row^T · exp(M·k) = sum_{t=0}^{terms} (e_row^T (M·k)^t) / t!`, computed
/// by repeated left-multiplication of the row vector (no full matrix powers
/// materialized).
#[derive(Debug, Clone, Copy)]
pub struct TruncatedSeriesExtractor {
    pub terms: usize,
}

impl Default for TruncatedSeriesExtractor {
    fn default() -> Self {
        Self { terms: 20 }
    }
}

impl ExpRowExtractor for TruncatedSeriesExtractor {
    fn row(&self, generator: &Array2<f64>, k: usize, row: usize) -> Result<Array1<f64>, ExternalError> {
        let dim = generator.nrows();
        if row >= dim {
            return Err(ExternalError::RowOutOfBounds { row, dim });
        }
        let mk = generator.mapv(|x| x * k as f64);
        let mut term = Array1::zeros(dim);
        term[row] = 1.0;
        let mut acc = term.clone();
        for t in 1..=self.terms {
            term = term.dot(&mk) / (t as f64);
            acc += &term;
            if term.iter().all(|v| v.abs() < 1e-16) {
                break;
            }
        }
        if acc.iter().any(|v| !v.is_finite()) {
            return Err(ExternalError::ExtractorFailed {
                reason: "truncated series diverged (non-finite term)".to_string(),
            });
        }
        Ok(acc)
    }
}

/// Lazy matrix-exponential backend: stores the generator `M = A·δ` and an
/// integer exponent `k`; `advance()` increments `k` only (never mutates `M`
/// by addition or multiplication). Rows of `Φ^k = exp(M·k)` are produced on
/// demand via the injected [`ExpRowExtractor`].
pub struct LazyExpMatrixPower<E: ExpRowExtractor> {
    generator: Array2<f64>,
    k: usize,
    extractor: E,
    assume_sparse: bool,
}

/// Below this magnitude an extracted row entry is treated as structural
/// zero when `assume_sparse` is set (§6 `assume_sparse`).
const SPARSE_ROW_EPS: f64 = 1e-14;

impl<E: ExpRowExtractor> LazyExpMatrixPower<E> {
    pub fn new(generator: Array2<f64>, extractor: E) -> Result<Self, ExternalError> {
        let (rows, cols) = generator.dim();
        if rows != cols {
            return Err(ExternalError::NotSquare { rows, cols });
        }
        Ok(Self { generator, k: 0, extractor, assume_sparse: false })
    }

    /// Treat extracted rows as sparse: entries the extractor returns below
    /// [`SPARSE_ROW_EPS`] are snapped to exact zero, so `sub`'s structural-zero
    /// check in [`crate::block_engine::BlockEngine`] can skip the
    /// corresponding coupling term instead of carrying tiny numerical noise
    /// through a `linear_map`/`minkowski_sum`.
    pub fn with_assume_sparse(mut self, assume_sparse: bool) -> Self {
        self.assume_sparse = assume_sparse;
        self
    }
}

impl<E: ExpRowExtractor> MatrixPower for LazyExpMatrixPower<E> {
    fn dim(&self) -> usize {
        self.generator.nrows()
    }

    fn step(&self) -> usize {
        self.k
    }

    fn row(&self, i: usize) -> Result<Array1<f64>, ExternalError> {
        let mut row = self.extractor.row(&self.generator, self.k, i)?;
        if self.assume_sparse {
            row.mapv_inplace(|v| if v.abs() < SPARSE_ROW_EPS { 0.0 } else { v });
        }
        Ok(row)
    }

    fn sub(&self, i_block: &Block, j_block: &Block) -> Result<Array2<f64>, ExternalError> {
        sub_from_rows(i_block, j_block, |i| self.row(i))
    }

    fn advance(&mut self) -> Result<(), ExternalError> {
        self.k += 1;
        Ok(())
    }
}

fn sub_from_rows(
    i_block: &Block,
    j_block: &Block,
    row_fn: impl Fn(usize) -> Result<Array1<f64>, ExternalError>,
) -> Result<Array2<f64>, ExternalError> {
    let mut out = Array2::zeros((i_block.len(), j_block.len()));
    for (r, i) in i_block.clone().enumerate() {
        let full_row = row_fn(i)?;
        for (c, j) in j_block.clone().enumerate() {
            out[[r, c]] = full_row[j];
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_power_step_zero_is_identity() {
        let gen = Array2::from_shape_vec((2, 2), vec![0.5, 0.0, 0.0, 0.5]).unwrap();
        let d = DenseMatrixPower::new(gen).unwrap();
        assert_eq!(d.row(0).unwrap(), Array1::from(vec![1.0, 0.0]));
        assert_eq!(d.step(), 0);
    }

    #[test]
    fn dense_power_advances_by_right_multiplication() {
        let gen = Array2::from_shape_vec((2, 2), vec![2.0, 0.0, 0.0, 3.0]).unwrap();
        let mut d = DenseMatrixPower::new(gen).unwrap();
        d.advance().unwrap();
        assert_eq!(d.row(0).unwrap(), Array1::from(vec![2.0, 0.0]));
        assert_eq!(d.row(1).unwrap(), Array1::from(vec![0.0, 3.0]));
        d.advance().unwrap();
        assert_eq!(d.row(0).unwrap(), Array1::from(vec![4.0, 0.0]));
        assert_eq!(d.step(), 2);
    }

    #[test]
    fn sparse_power_matches_dense_on_diagonal_matrix() {
        let mut sparse = SparseMatrixPower::new(3, &[(0, 0, 1.5), (1, 1, 2.0), (2, 2, 0.5)]).unwrap();
        sparse.advance().unwrap();
        sparse.advance().unwrap();
        assert!((sparse.row(0).unwrap()[0] - 2.25).abs() < 1e-9);
        assert!((sparse.row(1).unwrap()[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sub_extracts_block_rectangle() {
        let gen = Array2::from_shape_vec(
            (3, 3),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .unwrap();
        let d = DenseMatrixPower { generator: gen.clone(), current: gen, scratch: Array2::zeros((3, 3)), k: 0 };
        let s = d.sub(&(0..2), &(1..3)).unwrap();
        assert_eq!(s, Array2::from_shape_vec((2, 2), vec![2.0, 3.0, 5.0, 6.0]).unwrap());
    }

    #[test]
    fn lazy_exp_row_matches_truncated_series_for_zero_generator() {
        let gen = Array2::zeros((2, 2));
        let lazy = LazyExpMatrixPower::new(gen, TruncatedSeriesExtractor::default()).unwrap();
        // exp(0 * k) = I regardless of k.
        assert_eq!(lazy.row(0).unwrap(), Array1::from(vec![1.0, 0.0]));
    }

    #[test]
    fn assume_sparse_snaps_negligible_row_entries_to_zero() {
        struct NoisyExtractor;
        impl ExpRowExtractor for NoisyExtractor {
            fn row(&self, generator: &Array2<f64>, _k: usize, row: usize) -> Result<Array1<f64>, ExternalError> {
                let dim = generator.nrows();
                let mut out = Array1::zeros(dim);
                out[row] = 1.0;
                out[(row + 1) % dim] = 1e-15;
                Ok(out)
            }
        }
        let gen = Array2::zeros((2, 2));
        let lazy = LazyExpMatrixPower::new(gen, NoisyExtractor).unwrap().with_assume_sparse(true);
        let row = lazy.row(0).unwrap();
        assert_eq!(row[1], 0.0);
        assert_eq!(row[0], 1.0);
    }

    #[test]
    fn lazy_exp_advance_only_increments_exponent() {
        let gen = Array2::from_shape_vec((1, 1), vec![1.0]).unwrap();
        let mut lazy = LazyExpMatrixPower::new(gen, TruncatedSeriesExtractor::default()).unwrap();
        lazy.advance().unwrap();
        lazy.advance().unwrap();
        assert_eq!(lazy.step(), 2);
        // exp(1*2) = e^2
        assert!((lazy.row(0).unwrap()[0] - std::f64::consts::E.powi(2)).abs() < 1e-6);
    }
}
