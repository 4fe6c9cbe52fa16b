use enum_dispatch::enum_dispatch;
use faer::Col;
use problemo::Problem;

use crate::{ElementType, I};

use super::dct::DctBlock;
use super::dense::DenseBlock;
use super::diagonal::{DiagonalBlock, ScaledIdentityBlock, ZeroBlock};
use super::gradient::{DatatermBlock, GradientBlock};
use super::sparse::SparseBlock;

/// A leaf linear map placed at `(row_off, col_off)` inside a composite
/// operator.
///
/// `eval_add` and `eval_adjoint_add` receive the *full* primal/dual vectors
/// and accumulate into the block's occupied slices; the composite zeroes the
/// output once before dispatching. `row_sum`/`col_sum` report
/// `sum_j |M_ij|^p` (resp. `sum_i`) in block-local indices and are backed by
/// caches or closed forms prepared in `init`.
#[enum_dispatch]
pub trait Block<T: ElementType> {
    fn row_off(&self) -> I;
    fn col_off(&self) -> I;
    fn nrows(&self) -> I;
    fn ncols(&self) -> I;

    /// Finalizes static data and precomputes absolute power sums for the
    /// given exponents.
    fn init(&mut self, powers: &[T]) -> Result<(), Problem>;

    /// `out[rows] <- out[rows] + M * arg[cols]`
    fn eval_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem>;

    /// `out[cols] <- out[cols] + M^T * arg[rows]`
    fn eval_adjoint_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem>;

    /// `sum_j |M_ij|^p` for the block-local row `i`.
    fn row_sum(&self, row: I, p: T) -> T;

    /// `sum_i |M_ij|^p` for the block-local column `j`.
    fn col_sum(&self, col: I, p: T) -> T;
}

/// The closed catalog of block kinds.
#[enum_dispatch(Block<T>)]
pub enum Blocks<T: ElementType> {
    Sparse(SparseBlock<T>),
    Dense(DenseBlock<T>),
    Diagonal(DiagonalBlock<T>),
    ScaledIdentity(ScaledIdentityBlock<T>),
    Zero(ZeroBlock<T>),
    Gradient(GradientBlock<T>),
    Dct(DctBlock<T>),
    Dataterm(DatatermBlock<T>),
}

/// Absolute power sums cached per requested exponent.
pub(crate) struct SumCache<T: ElementType> {
    powers: Vec<T>,
    rows: Vec<Col<T>>,
    cols: Vec<Col<T>>,
}

impl<T: ElementType> SumCache<T> {
    pub(crate) fn empty() -> Self {
        Self {
            powers: Vec::new(),
            rows: Vec::new(),
            cols: Vec::new(),
        }
    }

    /// Rebuilds the cache from an entry iterator over `(i, j, |v|)`.
    pub(crate) fn build<F>(&mut self, nrows: I, ncols: I, powers: &[T], entries: F)
    where
        F: Fn(&mut dyn FnMut(I, I, T)),
    {
        self.powers = powers.to_vec();
        self.rows = powers.iter().map(|_| Col::zeros(nrows)).collect();
        self.cols = powers.iter().map(|_| Col::zeros(ncols)).collect();

        for (k, &p) in self.powers.iter().enumerate() {
            let (rows, cols) = (&mut self.rows[k], &mut self.cols[k]);
            entries(&mut |i, j, a| {
                let ap = a.powf(p);
                rows[i] = rows[i] + ap;
                cols[j] = cols[j] + ap;
            });
        }
    }

    pub(crate) fn row(&self, i: I, p: T) -> Option<T> {
        self.powers.iter().position(|&q| q == p).map(|k| self.rows[k][i])
    }

    pub(crate) fn col(&self, j: I, p: T) -> Option<T> {
        self.powers.iter().position(|&q| q == p).map(|k| self.cols[k][j])
    }
}
