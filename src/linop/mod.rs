//! Composite linear operators assembled from a closed catalog of blocks.
//!
//! A [`LinearOperator`] is an ordered collection of [`Blocks`] placed at
//! `(row_offset, col_offset)`. Evaluation zeroes the output once and lets
//! every block accumulate into its occupied slice; the adjoint runs the same
//! dispatch with the roles of rows and columns swapped. Absolute power sums
//! over rows and columns are answered per block and summed, which is what
//! the diagonal preconditioner construction consumes.

pub mod block;
pub mod dct;
pub mod dense;
pub mod diagonal;
pub mod gradient;
pub mod sparse;

use derive_more::{Display, Error};
use faer::Col;
use problemo::Problem;

use crate::linalg::vector_ops;
use crate::{ElementType, I};

pub use block::{Block, Blocks};

#[derive(Debug, Display, Error, PartialEq)]
pub enum LinOpError {
    #[display("Operator structure modified after initialization")]
    AlreadyInitialized,

    #[display("Operator evaluated before initialization")]
    Uninitialized,

    #[display("Dimension mismatch between operator and operand")]
    ShapeMismatch,

    #[display("Invalid block structure")]
    InvalidStructure,

    #[display("Two blocks occupy overlapping output cells")]
    BlockOverlap,

    #[display("Memory reservation failed")]
    MemoryReservation,
}

/// A block matrix `K` acting on the primal variable.
///
/// Lifecycle: construct empty, [`add_block`](Self::add_block) repeatedly,
/// then [`init`](Self::init) exactly once. After initialization the
/// structure is immutable.
pub struct LinearOperator<T: ElementType> {
    blocks: Vec<Blocks<T>>,
    nrows: I,
    ncols: I,
    initialized: bool,
}

impl<T: ElementType> LinearOperator<T> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            nrows: 0,
            ncols: 0,
            initialized: false,
        }
    }

    pub fn nrows(&self) -> I {
        self.nrows
    }

    pub fn ncols(&self) -> I {
        self.ncols
    }

    /// Appends a block, extending the operator extent to cover it.
    pub fn add_block(&mut self, block: Blocks<T>) -> Result<(), Problem> {
        if self.initialized {
            return Err(LinOpError::AlreadyInitialized.into());
        }
        self.nrows = self.nrows.max(block.row_off() + block.nrows());
        self.ncols = self.ncols.max(block.col_off() + block.ncols());
        self.blocks.push(block);
        Ok(())
    }

    /// Validates the structure and initializes every block, preparing sum
    /// caches for the given exponents.
    pub fn init(&mut self, powers: &[T]) -> Result<(), Problem> {
        if self.initialized {
            return Err(LinOpError::AlreadyInitialized.into());
        }

        // Occupied rectangles of two blocks must be disjoint; sharing rows
        // alone or columns alone is fine.
        for (k, a) in self.blocks.iter().enumerate() {
            for b in &self.blocks[k + 1..] {
                let rows_meet =
                    a.row_off() < b.row_off() + b.nrows() && b.row_off() < a.row_off() + a.nrows();
                let cols_meet =
                    a.col_off() < b.col_off() + b.ncols() && b.col_off() < a.col_off() + a.ncols();
                if rows_meet && cols_meet {
                    return Err(LinOpError::BlockOverlap.into());
                }
            }
        }

        for block in &mut self.blocks {
            block.init(powers)?;
        }
        self.initialized = true;
        Ok(())
    }

    fn check_shapes(&self, out: &Col<T>, arg: &Col<T>, transposed: bool) -> Result<(), Problem> {
        if !self.initialized {
            return Err(LinOpError::Uninitialized.into());
        }
        let (m, n) = if transposed {
            (self.ncols, self.nrows)
        } else {
            (self.nrows, self.ncols)
        };
        if out.nrows() != m || arg.nrows() != n {
            return Err(LinOpError::ShapeMismatch.into());
        }
        Ok(())
    }

    /// `out <- K * arg`
    pub fn eval(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        self.check_shapes(out, arg, false)?;
        vector_ops::fill(out.as_mut(), T::zero());
        for block in &self.blocks {
            block.eval_add(out, arg)?;
        }
        Ok(())
    }

    /// `out <- K^T * arg`
    pub fn eval_adjoint(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        self.check_shapes(out, arg, true)?;
        vector_ops::fill(out.as_mut(), T::zero());
        for block in &self.blocks {
            block.eval_adjoint_add(out, arg)?;
        }
        Ok(())
    }

    /// `sum_c |K_rc|^p` over the full row `r`.
    pub fn row_sum(&self, row: I, p: T) -> T {
        self.blocks
            .iter()
            .filter(|b| b.row_off() <= row && row < b.row_off() + b.nrows())
            .fold(T::zero(), |acc, b| acc + b.row_sum(row - b.row_off(), p))
    }

    /// `sum_r |K_rc|^p` over the full column `c`.
    pub fn col_sum(&self, col: I, p: T) -> T {
        self.blocks
            .iter()
            .filter(|b| b.col_off() <= col && col < b.col_off() + b.ncols())
            .fold(T::zero(), |acc, b| acc + b.col_sum(col - b.col_off(), p))
    }

    /// Estimates `||K||_2` by power iteration on `K^T K`.
    pub fn normest(&self) -> Result<T, Problem> {
        let mut x = Col::<T>::ones(self.ncols);
        let mut y = Col::<T>::zeros(self.nrows);
        let nrm = vector_ops::norm_l2(x.as_ref());
        if nrm == T::zero() {
            return Ok(T::zero());
        }
        vector_ops::scale(x.as_mut(), T::one() / nrm);

        let mut lambda = T::zero();
        for _ in 0..20 {
            self.eval(&mut y, &x)?;
            self.eval_adjoint(&mut x, &y)?;
            lambda = vector_ops::norm_l2(x.as_ref());
            if lambda == T::zero() {
                return Ok(T::zero());
            }
            vector_ops::scale(x.as_mut(), T::one() / lambda);
        }
        Ok(lambda.sqrt())
    }

    /// Releases the block storage.
    pub fn release(&mut self) {
        self.blocks = Vec::new();
        self.initialized = false;
    }
}

impl<T: ElementType> Default for LinearOperator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Materializes the operator column by column. Test and diagnostics helper;
/// quadratic in the problem size.
pub fn materialize<T: ElementType>(op: &LinearOperator<T>) -> Result<faer::Mat<T>, Problem> {
    let mut unit = Col::<T>::zeros(op.ncols());
    let mut col = Col::<T>::zeros(op.nrows());
    let mut dense = faer::Mat::<T>::zeros(op.nrows(), op.ncols());
    for j in 0..op.ncols() {
        unit[j] = T::one();
        op.eval(&mut col, &unit)?;
        for i in 0..op.nrows() {
            dense[(i, j)] = col[i];
        }
        unit[j] = T::zero();
    }
    Ok(dense)
}
