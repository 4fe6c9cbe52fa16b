use faer::{Col, Mat};
use problemo::Problem;

use crate::{ElementType, I};

use super::LinOpError;
use super::block::{Block, SumCache};

/// A dense block stored column-major.
pub struct DenseBlock<T: ElementType> {
    row_off: I,
    col_off: I,
    mat: Mat<T>,
    sums: SumCache<T>,
    initialized: bool,
}

impl<T: ElementType> DenseBlock<T> {
    pub fn new(row_off: I, col_off: I, mat: Mat<T>) -> Self {
        Self {
            row_off,
            col_off,
            mat,
            sums: SumCache::empty(),
            initialized: false,
        }
    }

    /// Builds the block from a column-major host array.
    pub fn from_column_major(row_off: I, col_off: I, nrows: I, ncols: I, data: &[T]) -> Self {
        let mat = Mat::from_fn(nrows, ncols, |i, j| data[i + nrows * j]);
        Self::new(row_off, col_off, mat)
    }
}

impl<T: ElementType> Block<T> for DenseBlock<T> {
    fn row_off(&self) -> I {
        self.row_off
    }

    fn col_off(&self) -> I {
        self.col_off
    }

    fn nrows(&self) -> I {
        self.mat.nrows()
    }

    fn ncols(&self) -> I {
        self.mat.ncols()
    }

    fn init(&mut self, powers: &[T]) -> Result<(), Problem> {
        let mat = &self.mat;
        self.sums.build(mat.nrows(), mat.ncols(), powers, |sink| {
            for j in 0..mat.ncols() {
                for i in 0..mat.nrows() {
                    sink(i, j, mat[(i, j)].abs());
                }
            }
        });
        self.initialized = true;
        Ok(())
    }

    fn eval_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        if !self.initialized {
            return Err(LinOpError::Uninitialized.into());
        }
        for j in 0..self.mat.ncols() {
            let xj = arg[self.col_off + j];
            if xj != T::zero() {
                for i in 0..self.mat.nrows() {
                    let r = self.row_off + i;
                    out[r] = out[r] + self.mat[(i, j)] * xj;
                }
            }
        }
        Ok(())
    }

    fn eval_adjoint_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        if !self.initialized {
            return Err(LinOpError::Uninitialized.into());
        }
        for j in 0..self.mat.ncols() {
            let mut acc = T::zero();
            for i in 0..self.mat.nrows() {
                acc = acc + self.mat[(i, j)] * arg[self.row_off + i];
            }
            let c = self.col_off + j;
            out[c] = out[c] + acc;
        }
        Ok(())
    }

    fn row_sum(&self, row: I, p: T) -> T {
        self.sums.row(row, p).unwrap_or_else(|| {
            (0..self.mat.ncols()).fold(T::zero(), |acc, j| acc + self.mat[(row, j)].abs().powf(p))
        })
    }

    fn col_sum(&self, col: I, p: T) -> T {
        self.sums.col(col, p).unwrap_or_else(|| {
            (0..self.mat.nrows()).fold(T::zero(), |acc, i| acc + self.mat[(i, col)].abs().powf(p))
        })
    }
}
