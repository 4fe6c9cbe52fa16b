use faer::Col;
use faer::sparse::{SparseColMat, Triplet};
use problemo::{Problem, ProblemResult};

use crate::{ElementType, I};

use super::LinOpError;
use super::block::{Block, SumCache};

/// A general sparse block stored in compressed-column form.
///
/// Entries are supplied as `(row, col, value)` triplets in block-local
/// coordinates; duplicates are summed. The triplets are retained after
/// initialization so that absolute power sums can be answered for exponents
/// outside the precomputed set.
pub struct SparseBlock<T: ElementType> {
    row_off: I,
    col_off: I,
    nrows: I,
    ncols: I,

    entries: Vec<(I, I, T)>,
    mat: Option<SparseColMat<I, T>>,
    sums: SumCache<T>,
}

impl<T: ElementType> SparseBlock<T> {
    pub fn new(row_off: I, col_off: I, nrows: I, ncols: I, entries: Vec<(I, I, T)>) -> Self {
        Self {
            row_off,
            col_off,
            nrows,
            ncols,
            entries,
            mat: None,
            sums: SumCache::empty(),
        }
    }
}

impl<T: ElementType> Block<T> for SparseBlock<T> {
    fn row_off(&self) -> I {
        self.row_off
    }

    fn col_off(&self) -> I {
        self.col_off
    }

    fn nrows(&self) -> I {
        self.nrows
    }

    fn ncols(&self) -> I {
        self.ncols
    }

    fn init(&mut self, powers: &[T]) -> Result<(), Problem> {
        let mut triplets = Vec::new();
        triplets
            .try_reserve_exact(self.entries.len())
            .via(LinOpError::MemoryReservation)?;
        for &(i, j, v) in &self.entries {
            if i >= self.nrows || j >= self.ncols {
                return Err(LinOpError::InvalidStructure.into());
            }
            triplets.push(Triplet::new(i, j, v));
        }

        let mat = SparseColMat::<I, T>::try_new_from_triplets(self.nrows, self.ncols, &triplets)
            .via(LinOpError::InvalidStructure)?;

        // Duplicate triplets are summed during compression; rebuild the
        // entry list from the compressed form so the sum queries agree with
        // the evaluation.
        self.entries.clear();
        {
            let sym = mat.symbolic();
            let (col_ptr, row_idx, val) = (sym.col_ptr(), sym.row_idx(), mat.val());
            for j in 0..self.ncols {
                for k in col_ptr[j]..col_ptr[j + 1] {
                    self.entries.push((row_idx[k], j, val[k]));
                }
            }
        }
        self.mat = Some(mat);

        let entries = &self.entries;
        self.sums.build(self.nrows, self.ncols, powers, |sink| {
            for &(i, j, v) in entries {
                sink(i, j, v.abs());
            }
        });

        Ok(())
    }

    fn eval_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        let mat = self.mat.as_ref().ok_or(LinOpError::Uninitialized)?;
        let sym = mat.symbolic();
        let (col_ptr, row_idx, val) = (sym.col_ptr(), sym.row_idx(), mat.val());

        for j in 0..self.ncols {
            let xj = arg[self.col_off + j];
            if xj != T::zero() {
                for k in col_ptr[j]..col_ptr[j + 1] {
                    let i = self.row_off + row_idx[k];
                    out[i] = out[i] + val[k] * xj;
                }
            }
        }
        Ok(())
    }

    fn eval_adjoint_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        let mat = self.mat.as_ref().ok_or(LinOpError::Uninitialized)?;
        let sym = mat.symbolic();
        let (col_ptr, row_idx, val) = (sym.col_ptr(), sym.row_idx(), mat.val());

        for j in 0..self.ncols {
            let mut acc = T::zero();
            for k in col_ptr[j]..col_ptr[j + 1] {
                acc = acc + val[k] * arg[self.row_off + row_idx[k]];
            }
            out[self.col_off + j] = out[self.col_off + j] + acc;
        }
        Ok(())
    }

    fn row_sum(&self, row: I, p: T) -> T {
        self.sums.row(row, p).unwrap_or_else(|| {
            self.entries
                .iter()
                .filter(|&&(i, _, _)| i == row)
                .fold(T::zero(), |acc, &(_, _, v)| acc + v.abs().powf(p))
        })
    }

    fn col_sum(&self, col: I, p: T) -> T {
        self.sums.col(col, p).unwrap_or_else(|| {
            self.entries
                .iter()
                .filter(|&&(_, j, _)| j == col)
                .fold(T::zero(), |acc, &(_, _, v)| acc + v.abs().powf(p))
        })
    }
}
