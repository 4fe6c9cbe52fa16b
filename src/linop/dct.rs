use faer::{Col, Mat};
use problemo::Problem;

use crate::{ElementType, I, cast};

use super::LinOpError;
use super::block::{Block, SumCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Orthonormal DCT-II.
    Dct2,
    /// Orthonormal DST-I.
    Dst1,
}

/// A square trigonometric transform block. The orthonormal basis is
/// materialized at initialization; the adjoint is the transposed basis.
pub struct DctBlock<T: ElementType> {
    row_off: I,
    col_off: I,
    size: I,
    kind: TransformKind,
    basis: Option<Mat<T>>,
    sums: SumCache<T>,
}

impl<T: ElementType> DctBlock<T> {
    pub fn new(row_off: I, col_off: I, size: I, kind: TransformKind) -> Self {
        Self {
            row_off,
            col_off,
            size,
            kind,
            basis: None,
            sums: SumCache::empty(),
        }
    }

    fn build_basis(&self) -> Mat<T> {
        let n = self.size as f64;
        match self.kind {
            TransformKind::Dct2 => Mat::from_fn(self.size, self.size, |k, j| {
                let s = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                cast(s * (std::f64::consts::PI * (2.0 * j as f64 + 1.0) * k as f64 / (2.0 * n)).cos())
            }),
            TransformKind::Dst1 => Mat::from_fn(self.size, self.size, |k, j| {
                let s = (2.0 / (n + 1.0)).sqrt();
                cast(
                    s * (std::f64::consts::PI * (k as f64 + 1.0) * (j as f64 + 1.0) / (n + 1.0))
                        .sin(),
                )
            }),
        }
    }
}

impl<T: ElementType> Block<T> for DctBlock<T> {
    fn row_off(&self) -> I {
        self.row_off
    }

    fn col_off(&self) -> I {
        self.col_off
    }

    fn nrows(&self) -> I {
        self.size
    }

    fn ncols(&self) -> I {
        self.size
    }

    fn init(&mut self, powers: &[T]) -> Result<(), Problem> {
        let basis = self.build_basis();
        self.sums.build(self.size, self.size, powers, |sink| {
            for j in 0..basis.ncols() {
                for i in 0..basis.nrows() {
                    sink(i, j, basis[(i, j)].abs());
                }
            }
        });
        self.basis = Some(basis);
        Ok(())
    }

    fn eval_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        let basis = self.basis.as_ref().ok_or(LinOpError::Uninitialized)?;
        for j in 0..self.size {
            let xj = arg[self.col_off + j];
            if xj != T::zero() {
                for i in 0..self.size {
                    let r = self.row_off + i;
                    out[r] = out[r] + basis[(i, j)] * xj;
                }
            }
        }
        Ok(())
    }

    fn eval_adjoint_add(&self, out: &mut Col<T>, arg: &Col<T>) -> Result<(), Problem> {
        let basis = self.basis.as_ref().ok_or(LinOpError::Uninitialized)?;
        for j in 0..self.size {
            let mut acc = T::zero();
            for i in 0..self.size {
                acc = acc + basis[(i, j)] * arg[self.row_off + i];
            }
            let c = self.col_off + j;
            out[c] = out[c] + acc;
        }
        Ok(())
    }

    fn row_sum(&self, row: I, p: T) -> T {
        match (self.sums.row(row, p), self.basis.as_ref()) {
            (Some(s), _) => s,
            (None, Some(basis)) => {
                (0..self.size).fold(T::zero(), |acc, j| acc + basis[(row, j)].abs().powf(p))
            }
            (None, None) => T::zero(),
        }
    }

    fn col_sum(&self, col: I, p: T) -> T {
        match (self.sums.col(col, p), self.basis.as_ref()) {
            (Some(s), _) => s,
            (None, Some(basis)) => {
                (0..self.size).fold(T::zero(), |acc, i| acc + basis[(i, col)].abs().powf(p))
            }
            (None, None) => T::zero(),
        }
    }
}
