use faer::{Col, Mat};
use problemo::Problem;
use problemo::common::IntoCommonProblem;

use crate::{ElementType, I};

use super::elemwise::{Coefficients, ScalarFn, prox_1d};
use super::{Prox, step_at};
use super::ProxError;

/// Spectral prox over small matrices.
///
/// The range splits into groups of `m * n` entries, each read as a
/// column-major `m x n` matrix. The scalar function is applied to the
/// singular values, so `f = Abs` yields the nuclear-norm prox (singular
/// value soft thresholding) and the indicator functions project the
/// spectrum. One step size per group, taken at its first coordinate.
pub struct SingularValueProx<T: ElementType> {
    idx: I,
    size: I,
    m: I,
    n: I,
    fun: ScalarFn<T>,
    coeffs: Coefficients<T>,
    scratch: Mat<T>,
}

impl<T: ElementType> SingularValueProx<T> {
    pub fn new(idx: I, size: I, m: I, n: I, fun: ScalarFn<T>, coeffs: Coefficients<T>) -> Self {
        Self {
            idx,
            size,
            m,
            n,
            fun,
            coeffs,
            scratch: Mat::zeros(0, 0),
        }
    }
}

impl<T: ElementType> Prox<T> for SingularValueProx<T> {
    fn idx(&self) -> I {
        self.idx
    }

    fn size(&self) -> I {
        self.size
    }

    fn diagsteps(&self) -> bool {
        true
    }

    fn init(&mut self, dim: I) -> Result<(), Problem> {
        if self.idx + self.size > dim {
            return Err(ProxError::RangeOutOfBounds.into());
        }
        let group = self.m * self.n;
        if group == 0 || self.size % group != 0 {
            return Err(ProxError::ShapeMismatch.into());
        }
        if !self.coeffs.len_ok(self.size / group) {
            return Err(ProxError::ShapeMismatch.into());
        }
        self.scratch = Mat::zeros(self.m, self.n);
        Ok(())
    }

    fn eval(
        &mut self,
        result: &mut Col<T>,
        arg: &Col<T>,
        tau_diag: &Col<T>,
        tau: T,
        invert_tau: bool,
    ) -> Result<(), Problem> {
        let group = self.m * self.n;
        let rank = self.m.min(self.n);
        for g in 0..self.size / group {
            let begin = self.idx + g * group;
            let s = step_at(tau, tau_diag, true, invert_tau, begin);

            for j in 0..self.n {
                for i in 0..self.m {
                    self.scratch[(i, j)] = arg[begin + i + self.m * j];
                }
            }

            let svd = self
                .scratch
                .svd()
                .map_err(|_| format!("{}", ProxError::Numeric).gloss())?;
            let (u, v) = (svd.U(), svd.V());
            let sv = svd.S().column_vector().to_owned();

            for j in 0..self.n {
                for i in 0..self.m {
                    let mut acc = T::zero();
                    for r in 0..rank {
                        let shrunk = prox_1d(&self.fun, self.coeffs.at(g), sv[r], s);
                        acc = acc + u[(i, r)] * shrunk * v[(j, r)];
                    }
                    result[begin + i + self.m * j] = acc;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;

    fn eval(prox: &mut SingularValueProx<E>, arg: &[E], tau: E) -> Vec<E> {
        let n = arg.len();
        let arg = Col::from_fn(n, |i| arg[i]);
        let ones = Col::<E>::ones(n);
        let mut result = Col::<E>::zeros(n);
        prox.init(n).unwrap();
        prox.eval(&mut result, &arg, &ones, tau, false).unwrap();
        (0..n).map(|i| result[i]).collect()
    }

    #[test]
    fn test_diagonal_matrix_thresholds() {
        // diag(3, 1) under nuclear-norm prox with threshold 2 -> diag(1, 0)
        let mut prox =
            SingularValueProx::new(0, 4, 2, 2, ScalarFn::Abs, Coefficients::identity());
        let out = eval(&mut prox, &[3.0, 0.0, 0.0, 1.0], 2.0);
        assert!((out[0] - 1.0).abs() < 1e-10);
        assert!(out[1].abs() < 1e-10 && out[2].abs() < 1e-10 && out[3].abs() < 1e-10);
    }

    #[test]
    fn test_zero_function_is_identity() {
        let mut prox =
            SingularValueProx::new(0, 4, 2, 2, ScalarFn::Zero, Coefficients::identity());
        let data = [0.6, -1.2, 0.4, 2.0];
        let out = eval(&mut prox, &data, 0.7);
        for (a, b) in out.iter().zip(&data) {
            assert!((a - b).abs() < 1e-10);
        }
    }
}
