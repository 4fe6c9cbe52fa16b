use faer::Col;
use problemo::Problem;

use crate::linalg::vector_ops;
use crate::{ElementType, I};

use super::elemwise::{Coefficients, ScalarFn, prox_1d};
use super::{Prox, ProxError, step_at};

/// Grouped Euclidean prox: the variable splits into contiguous groups of
/// fixed length and the scalar function acts on each group's norm,
/// `F(x) = c*f(a*||x|| + b) + d*||x|| + (e/2)*||x||^2`.
///
/// The prox of a radial function rescales the group toward the origin:
/// `x* = (prox_{s f}(r) / r) * v` with `r = ||v||`. A zero-norm group maps
/// to zero. The step size of a group is taken at its first coordinate.
pub struct Norm2Prox<T: ElementType> {
    idx: I,
    size: I,
    group_dim: I,
    fun: ScalarFn<T>,
    coeffs: Coefficients<T>,
}

impl<T: ElementType> Norm2Prox<T> {
    pub fn new(idx: I, size: I, group_dim: I, fun: ScalarFn<T>, coeffs: Coefficients<T>) -> Self {
        Self { idx, size, group_dim, fun, coeffs }
    }
}

impl<T: ElementType> Prox<T> for Norm2Prox<T> {
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
        if self.group_dim == 0 || self.size % self.group_dim != 0 {
            return Err(ProxError::ShapeMismatch.into());
        }
        if !self.coeffs.len_ok(self.size / self.group_dim) {
            return Err(ProxError::ShapeMismatch.into());
        }
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
        let ngroups = self.size / self.group_dim;
        for g in 0..ngroups {
            let begin = self.idx + g * self.group_dim;
            let end = begin + self.group_dim;
            let s = step_at(tau, tau_diag, true, invert_tau, begin);

            let r = vector_ops::norm_l2_range(arg.as_ref(), begin, end);
            let factor = if r > T::zero() {
                prox_1d(&self.fun, self.coeffs.at(g), r, s) / r
            } else {
                T::zero()
            };
            for k in begin..end {
                result[k] = factor * arg[k];
            }
        }
        Ok(())
    }
}
