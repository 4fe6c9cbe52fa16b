use faer::Col;
use problemo::Problem;

use crate::{ElementType, I};

use super::{Prox, ProxError, step_at};

/// Prox of a quadratic with diagonal Hessian,
/// `f(x) = (1/2) <x, Q x> + <b, x>` with `Q = diag(q)`:
/// `x*_k = (v_k - s_k b_k) / (1 + s_k q_k)`.
pub struct QuadraticProx<T: ElementType> {
    idx: I,
    size: I,
    q: Col<T>,
    b: Col<T>,
}

impl<T: ElementType> QuadraticProx<T> {
    pub fn new(idx: I, size: I, q: Col<T>, b: Col<T>) -> Self {
        Self { idx, size, q, b }
    }
}

impl<T: ElementType> Prox<T> for QuadraticProx<T> {
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
        if self.q.nrows() != self.size || self.b.nrows() != self.size {
            return Err(ProxError::ShapeMismatch.into());
        }
        // Convexity requires a nonnegative diagonal.
        for k in 0..self.size {
            if self.q[k] < T::zero() {
                return Err(ProxError::InvalidParameter.into());
            }
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
        for k in 0..self.size {
            let g = self.idx + k;
            let s = step_at(tau, tau_diag, true, invert_tau, g);
            result[g] = (arg[g] - s * self.b[k]) / (T::one() + s * self.q[k]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;

    #[test]
    fn test_matches_closed_form() {
        let q = Col::from_fn(3, |i| i as E);
        let b = Col::from_fn(3, |_| 1.0);
        let mut prox = QuadraticProx::new(0, 3, q, b);
        prox.init(3).unwrap();

        let arg = Col::from_fn(3, |i| i as E + 1.0);
        let ones = Col::<E>::ones(3);
        let mut result = Col::<E>::zeros(3);
        prox.eval(&mut result, &arg, &ones, 0.5, false).unwrap();

        for k in 0..3 {
            let expected = (arg[k] - 0.5) / (1.0 + 0.5 * k as E);
            assert!((result[k] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_concave_diagonal() {
        let mut prox = QuadraticProx::<E>::new(0, 1, Col::from_fn(1, |_| -1.0), Col::zeros(1));
        assert!(prox.init(1).is_err());
    }
}
