use faer::Col;
use problemo::Problem;

use crate::{ElementType, I};

use super::{Prox, ProxError};

/// Exact projection onto the probability simplex `{x >= 0, sum(x) = 1}`,
/// applied per contiguous group.
///
/// Uses the sort-and-threshold construction: with the group sorted in
/// decreasing order, the largest `k` such that
/// `u_k + (1 - sum_{i<=k} u_i) / k > 0` determines the shift, and the
/// projection is `max(v + shift, 0)`. As an indicator prox it ignores the
/// step size entirely.
pub struct SimplexProx<T: ElementType> {
    idx: I,
    size: I,
    group_dim: I,
    scratch: Vec<T>,
}

impl<T: ElementType> SimplexProx<T> {
    pub fn new(idx: I, size: I, group_dim: I) -> Self {
        Self {
            idx,
            size,
            group_dim,
            scratch: Vec::new(),
        }
    }
}

impl<T: ElementType> Prox<T> for SimplexProx<T> {
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
        self.scratch.resize(self.group_dim, T::zero());
        Ok(())
    }

    fn eval(
        &mut self,
        result: &mut Col<T>,
        arg: &Col<T>,
        _tau_diag: &Col<T>,
        _tau: T,
        _invert_tau: bool,
    ) -> Result<(), Problem> {
        let ngroups = self.size / self.group_dim;
        for g in 0..ngroups {
            let begin = self.idx + g * self.group_dim;

            for k in 0..self.group_dim {
                self.scratch[k] = arg[begin + k];
            }
            self.scratch
                .sort_unstable_by(|x, y| y.partial_cmp(x).unwrap_or(std::cmp::Ordering::Equal));

            let mut cumsum = T::zero();
            let mut shift = T::zero();
            for k in 0..self.group_dim {
                cumsum = cumsum + self.scratch[k];
                let candidate = (T::one() - cumsum) / crate::cast::<T>(k as f64 + 1.0);
                if self.scratch[k] + candidate > T::zero() {
                    shift = candidate;
                }
            }

            for k in 0..self.group_dim {
                result[begin + k] = T::max(arg[begin + k] + shift, T::zero());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;

    fn project(arg: &[E]) -> Vec<E> {
        let n = arg.len();
        let mut prox = SimplexProx::new(0, n, n);
        let arg = Col::from_fn(n, |i| arg[i]);
        let ones = Col::<E>::ones(n);
        let mut result = Col::<E>::zeros(n);
        prox.init(n).unwrap();
        prox.eval(&mut result, &arg, &ones, 1.0, false).unwrap();
        (0..n).map(|i| result[i]).collect()
    }

    #[test]
    fn test_interior_point_shifted() {
        let out = project(&[0.2, 0.2, 0.2]);
        for v in &out {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_vertex() {
        let out = project(&[5.0, 0.0, -1.0]);
        assert_eq!(out, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_feasibility() {
        let out = project(&[0.9, -0.4, 0.7, 0.1]);
        let sum: E = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(out.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_idempotent() {
        let once = project(&[0.9, -0.4, 0.7, 0.1]);
        let twice = project(&once);
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
