use faer::Col;
use problemo::Problem;

use crate::{ElementType, I};

use super::{Prox, ProxError, Proxes, step_at};

/// Moreau conjugation of an inner prox.
///
/// Realizes `prox_{s f*}(v) = v - s * prox_{f / s}(v / s)`: the inner prox
/// is evaluated with the inverted step on the scaled argument, then folded
/// back. The algebra holds per coordinate, so diagonal steps pass straight
/// through. Wrapping twice recovers the inner operator up to roundoff.
pub struct MoreauProx<T: ElementType> {
    inner: Box<Proxes<T>>,
    scratch_arg: Col<T>,
    scratch_res: Col<T>,
}

impl<T: ElementType> MoreauProx<T> {
    pub fn new(inner: Box<Proxes<T>>) -> Self {
        Self {
            inner,
            scratch_arg: Col::zeros(0),
            scratch_res: Col::zeros(0),
        }
    }

    /// Unwraps the conjugation, returning the inner prox.
    pub fn into_inner(self) -> Proxes<T> {
        *self.inner
    }
}

impl<T: ElementType> Prox<T> for MoreauProx<T> {
    fn idx(&self) -> I {
        self.inner.idx()
    }

    fn size(&self) -> I {
        self.inner.size()
    }

    fn diagsteps(&self) -> bool {
        self.inner.diagsteps()
    }

    fn init(&mut self, dim: I) -> Result<(), Problem> {
        self.inner.init(dim)?;
        self.scratch_arg = Col::zeros(dim);
        self.scratch_res = Col::zeros(dim);
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
        if self.scratch_arg.nrows() != arg.nrows() {
            return Err(ProxError::Uninitialized.into());
        }
        let diag = self.inner.diagsteps();
        let (idx, size) = (self.idx(), self.size());

        for k in idx..idx + size {
            let s = step_at(tau, tau_diag, diag, invert_tau, k);
            self.scratch_arg[k] = arg[k] / s;
        }
        self.inner
            .eval(&mut self.scratch_res, &self.scratch_arg, tau_diag, tau, !invert_tau)?;
        for k in idx..idx + size {
            let s = step_at(tau, tau_diag, diag, invert_tau, k);
            result[k] = arg[k] - s * self.scratch_res[k];
        }
        Ok(())
    }
}

/// Evaluates the inner prox through a permuted view of its range.
///
/// `perm` maps local positions to local positions: position `k` of the
/// inner evaluation reads coordinate `idx + perm[k]` of the argument, and
/// the result scatters back through the same map. Per-coordinate step sizes
/// travel with their coordinates.
pub struct PermuteProx<T: ElementType> {
    inner: Box<Proxes<T>>,
    perm: Vec<I>,
    scratch_arg: Col<T>,
    scratch_res: Col<T>,
    scratch_tau: Col<T>,
}

impl<T: ElementType> PermuteProx<T> {
    pub fn new(inner: Box<Proxes<T>>, perm: Vec<I>) -> Self {
        Self {
            inner,
            perm,
            scratch_arg: Col::zeros(0),
            scratch_res: Col::zeros(0),
            scratch_tau: Col::zeros(0),
        }
    }
}

impl<T: ElementType> Prox<T> for PermuteProx<T> {
    fn idx(&self) -> I {
        self.inner.idx()
    }

    fn size(&self) -> I {
        self.inner.size()
    }

    fn diagsteps(&self) -> bool {
        self.inner.diagsteps()
    }

    fn init(&mut self, dim: I) -> Result<(), Problem> {
        self.inner.init(dim)?;

        if self.perm.len() != self.size() {
            return Err(ProxError::ShapeMismatch.into());
        }
        let mut seen = vec![false; self.size()];
        for &p in &self.perm {
            if p >= self.size() || seen[p] {
                return Err(ProxError::InvalidParameter.into());
            }
            seen[p] = true;
        }

        self.scratch_arg = Col::zeros(dim);
        self.scratch_res = Col::zeros(dim);
        self.scratch_tau = Col::ones(dim);
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
        if self.scratch_arg.nrows() != arg.nrows() {
            return Err(ProxError::Uninitialized.into());
        }
        let idx = self.idx();

        for (k, &p) in self.perm.iter().enumerate() {
            self.scratch_arg[idx + k] = arg[idx + p];
            self.scratch_tau[idx + k] = tau_diag[idx + p];
        }
        self.inner.eval(
            &mut self.scratch_res,
            &self.scratch_arg,
            &self.scratch_tau,
            tau,
            invert_tau,
        )?;
        for (k, &p) in self.perm.iter().enumerate() {
            result[idx + p] = self.scratch_res[idx + k];
        }
        Ok(())
    }
}

/// Affine transformation of an inner prox: evaluates the prox of
/// `c * f(a*x + b) + d*x + (e/2) x^2` given the prox of `f`.
///
/// From the optimality condition, with `y = a*x + b`:
/// `y = prox_{s~ f}(v~)`, `s~ = s*c*a^2 / (1 + s*e)`,
/// `v~ = a*(v - s*d)/(1 + s*e) + b`, and `x = (y - b)/a`. When the inner
/// prox honors diagonal steps the transformed step is forwarded per
/// coordinate; otherwise the scalar step is transformed once.
pub struct TransformProx<T: ElementType> {
    inner: Box<Proxes<T>>,
    a: T,
    b: T,
    c: T,
    d: T,
    e: T,
    scratch_arg: Col<T>,
    scratch_res: Col<T>,
    scratch_tau: Col<T>,
}

impl<T: ElementType> TransformProx<T> {
    pub fn new(inner: Box<Proxes<T>>, a: T, b: T, c: T, d: T, e: T) -> Self {
        Self {
            inner,
            a,
            b,
            c,
            d,
            e,
            scratch_arg: Col::zeros(0),
            scratch_res: Col::zeros(0),
            scratch_tau: Col::zeros(0),
        }
    }

    fn transform(&self, v: T, s: T) -> (T, T) {
        let denom = T::one() + s * self.e;
        let vt = self.a * (v - s * self.d) / denom + self.b;
        let st = s * self.c * self.a * self.a / denom;
        (vt, st)
    }
}

impl<T: ElementType> Prox<T> for TransformProx<T> {
    fn idx(&self) -> I {
        self.inner.idx()
    }

    fn size(&self) -> I {
        self.inner.size()
    }

    fn diagsteps(&self) -> bool {
        self.inner.diagsteps()
    }

    fn init(&mut self, dim: I) -> Result<(), Problem> {
        if self.a == T::zero() || self.c <= T::zero() {
            return Err(ProxError::InvalidParameter.into());
        }
        self.inner.init(dim)?;
        self.scratch_arg = Col::zeros(dim);
        self.scratch_res = Col::zeros(dim);
        self.scratch_tau = Col::ones(dim);
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
        if self.scratch_arg.nrows() != arg.nrows() {
            return Err(ProxError::Uninitialized.into());
        }
        let (idx, size) = (self.idx(), self.size());

        if self.inner.diagsteps() {
            for k in idx..idx + size {
                let s = step_at(tau, tau_diag, true, invert_tau, k);
                let (vt, st) = self.transform(arg[k], s);
                self.scratch_arg[k] = vt;
                self.scratch_tau[k] = st;
            }
            self.inner.eval(
                &mut self.scratch_res,
                &self.scratch_arg,
                &self.scratch_tau,
                T::one(),
                false,
            )?;
        } else {
            let s = if invert_tau { T::one() / tau } else { tau };
            let mut st = T::zero();
            for k in idx..idx + size {
                let (vt, stk) = self.transform(arg[k], s);
                self.scratch_arg[k] = vt;
                st = stk;
            }
            self.inner
                .eval(&mut self.scratch_res, &self.scratch_arg, tau_diag, st, false)?;
        }

        for k in idx..idx + size {
            result[k] = (self.scratch_res[k] - self.b) / self.a;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;
    use crate::prox::elemwise::{Coefficients, PointwiseProx, ScalarFn};

    fn boxed(fun: ScalarFn<E>, size: I) -> Box<Proxes<E>> {
        Box::new(PointwiseProx::new(0, size, fun, Coefficients::identity()).into())
    }

    fn eval(prox: &mut Proxes<E>, arg: &[E], tau: E) -> Vec<E> {
        let n = arg.len();
        let arg = Col::from_fn(n, |i| arg[i]);
        let ones = Col::<E>::ones(n);
        let mut result = Col::<E>::zeros(n);
        prox.init(n).unwrap();
        prox.eval(&mut result, &arg, &ones, tau, false).unwrap();
        (0..n).map(|i| result[i]).collect()
    }

    #[rstest::rstest]
    fn test_moreau_of_weighted_abs_clips(#[values(0.25, 1.0, 1.3)] tau: E) {
        // The conjugate of 0.5*|x| is the indicator of [-0.5, 0.5]; its prox
        // clips to that interval regardless of the step size.
        let co = Coefficients {
            c: crate::prox::CoeffVec::Uniform(0.5),
            ..Coefficients::identity()
        };
        let inner: Proxes<E> = PointwiseProx::new(0, 3, ScalarFn::Abs, co).into();
        let mut prox: Proxes<E> = MoreauProx::new(Box::new(inner)).into();
        let out = eval(&mut prox, &[-1.0, 0.2, 0.7], tau);
        assert!((out[0] + 0.5).abs() < 1e-12);
        assert!((out[1] - 0.2).abs() < 1e-12);
        assert!((out[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_double_moreau_is_identity() {
        let mut plain: Proxes<E> = PointwiseProx::new(0, 4, ScalarFn::Square, Coefficients::identity()).into();
        let mut double: Proxes<E> =
            MoreauProx::new(Box::new(MoreauProx::new(boxed(ScalarFn::Square, 4)).into())).into();

        let arg = [-2.0, -0.3, 0.4, 1.8];
        for &tau in &[0.2, 1.0, 7.5] {
            let a = eval(&mut plain, &arg, tau);
            let b = eval(&mut double, &arg, tau);
            for (x, y) in a.iter().zip(&b) {
                assert!((x - y).abs() < (1e-12f64).sqrt(), "{} vs {}", x, y);
            }
        }
    }

    #[test]
    fn test_moreau_identity_vector() {
        // v = prox_{tau f}(v) + tau * prox_{f*/tau}(v/tau), with the
        // conjugate prox realized by the wrapper.
        let arg = [-1.2, 0.0, 0.3, 2.4];
        let tau = 0.7;

        let mut plain: Proxes<E> = PointwiseProx::new(0, 4, ScalarFn::Huber { alpha: 0.4 }, Coefficients::identity()).into();
        let p = eval(&mut plain, &arg, tau);

        let mut conj: Proxes<E> = MoreauProx::new(boxed(ScalarFn::Huber { alpha: 0.4 }, 4)).into();
        let scaled: Vec<E> = arg.iter().map(|v| v / tau).collect();
        let q = eval(&mut conj, &scaled, 1.0 / tau);

        for k in 0..4 {
            assert!((p[k] + tau * q[k] - arg[k]).abs() < (1e-12f64).sqrt());
        }
    }

    #[test]
    fn test_permute_reverses() {
        // Reversal around an asymmetric prox must act on the permuted coords.
        let perm = vec![2, 1, 0];
        let mut prox: Proxes<E> = PermuteProx::new(boxed(ScalarFn::IndGeq0, 3), perm).into();
        let out = eval(&mut prox, &[-1.0, 2.0, -3.0], 1.0);
        assert_eq!(out, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_permute_rejects_non_bijection() {
        let mut prox: Proxes<E> = PermuteProx::new(boxed(ScalarFn::Zero, 3), vec![0, 0, 2]).into();
        assert!(prox.init(3).is_err());
    }

    #[test]
    fn test_transform_matches_pointwise_coefficients() {
        // The wrapper algebra and the per-coordinate packing must agree.
        let (a, b, c, d, e) = (2.0, -0.5, 1.5, 0.3, 0.8);
        let co = Coefficients {
            a: crate::prox::CoeffVec::Uniform(a),
            b: crate::prox::CoeffVec::Uniform(b),
            c: crate::prox::CoeffVec::Uniform(c),
            d: crate::prox::CoeffVec::Uniform(d),
            e: crate::prox::CoeffVec::Uniform(e),
        };
        let mut packed: Proxes<E> = PointwiseProx::new(0, 3, ScalarFn::Abs, co).into();
        let mut wrapped: Proxes<E> =
            TransformProx::new(boxed(ScalarFn::Abs, 3), a, b, c, d, e).into();

        let arg = [-1.1, 0.4, 2.2];
        for &tau in &[0.1, 1.0, 3.0] {
            let x = eval(&mut packed, &arg, tau);
            let y = eval(&mut wrapped, &arg, tau);
            for (p, q) in x.iter().zip(&y) {
                assert!((p - q).abs() < 1e-12);
            }
        }
    }
}
