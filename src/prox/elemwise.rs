use faer::Col;
use problemo::Problem;

use crate::{ElementType, I};

use super::{Prox, ProxError, step_at};

/// Scalar functions admitting a closed-form proximal map. Each variant
/// implements `prox_{s f}(v) = argmin_x f(x) + (1/2s)(x - v)^2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarFn<T> {
    /// `f = 0`
    Zero,
    /// `f(x) = |x|`
    Abs,
    /// `f(x) = x^2 / 2`
    Square,
    /// Huber function: quadratic within `|x| <= alpha`, linear outside.
    Huber { alpha: T },
    /// Counting penalty `f(x) = [x != 0]`; hard thresholding.
    L0,
    /// Indicator of `x <= 0`
    IndLeq0,
    /// Indicator of `x >= 0`
    IndGeq0,
    /// Indicator of `x == 0`
    IndEq0,
    /// Indicator of `0 <= x <= 1`
    IndBox01,
    /// `f(x) = max(x, 0)`
    MaxPos0,
}

impl<T: ElementType> ScalarFn<T> {
    pub(crate) fn prox(&self, v: T, s: T) -> T {
        match *self {
            ScalarFn::Zero => v,
            ScalarFn::Abs => {
                if v > s {
                    v - s
                } else if v < -s {
                    v + s
                } else {
                    T::zero()
                }
            }
            ScalarFn::Square => v / (T::one() + s),
            ScalarFn::Huber { alpha } => {
                if v.abs() <= alpha + s {
                    v * alpha / (alpha + s)
                } else {
                    v - s * v.signum()
                }
            }
            ScalarFn::L0 => {
                if v * v > s + s {
                    v
                } else {
                    T::zero()
                }
            }
            ScalarFn::IndLeq0 => T::min(v, T::zero()),
            ScalarFn::IndGeq0 => T::max(v, T::zero()),
            ScalarFn::IndEq0 => T::zero(),
            ScalarFn::IndBox01 => T::min(T::max(v, T::zero()), T::one()),
            ScalarFn::MaxPos0 => {
                if v < T::zero() {
                    v
                } else if v > s {
                    v - s
                } else {
                    T::zero()
                }
            }
        }
    }

}

/// A coefficient stored once per range or once per coordinate.
#[derive(Debug, Clone)]
pub enum CoeffVec<T> {
    Uniform(T),
    PerCoord(Col<T>),
}

impl<T: ElementType> CoeffVec<T> {
    pub(crate) fn at(&self, k: I) -> T {
        match self {
            CoeffVec::Uniform(v) => *v,
            CoeffVec::PerCoord(col) => col[k],
        }
    }

    pub(crate) fn len_ok(&self, n: I) -> bool {
        match self {
            CoeffVec::Uniform(_) => true,
            CoeffVec::PerCoord(col) => col.nrows() == n,
        }
    }
}

/// Coefficients of the generalized scalar objective
/// `c * f(a*x + b) + d*x + (e/2) * x^2`.
#[derive(Debug, Clone)]
pub struct Coefficients<T> {
    pub a: CoeffVec<T>,
    pub b: CoeffVec<T>,
    pub c: CoeffVec<T>,
    pub d: CoeffVec<T>,
    pub e: CoeffVec<T>,
}

impl<T: ElementType> Coefficients<T> {
    /// The identity transform: `f` itself.
    pub fn identity() -> Self {
        Self {
            a: CoeffVec::Uniform(T::one()),
            b: CoeffVec::Uniform(T::zero()),
            c: CoeffVec::Uniform(T::one()),
            d: CoeffVec::Uniform(T::zero()),
            e: CoeffVec::Uniform(T::zero()),
        }
    }

    pub(crate) fn len_ok(&self, n: I) -> bool {
        self.a.len_ok(n) && self.b.len_ok(n) && self.c.len_ok(n) && self.d.len_ok(n) && self.e.len_ok(n)
    }

    pub(crate) fn at(&self, k: I) -> (T, T, T, T, T) {
        (self.a.at(k), self.b.at(k), self.c.at(k), self.d.at(k), self.e.at(k))
    }
}

/// Reduction of the generalized objective to the plain prox of `f`.
///
/// Substituting `y = a*x + b` into the optimality condition gives
/// `y = prox_{s~ f}(v~)` with `s~ = s*c*a^2 / (1 + s*e)` and
/// `v~ = a*(v - s*d) / (1 + s*e) + b`, from which `x = (y - b)/a`.
/// Degenerate transforms (`a = 0` or `c = 0`) drop the `f` term and leave
/// the quadratic tilt `(v - s*d)/(1 + s*e)`.
pub(crate) fn prox_1d<T: ElementType>(fun: &ScalarFn<T>, co: (T, T, T, T, T), v: T, s: T) -> T {
    let (a, b, c, d, e) = co;
    let denom = T::one() + s * e;
    let tilt = (v - s * d) / denom;
    if a == T::zero() || c == T::zero() {
        return tilt;
    }
    let vt = a * tilt + b;
    let st = s * c * a * a / denom;
    (fun.prox(vt, st) - b) / a
}

/// Separable prox applied coordinate by coordinate over its range.
pub struct PointwiseProx<T: ElementType> {
    idx: I,
    size: I,
    fun: ScalarFn<T>,
    coeffs: Coefficients<T>,
}

impl<T: ElementType> PointwiseProx<T> {
    pub fn new(idx: I, size: I, fun: ScalarFn<T>, coeffs: Coefficients<T>) -> Self {
        Self { idx, size, fun, coeffs }
    }
}

impl<T: ElementType> Prox<T> for PointwiseProx<T> {
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
        if !self.coeffs.len_ok(self.size) {
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
        for k in 0..self.size {
            let g = self.idx + k;
            let s = step_at(tau, tau_diag, true, invert_tau, g);
            result[g] = prox_1d(&self.fun, self.coeffs.at(k), arg[g], s);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;
    use rstest::rstest;

    fn eval_plain(prox: &mut PointwiseProx<E>, arg: &[E], tau: E) -> Vec<E> {
        let n = arg.len();
        let arg = Col::from_fn(n, |i| arg[i]);
        let ones = Col::<E>::ones(n);
        let mut result = Col::<E>::zeros(n);
        prox.init(n).unwrap();
        prox.eval(&mut result, &arg, &ones, tau, false).unwrap();
        (0..n).map(|i| result[i]).collect()
    }

    #[test]
    fn test_square_shrinks() {
        // prox of x^2/2 with tau = 1 is v / 2
        let mut prox = PointwiseProx::new(0, 3, ScalarFn::Square, Coefficients::identity());
        assert_eq!(eval_plain(&mut prox, &[1.0, 2.0, 3.0], 1.0), vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_box_projection() {
        let mut prox = PointwiseProx::new(0, 3, ScalarFn::IndBox01, Coefficients::identity());
        assert_eq!(eval_plain(&mut prox, &[-0.3, 0.5, 1.7], 1.0), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_soft_threshold() {
        let mut prox = PointwiseProx::new(0, 3, ScalarFn::Abs, Coefficients::identity());
        assert_eq!(eval_plain(&mut prox, &[-1.0, 0.2, 0.7], 0.5), vec![-0.5, 0.0, 0.2]);
    }

    #[rstest]
    fn test_indicator_fixed_point(
        #[values(ScalarFn::IndLeq0, ScalarFn::IndGeq0, ScalarFn::IndEq0, ScalarFn::IndBox01)]
        fun: ScalarFn<E>,
    ) {
        // Projections are idempotent.
        let arg = [-1.4, -0.2, 0.3, 0.8, 2.5];
        let mut prox = PointwiseProx::new(0, 5, fun, Coefficients::identity());
        let once = eval_plain(&mut prox, &arg, 0.7);
        let twice = eval_plain(&mut prox, &once, 0.7);
        assert_eq!(once, twice);
    }

    #[rstest]
    fn test_conjugate_via_moreau_closed_forms(#[values(0.25, 1.0, 4.0)] tau: E) {
        // v - tau * prox_{f/tau}(v/tau) is prox_{tau f*}(v). For f = |x| the
        // conjugate is the indicator of [-1, 1], for f = max(x, 0) the
        // indicator of [0, 1]; both prox to a clamp independent of tau.
        for &v in &[-2.0, -0.6, 0.0, 0.4, 1.3, 5.0] {
            let abs: ScalarFn<E> = ScalarFn::Abs;
            let conj = v - tau * abs.prox(v / tau, 1.0 / tau);
            assert!((conj - v.clamp(-1.0, 1.0)).abs() < 1e-12, "abs, v {} tau {}", v, tau);

            let pos: ScalarFn<E> = ScalarFn::MaxPos0;
            let conj = v - tau * pos.prox(v / tau, 1.0 / tau);
            assert!((conj - v.clamp(0.0, 1.0)).abs() < 1e-12, "maxpos, v {} tau {}", v, tau);
        }
    }

    #[test]
    fn test_affine_coefficients() {
        // prox of c*f(a x) for f = x^2/2 equals v / (1 + s c a^2)
        let co = Coefficients {
            a: CoeffVec::Uniform(2.0),
            b: CoeffVec::Uniform(0.0),
            c: CoeffVec::Uniform(3.0),
            d: CoeffVec::Uniform(0.0),
            e: CoeffVec::Uniform(0.0),
        };
        let mut prox = PointwiseProx::new(0, 1, ScalarFn::Square, co);
        let out = eval_plain(&mut prox, &[1.0], 0.5);
        assert!((out[0] - 1.0 / (1.0 + 0.5 * 3.0 * 4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_linear_tilt() {
        // d shifts the argument: prox of f + d*x at v equals prox of f at v - s*d
        let co = Coefficients {
            d: CoeffVec::Uniform(2.0),
            ..Coefficients::identity()
        };
        let mut tilted = PointwiseProx::new(0, 1, ScalarFn::Abs, co);
        let mut plain = PointwiseProx::new(0, 1, ScalarFn::Abs, Coefficients::identity());
        assert_eq!(eval_plain(&mut tilted, &[1.7], 0.25), eval_plain(&mut plain, &[1.2], 0.25));
    }

    #[test]
    fn test_extreme_steps_stable() {
        let mut prox = PointwiseProx::new(0, 2, ScalarFn::Abs, Coefficients::identity());
        let tiny = eval_plain(&mut prox, &[0.5, -0.5], 1e-300);
        assert!((tiny[0] - 0.5).abs() < 1e-12 && (tiny[1] + 0.5).abs() < 1e-12);
        let huge = eval_plain(&mut prox, &[0.5, -0.5], 1e300);
        assert_eq!(huge, vec![0.0, 0.0]);
    }
}
