//! The saddle-point problem
//!
//! ```text
//!   min_x max_y  <K x, y> + G(x) - F*(y)
//! ```
//!
//! owning the composite operator `K` and the prox lists of `G` and `F*`,
//! together with the diagonal step-size preconditioners derived from the
//! absolute row and column sums of `K`.

use derive_more::{Display, Error};
use faer::Col;
use problemo::Problem;

use crate::linalg::vector_ops;
use crate::linop::LinearOperator;
use crate::prox::{Prox, Proxes, eval_list, validate_partition};
use crate::{ElementType, I};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ProblemError {
    #[display("Problem already initialized")]
    AlreadyInitialized,

    #[display("Problem used before initialization")]
    Uninitialized,

    #[display("Preconditioner exponent outside [0, 2]")]
    InvalidAlpha,
}

/// Diagonal preconditioner selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precond {
    /// Identity diagonals; scalar steps are derived from `||K||`.
    Off,
    /// Pock-Chambolle alpha preconditioner,
    /// `tau_c = 1 / sum_r |K_rc|^(2-alpha)`, `sigma_r = 1 / sum_c |K_rc|^alpha`.
    #[default]
    Alpha,
}

pub struct SaddlePointProblem<T: ElementType> {
    linop: LinearOperator<T>,
    prox_g: Vec<Proxes<T>>,
    prox_fstar: Vec<Proxes<T>>,

    precond: Precond,
    alpha: T,

    /// Per-coordinate primal steps, length `primal_dim`.
    tau: Col<T>,
    /// Per-coordinate dual steps, length `dual_dim`.
    sigma: Col<T>,
    /// Estimated `||K||_2`, used when preconditioning is off.
    normest: T,

    dualized: bool,
    initialized: bool,
}

impl<T: ElementType> SaddlePointProblem<T> {
    pub fn new(
        linop: LinearOperator<T>,
        prox_g: Vec<Proxes<T>>,
        prox_fstar: Vec<Proxes<T>>,
    ) -> Self {
        Self {
            linop,
            prox_g,
            prox_fstar,
            precond: Precond::default(),
            alpha: T::one(),
            tau: Col::zeros(0),
            sigma: Col::zeros(0),
            normest: T::one(),
            dualized: false,
            initialized: false,
        }
    }

    pub fn with_precond(mut self, precond: Precond, alpha: T) -> Self {
        self.precond = precond;
        self.alpha = alpha;
        self
    }

    /// Length of the primal variable in the current orientation.
    pub fn primal_dim(&self) -> I {
        if self.dualized { self.linop.nrows() } else { self.linop.ncols() }
    }

    /// Length of the dual variable in the current orientation.
    pub fn dual_dim(&self) -> I {
        if self.dualized { self.linop.ncols() } else { self.linop.nrows() }
    }

    pub fn is_dualized(&self) -> bool {
        self.dualized
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn tau(&self) -> &Col<T> {
        &self.tau
    }

    pub fn sigma(&self) -> &Col<T> {
        &self.sigma
    }

    pub fn normest(&self) -> T {
        self.normest
    }

    pub fn precond(&self) -> Precond {
        self.precond
    }

    /// Initializes the operator, validates the prox partitions, and derives
    /// the diagonal preconditioners.
    pub fn init(&mut self) -> Result<(), Problem> {
        if self.initialized {
            return Err(ProblemError::AlreadyInitialized.into());
        }
        if self.alpha < T::zero() || self.alpha > crate::cast(2.0) {
            return Err(ProblemError::InvalidAlpha.into());
        }

        let two = crate::cast::<T>(2.0);
        let powers = match self.precond {
            Precond::Alpha => vec![T::one(), two - self.alpha, self.alpha],
            Precond::Off => vec![T::one()],
        };
        self.linop.init(&powers)?;

        let (nrows, ncols) = (self.linop.nrows(), self.linop.ncols());
        validate_partition(&self.prox_g, ncols)?;
        validate_partition(&self.prox_fstar, nrows)?;
        for p in &mut self.prox_g {
            p.init(ncols)?;
        }
        for p in &mut self.prox_fstar {
            p.init(nrows)?;
        }

        match self.precond {
            Precond::Alpha => {
                // Zero rows and columns get a unit step instead of an
                // infinite one.
                self.tau = Col::from_fn(ncols, |c| {
                    let s = self.linop.col_sum(c, two - self.alpha);
                    if s > T::zero() { T::one() / s } else { T::one() }
                });
                self.sigma = Col::from_fn(nrows, |r| {
                    let s = self.linop.row_sum(r, self.alpha);
                    if s > T::zero() { T::one() / s } else { T::one() }
                });
            }
            Precond::Off => {
                self.tau = Col::ones(ncols);
                self.sigma = Col::ones(nrows);
                self.normest = self.linop.normest()?;
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Exchanges the roles of `G` and `F*`, of `K` and `-K^T`, and of the
    /// primal and dual preconditioners. Involutive.
    pub fn dualize(&mut self) -> Result<(), Problem> {
        if !self.initialized {
            return Err(ProblemError::Uninitialized.into());
        }
        std::mem::swap(&mut self.prox_g, &mut self.prox_fstar);
        std::mem::swap(&mut self.tau, &mut self.sigma);
        self.dualized = !self.dualized;
        Ok(())
    }

    /// Applies the operator of the current orientation: `K x`, or `-K^T x`
    /// after dualization.
    pub fn apply(&self, out: &mut Col<T>, x: &Col<T>) -> Result<(), Problem> {
        if self.dualized {
            self.linop.eval_adjoint(out, x)?;
            vector_ops::scale(out.as_mut(), -T::one());
        } else {
            self.linop.eval(out, x)?;
        }
        Ok(())
    }

    /// Applies the adjoint of the current orientation.
    pub fn apply_adjoint(&self, out: &mut Col<T>, y: &Col<T>) -> Result<(), Problem> {
        if self.dualized {
            self.linop.eval(out, y)?;
            vector_ops::scale(out.as_mut(), -T::one());
        } else {
            self.linop.eval_adjoint(out, y)?;
        }
        Ok(())
    }

    /// `result <- prox of the primal function` on the full primal vector.
    pub fn prox_primal(
        &mut self,
        result: &mut Col<T>,
        arg: &Col<T>,
        tau: T,
        invert_tau: bool,
    ) -> Result<(), Problem> {
        if !self.initialized {
            return Err(ProblemError::Uninitialized.into());
        }
        let diag = &self.tau;
        eval_list(&mut self.prox_g, result, arg, diag, tau, invert_tau)
    }

    /// `result <- prox of the dual function` on the full dual vector.
    pub fn prox_dual(
        &mut self,
        result: &mut Col<T>,
        arg: &Col<T>,
        sigma: T,
        invert_sigma: bool,
    ) -> Result<(), Problem> {
        if !self.initialized {
            return Err(ProblemError::Uninitialized.into());
        }
        let diag = &self.sigma;
        eval_list(&mut self.prox_fstar, result, arg, diag, sigma, invert_sigma)
    }

    /// Releases operator and prox storage.
    pub fn release(&mut self) {
        self.linop.release();
        self.prox_g = Vec::new();
        self.prox_fstar = Vec::new();
        self.tau = Col::zeros(0);
        self.sigma = Col::zeros(0);
        self.initialized = false;
        self.dualized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;
    use crate::linop::gradient::{GradKind, GradientBlock};
    use crate::prox::{Coefficients, PointwiseProx, ScalarFn};

    fn gradient_1d(n: I) -> SaddlePointProblem<E> {
        let mut linop = LinearOperator::new();
        linop
            .add_block(GradientBlock::new(0, 0, n, 1, 1, GradKind::Forward).into())
            .unwrap();
        let prox_g: Vec<crate::prox::Proxes<E>> =
            vec![PointwiseProx::new(0, n, ScalarFn::Zero, Coefficients::identity()).into()];
        let prox_fstar: Vec<crate::prox::Proxes<E>> =
            vec![PointwiseProx::new(0, n, ScalarFn::Zero, Coefficients::identity()).into()];
        SaddlePointProblem::new(linop, prox_g, prox_fstar)
    }

    #[test]
    fn test_preconditioner_diagonals_1d_gradient() {
        // For the forward-difference gradient on n = 10 with alpha = 1 the
        // interior steps are 1/2 and the boundary steps 1 (the empty last
        // row and the singly-touched first and last columns).
        let mut problem = gradient_1d(10).with_precond(Precond::Alpha, 1.0);
        problem.init().unwrap();

        let tau = problem.tau();
        assert!((tau[0] - 1.0).abs() < 1e-12);
        for c in 1..9 {
            assert!((tau[c] - 0.5).abs() < 1e-12, "col {}", c);
        }
        assert!((tau[9] - 1.0).abs() < 1e-12);

        let sigma = problem.sigma();
        for r in 0..9 {
            assert!((sigma[r] - 0.5).abs() < 1e-12, "row {}", r);
        }
        assert!((sigma[9] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dualize_swaps_and_negates() {
        let mut problem = gradient_1d(4);
        problem.init().unwrap();
        problem.dualize().unwrap();

        assert!(problem.is_dualized());
        assert_eq!(problem.primal_dim(), 4);
        assert_eq!(problem.dual_dim(), 4);

        // Operator acts as -K^T after dualization.
        let y = Col::from_fn(4, |i| i as E);
        let mut out = Col::<E>::zeros(4);
        problem.apply(&mut out, &y).unwrap();

        let mut kty = Col::<E>::zeros(4);
        let mut fresh = gradient_1d(4);
        fresh.init().unwrap();
        fresh.apply_adjoint(&mut kty, &y).unwrap();
        for k in 0..4 {
            assert!((out[k] + kty[k]).abs() < 1e-12);
        }

        // Dualizing twice restores the original orientation.
        problem.dualize().unwrap();
        assert!(!problem.is_dualized());
    }

    #[test]
    fn test_rejects_bad_partition() {
        let mut linop = LinearOperator::<E>::new();
        linop
            .add_block(GradientBlock::new(0, 0, 4, 1, 1, GradKind::Forward).into())
            .unwrap();
        let prox_g: Vec<crate::prox::Proxes<E>> =
            vec![PointwiseProx::new(0, 3, ScalarFn::Zero, Coefficients::identity()).into()];
        let prox_fstar: Vec<crate::prox::Proxes<E>> =
            vec![PointwiseProx::new(0, 4, ScalarFn::Zero, Coefficients::identity()).into()];
        let mut problem = SaddlePointProblem::new(linop, prox_g, prox_fstar);
        assert!(problem.init().is_err());
    }

    #[test]
    fn test_rejects_alpha_out_of_range() {
        let mut problem = gradient_1d(4).with_precond(Precond::Alpha, 2.5);
        assert!(problem.init().is_err());
    }
}
