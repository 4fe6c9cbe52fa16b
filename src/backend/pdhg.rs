use faer::{Col, unzip, zip};
use problemo::Problem;
use problemo::common::IntoCommonProblem;

use crate::linalg::vector_ops;
use crate::problem::{Precond, SaddlePointProblem};
use crate::{ElementType, cast};

use super::stepsize::{AdaptRule, StepSizeRule, Steps};
use super::{Backend, BackendError, CurrentSolution, Residuals};

/// Configuration of the primal-dual backend.
#[derive(Clone)]
pub struct PdhgConfig<T: ElementType> {
    pub tol_abs: T,
    pub tol_rel: T,
    pub stepsize: StepSizeRule<T>,
    pub adapt: AdaptRule<T>,
    /// Warm-start iterates; zeros when absent.
    pub x0: Option<Col<T>>,
    pub y0: Option<Col<T>>,
}

impl<T: ElementType> Default for PdhgConfig<T> {
    fn default() -> Self {
        Self {
            tol_abs: cast(1e-4),
            tol_rel: cast(1e-4),
            stepsize: StepSizeRule::default(),
            adapt: AdaptRule::default(),
            x0: None,
            y0: None,
        }
    }
}

/// Preconditioned primal-dual hybrid gradient iteration:
///
/// ```text
///   x+  = prox_{tau G} ( x - tau (.) K^T y )
///   xb  = x+ + theta (x+ - x)
///   y+  = prox_{sigma F*} ( y + sigma (.) K xb )
/// ```
///
/// One forward and one adjoint application per iteration: `K xb` is formed
/// by linear extrapolation of the cached `K x`. The residuals
///
/// ```text
///   primal = || dx / tau - K^T dy ||_1
///   dual   = || dy / sigma - K dx ||_1
/// ```
///
/// are compared against `tol_abs * sqrt(dim) + tol_rel * ||iterate||`.
pub struct PdhgBackend<T: ElementType> {
    cfg: PdhgConfig<T>,

    x: Col<T>,
    y: Col<T>,
    x_prev: Col<T>,
    y_prev: Col<T>,
    kx: Col<T>,
    kx_prev: Col<T>,
    kty: Col<T>,
    kty_prev: Col<T>,
    arg_x: Col<T>,
    arg_y: Col<T>,

    steps: Steps<T>,
    balance_weight: T,
    residuals: Residuals<T>,
    iteration: usize,
    initialized: bool,
}

impl<T: ElementType> PdhgBackend<T> {
    pub fn new(cfg: PdhgConfig<T>) -> Self {
        Self {
            cfg,
            x: Col::zeros(0),
            y: Col::zeros(0),
            x_prev: Col::zeros(0),
            y_prev: Col::zeros(0),
            kx: Col::zeros(0),
            kx_prev: Col::zeros(0),
            kty: Col::zeros(0),
            kty_prev: Col::zeros(0),
            arg_x: Col::zeros(0),
            arg_y: Col::zeros(0),
            steps: Steps { tau: T::one(), sigma: T::one(), theta: T::one() },
            balance_weight: cast(0.5),
            residuals: Residuals::default(),
            iteration: 0,
            initialized: false,
        }
    }

    pub fn steps(&self) -> &Steps<T> {
        &self.steps
    }

    fn compute_residuals(&mut self, problem: &SaddlePointProblem<T>) {
        let (tau, sigma) = (self.steps.tau, self.steps.sigma);
        let tau_diag = problem.tau();
        let sigma_diag = problem.sigma();

        let mut primal = T::zero();
        zip!(&self.x_prev, &self.x, tau_diag, &self.kty_prev, &self.kty).for_each(
            |unzip!(xp, x, d, ktyp, kty)| {
                primal = primal + ((*xp - *x) / (tau * *d) - (*ktyp - *kty)).abs();
            },
        );

        let mut dual = T::zero();
        zip!(&self.y_prev, &self.y, sigma_diag, &self.kx_prev, &self.kx).for_each(
            |unzip!(yp, y, d, kxp, kx)| {
                dual = dual + ((*yp - *y) / (sigma * *d) - (*kxp - *kx)).abs();
            },
        );

        let n = cast::<T>(self.x.nrows() as f64).sqrt();
        let m = cast::<T>(self.y.nrows() as f64).sqrt();
        self.residuals = Residuals {
            primal,
            dual,
            eps_primal: self.cfg.tol_abs * n + self.cfg.tol_rel * vector_ops::norm_l2(self.x.as_ref()),
            eps_dual: self.cfg.tol_abs * m + self.cfg.tol_rel * vector_ops::norm_l2(self.y.as_ref()),
        };
    }
}

impl<T: ElementType> Backend<T> for PdhgBackend<T> {
    fn init(&mut self, problem: &SaddlePointProblem<T>) -> Result<(), Problem> {
        let (n, m) = (problem.primal_dim(), problem.dual_dim());

        self.x = match self.cfg.x0.take() {
            Some(x0) if x0.nrows() == n => x0,
            Some(_) => return Err(BackendError::ShapeMismatch.into()),
            None => Col::zeros(n),
        };
        self.y = match self.cfg.y0.take() {
            Some(y0) if y0.nrows() == m => y0,
            Some(_) => return Err(BackendError::ShapeMismatch.into()),
            None => Col::zeros(m),
        };

        self.x_prev = Col::zeros(n);
        self.y_prev = Col::zeros(m);
        self.kx = Col::zeros(m);
        self.kx_prev = Col::zeros(m);
        self.kty = Col::zeros(n);
        self.kty_prev = Col::zeros(n);
        self.arg_x = Col::zeros(n);
        self.arg_y = Col::zeros(m);

        problem.apply(&mut self.kx, &self.x)?;
        problem.apply_adjoint(&mut self.kty, &self.y)?;

        // Unpreconditioned steps satisfy tau sigma ||K||^2 <= 1; with the
        // alpha preconditioner the diagonals already carry the scaling.
        self.steps.theta = T::one();
        match problem.precond() {
            Precond::Off => {
                let nrm = problem.normest();
                let s = if nrm > T::zero() { T::one() / nrm } else { T::one() };
                self.steps.tau = s;
                self.steps.sigma = s;
            }
            Precond::Alpha => {
                self.steps.tau = T::one();
                self.steps.sigma = T::one();
            }
        }

        self.balance_weight = cast(0.5);
        self.iteration = 0;
        self.residuals = Residuals::default();
        self.initialized = true;
        Ok(())
    }

    fn iterate(&mut self, problem: &mut SaddlePointProblem<T>) -> Result<(), Problem> {
        if !self.initialized {
            return Err(BackendError::Uninitialized.into());
        }
        self.iteration += 1;

        vector_ops::copy_into(self.x_prev.as_mut(), self.x.as_ref());
        vector_ops::copy_into(self.y_prev.as_mut(), self.y.as_ref());
        vector_ops::copy_into(self.kx_prev.as_mut(), self.kx.as_ref());
        vector_ops::copy_into(self.kty_prev.as_mut(), self.kty.as_ref());

        let mut retries = self.cfg.stepsize.max_retries();
        let (k_dx_sq, dx_sq, dy_sq) = loop {
            let Steps { tau, sigma, theta } = self.steps;

            // x+ = prox_{tau G}(x - tau (.) K^T y)
            zip!(self.arg_x.as_mut(), &self.x_prev, problem.tau(), &self.kty_prev).for_each(
                |unzip!(arg, x, d, kty)| *arg = *x - tau * *d * *kty,
            );
            problem.prox_primal(&mut self.x, &self.arg_x, tau, false)?;
            problem.apply(&mut self.kx, &self.x)?;

            // y+ = prox_{sigma F*}(y + sigma (.) K (x+ + theta (x+ - x)))
            zip!(self.arg_y.as_mut(), &self.y_prev, problem.sigma(), &self.kx, &self.kx_prev)
                .for_each(|unzip!(arg, y, d, kx, kxp)| {
                    let extrapolated = (T::one() + theta) * *kx - theta * *kxp;
                    *arg = *y + sigma * *d * extrapolated;
                });
            problem.prox_dual(&mut self.y, &self.arg_y, sigma, false)?;
            problem.apply_adjoint(&mut self.kty, &self.y)?;

            let mut k_dx_sq = T::zero();
            zip!(&self.kx, &self.kx_prev).for_each(|unzip!(a, b)| {
                k_dx_sq = k_dx_sq + (*a - *b) * (*a - *b);
            });
            let mut dx_sq = T::zero();
            zip!(&self.x, &self.x_prev).for_each(|unzip!(a, b)| {
                dx_sq = dx_sq + (*a - *b) * (*a - *b);
            });
            let mut dy_sq = T::zero();
            zip!(&self.y, &self.y_prev).for_each(|unzip!(a, b)| {
                dy_sq = dy_sq + (*a - *b) * (*a - *b);
            });

            if self.cfg.stepsize.accepts(&self.steps, k_dx_sq, dx_sq, dy_sq) || retries == 0 {
                break (k_dx_sq, dx_sq, dy_sq);
            }
            retries -= 1;
            self.cfg.stepsize.backtrack(&mut self.steps);
        };

        self.compute_residuals(problem);
        if !self.residuals.is_finite() {
            return Err(format!(
                "{} (primal {:e}, dual {:e} at iteration {})",
                BackendError::NonFiniteResidual,
                self.residuals.primal.to_f64().unwrap_or(f64::NAN),
                self.residuals.dual.to_f64().unwrap_or(f64::NAN),
                self.iteration
            )
            .gloss());
        }

        self.cfg.stepsize.advance(&mut self.steps, k_dx_sq, dx_sq, dy_sq);
        self.cfg.adapt.rebalance(
            &mut self.steps,
            &mut self.balance_weight,
            self.iteration,
            self.residuals.primal,
            self.residuals.dual,
        );
        Ok(())
    }

    fn residuals(&self) -> &Residuals<T> {
        &self.residuals
    }

    fn solution(&self) -> CurrentSolution<'_, T> {
        CurrentSolution {
            x: &self.x,
            kx: &self.kx,
            y: &self.y,
            kty: &self.kty,
        }
    }

    fn release(&mut self) {
        self.x = Col::zeros(0);
        self.y = Col::zeros(0);
        self.x_prev = Col::zeros(0);
        self.y_prev = Col::zeros(0);
        self.kx = Col::zeros(0);
        self.kx_prev = Col::zeros(0);
        self.kty = Col::zeros(0);
        self.kty_prev = Col::zeros(0);
        self.arg_x = Col::zeros(0);
        self.arg_y = Col::zeros(0);
        self.initialized = false;
    }
}
