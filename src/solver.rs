use problemo::Problem;
use problemo::common::IntoCommonProblem;
use serde::Deserialize;

use crate::backend::{AdaptRule, Backend, PdhgConfig, StepSizeRule};
use crate::linalg::vector_ops;
use crate::problem::{Precond, SaddlePointProblem};
use crate::{ElementType, I, SolverHooks, Status, cast};

/// Host-facing solver options. All numeric values are 64-bit on this side
/// of the boundary and cast to the active scalar type when the backend
/// configuration is built. Unknown dictionary keys are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Iteration cap.
    pub max_iters: usize,
    /// Number of intermediate callback invocations, spaced linearly over
    /// the iteration range; fewer than two disables the schedule.
    pub num_cback_calls: usize,
    pub tol_abs: f64,
    pub tol_rel: f64,
    /// Print one residual line per callback iteration.
    pub verbose: bool,
    /// Solve the dualized problem and swap the reported iterates back.
    pub solve_dual_problem: bool,
    pub precond: PrecondOpt,
    /// Exponent of the alpha preconditioner, in `[0, 2]`.
    pub precond_alpha: f64,
    pub stepsize: StepsizeOpt,
    pub adapt: AdaptOpt,
    /// Strong-convexity modulus for the `alg2` rule.
    pub gamma: f64,
    /// Backtracking parameters for the `goldstein` rule.
    pub bt_alpha: f64,
    pub bt_eta: f64,
    pub bt_delta: f64,
    pub bt_max_retries: usize,
    /// Residual-balancing parameters.
    pub balance_every: usize,
    pub balance_ratio: f64,
    pub balance_decay: f64,
    pub balance_limit: f64,
    /// Warm-start iterates.
    pub x0: Option<Vec<f64>>,
    pub y0: Option<Vec<f64>>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            num_cback_calls: 10,
            tol_abs: 1e-4,
            tol_rel: 1e-4,
            verbose: false,
            solve_dual_problem: false,
            precond: PrecondOpt::Alpha,
            precond_alpha: 1.0,
            stepsize: StepsizeOpt::Pdhg,
            adapt: AdaptOpt::Off,
            gamma: 0.0,
            bt_alpha: 0.95,
            bt_eta: 0.7,
            bt_delta: 1.02,
            bt_max_retries: 10,
            balance_every: 10,
            balance_ratio: 2.0,
            balance_decay: 0.95,
            balance_limit: 100.0,
            x0: None,
            y0: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecondOpt {
    Off,
    Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepsizeOpt {
    Pdhg,
    Alg2,
    Goldstein,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptOpt {
    Off,
    Balance,
}

impl SolverOptions {
    pub fn precond<T: ElementType>(&self) -> (Precond, T) {
        let kind = match self.precond {
            PrecondOpt::Off => Precond::Off,
            PrecondOpt::Alpha => Precond::Alpha,
        };
        (kind, cast(self.precond_alpha))
    }

    pub fn pdhg_config<T: ElementType>(&self) -> PdhgConfig<T> {
        PdhgConfig {
            tol_abs: cast(self.tol_abs),
            tol_rel: cast(self.tol_rel),
            stepsize: match self.stepsize {
                StepsizeOpt::Pdhg => StepSizeRule::Pdhg,
                StepsizeOpt::Alg2 => StepSizeRule::Alg2 { gamma: cast(self.gamma) },
                StepsizeOpt::Goldstein => StepSizeRule::Goldstein {
                    alpha: cast(self.bt_alpha),
                    eta: cast(self.bt_eta),
                    delta: cast(self.bt_delta),
                    max_retries: self.bt_max_retries,
                },
            },
            adapt: match self.adapt {
                AdaptOpt::Off => AdaptRule::Off,
                AdaptOpt::Balance => AdaptRule::Balance {
                    every: self.balance_every,
                    ratio: cast(self.balance_ratio),
                    decay: cast(self.balance_decay),
                    limit: cast(self.balance_limit),
                },
            },
            x0: self.x0.as_ref().map(|v| vector_ops::from_host(v)),
            y0: self.y0.as_ref().map(|v| vector_ops::from_host(v)),
        }
    }
}

/// Orchestrates a backend over a problem: initialization, the iteration
/// loop, the callback schedule, and termination.
pub struct PrimalDualSolver<T: ElementType, B: Backend<T>> {
    problem: SaddlePointProblem<T>,
    backend: B,
    options: SolverOptions,
}

impl<T: ElementType, B: Backend<T>> PrimalDualSolver<T, B> {
    pub fn new(problem: SaddlePointProblem<T>, backend: B, options: SolverOptions) -> Self {
        Self { problem, backend, options }
    }

    pub fn problem(&self) -> &SaddlePointProblem<T> {
        &self.problem
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs the solve loop until convergence, interruption, or the
    /// iteration cap.
    pub fn solve(&mut self, hooks: &mut SolverHooks<T>) -> Result<Status, Problem> {
        if !self.problem.is_initialized() {
            self.problem
                .init()
                .map_err(|e| format!("Failed to initialize the problem. Reason: {}", e).gloss())?;
        }
        if self.options.solve_dual_problem && !self.problem.is_dualized() {
            self.problem.dualize()?;
        }
        self.backend
            .init(&self.problem)
            .map_err(|e| format!("Failed to initialize the backend. Reason: {}", e).gloss())?;

        let max_iters = self.options.max_iters.max(1);
        let schedule = callback_schedule(self.options.num_cback_calls, max_iters);

        hooks.callback.init();
        hooks.terminator.initialize();

        let mut status = Status::IterationLimit;
        for iter in 0..max_iters {
            self.backend.iterate(&mut self.problem)?;

            let residuals = *self.backend.residuals();
            let converged = residuals.converged();
            let mut stop = hooks.terminator.terminate();
            let last = iter + 1 == max_iters;

            if converged || stop.is_some() || last || schedule.binary_search(&iter).is_ok() {
                let solution = self.backend.solution();
                let (x, y) = if self.problem.is_dualized() {
                    (solution.y, solution.x)
                } else {
                    (solution.x, solution.y)
                };
                if hooks.callback.call(iter + 1, x, y, &residuals) {
                    stop = Some(Status::Interrupted);
                }
            }

            if converged {
                status = Status::Optimal;
                break;
            }
            if let Some(s) = stop {
                status = s;
                break;
            }
        }

        // Hand the problem back in its native orientation.
        if self.options.solve_dual_problem && self.problem.is_dualized() {
            self.problem.dualize()?;
        }
        Ok(status)
    }

    /// Returns the device memory of the problem and backend.
    pub fn release(&mut self) {
        self.backend.release();
        self.problem.release();
    }
}

/// Iterations at which the intermediate callback fires: `n` points spaced
/// linearly over `[0, max_iters - 1]`, disabled below two points.
fn callback_schedule(n: usize, max_iters: usize) -> Vec<I> {
    if n < 2 || max_iters < 2 {
        return Vec::new();
    }
    let mut points: Vec<I> = (0..n).map(|k| k * (max_iters - 1) / (n - 1)).collect();
    points.dedup();
    points
}
