//! Iteration engines driving the saddle-point problem toward a fixed point.

pub mod pdhg;
pub mod stepsize;

use derive_more::{Display, Error};
use faer::Col;
use problemo::Problem;

use crate::ElementType;
use crate::problem::SaddlePointProblem;

pub use pdhg::{PdhgBackend, PdhgConfig};
pub use stepsize::{AdaptRule, StepSizeRule, Steps};

#[derive(Debug, Display, Error, PartialEq)]
pub enum BackendError {
    #[display("Backend used before initialization")]
    Uninitialized,

    #[display("Warm-start iterate has the wrong length")]
    ShapeMismatch,

    #[display("Non-finite residual; the iteration diverged")]
    NonFiniteResidual,
}

/// Primal and dual residual norms with their tolerances.
#[derive(Debug, Clone, Copy, Default)]
pub struct Residuals<T> {
    pub primal: T,
    pub dual: T,
    pub eps_primal: T,
    pub eps_dual: T,
}

impl<T: ElementType> Residuals<T> {
    pub fn converged(&self) -> bool {
        self.primal <= self.eps_primal && self.dual <= self.eps_dual
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.primal.is_finite() && self.dual.is_finite()
    }
}

/// The observable quantities of the current iterate.
pub struct CurrentSolution<'a, T: ElementType> {
    pub x: &'a Col<T>,
    pub kx: &'a Col<T>,
    pub y: &'a Col<T>,
    pub kty: &'a Col<T>,
}

/// An iterative scheme over a [`SaddlePointProblem`].
pub trait Backend<T: ElementType> {
    /// Allocates iterate storage and primes `K x` and `K^T y`. The problem
    /// must already be initialized.
    fn init(&mut self, problem: &SaddlePointProblem<T>) -> Result<(), Problem>;

    /// Performs one iteration.
    fn iterate(&mut self, problem: &mut SaddlePointProblem<T>) -> Result<(), Problem>;

    /// Residuals of the most recent iteration.
    fn residuals(&self) -> &Residuals<T>;

    /// Current `(x, Kx, y, K^T y)`.
    fn solution(&self) -> CurrentSolution<'_, T>;

    /// Releases iterate storage.
    fn release(&mut self);
}
