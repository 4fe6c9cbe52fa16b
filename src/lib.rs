use faer::traits::RealField;
use faer::traits::num_traits::Float;

/// Scalar type of the solver stack. Implemented by `f32` and `f64`.
pub trait ElementType: RealField + Float + Default + Send + Sync + 'static {}
impl<T> ElementType for T where T: RealField + Float + Default + Send + Sync + 'static {}

pub trait IndexType: Copy + PartialEq + Eq + Ord + faer::Index {}
impl<T> IndexType for T where T: Copy + PartialEq + Eq + Ord + faer::Index {}

pub type E = f64;
pub type I = usize;

pub mod backend;
pub mod callback;
pub mod interface;
pub mod linalg;
pub mod linop;
pub mod problem;
pub mod prox;
pub mod solver;
pub mod terminators;

#[cfg(test)]
pub mod tests;

/// Casts an `f64` constant into the active scalar type.
///
/// Conversions between the supported float widths never fail.
pub(crate) fn cast<T: ElementType>(v: f64) -> T {
    T::from(v).expect("float-to-float conversion")
}

/// Status codes for optimization solvers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    #[default]
    /// The solver is still running.
    InProgress,
    /// The iterates satisfied the residual tolerances.
    Optimal,
    /// The solver stopped due to an iteration limit.
    IterationLimit,
    /// The solver was interrupted (by the user, a signal, or a callback).
    Interrupted,
    /// The status is unknown or not determined.
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let txt = match self {
            Status::InProgress => "in progress",
            Status::Optimal => "converged",
            Status::IterationLimit => "stopped: maximum iterations reached",
            Status::Interrupted => "stopped: interrupted",
            Status::Unknown => "unknown",
        };
        write!(f, "{}", txt)
    }
}

/// Hooks consulted by the solver once per iteration.
pub struct SolverHooks<T: ElementType> {
    pub callback: Box<dyn crate::callback::Callback<T>>,
    pub terminator: Box<dyn crate::terminators::Terminator>,
}

impl<T: ElementType> SolverHooks<T> {
    /// Hooks that never print and never stop the solver.
    pub fn none() -> Self {
        Self {
            callback: Box::new(crate::callback::NoOpCallback {}),
            terminator: Box::new(crate::terminators::NoOpTerminator {}),
        }
    }
}
