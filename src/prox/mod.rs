//! Proximal operators over disjoint slices of the primal or dual variable.
//!
//! Every prox owns a contiguous index range `[idx, idx + size)` and mutates
//! only that slice of the result vector. The set of proxes attached to one
//! side of the problem must partition its variable exactly. The effective
//! step size of coordinate `k` is `tau * tau_diag[k]` when the prox honors
//! diagonal steps and `tau` otherwise, inverted when `invert_tau` is set.

pub mod elemwise;
pub mod norm2;
pub mod quadratic;
pub mod simplex;
pub mod svd;
pub mod wrappers;

use derive_more::{Display, Error};
use enum_dispatch::enum_dispatch;
use faer::Col;
use problemo::Problem;

use crate::{ElementType, I};

pub use elemwise::{CoeffVec, Coefficients, PointwiseProx, ScalarFn};
pub use norm2::Norm2Prox;
pub use quadratic::QuadraticProx;
pub use simplex::SimplexProx;
pub use svd::SingularValueProx;
pub use wrappers::{MoreauProx, PermuteProx, TransformProx};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ProxError {
    #[display("Prox evaluated before initialization")]
    Uninitialized,

    #[display("Prox range exceeds the variable dimension")]
    RangeOutOfBounds,

    #[display("Prox ranges do not partition the variable")]
    InvalidPartition,

    #[display("Dimension mismatch between prox parameters and range")]
    ShapeMismatch,

    #[display("Invalid prox parameter")]
    InvalidParameter,

    #[display("Numerical failure in prox evaluation")]
    Numeric,
}

/// A proximal operator `(I + s df)^{-1}` restricted to one slice.
#[enum_dispatch]
pub trait Prox<T: ElementType> {
    /// First coordinate of the owned range.
    fn idx(&self) -> I;

    /// Length of the owned range.
    fn size(&self) -> I;

    /// Whether per-coordinate step sizes are honored.
    fn diagsteps(&self) -> bool;

    /// Validates parameters against the full variable length `dim` and
    /// allocates evaluation scratch.
    fn init(&mut self, dim: I) -> Result<(), Problem>;

    /// Writes `(I + s df)^{-1}(arg)` into `result` on the owned slice,
    /// leaving all other coordinates of `result` untouched.
    fn eval(
        &mut self,
        result: &mut Col<T>,
        arg: &Col<T>,
        tau_diag: &Col<T>,
        tau: T,
        invert_tau: bool,
    ) -> Result<(), Problem>;
}

/// The closed catalog of prox kinds.
#[enum_dispatch(Prox<T>)]
pub enum Proxes<T: ElementType> {
    Pointwise(PointwiseProx<T>),
    Norm2(Norm2Prox<T>),
    Simplex(SimplexProx<T>),
    Quadratic(QuadraticProx<T>),
    SingularValue(SingularValueProx<T>),
    Moreau(MoreauProx<T>),
    Permute(PermuteProx<T>),
    Transform(TransformProx<T>),
}

/// Effective step size of coordinate `k`.
pub(crate) fn step_at<T: ElementType>(
    tau: T,
    tau_diag: &Col<T>,
    diagsteps: bool,
    invert: bool,
    k: I,
) -> T {
    let s = tau * if diagsteps { tau_diag[k] } else { T::one() };
    if invert { T::one() / s } else { s }
}

/// Checks that the prox ranges cover `[0, dim)` without gaps or overlaps.
pub fn validate_partition<T: ElementType>(proxes: &[Proxes<T>], dim: I) -> Result<(), Problem> {
    let mut ranges: Vec<(I, I)> = proxes.iter().map(|p| (p.idx(), p.size())).collect();
    ranges.sort_unstable();

    let mut pos = 0;
    for (idx, size) in ranges {
        if idx != pos {
            return Err(ProxError::InvalidPartition.into());
        }
        pos = idx + size;
    }
    if pos != dim {
        return Err(ProxError::InvalidPartition.into());
    }
    Ok(())
}

/// Evaluates a prox list over the full vector.
pub(crate) fn eval_list<T: ElementType>(
    proxes: &mut [Proxes<T>],
    result: &mut Col<T>,
    arg: &Col<T>,
    tau_diag: &Col<T>,
    tau: T,
    invert_tau: bool,
) -> Result<(), Problem> {
    for prox in proxes.iter_mut() {
        prox.eval(result, arg, tau_diag, tau, invert_tau)?;
    }
    Ok(())
}
