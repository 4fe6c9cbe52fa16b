use std::time::Instant;

use faer::Col;
use problemo::{Problem, ProblemResult};
use serde_json::Value;

use crate::backend::{Backend, PdhgBackend};
use crate::callback::{ConvergenceOutput, MultiCallback};
use crate::linalg::vector_ops::{from_host, to_host};
use crate::linop::dct::{DctBlock, TransformKind};
use crate::linop::dense::DenseBlock;
use crate::linop::diagonal::{DiagonalBlock, ScaledIdentityBlock, ZeroBlock};
use crate::linop::gradient::{DatatermBlock, GradKind, GradientBlock};
use crate::linop::sparse::SparseBlock;
use crate::linop::{Blocks, LinearOperator};
use crate::problem::SaddlePointProblem;
use crate::prox::{
    CoeffVec, Coefficients, MoreauProx, Norm2Prox, PermuteProx, PointwiseProx, Prox, Proxes,
    QuadraticProx, ScalarFn, SimplexProx, SingularValueProx, TransformProx,
};
use crate::solver::{PrimalDualSolver, SolverOptions};
use crate::{ElementType, I, SolverHooks, Status, cast};

use super::ConfigError;
use super::desc::{
    BackendDesc, BlockDesc, CoeffsDesc, FunDesc, ProblemDesc, ProxDesc, ScalarOrVec,
};

fn parse<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, Problem> {
    serde_json::from_value(value.clone()).via(ConfigError::Malformed)
}

fn coeff_vec<T: ElementType>(desc: &Option<ScalarOrVec>, default: f64) -> CoeffVec<T> {
    match desc {
        None => CoeffVec::Uniform(cast(default)),
        Some(ScalarOrVec::Scalar(v)) => CoeffVec::Uniform(cast(*v)),
        Some(ScalarOrVec::Vector(v)) => CoeffVec::PerCoord(from_host(v)),
    }
}

fn coefficients<T: ElementType>(desc: &CoeffsDesc) -> Coefficients<T> {
    Coefficients {
        a: coeff_vec(&desc.a, 1.0),
        b: coeff_vec(&desc.b, 0.0),
        c: coeff_vec(&desc.c, 1.0),
        d: coeff_vec(&desc.d, 0.0),
        e: coeff_vec(&desc.e, 0.0),
    }
}

fn scalar_fn<T: ElementType>(desc: &FunDesc) -> ScalarFn<T> {
    match desc {
        FunDesc::Zero => ScalarFn::Zero,
        FunDesc::Abs => ScalarFn::Abs,
        FunDesc::Square => ScalarFn::Square,
        FunDesc::Huber { alpha } => ScalarFn::Huber { alpha: cast(*alpha) },
        FunDesc::L0 => ScalarFn::L0,
        FunDesc::IndLeq0 => ScalarFn::IndLeq0,
        FunDesc::IndGeq0 => ScalarFn::IndGeq0,
        FunDesc::IndEq0 => ScalarFn::IndEq0,
        FunDesc::IndBox01 => ScalarFn::IndBox01,
        FunDesc::MaxPos0 => ScalarFn::MaxPos0,
    }
}

/// Builds one block from its description.
pub fn build_block<T: ElementType>(desc: &BlockDesc) -> Result<Blocks<T>, Problem> {
    Ok(match desc {
        BlockDesc::Sparse { row, col, nrows, ncols, rows, cols, vals } => {
            if rows.len() != vals.len() || cols.len() != vals.len() {
                return Err(ConfigError::BadArrayLength.into());
            }
            let entries = rows
                .iter()
                .zip(cols)
                .zip(vals)
                .map(|((&i, &j), &v)| (i, j, cast(v)))
                .collect();
            SparseBlock::new(*row, *col, *nrows, *ncols, entries).into()
        }
        BlockDesc::Dense { row, col, nrows, ncols, data } => {
            if data.len() != nrows * ncols {
                return Err(ConfigError::BadArrayLength.into());
            }
            let data: Vec<T> = data.iter().map(|&v| cast(v)).collect();
            DenseBlock::from_column_major(*row, *col, *nrows, *ncols, &data).into()
        }
        BlockDesc::Diagonal { row, col, diag } => {
            DiagonalBlock::new(*row, *col, from_host(diag)).into()
        }
        BlockDesc::Identity { row, col, size, factor } => {
            ScaledIdentityBlock::new(*row, *col, *size, cast(*factor)).into()
        }
        BlockDesc::Zero { row, col, nrows, ncols } => {
            ZeroBlock::new(*row, *col, *nrows, *ncols).into()
        }
        BlockDesc::Gradient2d { row, col, nx, ny, backward } => {
            let kind = if *backward { GradKind::Backward } else { GradKind::Forward };
            GradientBlock::new(*row, *col, *nx, *ny, 1, kind).into()
        }
        BlockDesc::Gradient3d { row, col, nx, ny, nz, backward } => {
            let kind = if *backward { GradKind::Backward } else { GradKind::Forward };
            GradientBlock::new(*row, *col, *nx, *ny, *nz, kind).into()
        }
        BlockDesc::Dct { row, col, size } => {
            DctBlock::new(*row, *col, *size, TransformKind::Dct2).into()
        }
        BlockDesc::Dst { row, col, size } => {
            DctBlock::new(*row, *col, *size, TransformKind::Dst1).into()
        }
        BlockDesc::Dataterm { row, col, nx, ny, weight } => {
            DatatermBlock::new(*row, *col, *nx, *ny, cast(*weight)).into()
        }
    })
}

/// Builds one prox from its description, recursing through wrappers.
pub fn build_prox<T: ElementType>(desc: &ProxDesc) -> Result<Proxes<T>, Problem> {
    Ok(match desc {
        ProxDesc::Elem { idx, size, fun, coeffs } => {
            PointwiseProx::new(*idx, *size, scalar_fn(fun), coefficients(coeffs)).into()
        }
        ProxDesc::Norm2 { idx, size, group_dim, fun, coeffs } => {
            Norm2Prox::new(*idx, *size, *group_dim, scalar_fn(fun), coefficients(coeffs)).into()
        }
        ProxDesc::IndSimplex { idx, size, group_dim } => {
            SimplexProx::new(*idx, *size, *group_dim).into()
        }
        ProxDesc::IndBall { idx, size, group_dim, radius } => {
            // The ball projection is the norm prox of the box indicator
            // scaled so that the feasible norms are [0, radius].
            if *radius <= 0.0 {
                return Err(ConfigError::Malformed.into());
            }
            let coeffs = Coefficients {
                a: CoeffVec::Uniform(cast(1.0 / radius)),
                ..Coefficients::identity()
            };
            Norm2Prox::new(*idx, *size, *group_dim, ScalarFn::IndBox01, coeffs).into()
        }
        ProxDesc::Quad { idx, size, q, b } => {
            QuadraticProx::new(*idx, *size, from_host(q), from_host(b)).into()
        }
        ProxDesc::SingularValue { idx, size, nrows, ncols, fun, coeffs } => {
            SingularValueProx::new(*idx, *size, *nrows, *ncols, scalar_fn(fun), coefficients(coeffs))
                .into()
        }
        ProxDesc::Moreau { inner } => MoreauProx::new(Box::new(build_prox(inner)?)).into(),
        ProxDesc::Permute { inner, perm } => {
            PermuteProx::new(Box::new(build_prox(inner)?), perm.clone()).into()
        }
        ProxDesc::Transform { inner, a, b, c, d, e } => TransformProx::new(
            Box::new(build_prox(inner)?),
            cast(*a),
            cast(*b),
            cast(*c),
            cast(*d),
            cast(*e),
        )
        .into(),
    })
}

/// Builds the saddle-point problem, checking the declared dimensions.
pub fn build_problem<T: ElementType>(
    desc: &ProblemDesc,
    nrows: I,
    ncols: I,
    options: &SolverOptions,
) -> Result<SaddlePointProblem<T>, Problem> {
    let mut linop = LinearOperator::new();
    for block in &desc.linop {
        linop.add_block(build_block(block)?)?;
    }
    if linop.nrows() != nrows || linop.ncols() != ncols {
        return Err(ConfigError::DimensionMismatch.into());
    }

    let prox_g = desc.prox_g.iter().map(build_prox).collect::<Result<Vec<_>, _>>()?;
    let prox_fstar = desc.prox_fstar.iter().map(build_prox).collect::<Result<Vec<_>, _>>()?;

    let (precond, alpha) = options.precond::<T>();
    Ok(SaddlePointProblem::new(linop, prox_g, prox_fstar).with_precond(precond, alpha))
}

/// Result of a full solve, on host memory.
pub struct SolveOutput {
    pub x: Vec<f64>,
    pub kx: Vec<f64>,
    pub y: Vec<f64>,
    pub kty: Vec<f64>,
    pub status: Status,
    pub message: String,
}

/// Interprets the dictionaries, runs the solver, and materializes
/// `(x, Kx, y, K^T y)` in the problem's native orientation.
pub fn solve_problem<T: ElementType>(
    problem_desc: &Value,
    nrows: I,
    ncols: I,
    backend_desc: &Value,
    options: &Value,
    hooks: &mut SolverHooks<T>,
) -> Result<SolveOutput, Problem> {
    let desc: ProblemDesc = parse(problem_desc)?;
    let backend: BackendDesc = parse(backend_desc)?;
    let options: SolverOptions = parse(options)?;

    let problem = build_problem::<T>(&desc, nrows, ncols, &options)?;
    let mut solver = match backend {
        BackendDesc::Pdhg => {
            PrimalDualSolver::new(problem, PdhgBackend::new(options.pdhg_config()), options.clone())
        }
    };

    if options.verbose {
        hooks.callback = Box::new(MultiCallback::new(vec![
            Box::new(ConvergenceOutput {}),
            hooks.callback.clone(),
        ]));
    }

    let status = solver.solve(hooks)?;

    let solution = solver.backend().solution();
    let problem = solver.problem();
    let (x, y) = if options.solve_dual_problem {
        (solution.y, solution.x)
    } else {
        (solution.x, solution.y)
    };
    let (kx, kty) = if options.solve_dual_problem {
        // The cached operator images belong to the dualized orientation;
        // refresh them against the restored problem.
        let mut kx = Col::<T>::zeros(problem.dual_dim());
        let mut kty = Col::<T>::zeros(problem.primal_dim());
        problem.apply(&mut kx, x)?;
        problem.apply_adjoint(&mut kty, y)?;
        (to_host(kx.as_ref()), to_host(kty.as_ref()))
    } else {
        (to_host(solution.kx.as_ref()), to_host(solution.kty.as_ref()))
    };

    Ok(SolveOutput {
        x: to_host(x.as_ref()),
        kx,
        y: to_host(y.as_ref()),
        kty,
        status,
        message: status.to_string(),
    })
}

/// Result of a one-shot operator application.
pub struct LinOpOutput {
    pub result: Vec<f64>,
    pub row_sums: Vec<f64>,
    pub col_sums: Vec<f64>,
    pub time_ms: f64,
}

/// Builds an operator from a block list, applies it to `rhs` (or its
/// adjoint when `transpose` is set), and reports the absolute row and
/// column sums.
pub fn eval_linop<T: ElementType>(
    block_list: &Value,
    rhs: &[f64],
    transpose: bool,
) -> Result<LinOpOutput, Problem> {
    let blocks: Vec<BlockDesc> = parse(block_list)?;
    let mut linop = LinearOperator::<T>::new();
    for block in &blocks {
        linop.add_block(build_block(block)?)?;
    }
    linop.init(&[T::one()])?;

    let (in_dim, out_dim) = if transpose {
        (linop.nrows(), linop.ncols())
    } else {
        (linop.ncols(), linop.nrows())
    };
    if rhs.len() != in_dim {
        return Err(ConfigError::BadArrayLength.into());
    }

    let arg: Col<T> = from_host(rhs);
    let mut out = Col::<T>::zeros(out_dim);
    let clock = Instant::now();
    if transpose {
        linop.eval_adjoint(&mut out, &arg)?;
    } else {
        linop.eval(&mut out, &arg)?;
    }
    let time_ms = clock.elapsed().as_secs_f64() * 1e3;

    let row_sums = (0..linop.nrows())
        .map(|r| linop.row_sum(r, T::one()).to_f64().unwrap_or(f64::NAN))
        .collect();
    let col_sums = (0..linop.ncols())
        .map(|c| linop.col_sum(c, T::one()).to_f64().unwrap_or(f64::NAN))
        .collect();

    Ok(LinOpOutput {
        result: to_host(out.as_ref()),
        row_sums,
        col_sums,
        time_ms,
    })
}

/// Result of a one-shot prox evaluation.
pub struct ProxOutput {
    pub result: Vec<f64>,
    pub time_ms: f64,
}

/// Builds a prox from its description and evaluates it on `arg`.
/// Coordinates outside the prox range pass through unchanged.
pub fn eval_prox<T: ElementType>(
    prox_desc: &Value,
    arg: &[f64],
    tau: f64,
    tau_diag: Option<&[f64]>,
) -> Result<ProxOutput, Problem> {
    let desc: ProxDesc = parse(prox_desc)?;
    let mut prox = build_prox::<T>(&desc)?;

    let dim = arg.len();
    prox.init(dim)?;

    let diag: Col<T> = match tau_diag {
        Some(d) if d.len() == dim => from_host(d),
        Some(_) => return Err(ConfigError::BadArrayLength.into()),
        None => Col::ones(dim),
    };

    let arg: Col<T> = from_host(arg);
    let mut result = arg.clone();
    let clock = Instant::now();
    prox.eval(&mut result, &arg, &diag, cast(tau), false)?;
    let time_ms = clock.elapsed().as_secs_f64() * 1e3;

    Ok(ProxOutput {
        result: to_host(result.as_ref()),
        time_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;
    use serde_json::json;

    #[test]
    fn test_eval_linop_gradient() {
        let blocks = json!([
            { "kind": "gradient2d", "row": 0, "col": 0, "nx": 3, "ny": 1 }
        ]);
        let out = eval_linop::<E>(&blocks, &[1.0, 2.0, 4.0], false).unwrap();
        assert_eq!(out.result, vec![1.0, 2.0, 0.0]);
        assert_eq!(out.row_sums, vec![2.0, 2.0, 0.0]);
        assert_eq!(out.col_sums, vec![1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_eval_linop_rejects_bad_rhs() {
        let blocks = json!([
            { "kind": "identity", "row": 0, "col": 0, "size": 4 }
        ]);
        assert!(eval_linop::<E>(&blocks, &[1.0, 2.0], false).is_err());
    }

    #[test]
    fn test_eval_prox_soft_threshold() {
        let desc = json!({ "kind": "elem", "idx": 0, "size": 3, "fun": { "name": "abs" } });
        let out = eval_prox::<E>(&desc, &[-1.0, 0.2, 0.7], 0.5, None).unwrap();
        assert_eq!(out.result, vec![-0.5, 0.0, 0.2]);
    }

    #[test]
    fn test_eval_prox_untouched_outside_range() {
        let desc = json!({ "kind": "elem", "idx": 1, "size": 2, "fun": { "name": "ind_eq0" } });
        let out = eval_prox::<E>(&desc, &[3.0, 1.0, 2.0, -4.0], 1.0, None).unwrap();
        assert_eq!(out.result, vec![3.0, 0.0, 0.0, -4.0]);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let desc = json!({ "kind": "warp_drive", "idx": 0, "size": 3 });
        assert!(eval_prox::<E>(&desc, &[0.0; 3], 1.0, None).is_err());
    }

    #[test]
    fn test_nested_wrapper_description() {
        let desc = json!({
            "kind": "moreau",
            "inner": {
                "kind": "transform",
                "a": 1.0, "c": 0.5,
                "inner": { "kind": "elem", "idx": 0, "size": 3, "fun": { "name": "abs" } }
            }
        });
        // Conjugate of 0.5|x| clips to [-0.5, 0.5].
        let out = eval_prox::<E>(&desc, &[-1.0, 0.2, 0.7], 1.0, None).unwrap();
        assert!((out.result[0] + 0.5).abs() < 1e-12);
        assert!((out.result[1] - 0.2).abs() < 1e-12);
        assert!((out.result[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_required_key_rejected() {
        let blocks = json!([
            { "kind": "diagonal", "row": 0 }
        ]);
        assert!(eval_linop::<E>(&blocks, &[], false).is_err());
    }
}
