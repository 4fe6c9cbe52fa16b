use serde::Deserialize;

use crate::I;

/// A linear-operator block description, dispatched on its `kind` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockDesc {
    /// Sparse block from triplets in block-local coordinates.
    Sparse {
        row: I,
        col: I,
        nrows: I,
        ncols: I,
        rows: Vec<I>,
        cols: Vec<I>,
        vals: Vec<f64>,
    },
    /// Dense block from a column-major array.
    Dense {
        row: I,
        col: I,
        nrows: I,
        ncols: I,
        data: Vec<f64>,
    },
    Diagonal {
        row: I,
        col: I,
        diag: Vec<f64>,
    },
    /// `factor * I`; omit `factor` for the identity.
    Identity {
        row: I,
        col: I,
        size: I,
        #[serde(default = "one")]
        factor: f64,
    },
    Zero {
        row: I,
        col: I,
        nrows: I,
        ncols: I,
    },
    Gradient2d {
        row: I,
        col: I,
        nx: I,
        ny: I,
        #[serde(default)]
        backward: bool,
    },
    Gradient3d {
        row: I,
        col: I,
        nx: I,
        ny: I,
        nz: I,
        #[serde(default)]
        backward: bool,
    },
    Dct {
        row: I,
        col: I,
        size: I,
    },
    Dst {
        row: I,
        col: I,
        size: I,
    },
    /// Prefactored data term `[weight*I ; grad]` over a 2D grid.
    Dataterm {
        row: I,
        col: I,
        nx: I,
        ny: I,
        weight: f64,
    },
}

fn one() -> f64 {
    1.0
}

/// A scalar-function selector for the 1D prox machinery.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum FunDesc {
    Zero,
    Abs,
    Square,
    Huber { alpha: f64 },
    L0,
    IndLeq0,
    IndGeq0,
    IndEq0,
    IndBox01,
    MaxPos0,
}

/// A coefficient supplied once per range or once per coordinate.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrVec {
    Scalar(f64),
    Vector(Vec<f64>),
}

/// Coefficients of `c*f(a*x + b) + d*x + (e/2)x^2`; omitted entries default
/// to the identity transform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoeffsDesc {
    pub a: Option<ScalarOrVec>,
    pub b: Option<ScalarOrVec>,
    pub c: Option<ScalarOrVec>,
    pub d: Option<ScalarOrVec>,
    pub e: Option<ScalarOrVec>,
}

/// A prox description, dispatched on its `kind` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProxDesc {
    /// Separable 1D prox over the range.
    Elem {
        idx: I,
        size: I,
        fun: FunDesc,
        #[serde(default)]
        coeffs: CoeffsDesc,
    },
    /// Grouped Euclidean-norm prox.
    Norm2 {
        idx: I,
        size: I,
        group_dim: I,
        fun: FunDesc,
        #[serde(default)]
        coeffs: CoeffsDesc,
    },
    /// Projection onto the probability simplex per group.
    IndSimplex {
        idx: I,
        size: I,
        group_dim: I,
    },
    /// Projection onto the Euclidean ball per group.
    IndBall {
        idx: I,
        size: I,
        group_dim: I,
        radius: f64,
    },
    /// Quadratic with diagonal Hessian `q` and linear term `b`.
    Quad {
        idx: I,
        size: I,
        q: Vec<f64>,
        b: Vec<f64>,
    },
    /// Spectral prox over groups read as column-major `nrows x ncols`
    /// matrices.
    SingularValue {
        idx: I,
        size: I,
        nrows: I,
        ncols: I,
        fun: FunDesc,
        #[serde(default)]
        coeffs: CoeffsDesc,
    },
    /// Moreau conjugation of the inner prox.
    Moreau { inner: Box<ProxDesc> },
    /// Inner prox on a permuted view of its range.
    Permute {
        inner: Box<ProxDesc>,
        perm: Vec<I>,
    },
    /// Affine transformation `c*f(a*x + b) + d*x + (e/2)x^2` of the inner
    /// prox with scalar coefficients.
    Transform {
        inner: Box<ProxDesc>,
        #[serde(default = "one")]
        a: f64,
        #[serde(default)]
        b: f64,
        #[serde(default = "one")]
        c: f64,
        #[serde(default)]
        d: f64,
        #[serde(default)]
        e: f64,
    },
}

/// The problem description handed over by the dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemDesc {
    pub linop: Vec<BlockDesc>,
    pub prox_g: Vec<ProxDesc>,
    pub prox_fstar: Vec<ProxDesc>,
}

/// Backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendDesc {
    Pdhg,
}
