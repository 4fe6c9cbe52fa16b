//! The dictionary-facing half of the host interface.
//!
//! The command dispatcher of the host environment hands problems, backends,
//! and options over as untyped parameter dictionaries
//! ([`serde_json::Value`]) together with contiguous column-major 64-bit
//! arrays. This module interprets the dictionaries ([`desc`]) and builds
//! the typed solver stack from them ([`factory`]). Unknown dictionary keys
//! are ignored; missing required keys and unrecognized kinds fail with
//! [`ConfigError`].

pub mod desc;
pub mod factory;

use derive_more::{Display, Error};

pub use desc::{BackendDesc, BlockDesc, CoeffsDesc, FunDesc, ProblemDesc, ProxDesc};
pub use factory::{
    LinOpOutput, ProxOutput, SolveOutput, build_block, build_problem, build_prox, eval_linop,
    eval_prox, solve_problem,
};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ConfigError {
    #[display("Malformed parameter dictionary")]
    Malformed,

    #[display("Operator extent disagrees with the declared dimensions")]
    DimensionMismatch,

    #[display("Array argument has the wrong length")]
    BadArrayLength,
}
