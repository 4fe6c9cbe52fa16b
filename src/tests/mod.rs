
use faer::rand::SeedableRng;
use faer::rand::rngs::StdRng;
use faer::stats::DistributionExt;
use faer::stats::prelude::{CwiseMatDistribution, StandardNormal};
use faer::{Col, Mat};

use crate::{E, I};

/// A standard-normal column with a reproducible seed.
pub fn rand_col(rng: &mut StdRng, n: I) -> Col<E> {
    let m: Mat<E> = CwiseMatDistribution {
        nrows: n,
        ncols: 1,
        dist: StandardNormal,
    }
    .rand(rng);
    Col::from_fn(n, |i| m[(i, 0)])
}

/// The noisy piecewise-constant test signal: a step from 0.2 to 0.8 at the
/// midpoint plus Gaussian noise of standard deviation 0.05.
pub fn step_signal(n: I, seed: u64) -> Col<E> {
    let rng = &mut StdRng::seed_from_u64(seed);
    let noise = rand_col(rng, n);
    Col::from_fn(n, |i| {
        let clean = if i < n / 2 { 0.2 } else { 0.8 };
        clean + 0.05 * noise[i]
    })
}
