use crate::{ElementType, cast};

/// Scalar step sizes and extrapolation factor of the iteration.
#[derive(Debug, Clone, Copy)]
pub struct Steps<T> {
    pub tau: T,
    pub sigma: T,
    pub theta: T,
}

/// Step-size rule of the primal-dual iteration.
#[derive(Debug, Clone, Copy)]
pub enum StepSizeRule<T> {
    /// Constant steps, `theta = 1`.
    Pdhg,
    /// Acceleration under strong convexity `gamma > 0` of the primal
    /// function: `theta_n = 1/sqrt(1 + 2 gamma tau_n)`, `tau <- theta tau`,
    /// `sigma <- sigma / theta`.
    Alg2 { gamma: T },
    /// Backtracking: a tentative step is kept only if
    /// `2 tau sigma ||K dx||^2 <= alpha (||dx||^2/tau + ||dy||^2/sigma)`,
    /// shrinking both steps by `eta` on violation and growing them by
    /// `delta` when the inequality holds with slack.
    Goldstein {
        alpha: T,
        eta: T,
        delta: T,
        max_retries: usize,
    },
}

impl<T: ElementType> StepSizeRule<T> {
    pub(crate) fn max_retries(&self) -> usize {
        match self {
            StepSizeRule::Goldstein { max_retries, .. } => *max_retries,
            _ => 0,
        }
    }

    /// Whether the tentative step passes the descent test.
    ///
    /// `k_dx_sq = ||K(x+ - x)||^2`, `dx_sq = ||x+ - x||^2`,
    /// `dy_sq = ||y+ - y||^2`.
    pub(crate) fn accepts(&self, steps: &Steps<T>, k_dx_sq: T, dx_sq: T, dy_sq: T) -> bool {
        match self {
            StepSizeRule::Goldstein { alpha, .. } => {
                let lhs = cast::<T>(2.0) * steps.tau * steps.sigma * k_dx_sq;
                let rhs = *alpha * (dx_sq / steps.tau + dy_sq / steps.sigma);
                lhs <= rhs || rhs == T::zero()
            }
            _ => true,
        }
    }

    /// Shrinks the steps after a rejected tentative iteration.
    pub(crate) fn backtrack(&self, steps: &mut Steps<T>) {
        if let StepSizeRule::Goldstein { eta, .. } = self {
            steps.tau = steps.tau * *eta;
            steps.sigma = steps.sigma * *eta;
        }
    }

    /// Advances the rule state after an accepted iteration.
    pub(crate) fn advance(&self, steps: &mut Steps<T>, k_dx_sq: T, dx_sq: T, dy_sq: T) {
        match self {
            StepSizeRule::Pdhg => {}
            StepSizeRule::Alg2 { gamma } => {
                let theta =
                    T::one() / (T::one() + cast::<T>(2.0) * *gamma * steps.tau).sqrt();
                steps.theta = theta;
                steps.tau = steps.tau * theta;
                steps.sigma = steps.sigma / theta;
            }
            StepSizeRule::Goldstein { alpha, delta, .. } => {
                let lhs = cast::<T>(2.0) * steps.tau * steps.sigma * k_dx_sq;
                let rhs = *alpha * (dx_sq / steps.tau + dy_sq / steps.sigma);
                if lhs <= cast::<T>(0.5) * rhs {
                    steps.tau = steps.tau * *delta;
                    steps.sigma = steps.sigma * *delta;
                }
            }
        }
    }
}

impl<T: ElementType> Default for StepSizeRule<T> {
    fn default() -> Self {
        StepSizeRule::Pdhg
    }
}

/// Residual balancing of the scalar steps.
#[derive(Debug, Clone, Copy)]
pub enum AdaptRule<T> {
    Off,
    /// Every `every` iterations, move `tau <-> sigma` (product preserved)
    /// toward matching residuals, whenever they differ by more than
    /// `ratio`. The adaptivity weight decays by `decay` on each rescale and
    /// the step quotient is kept within `limit`.
    Balance {
        every: usize,
        ratio: T,
        decay: T,
        limit: T,
    },
}

impl<T: ElementType> AdaptRule<T> {
    /// Rebalances the steps; `weight` is the decaying adaptivity state.
    pub(crate) fn rebalance(
        &self,
        steps: &mut Steps<T>,
        weight: &mut T,
        iteration: usize,
        primal_res: T,
        dual_res: T,
    ) {
        let AdaptRule::Balance { every, ratio, decay, limit } = *self else {
            return;
        };
        if every == 0 || iteration % every != 0 {
            return;
        }

        let grow = T::one() / (T::one() - *weight);
        let shrink = T::one() - *weight;
        if primal_res > ratio * dual_res && steps.tau * grow < limit * steps.sigma * shrink {
            // Larger primal steps push the primal residual down.
            steps.tau = steps.tau * grow;
            steps.sigma = steps.sigma * shrink;
            *weight = *weight * decay;
        } else if dual_res > ratio * primal_res && steps.sigma * grow < limit * steps.tau * shrink {
            steps.tau = steps.tau * shrink;
            steps.sigma = steps.sigma * grow;
            *weight = *weight * decay;
        }
    }
}

impl<T: ElementType> Default for AdaptRule<T> {
    fn default() -> Self {
        AdaptRule::Off
    }
}
