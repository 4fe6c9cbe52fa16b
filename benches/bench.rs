use faer::Col;

use pock::backend::{Backend, PdhgBackend, PdhgConfig};
use pock::linop::LinearOperator;
use pock::linop::gradient::{GradKind, GradientBlock};
use pock::problem::{Precond, SaddlePointProblem};
use pock::prox::{CoeffVec, Coefficients, MoreauProx, PointwiseProx, Proxes, ScalarFn};
use pock::E;

fn main() {
    divan::main();
}

/// TV denoising of an n x n synthetic image.
fn tv_problem(n: usize) -> SaddlePointProblem<E> {
    let npix = n * n;
    let mut linop = LinearOperator::new();
    linop
        .add_block(GradientBlock::new(0, 0, n, n, 1, GradKind::Forward).into())
        .unwrap();

    let image = Col::from_fn(npix, |i| ((i % n) as E * 0.3).sin());
    let shift = Col::from_fn(npix, |i| -image[i]);
    let prox_g: Vec<Proxes<E>> = vec![
        PointwiseProx::new(
            0,
            npix,
            ScalarFn::Square,
            Coefficients {
                b: CoeffVec::PerCoord(shift),
                ..Coefficients::identity()
            },
        )
        .into(),
    ];
    let inner: Proxes<E> = PointwiseProx::new(
        0,
        2 * npix,
        ScalarFn::Abs,
        Coefficients {
            c: CoeffVec::Uniform(0.1),
            ..Coefficients::identity()
        },
    )
    .into();
    let prox_fstar: Vec<Proxes<E>> = vec![MoreauProx::new(Box::new(inner)).into()];

    let mut problem = SaddlePointProblem::new(linop, prox_g, prox_fstar)
        .with_precond(Precond::Alpha, 1.0);
    problem.init().unwrap();
    problem
}

#[divan::bench(args = [32, 64, 128])]
fn tv_denoising_100_iterations(bencher: divan::Bencher, n: usize) {
    bencher
        .with_inputs(|| {
            let problem = tv_problem(n);
            let mut backend = PdhgBackend::new(PdhgConfig::default());
            backend.init(&problem).unwrap();
            (problem, backend)
        })
        .bench_local_values(|(mut problem, mut backend)| {
            for _ in 0..100 {
                backend.iterate(&mut problem).unwrap();
            }
        });
}

#[divan::bench(args = [64, 256])]
fn gradient_apply(bencher: divan::Bencher, n: usize) {
    let mut linop = LinearOperator::<E>::new();
    linop
        .add_block(GradientBlock::new(0, 0, n, n, 1, GradKind::Forward).into())
        .unwrap();
    linop.init(&[1.0]).unwrap();

    let arg = Col::from_fn(n * n, |i| (i as E).cos());
    let mut out = Col::<E>::zeros(2 * n * n);
    bencher.bench_local(|| {
        linop.eval(&mut out, &arg).unwrap();
    });
}
