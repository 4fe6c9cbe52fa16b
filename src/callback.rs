use dyn_clone::DynClone;
use faer::Col;

use crate::ElementType;
use crate::backend::Residuals;

/// Hook invoked at scheduled iterations for logging, monitoring, or early
/// stopping.
///
/// The boolean return value joins the solver's stop condition: returning
/// `true` ends the solve after the current iteration.
pub trait Callback<T: ElementType>: DynClone {
    /// Called once before the first iteration.
    fn init(&mut self) {}

    /// Called with the current iterate; device writes affecting `x` and `y`
    /// are finished before this runs.
    fn call(&mut self, iteration: usize, x: &Col<T>, y: &Col<T>, residuals: &Residuals<T>) -> bool;
}

impl<T: ElementType> Clone for Box<dyn Callback<T>> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// A callback that does nothing. Use when no per-iteration output is needed.
#[derive(Clone)]
pub struct NoOpCallback {}

impl<T: ElementType> Callback<T> for NoOpCallback {
    fn call(
        &mut self,
        _iteration: usize,
        _x: &Col<T>,
        _y: &Col<T>,
        _residuals: &Residuals<T>,
    ) -> bool {
        false
    }
}

/// Prints the residuals and their tolerances to stdout.
#[derive(Clone)]
pub struct ConvergenceOutput {}

impl<T: ElementType> Callback<T> for ConvergenceOutput {
    fn call(
        &mut self,
        iteration: usize,
        _x: &Col<T>,
        _y: &Col<T>,
        residuals: &Residuals<T>,
    ) -> bool {
        let txt = format!(
            "| {:4}: | {:<8.2e} | {:<8.2e} | {:<8.2e} | {:<8.2e} |",
            iteration,
            residuals.primal.to_f64().unwrap_or(f64::NAN),
            residuals.eps_primal.to_f64().unwrap_or(f64::NAN),
            residuals.dual.to_f64().unwrap_or(f64::NAN),
            residuals.eps_dual.to_f64().unwrap_or(f64::NAN),
        );
        println!("{}", txt);
        false
    }
}

/// Fans one invocation out to several callbacks; requests a stop when any
/// member does.
pub struct MultiCallback<T: ElementType> {
    callbacks: Vec<Box<dyn Callback<T>>>,
}

impl<T: ElementType> MultiCallback<T> {
    pub fn new(callbacks: Vec<Box<dyn Callback<T>>>) -> Self {
        Self { callbacks }
    }
}

impl<T: ElementType> Clone for MultiCallback<T> {
    fn clone(&self) -> Self {
        Self {
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<T: ElementType> Callback<T> for MultiCallback<T> {
    fn init(&mut self) {
        for callback in &mut self.callbacks {
            callback.init();
        }
    }

    fn call(&mut self, iteration: usize, x: &Col<T>, y: &Col<T>, residuals: &Residuals<T>) -> bool {
        let mut stop = false;
        for callback in &mut self.callbacks {
            stop |= callback.call(iteration, x, y, residuals);
        }
        stop
    }
}

/// Adapts an opaque host function into a callback.
#[derive(Clone)]
pub struct FnCallback<F> {
    f: F,
}

impl<F> FnCallback<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Callback<T> for FnCallback<F>
where
    T: ElementType,
    F: FnMut(usize, &Col<T>, &Col<T>) -> bool + Clone,
{
    fn call(
        &mut self,
        iteration: usize,
        x: &Col<T>,
        y: &Col<T>,
        _residuals: &Residuals<T>,
    ) -> bool {
        (self.f)(iteration, x, y)
    }
}
