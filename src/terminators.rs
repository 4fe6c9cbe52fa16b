//! Stop conditions polled by the solve loop.
//!
//! A [`Terminator`] is consulted once per iteration, between kernel
//! launches; it never aborts work already in flight. All implementations
//! reduce to reading a single word, so the poll is cheap enough to run
//! every iteration.
//!
//! [`InterruptTerminator`] hooks the process SIGINT handler, which is a
//! global resource: it can be installed once per process, and a second
//! construction fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use problemo::Problem;
use problemo::common::IntoCommonProblem;

use crate::Status;

/// A stop condition checked between iterations.
pub trait Terminator {
    /// Called once when the solve loop starts.
    fn initialize(&mut self) {}

    /// Returns the status to stop with, or `None` to keep iterating.
    fn terminate(&mut self) -> Option<Status>;
}

/// Never stops the solver.
pub struct NoOpTerminator {}

impl Terminator for NoOpTerminator {
    fn terminate(&mut self) -> Option<Status> {
        None
    }
}

/// Stops the solver when a shared flag is raised.
///
/// The flag is the crate's interruption primitive: host environments that
/// signal cancellation through their own channels hand the same
/// `Arc<AtomicBool>` to whatever raises it.
pub struct FlagTerminator {
    flag: Arc<AtomicBool>,
}

impl FlagTerminator {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Raises the flag by hand.
    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl Terminator for FlagTerminator {
    fn terminate(&mut self) -> Option<Status> {
        self.flag.load(Ordering::SeqCst).then_some(Status::Interrupted)
    }
}

/// Stops the solver on Ctrl-C.
///
/// Built on [`FlagTerminator`]: construction installs a SIGINT handler
/// whose only job is to raise the shared flag. Since the handler is
/// process-global, only one `InterruptTerminator` can exist per process;
/// further constructions return an error.
pub struct InterruptTerminator {
    inner: FlagTerminator,
}

impl InterruptTerminator {
    pub fn new() -> Result<Self, Problem> {
        let flag = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let flag = flag.clone();
            move || flag.store(true, Ordering::SeqCst)
        })
        .map_err(|e| format!("Unable to install the SIGINT handler: {}", e).gloss())?;
        Ok(Self {
            inner: FlagTerminator::new(flag),
        })
    }

    /// Requests a stop without an actual signal.
    pub fn interrupt(&self) {
        self.inner.raise();
    }
}

impl Terminator for InterruptTerminator {
    fn terminate(&mut self) -> Option<Status> {
        self.inner.terminate()
    }
}

/// Stops as soon as any of its members does.
pub struct AnyTerminator {
    members: Vec<Box<dyn Terminator>>,
}

impl AnyTerminator {
    pub fn new(members: Vec<Box<dyn Terminator>>) -> Self {
        Self { members }
    }

    pub fn push(&mut self, member: Box<dyn Terminator>) {
        self.members.push(member);
    }
}

impl Terminator for AnyTerminator {
    fn initialize(&mut self) {
        for member in &mut self.members {
            member.initialize();
        }
    }

    fn terminate(&mut self) -> Option<Status> {
        self.members.iter_mut().find_map(|member| member.terminate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_terminator() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut terminator = FlagTerminator::new(flag.clone());
        assert_eq!(terminator.terminate(), None);

        flag.store(true, Ordering::SeqCst);
        assert_eq!(terminator.terminate(), Some(Status::Interrupted));
    }

    #[test]
    fn test_interrupt_terminator_programmatic() {
        // The SIGINT handler can only be installed once per process, so
        // this is the single test constructing one; the flag is raised
        // through the programmatic path rather than a real signal.
        let mut terminator = InterruptTerminator::new().unwrap();
        assert_eq!(terminator.terminate(), None);

        terminator.interrupt();
        assert_eq!(terminator.terminate(), Some(Status::Interrupted));
    }

    #[test]
    fn test_any_terminator_picks_first_trigger() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut terminator = AnyTerminator::new(vec![Box::new(NoOpTerminator {})]);
        terminator.push(Box::new(FlagTerminator::new(flag.clone())));
        terminator.initialize();
        assert_eq!(terminator.terminate(), None);

        flag.store(true, Ordering::SeqCst);
        assert_eq!(terminator.terminate(), Some(Status::Interrupted));
    }
}
