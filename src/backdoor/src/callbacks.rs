
use crate::pipeline::IterationStats;

/// Hooks into long-running operations.
///
/// Typically intended for printing/statistics
pub trait Callbacks {
    /// Called regularly while decoding a proof, with the number of bytes consumed so far
    fn on_proof_progress(&mut self, _bytes: u64) {}

    /// Called when the proof has been fully consumed (or the limit was reached)
    fn on_proof_done(&mut self, _bytes: u64) {}

    /// Called before each sleep while waiting for new learned clauses
    fn on_poll(&mut self, _attempt: usize) {}

    /// Called after each completed pipeline iteration
    fn on_iteration(&mut self, _stats: &IterationStats) {}

    /// Should we stop? checked between pipeline iterations
    fn stop(&self) -> bool {
        false
    }
}

/// Basic set of callbacks
///
/// This doesn't do anything except storing a function to `stop`
pub struct Basic {
    stop: Option<Box<dyn Fn() -> bool>>, // to stop
}

impl Callbacks for Basic {
    fn stop(&self) -> bool {
        match self.stop {
            None => false,
            Some(ref f) => f(),
        }
    }
}

impl Basic {
    /// Allocate a new set of callbacks
    pub fn new() -> Self {
        Basic { stop: None }
    }

    /// Set the `stop` function
    pub fn set_stop<F>(&mut self, f: F)
    where
        F: 'static + Fn() -> bool,
    {
        self.stop = Some(Box::new(f));
    }
}

impl Default for Basic {
    fn default() -> Self {
        Basic::new()
    }
}
