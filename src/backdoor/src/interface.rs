
/* Oracle interfaces */

use crate::{clause::Lit, dimacs::Cnf, error::Result};

/// Outcome of a search under a conflict budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The budget ran out before an answer was found.
    Unknown,
}

/// Propagation oracle: unit propagation under assumptions.
pub trait Propagate {
    /// Assume `assumps` and run unit propagation.
    ///
    /// Returns `true` if a conflict was reached. The clause database and the
    /// level-0 assignment are left as they were.
    fn propagate(&mut self, assumps: &[Lit]) -> bool;

    /// Permanently add a clause. Returns `false` if the database is now
    /// trivially unsatisfiable.
    fn add_clause(&mut self, clause: &[Lit]) -> bool;
}

/// Budgeted-search oracle.
pub trait SolveLimited {
    /// Search for a model that respects `assumps`, giving up after
    /// `conflict_budget` conflicts.
    ///
    /// Must be deterministic given identical state and budget.
    fn solve_limited(&mut self, assumps: &[Lit], conflict_budget: u64) -> Result<SolveResult>;
}

impl<P: Propagate + ?Sized> Propagate for Box<P> {
    fn propagate(&mut self, assumps: &[Lit]) -> bool {
        (**self).propagate(assumps)
    }
    fn add_clause(&mut self, clause: &[Lit]) -> bool {
        (**self).add_clause(clause)
    }
}

impl<S: SolveLimited + ?Sized> SolveLimited for Box<S> {
    fn solve_limited(&mut self, assumps: &[Lit], conflict_budget: u64) -> Result<SolveResult> {
        (**self).solve_limited(assumps, conflict_budget)
    }
}

/// Builds the oracles used to analyse backdoors of the current working formula.
pub trait OracleBuilder {
    fn propagator(&mut self, cnf: &Cnf) -> Result<Box<dyn Propagate>>;

    /// Budgeted oracle, if one is configured.
    fn limited(&mut self, cnf: &Cnf) -> Result<Option<Box<dyn SolveLimited>>>;
}
