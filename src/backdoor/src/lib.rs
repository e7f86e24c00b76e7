/*****************************************************************************************[lib.rs]
Copyright (c) 2018-2018, Masaki Hara

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

//======== LOG ============

// stubs when logging is not enabled
#[cfg(not(feature = "logging"))]
#[macro_use]
pub(crate) mod log {
    macro_rules! trace {
        ($( $x:expr ),*) => {};
    }
    macro_rules! debug {
        ($( $x:expr ),*) => {};
    }
    macro_rules! info {
        ($( $x:expr ),*) => {};
    }
    macro_rules! warn {
        ($( $x:expr ),*) => {};
    }
}

#[cfg(feature = "logging")]
#[macro_use]
pub extern crate log;

//======== PUBLIC INTERFACE ============

pub mod callbacks;
pub mod classify;
pub mod clause;
pub mod dimacs;
pub mod drat;
pub mod error;
pub mod external;
pub mod extract;
pub mod interface;
pub mod ledger;
pub mod minimize;
pub mod pipeline;
pub mod probe;
pub mod propagate;
pub mod queue;

pub use crate::{
    callbacks::{Basic as BasicCallbacks, Callbacks},
    classify::{partition_tasks, refine_semi_easy, Tasks},
    clause::{Clause, Lit, SizeClass, SizeCounts, Var},
    dimacs::Cnf,
    error::{Error, Result},
    extract::{derive_clauses, Derived, Semantics},
    interface::{OracleBuilder, Propagate, SolveLimited, SolveResult},
    ledger::Ledger,
    pipeline::{Outcome, Pipeline, PipelineOpts},
    propagate::UnitPropagator,
};
