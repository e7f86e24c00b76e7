/*****************************************************************************************[error.rs]
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

//! Errors

use std::io;
use thiserror::Error;

/// Everything that can abort a pipeline run or one of its steps.
///
/// None of these is recoverable: callers propagate them to the top level.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed proof, formula, queue record or backdoor file.
    #[error("format error: {0}")]
    Format(String),

    /// The oracles contradict the assumption that the formula is unsatisfiable,
    /// or derived facts contradict each other.
    #[error("oracle inconsistency: {0}")]
    Inconsistency(String),

    /// An external program exited abnormally or produced unreadable output.
    #[error("external process `{program}` failed ({status})\nSTDERR: {stderr}\nSTDOUT: {stdout}")]
    External {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    /// No new learned clauses arrived within the poll budget.
    #[error("no new learned clauses after {polls} polls")]
    Stale { polls: usize },

    /// The empty clause was derived.
    #[error("derived the empty clause: the formula is refuted")]
    Refuted,

    #[error("invalid options: {0}")]
    Options(String),

    #[error("queue store: {0}")]
    Queue(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub(crate) fn inconsistency<S: Into<String>>(msg: S) -> Self {
        Error::Inconsistency(msg.into())
    }

    pub(crate) fn options<S: Into<String>>(msg: S) -> Self {
        Error::Options(msg.into())
    }

    /// Failure to run `program` at all.
    pub(crate) fn spawn<E: std::fmt::Display>(program: &str, err: E) -> Self {
        Error::External {
            program: program.to_string(),
            status: format!("could not run: {}", err),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Queue(e.to_string())
    }
}
