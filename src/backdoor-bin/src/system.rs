/*****************************************************************************************[system.rs]
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

use cpu_time::ProcessTime;
use std::fmt;
use std::time::{Duration, Instant};

/// CPU and wall-clock time spent since the process started working.
#[derive(Debug)]
pub(crate) struct Usage {
    cpu: ProcessTime,
    wall: Instant,
}

impl Usage {
    pub(crate) fn start() -> Usage {
        Usage {
            cpu: ProcessTime::now(),
            wall: Instant::now(),
        }
    }

    pub fn cpu_time(&self) -> Duration {
        ProcessTime::now().duration_since(self.cpu)
    }

    pub fn wall_time(&self) -> Duration {
        self.wall.elapsed()
    }
}

/// Comment lines, as printed at exit.
impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "c CPU time              : {:.3}s", self.cpu_time().as_secs_f64())?;
        writeln!(f, "c Wall time             : {:.3}s", self.wall_time().as_secs_f64())
    }
}
