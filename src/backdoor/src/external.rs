/*****************************************************************************************[external.rs]
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

//! Adapters for the external programs: the backdoor searcher and a budgeted
//! SAT solver.

use {
    crate::{
        classify::MAX_BACKDOOR_SIZE,
        clause::{Lit, Var},
        dimacs::Cnf,
        error::{Error, Result},
        interface::{OracleBuilder, Propagate, SolveLimited, SolveResult},
        propagate::UnitPropagator,
    },
    rand::{rngs::StdRng, Rng, SeedableRng},
    std::{
        fs::{self, File},
        io::{BufRead, BufReader, BufWriter, Write},
        path::{Path, PathBuf},
        process,
        sync::atomic::{AtomicUsize, Ordering},
    },
    subprocess::{CaptureData, Exec, ExitStatus, Redirection},
};

/// Run `exec`, capturing stdout and stderr, whatever its exit status.
pub fn run_with_status(exec: Exec, program: &str) -> Result<CaptureData> {
    debug!("running {:?}", exec.to_cmdline_lossy());
    exec.stdout(Redirection::Pipe)
        .stderr(Redirection::Pipe)
        .capture()
        .map_err(|e| Error::spawn(program, e))
}

fn failure(program: &str, out: &CaptureData) -> Error {
    Error::External {
        program: program.to_string(),
        status: format!("{:?}", out.exit_status),
        stdout: out.stdout_str(),
        stderr: out.stderr_str(),
    }
}

/// Run `exec` with captured output; a non-zero exit is an error.
pub fn run_captured(exec: Exec, program: &str) -> Result<CaptureData> {
    let out = run_with_status(exec, program)?;
    if out.success() {
        Ok(out)
    } else {
        Err(failure(program, &out))
    }
}

/// Parse one backdoor per line of the form `[v1, v2, ...]`, with 0-based
/// variable indices. Lines without such a list are skipped.
pub fn parse_backdoors<R: BufRead>(input: R) -> Result<Vec<Vec<Var>>> {
    let mut backdoors = vec![];
    for line in input.lines() {
        let line = line?;
        let inner = match (line.find('['), line.find(']')) {
            (Some(i), Some(j)) if i < j => &line[i + 1..j],
            _ => continue,
        };
        let ids: std::result::Result<Vec<u32>, _> =
            inner.split(',').map(|s| s.trim().parse::<u32>()).collect();
        match ids {
            Ok(ids) if !ids.is_empty() => {
                backdoors.push(ids.into_iter().map(Var::from_idx).collect());
            }
            _ => {
                trace!("skipping line `{}`", line);
            }
        }
    }
    Ok(backdoors)
}

pub fn parse_backdoors_file(path: &Path) -> Result<Vec<Vec<Var>>> {
    parse_backdoors(BufReader::new(File::open(path)?))
}

/// Finds backdoors of a formula.
pub trait BackdoorSearch {
    /// Search backdoors of the formula in `cnf`, using `work_dir` for scratch
    /// files and keeping its output in `log_dir`.
    fn search(&mut self, cnf: &Path, work_dir: &Path, log_dir: &Path) -> Result<Vec<Vec<Var>>>;
}

/// Options for the evolutionary backdoor searcher.
#[derive(Clone, Debug)]
pub struct SearcherOpts {
    pub program: String,
    pub num_runs: u32,
    pub instance_size: u32,
    pub num_iters: u32,
    /// Seed for the per-run seeds handed to the searcher.
    pub seed: u64,
}

impl Default for SearcherOpts {
    fn default() -> Self {
        Self {
            program: "./backdoor-searcher/build/minisat".to_string(),
            num_runs: 2,
            instance_size: 10,
            num_iters: 2000,
            seed: 42,
        }
    }
}

impl SearcherOpts {
    pub fn check(&self) -> bool {
        !self.program.is_empty()
            && self.num_runs > 0
            && self.num_iters > 0
            && (1..=MAX_BACKDOOR_SIZE as u32).contains(&self.instance_size)
    }
}

/// Runs the external searcher binary.
pub struct ExternalSearcher {
    opts: SearcherOpts,
    rng: StdRng,
}

impl ExternalSearcher {
    pub fn new(opts: SearcherOpts) -> Result<Self> {
        if !opts.check() {
            return Err(Error::options(format!("invalid searcher options {:?}", opts)));
        }
        let rng = StdRng::seed_from_u64(opts.seed);
        Ok(ExternalSearcher { opts, rng })
    }
}

impl BackdoorSearch for ExternalSearcher {
    fn search(&mut self, cnf: &Path, work_dir: &Path, log_dir: &Path) -> Result<Vec<Vec<Var>>> {
        let backdoor_path = work_dir.join("backdoor_path.txt");
        if backdoor_path.exists() {
            fs::remove_file(&backdoor_path)?;
        }
        let seed: u32 = self.rng.gen_range(1..=10000);
        let o = &self.opts;
        let exec = Exec::cmd(&o.program)
            .arg(cnf)
            .arg(format!("-ea-num-runs={}", o.num_runs))
            .arg(format!("-ea-seed={}", seed))
            .arg(format!("-ea-instance-size={}", o.instance_size))
            .arg(format!("-ea-num-iters={}", o.num_iters))
            .arg(format!("-backdoor-path={}", backdoor_path.display()));
        let out = run_captured(exec, &o.program)?;
        fs::write(log_dir.join("find_backdoors_stdout"), &out.stdout)?;
        if !backdoor_path.exists() {
            return Err(Error::External {
                program: o.program.clone(),
                status: format!("no backdoor file at {}", backdoor_path.display()),
                stdout: out.stdout_str(),
                stderr: out.stderr_str(),
            });
        }
        fs::copy(&backdoor_path, log_dir.join("backdoor_path.txt"))?;
        let backdoors = parse_backdoors_file(&backdoor_path)?;
        info!("searcher (seed {}) found {} backdoors", seed, backdoors.len());
        Ok(backdoors)
    }
}

/// Options for the budgeted solver binary.
#[derive(Clone, Debug)]
pub struct ExternalSolverOpts {
    pub program: String,
    /// Arguments placed before the formula.
    pub args: Vec<String>,
    /// Argument carrying the conflict budget; `{}` is replaced by the budget.
    pub budget_arg: String,
    /// Directory where each solver writes its formula with the assumptions.
    pub scratch_dir: PathBuf,
}

impl Default for ExternalSolverOpts {
    fn default() -> Self {
        Self {
            program: "batsat".to_string(),
            args: vec![],
            budget_arg: "--conflict-budget={}".to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl ExternalSolverOpts {
    pub fn check(&self) -> bool {
        !self.program.is_empty() && self.budget_arg.contains("{}")
    }
}

/// Budgeted oracle running a solver binary on the formula extended with the
/// assumptions as unit clauses.
///
/// The solver must follow the usual exit codes: 10 for SAT, 20 for UNSAT.
/// Exit code 0 means it gave up.
pub struct ExternalSolver {
    opts: ExternalSolverOpts,
    cnf: Cnf,
    scratch: PathBuf,
}

static NEXT_SCRATCH: AtomicUsize = AtomicUsize::new(0);

impl ExternalSolver {
    /// Each solver gets its own scratch file, named after the process id and
    /// a counter.
    pub fn new(opts: ExternalSolverOpts, cnf: Cnf) -> Result<Self> {
        if !opts.check() {
            return Err(Error::options(format!("invalid solver options {:?}", opts)));
        }
        fs::create_dir_all(&opts.scratch_dir)?;
        let n = NEXT_SCRATCH.fetch_add(1, Ordering::Relaxed);
        let scratch = opts
            .scratch_dir
            .join(format!("backdoor-assumptions-{}-{}.cnf", process::id(), n));
        Ok(ExternalSolver { opts, cnf, scratch })
    }

    /// The file the formula with the assumptions is written to.
    pub fn scratch_path(&self) -> &Path {
        &self.scratch
    }
}

impl Drop for ExternalSolver {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.scratch);
    }
}

impl SolveLimited for ExternalSolver {
    fn solve_limited(&mut self, assumps: &[Lit], conflict_budget: u64) -> Result<SolveResult> {
        {
            let mut out = BufWriter::new(File::create(&self.scratch)?);
            self.cnf.write_with_units(&mut out, assumps)?;
            out.flush()?;
        }
        let o = &self.opts;
        let exec = Exec::cmd(&o.program)
            .args(o.args.as_slice())
            .arg(o.budget_arg.replace("{}", &conflict_budget.to_string()))
            .arg(&self.scratch);
        let out = run_with_status(exec, &o.program)?;
        match out.exit_status {
            ExitStatus::Exited(10) => Ok(SolveResult::Sat),
            ExitStatus::Exited(20) => Ok(SolveResult::Unsat),
            ExitStatus::Exited(0) => Ok(SolveResult::Unknown),
            _ => Err(failure(&o.program, &out)),
        }
    }
}

/// Unit propagation over the formula, plus an external budgeted solver when
/// one is configured.
#[derive(Clone, Debug, Default)]
pub struct StandardOracles {
    pub solver: Option<ExternalSolverOpts>,
}

impl OracleBuilder for StandardOracles {
    fn propagator(&mut self, cnf: &Cnf) -> Result<Box<dyn Propagate>> {
        Ok(Box::new(UnitPropagator::from_cnf(cnf)))
    }

    fn limited(&mut self, cnf: &Cnf) -> Result<Option<Box<dyn SolveLimited>>> {
        match &self.solver {
            Some(opts) => {
                let s = ExternalSolver::new(opts.clone(), cnf.clone())?;
                Ok(Some(Box::new(s)))
            }
            None => Ok(None),
        }
    }
}
