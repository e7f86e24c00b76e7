/*****************************************************************************************[pipeline.rs]
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

//! The producer loop: exchanging clauses between the backdoor searcher and a
//! solving process through a shared queue.
//!
//! Each iteration goes through the same states:
//!
//! - await-input: poll the learned-clause channel (bounded retries);
//! - combine: fold the learned clauses into the working formula;
//! - search: run the backdoor searcher on the working formula;
//! - extract: classify each backdoor and derive clauses from its easy cuboids;
//! - publish: send the clauses the solver does not know yet;
//! - checkpoint: write the statistics of the iteration.

use {
    crate::{
        callbacks::{Basic, Callbacks},
        classify::{check_backdoor, partition_tasks, refine_semi_easy, Tasks},
        clause::{Clause, Lit, SizeCounts, Var},
        dimacs::{parse_lits, Cnf},
        drat::Mode,
        error::{Error, Result},
        external::{BackdoorSearch, StandardOracles},
        extract::{derive_clauses, Semantics},
        interface::OracleBuilder,
        ledger::{Ledger, Report},
        minimize::{Minimizer, Passthrough},
        probe::{probe, probe_limited},
        queue::{read_from, Encoding, QueueStore, Record, DERIVED_CHANNEL, LEARNED_CHANNEL},
    },
    std::{
        collections::HashSet,
        fmt, fs,
        path::{Path, PathBuf},
        thread,
        time::{Duration, Instant},
    },
};

/// Options of the producer loop.
#[derive(Clone, Debug)]
pub struct PipelineOpts {
    /// Scratch directory, emptied at startup. Holds the working formula.
    pub tmp_dir: PathBuf,
    /// Statistics and searcher output go to `<log_dir>/<iteration>/`.
    pub log_dir: PathBuf,
    pub learned_channel: String,
    pub derived_channel: String,
    /// Channel layout in the queue store.
    pub encoding: Encoding,
    /// Number of records fetched per queue request.
    pub buffer_size: usize,
    pub poll_interval: Duration,
    /// Consecutive empty polls tolerated before giving up.
    pub max_polls: usize,
    pub max_iterations: Option<usize>,
    /// Refine hard cuboids with this many conflicts, if a budgeted oracle
    /// is available.
    pub conflict_budget: Option<u64>,
    /// Derive units by failed-literal probing on backdoor variables.
    pub probe: bool,
    /// Assert derived units into the propagation oracle right away.
    pub add_units: bool,
    /// Do not publish derived clauses the working formula already has.
    pub skip_known: bool,
    /// File whose first line is a witness assignment. Every learned and
    /// derived clause must be satisfied by it.
    pub validate: Option<PathBuf>,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from("tmp"),
            log_dir: PathBuf::from("logs"),
            learned_channel: LEARNED_CHANNEL.to_string(),
            derived_channel: DERIVED_CHANNEL.to_string(),
            encoding: Encoding::Scalar,
            buffer_size: 1000,
            poll_interval: Duration::from_secs(10),
            max_polls: 30,
            max_iterations: None,
            conflict_budget: None,
            probe: false,
            add_units: false,
            skip_known: true,
            validate: None,
        }
    }
}

impl PipelineOpts {
    pub fn check(&self) -> bool {
        self.buffer_size > 0
            && !self.learned_channel.is_empty()
            && !self.derived_channel.is_empty()
            && self.learned_channel != self.derived_channel
            && self.tmp_dir != self.log_dir
    }
}

/// Source of time for the producer loop.
pub trait Clock {
    /// Time since the clock was created.
    fn elapsed(&self) -> Duration;

    fn sleep(&mut self, d: Duration);
}

/// Wall clock.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, d: Duration) {
        thread::sleep(d)
    }
}

/// Classification summary of one backdoor.
#[derive(Clone, Debug, Default)]
pub struct BackdoorStats {
    pub size: usize,
    pub hard: usize,
    pub easy: usize,
    pub semi_easy: usize,
    pub rho: f64,
    pub rho_total: f64,
}

impl BackdoorStats {
    pub fn of(tasks: &Tasks) -> Self {
        BackdoorStats {
            size: tasks.backdoor.len(),
            hard: tasks.hard.len(),
            easy: tasks.easy.len(),
            semi_easy: tasks.semi_easy.len(),
            rho: tasks.rho(),
            rho_total: tasks.rho_total(),
        }
    }
}

/// What happened during one iteration.
#[derive(Clone, Debug, Default)]
pub struct IterationStats {
    pub iteration: usize,
    /// Records read from the learned channel.
    pub num_learned: usize,
    /// Deletion records among them (ignored).
    pub num_deleted: usize,
    /// Learned clauses new to the working formula.
    pub num_combined: usize,
    pub backdoors: Vec<BackdoorStats>,
    pub report: Report,
    /// Units found by probing.
    pub num_units: usize,
    pub num_published: usize,
    /// Size of the working formula at the end of the iteration.
    pub num_clauses: usize,
    /// Ledger contents at the end of the iteration.
    pub totals: SizeCounts,
    pub search_time: Duration,
    pub elapsed: Duration,
    /// Some backdoor had no hard cuboid left.
    pub refuted: bool,
}

impl fmt::Display for IterationStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "iteration: {}", self.iteration)?;
        writeln!(
            f,
            "learned: {} records ({} deletions ignored), {} new in formula",
            self.num_learned, self.num_deleted, self.num_combined
        )?;
        writeln!(f, "backdoors: {}", self.backdoors.len())?;
        for (i, b) in self.backdoors.iter().enumerate() {
            writeln!(
                f,
                "  [{}] size {}: {} hard, {} easy, {} semi-easy, rho = {:.4}, rho_total = {:.4}",
                i, b.size, b.hard, b.easy, b.semi_easy, b.rho, b.rho_total
            )?;
        }
        writeln!(f, "derived: {}", self.report.derived)?;
        writeln!(f, "derived new: {}", self.report.new)?;
        writeln!(f, "derived in cnf: {}", self.report.in_cnf)?;
        writeln!(f, "probed units: {}", self.num_units)?;
        writeln!(f, "published: {}", self.num_published)?;
        writeln!(f, "total unique: {}", self.totals)?;
        writeln!(f, "formula clauses: {}", self.num_clauses)?;
        if self.refuted {
            writeln!(f, "refuted: yes")?;
        }
        writeln!(f, "search time, seconds: {:.3}", self.search_time.as_secs_f64())?;
        writeln!(f, "calculation time, seconds: {:.3}", self.elapsed.as_secs_f64())
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// `max_iterations` iterations were done.
    Finished,
    /// The formula was shown unsatisfiable.
    Refuted,
    /// The callbacks asked to stop.
    Stopped,
}

/// Counts for [`combine_into`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Combined {
    pub added: usize,
    pub duplicates: usize,
    pub deleted: usize,
}

/// Add the clauses of `records` to `formula` unless already present, then
/// rewrite the formula at `path`. Deletion records are counted and ignored.
pub fn combine_into(formula: &mut Cnf, records: &[Record], path: &Path) -> Result<Combined> {
    let mut res = Combined::default();
    for r in records {
        match r.mode {
            Mode::Deleted => res.deleted += 1,
            Mode::Added => {
                if formula.add_clause(r.clause.clone()) {
                    res.added += 1;
                } else {
                    res.duplicates += 1;
                }
            }
        }
    }
    formula.write_file(path)?;
    Ok(res)
}

/// Remove everything inside `dir`, creating it if needed.
fn clean_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn read_witness(path: &Path) -> Result<HashSet<Lit>> {
    let text = fs::read_to_string(path)?;
    let first = text.lines().next().unwrap_or("");
    Ok(parse_lits(first)?.into_iter().collect())
}

/// The producer loop.
pub struct Pipeline {
    opts: PipelineOpts,
    base: Cnf,
    queue: Box<dyn QueueStore>,
    searcher: Box<dyn BackdoorSearch>,
    oracles: Box<dyn OracleBuilder>,
    minimizer: Box<dyn Minimizer>,
    clock: Box<dyn Clock>,
    cb: Box<dyn Callbacks>,
    witness: Option<HashSet<Lit>>,

    formula: Cnf,
    ledger: Ledger,
    published: HashSet<Clause>,
    next_publish: u64,
    cursor: u64,
}

impl Pipeline {
    /// New producer over the base formula `base`.
    ///
    /// Uses unit propagation only, no minimization, the wall clock and no
    /// callbacks until told otherwise.
    pub fn new(
        opts: PipelineOpts,
        base: Cnf,
        queue: Box<dyn QueueStore>,
        searcher: Box<dyn BackdoorSearch>,
    ) -> Result<Self> {
        if !opts.check() {
            return Err(Error::options(format!("invalid pipeline options {:?}", opts)));
        }
        let witness = match &opts.validate {
            Some(path) => Some(read_witness(path)?),
            None => None,
        };
        Ok(Pipeline {
            formula: base.clone(),
            opts,
            base,
            queue,
            searcher,
            oracles: Box::new(StandardOracles::default()),
            minimizer: Box::new(Passthrough),
            clock: Box::new(SystemClock::new()),
            cb: Box::new(Basic::new()),
            witness,
            ledger: Ledger::new(),
            published: HashSet::new(),
            next_publish: 0,
            cursor: 0,
        })
    }

    pub fn set_oracles(&mut self, oracles: Box<dyn OracleBuilder>) {
        self.oracles = oracles;
    }

    pub fn set_minimizer(&mut self, minimizer: Box<dyn Minimizer>) {
        self.minimizer = minimizer;
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    pub fn set_callbacks(&mut self, cb: Box<dyn Callbacks>) {
        self.cb = cb;
    }

    /// Check learned and derived clauses against `witness`.
    pub fn set_witness(&mut self, witness: &[Lit]) {
        self.witness = Some(witness.iter().copied().collect());
    }

    pub fn formula(&self) -> &Cnf {
        &self.formula
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Index of the next learned record to read.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Index of the next record written to the derived channel.
    pub fn next_publish(&self) -> u64 {
        self.next_publish
    }

    /// Path of the working formula.
    pub fn combined_path(&self) -> PathBuf {
        self.opts.tmp_dir.join("combine.cnf")
    }

    /// Give back the queue store, e.g. to hand it to a new pipeline.
    pub fn into_queue(self) -> Box<dyn QueueStore> {
        self.queue
    }

    /// Run until refutation, a stop request, `max_iterations` or an error.
    pub fn run(&mut self) -> Result<Outcome> {
        self.bootstrap()?;
        let mut iteration = 0;
        loop {
            if self.opts.max_iterations.map_or(false, |max| iteration >= max) {
                info!("done after {} iterations", iteration);
                return Ok(Outcome::Finished);
            }
            if self.cb.stop() {
                info!("stopped at iteration {}", iteration);
                return Ok(Outcome::Stopped);
            }
            match self.step(iteration) {
                Ok(false) => (),
                Ok(true) | Err(Error::Refuted) => {
                    info!("formula refuted at iteration {}", iteration);
                    return Ok(Outcome::Refuted);
                }
                Err(e) => return Err(e),
            }
            iteration += 1;
        }
    }

    fn bootstrap(&mut self) -> Result<()> {
        clean_dir(&self.opts.tmp_dir)?;
        clean_dir(&self.opts.log_dir)?;
        self.ledger.clear();
        self.formula = self.base.clone();
        self.cursor = 0;

        // clauses published by a previous run are not sent again
        let derived = self.opts.derived_channel.clone();
        let old = read_from(&mut *self.queue, &derived, 0, self.opts.buffer_size)?;
        self.next_publish = old.len() as u64;
        self.published = old.into_iter().map(|r| r.clause).collect();
        if self.next_publish > 0 {
            info!(
                "{} clauses already published on `{}`",
                self.next_publish, derived
            );
        }
        Ok(())
    }

    /// One iteration. Returns `true` if the formula was refuted.
    fn step(&mut self, iteration: usize) -> Result<bool> {
        let start = self.clock.elapsed();
        let mut stats = IterationStats {
            iteration,
            ..IterationStats::default()
        };

        let combined_path = self.combined_path();
        let batch = self.await_input(iteration)?;
        self.validate_learned(&batch)?;
        let combined = combine_into(&mut self.formula, &batch, &combined_path)?;
        self.cursor += batch.len() as u64;
        stats.num_learned = batch.len();
        stats.num_deleted = combined.deleted;
        stats.num_combined = combined.added;
        info!(
            "iteration {}: {} learned records, {} new clauses",
            iteration, stats.num_learned, stats.num_combined
        );

        let log_dir = self.opts.log_dir.join(iteration.to_string());
        fs::create_dir_all(&log_dir)?;
        let search_start = self.clock.elapsed();
        let backdoors = self
            .searcher
            .search(&combined_path, &self.opts.tmp_dir, &log_dir)?;
        stats.search_time = self.clock.elapsed().saturating_sub(search_start);

        let new_clauses = match self.extract(&backdoors, &mut stats) {
            Ok(clauses) => clauses,
            Err(Error::Refuted) => {
                stats.refuted = true;
                vec![]
            }
            Err(e) => return Err(e),
        };
        if !stats.refuted {
            self.publish(new_clauses, &mut stats)?;
        }

        stats.totals = self.ledger.totals();
        stats.num_clauses = self.formula.num_clauses();
        stats.elapsed = self.clock.elapsed().saturating_sub(start);
        fs::write(log_dir.join("statistics"), stats.to_string())?;
        info!(
            "iteration {}: {}, {} published",
            iteration, stats.report, stats.num_published
        );
        self.cb.on_iteration(&stats);
        Ok(stats.refuted)
    }

    /// Wait for learned records. Iteration 0 takes whatever is there.
    fn await_input(&mut self, iteration: usize) -> Result<Vec<Record>> {
        let channel = self.opts.learned_channel.clone();
        let mut polls = 0;
        loop {
            let batch = read_from(&mut *self.queue, &channel, self.cursor, self.opts.buffer_size)?;
            if !batch.is_empty() || iteration == 0 {
                return Ok(batch);
            }
            if polls >= self.opts.max_polls {
                return Err(Error::Stale { polls });
            }
            polls += 1;
            debug!("no new learned clauses (poll {}/{})", polls, self.opts.max_polls);
            self.cb.on_poll(polls);
            self.clock.sleep(self.opts.poll_interval);
        }
    }

    fn check_witness<'a, I>(&self, clauses: I, origin: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'a Clause>,
    {
        if let Some(w) = &self.witness {
            for c in clauses {
                if !c.satisfied_by(w) {
                    return Err(Error::inconsistency(format!(
                        "{} clause {} is falsified by the witness",
                        origin, c
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_learned(&self, batch: &[Record]) -> Result<()> {
        self.check_witness(
            batch.iter().filter(|r| r.mode == Mode::Added).map(|r| &r.clause),
            "learned",
        )
    }

    /// Classify each backdoor and record the derived clauses in the ledger.
    /// Returns the clauses new to the ledger.
    fn extract(&mut self, backdoors: &[Vec<Var>], stats: &mut IterationStats) -> Result<Vec<Clause>> {
        let budget = self.opts.conflict_budget;
        let mut prop = self.oracles.propagator(&self.formula)?;
        let mut limited = match budget {
            Some(_) => self.oracles.limited(&self.formula)?,
            None => None,
        };

        let mut new_clauses = vec![];
        for bd in backdoors {
            if let Err(e) = check_backdoor(bd) {
                warn!("skipping backdoor: {}", e);
                continue;
            }
            let mut tasks = partition_tasks(&mut *prop, bd)?;
            if let (Some(solver), Some(budget)) = (limited.as_mut(), budget) {
                refine_semi_easy(&mut **solver, &mut tasks, budget)?;
            }
            stats.backdoors.push(BackdoorStats::of(&tasks));
            if tasks.hard.is_empty() {
                info!("backdoor {:?} has no hard cuboid", bd);
                stats.refuted = true;
                return Ok(new_clauses);
            }

            let easy = tasks.easy_equivalent();
            let mut clauses = derive_clauses(&mut *self.minimizer, bd, &easy, Semantics::Exclude)?.clauses;
            if self.opts.probe {
                let units = match (limited.as_mut(), budget) {
                    (Some(solver), Some(budget)) => probe_limited(&mut **solver, bd, budget)?,
                    _ => probe(&mut *prop, bd, self.opts.add_units)?,
                };
                stats.num_units += units.len();
                clauses.extend(units.into_iter().map(Clause::unit));
            }

            let rec = self.ledger.record(&clauses, Some(&self.formula))?;
            stats.report += rec.report;
            if self.opts.add_units {
                for c in rec.new_clauses.iter().filter(|c| c.len() == 1) {
                    if !prop.add_clause(c.lits()) {
                        return Err(Error::Refuted);
                    }
                }
            }
            new_clauses.extend(rec.new_clauses);
        }
        Ok(new_clauses)
    }

    /// Send the clauses that were neither published before nor, with
    /// `skip_known`, already in the working formula. Then fold them all into
    /// the working formula.
    fn publish(&mut self, clauses: Vec<Clause>, stats: &mut IterationStats) -> Result<()> {
        let to_send: Vec<&Clause> = clauses
            .iter()
            .filter(|c| !(self.opts.skip_known && self.formula.contains(c)))
            .filter(|c| !self.published.contains(*c))
            .collect();
        self.check_witness(to_send.iter().copied(), "derived")?;

        let channel = self.opts.derived_channel.clone();
        for c in to_send {
            let record = Record::added(c.clone()).to_string();
            self.queue.put(&channel, self.next_publish, &record)?;
            self.next_publish += 1;
            self.published.insert(c.clone());
            stats.num_published += 1;
        }

        for c in clauses {
            self.formula.add_clause(c);
        }
        self.formula.write_file(&self.combined_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{minimize::Cube, queue::MemoryQueue};
    use std::{cell::Cell, rc::Rc};

    fn temp_dirs(name: &str) -> (PathBuf, PathBuf) {
        let root = std::env::temp_dir().join(format!("backdoor-pipeline-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        (root.join("tmp"), root.join("logs"))
    }

    fn opts(name: &str) -> PipelineOpts {
        let (tmp_dir, log_dir) = temp_dirs(name);
        PipelineOpts {
            tmp_dir,
            log_dir,
            max_polls: 3,
            max_iterations: Some(1),
            ..PipelineOpts::default()
        }
    }

    /// x1 fails on its own: (-1 v 3) and (-1 v -3).
    fn base() -> Cnf {
        crate::dimacs::parse(&mut "p cnf 3 2\n-1 3 0\n-1 -3 0\n".as_bytes(), true).unwrap()
    }

    /// Always returns the same backdoors.
    struct Fixed(Vec<Vec<Var>>);

    impl BackdoorSearch for Fixed {
        fn search(&mut self, cnf: &Path, _: &Path, log_dir: &Path) -> Result<Vec<Vec<Var>>> {
            assert!(cnf.exists());
            assert!(log_dir.is_dir());
            Ok(self.0.clone())
        }
    }

    fn x1_x2() -> Box<dyn BackdoorSearch> {
        Box::new(Fixed(vec![vec![Var::new(1), Var::new(2)]]))
    }

    struct FakeClock {
        now: Duration,
        sleeps: Rc<Cell<usize>>,
    }

    impl Clock for FakeClock {
        fn elapsed(&self) -> Duration {
            self.now
        }
        fn sleep(&mut self, d: Duration) {
            self.now += d;
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }

    fn derived(q: &mut dyn QueueStore) -> Vec<String> {
        q.get_batch(DERIVED_CHANNEL, 0, 100).unwrap()
    }

    #[test]
    fn test_one_iteration() {
        let o = opts("one");
        let mut q = MemoryQueue::new();
        q.push(LEARNED_CHANNEL, "2 3 0");
        q.push(LEARNED_CHANNEL, "d 2 3 0");
        let mut p = Pipeline::new(o.clone(), base(), Box::new(q), x1_x2()).unwrap();
        assert_eq!(p.run().unwrap(), Outcome::Finished);
        assert_eq!(p.cursor(), 2);
        assert_eq!(p.next_publish(), 2);
        // the learned clause and both derived clauses are in the formula
        assert_eq!(p.formula().num_clauses(), 5);
        let stats = fs::read_to_string(o.log_dir.join("0").join("statistics")).unwrap();
        assert!(stats.contains("rho = 0.5000"));
        assert!(stats.contains("published: 2"));

        let mut q = p.into_queue();
        assert_eq!(derived(&mut *q), vec!["-1 -2 0", "-1 2 0"]);
    }

    #[test]
    fn test_publish_is_idempotent_across_restarts() {
        let o = opts("restart");
        let mut p = Pipeline::new(o.clone(), base(), Box::new(MemoryQueue::new()), x1_x2()).unwrap();
        p.run().unwrap();
        let q = p.into_queue();

        let mut p = Pipeline::new(o, base(), q, x1_x2()).unwrap();
        assert_eq!(p.run().unwrap(), Outcome::Finished);
        assert_eq!(p.next_publish(), 2);
        assert_eq!(p.ledger().len(), 2);
        let mut q = p.into_queue();
        assert_eq!(derived(&mut *q).len(), 2);
    }

    #[test]
    fn test_stale_after_max_polls() {
        let o = PipelineOpts {
            max_iterations: Some(2),
            ..opts("stale")
        };
        let sleeps = Rc::new(Cell::new(0));
        let mut p = Pipeline::new(o, base(), Box::new(MemoryQueue::new()), x1_x2()).unwrap();
        p.set_clock(Box::new(FakeClock {
            now: Duration::from_secs(0),
            sleeps: sleeps.clone(),
        }));
        assert!(matches!(p.run(), Err(Error::Stale { polls: 3 })));
        assert_eq!(sleeps.get(), 3);
    }

    #[test]
    fn test_combine_is_idempotent() {
        let (tmp, _) = temp_dirs("combine");
        fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("combine.cnf");
        let batch: Vec<Record> = ["1 2 0", "d 1 2 0", "-3 0", "3 -1 0"]
            .iter()
            .map(|s| Record::parse(s).unwrap())
            .collect();

        let mut f = base();
        let first = combine_into(&mut f, &batch, &path).unwrap();
        assert_eq!(first, Combined { added: 2, duplicates: 1, deleted: 1 });
        let bytes1 = fs::read(&path).unwrap();
        let second = combine_into(&mut f, &batch, &path).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(fs::read(&path).unwrap(), bytes1);
        assert!(String::from_utf8(bytes1).unwrap().starts_with("p cnf 3 4\n"));
    }

    #[test]
    fn test_refuted_when_no_hard_cuboid() {
        // both polarities of x1 fail
        let cnf = crate::dimacs::parse(
            &mut "p cnf 3 4\n-1 3 0\n-1 -3 0\n1 2 0\n1 -2 0\n".as_bytes(),
            true,
        )
        .unwrap();
        let searcher = Box::new(Fixed(vec![vec![Var::new(1)]]));
        let mut p = Pipeline::new(opts("refuted"), cnf, Box::new(MemoryQueue::new()), searcher).unwrap();
        assert_eq!(p.run().unwrap(), Outcome::Refuted);
    }

    /// Covers every bucket with the cube of free variables.
    struct Everything;

    impl Minimizer for Everything {
        fn minimize(&mut self, n: usize, _: &[Cube]) -> Result<Vec<Cube>> {
            Ok(vec![vec![None; n]])
        }
    }

    #[test]
    fn test_empty_clause_writes_statistics() {
        let o = opts("empty-clause");
        let mut p = Pipeline::new(o.clone(), base(), Box::new(MemoryQueue::new()), x1_x2()).unwrap();
        p.set_minimizer(Box::new(Everything));
        assert_eq!(p.run().unwrap(), Outcome::Refuted);
        let stats = fs::read_to_string(o.log_dir.join("0").join("statistics")).unwrap();
        assert!(stats.contains("refuted: yes"));
        assert_eq!(p.next_publish(), 0);
        let mut q = p.into_queue();
        assert!(derived(&mut *q).is_empty());
    }

    #[test]
    fn test_witness_violation() {
        let mut q = MemoryQueue::new();
        q.push(LEARNED_CHANNEL, "-2 0");
        let mut p = Pipeline::new(opts("witness"), base(), Box::new(q), x1_x2()).unwrap();
        p.set_witness(&[Lit::from_dimacs(-1).unwrap(), Lit::from_dimacs(2).unwrap()]);
        assert!(matches!(p.run(), Err(Error::Inconsistency(_))));
    }
}
