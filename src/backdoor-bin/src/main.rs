/*****************************************************************************************[main.rs]
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

extern crate anyhow;
extern crate backdoor;
extern crate clap;
extern crate cpu_time;
extern crate env_logger;
extern crate flate2;
extern crate indicatif;
#[macro_use]
extern crate log;

use anyhow::{bail, Context};
use backdoor::{
    callbacks::Callbacks,
    classify::{partition_tasks, refine_semi_easy},
    clause::{SizeClass, SizeCounts, Var},
    dimacs::{self, open_autogz, write_clauses, Cnf},
    drat::{extract_added, ExtractOpts},
    external::{parse_backdoors_file, ExternalSearcher, ExternalSolverOpts, SearcherOpts, StandardOracles},
    extract::{derive_clauses, Semantics},
    interface::{OracleBuilder, Propagate, SolveLimited},
    ledger::Ledger,
    minimize::{Espresso, Minimizer, Passthrough},
    pipeline::{IterationStats, Outcome, Pipeline, PipelineOpts},
    probe::{probe, probe_limited, DerivedUnits},
    queue::{DirQueue, Encoding, QueueStore},
    Error,
};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use flate2::{write::GzEncoder, Compression};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::str::FromStr;
use std::time::Duration;

mod system;

fn main() {
    env_logger::init();
    let exitcode = main2().unwrap_or_else(|err| {
        eprintln!("error: {:#}", err);
        exit(1)
    });
    exit(exitcode);
}

fn main2() -> anyhow::Result<i32> {
    let usage = system::Usage::start();

    let cnf_arg = || {
        Arg::with_name("cnf")
            .long("cnf")
            .help("File with the CNF (possibly gzipped)")
            .takes_value(true)
            .required(true)
    };
    let backdoors_arg = || {
        Arg::with_name("backdoors")
            .long("backdoors")
            .help("File with backdoors, one `[v1, v2, ...]` per line (0-based)")
            .takes_value(true)
            .required(true)
    };
    let output_arg = || {
        Arg::with_name("output")
            .short("o")
            .long("output")
            .help("Output file (gzipped if it ends with .gz)")
            .takes_value(true)
    };
    let limit_arg = || {
        Arg::with_name("limit")
            .long("limit")
            .help("Number of backdoors to use (prefix size)")
            .takes_value(true)
    };
    let num_confl_arg = || {
        Arg::with_name("num-confl")
            .long("num-confl")
            .help("Conflict budget of the external solver (0 for propagation only)")
            .default_value("0")
            .takes_value(true)
    };
    let solver_arg = || {
        Arg::with_name("solver")
            .long("solver")
            .help("Solver binary used for budgeted search (exit codes 10/20)")
            .takes_value(true)
    };
    let budget_arg = || {
        Arg::with_name("budget-arg")
            .long("budget-arg")
            .help("Solver argument carrying the conflict budget, `{}` is the budget")
            .takes_value(true)
    };
    let add_units_arg = || {
        Arg::with_name("add-units")
            .long("add-units")
            .help("Add derived units to the propagation oracle")
    };
    let espresso_arg = || {
        Arg::with_name("espresso")
            .long("espresso")
            .help("Path to the espresso minimizer (no minimization if absent)")
            .takes_value(true)
    };

    let matches = App::new("backdoor")
        .version("0.1.0")
        .about("Derives clauses from SAT backdoors and exchanges them with a solver")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("produce")
                .about("Run the producer loop")
                .arg(cnf_arg())
                .arg(Arg::with_name("tmp").long("tmp").takes_value(true).required(true)
                     .help("Scratch directory (emptied at startup)"))
                .arg(Arg::with_name("root-log-dir").long("root-log-dir").takes_value(true).required(true)
                     .help("Directory for per-iteration logs (emptied at startup)"))
                .arg(Arg::with_name("searcher").long("searcher").takes_value(true)
                     .help("Backdoor searcher binary"))
                .arg(Arg::with_name("ea-num-runs").long("ea-num-runs").takes_value(true).default_value("2")
                     .help("Number of backdoors searched per iteration"))
                .arg(Arg::with_name("random-seed").long("random-seed").takes_value(true).default_value("42"))
                .arg(Arg::with_name("ea-instance-size").long("ea-instance-size").takes_value(true).default_value("10")
                     .help("Size of backdoors"))
                .arg(Arg::with_name("ea-num-iters").long("ea-num-iters").takes_value(true).default_value("2000")
                     .help("Search iterations per backdoor"))
                .arg(Arg::with_name("buffer-size").long("buffer-size").takes_value(true).default_value("1000")
                     .help("Records fetched per queue request"))
                .arg(Arg::with_name("queue-dir").long("queue-dir").takes_value(true)
                     .conflicts_with("redis")
                     .help("Directory holding the queue channels"))
                .arg(Arg::with_name("redis").long("redis").takes_value(true)
                     .help("Redis URL holding the queue channels, e.g. redis://localhost:6379"))
                .arg(Arg::with_name("encoding").long("encoding").takes_value(true).default_value("scalar")
                     .possible_values(&["scalar", "list"]))
                .arg(Arg::with_name("poll-interval").long("poll-interval").takes_value(true).default_value("10")
                     .help("Seconds between polls for learned clauses"))
                .arg(Arg::with_name("max-polls").long("max-polls").takes_value(true).default_value("30")
                     .help("Empty polls tolerated before giving up"))
                .arg(Arg::with_name("max-iterations").long("max-iterations").takes_value(true))
                .arg(num_confl_arg())
                .arg(solver_arg())
                .arg(budget_arg())
                .arg(espresso_arg())
                .arg(Arg::with_name("probe").long("probe").help("Add failed-literal probing units"))
                .arg(add_units_arg())
                .arg(Arg::with_name("allow-duplicates").long("allow-duplicates")
                     .help("Publish derived clauses already present in the formula"))
                .arg(Arg::with_name("validation").long("validation").takes_value(true)
                     .help("File whose first line is a model every clause must satisfy")),
        )
        .subcommand(
            SubCommand::with_name("drat")
                .about("Extract added clauses from a binary DRAT proof")
                .arg(Arg::with_name("proof").long("proof").takes_value(true).required(true)
                     .help("File with the DRAT proof (possibly gzipped)"))
                .arg(output_arg())
                .arg(Arg::with_name("limit").long("limit").takes_value(true)
                     .help("Maximum number of extracted clauses"))
                .arg(Arg::with_name("max-size").long("max-size").takes_value(true)
                     .help("Maximum size of extracted clauses"))
                .arg(Arg::with_name("sort").long("sort").help("Sort the extracted clauses")),
        )
        .subcommand(
            SubCommand::with_name("rho")
                .about("Compute rho for each backdoor")
                .arg(cnf_arg())
                .arg(backdoors_arg())
                .arg(output_arg())
                .arg(limit_arg())
                .arg(num_confl_arg())
                .arg(solver_arg())
                .arg(budget_arg()),
        )
        .subcommand(
            SubCommand::with_name("probe")
                .about("Failed-literal probing on backdoor variables")
                .arg(cnf_arg())
                .arg(backdoors_arg())
                .arg(output_arg())
                .arg(limit_arg())
                .arg(add_units_arg())
                .arg(num_confl_arg())
                .arg(solver_arg())
                .arg(budget_arg()),
        )
        .subcommand(
            SubCommand::with_name("derive")
                .about("Derive clauses from the easy cuboids of each backdoor")
                .arg(cnf_arg())
                .arg(backdoors_arg())
                .arg(output_arg())
                .arg(limit_arg())
                .arg(add_units_arg())
                .arg(num_confl_arg())
                .arg(solver_arg())
                .arg(budget_arg())
                .arg(espresso_arg())
                .arg(Arg::with_name("no-duplicates").long("no-duplicates")
                     .help("Do not write clauses already present in the CNF")),
        )
        .get_matches();

    let exitcode = match matches.subcommand() {
        ("produce", Some(m)) => cmd_produce(m)?,
        ("drat", Some(m)) => cmd_drat(m)?,
        ("rho", Some(m)) => cmd_rho(m)?,
        ("probe", Some(m)) => cmd_probe(m)?,
        ("derive", Some(m)) => cmd_derive(m)?,
        _ => bail!("{}", matches.usage()),
    };
    print!("{}", usage);
    Ok(exitcode)
}

fn parse_or<T: FromStr>(m: &ArgMatches, name: &str, default: T) -> T {
    m.value_of(name).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn parse_opt<T: FromStr>(m: &ArgMatches, name: &str) -> Option<T> {
    m.value_of(name).and_then(|s| s.parse().ok())
}

fn required<'a>(m: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    m.value_of(name)
        .with_context(|| format!("missing --{}", name))
}

/// Writer for `path`, compressed if the name ends with `.gz`.
fn create_output(path: &str) -> anyhow::Result<Box<dyn Write>> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path))?;
    if path.ends_with(".gz") {
        Ok(Box::new(GzEncoder::new(BufWriter::new(file), Compression::default())))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

fn load_cnf(m: &ArgMatches) -> anyhow::Result<Cnf> {
    let path = required(m, "cnf")?;
    debug!("loading CNF from {}", path);
    let cnf = dimacs::parse_file(Path::new(path), false)
        .with_context(|| format!("cannot read CNF from {}", path))?;
    println!("c CNF: {} variables, {} clauses", cnf.num_vars(), cnf.num_clauses());
    println!("c CNF clauses: {}", SizeCounts::of(cnf.clauses()));
    Ok(cnf)
}

fn load_backdoors(m: &ArgMatches) -> anyhow::Result<Vec<Vec<Var>>> {
    let path = required(m, "backdoors")?;
    let mut backdoors = parse_backdoors_file(Path::new(path))
        .with_context(|| format!("cannot read backdoors from {}", path))?;
    println!("c Backdoors: {}", backdoors.len());
    if let Some(limit) = parse_opt::<usize>(m, "limit") {
        println!("c Limiting to {} backdoors", limit);
        backdoors.truncate(limit);
    }
    Ok(backdoors)
}

/// The conflict budget, if budgeted search was asked for.
fn budget(m: &ArgMatches) -> anyhow::Result<Option<u64>> {
    let budget = parse_opt::<u64>(m, "num-confl").filter(|&n| n > 0);
    if budget.is_some() && m.value_of("solver").is_none() {
        bail!("--num-confl needs --solver");
    }
    Ok(budget)
}

fn oracles(m: &ArgMatches) -> StandardOracles {
    let solver = m.value_of("solver").map(|program| {
        let mut opts = ExternalSolverOpts {
            program: program.to_string(),
            ..ExternalSolverOpts::default()
        };
        if let Some(arg) = m.value_of("budget-arg") {
            opts.budget_arg = arg.to_string();
        }
        opts
    });
    StandardOracles { solver }
}

fn minimizer(m: &ArgMatches) -> Box<dyn Minimizer> {
    match m.value_of("espresso") {
        Some(program) => Box::new(Espresso::new(program)),
        None => Box::new(Passthrough),
    }
}

type Oracles = (Box<dyn Propagate>, Option<Box<dyn SolveLimited>>);

fn build_oracles(m: &ArgMatches, cnf: &Cnf, budget: Option<u64>) -> anyhow::Result<Oracles> {
    let mut builder = oracles(m);
    let prop = builder.propagator(cnf)?;
    let limited = match budget {
        Some(_) => builder.limited(cnf)?,
        None => None,
    };
    Ok((prop, limited))
}

/// Shows decoding progress of a proof file.
struct ProofProgress {
    pb: ProgressBar,
}

impl Callbacks for ProofProgress {
    fn on_proof_progress(&mut self, bytes: u64) {
        self.pb.set_position(bytes);
    }

    fn on_proof_done(&mut self, bytes: u64) {
        self.pb.set_position(bytes);
        self.pb.finish();
    }
}

fn cmd_drat(m: &ArgMatches) -> anyhow::Result<i32> {
    let path = required(m, "proof")?;
    let input = open_autogz(Path::new(path)).with_context(|| format!("cannot open proof {}", path))?;
    let len = fs::metadata(path).map(|md| md.len()).unwrap_or(0);
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed}] [{bar:40.cyan/white}] {bytes}/{total_bytes} (ETA: {eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let opts = ExtractOpts {
        max_size: parse_opt(m, "max-size"),
        limit: parse_opt(m, "limit"),
        sort: m.is_present("sort"),
    };
    let res = extract_added(input, &opts, &mut ProofProgress { pb })
        .with_context(|| format!("cannot decode proof {}", path))?;

    println!(
        "c Extracted {} clauses ({} deletions ignored, {} oversized dropped) from {} bytes",
        res.clauses.len(),
        res.num_deleted,
        res.num_dropped,
        res.bytes_read
    );
    if res.limit_reached {
        println!("c Limit reached");
    }
    println!("c Extracted: {}", SizeCounts::of(&res.clauses));

    if let Some(out) = m.value_of("output") {
        println!("c Writing extracted clauses to '{}'...", out);
        let mut w = create_output(out)?;
        write_clauses(&mut w, &res.clauses)?;
        w.flush()?;
    }
    Ok(0)
}

fn cmd_rho(m: &ArgMatches) -> anyhow::Result<i32> {
    let cnf = load_cnf(m)?;
    let backdoors = load_backdoors(m)?;
    let budget = budget(m)?;
    let (mut prop, mut limited) = build_oracles(m, &cnf, budget)?;

    let mut rows = vec![];
    for (i, bd) in backdoors.iter().enumerate() {
        let mut tasks = partition_tasks(&mut *prop, bd)?;
        if let (Some(solver), Some(budget)) = (limited.as_mut(), budget) {
            refine_semi_easy(&mut **solver, &mut tasks, budget)?;
        }
        println!(
            "[{}/{}] backdoor of size {}: {} hard, {} easy, {} semi-easy, rho = {}, rho_total = {}",
            i + 1,
            backdoors.len(),
            bd.len(),
            tasks.hard.len(),
            tasks.easy.len(),
            tasks.semi_easy.len(),
            tasks.rho(),
            tasks.rho_total()
        );
        rows.push(tasks);
    }
    if !rows.is_empty() {
        let mean = rows.iter().map(|t| t.rho()).sum::<f64>() / rows.len() as f64;
        println!("c Mean rho: {:.4}", mean);
    }

    if let Some(out) = m.value_of("output") {
        println!("c Writing rho values to '{}'...", out);
        let mut w = create_output(out)?;
        if budget.is_some() {
            writeln!(w, "index,hard,easy,semi,rho,rho_t")?;
        } else {
            writeln!(w, "index,hard,easy,rho")?;
        }
        for (i, t) in rows.iter().enumerate() {
            if budget.is_some() {
                writeln!(
                    w,
                    "{},{},{},{},{},{}",
                    i,
                    t.hard.len(),
                    t.easy.len(),
                    t.semi_easy.len(),
                    t.rho(),
                    t.rho_total()
                )?;
            } else {
                writeln!(w, "{},{},{},{}", i, t.hard.len(), t.easy.len(), t.rho())?;
            }
        }
        w.flush()?;
    }
    Ok(0)
}

fn cmd_probe(m: &ArgMatches) -> anyhow::Result<i32> {
    let cnf = load_cnf(m)?;
    let backdoors = load_backdoors(m)?;
    let budget = budget(m)?;
    let add_units = m.is_present("add-units");
    let (mut prop, mut limited) = build_oracles(m, &cnf, budget)?;

    let mut units = DerivedUnits::new();
    for (i, bd) in backdoors.iter().enumerate() {
        let found = match (limited.as_mut(), budget) {
            (Some(solver), Some(budget)) => probe_limited(&mut **solver, bd, budget)?,
            _ => probe(&mut *prop, bd, false)?,
        };
        let new = units.extend(&found)?;
        println!(
            "[{}/{}] derived {} units ({} new): {:?}",
            i + 1,
            backdoors.len(),
            found.len(),
            new.len(),
            found
        );
        if add_units {
            for &u in &new {
                if !prop.add_clause(&[u]) {
                    return Err(Error::Refuted.into());
                }
            }
        }
    }

    let all: Vec<String> = units.iter().map(|u| u.to_string()).collect();
    println!("c Total {} unique derived units", units.len());
    if let Some(out) = m.value_of("output") {
        println!("c Writing derived units to '{}'...", out);
        let mut w = create_output(out)?;
        writeln!(w, "{}", all.join(" "))?;
        w.flush()?;
    }
    Ok(0)
}

fn cmd_derive(m: &ArgMatches) -> anyhow::Result<i32> {
    let cnf = load_cnf(m)?;
    let backdoors = load_backdoors(m)?;
    let budget = budget(m)?;
    let add_units = m.is_present("add-units");
    let (mut prop, mut limited) = build_oracles(m, &cnf, budget)?;
    let mut minimizer = minimizer(m);

    let mut ledger = Ledger::new();
    for (i, bd) in backdoors.iter().enumerate() {
        println!("=== [{}/{}] backdoor with {} variables: {:?}", i + 1, backdoors.len(), bd.len(), bd);
        let mut tasks = partition_tasks(&mut *prop, bd)?;
        if let (Some(solver), Some(budget)) = (limited.as_mut(), budget) {
            refine_semi_easy(&mut **solver, &mut tasks, budget)?;
        }
        println!(
            "{} hard, {} easy, {} semi-easy, rho = {}",
            tasks.hard.len(),
            tasks.easy.len(),
            tasks.semi_easy.len(),
            tasks.rho_total()
        );

        let derived = derive_clauses(&mut *minimizer, bd, &tasks.easy_equivalent(), Semantics::Exclude)?;
        let rec = match ledger.record(&derived.clauses, Some(&cnf)) {
            Err(Error::Refuted) => {
                println!("c Derived the empty clause");
                println!("s UNSATISFIABLE");
                return Ok(20);
            }
            r => r?,
        };
        for &class in &SizeClass::ALL {
            println!(
                "Derived {} ({} new, {} in cnf) {}",
                rec.report.derived.get(class),
                rec.report.new.get(class),
                rec.report.in_cnf.get(class),
                class.name()
            );
        }
        if add_units {
            for c in rec.new_clauses.iter().filter(|c| c.len() == 1) {
                if !prop.add_clause(c.lits()) {
                    return Err(Error::Refuted.into());
                }
            }
        }
    }

    let in_cnf = SizeCounts::of(ledger.iter().filter(|c| cnf.contains(c)));
    println!("c Total derived: {}", ledger.totals());
    println!("c Already in CNF: {}", in_cnf);

    if let Some(out) = m.value_of("output") {
        let skip = m.is_present("no-duplicates");
        println!("c Writing derived clauses to '{}'...", out);
        let mut w = create_output(out)?;
        write_clauses(&mut w, ledger.iter().filter(|c| !(skip && cnf.contains(c))))?;
        w.flush()?;
    }
    Ok(0)
}

/// Reports the producer loop on stdout.
struct ProduceProgress;

impl Callbacks for ProduceProgress {
    fn on_poll(&mut self, attempt: usize) {
        println!("c No new learned clauses (attempt {}), sleeping", attempt);
    }

    fn on_iteration(&mut self, stats: &IterationStats) {
        println!(
            "c Iteration {}: {} learned, {} backdoors, {} new derived, {} published, {:.3}s",
            stats.iteration,
            stats.num_learned,
            stats.backdoors.len(),
            stats.report.new.total(),
            stats.num_published,
            stats.elapsed.as_secs_f64()
        );
    }
}

#[cfg(feature = "redis")]
fn open_redis(url: &str, encoding: Encoding) -> anyhow::Result<Box<dyn QueueStore>> {
    let q = backdoor::queue::RedisQueue::open(url, encoding)
        .with_context(|| format!("cannot connect to {}", url))?;
    Ok(Box::new(q))
}

#[cfg(not(feature = "redis"))]
fn open_redis(_url: &str, _encoding: Encoding) -> anyhow::Result<Box<dyn QueueStore>> {
    bail!("this binary was built without the `redis` feature")
}

fn cmd_produce(m: &ArgMatches) -> anyhow::Result<i32> {
    let base = load_cnf(m)?;
    let encoding: Encoding = m.value_of("encoding").unwrap_or("scalar").parse()?;

    let defaults = PipelineOpts::default();
    let opts = PipelineOpts {
        tmp_dir: PathBuf::from(required(m, "tmp")?),
        log_dir: PathBuf::from(required(m, "root-log-dir")?),
        encoding,
        buffer_size: parse_or(m, "buffer-size", defaults.buffer_size),
        poll_interval: Duration::from_secs_f64(parse_or(
            m,
            "poll-interval",
            defaults.poll_interval.as_secs_f64(),
        )),
        max_polls: parse_or(m, "max-polls", defaults.max_polls),
        max_iterations: parse_opt(m, "max-iterations"),
        conflict_budget: budget(m)?,
        probe: m.is_present("probe"),
        add_units: m.is_present("add-units"),
        skip_known: !m.is_present("allow-duplicates"),
        validate: m.value_of("validation").map(PathBuf::from),
        ..defaults
    };

    let search_defaults = SearcherOpts::default();
    let searcher = ExternalSearcher::new(SearcherOpts {
        program: m
            .value_of("searcher")
            .map(|s| s.to_string())
            .unwrap_or(search_defaults.program),
        num_runs: parse_or(m, "ea-num-runs", search_defaults.num_runs),
        instance_size: parse_or(m, "ea-instance-size", search_defaults.instance_size),
        num_iters: parse_or(m, "ea-num-iters", search_defaults.num_iters),
        seed: parse_or(m, "random-seed", search_defaults.seed),
    })?;

    let queue: Box<dyn QueueStore> = match m.value_of("redis") {
        Some(url) => open_redis(url, encoding)?,
        None => {
            let dir = m.value_of("queue-dir").unwrap_or("queue");
            Box::new(DirQueue::new(Path::new(dir), encoding)?)
        }
    };
    info!("queue encoding: {}", encoding);

    let mut pipeline = Pipeline::new(opts, base, queue, Box::new(searcher))?;
    pipeline.set_oracles(Box::new(oracles(m)));
    pipeline.set_minimizer(minimizer(m));
    pipeline.set_callbacks(Box::new(ProduceProgress));

    match pipeline.run()? {
        Outcome::Refuted => {
            println!("s UNSATISFIABLE");
            Ok(20)
        }
        Outcome::Finished | Outcome::Stopped => Ok(0),
    }
}
