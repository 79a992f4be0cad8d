//! Command-line front end for the resolution proof analyzer
//! (`spec.md` §6's CLI surface).
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{App, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info, Level, LevelFilter, Record};

use rproof_core::IgnoreMode;
use rproof_trace::{Dispatcher, Outcome, RunResult};

mod dot;
mod error;

use error::CliError;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(code) => code,
    };
    process::exit(exit_code);
}

/// Mirrors `varisat-cli`'s `init_logging`: a one-line-per-record format with
/// the level name prefixed for anything above `info`, aimed at stderr so
/// `--print-graph`'s DOT output on stdout stays clean.
fn init_logging(verbosity: u64) {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "{}", record.args())
        } else {
            writeln!(buf, "{}: {}", record.level(), record.args())
        }
    };

    let default_level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stderr)
        .format(format)
        .filter(None, default_level);

    if let Ok(env_var) = env::var("RPROOF_LOG") {
        builder.parse_filters(&env_var);
    }

    builder.init();
}

fn parse_ignore_mode(raw: &str) -> Result<IgnoreMode> {
    match raw {
        "0" => Ok(IgnoreMode::None),
        "1" => Ok(IgnoreMode::Learn),
        "2" => Ok(IgnoreMode::ResolveUnit),
        _ => Err(CliError::BadIgnoreMode { raw: raw.to_string() }.into()),
    }
}

fn main_with_err() -> Result<i32> {
    let matches = App::new("rproof")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Analyzes the resolution refutation DAGs in a CDCL solver's trace")
        .arg(
            Arg::with_name("INPUT")
                .help("Trace file to read (stdin if omitted)")
                .index(1),
        )
        .arg(
            Arg::with_name("ignore-mode")
                .long("ignore-mode")
                .takes_value(true)
                .possible_values(&["0", "1", "2"])
                .default_value("0")
                .help("How skipped level-0 literals are accounted for: 0=none, 1=learn, 2=resolve_unit"),
        )
        .arg(
            Arg::with_name("print-graph")
                .long("print-graph")
                .help("Emit DOT for the conflict's resolution graph instead of a statistics line"),
        )
        .arg(
            Arg::with_name("include-unused")
                .long("include-unused")
                .help("Keep learned clauses the refutation never reached in the DOT output"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Raise the log verbosity (repeatable)"),
        )
        .get_matches();

    init_logging(matches.occurrences_of("verbose"));

    let mode = parse_ignore_mode(matches.value_of("ignore-mode").unwrap())?;
    let print_graph = matches.is_present("print-graph");
    let include_unused = matches.is_present("include-unused");

    let reader: Box<dyn BufRead> = match matches.value_of("INPUT") {
        Some(path) => {
            info!("reading trace from '{}'", path);
            let file = File::open(path).with_context(|| format!("failed to open trace file '{}'", path))?;
            Box::new(BufReader::new(file))
        }
        None => {
            info!("reading trace from stdin");
            Box::new(BufReader::new(io::stdin()))
        }
    };

    let dispatcher = Dispatcher::new(mode, print_graph, include_unused);
    let RunResult { shadow, outcome } = dispatcher.run(reader)?;

    match outcome {
        Some(Outcome::Statistics(report)) => {
            info!("analyzed {} vars, {} arena clauses", shadow.num_vars(), shadow.clause_count());
            println!("{}", serde_json::to_string(&report)?);
            Ok(0)
        }
        Some(Outcome::Graph(builder)) => {
            info!("analyzed {} vars, {} arena clauses", shadow.num_vars(), shadow.clause_count());
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            dot::write_graphviz(&mut handle, &builder, &shadow)?;
            Ok(0)
        }
        None => {
            error!("trace ended without a 'C' command; nothing to analyze");
            Ok(1)
        }
    }
}
