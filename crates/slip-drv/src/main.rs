//! slip CLI - the interpreter driver and REPL.
//!
//! Evaluates source files and `-e` expressions, or runs an interactive
//! read-eval-print loop on stdin when given nothing else. The memory
//! budgets, timeout and GC verbosity of the underlying context are all
//! exposed as flags.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slip_core::ContextConfig;
use slip_drv::{Interp, SlipError};

/// slip - an embeddable SICP-Scheme interpreter
#[derive(Parser, Debug)]
#[command(name = "slip")]
#[command(author = "Slip Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An embeddable SICP-Scheme interpreter", long_about = None)]
struct Cli {
    /// Source files to evaluate, in order
    files: Vec<PathBuf>,

    /// Expressions to evaluate after the files; results are printed
    #[arg(short = 'e', long = "eval", value_name = "EXPR")]
    expressions: Vec<String>,

    /// Soft memory limit in bytes (arms the garbage collector)
    #[arg(long, default_value_t = 768 * 1024, env = "SLIP_MEM_SOFT")]
    soft_limit: usize,

    /// Hard memory limit in bytes (cancels the running evaluation)
    #[arg(long, default_value_t = 1024 * 1024, env = "SLIP_MEM_HARD")]
    hard_limit: usize,

    /// Evaluation timeout in seconds; 0 disables the timeout
    #[arg(short, long, default_value_t = 60, env = "SLIP_TIMEOUT")]
    timeout: u64,

    /// Emit GC diagnostics
    #[arg(long, env = "SLIP_GC_VERBOSE")]
    gc_verbose: bool,

    /// Dump memory statistics on exit
    #[arg(long)]
    stats: bool,

    /// Dump memory statistics on exit as JSON
    #[arg(long)]
    stats_json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true, env = "SLIP_VERBOSE")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose) {
        eprintln!("slip: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match run_cli(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("slip: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Install the tracing subscriber and the `log` bridge.
///
/// The interpreter crates log through the `log` facade; without the
/// bridge their records (soft-limit warnings, GC summaries, leaked
/// cells at drop) would be silently discarded by this binary.
fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_log::LogTracer::init()
        .map_err(|err| anyhow::anyhow!("failed to initialize log bridge: {err}"))?;

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);

    // set_global_default rather than try_init: the bridge is already
    // installed above, and try_init would attempt it a second time
    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(())
}

fn run_cli(cli: &Cli) -> anyhow::Result<()> {
    let config = ContextConfig::new(cli.soft_limit, cli.hard_limit, cli.gc_verbose, cli.timeout);
    let interp = Interp::new(config)?;
    interp.setup_environment()?;

    tracing::debug!(
        soft = cli.soft_limit,
        hard = cli.hard_limit,
        timeout = cli.timeout,
        "context ready"
    );

    let mut ran_something = false;

    for file in &cli.files {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("could not read {}", file.display()))?;
        interp.run(&source)?;
        ran_something = true;
    }

    let stdout = io::stdout();
    for expression in &cli.expressions {
        for printed in interp.eval_source(expression)? {
            let mut out = stdout.lock();
            writeln!(out, "{printed}")?;
        }
        ran_something = true;
    }

    if !ran_something {
        repl(&interp)?;
    }

    if cli.stats_json {
        let json = serde_json::to_string_pretty(&interp.stats())?;
        println!("{json}");
    } else if cli.stats {
        let mut out = io::stdout().lock();
        interp.write_gc_stats(&mut out)?;
    }

    Ok(())
}

/// Interactive read-eval-print loop over stdin.
fn repl(interp: &Interp) -> Result<(), SlipError> {
    let mut out = io::stdout();
    writeln!(out, "slip {}", env!("CARGO_PKG_VERSION"))?;

    let stdin = io::stdin();
    loop {
        write!(out, "slip> ")?;
        out.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(());
        }

        match interp.eval_source(&line) {
            Ok(results) => {
                for printed in results {
                    writeln!(out, "== {printed}")?;
                }
            }
            // a bad line is reported and the loop continues
            Err(err) => writeln!(out, "-- {err}")?,
        }
    }
}
