//! Command-line front-end: read a GraphML temporal network, check it, and
//! report the outcome.
//!
//! Exit codes: 0 consistent/controllable, 1 inconsistent/uncontrollable,
//! 2 error (malformed input, timeout, overflow).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use tnetck::config::CheckOptions;
use tnetck::{engine, graphml};

#[derive(Parser, Debug)]
#[command(name = "tnetck", version, about = "Temporal network consistency checker")]
struct Args {
    /// Input GraphML network (.stn, .stnu, .cstn, .cstnu).
    input: PathBuf,

    /// Write the checked graph (with derived edges) to this file.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Minimum delay between an observation and a reaction to it.
    #[arg(short = 'r', long, default_value_t = 0)]
    reaction_time: i32,

    /// Wall-clock budget in seconds.
    #[arg(short = 't', long, default_value_t = 1800)]
    timeout: u64,

    /// Strip unknown-literal entries and empty edges from the output.
    #[arg(long)]
    cleaned: bool,

    /// Restrict propagation to constraints ending at Z (faster).
    #[arg(long)]
    only_to_z: bool,

    /// Print the status report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!(kind = %e.kind(), "{e}");
            eprintln!("tnetck: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, tnetck::TnError> {
    let mut graph = graphml::read_graphml_file(&args.input)?;

    let opts = CheckOptions {
        reaction_time: args.reaction_time,
        timeout_seconds: args.timeout,
        cleaned: args.cleaned,
        propagation_only_to_z: args.only_to_z,
        ..CheckOptions::default()
    };
    let status = engine::check(&mut graph, &opts)?;

    if args.json {
        match status.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("tnetck: could not serialize status: {e}"),
        }
    } else {
        println!("{status}");
    }

    if let Some(out) = &args.output {
        graphml::write_graphml_file(&graph, out)?;
    }

    Ok(if !status.finished {
        // Timeout (or exhausted budget) is an error outcome for callers.
        ExitCode::from(2)
    } else if status.consistency {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "tnetck=info",
        1 => "tnetck=debug",
        _ => "tnetck=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
