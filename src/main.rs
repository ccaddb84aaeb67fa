use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use prisma_erd::{ForceConfig, GraphOptions, Strategy, build_graph};

/// Lay out a Prisma schema as an ERD graph and print it as JSON
#[derive(Parser, Debug)]
#[command(name = "prisma-erd", version)]
struct Args {
    /// Prisma schema file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Layout strategy: force or angular
    #[arg(short, long, default_value = "force", value_parser = parse_strategy)]
    strategy: Strategy,

    /// Model in focus for the angular layout
    #[arg(short, long)]
    root: Option<String>,

    /// Seed of the force simulation
    #[arg(long, env = "PRISMA_ERD_SEED")]
    seed: Option<u64>,

    /// Ticks of the force simulation
    #[arg(long)]
    iterations: Option<usize>,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    Strategy::from_str(s).ok_or_else(|| format!("expected 'force' or 'angular', got '{s}'"))
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging();

    let input = match fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let defaults = ForceConfig::default();
    let options = GraphOptions {
        strategy: args.strategy,
        root: args.root,
        force: ForceConfig {
            seed: args.seed.unwrap_or(defaults.seed),
            iterations: args.iterations.unwrap_or(defaults.iterations),
            ..defaults
        },
        ..GraphOptions::default()
    };

    let graph = match build_graph(&input, &options) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&graph)
    } else {
        serde_json::to_string(&graph)
    };
    let json = match json {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to serialize graph: {}", e);
            process::exit(1);
        }
    };

    match args.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}
