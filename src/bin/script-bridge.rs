/// Script bridge CLI - run commands against a persistent QuickJS runtime

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::fs;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use script_bridge::{BridgeConfig, Interop};

#[derive(Parser, Debug)]
#[command(name = "script-bridge")]
#[command(about = "Run commands one at a time against a persistent script runtime on a worker thread")]
#[command(version)]
struct Args {
    /// Shared buffer capacity in bytes (overrides SCRIPT_BRIDGE_CAPACITY)
    #[arg(short, long, value_name = "BYTES")]
    capacity: Option<usize>,

    /// Script to run once when the runtime starts
    #[arg(short, long, value_name = "FILE")]
    prelude: Option<PathBuf>,

    /// Command to execute; repeat to run several in order. Without any,
    /// commands are read from stdin, one per line
    #[arg(short, long = "eval", value_name = "CMD")]
    eval: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if let Some(ref path) = args.prelude {
        match fs::read_to_string(path) {
            Ok(source) => config = config.with_prelude(source),
            Err(e) => {
                eprintln!("error: cannot read {}: {}", path.display(), e);
                process::exit(2);
            }
        }
    }

    let mut bridge = match Interop::quickjs(config) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    let code = if args.eval.is_empty() {
        run_lines(&mut bridge)
    } else {
        run_commands(&mut bridge, &args.eval)
    };

    bridge.dispose();
    drop(bridge);
    process::exit(code);
}

/// Run each `--eval` in order, stopping at the first failure.
fn run_commands(bridge: &mut Interop, commands: &[String]) -> i32 {
    for command in commands {
        match bridge.execute(command) {
            Ok(result) => println!("{}", result),
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        }
    }
    0
}

/// Read commands from stdin until EOF. Failures are reported and skipped.
fn run_lines(bridge: &mut Interop) -> i32 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("error: reading stdin: {}", e);
                return 2;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match bridge.execute(&line) {
            Ok(result) => {
                let _ = writeln!(stdout, "{}", result);
                let _ = stdout.flush();
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }
    0
}
