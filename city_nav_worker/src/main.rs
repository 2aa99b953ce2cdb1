// CLI entry point for an out-of-process navigation worker.
//
// Reads framed `ToWorker` messages from stdin and writes framed `FromWorker`
// replies to stdout until stdin closes. Logs go to stderr, since stdout
// carries the protocol. See `stdio.rs` for the framing loop and `worker.rs`
// for the state machine.
//
// Usage:
//   city-nav-worker [OPTIONS]
//     --name <NAME>   Worker name used in log lines (default: stdio)
//     --verbose, -v   Log every query (DEBUG level)

use std::io::{self, BufReader, BufWriter};

use city_nav_worker::stdio::serve;
use tracing::Level;

struct Options {
    name: String,
    verbose: bool,
}

fn main() {
    let options = parse_args();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if options.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let reader = BufReader::new(stdin.lock());
    let writer = BufWriter::new(stdout.lock());
    if let Err(e) = serve(&options.name, reader, writer) {
        tracing::error!(error = %e, "navigation worker stopped on a stream error");
        std::process::exit(1);
    }
}

/// Parse command-line arguments with plain `std::env::args()` matching.
fn parse_args() -> Options {
    let mut options = Options {
        name: "stdio".into(),
        verbose: false,
    };
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--name" => {
                i += 1;
                options.name = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--name requires a value");
                    std::process::exit(1);
                });
            }
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn print_usage() {
    eprintln!("Usage: city-nav-worker [OPTIONS]");
    eprintln!();
    eprintln!("Serves the navigation worker protocol on stdin/stdout.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --name <NAME>   Worker name used in log lines (default: stdio)");
    eprintln!("  --verbose, -v   Log every query (DEBUG level)");
    eprintln!("  --help, -h      Show this help");
}
