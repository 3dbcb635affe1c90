use clap::{Arg, ArgAction, Command};
use dreamberd::{repl, runner};
use std::fs;
use std::path::Path;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let matches = Command::new("dreamberd")
        .about("An interpreter for the DreamBerd language, with friendly diagnostics")
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("code")
                .short('c')
                .long("code")
                .help("Run the given source text instead of a file")
                .value_name("CODE")
                .conflicts_with("file"),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log interpreter internals to stderr (-v debug, -vv trace)")
                .action(ArgAction::Count),
        )
        .get_matches();

    setup_logging(matches.get_count("verbose"));

    if let Some(file_path) = matches.get_one::<String>("file") {
        run_file(file_path);
    } else if let Some(code) = matches.get_one::<String>("code") {
        if !runner::run_and_report(code, Some("<code>")) {
            process::exit(1);
        }
    } else {
        // -i and no arguments both land here
        repl::start();
    }
}

/// Logs go to stderr so program output on stdout stays clean. Without `-v`,
/// `RUST_LOG` is honoured and defaults to warnings only.
fn setup_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .init();
}

fn run_file(path: &str) {
    let path = Path::new(path);

    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        process::exit(1);
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            let filename = path.to_string_lossy();
            if !runner::run_and_report(&source, Some(filename.as_ref())) {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}
