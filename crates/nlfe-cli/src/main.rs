use std::path::PathBuf;
use std::process::ExitCode;

use nlfe_io::save_checkpoint;
use structopt::StructOpt;
use tracing::{Level, error, info};

mod config;
mod cyclic;

use config::CyclicTestConfig;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "nlfe-cli",
    about = "Quasi-static cyclic tests of nonlinear bearing elements"
)]
enum Command {
    /// Run a displacement-controlled cyclic test and print (u, q) as JSON lines
    Cyclic {
        /// Test description (JSON)
        #[structopt(parse(from_os_str))]
        config: PathBuf,

        /// Write the final element state to this checkpoint file
        #[structopt(long, parse(from_os_str))]
        checkpoint: Option<PathBuf>,

        /// Log level: -v info, -vv debug
        #[structopt(short, long, parse(from_occurrences))]
        verbose: u8,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run_cyclic(
    config_path: PathBuf,
    checkpoint_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CyclicTestConfig::from_file(&config_path)?;
    let mut model = cyclic::build_model(&config)?;
    let points = cyclic::run(&config, &mut model)?;

    for point in &points {
        println!("{}", serde_json::to_string(point)?);
    }

    if let Some(path) = checkpoint_path {
        let checkpoint = cyclic::checkpoint(&config, &model, points.len())?;
        save_checkpoint(&path, &checkpoint)?;
        info!(path = %path.display(), "checkpoint written");
    }
    Ok(())
}

fn main() -> ExitCode {
    match Command::from_args() {
        Command::Cyclic {
            config,
            checkpoint,
            verbose,
        } => {
            init_logging(verbose);
            match run_cyclic(config, checkpoint) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    error!(error = %err, "cyclic test failed");
                    eprintln!("error: {err}");
                    ExitCode::from(1)
                }
            }
        }
    }
}
