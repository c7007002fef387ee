#![allow(dead_code)]

mod cfg;
mod error;
mod graph;
mod opt;
mod program;

#[cfg(test)]
mod test;

use std::fs::File;
use std::io::BufWriter;
use std::{path::PathBuf, process::exit};

use clap::error::ErrorKind;
use clap::Parser;
use log::{info, LevelFilter};

use crate::cfg::Cfg;
use crate::error::{Error, Result};
use crate::opt::Passes;
use crate::program::Program;

#[derive(Parser)]
#[command(name = "bril-lopt", version, about = "Local optimizer for Bril programs")]
struct Cli {
    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// Write the optimized program as JSON
    #[arg(short)]
    output: Option<PathBuf>,

    /// Optimizations to run
    #[arg(long, value_enum, default_value_t = Passes::All)]
    passes: Passes,

    /// Input file name, `-' reads standard input
    input: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            exit(1);
        }
    };

    setup_logger(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {}", e);
        exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let program = if cli.input.as_os_str() == "-" {
        Program::from_reader(std::io::stdin().lock())?
    } else {
        Program::from_file(&cli.input)?
    };

    let mut cfg = Cfg::build(&program)?;
    let stats = opt::optimize(&mut cfg, cli.passes);
    info!(
        "{} rounds, {} instructions deleted",
        stats.rounds, stats.removed
    );

    if let Some(path) = &cli.output {
        let f = File::create(path).map_err(|e| Error::Io(path.clone(), e))?;
        cfg.to_program().to_writer(BufWriter::new(f))?;
    }
    print!("{}", cfg);
    Ok(())
}

fn setup_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}: {}", record.level().as_str().to_lowercase(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();
}
