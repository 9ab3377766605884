//! fatjet-skim CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod input;
mod run;

#[derive(Parser)]
#[command(name = "fatjet-skim")]
#[command(about = "Columnar fat-jet event skimming")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Skim event chunks into filtered columnar tables
    Skim {
        /// Input Parquet chunk files or directories
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,

        /// Dataset tag ("<year>_<dataset-name>")
        #[arg(short, long)]
        dataset: String,

        /// Output directory for skimmed tables and the cutflow report
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Cross-section table (JSON: dataset name -> xsec in pb)
        #[arg(long)]
        xsecs: Option<PathBuf>,

        /// Number of leading fat jets saved per event
        #[arg(long, default_value = "2")]
        num_fatjets: usize,

        /// Threads (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    match cli.command {
        Commands::Skim { input, dataset, output_dir, xsecs, num_fatjets, threads } => {
            run::skim(run::SkimOptions {
                inputs: input,
                dataset,
                output_dir,
                xsecs,
                num_fatjets,
                threads,
            })
        }
    }
}
