// USAGE  cargo run --release -- size    [output_dir] [--dry-run]
//        cargo run --release -- counter [output_dir] [stride] [--counter-file time.step]
//        cargo run --release -- inspect file_0000.nc ...

use std::{
    io::{self, Write},
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;

use fix_numrecs::{
    batch::{candidates, counter_source, DEFAULT_OUTPUT_DIR},
    repair::{size_derived_count, DEFAULT_COUNTER_FILE},
    run_batch, HeaderWindow, Patcher, RecordCountSource, SizeDerived,
};

#[derive(Parser)]
#[command(name = "fix_numrecs")]
#[command(about = "Patch numrecs in NetCDF-3 files whose header was never flushed")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the record count from each file's size and record layout
    Size {
        /// Directory holding the *_NNNN.nc files
        #[arg(default_value = DEFAULT_OUTPUT_DIR)]
        dir: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Derive the record count from the run's step counter
    Counter {
        /// Directory holding the *_NNNN.nc files and the counter file
        #[arg(default_value = DEFAULT_OUTPUT_DIR)]
        dir: PathBuf,

        /// Output frequency in time steps
        #[arg(default_value = "300")]
        stride: NonZeroU64,

        /// Name of the step counter file inside `dir`
        #[arg(long, default_value = DEFAULT_COUNTER_FILE)]
        counter_file: String,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the decoded header of individual files
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Size { dir, dry_run } => {
            let files = candidates(&dir)?;
            repair_all(&files, &SizeDerived, dry_run)
        }
        Commands::Counter { dir, stride, counter_file, dry_run } => {
            let source = counter_source(&dir, &counter_file, stride)?;
            println!(
                "{counter_file}={}, stride={} → numrecs={}",
                source.step(),
                source.stride(),
                source.numrecs()
            );
            let files = candidates(&dir)?;
            repair_all(&files, &source, dry_run)
        }
        Commands::Inspect { files } => {
            let mut failed = 0;
            for path in &files {
                if let Err(e) = inspect(path) {
                    eprintln!("{}: {e}", path.display());
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{failed} of {} files could not be inspected", files.len());
            }
            Ok(())
        }
    }
}

fn repair_all(files: &[PathBuf], source: &dyn RecordCountSource, dry_run: bool) -> Result<()> {
    info!(
        files = files.len(),
        source = source.label(),
        dry_run,
        "[{}] repairing numrecs",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let patcher = Patcher::new().dry_run(dry_run);
    let mut stdout = io::stdout().lock();
    let report = run_batch(files, source, &patcher, &mut stdout)?;
    writeln!(stdout, "{report}")?;
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let window = HeaderWindow::read(path)?;
    let header = window.header()?;

    println!("{}", path.display());
    println!("  format:      {:?}", header.format);
    println!("  numrecs:     {}", header.numrecs);
    let dims: Vec<_> = header
        .dimensions
        .iter()
        .map(|d| {
            if d.is_unlimited() {
                format!("{} = UNLIMITED", d.name)
            } else {
                format!("{} = {}", d.name, d.size)
            }
        })
        .collect();
    println!("  dimensions:  {}", dims.join(", "));

    match header.record_layout() {
        Some(layout) => {
            let names: Vec<_> = header.record_variables().map(|v| v.name.as_str()).collect();
            println!("  record vars: {}", names.join(", "));
            println!("  record size: {} bytes", layout.record_size);
            println!("  data begin:  {}", layout.data_begin);
            println!(
                "  implied:     {} records from {} bytes",
                size_derived_count(window.file_size, &layout)?,
                window.file_size
            );
        }
        None => println!("  record vars: none"),
    }
    Ok(())
}
