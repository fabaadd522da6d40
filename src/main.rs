//! VM Manager - runs a read/write trace through the software MMU
//!
//! Usage: vm-manager [OPTIONS] <trace_file> [output_file]
//!
//! Each trace line is `r <va>` or `w <va> <value>`. One result token per
//! operation is written to the output file (or stdout): the value read,
//! `ok` for a write, `err` for a failed access.

mod logger;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use vm_manager::io::{format_results, load_config, read_trace, run_trace, write_results};
use vm_manager::{MemoryConfig, VMManager};

#[derive(Parser)]
#[command(name = "vm-manager")]
#[command(about = "Virtual memory simulator - hierarchical page tables with on-demand paging")]
struct Args {
    /// Trace file with one `r <va>` or `w <va> <value>` per line
    trace_file: PathBuf,

    /// Output file for the results (default: stdout)
    output_file: Option<PathBuf>,

    /// JSON file with `offset_width`, `virtual_address_width` and `num_frames`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the offset width
    #[arg(long)]
    offset_width: Option<u32>,

    /// Override the virtual address width
    #[arg(long)]
    address_width: Option<u32>,

    /// Override the number of physical frames
    #[arg(long)]
    frames: Option<usize>,

    /// Increase logging (-v info, -vv page faults, -vvv every walk)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose).context("Failed to install logger")?;
    run(&args)
}

fn build_config(args: &Args) -> Result<MemoryConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MemoryConfig::default(),
    };
    if let Some(width) = args.offset_width {
        config.offset_width = width;
    }
    if let Some(width) = args.address_width {
        config.virtual_address_width = width;
    }
    if let Some(frames) = args.frames {
        config.num_frames = frames;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let mut vm = VMManager::with_config(config).context("Invalid memory configuration")?;
    log::info!(
        "geometry: {} frames of {} words, {} table levels, {} pages",
        config.num_frames,
        config.page_size(),
        config.tables_depth(),
        config.num_pages()
    );

    let operations = read_trace(&args.trace_file)
        .with_context(|| format!("Failed to read trace {}", args.trace_file.display()))?;
    log::info!("operations to run: {}", operations.len());

    vm.initialize();
    let results = run_trace(&mut vm, &operations);

    let successes = results.iter().filter(|r| r.is_success()).count();
    let stats = vm.stats();
    log::info!("successful operations: {}", successes);
    log::info!("failed operations: {}", results.len() - successes);
    log::info!(
        "page faults: {} (fresh frames {}, reclaimed tables {}, evictions {})",
        stats.page_faults,
        stats.fresh_frames,
        stats.reclaimed_tables,
        stats.evictions
    );

    match &args.output_file {
        Some(path) => {
            write_results(path, &results)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            log::info!("results written to: {}", path.display());
        }
        None => println!("{}", format_results(&results)),
    }

    Ok(())
}
