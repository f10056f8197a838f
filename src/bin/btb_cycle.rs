//! BTB cycle-chain generator
//!
//! Writes one routine per power of two from 4 up to 2^EXPONENT, each in its
//! own file (`cycle_<N>.s` by default).

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;
use ubgen::codegen::write_atomic;
use ubgen::config::UbgenConfig;
use ubgen::cycle::{sizes_for_exponent, CycleGenerator};
use ubgen::TargetKind;

#[derive(Parser)]
#[command(name = "btb-cycle")]
#[command(version)]
#[command(about = "Generate BTB cycle-chain benchmarks for sizes 4, 8, ..., 2^EXPONENT")]
struct Args {
    /// Largest size as a power-of-two exponent (default from config: 14)
    exponent: Option<u32>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Target architecture (mips32, aarch64)
    #[arg(short, long)]
    target: Option<TargetKind>,

    /// Seed the label shuffle for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Also write a C header declaring every generated routine
    #[arg(long)]
    header: bool,

    /// Config file (default: ubgen.toml in the current directory or a parent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = UbgenConfig::resolve(args.config.as_deref()).context("Failed to load config")?;
    if let Some(target) = args.target {
        config.target.arch = target;
    }
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if args.header {
        config.cycle.header = true;
    }
    let exponent = args.exponent.unwrap_or(config.cycle.exponent);

    // Reject bad parameters before touching the filesystem.
    let sizes = sizes_for_exponent(exponent).context("Invalid exponent")?;
    let target = config.build_target().context("Invalid target configuration")?;
    let generator = CycleGenerator::new(target.as_ref())
        .with_symbol_prefix(config.cycle.symbol_prefix.as_str());

    let mut rng: Box<dyn RngCore> = match args.seed {
        Some(seed) => {
            debug!("Using seed {}", seed);
            Box::new(ChaCha8Rng::seed_from_u64(seed))
        }
        None => Box::new(rand::thread_rng()),
    };

    let dir = &config.output.dir;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    for &size in &sizes {
        let file = generator
            .generate_file(size, &mut *rng)
            .with_context(|| format!("Failed to generate cycle of size {}", size))?;
        let path = dir.join(config.cycle.file_name(size));
        write_atomic(&path, &file.render())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if config.cycle.header {
        let path = dir.join(&config.cycle.header_file);
        write_atomic(&path, &generator.header(&sizes))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!(
        "Generated {} cycle routines for {} (sizes {}..={})",
        sizes.len(),
        target.name(),
        sizes[0],
        sizes[sizes.len() - 1]
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}
