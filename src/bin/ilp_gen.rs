//! ILP chain generator
//!
//! Writes `funcs.s` (functions func1..funcK_max) and `funcs.h` (their
//! declarations and a function-pointer table indexed by chain width).
//! Existing files are overwritten.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::path::PathBuf;
use ubgen::codegen::write_atomic;
use ubgen::config::UbgenConfig;
use ubgen::ilp::IlpGenerator;
use ubgen::TargetKind;

#[derive(Parser)]
#[command(name = "ilp-gen")]
#[command(version)]
#[command(about = "Generate ILP chain benchmarks and their function-pointer table")]
struct Args {
    /// Widest chain to generate (default from config: 16)
    #[arg(short = 'k', long)]
    max_width: Option<usize>,

    /// Loop unroll factor (default from config: 4)
    #[arg(short, long)]
    unroll: Option<u32>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Target architecture (mips32, aarch64)
    #[arg(short, long)]
    target: Option<TargetKind>,

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
    if let Some(max_width) = args.max_width {
        config.ilp.max_width = max_width;
    }
    if let Some(unroll) = args.unroll {
        config.ilp.unroll = unroll;
    }

    // Reject bad parameters before touching the filesystem.
    let target = config.build_target().context("Invalid target configuration")?;
    let generator = IlpGenerator::new(target.as_ref(), config.ilp.max_width, config.ilp.unroll)
        .context("Invalid ILP parameters")?
        .with_symbol_prefix(config.ilp.symbol_prefix.as_str());

    let asm = generator
        .generate_file()
        .context("Failed to generate ILP functions")?
        .render();
    let header = generator.generate_header();

    let dir = &config.output.dir;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let asm_path = dir.join(&config.ilp.asm_file);
    write_atomic(&asm_path, &asm)
        .with_context(|| format!("Failed to write {}", asm_path.display()))?;
    let header_path = dir.join(&config.ilp.header_file);
    write_atomic(&header_path, &header)
        .with_context(|| format!("Failed to write {}", header_path.display()))?;

    info!(
        "Generated {} ILP functions for {} (unroll {})",
        generator.max_width(),
        target.name(),
        generator.unroll()
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}
