//! ubgen - Synthetic Micro-Benchmark Generators
//!
//! Generates assembly micro-benchmarks that stress specific structures of a
//! processor pipeline simulator.
//!
//! # Generators
//!
//! - **Cycle chains** ([`cycle`]): N labeled program points linked by jumps
//!   into one random N-cycle. Every traversal visits N distinct jump targets,
//!   stressing branch-target-buffer capacity and associativity.
//! - **ILP chains** ([`ilp`]): functions running K independent multiply
//!   chains in an unrolled loop, probing issue width and functional-unit
//!   parallelism.
//!
//! Both generators go through a [`Target`] that supplies the assembly
//! syntax and an injected [`Abi`] (register pool, reserved registers, stack
//! layout), so the same generator serves MIPS32 and AArch64.
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use ubgen::arch::Mips32;
//! use ubgen::cycle::CycleGenerator;
//! use ubgen::ilp::IlpGenerator;
//!
//! let mips = Mips32::new();
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(1);
//! let routine = CycleGenerator::new(&mips).generate(16, &mut rng).unwrap();
//! assert_eq!(routine.name, "goto_test16");
//! assert_eq!(routine.local_labels().count(), 16);
//!
//! let ilp = IlpGenerator::new(&mips, 16, 4).unwrap();
//! let asm = ilp.generate_file().unwrap().render();
//! assert!(asm.contains("func16:"));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐
//! │ btb-cycle    │     │ ilp-gen      │   CLIs (config + flags)
//! └──────┬───────┘     └──────┬───────┘
//!        ▼                    ▼
//! ┌──────────────┐     ┌──────────────┐
//! │ CycleChain   │     │ ChainWidth   │   permutation / unroll
//! └──────┬───────┘     └──────┬───────┘
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌───────────────────┐
//!        │ Target + Abi      │   instruction syntax, registers
//!        └─────────┬─────────┘
//!                  ▼
//!        ┌───────────────────┐
//!        │ AsmFile / header  │   text, atomic file writes
//!        └───────────────────┘
//! ```

#![warn(clippy::all)]

pub mod arch;
pub mod codegen;
pub mod config;
pub mod cycle;
pub mod ilp;

// Re-export commonly used types
pub use arch::{AArch64, Abi, Mips32, Reg, Target, TargetKind};
pub use codegen::{
    write_atomic, AsmFile, AsmFunction, Frame, FunctionTable, GenError, GenResult, SplitImm,
};
pub use config::{ConfigError, ConfigResult, UbgenConfig};
pub use cycle::{CycleChain, CycleGenerator, Edge};
pub use ilp::{ChainWidth, IlpGenerator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
