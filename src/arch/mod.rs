//! Target Architecture Abstraction for ubgen
//!
//! The generators never spell out instructions themselves. Everything that
//! depends on the instruction set or the calling convention goes through a
//! [`Target`], which pairs an assembly syntax with an injected [`Abi`]
//! description (argument/return registers, reserved registers, the ordered
//! accumulator pool, stack slot layout).
//!
//! # Supported Targets
//!
//! | Target | ABI | Accumulator pool | Notes |
//! |--------|-----|------------------|-------|
//! | MIPS32 | o32 | 18 registers | Reference target, branch delay slots |
//! | AArch64 | AAPCS64 | 16 registers | No delay slots, 16-byte stack alignment |
//!
//! # Abstraction
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Target Trait                           │
//! │  fn abi() -> &Abi                                           │
//! │  fn jump(label) / branch_nonzero_dec(..) / ...              │
//! │  fn mul(rd, rs1, rs2) / load_upper16(..) / or_low16(..)     │
//! │  fn store_reg(..) / load_reg(..) / ret(delay)               │
//! └────────────┬───────────────────────┬────────────────────────┘
//!              │                       │
//!       ┌──────┴───────┐        ┌──────┴───────┐
//!       │   Mips32     │        │   AArch64    │
//!       └──────────────┘        └──────────────┘
//! ```

pub mod aarch64;
pub mod mips32;

pub use aarch64::AArch64;
pub use mips32::Mips32;

use crate::codegen::{GenError, GenResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Architectural general-purpose register number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u8);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Calling-convention description injected into a target.
///
/// The accumulator pool is ordered: narrow chains take registers from the
/// front, so caller-saved temporaries are listed before callee-saved ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abi {
    /// Incoming integer argument
    pub arg: Reg,
    /// Integer return value
    pub ret: Reg,
    /// Loop counter used by the ILP functions
    pub counter: Reg,
    /// Stack pointer
    pub stack_pointer: Reg,
    /// Return address / link register
    pub return_address: Reg,
    /// Registers that may never hold an accumulator
    pub reserved: Vec<Reg>,
    /// Registers the callee must preserve
    pub callee_saved: Vec<Reg>,
    /// Ordered pool of accumulator registers
    pub accumulators: Vec<Reg>,
    /// Bytes per saved register slot
    pub slot_size: u32,
    /// Required stack pointer alignment in bytes
    pub stack_align: u32,
    /// General-purpose registers the instruction set can name (`0..register_count`)
    pub register_count: u8,
}

impl Abi {
    /// Widest chain this ABI supports without spilling
    pub fn max_width(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_callee_saved(&self, reg: Reg) -> bool {
        self.callee_saved.contains(&reg)
    }

    /// Registers an accumulator must never alias.
    pub fn fixed_registers(&self) -> Vec<Reg> {
        let mut fixed = vec![
            self.arg,
            self.ret,
            self.counter,
            self.stack_pointer,
            self.return_address,
        ];
        fixed.extend(self.reserved.iter().copied());
        fixed
    }

    /// Check the accumulator pool against the rest of the convention.
    pub fn validate(&self) -> GenResult<()> {
        if self.accumulators.is_empty() {
            return Err(GenError::InvalidRegisterPool(
                "accumulator pool is empty".to_string(),
            ));
        }
        let fixed = self.fixed_registers();
        let mut seen = HashSet::new();
        for &reg in &self.accumulators {
            if reg.0 >= self.register_count {
                return Err(GenError::InvalidRegisterPool(format!(
                    "register {} does not exist (registers are 0..{})",
                    reg.0, self.register_count
                )));
            }
            if !seen.insert(reg) {
                return Err(GenError::InvalidRegisterPool(format!(
                    "register {} is listed more than once",
                    reg.0
                )));
            }
            if fixed.contains(&reg) {
                return Err(GenError::InvalidRegisterPool(format!(
                    "register {} is reserved by the calling convention",
                    reg.0
                )));
            }
        }
        if self.slot_size == 0 || !self.stack_align.is_power_of_two() {
            return Err(GenError::InvalidRegisterPool(format!(
                "bad stack layout (slot {} bytes, alignment {})",
                self.slot_size, self.stack_align
            )));
        }
        Ok(())
    }

    /// Replace the accumulator pool, keeping the rest of the convention.
    pub fn with_accumulators(mut self, accumulators: Vec<Reg>) -> GenResult<Self> {
        self.accumulators = accumulators;
        self.validate()?;
        Ok(self)
    }
}

/// Assembly syntax and calling convention of one instruction set.
///
/// Every method returns finished statements (no indentation, no newline).
/// Methods returning `Vec<String>` may emit more than one statement, e.g. a
/// branch followed by its delay slot.
pub trait Target {
    /// Target name (e.g., "mips32", "aarch64")
    fn name(&self) -> &'static str;

    fn abi(&self) -> &Abi;

    /// Assembler spelling of a register
    fn reg_name(&self, reg: Reg) -> String;

    /// Spelling of a register holding a C `int`. Targets with 32-bit views
    /// of wider registers name the view here.
    fn int_reg_name(&self, reg: Reg) -> String {
        self.reg_name(reg)
    }

    /// Largest decrement the loop branch can encode as an immediate
    fn max_loop_decrement(&self) -> u32;

    /// Mnemonics that transfer control
    fn control_mnemonics(&self) -> &'static [&'static str];

    /// Directives opening the assembly file
    fn file_header(&self) -> Vec<String>;

    /// Directives and entry label of a global function.
    ///
    /// `uses_counter` is set when the function writes the ABI loop counter,
    /// which on some targets is an assembler temporary.
    fn function_begin(&self, name: &str, uses_counter: bool) -> Vec<String>;

    fn function_end(&self, name: &str, uses_counter: bool) -> Vec<String>;

    /// Unconditional jump to a local label
    fn jump(&self, label: &str) -> Vec<String>;

    /// Branch to `label` if `counter` was nonzero; `counter` is decremented
    /// by `dec` whether or not the branch is taken.
    fn branch_nonzero_dec(&self, counter: Reg, label: &str, dec: u32) -> Vec<String>;

    /// Likely-taken loop branch: taken while `counter` was positive, and
    /// `counter` drops by `dec` on every taken iteration.
    fn branch_positive_dec_likely(&self, counter: Reg, label: &str, dec: u32) -> Vec<String>;

    fn move_reg(&self, rd: Reg, rs: Reg) -> String;

    fn load_small_imm(&self, rd: Reg, imm: u16) -> String;

    /// Register-to-register multiply
    fn mul(&self, rd: Reg, rs1: Reg, rs2: Reg) -> String;

    /// `rd = hi << 16`
    fn load_upper16(&self, rd: Reg, hi: u16) -> String;

    /// `rd |= lo`
    fn or_low16(&self, rd: Reg, lo: u16) -> String;

    /// Move the stack pointer by `delta` bytes
    fn adjust_sp(&self, delta: i32) -> String;

    /// Store `reg` at `offset` bytes above the stack pointer
    fn store_reg(&self, reg: Reg, offset: u32) -> String;

    /// Load `reg` from `offset` bytes above the stack pointer
    fn load_reg(&self, reg: Reg, offset: u32) -> String;

    /// Return to the caller.
    ///
    /// `delay` is the last useful instruction of the function; targets with
    /// branch delay slots place it after the return jump, the rest before it.
    fn ret(&self, delay: Option<String>) -> Vec<String>;

    /// Whether a statement is a control transfer on this target
    fn is_control_transfer(&self, statement: &str) -> bool {
        let mnemonic = statement.split_whitespace().next().unwrap_or("");
        self.control_mnemonics().contains(&mnemonic)
    }
}

/// Instruction sets a generator can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// MIPS32, o32 calling convention
    #[default]
    #[serde(alias = "mips")]
    Mips32,
    /// AArch64, AAPCS64 calling convention
    #[serde(alias = "arm64")]
    Aarch64,
}

impl TargetKind {
    pub fn name(self) -> &'static str {
        match self {
            TargetKind::Mips32 => Mips32::NAME,
            TargetKind::Aarch64 => AArch64::NAME,
        }
    }

    /// The stock calling convention of this target
    pub fn default_abi(self) -> Abi {
        match self {
            TargetKind::Mips32 => Mips32::o32(),
            TargetKind::Aarch64 => AArch64::aapcs64(),
        }
    }

    /// Build a target, optionally replacing its accumulator pool.
    pub fn build(self, accumulators: Option<Vec<Reg>>) -> GenResult<Box<dyn Target>> {
        let abi = match accumulators {
            Some(pool) => self.default_abi().with_accumulators(pool)?,
            None => self.default_abi(),
        };
        abi.validate()?;
        Ok(match self {
            TargetKind::Mips32 => Box::new(Mips32::with_abi(abi)),
            TargetKind::Aarch64 => Box::new(AArch64::with_abi(abi)),
        })
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mips32" | "mips" => Ok(TargetKind::Mips32),
            "aarch64" | "arm64" => Ok(TargetKind::Aarch64),
            other => Err(format!(
                "unknown target '{}' (expected mips32 or aarch64)",
                other
            )),
        }
    }
}

/// Split a statement into its mnemonic and comma-separated operands.
pub fn split_statement(statement: &str) -> (&str, Vec<&str>) {
    let statement = statement.trim();
    let (mnemonic, rest) = match statement.find(char::is_whitespace) {
        Some(pos) => (&statement[..pos], &statement[pos..]),
        None => (statement, ""),
    };
    let operands = rest
        .split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .collect();
    (mnemonic, operands)
}
