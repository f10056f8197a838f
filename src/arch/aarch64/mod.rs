//! AArch64 (ARM64) Target
//!
//! AAPCS64 calling convention, GNU assembler syntax.
//!
//! # Register Usage
//!
//! | Register | Use |
//! |----------|-----|
//! | x0 | Argument and return value |
//! | x1-x7 | Arguments (reserved) |
//! | x8 | Indirect result (reserved) |
//! | x9 | ILP loop counter |
//! | x10-x15 | Accumulators |
//! | x16-x17 | IP0/IP1 veneers (reserved) |
//! | x18 | Platform register (reserved) |
//! | x19-x28 | Accumulators, callee-saved |
//! | x29 | Frame pointer (reserved) |
//! | x30 | Link register |
//! | sp | Stack pointer (encoded as 31) |
//!
//! # Differences from MIPS32
//!
//! - No branch delay slots; the `delay` instruction of a return is simply
//!   emitted before `ret`
//! - No branch-likely form; the loop branch is a backward `b.gt`, which
//!   static prediction treats as taken
//! - 32-bit constants are built with MOVZ/MOVK
//! - The stack pointer must stay 16-byte aligned
//! - The argument, result, counter and accumulators are C `int`s and are
//!   operated on through their 32-bit `w` views; the upper halves of `x0`
//!   and `x9` are never read. Saves and restores use the full `x` registers.

use super::{Abi, Reg, Target};

/// AArch64 target
#[derive(Debug, Clone)]
pub struct AArch64 {
    abi: Abi,
}

impl AArch64 {
    pub const NAME: &'static str = "aarch64";

    pub const X0: Reg = Reg(0);
    pub const X9: Reg = Reg(9);
    pub const LR: Reg = Reg(30);
    pub const SP: Reg = Reg(31);

    /// `sub` takes an unsigned 12-bit immediate
    pub const MAX_DECREMENT: u32 = 4095;

    pub fn new() -> Self {
        Self::with_abi(Self::aapcs64())
    }

    pub fn with_abi(abi: Abi) -> Self {
        Self { abi }
    }

    /// AAPCS64 with x10-x15 ahead of x19-x28 in the accumulator pool
    pub fn aapcs64() -> Abi {
        Abi {
            arg: Self::X0,
            ret: Self::X0,
            counter: Self::X9,
            stack_pointer: Self::SP,
            return_address: Self::LR,
            reserved: (1..=8).chain(16..=18).chain(29..=29).map(Reg).collect(),
            callee_saved: (19..=29).map(Reg).collect(),
            accumulators: (10..=15).chain(19..=28).map(Reg).collect(),
            slot_size: 8,
            stack_align: 16,
            register_count: 31,
        }
    }
}

impl Default for AArch64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for AArch64 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn abi(&self) -> &Abi {
        &self.abi
    }

    fn reg_name(&self, reg: Reg) -> String {
        if reg == Self::SP {
            "sp".to_string()
        } else {
            format!("x{}", reg.0)
        }
    }

    fn int_reg_name(&self, reg: Reg) -> String {
        if reg == Self::SP {
            "wsp".to_string()
        } else {
            format!("w{}", reg.0)
        }
    }

    fn max_loop_decrement(&self) -> u32 {
        Self::MAX_DECREMENT
    }

    fn control_mnemonics(&self) -> &'static [&'static str] {
        &["b", "bl", "br", "ret", "cbz", "cbnz", "b.hs", "b.gt", "b.ne", "b.eq"]
    }

    fn file_header(&self) -> Vec<String> {
        vec![".text".to_string()]
    }

    fn function_begin(&self, name: &str, _uses_counter: bool) -> Vec<String> {
        vec![
            ".align 2".to_string(),
            format!(".globl {}", name),
            format!(".type {}, %function", name),
            format!("{}:", name),
        ]
    }

    fn function_end(&self, name: &str, _uses_counter: bool) -> Vec<String> {
        vec![format!(".size {}, .-{}", name, name)]
    }

    fn jump(&self, label: &str) -> Vec<String> {
        vec![format!("b {}", label)]
    }

    fn branch_nonzero_dec(&self, counter: Reg, label: &str, dec: u32) -> Vec<String> {
        // SUBS leaves C set when no borrow occurred (old counter >= dec),
        // which for a decrement of 1 is exactly "old counter != 0".
        let c = self.int_reg_name(counter);
        vec![
            format!("subs {}, {}, #{}", c, c, dec),
            format!("b.hs {}", label),
        ]
    }

    fn branch_positive_dec_likely(&self, counter: Reg, label: &str, dec: u32) -> Vec<String> {
        let c = self.int_reg_name(counter);
        vec![
            format!("cmp {}, #0", c),
            format!("sub {}, {}, #{}", c, c, dec),
            format!("b.gt {}", label),
        ]
    }

    fn move_reg(&self, rd: Reg, rs: Reg) -> String {
        format!("mov {}, {}", self.int_reg_name(rd), self.int_reg_name(rs))
    }

    fn load_small_imm(&self, rd: Reg, imm: u16) -> String {
        format!("mov {}, #{}", self.int_reg_name(rd), imm)
    }

    fn mul(&self, rd: Reg, rs1: Reg, rs2: Reg) -> String {
        format!(
            "mul {}, {}, {}",
            self.int_reg_name(rd),
            self.int_reg_name(rs1),
            self.int_reg_name(rs2)
        )
    }

    fn load_upper16(&self, rd: Reg, hi: u16) -> String {
        format!("movz {}, #{}, lsl #16", self.int_reg_name(rd), hi)
    }

    fn or_low16(&self, rd: Reg, lo: u16) -> String {
        // Bits 0-15 are zero after MOVZ, so MOVK is an OR.
        format!("movk {}, #{}", self.int_reg_name(rd), lo)
    }

    fn adjust_sp(&self, delta: i32) -> String {
        if delta < 0 {
            format!("sub sp, sp, #{}", delta.unsigned_abs())
        } else {
            format!("add sp, sp, #{}", delta)
        }
    }

    fn store_reg(&self, reg: Reg, offset: u32) -> String {
        format!("str {}, [sp, #{}]", self.reg_name(reg), offset)
    }

    fn load_reg(&self, reg: Reg, offset: u32) -> String {
        format!("ldr {}, [sp, #{}]", self.reg_name(reg), offset)
    }

    fn ret(&self, delay: Option<String>) -> Vec<String> {
        let mut lines: Vec<String> = delay.into_iter().collect();
        lines.push("ret".to_string());
        lines
    }
}
