//! MIPS32 Target (o32 calling convention)
//!
//! Reference target of the micro-benchmarks. Code is emitted under
//! `.set noreorder`, so every jump and branch is followed by an explicit
//! delay-slot instruction.
//!
//! # Register Usage
//!
//! | Register | ABI Name | Use |
//! |----------|----------|-----|
//! | $0 | zero | Hard-wired zero |
//! | $1 | at | ILP loop counter (`.set noat`) |
//! | $2 | v0 | Return value |
//! | $3 | v1 | Second return value (reserved) |
//! | $4-$7 | a0-a3 | Arguments (reserved) |
//! | $8-$15 | t0-t7 | Accumulators |
//! | $16-$23 | s0-s7 | Accumulators, callee-saved |
//! | $24-$25 | t8-t9 | Accumulators |
//! | $26-$27 | k0-k1 | Kernel (reserved) |
//! | $28 | gp | Global pointer (reserved) |
//! | $29 | sp | Stack pointer |
//! | $30 | fp/s8 | Frame pointer (reserved) |
//! | $31 | ra | Return address |

use super::{Abi, Reg, Target};

/// MIPS32 target
#[derive(Debug, Clone)]
pub struct Mips32 {
    abi: Abi,
}

impl Mips32 {
    pub const NAME: &'static str = "mips32";

    pub const ZERO: Reg = Reg(0);
    pub const AT: Reg = Reg(1);
    pub const V0: Reg = Reg(2);
    pub const A0: Reg = Reg(4);
    pub const SP: Reg = Reg(29);
    pub const RA: Reg = Reg(31);

    /// `addiu` takes a signed 16-bit immediate
    pub const MAX_DECREMENT: u32 = 1 << 15;

    pub fn new() -> Self {
        Self::with_abi(Self::o32())
    }

    pub fn with_abi(abi: Abi) -> Self {
        Self { abi }
    }

    /// The o32 convention with t0-t9 ahead of s0-s7 in the accumulator pool
    pub fn o32() -> Abi {
        let temporaries = (8..=15).chain(24..=25);
        let saved = 16..=23;
        Abi {
            arg: Self::A0,
            ret: Self::V0,
            counter: Self::AT,
            stack_pointer: Self::SP,
            return_address: Self::RA,
            reserved: [0, 3, 5, 6, 7, 26, 27, 28, 30].into_iter().map(Reg).collect(),
            callee_saved: (16..=23).chain(std::iter::once(30)).map(Reg).collect(),
            accumulators: temporaries.chain(saved).map(Reg).collect(),
            slot_size: 4,
            stack_align: 8,
            register_count: 32,
        }
    }

    fn r(&self, reg: Reg) -> String {
        self.reg_name(reg)
    }
}

impl Default for Mips32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for Mips32 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn abi(&self) -> &Abi {
        &self.abi
    }

    fn reg_name(&self, reg: Reg) -> String {
        format!("${}", reg.0)
    }

    fn max_loop_decrement(&self) -> u32 {
        Self::MAX_DECREMENT
    }

    fn control_mnemonics(&self) -> &'static [&'static str] {
        &["j", "jr", "jal", "b", "beq", "bne", "bgtz", "bgtzl", "bnezl", "blez"]
    }

    fn file_header(&self) -> Vec<String> {
        vec![".text".to_string()]
    }

    fn function_begin(&self, name: &str, uses_counter: bool) -> Vec<String> {
        let mut lines = vec![
            ".align 2".to_string(),
            format!(".globl {}", name),
            ".set nomips16".to_string(),
            format!(".ent {}", name),
            format!(".type {}, @function", name),
            ".set noreorder".to_string(),
            ".set nomacro".to_string(),
        ];
        if uses_counter && self.abi.counter == Self::AT {
            lines.push(".set noat".to_string());
        }
        lines.push(format!("{}:", name));
        lines
    }

    fn function_end(&self, name: &str, uses_counter: bool) -> Vec<String> {
        let mut lines = vec![".set reorder".to_string(), ".set macro".to_string()];
        if uses_counter && self.abi.counter == Self::AT {
            lines.push(".set at".to_string());
        }
        lines.push(format!(".end {}", name));
        lines.push(format!(".size {}, .-{}", name, name));
        lines
    }

    fn jump(&self, label: &str) -> Vec<String> {
        vec![format!("j {}", label), "nop".to_string()]
    }

    fn branch_nonzero_dec(&self, counter: Reg, label: &str, dec: u32) -> Vec<String> {
        let c = self.r(counter);
        vec![
            format!("bne {},{},{}", c, self.r(Self::ZERO), label),
            format!("addiu {},{},-{}", c, c, dec),
        ]
    }

    fn branch_positive_dec_likely(&self, counter: Reg, label: &str, dec: u32) -> Vec<String> {
        // Branch-likely: the delay slot is annulled when the loop exits.
        let c = self.r(counter);
        vec![
            format!("bgtzl {},{}", c, label),
            format!("addiu {},{},-{}", c, c, dec),
        ]
    }

    fn move_reg(&self, rd: Reg, rs: Reg) -> String {
        format!("addiu {},{},0", self.r(rd), self.r(rs))
    }

    fn load_small_imm(&self, rd: Reg, imm: u16) -> String {
        format!("addiu {},{},{}", self.r(rd), self.r(Self::ZERO), imm)
    }

    fn mul(&self, rd: Reg, rs1: Reg, rs2: Reg) -> String {
        format!("mul {},{},{}", self.r(rd), self.r(rs1), self.r(rs2))
    }

    fn load_upper16(&self, rd: Reg, hi: u16) -> String {
        format!("lui {},{}", self.r(rd), hi)
    }

    fn or_low16(&self, rd: Reg, lo: u16) -> String {
        let d = self.r(rd);
        format!("ori {},{},{}", d, d, lo)
    }

    fn adjust_sp(&self, delta: i32) -> String {
        let sp = self.r(self.abi.stack_pointer);
        format!("addiu {},{},{}", sp, sp, delta)
    }

    fn store_reg(&self, reg: Reg, offset: u32) -> String {
        format!("sw {},{}({})", self.r(reg), offset, self.r(self.abi.stack_pointer))
    }

    fn load_reg(&self, reg: Reg, offset: u32) -> String {
        format!("lw {},{}({})", self.r(reg), offset, self.r(self.abi.stack_pointer))
    }

    fn ret(&self, delay: Option<String>) -> Vec<String> {
        vec![
            format!("j {}", self.r(self.abi.return_address)),
            delay.unwrap_or_else(|| "nop".to_string()),
        ]
    }
}
