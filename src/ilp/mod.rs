//! ILP Chain Generator
//!
//! Emits a family of functions `func1..funcK_max`. Function K keeps K
//! accumulators live and multiplies each of them by the loop counter, so it
//! runs K dependency chains that never read each other's registers. A core
//! that can issue K multiplies per cycle executes one step of every chain in
//! parallel; a narrower core serializes them.
//!
//! # Function Layout (K = 2, U = 2)
//!
//! ```text
//! func2:
//!       <save callee-saved accumulators>
//!       counter = x ; ret = x
//!       acc0 = 1 ; acc1 = 2
//! .Lilp2:
//!       acc0 *= counter
//!       acc1 *= counter
//!       acc0 *= counter
//!       acc1 *= counter
//!       if counter > 0: counter -= U, goto .Lilp2   (likely taken)
//!       <restore> ; return x
//! ```
//!
//! The loop body holds `U * K` multiplies, instruction `j` updating
//! accumulator `j mod K`. Output is deterministic: the same parameters always
//! produce the same bytes.

use crate::arch::{Reg, Target};
use crate::codegen::common::{label_definition, loop_label, symbol_name, Frame};
use crate::codegen::{AsmFile, AsmFunction, FunctionTable, GenError, GenResult};
use log::debug;

/// Default widest chain (`func16`)
pub const DEFAULT_MAX_WIDTH: usize = 16;
/// Default unroll factor
pub const DEFAULT_UNROLL: u32 = 4;
/// Default symbol prefix (`func<K>`)
pub const DEFAULT_SYMBOL_PREFIX: &str = "func";

/// K independent accumulators, each updated `unroll` times per iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainWidth {
    pub width: usize,
    pub unroll: u32,
}

impl ChainWidth {
    /// Validate a width/unroll pair against the target's accumulator pool
    /// and the decrement its loop branch can encode.
    pub fn new(width: usize, unroll: u32, target: &dyn Target) -> GenResult<Self> {
        let max_unroll = target.max_loop_decrement();
        if unroll < 1 || unroll > max_unroll {
            return Err(GenError::UnrollOutOfRange {
                unroll,
                max: max_unroll,
                target: target.name(),
            });
        }
        let max = target.abi().max_width();
        if width < 1 || width > max {
            return Err(GenError::WidthOutOfRange {
                width,
                max,
                target: target.name(),
            });
        }
        Ok(Self { width, unroll })
    }

    /// Arithmetic instructions per loop iteration
    pub fn body_len(&self) -> usize {
        self.width * self.unroll as usize
    }
}

/// Emits the ILP function family for one target
pub struct IlpGenerator<'a> {
    target: &'a dyn Target,
    symbol_prefix: String,
    max_width: usize,
    unroll: u32,
}

impl<'a> IlpGenerator<'a> {
    /// Widths `1..=max_width`, each unrolled `unroll` times. Both parameters
    /// are checked here, before anything is emitted.
    pub fn new(target: &'a dyn Target, max_width: usize, unroll: u32) -> GenResult<Self> {
        ChainWidth::new(max_width, unroll, target)?;
        Ok(Self {
            target,
            symbol_prefix: DEFAULT_SYMBOL_PREFIX.to_string(),
            max_width,
            unroll,
        })
    }

    pub fn with_symbol_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.symbol_prefix = prefix.into();
        self
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn unroll(&self) -> u32 {
        self.unroll
    }

    pub fn symbol(&self, width: usize) -> String {
        symbol_name(&self.symbol_prefix, width)
    }

    /// Accumulators used by the function of the given width
    pub fn accumulators(&self, width: usize) -> GenResult<&[Reg]> {
        ChainWidth::new(width, self.unroll, self.target)?;
        Ok(&self.target.abi().accumulators[..width])
    }

    pub fn generate_function(&self, width: usize) -> GenResult<AsmFunction> {
        let chain = ChainWidth::new(width, self.unroll, self.target)?;
        let target = self.target;
        let abi = target.abi();
        let accumulators = self.accumulators(width)?;
        let frame = Frame::for_registers(abi, accumulators);
        let name = self.symbol(width);
        let head = loop_label(width);

        let mut lines = target.function_begin(&name, true);
        lines.extend(frame.prologue(target));

        lines.push(target.move_reg(abi.counter, abi.arg));
        if abi.ret != abi.arg {
            lines.push(target.move_reg(abi.ret, abi.arg));
        }
        for (i, &acc) in accumulators.iter().enumerate() {
            // width <= pool size, far below u16::MAX
            lines.push(target.load_small_imm(acc, (i + 1) as u16));
        }

        lines.push(label_definition(&head));
        for j in 0..chain.body_len() {
            let acc = accumulators[j % width];
            lines.push(target.mul(acc, acc, abi.counter));
        }
        lines.extend(target.branch_positive_dec_likely(abi.counter, &head, chain.unroll));

        lines.extend(frame.epilogue(target));
        lines.extend(target.function_end(&name, true));

        debug!(
            "Generated {} for {} ({} multiplies, {} saved registers, {} byte frame)",
            name,
            target.name(),
            chain.body_len(),
            frame.saved.len(),
            frame.size
        );
        Ok(AsmFunction {
            name,
            lines,
            preserved: frame.saved,
        })
    }

    /// All functions `1..=max_width` in one assembly file
    pub fn generate_file(&self) -> GenResult<AsmFile> {
        let mut file = AsmFile::new(self.target);
        for width in 1..=self.max_width {
            file.push(self.generate_function(width)?);
        }
        Ok(file)
    }

    /// Declarations file: `funcs[K]` points at the function of width K,
    /// `funcs[0]` is `NULL`.
    pub fn generate_header(&self) -> String {
        let mut table = FunctionTable::new("__funcsh__", "NUM_FUNCS", "fn_t", "funcs");
        table.push_null();
        for width in 1..=self.max_width {
            table.push(self.symbol(width));
        }
        table.render()
    }
}
