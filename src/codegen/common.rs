//! Common utilities for assembly emission
//!
//! Provides shared functionality used by both generators:
//! - Label and symbol naming conventions
//! - 32-bit immediate splitting
//! - Stack frames (prologue/epilogue templates)
//! - Statement layout

use crate::arch::{Abi, Reg, Target};

/// Options for laying out statements
#[derive(Debug, Clone)]
pub struct AsmOptions {
    /// Indent size (number of spaces)
    pub indent_size: usize,
    /// Use tabs instead of spaces
    pub use_tabs: bool,
}

impl Default for AsmOptions {
    fn default() -> Self {
        Self {
            indent_size: 8,
            use_tabs: true,
        }
    }
}

/// Lays out statements: labels flush left, everything else indented
#[derive(Debug)]
pub struct AsmWriter {
    output: String,
    options: AsmOptions,
}

impl AsmWriter {
    pub fn new() -> Self {
        Self::with_options(AsmOptions::default())
    }

    pub fn with_options(options: AsmOptions) -> Self {
        Self {
            output: String::new(),
            options,
        }
    }

    /// Get the current output
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take ownership of the output
    pub fn into_output(self) -> String {
        self.output
    }

    /// Write one statement on its own line
    pub fn statement(&mut self, s: &str) {
        if !s.ends_with(':') {
            self.write_indent();
        }
        self.output.push_str(s);
        self.output.push('\n');
    }

    pub fn statements(&mut self, lines: &[String]) {
        for line in lines {
            self.statement(line);
        }
    }

    /// Write an empty line
    pub fn newline(&mut self) {
        self.output.push('\n');
    }

    fn write_indent(&mut self) {
        if self.options.use_tabs {
            self.output.push('\t');
        } else {
            let indent = " ".repeat(self.options.indent_size);
            self.output.push_str(&indent);
        }
    }
}

impl Default for AsmWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Local label for a program point of a cycle chain
pub fn cycle_label(label: usize) -> String {
    format!(".L{}", label)
}

/// Local label of the loop head in the ILP function of the given width
pub fn loop_label(width: usize) -> String {
    format!(".Lilp{}", width)
}

/// Global symbol of a generated function (e.g., `goto_test64`, `func3`)
pub fn symbol_name(prefix: &str, n: usize) -> String {
    format!("{}{}", prefix, n)
}

/// Statement defining `label`
pub fn label_definition(label: &str) -> String {
    format!("{}:", label)
}

/// A 32-bit value split for a shifted high-half load plus an OR of the low half
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitImm {
    pub hi: u16,
    pub lo: u16,
}

impl SplitImm {
    pub fn split(value: u32) -> Self {
        Self {
            hi: (value >> 16) as u16,
            lo: (value & 0xFFFF) as u16,
        }
    }

    /// `(hi << 16) | lo`
    pub fn value(self) -> u32 {
        ((self.hi as u32) << 16) | self.lo as u32
    }
}

/// Stack frame preserving the callee-saved registers a function clobbers.
///
/// Slots are assigned in the order the registers are used; the size is the
/// slot total rounded up to the ABI stack alignment, and zero when nothing
/// needs saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Saved registers, slot `i` at offset `i * slot_size`
    pub saved: Vec<Reg>,
    /// Bytes reserved on the stack
    pub size: u32,
    slot_size: u32,
}

impl Frame {
    pub fn for_registers(abi: &Abi, used: &[Reg]) -> Self {
        let saved: Vec<Reg> = used
            .iter()
            .copied()
            .filter(|&r| abi.is_callee_saved(r))
            .collect();
        let bytes = saved.len() as u32 * abi.slot_size;
        let size = bytes.div_ceil(abi.stack_align) * abi.stack_align;
        Self {
            saved,
            size,
            slot_size: abi.slot_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// `(register, offset)` of every slot
    pub fn slots(&self) -> impl Iterator<Item = (Reg, u32)> + '_ {
        self.saved
            .iter()
            .enumerate()
            .map(move |(i, &r)| (r, i as u32 * self.slot_size))
    }

    /// Allocate the frame and store every saved register
    pub fn prologue(&self, target: &dyn Target) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut lines = vec![target.adjust_sp(-(self.size as i32))];
        lines.extend(self.slots().map(|(r, off)| target.store_reg(r, off)));
        lines
    }

    /// Reload every saved register, release the frame and return
    pub fn epilogue(&self, target: &dyn Target) -> Vec<String> {
        let mut lines: Vec<String> = self
            .slots()
            .map(|(r, off)| target.load_reg(r, off))
            .collect();
        let release = (!self.is_empty()).then(|| target.adjust_sp(self.size as i32));
        lines.extend(target.ret(release));
        lines
    }
}
