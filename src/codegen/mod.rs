//! Assembly Emission for ubgen
//!
//! Shared pieces used by both generators:
//!
//! - [`GenError`]: every failure a generation run can report
//! - [`AsmFunction`]: one generated function (name, statements, preserved
//!   registers)
//! - [`AsmFile`]: an ordered set of functions rendered to one text file
//! - [`common`]: label naming, immediate splitting, stack frames
//! - [`header`]: C declarations with a function-pointer table
//! - [`output`]: whole-file writes
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ chain/width  │──▶│ Target calls │──▶│ AsmFunction  │──▶│ AsmFile  │──▶ disk
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────┘
//! ```

pub mod common;
pub mod header;
pub mod output;

pub use common::{AsmWriter, Frame, SplitImm};
pub use header::FunctionTable;
pub use output::write_atomic;

use crate::arch::{Reg, Target};
use thiserror::Error;

/// Errors that can occur while generating a benchmark
#[derive(Debug, Error)]
pub enum GenError {
    #[error("size must be a power of two, got {0}")]
    SizeNotPowerOfTwo(usize),

    #[error("size must be at least {min}, got {size}")]
    SizeTooSmall { size: usize, min: usize },

    #[error("size must be at most {max}, got {size}")]
    SizeTooLarge { size: usize, max: usize },

    #[error("exponent must be in {min}..={max}, got {exponent}")]
    ExponentOutOfRange { exponent: u32, min: u32, max: u32 },

    #[error("chain width must be in 1..={max} on {target}, got {width}")]
    WidthOutOfRange {
        width: usize,
        max: usize,
        target: &'static str,
    },

    #[error("unroll factor must be in 1..={max} on {target}, got {unroll}")]
    UnrollOutOfRange {
        unroll: u32,
        max: u32,
        target: &'static str,
    },

    #[error("invalid accumulator register pool: {0}")]
    InvalidRegisterPool(String),

    #[error("cycle over {size} labels is broken: {reason}")]
    BrokenCycle { size: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for generation
pub type GenResult<T> = Result<T, GenError>;

/// One generated assembly function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmFunction {
    /// Global symbol name
    pub name: String,
    /// Statements in emission order, without indentation
    pub lines: Vec<String>,
    /// Registers saved on entry and restored on exit
    pub preserved: Vec<Reg>,
}

impl AsmFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
            preserved: Vec::new(),
        }
    }

    /// Label definitions (statements ending in `:`), excluding the entry label
    pub fn local_labels(&self) -> impl Iterator<Item = &str> + '_ {
        let entry = format!("{}:", self.name);
        self.lines
            .iter()
            .filter(move |line| line.ends_with(':') && **line != entry)
            .map(|line| line.trim_end_matches(':'))
    }

    pub fn render(&self) -> String {
        let mut w = AsmWriter::new();
        w.statements(&self.lines);
        w.into_output()
    }
}

/// An assembly source file: header directives followed by functions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsmFile {
    pub header: Vec<String>,
    pub functions: Vec<AsmFunction>,
}

impl AsmFile {
    pub fn new(target: &dyn Target) -> Self {
        Self {
            header: target.file_header(),
            functions: Vec::new(),
        }
    }

    pub fn push(&mut self, function: AsmFunction) {
        self.functions.push(function);
    }

    pub fn render(&self) -> String {
        let mut w = AsmWriter::new();
        w.statements(&self.header);
        for function in &self.functions {
            w.newline();
            w.statements(&function.lines);
        }
        w.into_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Mips32;

    #[test]
    fn test_render_file() {
        let mips = Mips32::new();
        let mut file = AsmFile::new(&mips);
        let mut f = AsmFunction::new("f");
        f.lines = vec!["f:".into(), ".L0:".into(), "j $31".into(), "nop".into()];
        file.push(f);

        let text = file.render();
        assert!(text.starts_with("\t.text\n\nf:\n.L0:\n"));
        assert!(text.ends_with("\tnop\n"));
    }

    #[test]
    fn test_local_labels_skip_entry() {
        let mut f = AsmFunction::new("goto_test4");
        f.lines = vec!["goto_test4:".into(), ".L0:".into(), ".L1:".into()];
        assert_eq!(f.local_labels().collect::<Vec<_>>(), vec![".L0", ".L1"]);
    }

    #[test]
    fn test_error_messages_name_parameter() {
        let err = GenError::UnrollOutOfRange {
            unroll: 5000,
            max: 4095,
            target: "aarch64",
        };
        assert_eq!(
            err.to_string(),
            "unroll factor must be in 1..=4095 on aarch64, got 5000"
        );
        let err = GenError::WidthOutOfRange {
            width: 40,
            max: 18,
            target: "mips32",
        };
        assert!(err.to_string().contains("chain width"));
        assert!(err.to_string().contains("40"));
    }
}
