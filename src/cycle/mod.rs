//! BTB Cycle-Chain Generator
//!
//! Builds a routine whose body is N labeled program points linked by jumps
//! into a single cycle. Following the jumps visits every label once before
//! returning to the first, so the branch target buffer sees N distinct
//! targets per traversal.
//!
//! # Construction
//!
//! ```text
//! shuffle 0..N          [2, 0, 3, 1]
//! rotate by one         2→0, 0→3, 3→1, 1→2
//! sort by current       0→3, 1→2, 2→0, 3→1
//! ```
//!
//! Linking each element of a shuffled order to the one after it (wrapping at
//! the end) always yields one N-cycle. Pairing labels with an independent
//! random permutation would not: it can split into several disjoint cycles.
//!
//! # Emitted Routine
//!
//! ```text
//! goto_test4:
//! .L0:  j .L3
//! .L1:  j .L2
//! .L2:  j .L0
//! .L3:  bne a0, zero, .L1 ; a0 -= 1
//!       ret (hi16(N) << 16) | lo16(N)
//! ```
//!
//! The routine falls into `.L0`. The last block in label order closes the
//! loop with a counted branch, so the chain keeps being traversed while the
//! argument counter is nonzero, and the routine then returns N.

use crate::arch::Target;
use crate::codegen::common::{cycle_label, label_definition, symbol_name, SplitImm};
use crate::codegen::{AsmFile, AsmFunction, FunctionTable, GenError, GenResult};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

/// Smallest chain worth generating
pub const MIN_SIZE: usize = 4;
/// log2 of [`MIN_SIZE`]
pub const MIN_EXPONENT: u32 = 2;
/// Largest accepted exponent (2^20 labels)
pub const MAX_EXPONENT: u32 = 20;
/// Default symbol prefix (`goto_test<N>`)
pub const DEFAULT_SYMBOL_PREFIX: &str = "goto_test";

/// One control-flow edge of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub current: usize,
    pub next: usize,
}

/// Check that `size` is a power of two within the supported range.
pub fn check_size(size: usize) -> GenResult<()> {
    if !size.is_power_of_two() {
        return Err(GenError::SizeNotPowerOfTwo(size));
    }
    if size < MIN_SIZE {
        return Err(GenError::SizeTooSmall {
            size,
            min: MIN_SIZE,
        });
    }
    let max = 1usize << MAX_EXPONENT;
    if size > max {
        return Err(GenError::SizeTooLarge { size, max });
    }
    Ok(())
}

/// Sizes generated for an exponent: 4, 8, ..., 2^exponent
pub fn sizes_for_exponent(exponent: u32) -> GenResult<Vec<usize>> {
    if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
        return Err(GenError::ExponentOutOfRange {
            exponent,
            min: MIN_EXPONENT,
            max: MAX_EXPONENT,
        });
    }
    Ok((MIN_EXPONENT..=exponent).map(|e| 1usize << e).collect())
}

/// A successor relation over labels `0..N` forming one N-cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleChain {
    /// `successors[label]` is the label jumped to from `label`
    successors: Vec<usize>,
}

impl CycleChain {
    /// Random single cycle over `size` labels
    pub fn random<R: Rng + ?Sized>(size: usize, rng: &mut R) -> GenResult<Self> {
        check_size(size)?;
        let mut order: Vec<usize> = (0..size).collect();
        order.shuffle(rng);
        Self::from_order(&order)
    }

    /// Link each label of `order` to the one after it, wrapping at the end.
    pub fn from_order(order: &[usize]) -> GenResult<Self> {
        let size = order.len();
        check_size(size)?;

        let mut successors = vec![usize::MAX; size];
        for (i, &current) in order.iter().enumerate() {
            if current >= size || successors[current] != usize::MAX {
                return Err(GenError::BrokenCycle {
                    size,
                    reason: format!("label {} is not a unique member of 0..{}", current, size),
                });
            }
            successors[current] = order[(i + 1) % size];
        }

        let chain = Self { successors };
        chain.verify()?;
        Ok(chain)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn successor(&self, label: usize) -> usize {
        self.successors[label]
    }

    /// Edges in increasing order of their current label
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.successors
            .iter()
            .enumerate()
            .map(|(current, &next)| Edge { current, next })
    }

    /// Walk the chain from label 0 and confirm it is one N-cycle.
    ///
    /// Checks that the successor relation is a bijection on `0..N`, that the
    /// walk visits every label exactly once and that it is back at 0 after N
    /// steps.
    pub fn verify(&self) -> GenResult<()> {
        let size = self.len();
        let broken = |reason: String| GenError::BrokenCycle { size, reason };

        let mut has_predecessor = vec![false; size];
        for (current, &next) in self.successors.iter().enumerate() {
            if next >= size {
                return Err(broken(format!("label {} jumps outside the chain", current)));
            }
            if std::mem::replace(&mut has_predecessor[next], true) {
                return Err(broken(format!("label {} is entered twice", next)));
            }
        }

        let mut visited = vec![false; size];
        let mut label = 0;
        for step in 0..size {
            if visited[label] {
                return Err(broken(format!(
                    "walk from 0 closed a sub-cycle at label {} after {} steps",
                    label, step
                )));
            }
            visited[label] = true;
            label = self.successors[label];
        }
        if label != 0 {
            return Err(broken(format!(
                "walk from 0 ended at label {} instead of 0",
                label
            )));
        }
        Ok(())
    }
}

/// Emits cycle-chain routines for one target
pub struct CycleGenerator<'a> {
    target: &'a dyn Target,
    symbol_prefix: String,
}

impl<'a> CycleGenerator<'a> {
    pub fn new(target: &'a dyn Target) -> Self {
        Self {
            target,
            symbol_prefix: DEFAULT_SYMBOL_PREFIX.to_string(),
        }
    }

    pub fn with_symbol_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.symbol_prefix = prefix.into();
        self
    }

    /// Symbol of the routine for `size` labels
    pub fn symbol(&self, size: usize) -> String {
        symbol_name(&self.symbol_prefix, size)
    }

    /// Random chain of `size` labels, emitted as one routine
    pub fn generate<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> GenResult<AsmFunction> {
        let chain = CycleChain::random(size, rng)?;
        self.emit(&chain)
    }

    /// Emit the routine walking `chain`
    pub fn emit(&self, chain: &CycleChain) -> GenResult<AsmFunction> {
        chain.verify()?;
        let size = chain.len();
        let abi = self.target.abi();
        let name = self.symbol(size);
        let last = size - 1;

        let mut function = AsmFunction::new(name.clone());
        let lines = &mut function.lines;
        lines.extend(self.target.function_begin(&name, false));
        for (i, edge) in chain.edges().enumerate() {
            lines.push(label_definition(&cycle_label(edge.current)));
            let next = cycle_label(edge.next);
            if i == last {
                lines.extend(self.target.branch_nonzero_dec(abi.arg, &next, 1));
            } else {
                lines.extend(self.target.jump(&next));
            }
        }

        // check_size bounds size by 2^MAX_EXPONENT
        let imm = SplitImm::split(size as u32);
        lines.push(self.target.load_upper16(abi.ret, imm.hi));
        lines.extend(self.target.ret(Some(self.target.or_low16(abi.ret, imm.lo))));
        lines.extend(self.target.function_end(&name, false));

        debug!(
            "Generated {} for {} ({} statements)",
            name,
            self.target.name(),
            function.lines.len()
        );
        Ok(function)
    }

    /// One assembly file holding the routine for `size` labels
    pub fn generate_file<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> GenResult<AsmFile> {
        let mut file = AsmFile::new(self.target);
        file.push(self.generate(size, rng)?);
        Ok(file)
    }

    /// Declarations of the routines for `sizes`, smallest first
    pub fn header(&self, sizes: &[usize]) -> String {
        let mut table = FunctionTable::new("__cyclesh__", "NUM_TESTS", "test_t", "funcs");
        for &size in sizes {
            table.push(self.symbol(size));
        }
        table.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{AArch64, Mips32};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_check_size() {
        assert!(check_size(4).is_ok());
        assert!(check_size(1 << MAX_EXPONENT).is_ok());
        assert!(matches!(check_size(0), Err(GenError::SizeNotPowerOfTwo(0))));
        assert!(matches!(check_size(12), Err(GenError::SizeNotPowerOfTwo(12))));
        assert!(matches!(
            check_size(2),
            Err(GenError::SizeTooSmall { size: 2, min: 4 })
        ));
        assert!(matches!(
            check_size(1 << (MAX_EXPONENT + 1)),
            Err(GenError::SizeTooLarge { .. })
        ));
    }

    #[test]
    fn test_sizes_for_exponent() {
        assert_eq!(sizes_for_exponent(2).unwrap(), vec![4]);
        assert_eq!(sizes_for_exponent(4).unwrap(), vec![4, 8, 16]);
        assert!(matches!(
            sizes_for_exponent(1),
            Err(GenError::ExponentOutOfRange { exponent: 1, .. })
        ));
        assert!(sizes_for_exponent(0).is_err());
        assert!(sizes_for_exponent(MAX_EXPONENT + 1).is_err());
    }

    #[test]
    fn test_from_order_rotates() {
        let chain = CycleChain::from_order(&[2, 0, 3, 1]).unwrap();
        let edges: Vec<_> = chain.edges().map(|e| (e.current, e.next)).collect();
        assert_eq!(edges, vec![(0, 3), (1, 2), (2, 0), (3, 1)]);
    }

    #[test]
    fn test_from_order_rejects_duplicates() {
        let err = CycleChain::from_order(&[0, 1, 1, 3]).unwrap_err();
        assert!(matches!(err, GenError::BrokenCycle { size: 4, .. }));
        assert!(CycleChain::from_order(&[0, 1, 2, 7]).is_err());
    }

    #[test]
    fn test_verify_rejects_sub_cycles() {
        // Two disjoint 2-cycles: 0<->1, 2<->3
        let chain = CycleChain {
            successors: vec![1, 0, 3, 2],
        };
        let err = chain.verify().unwrap_err();
        assert!(err.to_string().contains("sub-cycle"));
    }

    #[test]
    fn test_verify_rejects_non_bijection() {
        let chain = CycleChain {
            successors: vec![1, 2, 3, 1],
        };
        assert!(chain.verify().is_err());
    }

    #[test]
    fn test_random_chains_are_single_cycles() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for exponent in MIN_EXPONENT..=12 {
            let chain = CycleChain::random(1 << exponent, &mut rng).unwrap();
            chain.verify().unwrap();
        }
    }

    #[test]
    fn test_emit_mips_size4() {
        let mips = Mips32::new();
        let chain = CycleChain::from_order(&[2, 0, 3, 1]).unwrap();
        let f = CycleGenerator::new(&mips).emit(&chain).unwrap();

        assert_eq!(f.name, "goto_test4");
        let body: Vec<&str> = f
            .lines
            .iter()
            .map(String::as_str)
            .skip_while(|l| *l != ".L0:")
            .take_while(|l| !l.starts_with(".set reorder"))
            .collect();
        assert_eq!(
            body,
            vec![
                ".L0:",
                "j .L3",
                "nop",
                ".L1:",
                "j .L2",
                "nop",
                ".L2:",
                "j .L0",
                "nop",
                ".L3:",
                "bne $4,$0,.L1",
                "addiu $4,$4,-1",
                "lui $2,0",
                "j $31",
                "ori $2,$2,4",
            ]
        );
        assert!(f.preserved.is_empty());
    }

    #[test]
    fn test_emit_aarch64_uses_int_argument() {
        let arm = AArch64::new();
        let chain = CycleChain::from_order(&[2, 0, 3, 1]).unwrap();
        let f = CycleGenerator::new(&arm).emit(&chain).unwrap();
        let tail: Vec<&str> = f
            .lines
            .iter()
            .map(String::as_str)
            .skip_while(|l| *l != ".L3:")
            .skip(1)
            .take(5)
            .collect();
        assert_eq!(
            tail,
            vec![
                "subs w0, w0, #1",
                "b.hs .L1",
                "movz w0, #0, lsl #16",
                "movk w0, #4",
                "ret",
            ]
        );
    }

    #[test]
    fn test_header_lists_sizes() {
        let mips = Mips32::new();
        let text = CycleGenerator::new(&mips).header(&[4, 8, 16]);
        assert!(text.contains("#define NUM_TESTS 3\n"));
        assert!(text.contains("int goto_test16(int x);\n"));
        assert!(text.contains("static const test_t funcs[NUM_TESTS] = {\n"));
        assert!(text.contains("\tgoto_test4,\n\tgoto_test8,\n\tgoto_test16\n"));
    }
}
