//! Cycle-chain properties
//!
//! Checks the single-cycle and bijection properties of the successor
//! relation, and the structure of the emitted routines on every target.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use ubgen::arch::split_statement;
use ubgen::cycle::{sizes_for_exponent, CycleChain, CycleGenerator, MIN_EXPONENT};
use ubgen::{AArch64, AsmFunction, Mips32, SplitImm, Target};

fn targets() -> Vec<Box<dyn Target>> {
    vec![Box::new(Mips32::new()), Box::new(AArch64::new())]
}

/// Statements after the entry label, up to the first closing directive
fn body(f: &AsmFunction) -> Vec<&str> {
    let entry = format!("{}:", f.name);
    f.lines
        .iter()
        .map(String::as_str)
        .skip_while(|l| *l != entry)
        .skip(1)
        .take_while(|l| !l.starts_with(".set reorder") && !l.starts_with(".size"))
        .collect()
}

/// Control transfers whose target is a cycle label
fn chain_transfers<'a>(target: &dyn Target, body: &[&'a str]) -> Vec<&'a str> {
    body.iter()
        .copied()
        .filter(|l| target.is_control_transfer(l))
        .filter(|l| {
            let (_, ops) = split_statement(l);
            ops.last().is_some_and(|op| op.starts_with(".L"))
        })
        .collect()
}

/// Decode the returned constant from the high/low immediate pair
fn returned_constant(body: &[&str]) -> u32 {
    let imm = |l: &str| -> u16 {
        let (_, ops) = split_statement(l);
        let field = ops
            .iter()
            .rev()
            .find_map(|op| op.trim_start_matches('#').parse::<u16>().ok())
            .unwrap();
        field
    };
    let hi_line = body
        .iter()
        .find(|l| l.starts_with("lui ") || l.starts_with("movz "))
        .unwrap();
    let lo_line = body
        .iter()
        .find(|l| l.starts_with("ori ") || l.starts_with("movk "))
        .unwrap();
    // movz carries "lsl #16" after the immediate
    let hi = if hi_line.starts_with("movz") {
        let (_, ops) = split_statement(hi_line);
        ops[1].trim_start_matches('#').parse().unwrap()
    } else {
        imm(hi_line)
    };
    SplitImm { hi, lo: imm(lo_line) }.value()
}

#[test]
fn test_walk_visits_every_label_once() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xB7B);
    for exponent in MIN_EXPONENT..=12 {
        let size = 1usize << exponent;
        for _ in 0..4 {
            let chain = CycleChain::random(size, &mut rng).unwrap();
            for start in [0, size / 2, size - 1] {
                let mut seen = HashSet::new();
                let mut label = start;
                for _ in 0..size {
                    assert!(seen.insert(label), "label {} visited twice", label);
                    label = chain.successor(label);
                }
                assert_eq!(label, start, "walk did not close after {} steps", size);
                assert_eq!(seen.len(), size);
            }
        }
    }
}

#[test]
fn test_successor_relation_is_bijection() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for size in sizes_for_exponent(10).unwrap() {
        let chain = CycleChain::random(size, &mut rng).unwrap();
        let currents: Vec<usize> = chain.edges().map(|e| e.current).collect();
        let mut nexts: Vec<usize> = chain.edges().map(|e| e.next).collect();
        nexts.sort_unstable();
        let all: Vec<usize> = (0..size).collect();
        assert_eq!(currents, all, "edges must be sorted by current label");
        assert_eq!(nexts, all);
        assert!(chain.edges().all(|e| e.current != e.next));
    }
}

#[test]
fn test_emitted_labels_and_transfers() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for target in targets() {
        let gen = CycleGenerator::new(target.as_ref());
        for size in sizes_for_exponent(6).unwrap() {
            let f = gen.generate(size, &mut rng).unwrap();
            let body = body(&f);

            let labels: Vec<&str> = f.local_labels().collect();
            assert_eq!(labels.len(), size, "{} label count", target.name());
            let expected: Vec<String> = (0..size).map(|i| format!(".L{}", i)).collect();
            assert_eq!(labels, expected, "labels must appear in increasing order");

            let transfers = chain_transfers(target.as_ref(), &body);
            assert_eq!(transfers.len(), size, "{} transfer count", target.name());

            // Every jump target is a defined label
            for t in &transfers {
                let (_, ops) = split_statement(t);
                assert!(labels.contains(ops.last().unwrap()));
            }
        }
    }
}

#[test]
fn test_jumps_follow_the_chain() {
    let mips = Mips32::new();
    let chain = CycleChain::random(64, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
    let f = CycleGenerator::new(&mips).emit(&chain).unwrap();
    let body = body(&f);

    let mut current = None;
    let mut targets = vec![usize::MAX; 64];
    for line in &body {
        if let Some(label) = line.strip_prefix(".L").and_then(|l| l.strip_suffix(':')) {
            current = Some(label.parse::<usize>().unwrap());
        } else if mips.is_control_transfer(line) {
            let (_, ops) = split_statement(line);
            if let Some(next) = ops.last().and_then(|op| op.strip_prefix(".L")) {
                targets[current.unwrap()] = next.parse().unwrap();
            }
        }
    }
    for (label, &next) in targets.iter().enumerate() {
        assert_eq!(next, chain.successor(label));
    }
}

#[test]
fn test_last_block_is_counted_branch() {
    let mips = Mips32::new();
    let f = CycleGenerator::new(&mips)
        .generate(8, &mut ChaCha8Rng::seed_from_u64(11))
        .unwrap();
    let body = body(&f);
    let last = body.iter().position(|l| *l == ".L7:").unwrap();
    assert!(body[last + 1].starts_with("bne $4,$0,.L"));
    assert_eq!(body[last + 2], "addiu $4,$4,-1");
    assert_eq!(body.iter().filter(|l| l.starts_with("bne ")).count(), 1);
}

#[test]
fn test_return_constant_decodes_to_size() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    for target in targets() {
        let gen = CycleGenerator::new(target.as_ref());
        for size in [4usize, 1 << 16, 1 << 17, 1 << 20] {
            let f = gen.generate(size, &mut rng).unwrap();
            assert_eq!(returned_constant(&body(&f)), size as u32, "{}", target.name());
        }
    }
}

#[test]
fn test_runs_are_structurally_equivalent() {
    let mips = Mips32::new();
    let gen = CycleGenerator::new(&mips);
    let a = gen.generate(256, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    let b = gen.generate(256, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();

    assert_ne!(a.lines, b.lines, "different seeds should give different orders");
    assert_eq!(a.lines.len(), b.lines.len());
    assert_eq!(a.local_labels().count(), b.local_labels().count());

    // Same seed, same bytes
    let c = gen.generate(256, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    assert_eq!(a, c);
}

#[test]
fn test_invalid_sizes_are_refused() {
    let mips = Mips32::new();
    let gen = CycleGenerator::new(&mips);
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    for size in [0usize, 1, 2, 3, 6, 100] {
        assert!(gen.generate(size, &mut rng).is_err(), "size {} accepted", size);
    }
}
