//! Property-based tests for the host side: generator, reference and checker.

use hetero_parity::matrix::Matrix;
use hetero_parity::ops::cpu;
use hetero_parity::verify::{self, Verdict};
use hetero_parity::workload::{MAX_ELEMENT, generate_frame, generate_matrix, seeded_rng};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────────

/// A small square matrix with arbitrary elements, overflow included.
fn arb_matrix(size: usize) -> impl Strategy<Value = Matrix> {
    prop::collection::vec(any::<i64>(), size * size)
        .prop_map(move |data| Matrix::new(size, data).unwrap())
}

/// Two matrices of the same random size.
fn arb_pair() -> impl Strategy<Value = (Matrix, Matrix)> {
    (1usize..=8).prop_flat_map(|size| (arb_matrix(size), arb_matrix(size)))
}

// ── Property tests ───────────────────────────────────────────────────────────

proptest! {
    /// Equal seeds give equal workloads and equal products.
    #[test]
    fn same_seed_same_product(seed in any::<u64>(), size in 1usize..=12) {
        let run = |seed| {
            let mut rng = seeded_rng(seed);
            let a = generate_matrix(size, &mut rng).unwrap();
            let b = generate_matrix(size, &mut rng).unwrap();
            cpu::matmul(&a, &b).unwrap()
        };
        prop_assert_eq!(run(seed), run(seed));
    }

    /// Generated elements stay in range and the output has size² elements.
    #[test]
    fn output_is_size_squared(seed in any::<u64>(), size in 1usize..=16) {
        let mut rng = seeded_rng(seed);
        let a = generate_matrix(size, &mut rng).unwrap();
        prop_assert!(a.as_slice().iter().all(|v| (0..=MAX_ELEMENT).contains(v)));
        let c = cpu::matmul(&a, &a).unwrap();
        prop_assert_eq!(c.len(), size * size);
        prop_assert_eq!(c.size(), size);
    }

    /// Multiplying by the identity on either side is a no-op, even for values
    /// that overflow under other products.
    #[test]
    fn identity_is_neutral((a, _) in arb_pair()) {
        let id = Matrix::identity(a.size()).unwrap();
        prop_assert_eq!(&cpu::matmul(&a, &id).unwrap(), &a);
        prop_assert_eq!(&cpu::matmul(&id, &a).unwrap(), &a);
    }

    /// The rayon reference matches the sequential one bit for bit.
    #[test]
    fn parallel_matches_sequential((a, b) in arb_pair()) {
        prop_assert_eq!(cpu::matmul(&a, &b).unwrap(), cpu::matmul_parallel(&a, &b).unwrap());
    }

    /// A single corrupted element is found at exactly its index.
    #[test]
    fn checker_finds_single_fault(
        data in prop::collection::vec(any::<i64>(), 1..64),
        pick in any::<prop::sample::Index>(),
    ) {
        let index = pick.index(data.len());
        let mut corrupted = data.clone();
        corrupted[index] = corrupted[index].wrapping_add(1);
        prop_assert_eq!(
            verify::compare(&data, &corrupted),
            Verdict::Mismatch { index, expected: data[index], actual: corrupted[index] }
        );
        prop_assert!(verify::compare(&data, &data).is_equal());
    }

    /// The blend never exceeds half intensity and keeps the pixel count.
    #[test]
    fn blend_stays_in_range(seed in any::<u64>(), w in 1usize..=9, h in 1usize..=9) {
        let mut rng = seeded_rng(seed);
        let first = generate_frame(w, h, 3, &mut rng).unwrap();
        let second = generate_frame(w, h, 3, &mut rng).unwrap();
        let out = cpu::blend_intensity(&first, &second).unwrap();
        prop_assert_eq!(out.as_bytes().len(), w * h);
        prop_assert!(out.as_bytes().iter().all(|&v| v <= 127));
    }
}
