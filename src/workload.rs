//! Workload generation.
//!
//! Inputs are drawn from an RNG the caller owns. Passing the same seeded
//! generator state reproduces the same workload.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::matrix::{ImageFrame, Matrix};

/// Upper bound (inclusive) of generated matrix elements.
pub const MAX_ELEMENT: i64 = 9;

/// Deterministic generator for a given seed.
#[must_use]
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `size × size` matrix with elements uniform in `0..=9`.
///
/// # Errors
///
/// [`crate::HarnessError::DimensionMismatch`] if `size` is zero or the
/// element count overflows.
pub fn generate_matrix<R: Rng>(size: usize, rng: &mut R) -> Result<Matrix> {
    let len = Matrix::element_count(size)?;
    let data = (0..len).map(|_| rng.random_range(0..=MAX_ELEMENT)).collect();
    Matrix::new(size, data)
}

/// Random image frame with every sample uniform in `0..=255`.
///
/// # Errors
///
/// [`crate::HarnessError::DimensionMismatch`] if any dimension is zero or the
/// byte count overflows.
pub fn generate_frame<R: Rng>(
    width: usize,
    height: usize,
    channels: usize,
    rng: &mut R,
) -> Result<ImageFrame> {
    let mut data = vec![0u8; ImageFrame::byte_count(width, height, channels)?];
    rng.fill(data.as_mut_slice());
    ImageFrame::new(width, height, channels, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_stay_in_range() {
        let mut rng = seeded_rng(7);
        let m = generate_matrix(16, &mut rng).unwrap();
        assert_eq!(m.len(), 256);
        assert!(m.as_slice().iter().all(|v| (0..=MAX_ELEMENT).contains(v)));
    }

    #[test]
    fn same_seed_same_matrix() {
        let a = generate_matrix(8, &mut seeded_rng(0xA11CE)).unwrap();
        let b = generate_matrix(8, &mut seeded_rng(0xA11CE)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(generate_matrix(0, &mut seeded_rng(1)).is_err());
    }

    #[test]
    fn overflowing_shapes_are_rejected() {
        let mut rng = seeded_rng(1);
        assert!(matches!(
            generate_matrix(usize::MAX, &mut rng),
            Err(crate::HarnessError::DimensionMismatch(_))
        ));
        assert!(matches!(
            generate_frame(usize::MAX, 2, ImageFrame::RGB, &mut rng),
            Err(crate::HarnessError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn frame_has_requested_shape() {
        let f = generate_frame(5, 3, ImageFrame::RGB, &mut seeded_rng(3)).unwrap();
        assert_eq!(f.as_bytes().len(), 45);
        assert_eq!(f.stride(), 15);
    }
}
