//! Host reference executor
//!
//! # CPU Backend
//!
//! These functions are the ground truth the accelerator is checked against.
//! They are deliberately plain: triple-nested accumulation for the matrix
//! product and a per-pixel loop for the blend.
//!
//! ## Arithmetic
//!
//! Accumulation is 64-bit two's-complement with wrapping on overflow, which is
//! exactly what the device kernel computes. For the generated value range
//! (`0..=9`) no overflow is possible for any practical size.
//!
//! ## Implemented Ops
//!
//! - `matmul`: sequential reference product
//! - `matmul_parallel`: row-parallel product using [`rayon`](https://docs.rs/rayon),
//!   bit-identical to `matmul`
//! - `blend_intensity`: grey-level blend of two RGB frames

use rayon::prelude::*;

use crate::error::{HarnessError, Result};
use crate::matrix::{ImageFrame, Matrix};

fn check_same_size(a: &Matrix, b: &Matrix) -> Result<usize> {
    if a.size() != b.size() {
        return Err(HarnessError::DimensionMismatch(format!(
            "cannot multiply {0}x{0} by {1}x{1}",
            a.size(),
            b.size()
        )));
    }
    Ok(a.size())
}

#[inline]
fn dot(a: &[i64], b: &[i64], row: usize, col: usize, size: usize) -> i64 {
    let mut value = 0i64;
    for k in 0..size {
        value = value.wrapping_add(a[row * size + k].wrapping_mul(b[k * size + col]));
    }
    value
}

/// Computes `C = A × B` for two square matrices of equal size.
///
/// # Errors
///
/// [`HarnessError::DimensionMismatch`] if the sizes differ.
///
/// # Example
///
/// ```rust
/// use hetero_parity::{matrix::Matrix, ops::cpu::matmul};
///
/// let a = Matrix::new(2, vec![1, 2, 3, 4]).unwrap();
/// let b = Matrix::new(2, vec![5, 6, 7, 8]).unwrap();
/// assert_eq!(matmul(&a, &b).unwrap().as_slice(), &[19, 22, 43, 50]);
/// ```
pub fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    let size = check_same_size(a, b)?;
    let (a_data, b_data) = (a.as_slice(), b.as_slice());

    let mut out = vec![0i64; size * size];
    for row in 0..size {
        for col in 0..size {
            out[row * size + col] = dot(a_data, b_data, row, col, size);
        }
    }
    Matrix::new(size, out)
}

/// Same product as [`matmul`], one `rayon` task per output row.
///
/// # Errors
///
/// [`HarnessError::DimensionMismatch`] if the sizes differ.
pub fn matmul_parallel(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    let size = check_same_size(a, b)?;
    let (a_data, b_data) = (a.as_slice(), b.as_slice());

    let mut out = vec![0i64; size * size];
    out.par_chunks_mut(size).enumerate().for_each(|(row, out_row)| {
        for (col, cell) in out_row.iter_mut().enumerate() {
            *cell = dot(a_data, b_data, row, col, size);
        }
    });
    Matrix::new(size, out)
}

/// Grey level of one pixel pair: the six channel samples summed, divided by
/// six, then scaled from `0..=510` onto `0..=255`.
///
/// `255 * (s / 6) / 510` is exactly `s / 12`; integer division truncates the
/// same way the float formula does, without depending on float rounding.
#[inline]
#[must_use]
pub const fn blend_pixel(first: [u8; 3], second: [u8; 3]) -> u8 {
    let sum = first[0] as u32
        + first[1] as u32
        + first[2] as u32
        + second[0] as u32
        + second[1] as u32
        + second[2] as u32;
    (sum / 12) as u8
}

/// Blends two equally shaped RGB frames into one single-channel frame.
///
/// # Errors
///
/// [`HarnessError::DimensionMismatch`] if the frames differ in shape or are
/// not three-channel.
pub fn blend_intensity(first: &ImageFrame, second: &ImageFrame) -> Result<ImageFrame> {
    if !first.same_shape(second) || first.channels() != ImageFrame::RGB {
        return Err(HarnessError::DimensionMismatch(format!(
            "blend needs two equal RGB frames, got {}x{}x{} and {}x{}x{}",
            first.width(),
            first.height(),
            first.channels(),
            second.width(),
            second.height(),
            second.channels()
        )));
    }

    let out = first
        .as_bytes()
        .chunks_exact(ImageFrame::RGB)
        .zip(second.as_bytes().chunks_exact(ImageFrame::RGB))
        .map(|(p, q)| blend_pixel([p[0], p[1], p[2]], [q[0], q[1], q[2]]))
        .collect();
    ImageFrame::new(first.width(), first.height(), 1, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_product() {
        let a = Matrix::new(2, vec![1, 2, 3, 4]).unwrap();
        let b = Matrix::new(2, vec![5, 6, 7, 8]).unwrap();
        assert_eq!(matmul(&a, &b).unwrap().as_slice(), &[19, 22, 43, 50]);
    }

    #[test]
    fn one_by_one_product() {
        let a = Matrix::new(1, vec![7]).unwrap();
        let b = Matrix::new(1, vec![3]).unwrap();
        assert_eq!(matmul(&a, &b).unwrap().as_slice(), &[21]);
    }

    #[test]
    fn mismatched_sizes_fail_fast() {
        let a = Matrix::zeros(2).unwrap();
        let b = Matrix::zeros(3).unwrap();
        assert!(matches!(
            matmul(&a, &b),
            Err(HarnessError::DimensionMismatch(_))
        ));
        assert!(matmul_parallel(&a, &b).is_err());
    }

    #[test]
    fn overflow_wraps() {
        let a = Matrix::new(1, vec![i64::MAX]).unwrap();
        let b = Matrix::new(1, vec![2]).unwrap();
        assert_eq!(matmul(&a, &b).unwrap().as_slice(), &[-2]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let data: Vec<i64> = (0..49).map(|v| (v * 7 % 10) - 3).collect();
        let a = Matrix::new(7, data.clone()).unwrap();
        let b = Matrix::new(7, data.into_iter().rev().collect()).unwrap();
        assert_eq!(matmul(&a, &b).unwrap(), matmul_parallel(&a, &b).unwrap());
    }

    #[test]
    fn blend_extremes() {
        assert_eq!(blend_pixel([0; 3], [0; 3]), 0);
        assert_eq!(blend_pixel([255; 3], [255; 3]), 127);
        assert_eq!(blend_pixel([12, 0, 0], [0, 0, 0]), 1);
        assert_eq!(blend_pixel([11, 0, 0], [0, 0, 0]), 0);
    }

    #[test]
    fn blend_rejects_shape_mismatch() {
        let a = ImageFrame::new(2, 2, 3, vec![0; 12]).unwrap();
        let b = ImageFrame::new(2, 1, 3, vec![0; 6]).unwrap();
        assert!(blend_intensity(&a, &b).is_err());
    }
}
