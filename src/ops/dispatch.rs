//! Operation Dispatch Layer
//!
//! Runs a workload on whichever executor the caller holds and tags the output
//! with its [`Backend`]. The host paths are timed here; the device path
//! reports its own launch latency so transfers stay out of the measurement.
//!
//! # Example
//! ```rust
//! use hetero_parity::matrix::Matrix;
//! use hetero_parity::ops::dispatch::{matmul, Executor};
//!
//! let a = Matrix::new(1, vec![7]).unwrap();
//! let b = Matrix::new(1, vec![3]).unwrap();
//! let result = matmul(&Executor::Cpu { parallel: false }, &a, &b).unwrap();
//! assert_eq!(result.output, vec![21]);
//! ```

use std::time::Instant;

use tracing::debug;

use super::wgpu::Accelerator;
use crate::backend::{Backend, ExecutionResult};
use crate::error::Result;
use crate::matrix::{ImageFrame, Matrix};

/// Where a workload runs.
#[derive(Clone, Copy)]
pub enum Executor<'a> {
    /// Host reference, optionally row-parallel.
    Cpu {
        /// Use the rayon variant.
        parallel: bool,
    },
    /// Built device program.
    Wgpu(&'a Accelerator),
}

impl Executor<'_> {
    /// Backend tag for results of this executor.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        match self {
            Self::Cpu { .. } => Backend::Cpu,
            Self::Wgpu(_) => Backend::Wgpu,
        }
    }
}

/// Dispatches the matrix product to `executor`.
///
/// # Errors
///
/// Whatever the selected executor returns.
pub fn matmul(executor: &Executor<'_>, a: &Matrix, b: &Matrix) -> Result<ExecutionResult<i64>> {
    let (product, elapsed) = match executor {
        Executor::Cpu { parallel } => {
            let start = Instant::now();
            let product = if *parallel {
                super::cpu::matmul_parallel(a, b)?
            } else {
                super::cpu::matmul(a, b)?
            };
            (product, start.elapsed())
        }
        Executor::Wgpu(acc) => acc.matmul(a, b)?,
    };
    let backend = executor.backend();
    debug!(
        %backend,
        reference = backend.is_reference(),
        size = a.size(),
        elapsed_us = elapsed.as_micros() as u64,
        "matmul"
    );
    Ok(ExecutionResult {
        backend,
        output: product.into_vec(),
        elapsed,
    })
}

/// Dispatches the image blend to `executor`.
///
/// # Errors
///
/// Whatever the selected executor returns.
pub fn blend(
    executor: &Executor<'_>,
    first: &ImageFrame,
    second: &ImageFrame,
) -> Result<ExecutionResult<u8>> {
    let (frame, elapsed) = match executor {
        Executor::Cpu { .. } => {
            let start = Instant::now();
            let frame = super::cpu::blend_intensity(first, second)?;
            (frame, start.elapsed())
        }
        Executor::Wgpu(acc) => acc.blend(first, second)?,
    };
    let backend = executor.backend();
    debug!(
        %backend,
        reference = backend.is_reference(),
        width = first.width(),
        height = first.height(),
        elapsed_us = elapsed.as_micros() as u64,
        "blend"
    );
    Ok(ExecutionResult {
        backend,
        output: frame.into_bytes(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{generate_frame, generate_matrix, seeded_rng};

    #[test]
    fn cpu_paths_agree() {
        let mut rng = seeded_rng(11);
        let a = generate_matrix(24, &mut rng).unwrap();
        let b = generate_matrix(24, &mut rng).unwrap();
        let seq = matmul(&Executor::Cpu { parallel: false }, &a, &b).unwrap();
        let par = matmul(&Executor::Cpu { parallel: true }, &a, &b).unwrap();
        assert_eq!(seq.output, par.output);
        assert_eq!(seq.backend, Backend::Cpu);
    }

    #[test]
    fn blend_output_is_single_channel() {
        let mut rng = seeded_rng(3);
        let first = generate_frame(5, 4, 3, &mut rng).unwrap();
        let second = generate_frame(5, 4, 3, &mut rng).unwrap();
        let result = blend(&Executor::Cpu { parallel: false }, &first, &second).unwrap();
        assert_eq!(result.output.len(), 20);
    }
}
