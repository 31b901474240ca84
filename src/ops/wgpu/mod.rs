//! # WGPU Backend
//!
//! Accelerated executor built on [`wgpu`](https://docs.rs/wgpu) compute
//! shaders.
//!
//! The path from hardware to result is split the same way every run:
//!
//! 1. [`device`] finds adapters and opens one as a [`GpuContext`]
//! 2. [`program`] compiles a [`signature::KernelSource`] into a [`program::Program`]
//! 3. [`buffer`] moves inputs to the device and outputs back
//! 4. [`launch`] binds arguments and runs a kernel to completion
//!
//! [`Accelerator`] wires the four together for the two bundled kernels.
//!
//! ## Notes
//!
//! - All async wgpu calls are driven with `pollster::block_on`
//! - Every resource is owned and released on drop; there is no global context

pub mod buffer;
pub mod device;
pub mod launch;
pub mod program;
pub mod signature;

use std::time::Duration;

use tracing::debug;

use self::buffer::BufferManager;
use self::device::Selection;
use self::launch::{Dispatcher, IndexDomain, KernelArg, Scalar};
use self::program::{Program, ProgramBuilder};
use self::signature::{BLEND_ENTRY, KernelSource, MATMUL_ENTRY};
use crate::error::{HarnessError, Result};
use crate::matrix::{ImageFrame, Matrix};

/// An opened device, its queue and where it came from.
pub struct GpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) selection: Selection,
}

impl GpuContext {
    /// The platform and device this context was opened on.
    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Limits the device was opened with.
    #[must_use]
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Runs `f` inside a validation error scope.
    ///
    /// The scope is popped whether or not `f` succeeds, so an early return
    /// inside `f` never leaves a scope behind. An error from `f` wins over a
    /// captured device error; a captured device error alone is converted with
    /// `on_error`.
    ///
    /// # Errors
    ///
    /// The error returned by `f`, or `on_error` applied to the device error.
    pub fn scoped<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> Result<T>,
        on_error: impl FnOnce(wgpu::Error) -> HarnessError,
    ) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f(&self.device);
        let captured = pollster::block_on(self.device.pop_error_scope());
        let value = result?;
        match captured {
            Some(err) => Err(on_error(err)),
            None => Ok(value),
        }
    }
}

fn dimension(value: usize, what: &str) -> Result<(i32, u32)> {
    let signed = i32::try_from(value)
        .map_err(|_| HarnessError::DimensionMismatch(format!("{what} {value} exceeds i32")))?;
    Ok((signed, signed.unsigned_abs()))
}

/// A context with a built program, ready to run its kernels.
pub struct Accelerator {
    context: GpuContext,
    program: Program,
}

impl Accelerator {
    /// Builds `source` on `context`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Build`] if the source does not compile.
    pub fn new(context: GpuContext, source: &KernelSource) -> Result<Self> {
        let program = ProgramBuilder::new(&context).build(source)?;
        debug!(
            program = program.label(),
            entry_points = ?program.entry_points().collect::<Vec<_>>(),
            device = %context.selection().device.name,
            "accelerator ready"
        );
        Ok(Self { context, program })
    }

    /// The underlying context.
    #[must_use]
    pub const fn context(&self) -> &GpuContext {
        &self.context
    }

    /// The built program.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// Runs the matrix product kernel. Returns the product and the launch
    /// latency, transfer excluded.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::DimensionMismatch`] if the sizes differ or do not fit
    ///   the kernel's `i32` size parameter.
    /// - [`HarnessError::EntryPointNotFound`] if the program has no matrix
    ///   product kernel.
    /// - Any buffer, launch or transfer error.
    pub fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<(Matrix, Duration)> {
        if a.size() != b.size() {
            return Err(HarnessError::DimensionMismatch(format!(
                "cannot multiply {0}x{0} by {1}x{1}",
                a.size(),
                b.size()
            )));
        }
        let size = a.size();
        let (n, extent) = dimension(size, "matrix size")?;
        let kernel = self.program.kernel(MATMUL_ENTRY)?;

        let buffers = BufferManager::new(&self.context);
        let a_buf = buffers.upload("A", a.as_slice())?;
        let b_buf = buffers.upload("B", b.as_slice())?;
        let c_buf = buffers.allocate::<i64>("C", a.len())?;

        let launched = Dispatcher::new(&self.context).launch(
            kernel,
            &[
                KernelArg::Buffer(&a_buf),
                KernelArg::Buffer(&b_buf),
                KernelArg::Buffer(&c_buf),
                KernelArg::Scalar(Scalar::I32(n)),
            ],
            IndexDomain::new(extent, extent),
        )?;

        let mut out = vec![0i64; a.len()];
        buffers.read_back(&c_buf, &launched, &mut out)?;
        debug!(size, buffers = buffers.allocations(), "matmul finished on device");
        Ok((Matrix::new(size, out)?, launched.elapsed()))
    }

    /// Runs the image blend kernel. Returns the single-channel frame and the
    /// launch latency, transfer excluded.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::DimensionMismatch`] if the frames are not two equal
    ///   RGB frames.
    /// - [`HarnessError::EntryPointNotFound`] if the program has no blend
    ///   kernel.
    /// - Any buffer, launch or transfer error.
    pub fn blend(
        &self,
        first: &ImageFrame,
        second: &ImageFrame,
    ) -> Result<(ImageFrame, Duration)> {
        if !first.same_shape(second) || first.channels() != ImageFrame::RGB {
            return Err(HarnessError::DimensionMismatch(
                "blend needs two equal RGB frames".to_string(),
            ));
        }
        let (rows, height) = dimension(first.height(), "frame height")?;
        let (cols, width) = dimension(first.width(), "frame width")?;
        let kernel = self.program.kernel(BLEND_ENTRY)?;

        let buffers = BufferManager::new(&self.context);
        let img1 = buffers.upload("img1", first.as_bytes())?;
        let img2 = buffers.upload("img2", second.as_bytes())?;
        let result = buffers.allocate::<u8>("result", first.pixels())?;

        let launched = Dispatcher::new(&self.context).launch(
            kernel,
            &[
                KernelArg::Buffer(&img1),
                KernelArg::Buffer(&img2),
                KernelArg::Buffer(&result),
                KernelArg::Scalar(Scalar::I32(rows)),
                KernelArg::Scalar(Scalar::I32(cols)),
            ],
            IndexDomain::new(width, height),
        )?;

        let mut out = vec![0u8; first.pixels()];
        buffers.read_back(&result, &launched, &mut out)?;
        Ok((
            ImageFrame::new(first.width(), first.height(), 1, out)?,
            launched.elapsed(),
        ))
    }
}
