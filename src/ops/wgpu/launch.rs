//! Kernel launch.
//!
//! Arguments are bound positionally and checked against the kernel's
//! signature before anything reaches the device. Storage buffers take
//! bindings `0..n` in order; scalars are packed into a uniform block bound
//! right after them.

use std::time::{Duration, Instant};

use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use super::GpuContext;
use super::buffer::DeviceBuffer;
use super::program::Kernel;
use super::signature::{Access, ElementType, KernelSignature, Param, ScalarType};
use crate::error::{HarnessError, Result};

/// Uniform blocks are laid out in 16-byte rows.
const UNIFORM_ALIGN: usize = 16;

/// Scalar kernel argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    /// 32-bit signed integer.
    I32(i32),
    /// 32-bit unsigned integer.
    U32(u32),
}

impl Scalar {
    const fn ty(self) -> ScalarType {
        match self {
            Self::I32(_) => ScalarType::I32,
            Self::U32(_) => ScalarType::U32,
        }
    }

    const fn to_le_bytes(self) -> [u8; 4] {
        match self {
            Self::I32(v) => v.to_le_bytes(),
            Self::U32(v) => v.to_le_bytes(),
        }
    }
}

/// One positional kernel argument.
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    /// A device buffer.
    Buffer(&'a DeviceBuffer),
    /// A scalar value.
    Scalar(Scalar),
}

/// Shape of an argument, used for checking against a [`Param`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A buffer with its access and element type.
    Buffer {
        /// Access intent.
        access: Access,
        /// Element type.
        element: ElementType,
    },
    /// A scalar of the given type.
    Scalar(ScalarType),
}

impl ArgKind {
    fn describe(self) -> String {
        match self {
            Self::Buffer { access, element } => format!("{access:?} buffer of {element:?}"),
            Self::Scalar(ty) => format!("scalar {ty:?}"),
        }
    }
}

impl KernelArg<'_> {
    /// Shape of this argument.
    #[must_use]
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Buffer(buf) => ArgKind::Buffer {
                access: buf.access(),
                element: buf.element(),
            },
            Self::Scalar(s) => ArgKind::Scalar(s.ty()),
        }
    }
}

/// Checks an argument list against `sig`, position by position.
///
/// # Errors
///
/// [`HarnessError::KernelArgBind`] naming the first offending position. A
/// missing or surplus argument is reported at the position where the lists
/// diverge.
pub fn check_args(sig: &KernelSignature, args: &[ArgKind]) -> Result<()> {
    let len = sig.params.len().max(args.len());
    for position in 0..len {
        let param = sig.params.get(position);
        let arg = args.get(position);
        let matches = match (param, arg) {
            (
                Some(Param::Buffer { access, element }),
                Some(ArgKind::Buffer {
                    access: a,
                    element: e,
                }),
            ) => access == a && element == e,
            (Some(Param::Scalar(ty)), Some(ArgKind::Scalar(t))) => ty == t,
            _ => false,
        };
        if !matches {
            return Err(HarnessError::KernelArgBind {
                entry_point: sig.entry_point.to_string(),
                position,
                expected: param.map_or_else(|| "nothing".to_string(), Param::describe),
                found: arg.map_or_else(|| "nothing".to_string(), |a| a.describe()),
            });
        }
    }
    Ok(())
}

/// Packs scalars into a zero-padded uniform block.
fn pack_scalars(scalars: &[Scalar]) -> Vec<u8> {
    let mut block: Vec<u8> = scalars.iter().flat_map(|s| s.to_le_bytes()).collect();
    let padded = block.len().div_ceil(UNIFORM_ALIGN).max(1) * UNIFORM_ALIGN;
    block.resize(padded, 0);
    block
}

/// Two-dimensional index domain, `(x, y)`. The kernel sees `x` as
/// `global_invocation_id.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDomain {
    /// Extent along x.
    pub x: u32,
    /// Extent along y.
    pub y: u32,
}

impl IndexDomain {
    /// Domain of `x × y` work items.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Workgroup counts covering the domain for the given workgroup shape.
    #[must_use]
    pub const fn workgroups(self, shape: [u32; 2]) -> (u32, u32) {
        (self.x.div_ceil(shape[0]), self.y.div_ceil(shape[1]))
    }

    fn check(self, sig: &KernelSignature, limit: u32) -> Result<(u32, u32)> {
        if self.x == 0 || self.y == 0 {
            return Err(HarnessError::Launch(format!(
                "empty index domain {}x{}",
                self.x, self.y
            )));
        }
        let (gx, gy) = self.workgroups(sig.workgroup);
        if gx > limit || gy > limit {
            return Err(HarnessError::Launch(format!(
                "index domain {}x{} needs {gx}x{gy} workgroups, device allows {limit} per dimension",
                self.x, self.y
            )));
        }
        Ok((gx, gy))
    }
}

/// Proof that a launch completed. Required to read outputs back.
#[derive(Debug, Clone, Copy)]
pub struct Launched {
    kernel: &'static str,
    elapsed: Duration,
}

impl Launched {
    /// Kernel that ran.
    #[must_use]
    pub const fn kernel(&self) -> &'static str {
        self.kernel
    }

    /// Wall-clock time from submission to device completion.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Launches kernels on one context.
pub struct Dispatcher<'ctx> {
    ctx: &'ctx GpuContext,
}

impl<'ctx> Dispatcher<'ctx> {
    /// Dispatcher for the given context.
    #[must_use]
    pub const fn new(ctx: &'ctx GpuContext) -> Self {
        Self { ctx }
    }

    /// Binds `args`, runs `kernel` over `domain` and blocks until the device
    /// is idle.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::KernelArgBind`] if `args` do not match the kernel's
    ///   signature.
    /// - [`HarnessError::Launch`] if the domain is empty, exceeds the
    ///   device's workgroup limits, or the device rejects the submission.
    pub fn launch(
        &self,
        kernel: &Kernel,
        args: &[KernelArg<'_>],
        domain: IndexDomain,
    ) -> Result<Launched> {
        let sig = kernel.signature();
        let kinds: Vec<ArgKind> = args.iter().map(KernelArg::kind).collect();
        check_args(sig, &kinds)?;

        let device = &self.ctx.device;
        let limit = device.limits().max_compute_workgroups_per_dimension;
        let (gx, gy) = domain.check(sig, limit)?;

        let scalars: Vec<Scalar> = args
            .iter()
            .filter_map(|a| match a {
                KernelArg::Scalar(s) => Some(*s),
                KernelArg::Buffer(_) => None,
            })
            .collect();

        let elapsed = self.ctx.scoped(
            |device| {
                let uniform = (!scalars.is_empty()).then(|| {
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("params"),
                        contents: &pack_scalars(&scalars),
                        usage: wgpu::BufferUsages::UNIFORM,
                    })
                });

                let mut entries: Vec<wgpu::BindGroupEntry<'_>> = args
                    .iter()
                    .filter_map(|a| match a {
                        KernelArg::Buffer(buf) => Some(buf.as_entire_binding()),
                        KernelArg::Scalar(_) => None,
                    })
                    .enumerate()
                    .map(|(binding, resource)| wgpu::BindGroupEntry {
                        binding: binding as u32,
                        resource,
                    })
                    .collect();
                if let Some(uniform) = &uniform {
                    entries.push(wgpu::BindGroupEntry {
                        binding: entries.len() as u32,
                        resource: uniform.as_entire_binding(),
                    });
                }

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(kernel.name()),
                    layout: kernel.layout(),
                    entries: &entries,
                });

                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some(kernel.name()),
                    });
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(kernel.name()),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(kernel.pipeline());
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.dispatch_workgroups(gx, gy, 1);
                }
                trace!(kernel = kernel.name(), gx, gy, "encoded dispatch");

                let start = Instant::now();
                self.ctx.queue.submit(Some(encoder.finish()));
                device
                    .poll(wgpu::PollType::Wait)
                    .map_err(|e| HarnessError::Launch(e.to_string()))?;
                Ok(start.elapsed())
            },
            |err| HarnessError::Launch(err.to_string()),
        )?;

        debug!(
            kernel = kernel.name(),
            x = domain.x,
            y = domain.y,
            elapsed_us = elapsed.as_micros() as u64,
            "launch complete"
        );
        Ok(Launched {
            kernel: kernel.name(),
            elapsed,
        })
    }
}
