//! Execution backends.
//!
//! Every [`ExecutionResult`] is tagged with the
//! backend that produced it, so reports and verdicts can say which side
//! disagreed.
//!
//! # Supported Backends
//!
//! - `Cpu` — sequential host reference, the ground truth.
//! - `Wgpu` — data-parallel accelerator path through `wgpu`.

use core::fmt;
use std::time::Duration;

/// Origin of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Backend {
    /// Host reference executor (default).
    #[default]
    Cpu = 0,
    /// Accelerated executor on a wgpu device.
    Wgpu,
}

impl Backend {
    /// Short name used in logs and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Wgpu => "gpu",
        }
    }

    /// True for the ground-truth side.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Cpu)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of one executor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult<T> {
    /// Which executor produced the output.
    pub backend: Backend,
    /// Flat output data.
    pub output: Vec<T>,
    /// Latency of the computation, result transfer excluded.
    pub elapsed: Duration,
}

impl<T> ExecutionResult<T> {
    /// Latency in fractional milliseconds.
    #[must_use]
    pub fn millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1e3
    }
}
