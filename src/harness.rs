//! End-to-end runs.
//!
//! A run selects a device before touching any device memory, builds the
//! kernel once, then repeats generate, execute on both paths, compare. Each
//! iteration draws fresh inputs from the same seeded generator, so a run is
//! reproducible from its seed.

use core::fmt;
use std::time::Duration;

use rand_chacha::ChaCha8Rng;
use tracing::{info, info_span, warn};

use crate::backend::ExecutionResult;
use crate::config::{HarnessConfig, Workload};
use crate::error::Result;
use crate::matrix::{ImageFrame, Matrix};
use crate::ops::dispatch::{self, Executor};
use crate::ops::wgpu::Accelerator;
use crate::ops::wgpu::device::{DeviceInventory, Selection};
use crate::ops::wgpu::signature::KernelSource;
use crate::verify::{self, Verdict};
use crate::workload::{generate_frame, generate_matrix, seeded_rng};

/// Minimum, median and maximum of a set of latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyStats {
    /// Fastest sample.
    pub min: Duration,
    /// Middle sample (upper middle for an even count).
    pub median: Duration,
    /// Slowest sample.
    pub max: Duration,
}

impl LatencyStats {
    /// Statistics over `samples`; all zero when there are none.
    #[must_use]
    pub fn from_samples(samples: &[Duration]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        match (sorted.first(), sorted.last()) {
            (Some(&min), Some(&max)) => Self {
                min,
                median: sorted[sorted.len() / 2],
                max,
            },
            _ => Self::default(),
        }
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |d: Duration| d.as_secs_f64() * 1e3;
        write!(
            f,
            "min {:.3} ms, median {:.3} ms, max {:.3} ms",
            ms(self.min),
            ms(self.median),
            ms(self.max)
        )
    }
}

/// Timings and verdict of one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome<T> {
    /// Host reference latency.
    pub reference: Duration,
    /// Device launch latency.
    pub accelerated: Duration,
    /// Agreement of the two outputs.
    pub verdict: Verdict<T>,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport<T> {
    /// Computation that ran.
    pub workload: Workload,
    /// Human-readable problem shape.
    pub shape: String,
    /// Seed the inputs were generated from.
    pub seed: u64,
    /// Device the accelerated path ran on.
    pub selection: Selection,
    /// One entry per completed iteration.
    pub iterations: Vec<IterationOutcome<T>>,
}

impl<T: Copy> RunReport<T> {
    /// Latency statistics of the reference path.
    #[must_use]
    pub fn reference_stats(&self) -> LatencyStats {
        let samples: Vec<_> = self.iterations.iter().map(|i| i.reference).collect();
        LatencyStats::from_samples(&samples)
    }

    /// Latency statistics of the accelerated path.
    #[must_use]
    pub fn accelerated_stats(&self) -> LatencyStats {
        let samples: Vec<_> = self.iterations.iter().map(|i| i.accelerated).collect();
        LatencyStats::from_samples(&samples)
    }

    /// First disagreement across iterations, or [`Verdict::Equal`].
    #[must_use]
    pub fn verdict(&self) -> Verdict<T> {
        self.iterations
            .iter()
            .map(|i| i.verdict)
            .find(|v| !v.is_equal())
            .unwrap_or(Verdict::Equal)
    }

    /// True if every iteration agreed.
    #[must_use]
    pub fn is_equal(&self) -> bool {
        self.verdict().is_equal()
    }
}

impl<T: Copy + fmt::Display> fmt::Display for RunReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.selection)?;
        writeln!(
            f,
            "Workload: {} {} (seed {}, {} iteration{})",
            self.workload,
            self.shape,
            self.seed,
            self.iterations.len(),
            if self.iterations.len() == 1 { "" } else { "s" }
        )?;
        writeln!(f, "Reference: {}", self.reference_stats())?;
        writeln!(f, "Accelerated: {}", self.accelerated_stats())?;
        write!(f, "Verdict: {}", self.verdict())
    }
}

/// Device setup shared by both workloads. Selection happens before the
/// device is opened so discovery failures never allocate.
fn prepare(
    inventory: &DeviceInventory,
    config: &HarnessConfig,
    source: &KernelSource,
) -> Result<(Accelerator, Selection, u64)> {
    config.validate()?;
    let selection = inventory.select(&config.device_request())?;
    info!(
        platform = %selection.platform_name,
        device = %selection.device.name,
        class = %selection.device.class,
        "selected device"
    );
    let accelerator = Accelerator::new(inventory.open(&selection)?, source)?;
    Ok((accelerator, selection, config.resolve_seed()))
}

fn iterate<T, I>(
    config: &HarnessConfig,
    accelerator: &Accelerator,
    rng: &mut ChaCha8Rng,
    mut generate: impl FnMut(&mut ChaCha8Rng) -> Result<I>,
    mut execute: impl FnMut(&Executor<'_>, &I) -> Result<ExecutionResult<T>>,
) -> Result<Vec<IterationOutcome<T>>>
where
    T: Copy + PartialEq + fmt::Display,
{
    let reference = Executor::Cpu {
        parallel: config.parallel_reference,
    };
    let accelerated = Executor::Wgpu(accelerator);

    let mut outcomes = Vec::with_capacity(config.repeat);
    for iteration in 0..config.repeat {
        let _span = info_span!("iteration", iteration).entered();
        let inputs = generate(rng)?;
        let expected = execute(&reference, &inputs)?;
        let actual = execute(&accelerated, &inputs)?;
        let verdict = verify::check(&expected, &actual);

        info!(
            reference_ms = expected.millis(),
            accelerated_ms = actual.millis(),
            verdict = %verdict,
            "iteration finished"
        );
        let equal = verdict.is_equal();
        outcomes.push(IterationOutcome {
            reference: expected.elapsed,
            accelerated: actual.elapsed,
            verdict,
        });
        if !equal {
            warn!(iteration, "outputs disagree, stopping");
            break;
        }
    }
    Ok(outcomes)
}

/// Runs the matrix product workload.
///
/// # Errors
///
/// Any configuration, discovery, build or device error. A disagreement is
/// not an error; it is reported in the [`RunReport`] verdict.
pub fn run_matmul(inventory: &DeviceInventory, config: &HarnessConfig) -> Result<RunReport<i64>> {
    let (accelerator, selection, seed) = prepare(inventory, config, &KernelSource::matmul())?;
    let mut rng = seeded_rng(seed);
    let size = config.size;

    let iterations = iterate(
        config,
        &accelerator,
        &mut rng,
        |rng| Ok((generate_matrix(size, rng)?, generate_matrix(size, rng)?)),
        |executor, (a, b): &(Matrix, Matrix)| dispatch::matmul(executor, a, b),
    )?;

    Ok(RunReport {
        workload: Workload::Matmul,
        shape: format!("{size}x{size}"),
        seed,
        selection,
        iterations,
    })
}

/// Runs the image blend workload.
///
/// # Errors
///
/// Same as [`run_matmul`].
pub fn run_image(inventory: &DeviceInventory, config: &HarnessConfig) -> Result<RunReport<u8>> {
    let (accelerator, selection, seed) = prepare(inventory, config, &KernelSource::blend())?;
    let mut rng = seeded_rng(seed);
    let (width, height) = (config.image.width, config.image.height);

    let iterations = iterate(
        config,
        &accelerator,
        &mut rng,
        |rng| {
            Ok((
                generate_frame(width, height, ImageFrame::RGB, rng)?,
                generate_frame(width, height, ImageFrame::RGB, rng)?,
            ))
        },
        |executor, (first, second): &(ImageFrame, ImageFrame)| {
            dispatch::blend(executor, first, second)
        },
    )?;

    Ok(RunReport {
        workload: Workload::Image,
        shape: format!("{width}x{height}"),
        seed,
        selection,
        iterations,
    })
}
