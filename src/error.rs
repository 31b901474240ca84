//! Error taxonomy for the harness.
//!
//! Every failure is terminal for a run: nothing is retried and no partial
//! results are reported. Discovery errors are raised before any device memory
//! is allocated.

use thiserror::Error;

use crate::ops::wgpu::device::DeviceClass;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, HarnessError>;

/// Everything that can stop a run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No compute platform (wgpu backend with at least one adapter) exists,
    /// or the requested platform index is out of range.
    #[error("no compute platform available")]
    NoPlatform,

    /// The selected platform exposes no device of the requested class.
    #[error("no {class} device on platform `{platform}`")]
    NoDevice {
        /// The class that was asked for.
        class: DeviceClass,
        /// Name of the platform that was searched.
        platform: String,
    },

    /// Opening the selected adapter failed.
    #[error("failed to open device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Kernel source failed to compile or to validate against its signatures.
    #[error("kernel build failed:\n{log}")]
    Build {
        /// Full compiler diagnostic log.
        log: String,
    },

    /// A kernel name was requested that the program does not declare.
    #[error("entry point `{name}` not found (available: {available:?})")]
    EntryPointNotFound {
        /// The name that was asked for.
        name: String,
        /// The entry points the program does declare.
        available: Vec<String>,
    },

    /// An argument does not fit the parameter slot it is bound to.
    #[error("kernel `{entry_point}` argument {position}: expected {expected}, found {found}")]
    KernelArgBind {
        /// Kernel being bound.
        entry_point: String,
        /// Zero-based argument position.
        position: usize,
        /// What the signature declares at that position.
        expected: String,
        /// What was supplied.
        found: String,
    },

    /// The device rejected the launch.
    #[error("kernel launch failed: {0}")]
    Launch(String),

    /// Moving results back to the host failed.
    #[error("device transfer failed: {0}")]
    Transfer(String),

    /// Input shapes disagree with each other or with their declared size.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A host region does not match the byte size of the buffer it mirrors.
    #[error("buffer `{label}` holds {expected} bytes, host region has {actual}")]
    BufferSize {
        /// Buffer label.
        label: String,
        /// Byte size of the device buffer.
        expected: u64,
        /// Byte size of the host region.
        actual: u64,
    },

    /// A buffer would exceed what the device can allocate or bind.
    #[error("buffer `{label}` needs {requested} bytes, device allows {limit}")]
    BufferLimit {
        /// Buffer label.
        label: String,
        /// Bytes the allocation would take.
        requested: u64,
        /// Device limit that applies.
        limit: u64,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

