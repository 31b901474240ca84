//! # Operation Dispatch Layer
//!
//! Workloads and the executors that run them.
//!
//! ## Submodules
//!
//! - [`cpu`] — host reference implementations (ground truth)
//! - [`wgpu`] — device discovery, kernel build, buffers and launch on `wgpu`
//! - [`dispatch`] — runs a workload on a chosen executor and tags the result
//!
//! ## Adding a workload
//!
//! 1. Implement the reference in `cpu`
//! 2. Add a WGSL kernel and its `KernelSignature` under `wgpu`
//! 3. Add a dispatch function returning an `ExecutionResult`

pub mod cpu;
pub mod dispatch;
pub mod wgpu;
