//! hetero_parity: run one grid workload on the host and on a GPU, and check
//! that both agree.
//!
//! A run generates seeded integer inputs, computes the result with a plain
//! host implementation (the ground truth), computes it again with a WGSL
//! compute kernel on a device picked through `wgpu`, and compares the two
//! outputs element by element. Launch latency of both paths is recorded.
//!
//! # Features
//!
//! - Square `i64` matrix product, bit-exact on the device via emulated 64-bit
//!   arithmetic.
//! - Grey-level blend of two RGB frames.
//! - Device discovery by backend and device class, with a pure selection step.
//! - Kernel sources paired with typed signatures that are checked against the
//!   source at build time and against arguments at launch time.
//!
//! # Modules
//!
//! - [`workload`] — seeded input generation.
//! - [`ops`] — host reference, device path and dispatch between them.
//! - [`verify`] — element-wise equivalence checking.
//! - [`harness`] — repeatable end-to-end runs and their reports.
//! - [`config`] — TOML run configuration.
//!
//! # Example
//!
//! ```rust
//! use hetero_parity::{ops::cpu, verify, workload};
//!
//! let mut rng = workload::seeded_rng(7);
//! let a = workload::generate_matrix(8, &mut rng).unwrap();
//! let b = workload::generate_matrix(8, &mut rng).unwrap();
//! let c = cpu::matmul(&a, &b).unwrap();
//! assert!(verify::compare(c.as_slice(), cpu::matmul_parallel(&a, &b).unwrap().as_slice()).is_equal());
//! ```
//!
pub mod backend;
pub mod config;
pub mod error;
pub mod harness;
pub mod matrix;
pub mod ops;
pub mod verify;
pub mod workload;

pub use error::{HarnessError, Result};
