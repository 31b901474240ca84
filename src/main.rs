//! Command-line front end.
//!
//! ```bash
//! # 512x512 matrix product on the first GPU, once
//! hetero-parity
//!
//! # image blend, five iterations, fixed seed
//! hetero-parity --workload image --repeat 5 --seed 42
//!
//! # settings from a file, size overridden
//! hetero-parity --config run.toml --size 1024
//! ```
//!
//! Exits non-zero on any failure and when the two paths disagree.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hetero_parity::config::{HarnessConfig, Workload};
use hetero_parity::harness;
use hetero_parity::ops::wgpu::device::{DeviceClass, DeviceInventory};

/// Compare a host reference against a GPU kernel on the same inputs
#[derive(Parser, Debug)]
#[command(name = "hetero-parity")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Matrix side length
    #[arg(short, long)]
    size: Option<usize>,

    /// Iterations, each with fresh inputs
    #[arg(short, long)]
    repeat: Option<usize>,

    /// Input seed
    #[arg(long)]
    seed: Option<u64>,

    /// Device class: gpu, cpu, accelerator or any
    #[arg(long)]
    device_class: Option<DeviceClass>,

    /// Platform index
    #[arg(long)]
    platform: Option<usize>,

    /// Workload: matmul or image
    #[arg(short, long)]
    workload: Option<Workload>,

    /// Use the multi-threaded host reference
    #[arg(long)]
    parallel_reference: bool,

    /// Print discovered platforms and devices, then exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn into_config(self) -> Result<HarnessConfig> {
        let mut cfg = match &self.config {
            Some(path) => HarnessConfig::from_path(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HarnessConfig::default(),
        };
        if let Some(size) = self.size {
            cfg.size = size;
        }
        if let Some(repeat) = self.repeat {
            cfg.repeat = repeat;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(class) = self.device_class {
            cfg.device_class = class;
        }
        if self.platform.is_some() {
            cfg.platform = self.platform;
        }
        if let Some(workload) = self.workload {
            cfg.workload = workload;
        }
        cfg.parallel_reference |= self.parallel_reference;
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

fn list_devices(inventory: &DeviceInventory) {
    if inventory.platforms().is_empty() {
        println!("no platforms found");
    }
    for (index, platform) in inventory.platforms().iter().enumerate() {
        println!("[{index}] {}", platform.name);
        for device in &platform.devices {
            println!(
                "    {} ({}, vendor {:#06x}, driver {})",
                device.name, device.class, device.vendor, device.driver
            );
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let list = cli.list_devices;
    let inventory = DeviceInventory::discover();
    if list {
        list_devices(&inventory);
        return Ok(true);
    }

    let cfg = cli.into_config()?;
    info!(workload = %cfg.workload, repeat = cfg.repeat, "starting run");
    let equal = match cfg.workload {
        Workload::Matmul => {
            let report = harness::run_matmul(&inventory, &cfg).context("matmul run failed")?;
            println!("{report}");
            report.is_equal()
        }
        Workload::Image => {
            let report = harness::run_image(&inventory, &cfg).context("image run failed")?;
            println!("{report}");
            report.is_equal()
        }
    };
    Ok(equal)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
