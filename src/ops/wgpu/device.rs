//! Platform and device discovery.
//!
//! wgpu exposes adapters per graphics backend. A backend plays the role of a
//! platform here and each adapter is a device on it. Discovery enumerates all
//! adapters once; selection is a pure function over the resulting inventory
//! so the policy can be exercised without hardware.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::GpuContext;
use crate::error::{HarnessError, Result};

/// Class of device a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Discrete, integrated or virtual GPU.
    #[default]
    Gpu,
    /// Software rasteriser or CPU device.
    Cpu,
    /// Anything else the backend reports.
    Accelerator,
    /// No filtering.
    Any,
}

impl DeviceClass {
    /// Class a wgpu device type belongs to. Never returns [`DeviceClass::Any`].
    #[must_use]
    pub const fn of(ty: wgpu::DeviceType) -> Self {
        match ty {
            wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu => Self::Gpu,
            wgpu::DeviceType::Cpu => Self::Cpu,
            _ => Self::Accelerator,
        }
    }

    /// True if a device of class `other` satisfies a request for `self`.
    #[must_use]
    pub fn accepts(self, other: Self) -> bool {
        self == Self::Any || self == other
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gpu => "gpu",
            Self::Cpu => "cpu",
            Self::Accelerator => "accelerator",
            Self::Any => "any",
        })
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            "accelerator" => Ok(Self::Accelerator),
            "any" | "all" => Ok(Self::Any),
            other => Err(format!(
                "unknown device class `{other}` (expected gpu, cpu, accelerator or any)"
            )),
        }
    }
}

/// Identification of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Adapter name as reported by the driver.
    pub name: String,
    /// Device class.
    pub class: DeviceClass,
    /// PCI vendor id, 0 if unknown.
    pub vendor: u32,
    /// Driver name.
    pub driver: String,
    /// Whether the adapter can run compute shaders at all.
    pub compute: bool,
    /// Position in the inventory's adapter list.
    pub adapter: usize,
}

/// One backend and the devices it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Backend name, e.g. `Vulkan`.
    pub name: String,
    /// Devices in enumeration order.
    pub devices: Vec<DeviceInfo>,
}

/// What the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceRequest {
    /// Required device class.
    pub class: DeviceClass,
    /// Platform index; `None` means the first platform.
    pub platform: Option<usize>,
}

/// Outcome of a successful selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Index of the chosen platform.
    pub platform_index: usize,
    /// Name of the chosen platform.
    pub platform_name: String,
    /// The chosen device.
    pub device: DeviceInfo,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Platform: {}\nDevice: {} ({})",
            self.platform_name, self.device.name, self.device.class
        )
    }
}

/// Picks a device according to `request`.
///
/// The first platform is used unless the request names one. Within it the
/// first compute-capable device whose class matches wins.
///
/// # Errors
///
/// - [`HarnessError::NoPlatform`] if `platforms` is empty or the requested
///   index is out of range.
/// - [`HarnessError::NoDevice`] if the platform has no matching device.
pub fn select(platforms: &[PlatformInfo], request: &DeviceRequest) -> Result<Selection> {
    let platform_index = request.platform.unwrap_or(0);
    let platform = platforms
        .get(platform_index)
        .ok_or(HarnessError::NoPlatform)?;

    let device = platform
        .devices
        .iter()
        .find(|d| d.compute && request.class.accepts(d.class))
        .ok_or_else(|| HarnessError::NoDevice {
            class: request.class,
            platform: platform.name.clone(),
        })?;

    Ok(Selection {
        platform_index,
        platform_name: platform.name.clone(),
        device: device.clone(),
    })
}

/// All adapters visible to the process, grouped by backend.
pub struct DeviceInventory {
    adapters: Vec<wgpu::Adapter>,
    platforms: Vec<PlatformInfo>,
}

impl DeviceInventory {
    /// Enumerates adapters on every backend wgpu was built with.
    #[must_use]
    pub fn discover() -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());

        let mut platforms: Vec<(wgpu::Backend, PlatformInfo)> = Vec::new();
        for (index, adapter) in adapters.iter().enumerate() {
            let info = adapter.get_info();
            debug!(
                name = %info.name,
                backend = ?info.backend,
                device_type = ?info.device_type,
                "found adapter"
            );
            let device = DeviceInfo {
                name: info.name.clone(),
                class: DeviceClass::of(info.device_type),
                vendor: info.vendor,
                driver: info.driver.clone(),
                compute: adapter
                    .get_downlevel_capabilities()
                    .flags
                    .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
                adapter: index,
            };
            match platforms.iter_mut().find(|(b, _)| *b == info.backend) {
                Some((_, platform)) => platform.devices.push(device),
                None => platforms.push((
                    info.backend,
                    PlatformInfo {
                        name: format!("{:?}", info.backend),
                        devices: vec![device],
                    },
                )),
            }
        }

        info!(
            platforms = platforms.len(),
            adapters = adapters.len(),
            "device discovery finished"
        );
        Self {
            adapters,
            platforms: platforms.into_iter().map(|(_, p)| p).collect(),
        }
    }

    /// An inventory with nothing in it.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            adapters: Vec::new(),
            platforms: Vec::new(),
        }
    }

    /// Discovered platforms in enumeration order.
    #[must_use]
    pub fn platforms(&self) -> &[PlatformInfo] {
        &self.platforms
    }

    /// Applies [`select`] to this inventory.
    ///
    /// # Errors
    ///
    /// See [`select`].
    pub fn select(&self, request: &DeviceRequest) -> Result<Selection> {
        select(&self.platforms, request)
    }

    /// Opens the selected device and its queue.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::NoDevice`] if the selection does not belong to this
    ///   inventory.
    /// - [`HarnessError::DeviceRequest`] if the driver refuses the device.
    pub fn open(&self, selection: &Selection) -> Result<GpuContext> {
        let adapter = self.adapters.get(selection.device.adapter).ok_or_else(|| {
            HarnessError::NoDevice {
                class: selection.device.class,
                platform: selection.platform_name.clone(),
            }
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("hetero_parity"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;

        info!(
            platform = %selection.platform_name,
            device = %selection.device.name,
            "opened device"
        );
        Ok(GpuContext {
            device,
            queue,
            selection: selection.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, class: DeviceClass, adapter: usize) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            class,
            vendor: 0,
            driver: String::new(),
            compute: true,
            adapter,
        }
    }

    fn inventory() -> Vec<PlatformInfo> {
        vec![
            PlatformInfo {
                name: "Vulkan".into(),
                devices: vec![
                    device("llvmpipe", DeviceClass::Cpu, 0),
                    device("Radeon", DeviceClass::Gpu, 1),
                    device("GeForce", DeviceClass::Gpu, 2),
                ],
            },
            PlatformInfo {
                name: "Gl".into(),
                devices: vec![device("Mesa", DeviceClass::Cpu, 3)],
            },
        ]
    }

    #[test]
    fn no_platforms() {
        let err = select(&[], &DeviceRequest::default()).unwrap_err();
        assert!(matches!(err, HarnessError::NoPlatform));
    }

    #[test]
    fn first_matching_device_wins() {
        let sel = select(&inventory(), &DeviceRequest::default()).unwrap();
        assert_eq!(sel.platform_name, "Vulkan");
        assert_eq!(sel.device.name, "Radeon");
    }

    #[test]
    fn explicit_platform_without_gpu() {
        let request = DeviceRequest {
            class: DeviceClass::Gpu,
            platform: Some(1),
        };
        match select(&inventory(), &request).unwrap_err() {
            HarnessError::NoDevice { class, platform } => {
                assert_eq!(class, DeviceClass::Gpu);
                assert_eq!(platform, "Gl");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn platform_index_out_of_range() {
        let request = DeviceRequest {
            class: DeviceClass::Any,
            platform: Some(5),
        };
        assert!(matches!(
            select(&inventory(), &request),
            Err(HarnessError::NoPlatform)
        ));
    }

    #[test]
    fn any_takes_first_device() {
        let request = DeviceRequest {
            class: DeviceClass::Any,
            platform: None,
        };
        assert_eq!(select(&inventory(), &request).unwrap().device.adapter, 0);
    }

    #[test]
    fn devices_without_compute_are_skipped() {
        let mut platforms = inventory();
        platforms[0].devices[1].compute = false;
        let sel = select(&platforms, &DeviceRequest::default()).unwrap();
        assert_eq!(sel.device.name, "GeForce");
    }

    #[test]
    fn class_parsing() {
        assert_eq!("GPU".parse::<DeviceClass>(), Ok(DeviceClass::Gpu));
        assert_eq!("all".parse::<DeviceClass>(), Ok(DeviceClass::Any));
        assert!("tpu".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn empty_inventory_selects_nothing() {
        let inv = DeviceInventory::empty();
        assert!(inv.platforms().is_empty());
        assert!(matches!(
            inv.select(&DeviceRequest::default()),
            Err(HarnessError::NoPlatform)
        ));
    }
}
