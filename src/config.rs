//! Run configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is a valid
//! configuration. The binary layers command-line overrides on top.

use core::fmt;
use core::str::FromStr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HarnessError, Result};
use crate::matrix::{ImageFrame, Matrix};
use crate::ops::wgpu::device::{DeviceClass, DeviceRequest};

/// Which computation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Square `i64` matrix product.
    #[default]
    Matmul,
    /// Grey-level blend of two RGB frames.
    Image,
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matmul => write!(f, "matmul"),
            Self::Image => write!(f, "image"),
        }
    }
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "matmul" => Ok(Self::Matmul),
            "image" | "blend" => Ok(Self::Image),
            other => Err(format!("unknown workload `{other}`")),
        }
    }
}

/// Frame dimensions for the image workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDims {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
}

impl Default for ImageDims {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
        }
    }
}

/// Everything a run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Matrix side length.
    pub size: usize,
    /// Iterations, each with fresh inputs.
    pub repeat: usize,
    /// Workload seed; drawn from entropy when absent.
    pub seed: Option<u64>,
    /// Requested device class.
    pub device_class: DeviceClass,
    /// Platform index; first platform when absent.
    pub platform: Option<usize>,
    /// Computation to run.
    pub workload: Workload,
    /// Use the rayon reference instead of the sequential one.
    pub parallel_reference: bool,
    /// Frame dimensions for [`Workload::Image`].
    pub image: ImageDims,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            size: 512,
            repeat: 1,
            seed: None,
            device_class: DeviceClass::Gpu,
            platform: None,
            workload: Workload::Matmul,
            parallel_reference: false,
            image: ImageDims::default(),
        }
    }
}

impl HarnessConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).map_err(|e| HarnessError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Config`] if the file cannot be read or is invalid.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(HarnessError::Config("size must be > 0".into()));
        }
        if self.repeat == 0 {
            return Err(HarnessError::Config("repeat must be > 0".into()));
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(HarnessError::Config(format!(
                "image must be non-empty, got {}x{}",
                self.image.width, self.image.height
            )));
        }
        if Matrix::element_count(self.size).is_err() {
            return Err(HarnessError::Config(format!(
                "size {} is too large",
                self.size
            )));
        }
        if ImageFrame::byte_count(self.image.width, self.image.height, ImageFrame::RGB).is_err() {
            return Err(HarnessError::Config(format!(
                "image {}x{} is too large",
                self.image.width, self.image.height
            )));
        }
        Ok(())
    }

    /// Device request derived from the class and platform fields.
    #[must_use]
    pub const fn device_request(&self) -> DeviceRequest {
        DeviceRequest {
            class: self.device_class,
            platform: self.platform,
        }
    }

    /// The configured seed, or a fresh one from entropy (logged so the run
    /// can be reproduced).
    #[must_use]
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            let seed = rand::random::<u64>();
            info!(seed, "no seed configured, drew one");
            seed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(
            HarnessConfig::from_toml_str("").unwrap(),
            HarnessConfig::default()
        );
    }

    #[test]
    fn partial_document() {
        let cfg = HarnessConfig::from_toml_str(
            r#"
            size = 64
            repeat = 3
            seed = 42
            device_class = "any"
            workload = "image"

            [image]
            width = 32
            "#,
        )
        .unwrap();
        assert_eq!(cfg.size, 64);
        assert_eq!(cfg.repeat, 3);
        assert_eq!(cfg.resolve_seed(), 42);
        assert_eq!(cfg.device_class, DeviceClass::Any);
        assert_eq!(cfg.workload, Workload::Image);
        assert_eq!(cfg.image.width, 32);
        assert_eq!(cfg.image.height, 960);
    }

    #[test]
    fn zero_size_rejected() {
        assert!(matches!(
            HarnessConfig::from_toml_str("size = 0"),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn zero_repeat_rejected() {
        let cfg = HarnessConfig {
            repeat: 0,
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overflowing_dimensions_rejected() {
        let wide = HarnessConfig {
            image: ImageDims {
                width: usize::MAX,
                height: 2,
            },
            ..HarnessConfig::default()
        };
        assert!(matches!(wide.validate(), Err(HarnessError::Config(_))));

        let huge = HarnessConfig {
            size: usize::MAX,
            ..HarnessConfig::default()
        };
        assert!(matches!(huge.validate(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            HarnessConfig::from_toml_str("size = \"big\""),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn request_follows_fields() {
        let cfg = HarnessConfig {
            device_class: DeviceClass::Cpu,
            platform: Some(2),
            ..HarnessConfig::default()
        };
        let req = cfg.device_request();
        assert_eq!(req.class, DeviceClass::Cpu);
        assert_eq!(req.platform, Some(2));
    }

    #[test]
    fn workload_parsing() {
        assert_eq!("blend".parse::<Workload>(), Ok(Workload::Image));
        assert!("conv".parse::<Workload>().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = HarnessConfig {
            seed: Some(7),
            ..HarnessConfig::default()
        };
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(HarnessConfig::from_toml_str(&text).unwrap(), cfg);
    }
}
