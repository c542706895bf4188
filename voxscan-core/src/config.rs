//! Scan parameters.
//!
//! Every scan and rasterize call takes a [`ScanConfig`] explicitly; nothing
//! here is global. Configurations can be written by hand or loaded from TOML:
//!
//! ```toml
//! pitch = 0.1
//! tissue = "bone"
//! sample_count = 50
//!
//! [planes]
//! xy = true
//! yz = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxScanError};
use crate::scan::PlaneMode;

/// Longest debounce window the scheduler accepts.
pub const MAX_UPDATE_DELAY_MS: u64 = 100;

/// Which viewing planes (or the volumetric grid) a voxel scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivePlanes {
    pub xy: bool,
    pub xz: bool,
    pub yz: bool,
    /// Full 2D ray grid along Z; replaces the per-plane passes when set.
    pub volumetric: bool,
}

impl ActivePlanes {
    pub fn none() -> Self {
        Self {
            xy: false,
            xz: false,
            yz: false,
            volumetric: false,
        }
    }

    pub fn volumetric() -> Self {
        Self {
            volumetric: true,
            ..Self::none()
        }
    }

    /// Only the given plane.
    pub fn only(mode: PlaneMode) -> Self {
        let mut planes = Self::none();
        planes.set(mode, true);
        planes
    }

    pub fn contains(&self, mode: PlaneMode) -> bool {
        match mode {
            PlaneMode::Xy => self.xy,
            PlaneMode::Xz => self.xz,
            PlaneMode::Yz => self.yz,
        }
    }

    pub fn set(&mut self, mode: PlaneMode, on: bool) {
        match mode {
            PlaneMode::Xy => self.xy = on,
            PlaneMode::Xz => self.xz = on,
            PlaneMode::Yz => self.yz = on,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.xy || self.xz || self.yz || self.volumetric)
    }
}

impl Default for ActivePlanes {
    fn default() -> Self {
        Self {
            xy: true,
            ..Self::none()
        }
    }
}

/// Imaging modality the synthetic slices imitate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Ct,
    Mri,
    Ultrasound,
    Pet,
}

/// Tissue presets with a known CT intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tissue {
    Heart,
    Brain,
    Muscle,
    Liver,
    Lungs,
    Bone,
}

impl Tissue {
    /// Hounsfield units for the tissue on a CT scan.
    pub fn hounsfield(self) -> i32 {
        match self {
            Tissue::Heart => 50,
            Tissue::Brain => 40,
            Tissue::Muscle => 30,
            Tissue::Liver => 50,
            Tissue::Lungs => -600,
            Tissue::Bone => 1000,
        }
    }
}

impl Modality {
    /// Base intensity lookup. Only CT has a table.
    pub fn base_intensity(self, tissue: Tissue) -> Result<i32> {
        match self {
            Modality::Ct => Ok(tissue.hounsfield()),
            other => Err(VoxScanError::UnsupportedModality(other)),
        }
    }
}

/// Parameters for voxel scans and slice stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Grid pitch in world units; also the voxel edge length.
    pub pitch: f32,

    /// Reserved. Carried for hosts that expose it; scans ignore it.
    pub threshold: f32,

    pub planes: ActivePlanes,

    /// Coordinate of each viewing plane along its normal.
    pub plane_offset: f32,

    pub modality: Modality,
    pub tissue: Tissue,

    /// Overrides the modality/tissue lookup when set.
    pub base_intensity: Option<i32>,

    /// Number of slices in a stack.
    pub sample_count: usize,

    pub raster_width: u32,
    pub raster_height: u32,
    pub padding: u32,

    /// Scale of the additive noise on filled pixels.
    pub noise_std_dev: f32,

    /// Fixed seed for reproducible slice noise.
    pub noise_seed: Option<u64>,

    /// Debounce window for live updates, clamped to `MAX_UPDATE_DELAY_MS`.
    pub update_delay_ms: u64,

    pub live_update: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pitch: 0.05,
            threshold: 0.05,
            planes: ActivePlanes::default(),
            plane_offset: 0.0,
            modality: Modality::Ct,
            tissue: Tissue::Heart,
            base_intensity: None,
            sample_count: 100,
            raster_width: 1024,
            raster_height: 1024,
            padding: 50,
            noise_std_dev: 50.0,
            noise_seed: None,
            update_delay_ms: 50,
            live_update: false,
        }
    }
}

impl ScanConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ScanConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        validate_pitch(self.pitch)
    }

    /// Base intensity for filled pixels.
    pub fn resolved_base_intensity(&self) -> Result<i32> {
        match self.base_intensity {
            Some(value) => Ok(value),
            None => self.modality.base_intensity(self.tissue),
        }
    }

    pub fn update_delay(&self) -> Duration {
        Duration::from_millis(self.update_delay_ms.min(MAX_UPDATE_DELAY_MS))
    }
}

pub(crate) fn validate_pitch(pitch: f32) -> Result<()> {
    if pitch.is_finite() && pitch > 0.0 {
        Ok(())
    } else {
        Err(VoxScanError::InvalidPitch(pitch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.pitch, 0.05);
        assert_eq!(config.sample_count, 100);
        assert_eq!(config.raster_width, 1024);
        assert_eq!(config.padding, 50);
        assert!(config.planes.xy && !config.planes.xz && !config.planes.yz);
        assert_eq!(config.resolved_base_intensity().unwrap(), 50);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScanConfig::from_toml_str(
            r#"
            pitch = 0.1
            tissue = "bone"

            [planes]
            xy = false
            yz = true
            "#,
        )
        .unwrap();
        assert_eq!(config.pitch, 0.1);
        assert_eq!(config.resolved_base_intensity().unwrap(), 1000);
        assert!(!config.planes.xy);
        assert!(config.planes.yz);
        assert_eq!(config.sample_count, 100);
    }

    #[test]
    fn test_rejects_bad_pitch() {
        let err = ScanConfig::from_toml_str("pitch = -1.0").unwrap_err();
        assert!(matches!(err, VoxScanError::InvalidPitch(_)));
        assert!(matches!(
            ScanConfig::from_toml_str("pitch = \"wide\""),
            Err(VoxScanError::Config(_))
        ));
    }

    #[test]
    fn test_modalities() {
        assert_eq!(Modality::Ct.base_intensity(Tissue::Lungs).unwrap(), -600);
        assert!(matches!(
            Modality::Mri.base_intensity(Tissue::Heart),
            Err(VoxScanError::UnsupportedModality(Modality::Mri))
        ));

        let config = ScanConfig {
            modality: Modality::Pet,
            base_intensity: Some(120),
            ..ScanConfig::default()
        };
        assert_eq!(config.resolved_base_intensity().unwrap(), 120);
    }

    #[test]
    fn test_update_delay_is_clamped() {
        let config = ScanConfig {
            update_delay_ms: 5_000,
            ..ScanConfig::default()
        };
        assert_eq!(config.update_delay(), Duration::from_millis(100));
    }
}
