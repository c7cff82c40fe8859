//! Machine delivery profile.
//!
//! A profile is an immutable value handed to the aggregator, so several
//! machines can be evaluated side by side.

use super::constants::{
    DEFAULT_LEAF_PAIRS, DEFAULT_LEAF_WIDTH_MM, DEFAULT_MAX_DOSE_RATE, DEFAULT_MAX_GANTRY_SPEED,
    DEFAULT_MAX_MLC_SPEED,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineProfile {
    /// MU/min.
    pub max_dose_rate: f64,
    /// MU/min ceiling for flattening-filter-free energies.
    pub max_dose_rate_fff: Option<f64>,
    /// deg/s.
    pub max_gantry_speed: f64,
    /// mm/s.
    pub max_mlc_speed: f64,
    pub default_leaf_width: f64,
    pub default_leaf_pairs: usize,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            max_dose_rate: DEFAULT_MAX_DOSE_RATE,
            max_dose_rate_fff: None,
            max_gantry_speed: DEFAULT_MAX_GANTRY_SPEED,
            max_mlc_speed: DEFAULT_MAX_MLC_SPEED,
            default_leaf_width: DEFAULT_LEAF_WIDTH_MM,
            default_leaf_pairs: DEFAULT_LEAF_PAIRS,
        }
    }
}

impl MachineProfile {
    pub fn dose_rate_for(&self, fff: bool) -> f64 {
        match self.max_dose_rate_fff {
            Some(rate) if fff => rate,
            _ => self.max_dose_rate,
        }
    }

    pub fn validate(&self) -> Result<(), MachineProfileError> {
        let checks = [
            ("maxDoseRate", self.max_dose_rate),
            ("maxGantrySpeed", self.max_gantry_speed),
            ("maxMlcSpeed", self.max_mlc_speed),
            ("defaultLeafWidth", self.default_leaf_width),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(MachineProfileError::NonPositiveLimit { field, value });
            }
        }

        if let Some(value) = self
            .max_dose_rate_fff
            .filter(|rate| !rate.is_finite() || *rate <= 0.0)
        {
            return Err(MachineProfileError::NonPositiveLimit {
                field: "maxDoseRateFff",
                value,
            });
        }

        if self.default_leaf_pairs == 0 {
            return Err(MachineProfileError::EmptyLeafStack);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MachineProfileError {
    #[error("failed to read machine profile '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse machine profile '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("machine profile field '{field}' must be finite and > 0, got {value}")]
    NonPositiveLimit { field: &'static str, value: f64 },
    #[error("machine profile must declare at least one default leaf pair")]
    EmptyLeafStack,
}

pub fn load_machine_profile(
    profile_path: impl AsRef<Path>,
) -> Result<MachineProfile, MachineProfileError> {
    let profile_path = profile_path.as_ref();
    let source = fs::read_to_string(profile_path).map_err(|source| MachineProfileError::Read {
        path: profile_path.to_path_buf(),
        source,
    })?;
    let profile: MachineProfile =
        serde_json::from_str(&source).map_err(|source| MachineProfileError::Parse {
            path: profile_path.to_path_buf(),
            source,
        })?;
    profile.validate()?;
    Ok(profile)
}
