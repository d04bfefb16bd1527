//! Infectious-duration kernel and under-detection multiplier.
//!
//! The default table holds `1 - CDF` of a calibrated gamma distribution at
//! integer lags 0..29: the probability that a case confirmed `lag` days ago
//! is still infectious. Both the table and the multiplier are plain data and
//! may be replaced from a TOML file.

use std::path::Path;

use covid_track_case_models::WINDOW_DAYS;
use serde::Deserialize;

use crate::EstimateError;

/// Multiplier correcting for unreported infections.
pub const DEFAULT_UNDETECTED_FACTOR: f64 = 2.4;

/// Survival weights for lags `0..30`, newest sample first.
pub const DEFAULT_WEIGHTS: [f64; WINDOW_DAYS] = [
    1.0, 0.945_942_34, 0.858_538_1, 0.763_229_04, 0.669_381_85, 0.581_392_61, 0.501_249_29,
    0.429_636_63, 0.366_511_86, 0.311_432_54, 0.263_751_54, 0.222_734_85, 0.187_632_59,
    0.157_720_68, 0.132_324_1, 0.110_828_22, 0.092_682_91, 0.077_402, 0.064_560_05, 0.053_787_7,
    0.044_766_36, 0.037_222_64, 0.030_922_99, 0.025_668_68, 0.021_291_14, 0.017_647_8,
    0.014_618_38, 0.012_101_61, 0.010_012_42, 0.008_279_47,
];

/// A validated kernel table plus multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: [f64; WINDOW_DAYS],
    undetected_factor: f64,
}

/// On-disk shape of a kernel override.
#[derive(Debug, Deserialize)]
struct KernelFile {
    undetected_factor: f64,
    weights: Vec<f64>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            undetected_factor: DEFAULT_UNDETECTED_FACTOR,
        }
    }
}

impl Kernel {
    /// Builds a kernel from explicit weights and multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::InvalidKernel`] unless there are exactly
    /// [`WINDOW_DAYS`] finite, positive, strictly decreasing weights and the
    /// multiplier is finite and positive.
    pub fn new(weights: &[f64], undetected_factor: f64) -> Result<Self, EstimateError> {
        let weights: [f64; WINDOW_DAYS] =
            weights
                .try_into()
                .map_err(|_| EstimateError::InvalidKernel {
                    message: format!(
                        "expected {WINDOW_DAYS} weights, found {}",
                        weights.len()
                    ),
                })?;

        if let Some((lag, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w <= 0.0)
        {
            return Err(EstimateError::InvalidKernel {
                message: format!("weight at lag {lag} must be finite and positive, got {w}"),
            });
        }

        if let Some(lag) = (0..WINDOW_DAYS - 1).find(|&i| weights[i] <= weights[i + 1]) {
            return Err(EstimateError::InvalidKernel {
                message: format!(
                    "weights must strictly decrease: lag {lag} = {} but lag {} = {}",
                    weights[lag],
                    lag + 1,
                    weights[lag + 1]
                ),
            });
        }

        if !undetected_factor.is_finite() || undetected_factor <= 0.0 {
            return Err(EstimateError::InvalidKernel {
                message: format!(
                    "undetected_factor must be finite and positive, got {undetected_factor}"
                ),
            });
        }

        Ok(Self {
            weights,
            undetected_factor,
        })
    }

    /// Parses a kernel override from TOML.
    ///
    /// ```toml
    /// undetected_factor = 2.4
    /// weights = [1.0, 0.9459, ...]
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError`] if the TOML is malformed or fails
    /// validation.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, EstimateError> {
        let file: KernelFile =
            toml::de::from_str(toml_str).map_err(|e| EstimateError::InvalidKernel {
                message: e.to_string(),
            })?;
        Self::new(&file.weights, file.undetected_factor)
    }

    /// Loads a kernel override from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError`] if the file cannot be read or is invalid.
    pub fn from_path(path: &Path) -> Result<Self, EstimateError> {
        let contents = std::fs::read_to_string(path)?;
        let kernel = Self::from_toml_str(&contents)?;
        log::info!(
            "Loaded kernel from {} (undetected factor {})",
            path.display(),
            kernel.undetected_factor
        );
        Ok(kernel)
    }

    /// Weight for a sample `lag` days before the reference date.
    #[must_use]
    pub const fn weight(&self, lag: usize) -> f64 {
        self.weights[lag]
    }

    /// All weights, lag 0 first.
    #[must_use]
    pub const fn weights(&self) -> &[f64; WINDOW_DAYS] {
        &self.weights
    }

    /// Sum of all weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Under-detection multiplier.
    #[must_use]
    pub const fn undetected_factor(&self) -> f64 {
        self.undetected_factor
    }
}
