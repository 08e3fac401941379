//! Radiogenic Isotope Evolution Model
//!
//! Closed-form dual-reservoir evolution for the 176Lu -> 176Hf and
//! 147Sm -> 143Nd decay systems. A single bulk silicate earth (BSE)
//! reservoir evolves from the model origin; at a user-chosen crust
//! extraction time it splits into a depleted-mantle residue and a
//! continental-crust extract, each continuing from the bulk composition
//! at the extraction instant with its own parent/daughter ratio.
//!
//! The growth law is the standard single-stage equation
//! `R(t) = R0 + (P/D) * (exp(lambda * t) - 1)` with t in years.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Mutex;
use thiserror::Error;

use log::{info, warn};

/// Default model parameterization (schematic literature values)
pub mod constants {
    /// 176Lu -> 176Hf decay constant [1/yr]
    pub const LAMBDA_HF: f64 = 1.9e-11;
    /// 147Sm -> 143Nd decay constant [1/yr]
    pub const LAMBDA_ND: f64 = 6.54e-12;
    /// Initial 176Hf/177Hf
    pub const R0_HF: f64 = 0.2798;
    /// Initial 143Nd/144Nd
    pub const R0_ND: f64 = 0.5068;
    /// Lu/Hf for BSE
    pub const PD_BSE_HF: f64 = 0.033;
    /// Sm/Nd for BSE
    pub const PD_BSE_ND: f64 = 0.196;
    /// Lu/Hf for the depleted mantle
    pub const PD_DEPLETED_HF: f64 = 0.050;
    /// Sm/Nd for the depleted mantle
    pub const PD_DEPLETED_ND: f64 = 0.250;
    /// Lu/Hf for the continental crust
    pub const PD_CRUST_HF: f64 = 0.010;
    /// Sm/Nd for the continental crust
    pub const PD_CRUST_ND: f64 = 0.120;
    /// Model origin [Ga before present]
    pub const ORIGIN_GA: f64 = 4.5;
    /// Number of samples on the time grid
    pub const NUM_SAMPLES: usize = 500;
    /// Default crust extraction time [Ga before present]
    pub const DEFAULT_EXTRACTION_GA: f64 = 2.9;
    /// Years per Ga
    pub const YEARS_PER_GA: f64 = 1.0e9;
}

/// Parameters of one decay system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemParams {
    /// Decay constant [1/yr]
    pub decay_constant: f64,
    /// Ratio at the model origin
    pub initial_ratio: f64,
    /// Parent/daughter ratio of the bulk reservoir
    pub pd_bulk: f64,
    /// Parent/daughter ratio of the depleted residue
    pub pd_depleted: f64,
    /// Parent/daughter ratio of the extracted crust
    pub pd_extracted: f64,
}

impl Default for SystemParams {
    fn default() -> Self {
        // Lu-Hf defaults; Nd values come from ModelParams::default
        Self {
            decay_constant: constants::LAMBDA_HF,
            initial_ratio: constants::R0_HF,
            pd_bulk: constants::PD_BSE_HF,
            pd_depleted: constants::PD_DEPLETED_HF,
            pd_extracted: constants::PD_CRUST_HF,
        }
    }
}

/// Complete model parameter set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    /// Model origin [Ga before present]
    pub origin_ga: f64,
    /// Samples on the time grid (origin down to present)
    pub num_samples: usize,
    /// 176Lu -> 176Hf system
    pub hf: SystemParams,
    /// 147Sm -> 143Nd system
    pub nd: SystemParams,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            origin_ga: constants::ORIGIN_GA,
            num_samples: constants::NUM_SAMPLES,
            hf: SystemParams::default(),
            nd: SystemParams {
                decay_constant: constants::LAMBDA_ND,
                initial_ratio: constants::R0_ND,
                pd_bulk: constants::PD_BSE_ND,
                pd_depleted: constants::PD_DEPLETED_ND,
                pd_extracted: constants::PD_CRUST_ND,
            },
        }
    }
}

/// Partial overrides of one decay system, as read from a config file.
/// Unset fields keep that system's own defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemOverrides {
    pub decay_constant: Option<f64>,
    pub initial_ratio: Option<f64>,
    pub pd_bulk: Option<f64>,
    pub pd_depleted: Option<f64>,
    pub pd_extracted: Option<f64>,
}

impl SystemOverrides {
    fn apply(&self, base: &mut SystemParams) {
        if let Some(v) = self.decay_constant {
            base.decay_constant = v;
        }
        if let Some(v) = self.initial_ratio {
            base.initial_ratio = v;
        }
        if let Some(v) = self.pd_bulk {
            base.pd_bulk = v;
        }
        if let Some(v) = self.pd_depleted {
            base.pd_depleted = v;
        }
        if let Some(v) = self.pd_extracted {
            base.pd_extracted = v;
        }
    }
}

/// Partial parameter overrides, overlaid per field onto the documented
/// defaults so an untouched Nd field never inherits an Hf value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParamOverrides {
    pub origin_ga: Option<f64>,
    pub num_samples: Option<usize>,
    pub hf: SystemOverrides,
    pub nd: SystemOverrides,
}

impl ParamOverrides {
    /// Overlay these overrides onto [`ModelParams::default`]
    pub fn into_params(self) -> ModelParams {
        let mut params = ModelParams::default();
        if let Some(v) = self.origin_ga {
            params.origin_ga = v;
        }
        if let Some(v) = self.num_samples {
            params.num_samples = v;
        }
        self.hf.apply(&mut params.hf);
        self.nd.apply(&mut params.nd);
        params
    }
}

/// Parameter validation failures
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("time grid needs at least 2 samples, got {0}")]
    TooFewSamples(usize),
    #[error("origin time must be positive and finite, got {0}")]
    BadOrigin(f64),
    #[error("{system} system: {field} must be positive and finite, got {value}")]
    BadSystemValue {
        system: &'static str,
        field: &'static str,
        value: f64,
    },
}

impl SystemParams {
    fn validate(&self, system: &'static str) -> Result<(), ParamError> {
        let checks = [
            ("decay_constant", self.decay_constant),
            ("initial_ratio", self.initial_ratio),
            ("pd_bulk", self.pd_bulk),
            ("pd_depleted", self.pd_depleted),
            ("pd_extracted", self.pd_extracted),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(ParamError::BadSystemValue {
                    system,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl ModelParams {
    /// Check that the parameter set describes a usable model
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.num_samples < 2 {
            return Err(ParamError::TooFewSamples(self.num_samples));
        }
        if !self.origin_ga.is_finite() || self.origin_ga <= 0.0 {
            return Err(ParamError::BadOrigin(self.origin_ga));
        }
        self.hf.validate("Hf")?;
        self.nd.validate("Nd")?;
        Ok(())
    }

    /// Load parameter overrides from a config file, falling back to the
    /// documented defaults when none is found or the file is unusable
    pub fn from_config_or_default() -> Self {
        let config_paths = [
            "config/model_params.json",
            "../config/model_params.json",
        ];

        for path in &config_paths {
            if let Ok(content) = fs::read_to_string(path) {
                match serde_json::from_str::<ParamOverrides>(&content) {
                    Ok(overrides) => {
                        let params = overrides.into_params();
                        match params.validate() {
                            Ok(()) => {
                                info!("loaded model parameters from {path}");
                                return params;
                            }
                            Err(e) => warn!("ignoring {path}: {e}"),
                        }
                    }
                    Err(e) => warn!("ignoring {path}: {e}"),
                }
            }
        }

        ModelParams::default()
    }
}

/// Trajectories of one decay system across the three reservoirs
#[derive(Debug, Clone)]
pub struct SystemCurves {
    /// Bulk silicate earth, evaluated on the full grid independent of
    /// the extraction time
    pub bulk: Array1<f64>,
    /// Depleted mantle residue
    pub depleted: Array1<f64>,
    /// Extracted continental crust
    pub extracted: Array1<f64>,
    /// Bulk ratio at the nearest-grid extraction sample; anchor for both
    /// divergent reservoirs
    pub extraction_anchor: f64,
}

/// Full model output: the time grid plus both decay systems
#[derive(Debug, Clone)]
pub struct EvolutionCurves {
    /// Time grid [Ga before present], descending from the origin to 0
    pub time_ga: Array1<f64>,
    /// Extraction time this result was computed for [Ga before present]
    pub extraction_ga: f64,
    /// Grid index nearest the extraction time (no interpolation)
    pub extraction_index: usize,
    /// 176Lu -> 176Hf trajectories
    pub hf: SystemCurves,
    /// 147Sm -> 143Nd trajectories
    pub nd: SystemCurves,
}

impl EvolutionCurves {
    /// Extraction time snapped to the grid resolution
    pub fn snapped_extraction_ga(&self) -> f64 {
        self.time_ga[self.extraction_index]
    }
}

/// Single-stage radiogenic growth law
fn growth(anchor: f64, parent_daughter: f64, lambda: f64, elapsed_yr: f64) -> f64 {
    anchor + parent_daughter * ((lambda * elapsed_yr).exp() - 1.0)
}

/// Index of the sample closest to `target_ga` (first index wins on ties)
fn nearest_index(time_ga: &Array1<f64>, target_ga: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &t) in time_ga.iter().enumerate() {
        let dist = (t - target_ga).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

fn compute_system(
    sys: &SystemParams,
    time_ga: &Array1<f64>,
    origin_ga: f64,
    extraction_ga: f64,
    extraction_index: usize,
) -> SystemCurves {
    let n = time_ga.len();
    let mut bulk = Array1::zeros(n);

    // Bulk evolution always follows the average path
    for (i, &t) in time_ga.iter().enumerate() {
        let elapsed_yr = (origin_ga - t) * constants::YEARS_PER_GA;
        bulk[i] = growth(sys.initial_ratio, sys.pd_bulk, sys.decay_constant, elapsed_yr);
    }

    let anchor = bulk[extraction_index];
    let mut depleted = bulk.clone();
    let mut extracted = bulk.clone();

    // Samples past the extraction instant evolve separately from the
    // anchor value; earlier samples stay identical to bulk
    for (i, &t) in time_ga.iter().enumerate() {
        if t < extraction_ga {
            let since_yr = (extraction_ga - t) * constants::YEARS_PER_GA;
            depleted[i] = growth(anchor, sys.pd_depleted, sys.decay_constant, since_yr);
            extracted[i] = growth(anchor, sys.pd_extracted, sys.decay_constant, since_yr);
        }
    }

    SystemCurves {
        bulk,
        depleted,
        extracted,
        extraction_anchor: anchor,
    }
}

/// Evolution model engine
///
/// Holds the fixed parameter set and the one user-adjustable parameter,
/// the crust extraction time. Every computation builds all arrays fresh
/// from the current parameters.
pub struct EvolutionSimulator {
    params: ModelParams,
    extraction_ga: Mutex<f64>,
}

impl Default for EvolutionSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EvolutionSimulator {
    /// Build a simulator with parameters from config or defaults.
    /// `from_config_or_default` only returns validated parameter sets.
    pub fn new() -> Self {
        let params = ModelParams::from_config_or_default();
        let extraction = constants::DEFAULT_EXTRACTION_GA.min(params.origin_ga);
        Self {
            params,
            extraction_ga: Mutex::new(extraction),
        }
    }

    /// Build a simulator from an explicit parameter set, rejecting
    /// degenerate ones before any computation can index an empty grid
    pub fn with_params(params: ModelParams) -> Result<Self, ParamError> {
        params.validate()?;
        let extraction = constants::DEFAULT_EXTRACTION_GA.min(params.origin_ga);
        Ok(Self {
            params,
            extraction_ga: Mutex::new(extraction),
        })
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Current crust extraction time [Ga before present]
    pub fn extraction_time(&self) -> f64 {
        *self.extraction_ga.lock().unwrap()
    }

    /// Set the crust extraction time. Callers validate the value first;
    /// the model itself accepts any finite time (out-of-span values fall
    /// into the documented edge-case regimes).
    pub fn set_extraction_time(&self, extraction_ga: f64) {
        *self.extraction_ga.lock().unwrap() = extraction_ga;
    }

    /// Compute all trajectories for the currently held extraction time
    pub fn compute(&self) -> EvolutionCurves {
        self.compute_at(self.extraction_time())
    }

    /// Compute all trajectories for an explicit extraction time
    pub fn compute_at(&self, extraction_ga: f64) -> EvolutionCurves {
        let time_ga = Array1::linspace(self.params.origin_ga, 0.0, self.params.num_samples);
        let extraction_index = nearest_index(&time_ga, extraction_ga);

        let hf = compute_system(
            &self.params.hf,
            &time_ga,
            self.params.origin_ga,
            extraction_ga,
            extraction_index,
        );
        let nd = compute_system(
            &self.params.nd,
            &time_ga,
            self.params.origin_ga,
            extraction_ga,
            extraction_index,
        );

        EvolutionCurves {
            time_ga,
            extraction_ga,
            extraction_index,
            hf,
            nd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn simulator() -> EvolutionSimulator {
        EvolutionSimulator::with_params(ModelParams::default()).unwrap()
    }

    #[test]
    fn origin_sample_matches_initial_ratio() {
        let curves = simulator().compute_at(constants::DEFAULT_EXTRACTION_GA);
        assert_eq!(curves.hf.bulk[0], constants::R0_HF);
        assert_eq!(curves.hf.depleted[0], constants::R0_HF);
        assert_eq!(curves.hf.extracted[0], constants::R0_HF);
        assert_eq!(curves.nd.bulk[0], constants::R0_ND);
        assert_eq!(curves.nd.depleted[0], constants::R0_ND);
        assert_eq!(curves.nd.extracted[0], constants::R0_ND);
    }

    #[test]
    fn pre_extraction_reservoirs_are_identical() {
        let curves = simulator().compute_at(2.9);
        for (i, &t) in curves.time_ga.iter().enumerate() {
            if t >= 2.9 {
                assert_eq!(curves.hf.depleted[i], curves.hf.bulk[i]);
                assert_eq!(curves.hf.extracted[i], curves.hf.bulk[i]);
                assert_eq!(curves.nd.depleted[i], curves.nd.bulk[i]);
                assert_eq!(curves.nd.extracted[i], curves.nd.bulk[i]);
            }
        }
    }

    #[test]
    fn post_extraction_reservoirs_share_anchor_and_diverge() {
        let curves = simulator().compute_at(2.9);
        let anchor = curves.hf.extraction_anchor;
        assert_eq!(anchor, curves.hf.bulk[curves.extraction_index]);

        for (i, &t) in curves.time_ga.iter().enumerate() {
            if t < 2.9 {
                let since_yr = (2.9 - t) * constants::YEARS_PER_GA;
                let expected_depleted = growth(
                    anchor,
                    constants::PD_DEPLETED_HF,
                    constants::LAMBDA_HF,
                    since_yr,
                );
                assert_eq!(curves.hf.depleted[i], expected_depleted);
                // Higher parent/daughter ratio grows faster
                assert!(curves.hf.depleted[i] > curves.hf.extracted[i]);
                assert!(curves.nd.depleted[i] > curves.nd.extracted[i]);
            }
        }
    }

    #[test]
    fn depleted_hf_exceeds_crust_hf_at_present() {
        // Documented example: T = 2.9 Ga, Lu/Hf 0.050 vs 0.010
        let curves = simulator().compute_at(2.9);
        let last = curves.time_ga.len() - 1;
        assert!(curves.hf.depleted[last] > curves.hf.extracted[last]);
    }

    #[test]
    fn bulk_grows_monotonically() {
        // Grid descends toward the present, so elapsed time grows with
        // the index and the bulk ratio must strictly increase
        let curves = simulator().compute_at(1.0);
        for w in [&curves.hf.bulk, &curves.nd.bulk] {
            for i in 1..w.len() {
                assert!(w[i] > w[i - 1]);
            }
        }
    }

    #[test]
    fn extraction_at_present_collapses_to_bulk() {
        let curves = simulator().compute_at(0.0);
        assert_eq!(curves.hf.depleted, curves.hf.bulk);
        assert_eq!(curves.hf.extracted, curves.hf.bulk);
        assert_eq!(curves.nd.depleted, curves.nd.bulk);
        assert_eq!(curves.nd.extracted, curves.nd.bulk);
    }

    #[test]
    fn extraction_at_origin_diverges_from_initial_ratio() {
        let curves = simulator().compute_at(constants::ORIGIN_GA);
        assert_eq!(curves.extraction_index, 0);
        assert_eq!(curves.hf.extraction_anchor, constants::R0_HF);
        // First sample sits exactly at the extraction instant
        assert_eq!(curves.hf.depleted[0], curves.hf.bulk[0]);
        // Everything after it evolves separately
        let last = curves.time_ga.len() - 1;
        assert!(curves.hf.depleted[last] > curves.hf.extracted[last]);
        assert_ne!(curves.hf.depleted[last], curves.hf.bulk[last]);
    }

    #[test]
    fn nearest_index_snaps_to_grid_resolution() {
        let curves = simulator().compute_at(2.9);
        let dt = constants::ORIGIN_GA / (constants::NUM_SAMPLES as f64 - 1.0);
        let snapped = curves.snapped_extraction_ga();
        assert!((snapped - 2.9).abs() <= dt / 2.0 + 1e-12);
    }

    #[test]
    fn nearest_index_tie_breaks_to_first_sample() {
        let grid = array![3.0, 2.0, 1.0];
        assert_eq!(nearest_index(&grid, 2.5), 0);
        assert_eq!(nearest_index(&grid, 1.2), 2);
    }

    #[test]
    fn params_load_from_json_overrides() {
        let json = r#"{
            "origin_ga": 4.0,
            "num_samples": 100,
            "hf": { "pd_depleted": 0.06 }
        }"#;
        let overrides: ParamOverrides = serde_json::from_str(json).unwrap();
        let params = overrides.into_params();
        assert_eq!(params.origin_ga, 4.0);
        assert_eq!(params.num_samples, 100);
        assert_eq!(params.hf.pd_depleted, 0.06);
        // Untouched fields keep their defaults
        assert_eq!(params.hf.decay_constant, constants::LAMBDA_HF);
        assert_eq!(params.nd.initial_ratio, constants::R0_ND);
        params.validate().unwrap();
    }

    #[test]
    fn partial_nd_override_keeps_nd_defaults() {
        // A config touching one Nd field must not pull any other Nd
        // field toward the Hf values
        let json = r#"{ "nd": { "pd_depleted": 0.3 } }"#;
        let overrides: ParamOverrides = serde_json::from_str(json).unwrap();
        let params = overrides.into_params();
        assert_eq!(params.nd.pd_depleted, 0.3);
        assert_eq!(params.nd.decay_constant, constants::LAMBDA_ND);
        assert_eq!(params.nd.initial_ratio, constants::R0_ND);
        assert_eq!(params.nd.pd_bulk, constants::PD_BSE_ND);
        assert_eq!(params.nd.pd_extracted, constants::PD_CRUST_ND);
        // Hf stays untouched as well
        assert_eq!(params.hf.decay_constant, constants::LAMBDA_HF);
        assert_eq!(params.hf.pd_depleted, constants::PD_DEPLETED_HF);
    }

    #[test]
    fn empty_overrides_reproduce_defaults() {
        let overrides: ParamOverrides = serde_json::from_str("{}").unwrap();
        let params = overrides.into_params();
        assert_eq!(params.nd.decay_constant, constants::LAMBDA_ND);
        assert_eq!(params.hf.decay_constant, constants::LAMBDA_HF);
        assert_eq!(params.num_samples, constants::NUM_SAMPLES);
        params.validate().unwrap();
    }

    #[test]
    fn with_params_rejects_degenerate_grid() {
        let mut params = ModelParams::default();
        params.num_samples = 0;
        assert!(matches!(
            EvolutionSimulator::with_params(params),
            Err(ParamError::TooFewSamples(0))
        ));
    }

    #[test]
    fn validate_rejects_degenerate_params() {
        let mut params = ModelParams::default();
        params.num_samples = 1;
        assert!(matches!(
            params.validate(),
            Err(ParamError::TooFewSamples(1))
        ));

        let mut params = ModelParams::default();
        params.origin_ga = f64::NAN;
        assert!(matches!(params.validate(), Err(ParamError::BadOrigin(_))));

        let mut params = ModelParams::default();
        params.nd.pd_bulk = -0.1;
        assert!(matches!(
            params.validate(),
            Err(ParamError::BadSystemValue { system: "Nd", .. })
        ));
    }
}
