//! # Tide Predictor Core Library
//!
//! Harmonic ocean tide prediction from gridded constituent atlases (DTU10/DTU16 style)
//! using the PERTH3 method: interpolate the major constituents at a location, infer the
//! minor ones, apply nodal corrections and equilibrium arguments, and add the
//! long-period equilibrium tide.
//!
//! ## Design
//!
//! ### Storage
//! - **One file per atlas**: a binary container of per-constituent records, each a
//!   lat/lon grid of `(amplitude, phase)` float32 pairs ([`database`])
//! - **Append-only**: records are written once at build time and only read afterwards;
//!   a duplicate constituent is rejected rather than overwritten
//! - **Undefined cells** (land) keep their sentinel on disk and become `NaN` on read
//!
//! ### Prediction
//! 1. **Per location**: interpolate the 10 major constituents and infer 18 minor ones
//!    ([`solver::LocationHarmonics`]); this is the expensive part and is done once
//! 2. **Per instant**: nodal corrections, equilibrium arguments and the long-period
//!    tide are recomputed and combined with the cached harmonics
//! 3. **Per window**: datum scans (LAT / HAT / MSL) and series reuse the same
//!    harmonics ([`datums`])
//!
//! Heights are centimetres throughout. Time is UTC.
//!
//! ## Core Types
//!
//! - [`Sample`]: one predicted height at an instant
//! - [`TideSeries`]: a run of samples for one location

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod arguments;
pub mod config;
pub mod constituent;
pub mod database;
pub mod datums;
pub mod dtu_ascii;
pub mod ephemeris;
pub mod error;
pub mod grid;
pub mod ingest;
pub mod interpolate;
pub mod long_period;
pub mod mss;
pub mod nodal;
pub mod solver;

pub use constituent::TideConstituent;
pub use database::{DataKind, OpenMode, TideDataDb};
pub use error::{Result, TideError};
pub use solver::{solve, LocationHarmonics, Solver, SolverOptions};

/// A single predicted tide height.
///
/// `height_cm` is `NaN` when the location falls on undefined atlas cells.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_predictor_lib::Sample;
///
/// let sample = Sample {
///     time: Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap(),
///     height_cm: 87.5,
/// };
/// assert!(sample.height_cm > 0.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: DateTime<Utc>,
    /// Height relative to mean sea level in centimetres
    pub height_cm: f64,
}

/// Predicted heights for one location, in time order.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use tide_predictor_lib::{Sample, TideSeries};
///
/// let start = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
/// let series = TideSeries {
///     lat: 37.01,
///     lon: -8.96,
///     samples: (0..3)
///         .map(|i| Sample { time: start + Duration::hours(i), height_cm: 10.0 * i as f64 })
///         .collect(),
/// };
///
/// assert_eq!(series.samples.len(), 3);
/// assert_eq!(series.highest().map(|s| s.height_cm), Some(20.0));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TideSeries {
    pub lat: f64,
    pub lon: f64,
    pub samples: Vec<Sample>,
}

impl TideSeries {
    /// Sample with the greatest defined height.
    pub fn highest(&self) -> Option<&Sample> {
        self.defined().max_by(|a, b| a.height_cm.total_cmp(&b.height_cm))
    }

    /// Sample with the smallest defined height.
    pub fn lowest(&self) -> Option<&Sample> {
        self.defined().min_by(|a, b| a.height_cm.total_cmp(&b.height_cm))
    }

    fn defined(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| !s.height_cm.is_nan())
    }
}
