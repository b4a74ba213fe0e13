//! # PERTH3 Harmonic Solver
//!
//! Predicts the tide height at one location and instant:
//!
//! 1. equilibrium arguments for all 28 slots ([`crate::arguments`])
//! 2. nodal corrections `f`, `u` ([`crate::nodal`])
//! 3. the ten major constituents interpolated from the database
//! 4. eighteen minor constituents inferred from the majors ([`MINOR_INFERENCE`])
//! 5. `Σ hcos·f·cos(χ) + hsin·f·sin(χ)` with `χ = arg + u`
//! 6. plus the long-period equilibrium tide ([`crate::long_period`])
//!
//! Steps 3 and 4 depend only on the location, so [`LocationHarmonics`] performs them
//! once and can then be evaluated at any number of instants.
//!
//! Solvers form a closed set ([`Solver`]); callers pick one explicitly by value or name.

use crate::arguments::{self, SLOT_COUNT};
use crate::constituent::TideConstituent;
use crate::database::TideDataDb;
use crate::error::{Result, TideError};
use crate::interpolate::{interpolate_record, Harmonic, Wraparound};
use crate::long_period::{self, LongPeriodLatitude};
use crate::nodal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Constituents read from the database, with the slot each one fills.
///
/// S1 and M4 sit at the end of the slot order rather than after K2.
pub const MAJOR_CONSTITUENTS: [(TideConstituent, usize); 10] = [
    (TideConstituent::Q1, 0),
    (TideConstituent::O1, 1),
    (TideConstituent::P1, 2),
    (TideConstituent::K1, 3),
    (TideConstituent::N2, 4),
    (TideConstituent::M2, 5),
    (TideConstituent::S2, 6),
    (TideConstituent::K2, 7),
    (TideConstituent::S1, 26),
    (TideConstituent::M4, 27),
];

/// `slot = Σ coefficient · source`, applied identically to hcos and hsin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinorInference {
    pub target: usize,
    pub sources: &'static [(usize, f64)],
}

const fn infer(target: usize, sources: &'static [(usize, f64)]) -> MinorInference {
    MinorInference { target, sources }
}

/// Admittance coefficients for the minor slots (Q1/O1 for the low diurnals, O1/K1 for
/// the rest of the diurnals, N2/M2 and M2/S2 for the semidiurnals).
pub const MINOR_INFERENCE: [MinorInference; 18] = [
    infer(8, &[(0, 0.263), (1, -0.0252)]),   // 2Q1
    infer(9, &[(0, 0.297), (1, -0.0264)]),   // sigma1
    infer(10, &[(0, 0.164), (1, 0.0048)]),   // rho1
    infer(11, &[(1, 0.0140), (3, 0.0101)]),  // M1a
    infer(12, &[(1, 0.0389), (3, 0.0282)]),  // M1b
    infer(13, &[(1, 0.0064), (3, 0.0060)]),  // chi1
    infer(14, &[(1, 0.0030), (3, 0.0171)]),  // pi1
    infer(15, &[(1, -0.0015), (3, 0.0152)]), // phi1
    infer(16, &[(1, -0.0065), (3, 0.0155)]), // theta1
    infer(17, &[(1, -0.0389), (3, 0.0836)]), // J1
    infer(18, &[(1, -0.0431), (3, 0.0613)]), // OO1
    infer(19, &[(4, 0.264), (5, -0.0253)]),  // 2N2
    infer(20, &[(4, 0.298), (5, -0.0264)]),  // mu2
    infer(21, &[(4, 0.165), (5, 0.00487)]),  // nu2
    infer(22, &[(5, 0.0040), (6, 0.0074)]),  // lambda2
    infer(23, &[(5, 0.0131), (6, 0.0326)]),  // L2a
    infer(24, &[(5, 0.0033), (6, 0.0082)]),  // L2b
    infer(25, &[(6, 0.0585)]),               // T2
];

/// Per-call knobs of a solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub long_period_latitude: LongPeriodLatitude,
}

/// One slot of a solve: `[hcos, hsin, argument, f, u]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolverRow {
    pub hcos: f64,
    pub hsin: f64,
    /// Degrees
    pub argument: f64,
    pub f: f64,
    /// Degrees
    pub u: f64,
}

impl SolverRow {
    /// Contribution of this slot to the harmonic sum.
    pub fn height(&self) -> f64 {
        let chi = (self.argument + self.u).to_radians();
        self.hcos * self.f * chi.cos() + self.hsin * self.f * chi.sin()
    }
}

/// Harmonic constants of all 28 slots at one location.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationHarmonics {
    pub lat: f64,
    pub lon: f64,
    slots: [Harmonic; SLOT_COUNT],
}

impl LocationHarmonics {
    /// Interpolate the majors from `db` and infer the minors.
    ///
    /// # Errors
    /// Fails with `NotFound` if any major constituent is missing and with
    /// `IndexOutOfRange` if the location is outside a record's grid.
    pub fn at(db: &TideDataDb, lat: f64, lon: f64) -> Result<Self> {
        let mut slots = [Harmonic::default(); SLOT_COUNT];
        for &(constituent, slot) in MAJOR_CONSTITUENTS.iter() {
            let record = db.get_record(constituent)?;
            slots[slot] = interpolate_record(&record, lat, lon, Wraparound::Global)?;
            debug!(
                %constituent,
                amplitude = slots[slot].amplitude(),
                phase = slots[slot].phase(),
                "interpolated major constituent"
            );
        }
        Ok(Self::from_major_slots(lat, lon, slots))
    }

    /// Build from slots whose major entries are filled; minor slots are overwritten.
    pub fn from_major_slots(lat: f64, lon: f64, mut slots: [Harmonic; SLOT_COUNT]) -> Self {
        for inference in MINOR_INFERENCE.iter() {
            slots[inference.target] = inference
                .sources
                .iter()
                .fold(Harmonic::default(), |acc, &(source, coefficient)| {
                    acc + coefficient * slots[source]
                });
        }
        LocationHarmonics { lat, lon, slots }
    }

    pub fn slots(&self) -> &[Harmonic; SLOT_COUNT] {
        &self.slots
    }

    /// Solver rows at `time` (steps 1, 2 joined with the location constants).
    pub fn rows(&self, time: DateTime<Utc>) -> [SolverRow; SLOT_COUNT] {
        let args = arguments::equilibrium_arguments(time);
        let corrections = nodal::nodal_corrections(time);
        let mut rows = [SolverRow::default(); SLOT_COUNT];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = SolverRow {
                hcos: self.slots[i].hcos,
                hsin: self.slots[i].hsin,
                argument: args[i],
                f: corrections.f[i],
                u: corrections.u[i],
            };
        }
        rows
    }

    /// Harmonic sum without the long-period term, in centimetres.
    pub fn harmonic_height(&self, time: DateTime<Utc>) -> f64 {
        self.rows(time).iter().map(SolverRow::height).sum()
    }

    /// Predicted height in centimetres.
    pub fn height_at(&self, time: DateTime<Utc>, options: &SolverOptions) -> f64 {
        self.harmonic_height(time)
            + long_period::long_period_tide(time, self.lat, options.long_period_latitude)
    }
}

/// Available prediction methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    #[default]
    Perth3,
}

impl Solver {
    pub const ALL: &'static [Solver] = &[Solver::Perth3];

    pub fn name(self) -> &'static str {
        match self {
            Solver::Perth3 => "perth3",
        }
    }

    /// Location constants for repeated evaluation with this solver.
    pub fn harmonics(self, db: &TideDataDb, lat: f64, lon: f64) -> Result<LocationHarmonics> {
        match self {
            Solver::Perth3 => LocationHarmonics::at(db, lat, lon),
        }
    }

    /// Tide height in centimetres at `(lat, lon)` and `time`.
    pub fn solve(
        self,
        db: &TideDataDb,
        lat: f64,
        lon: f64,
        time: DateTime<Utc>,
        options: &SolverOptions,
    ) -> Result<f64> {
        Ok(self.harmonics(db, lat, lon)?.height_at(time, options))
    }
}

impl FromStr for Solver {
    type Err = TideError;

    fn from_str(s: &str) -> Result<Self> {
        Solver::ALL
            .iter()
            .copied()
            .find(|solver| solver.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TideError::UnknownSolver(s.to_string()))
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// PERTH3 height with default options.
pub fn solve(db: &TideDataDb, lat: f64, lon: f64, time: DateTime<Utc>) -> Result<f64> {
    Solver::Perth3.solve(db, lat, lon, time, &SolverOptions::default())
}
