//! Long-period equilibrium ocean tide (LPEQOMT).
//!
//! Cartwright-Tayler-Edden series of the long-period tide-generating potential,
//! scaled by the second-degree Legendre term `0.437 * (1.5 sin^2 φ - 0.5)`.
//! The result is centimetres and is added to the harmonic sum.

use crate::ephemeris::{self, EphemerisTimeModel, MeanLongitudes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longitude of solar perigee used by the series
const SOLAR_PERIGEE_DEGREES: f64 = 283.0;

/// Latitude fed into the Legendre term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongPeriodLatitude {
    /// Evaluate at 0° regardless of site (reference tables are produced this way)
    #[default]
    Zero,
    /// Evaluate at the prediction latitude
    Site,
}

impl LongPeriodLatitude {
    pub fn effective_latitude(self, site_lat: f64) -> f64 {
        match self {
            LongPeriodLatitude::Zero => 0.0,
            LongPeriodLatitude::Site => site_lat,
        }
    }
}

/// LPEQOMT in centimetres for given longitudes and latitude in degrees.
pub fn long_period_tide_from(longitudes: &MeanLongitudes, lat_degrees: f64) -> f64 {
    let s = longitudes.s.to_radians();
    let h = longitudes.h.to_radians();
    let p = longitudes.p.to_radians();
    let n = longitudes.n.to_radians();
    let psol = SOLAR_PERIGEE_DEGREES.to_radians();

    let mut zlp = 2.79 * n.cos() - 0.49 * (h - psol).cos() - 3.1 * (2.0 * h).cos();

    let mut ph = s;
    zlp -= 0.67 * (ph - 2.0 * h + p).cos() + (3.52 - 0.46 * n.cos()) * (ph - p).cos();

    ph += s;
    zlp -= 6.66 * ph.cos()
        + 2.76 * (ph + n).cos()
        + 0.26 * (ph + 2.0 * n).cos()
        + 0.58 * (ph - 2.0 * h).cos()
        + 0.29 * (ph - 2.0 * p).cos();

    ph += s;
    zlp -= 1.27 * (ph - p).cos() + 0.53 * (ph - p + n).cos() + 0.24 * (ph - 2.0 * h + p).cos();

    let sin_lat = lat_degrees.to_radians().sin();
    0.437 * zlp * (1.5 * sin_lat * sin_lat - 0.5)
}

/// LPEQOMT in centimetres at `time` for a site at `lat` degrees.
pub fn long_period_tide(time: DateTime<Utc>, lat: f64, latitude: LongPeriodLatitude) -> f64 {
    let longitudes = ephemeris::mean_longitudes(time, EphemerisTimeModel::Tabulated);
    long_period_tide_from(&longitudes, latitude.effective_latitude(lat))
}
