//! # Astronomical Ephemeris
//!
//! Converts UTC instants into the five astronomical mean longitudes that drive the
//! harmonic solver:
//!
//! | symbol | body                          |
//! |--------|-------------------------------|
//! | `s`    | moon                          |
//! | `h`    | sun                           |
//! | `p`    | lunar perigee                 |
//! | `N`    | ascending lunar node          |
//! | `p'`   | solar perigee                 |
//!
//! All longitudes are degrees in `[0, 360)`. The time argument is Julian centuries of
//! Terrestrial Time since J2000.0; the UT to TT offset (delta-T) comes from one of two
//! [`EphemerisTimeModel`]s. The lunar formulae follow Meeus, *Astronomical Algorithms*
//! (2nd ed.), the solar perigee Simon et al. (1994).

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MJD of the Unix epoch (1970-01-01T00:00:00Z)
const UNIX_EPOCH_MJD: f64 = 40587.0;
/// MJD of J2000.0 (2000-01-01T12:00:00)
const J2000_MJD: f64 = 51544.5;
const MJD_TO_JD: f64 = 2400000.5;
const J2000_JD: f64 = 2451545.0;
const DAYS_PER_CENTURY: f64 = 36525.0;
const SECONDS_PER_DAY: f64 = 86400.0;

const DELTA_T_FIRST_YEAR: i32 = 1660;

/// Yearly delta-T in seconds for 1 January of 1660 through 2023 (USNO `deltat.data`).
pub const DELTA_T_TABLE: [f64; 364] = [
    38.0, 37.0, 36.0, 37.0, 38.0, 36.0, 35.0, 34.0, 33.0, 32.0,
    31.0, 30.0, 29.0, 29.0, 28.0, 27.0, 26.0, 25.0, 25.0, 26.0,
    26.0, 25.0, 24.0, 24.0, 24.0, 24.0, 24.0, 23.0, 23.0, 22.0,
    22.0, 22.0, 21.0, 21.0, 21.0, 21.0, 20.0, 20.0, 20.0, 20.0,
    21.0, 21.0, 20.0, 20.0, 19.0, 19.0, 19.0, 20.0, 20.0, 20.0,
    20.0, 20.0, 21.0, 21.0, 21.0, 21.0, 21.0, 21.0, 21.0, 21.0,
    21.1, 21.0, 20.9, 20.7, 20.4, 20.0, 19.4, 18.7, 17.8, 17.0,
    16.6, 16.1, 15.7, 15.3, 14.7, 14.3, 14.1, 14.1, 13.7, 13.5,
    13.5, 13.4, 13.4, 13.3, 13.2, 13.2, 13.1, 13.0, 13.3, 13.5,
    13.7, 13.9, 14.0, 14.1, 14.1, 14.3, 14.4, 14.6, 14.7, 14.7,
    14.8, 14.9, 15.0, 15.2, 15.4, 15.6, 15.6, 15.9, 15.9, 15.7,
    15.7, 15.7, 15.9, 16.1, 15.9, 15.7, 15.3, 15.5, 15.6, 15.6,
    15.6, 15.5, 15.4, 15.2, 14.9, 14.6, 14.3, 14.1, 14.2, 13.7,
    13.3, 13.0, 13.2, 13.1, 13.3, 13.5, 13.2, 13.1, 13.0, 12.6,
    12.6, 12.0, 11.8, 11.4, 11.1, 11.1, 11.1, 11.1, 11.2, 11.5,
    11.2, 11.7, 11.9, 11.8, 11.8, 11.8, 11.6, 11.5, 11.4, 11.3,
    11.13, 10.94, 10.29, 9.94, 9.88, 9.72, 9.66, 9.51, 9.21, 8.60,
    7.95, 7.59, 7.36, 7.10, 6.89, 6.73, 6.39, 6.25, 6.25, 6.22,
    6.22, 6.30, 6.35, 6.32, 6.33, 6.37, 6.40, 6.46, 6.48, 6.53,
    6.55, 6.69, 6.84, 7.03, 7.15, 7.26, 7.23, 7.21, 6.99, 7.19,
    7.35, 7.41, 7.36, 6.95, 6.45, 5.92, 5.15, 4.11, 2.94, 1.97,
    1.04, 0.11, -0.82, -1.70, -2.48, -3.19, -3.84, -4.43, -4.79, -5.09,
    -5.36, -5.37, -5.34, -5.40, -5.58, -5.74, -5.69, -5.67, -5.73, -5.78,
    -5.86, -6.01, -6.28, -6.53, -6.50, -6.41, -6.11, -5.63, -4.68, -3.72,
    -2.70, -1.48, -0.08, 1.26, 2.59, 3.92, 5.20, 6.29, 7.68, 9.13,
    10.38, 11.64, 13.23, 14.69, 16.00, 17.19, 18.19, 19.13, 20.14, 20.86,
    21.41, 22.06, 22.51, 23.01, 23.46, 23.63, 23.95, 24.39, 24.34, 24.10,
    24.02, 23.98, 23.89, 23.93, 23.88, 23.91, 23.76, 23.91, 23.96, 24.04,
    24.35, 24.82, 25.30, 25.77, 26.27, 26.76, 27.27, 27.77, 28.25, 28.70,
    29.15, 29.57, 29.97, 30.36, 30.72, 31.07, 31.349, 31.677, 32.166, 32.671,
    33.150, 33.584, 33.992, 34.466, 35.030, 35.738, 36.546, 37.429, 38.291, 39.204,
    40.182, 41.170, 42.227, 43.373, 44.486, 45.477, 46.458, 47.521, 48.535, 49.589,
    50.540, 51.382, 52.168, 52.957, 53.789, 54.3427, 54.8713, 55.3222, 55.8197, 56.3000,
    56.8553, 57.5653, 58.3092, 59.1218, 59.9845, 60.7853, 61.6287, 62.2950, 62.9659, 63.4673,
    63.8285, 64.0908, 64.2998, 64.4734, 64.5736, 64.6876, 64.8452, 65.1464, 65.4573, 65.7768,
    66.0699, 66.3246, 66.6030, 66.9069, 67.2810, 67.6439, 68.1024, 68.5927, 68.9676, 69.2202,
    69.3612, 69.3593, 69.2945, 69.2038,
];

/// Modified Julian Date of a UTC instant, including the sub-second part.
pub fn modified_julian_date(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + time.timestamp_subsec_nanos() as f64 * 1e-9;
    seconds / SECONDS_PER_DAY + UNIX_EPOCH_MJD
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Elapsed fraction of the calendar year at `time`, in `[0, 1)`.
fn year_fraction(time: DateTime<Utc>) -> f64 {
    let days_in_year = if is_leap_year(time.year()) { 366.0 } else { 365.0 };
    let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 * 1e-9;
    (time.ordinal0() as f64 + seconds / SECONDS_PER_DAY) / days_in_year
}

/// UT to TT offset in seconds from the historical table.
///
/// - before 1660: Stephenson-Morrison down to 948, Borkowski before that
/// - 1660 through 2022: linear between consecutive 1 January values
/// - from 2023: linear extrapolation of the last two table entries
///
/// Years before 1955 also get the `-0.000091 (ndot + 26)(year - 1955)^2` almanac
/// correction with `ndot = -25.8` arcsec/century^2 (DE403).
pub fn delta_t(time: DateTime<Utc>) -> f64 {
    let year = time.year();
    let last = DELTA_T_TABLE.len() - 1;
    let last_year = DELTA_T_FIRST_YEAR + last as i32;

    let mut seconds = if year < DELTA_T_FIRST_YEAR {
        if year >= 948 {
            let b = 0.01 * (year - 2000) as f64;
            b * (b * 23.58 + 100.3) + 101.6
        } else {
            let b = 0.01 * (year - 2000) as f64 + 3.75;
            35.0 * b * b + 40.0
        }
    } else if year < last_year {
        let index = (year - DELTA_T_FIRST_YEAR) as usize;
        let current = DELTA_T_TABLE[index];
        let next = DELTA_T_TABLE[index + 1];
        current + year_fraction(time) * (next - current)
    } else {
        let years_past = (year - last_year) as f64 + year_fraction(time);
        DELTA_T_TABLE[last] + years_past * (DELTA_T_TABLE[last] - DELTA_T_TABLE[last - 1])
    };

    if year < 1955 {
        let b = (year - 1955) as f64;
        seconds -= 0.000091 * (-25.8 + 26.0) * b * b;
    }
    seconds
}

/// Quadratic delta-T in seconds, `t` in Julian years since J2000.0.
pub fn delta_t_polynomial(mjd: f64) -> f64 {
    let t = (mjd - J2000_MJD) / 365.25;
    62.92 + 0.32217 * t + 0.005589 * t * t
}

/// Source of the UT to TT offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EphemerisTimeModel {
    /// Historical table with extrapolation; drives arguments and long-period tide
    Tabulated,
    /// Closed-form quadratic; drives nodal corrections only
    Polynomial,
}

impl EphemerisTimeModel {
    pub fn delta_t(self, time: DateTime<Utc>) -> f64 {
        match self {
            EphemerisTimeModel::Tabulated => delta_t(time),
            EphemerisTimeModel::Polynomial => delta_t_polynomial(modified_julian_date(time)),
        }
    }

    /// Julian centuries of TT since J2000.0.
    pub fn centuries(self, time: DateTime<Utc>) -> f64 {
        let jd = modified_julian_date(time) + MJD_TO_JD;
        let tt = jd + self.delta_t(time) / SECONDS_PER_DAY;
        (tt - J2000_JD) / DAYS_PER_CENTURY
    }
}

/// The five mean longitudes, degrees in `[0, 360)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanLongitudes {
    /// Moon
    pub s: f64,
    /// Sun
    pub h: f64,
    /// Lunar perigee
    pub p: f64,
    /// Ascending lunar node (decreasing with time)
    pub n: f64,
    /// Solar perigee
    pub p_sun: f64,
}

impl MeanLongitudes {
    /// Longitudes at `t` Julian centuries since J2000.0.
    pub fn at_centuries(t: f64) -> Self {
        let s = (((-1.53388e-8 * t + 1.855835e-6) * t - 1.5786e-3) * t + 481267.88123421) * t
            + 218.3164477;
        // mean elongation of the moon
        let d = (((-8.8445e-9 * t + 1.83195e-6) * t - 1.8819e-3) * t + 445267.1114034) * t
            + 297.8501921;
        let p = ((-1.249172e-5 * t - 1.032e-2) * t + 4069.0137287) * t + 83.3532465;
        let n = ((2.22222e-6 * t + 2.0708e-3) * t - 1934.136261) * t + 125.04452;
        let p_sun = 282.94 + 1.7192 * t;

        MeanLongitudes {
            s: normalize_degrees(s),
            h: normalize_degrees(s - d),
            p: normalize_degrees(p),
            n: normalize_degrees(n),
            p_sun: normalize_degrees(p_sun),
        }
    }
}

/// Mean longitudes at `time` using the given delta-T source.
pub fn mean_longitudes(time: DateTime<Utc>, model: EphemerisTimeModel) -> MeanLongitudes {
    MeanLongitudes::at_centuries(model.centuries(time))
}

/// Reduce an angle into `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let reduced = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if reduced >= 360.0 {
        0.0
    } else {
        reduced
    }
}

/// Mean synodic month in days
pub const SYNODIC_MONTH: f64 = 29.530588853;
/// New moon of 2000-01-06 18:14 UTC
const REFERENCE_NEW_MOON_MJD: f64 = 51549.7597;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    ThirdQuarter,
    WaningCrescent,
}

impl MoonPhase {
    /// Phase for a moon age in days since new moon.
    pub fn from_age(age_days: f64) -> Self {
        match age_days.rem_euclid(SYNODIC_MONTH).floor() as u32 {
            0..=1 => MoonPhase::NewMoon,
            2..=6 => MoonPhase::WaxingCrescent,
            7..=8 => MoonPhase::FirstQuarter,
            9..=13 => MoonPhase::WaxingGibbous,
            14..=15 => MoonPhase::FullMoon,
            16..=20 => MoonPhase::WaningGibbous,
            21..=22 => MoonPhase::ThirdQuarter,
            _ => MoonPhase::WaningCrescent,
        }
    }
}

impl fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoonPhase::NewMoon => "new moon",
            MoonPhase::WaxingCrescent => "waxing crescent",
            MoonPhase::FirstQuarter => "first quarter",
            MoonPhase::WaxingGibbous => "waxing gibbous",
            MoonPhase::FullMoon => "full moon",
            MoonPhase::WaningGibbous => "waning gibbous",
            MoonPhase::ThirdQuarter => "third quarter",
            MoonPhase::WaningCrescent => "waning crescent",
        };
        f.write_str(name)
    }
}

/// Mean lunations elapsed since the reference new moon.
pub fn lunations(mjd: f64) -> f64 {
    (mjd - REFERENCE_NEW_MOON_MJD) / SYNODIC_MONTH
}

pub fn moon_age_days(time: DateTime<Utc>) -> f64 {
    lunations(modified_julian_date(time)).rem_euclid(1.0) * SYNODIC_MONTH
}

pub fn moon_phase(time: DateTime<Utc>) -> MoonPhase {
    MoonPhase::from_age(moon_age_days(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_mjd_reference_points() {
        assert_eq!(modified_julian_date(utc(1970, 1, 1, 0, 0)), 40587.0);
        assert_eq!(modified_julian_date(utc(2000, 1, 1, 12, 0)), 51544.5);
        assert_eq!(modified_julian_date(utc(1858, 11, 17, 0, 0)), 0.0);
    }

    #[test]
    fn test_delta_t_table_lookup_and_interpolation() {
        assert_abs_diff_eq!(delta_t(utc(2000, 1, 1, 0, 0)), 63.8285, epsilon = 1e-9);
        // 2000 is a leap year: 1 July 00:00 is day 182 of 366
        let mid = delta_t(utc(2000, 7, 1, 0, 0));
        assert_abs_diff_eq!(mid, 63.8285 + 182.0 / 366.0 * (64.0908 - 63.8285), epsilon = 1e-9);
    }

    #[test]
    fn test_delta_t_is_continuous_across_new_year() {
        let before = delta_t(Utc.with_ymd_and_hms(2010, 12, 31, 23, 59, 59).unwrap());
        let after = delta_t(utc(2011, 1, 1, 0, 0));
        assert_abs_diff_eq!(before, after, epsilon = 1e-4);
    }

    #[test]
    fn test_delta_t_extrapolates_after_table() {
        let expected = 69.2038 + (69.2038 - 69.2945);
        assert_abs_diff_eq!(delta_t(utc(2024, 1, 1, 0, 0)), expected, epsilon = 1e-9);
        assert_abs_diff_eq!(delta_t(utc(2023, 1, 1, 0, 0)), 69.2038, epsilon = 1e-9);
    }

    #[test]
    fn test_delta_t_historical_fallbacks() {
        // Stephenson-Morrison 1456.6 minus the ndot correction for 955 years
        let expected = 1456.6 - 0.000091 * 0.2 * 955.0 * 955.0;
        assert_abs_diff_eq!(delta_t(utc(1000, 6, 1, 0, 0)), expected, epsilon = 1e-6);

        let b = 0.01 * (500.0 - 2000.0) + 3.75;
        let expected = 35.0 * b * b + 40.0 - 0.000091 * 0.2 * 1455.0 * 1455.0;
        assert_abs_diff_eq!(delta_t(utc(500, 1, 1, 0, 0)), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_polynomial_model_at_j2000() {
        assert_abs_diff_eq!(delta_t_polynomial(51544.5), 62.92, epsilon = 1e-12);
        let one_year_later = delta_t_polynomial(51544.5 + 365.25);
        assert_abs_diff_eq!(one_year_later, 62.92 + 0.32217 + 0.005589, epsilon = 1e-9);
    }

    #[test]
    fn test_mean_longitudes_near_j2000() {
        let longitudes = mean_longitudes(utc(2000, 1, 1, 12, 0), EphemerisTimeModel::Tabulated);
        assert_abs_diff_eq!(longitudes.s, 218.3262, epsilon = 1e-3);
        assert_abs_diff_eq!(longitudes.h, 280.4665, epsilon = 1e-2);
        assert_abs_diff_eq!(longitudes.p, 83.3533, epsilon = 1e-3);
        assert_abs_diff_eq!(longitudes.n, 125.0445, epsilon = 1e-3);
        assert_abs_diff_eq!(longitudes.p_sun, 282.94, epsilon = 1e-3);
    }

    #[test]
    fn test_longitudes_are_normalized() {
        for year in [1700, 1950, 1999, 2024, 2100] {
            for model in [EphemerisTimeModel::Tabulated, EphemerisTimeModel::Polynomial] {
                let l = mean_longitudes(utc(year, 3, 14, 15, 9), model);
                for angle in [l.s, l.h, l.p, l.n, l.p_sun] {
                    assert!((0.0..360.0).contains(&angle), "{angle} out of range");
                }
            }
        }
        assert_eq!(normalize_degrees(-1e-20), 0.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
    }

    #[test]
    fn test_models_differ_away_from_j2000() {
        let time = utc(1990, 1, 1, 0, 0);
        let tabulated = EphemerisTimeModel::Tabulated.centuries(time);
        let polynomial = EphemerisTimeModel::Polynomial.centuries(time);
        assert_ne!(tabulated, polynomial);
    }

    #[test]
    fn test_moon_phase() {
        assert_eq!(moon_phase(utc(2000, 1, 6, 20, 0)), MoonPhase::NewMoon);
        assert_eq!(moon_phase(utc(2000, 1, 21, 4, 40)), MoonPhase::FullMoon);
        assert_eq!(moon_phase(utc(2000, 1, 14, 13, 0)), MoonPhase::FirstQuarter);
        assert_eq!(MoonPhase::from_age(-1.0), MoonPhase::WaningCrescent);
        assert_eq!(MoonPhase::FullMoon.to_string(), "full moon");
    }
}
