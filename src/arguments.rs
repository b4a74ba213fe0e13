//! # Equilibrium Arguments
//!
//! The solver works on 28 constituent slots in a fixed order:
//!
//! ```text
//!  0 Q1    1 O1    2 P1    3 K1    4 N2    5 M2    6 S2    7 K2
//!  8 2Q1   9 σ1   10 ρ1   11 M1a  12 M1b  13 χ1   14 π1   15 φ1
//! 16 θ1   17 J1   18 OO1  19 2N2  20 μ2   21 ν2   22 λ2   23 L2a
//! 24 L2b  25 T2   26 S1   27 M4
//! ```
//!
//! Each argument is a Doodson-style linear combination of the hour angle and the mean
//! longitudes `s, h, p, p'`, in degrees. Slot 27 (M4) is twice slot 5 (M2).

use crate::ephemeris::{self, EphemerisTimeModel, MeanLongitudes};
use chrono::{DateTime, Utc};

/// Number of constituent slots in a solve
pub const SLOT_COUNT: usize = 28;

/// Display labels of the solver slots.
pub const SLOT_LABELS: [&str; SLOT_COUNT] = [
    "Q1", "O1", "P1", "K1", "N2", "M2", "S2", "K2", "2Q1", "SIGMA1", "RHO1", "M1a", "M1b",
    "CHI1", "PI1", "PHI1", "THETA1", "J1", "OO1", "2N2", "MU2", "NU2", "LAMBDA2", "L2a", "L2b",
    "T2", "S1", "M4",
];

/// `arg = species * 15 * hour + s*S + h*H + p*P + p_sun*P' + offset`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArgumentTerm {
    /// Cycles per day of the hour-angle term (1 diurnal, 2 semidiurnal)
    pub species: f64,
    pub s: f64,
    pub h: f64,
    pub p: f64,
    pub p_sun: f64,
    pub offset: f64,
}

const fn term(species: f64, s: f64, h: f64, p: f64, p_sun: f64, offset: f64) -> ArgumentTerm {
    ArgumentTerm {
        species,
        s,
        h,
        p,
        p_sun,
        offset,
    }
}

/// Slots 0 through 26; slot 27 is derived from slot 5.
pub const ARGUMENT_TERMS: [ArgumentTerm; SLOT_COUNT - 1] = [
    term(1.0, -3.0, 1.0, 1.0, 0.0, -90.0),  // Q1
    term(1.0, -2.0, 1.0, 0.0, 0.0, -90.0),  // O1
    term(1.0, 0.0, -1.0, 0.0, 0.0, -90.0),  // P1
    term(1.0, 0.0, 1.0, 0.0, 0.0, 90.0),    // K1
    term(2.0, -3.0, 2.0, 1.0, 0.0, 0.0),    // N2
    term(2.0, -2.0, 2.0, 0.0, 0.0, 0.0),    // M2
    term(2.0, 0.0, 0.0, 0.0, 0.0, 0.0),     // S2
    term(2.0, 0.0, 2.0, 0.0, 0.0, 0.0),     // K2
    term(1.0, -4.0, 1.0, 2.0, 0.0, -90.0),  // 2Q1
    term(1.0, -4.0, 3.0, 0.0, 0.0, -90.0),  // sigma1
    term(1.0, -3.0, 3.0, -1.0, 0.0, -90.0), // rho1
    term(1.0, -1.0, 1.0, -1.0, 0.0, 90.0),  // M1a
    term(1.0, -1.0, 1.0, 1.0, 0.0, 90.0),   // M1b
    term(1.0, -1.0, 3.0, -1.0, 0.0, 90.0),  // chi1
    term(1.0, 0.0, -2.0, 0.0, 1.0, -90.0),  // pi1
    term(1.0, 0.0, 3.0, 0.0, 0.0, 90.0),    // phi1
    term(1.0, 1.0, -1.0, 1.0, 0.0, 90.0),   // theta1
    term(1.0, 1.0, 1.0, -1.0, 0.0, 90.0),   // J1
    term(1.0, 2.0, 1.0, 0.0, 0.0, 90.0),    // OO1
    term(2.0, -4.0, 2.0, 2.0, 0.0, 0.0),    // 2N2
    term(2.0, -4.0, 4.0, 0.0, 0.0, 0.0),    // mu2
    term(2.0, -3.0, 4.0, -1.0, 0.0, 0.0),   // nu2
    term(2.0, -1.0, 0.0, 1.0, 0.0, 180.0),  // lambda2
    term(2.0, -1.0, 2.0, -1.0, 0.0, 180.0), // L2a
    term(2.0, -1.0, 2.0, 1.0, 0.0, 0.0),    // L2b
    term(2.0, 0.0, -1.0, 0.0, 1.0, 0.0),    // T2
    term(1.0, 0.0, 0.0, 0.0, 0.0, 180.0),   // S1, Doodson's phase
];

impl ArgumentTerm {
    pub fn evaluate(&self, hour: f64, longitudes: &MeanLongitudes) -> f64 {
        self.species * 15.0 * hour
            + self.s * longitudes.s
            + self.h * longitudes.h
            + self.p * longitudes.p
            + self.p_sun * longitudes.p_sun
            + self.offset
    }
}

/// Arguments in degrees (not reduced) for a fractional UTC hour and longitudes.
pub fn arguments_from(hour: f64, longitudes: &MeanLongitudes) -> [f64; SLOT_COUNT] {
    let mut args = [0.0; SLOT_COUNT];
    for (arg, term) in args.iter_mut().zip(ARGUMENT_TERMS.iter()) {
        *arg = term.evaluate(hour, longitudes);
    }
    args[27] = 2.0 * args[5];
    args
}

/// Equilibrium arguments at `time`, using tabulated delta-T.
pub fn equilibrium_arguments(time: DateTime<Utc>) -> [f64; SLOT_COUNT] {
    let mjd = ephemeris::modified_julian_date(time);
    let hour = (mjd - mjd.floor()) * 24.0;
    let longitudes = ephemeris::mean_longitudes(time, EphemerisTimeModel::Tabulated);
    arguments_from(hour, &longitudes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn longitudes() -> MeanLongitudes {
        MeanLongitudes {
            s: 10.0,
            h: 20.0,
            p: 30.0,
            n: 40.0,
            p_sun: 50.0,
        }
    }

    #[test]
    fn test_known_combinations() {
        let args = arguments_from(2.0, &longitudes());
        // t1 = 30, t2 = 60
        assert_eq!(args[0], 30.0 + 20.0 - 30.0 + 30.0 - 90.0);
        assert_eq!(args[5], 60.0 + 40.0 - 20.0);
        assert_eq!(args[6], 60.0);
        assert_eq!(args[14], 30.0 - 40.0 + 50.0 - 90.0);
        assert_eq!(args[25], 60.0 - 20.0 + 50.0);
        assert_eq!(args[26], 30.0 + 180.0);
    }

    #[test]
    fn test_m4_is_twice_m2() {
        for hour in [0.0, 3.5, 17.25, 23.99] {
            let args = arguments_from(hour, &longitudes());
            assert_eq!(args[27], 2.0 * args[5]);
        }
    }

    #[test]
    fn test_solar_arguments_follow_the_clock() {
        let time = Utc.with_ymd_and_hms(2021, 6, 1, 6, 0, 0).unwrap();
        let args = equilibrium_arguments(time);
        assert_abs_diff_eq!(args[6], 180.0, epsilon = 1e-6);
        assert_abs_diff_eq!(args[26], 270.0, epsilon = 1e-6);
    }

    #[test]
    fn test_labels_cover_every_slot() {
        assert_eq!(SLOT_LABELS.len(), ARGUMENT_TERMS.len() + 1);
        assert_eq!(SLOT_LABELS[26], "S1");
        assert_eq!(SLOT_LABELS[27], "M4");
    }
}
