//! # Tidal Constituents
//!
//! Closed catalogue of the harmonic constituents the atlas format can name. The numeric
//! id is what the database stores in each record's unit info; ids follow the NOAA
//! constituent numbering where NOAA assigns one, and the 100-series otherwise.
//!
//! Only ten constituents are ever read from a database by the solver
//! (see [`crate::solver::MAJOR_CONSTITUENTS`]); the others exist so that atlas files
//! and records can be named and round-tripped.

use crate::error::TideError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! constituents {
    ($($variant:ident = $id:literal => $name:literal),+ $(,)?) => {
        /// A named tidal frequency.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum TideConstituent {
            $($variant,)+
            /// Sentinel for ids and names outside the catalogue
            Unknown,
        }

        impl TideConstituent {
            /// Every named constituent in catalogue order (excludes `Unknown`).
            pub const ALL: &'static [TideConstituent] = &[$(TideConstituent::$variant,)+];

            /// Numeric id as stored in database records.
            pub fn id(self) -> i32 {
                match self {
                    $(TideConstituent::$variant => $id,)+
                    TideConstituent::Unknown => 99999,
                }
            }

            /// Inverse of [`TideConstituent::id`]; unrecognised ids map to `Unknown`.
            pub fn from_id(id: i32) -> Self {
                match id {
                    $($id => TideConstituent::$variant,)+
                    _ => TideConstituent::Unknown,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(TideConstituent::$variant => $name,)+
                    TideConstituent::Unknown => "UNKNOWN",
                }
            }
        }

        impl FromStr for TideConstituent {
            type Err = TideError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok(TideConstituent::$variant),)+
                    _ => Err(TideError::UnknownConstituent(s.to_string())),
                }
            }
        }
    };
}

constituents! {
    M2 = 1 => "M2",
    S2 = 2 => "S2",
    N2 = 3 => "N2",
    K1 = 4 => "K1",
    M4 = 5 => "M4",
    O1 = 6 => "O1",
    M6 = 7 => "M6",
    MK3 = 8 => "MK3",
    S4 = 9 => "S4",
    MN4 = 10 => "MN4",
    Nu2 = 11 => "NU2",
    S6 = 12 => "S6",
    Mu2 = 13 => "MU2",
    TwoN2 = 14 => "2N2",
    OO1 = 15 => "OO1",
    Lam2 = 16 => "LAM2",
    S1 = 17 => "S1",
    M1 = 18 => "M1",
    J1 = 19 => "J1",
    Mm = 20 => "MM",
    Ssa = 21 => "SSA",
    Sa = 22 => "SA",
    Msf = 23 => "MSF",
    Mf = 24 => "MF",
    Rho1 = 25 => "RHO",
    Q1 = 26 => "Q1",
    T2 = 27 => "T2",
    R2 = 28 => "R2",
    TwoQ1 = 29 => "2Q1",
    P1 = 30 => "P1",
    TwoSM2 = 31 => "2SM2",
    M3 = 32 => "M3",
    L2 = 33 => "L2",
    TwoMK3 = 34 => "2MK3",
    K2 = 35 => "K2",
    M8 = 36 => "M8",
    MS4 = 37 => "MS4",
    Lambda2 = 100 => "LAMBDA2",
    Sigma1 = 101 => "SIGMA1",
    Chi1 = 102 => "CHI1",
    Pi1 = 103 => "PI1",
    Phi1 = 104 => "PHI1",
    Theta1 = 105 => "THETA1",
}

impl fmt::Display for TideConstituent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit of the stored amplitude values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmplitudeUnit {
    Centimeter = 0,
    Meter = 1,
    Foot = 2,
}

impl AmplitudeUnit {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(AmplitudeUnit::Centimeter),
            1 => Some(AmplitudeUnit::Meter),
            2 => Some(AmplitudeUnit::Foot),
            _ => None,
        }
    }

    /// Factor converting a value in this unit to centimetres.
    pub fn to_centimeters(self) -> f64 {
        match self {
            AmplitudeUnit::Centimeter => 1.0,
            AmplitudeUnit::Meter => 100.0,
            AmplitudeUnit::Foot => 30.48,
        }
    }
}

impl FromStr for AmplitudeUnit {
    type Err = TideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cm" | "centimeter" => Ok(AmplitudeUnit::Centimeter),
            "m" | "meter" => Ok(AmplitudeUnit::Meter),
            "ft" | "foot" | "feet" => Ok(AmplitudeUnit::Foot),
            _ => Err(TideError::InvalidFormat(format!("unknown amplitude unit {s}"))),
        }
    }
}

/// Unit of the stored phase values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseUnit {
    Degree = 0,
    Radian = 1,
}

impl PhaseUnit {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PhaseUnit::Degree),
            1 => Some(PhaseUnit::Radian),
            _ => None,
        }
    }

    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            PhaseUnit::Degree => value,
            PhaseUnit::Radian => value.to_degrees(),
        }
    }
}
