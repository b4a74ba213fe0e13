//! # Nodal Corrections
//!
//! Amplitude factors `f` and phase corrections `u` (degrees) for the 28 solver slots,
//! driven by the longitude `N` of the ascending lunar node (18.6 year period).
//!
//! The expressions are kept as a static table of [`NodalTerm`]s so each slot can be
//! inspected on its own. Several slots share a formula:
//!
//! - 1 follows 0, 5 follows 4
//! - 9 and 10 follow 8
//! - 20, 21 and 23 follow 19
//! - 27 (M4) is slot 5 squared for `f` and doubled for `u`

use crate::arguments::SLOT_COUNT;
use crate::ephemeris::{self, EphemerisTimeModel};
use chrono::{DateTime, Utc};

/// How one slot's `(f, u)` is derived.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodalTerm {
    /// `f = 1`, `u = 0`
    Unity,
    /// `f = c0 + c1 cos N + c2 cos 2N`, `u = d1 sin N + d2 sin 2N`
    Series { c: [f64; 3], d: [f64; 2] },
    /// Satellite form with `X = 1 + a cos N + b cos 2N`, `Y = a sin N + b sin 2N`:
    /// `f = sqrt(X^2 + Y^2)`, `u = atan2(sign * Y, X)`
    Satellite { a: f64, b: f64, sign: f64 },
    /// Same as another slot
    SameAs(usize),
    /// Square of another slot's `f`, double its `u`
    Squared(usize),
}

use NodalTerm::{SameAs, Satellite, Series, Squared, Unity};

pub const NODAL_TERMS: [NodalTerm; SLOT_COUNT] = [
    Series { c: [1.009, 0.187, -0.015], d: [10.8, -1.3] },  // Q1
    SameAs(0),                                              // O1
    Unity,                                                  // P1
    Series { c: [1.006, 0.115, -0.009], d: [-8.9, 0.7] },   // K1
    Series { c: [1.000, -0.037, 0.0], d: [-2.1, 0.0] },     // N2
    SameAs(4),                                              // M2
    Unity,                                                  // S2
    Series { c: [1.024, 0.286, 0.008], d: [-17.7, 0.7] },   // K2
    Satellite { a: 0.189, b: -0.0058, sign: 1.0 },          // 2Q1
    SameAs(8),                                              // sigma1
    SameAs(8),                                              // rho1
    Satellite { a: 0.185, b: 0.0, sign: 1.0 },              // M1a
    Satellite { a: 0.201, b: 0.0, sign: -1.0 },             // M1b
    Satellite { a: 0.221, b: 0.0, sign: -1.0 },             // chi1
    Unity,                                                  // pi1
    Unity,                                                  // phi1
    Unity,                                                  // theta1
    Satellite { a: 0.198, b: 0.0, sign: -1.0 },             // J1
    Satellite { a: 0.640, b: 0.134, sign: -1.0 },           // OO1
    Satellite { a: -0.0373, b: 0.0, sign: 1.0 },            // 2N2
    SameAs(19),                                             // mu2
    SameAs(19),                                             // nu2
    Unity,                                                  // lambda2
    SameAs(19),                                             // L2a
    Satellite { a: 0.441, b: 0.0, sign: -1.0 },             // L2b
    Unity,                                                  // T2
    Unity,                                                  // S1
    Squared(5),                                             // M4
];

/// `f` and `u` for every slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodalCorrections {
    pub f: [f64; SLOT_COUNT],
    /// Degrees
    pub u: [f64; SLOT_COUNT],
}

impl NodalCorrections {
    /// Evaluate the table for a node longitude in degrees.
    ///
    /// Referenced slots always precede the slots that copy them.
    pub fn from_node_longitude(node_degrees: f64) -> Self {
        let n = node_degrees.to_radians();
        let (sin_n, cos_n) = n.sin_cos();
        let (sin_2n, cos_2n) = (2.0 * n).sin_cos();

        let mut f = [1.0; SLOT_COUNT];
        let mut u = [0.0; SLOT_COUNT];
        for (slot, term) in NODAL_TERMS.iter().enumerate() {
            let (fi, ui) = match *term {
                Unity => (1.0, 0.0),
                Series { c, d } => (
                    c[0] + c[1] * cos_n + c[2] * cos_2n,
                    d[0] * sin_n + d[1] * sin_2n,
                ),
                Satellite { a, b, sign } => {
                    let x = 1.0 + a * cos_n + b * cos_2n;
                    let y = a * sin_n + b * sin_2n;
                    (x.hypot(y), (sign * y).atan2(x).to_degrees())
                }
                SameAs(source) => (f[source], u[source]),
                Squared(source) => (f[source] * f[source], 2.0 * u[source]),
            };
            f[slot] = fi;
            u[slot] = ui;
        }
        NodalCorrections { f, u }
    }
}

/// Nodal corrections at `time`, using the polynomial delta-T model.
pub fn nodal_corrections(time: DateTime<Utc>) -> NodalCorrections {
    let longitudes = ephemeris::mean_longitudes(time, EphemerisTimeModel::Polynomial);
    NodalCorrections::from_node_longitude(longitudes.n)
}
