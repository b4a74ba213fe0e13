//! # Bilinear Grid Interpolation
//!
//! Samples any gridded source at an arbitrary `(lat, lon)`. The query point is mapped
//! linearly into fractional grid coordinates
//!
//! ```text
//! x = (lon - minLon) * (width  - 1) / (maxLon - minLon)
//! y = (lat - minLat) * (height - 1) / (maxLat - minLat)
//! ```
//!
//! and the four enclosing corners are blended with bilinear weights, re-normalised by
//! their sum.
//!
//! ## Wraparound
//!
//! With [`Wraparound::Global`] the grid is treated as a full circle of longitude:
//! - an upper column index past `width - 1` wraps to column 0
//! - an upper row index past `height - 1` (crossing the north pole) stays on the last
//!   row, and both columns of that row are reflected through `width - 1 - x`
//!
//! [`Wraparound::Bounded`] rejects points outside the stored domain with
//! `IndexOutOfRange`, except for points lying exactly on the last row or column.
//!
//! ## Undefined cells
//!
//! Sentinel cells are turned into `NaN` by the cell sources and propagate into the
//! result; corners with zero weight are never read.

use crate::database::ConstituentRecord;
use crate::error::{Result, TideError};
use crate::grid::{GridGeometry, TideGrid};
use num_traits::Float;
use std::ops::{Add, Mul};

/// Anything that exposes a grid geometry and `N` values per cell.
pub trait CellSource<const N: usize> {
    fn geometry(&self) -> &GridGeometry;

    fn cell_values(&self, x: u32, y: u32) -> Result<[f64; N]>;
}

/// Longitude and pole handling for one call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wraparound {
    /// Cyclic longitude and pole reflection (global tidal atlases)
    Global,
    /// No wrapping (regional grids, mean sea surface)
    Bounded,
}

/// Weights of the four enclosing corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BilinearWeights {
    pub lower_left: f64,
    pub lower_right: f64,
    pub upper_left: f64,
    pub upper_right: f64,
}

impl BilinearWeights {
    fn new(dx: f64, dy: f64) -> Self {
        BilinearWeights {
            lower_left: (1.0 - dx) * (1.0 - dy),
            lower_right: dx * (1.0 - dy),
            upper_left: (1.0 - dx) * dy,
            upper_right: dx * dy,
        }
    }

    pub fn sum(&self) -> f64 {
        self.lower_left + self.lower_right + self.upper_left + self.upper_right
    }

    /// Weights in corner order: lower-left, lower-right, upper-left, upper-right.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.lower_left,
            self.lower_right,
            self.upper_left,
            self.upper_right,
        ]
    }
}

/// Resolved corner cells and weights for one query point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stencil {
    /// `(x, y)` of lower-left, lower-right, upper-left, upper-right
    pub corners: [(u32, u32); 4],
    pub weights: BilinearWeights,
}

/// Find the corner cells and weights for `(lat, lon)`.
pub fn locate(geometry: &GridGeometry, lat: f64, lon: f64, wrap: Wraparound) -> Result<Stencil> {
    // the fields are public, so a hand-built geometry may skip `GridGeometry::new`
    if geometry.width < 2 || geometry.height < 2 {
        return Err(TideError::InvalidGeometry(format!(
            "cannot interpolate on a {}x{} grid",
            geometry.width, geometry.height
        )));
    }
    let min_lat = geometry.min_lat as f64;
    let max_lat = geometry.max_lat as f64;
    let min_lon = geometry.min_lon as f64;
    let max_lon = geometry.max_lon as f64;
    let last_x = (geometry.width - 1) as f64;
    let last_y = (geometry.height - 1) as f64;

    let lon = match wrap {
        Wraparound::Global => {
            let shifted = min_lon + (lon - min_lon).rem_euclid(360.0);
            if shifted >= min_lon + 360.0 {
                shifted - 360.0
            } else {
                shifted
            }
        }
        Wraparound::Bounded => lon,
    };

    let fx = (lon - min_lon) * last_x / (max_lon - min_lon);
    let fy = (lat - min_lat) * last_y / (max_lat - min_lat);
    let out_of_range = || TideError::IndexOutOfRange {
        x: fx.floor() as i64,
        y: fy.floor() as i64,
        width: geometry.width,
        height: geometry.height,
    };

    // also rejects NaN
    if !(fx >= 0.0 && fy >= 0.0) {
        return Err(out_of_range());
    }
    let (x0f, y0f) = (fx.floor(), fy.floor());
    if x0f > last_x || y0f > last_y {
        return Err(out_of_range());
    }
    let (dx, dy) = (fx - x0f, fy - y0f);
    let (x0, y0) = (x0f as u32, y0f as u32);

    let mut x1 = x0 + 1;
    if x1 >= geometry.width {
        x1 = match wrap {
            Wraparound::Global => 0,
            Wraparound::Bounded if dx == 0.0 => x0,
            Wraparound::Bounded => return Err(out_of_range()),
        };
    }

    let (mut y1, mut upper_x0, mut upper_x1) = (y0 + 1, x0, x1);
    if y1 >= geometry.height {
        match wrap {
            Wraparound::Global => {
                y1 = y0;
                upper_x0 = geometry.width - 1 - x0;
                upper_x1 = geometry.width - 1 - x1;
            }
            Wraparound::Bounded if dy == 0.0 => y1 = y0,
            Wraparound::Bounded => return Err(out_of_range()),
        }
    }

    Ok(Stencil {
        corners: [(x0, y0), (x1, y0), (upper_x0, y1), (upper_x1, y1)],
        weights: BilinearWeights::new(dx, dy),
    })
}

/// Bilinearly interpolate all `N` channels of `source` at `(lat, lon)`.
pub fn interpolate<S, const N: usize>(
    source: &S,
    lat: f64,
    lon: f64,
    wrap: Wraparound,
) -> Result<[f64; N]>
where
    S: CellSource<N> + ?Sized,
{
    let stencil = locate(source.geometry(), lat, lon, wrap)?;
    let mut blended = [0.0; N];
    let mut total = 0.0;
    for (&(x, y), weight) in stencil.corners.iter().zip(stencil.weights.as_array()) {
        if weight == 0.0 {
            continue;
        }
        let values = source.cell_values(x, y)?;
        for (acc, value) in blended.iter_mut().zip(values) {
            *acc += weight * value;
        }
        total += weight;
    }
    for acc in blended.iter_mut() {
        *acc /= total;
    }
    Ok(blended)
}

/// A constituent in Cartesian form, amplitude in centimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Harmonic {
    pub hcos: f64,
    pub hsin: f64,
}

impl Harmonic {
    pub fn from_polar(amplitude: f64, phase_degrees: f64) -> Self {
        let phase = phase_degrees.to_radians();
        Harmonic {
            hcos: amplitude * phase.cos(),
            hsin: amplitude * phase.sin(),
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.hcos.hypot(self.hsin)
    }

    /// Phase in degrees, `[0, 360)`.
    pub fn phase(&self) -> f64 {
        self.hsin.atan2(self.hcos).to_degrees().rem_euclid(360.0)
    }
}

impl Add for Harmonic {
    type Output = Harmonic;

    fn add(self, rhs: Harmonic) -> Harmonic {
        Harmonic {
            hcos: self.hcos + rhs.hcos,
            hsin: self.hsin + rhs.hsin,
        }
    }
}

impl Mul<Harmonic> for f64 {
    type Output = Harmonic;

    fn mul(self, rhs: Harmonic) -> Harmonic {
        Harmonic {
            hcos: self * rhs.hcos,
            hsin: self * rhs.hsin,
        }
    }
}

/// Records yield `[hcos, hsin]` in centimetres, with units normalised first.
impl CellSource<2> for ConstituentRecord<'_> {
    fn geometry(&self) -> &GridGeometry {
        ConstituentRecord::geometry(self)
    }

    fn cell_values(&self, x: u32, y: u32) -> Result<[f64; 2]> {
        let cell = self.read_cell(x, y)?;
        let undef = ConstituentRecord::geometry(self).undef_value;
        if cell.amplitude == undef || cell.phase == undef {
            return Ok([f64::NAN, f64::NAN]);
        }
        let units = self.units();
        let harmonic = Harmonic::from_polar(
            cell.amplitude as f64 * units.amplitude_unit.to_centimeters(),
            units.phase_unit.to_degrees(cell.phase as f64),
        );
        Ok([harmonic.hcos, harmonic.hsin])
    }
}

impl<T: Float> CellSource<1> for TideGrid<T> {
    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn cell_values(&self, x: u32, y: u32) -> Result<[f64; 1]> {
        if self.is_undefined(x, y)? {
            return Ok([f64::NAN]);
        }
        Ok([self.get(x, y)?.to_f64().unwrap_or(f64::NAN)])
    }
}

/// Interpolate a constituent record at `(lat, lon)`.
///
/// Blending happens on `(hcos, hsin)`; use [`Harmonic::amplitude`] and
/// [`Harmonic::phase`] for the polar form.
pub fn interpolate_record(
    record: &ConstituentRecord<'_>,
    lat: f64,
    lon: f64,
    wrap: Wraparound,
) -> Result<Harmonic> {
    let [hcos, hsin]: [f64; 2] = interpolate(record, lat, lon, wrap)?;
    Ok(Harmonic { hcos, hsin })
}
