//! # Grid Geometry and In-Memory Grids
//!
//! [`GridGeometry`] is the one description of a lat/lon sampling shared by database
//! records, ingestion grids and the mean-sea-surface sampler. Samples include both
//! boundary coordinates, so `resolution = (max - min) / (size - 1)`.
//!
//! [`TideGrid`] holds a row-major grid (south row first, west column first) and is
//! generic over the stored precision so `f32` atlas grids and `f64` derived grids
//! share one type.

use crate::constituent::TideConstituent;
use crate::error::{Result, TideError};
use num_traits::{Float, NumCast};
use serde::{Deserialize, Serialize};

/// Bounds, sizes and undefined sentinel of a regular lat/lon grid.
///
/// Field types match the on-disk record header exactly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub min_lat: f32,
    pub max_lat: f32,
    pub min_lon: f32,
    pub max_lon: f32,
    pub res_lat: f32,
    pub res_lon: f32,
    /// Number of longitude samples (X)
    pub width: u32,
    /// Number of latitude samples (Y)
    pub height: u32,
    pub undef_value: f32,
}

impl GridGeometry {
    /// Build a geometry, deriving the resolution from bounds and sample counts.
    ///
    /// Both axes need at least two samples and strictly increasing bounds.
    pub fn new(
        (min_lat, max_lat): (f32, f32),
        (min_lon, max_lon): (f32, f32),
        width: u32,
        height: u32,
        undef_value: f32,
    ) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(TideError::InvalidGeometry(format!(
                "grid needs at least 2x2 samples, got {width}x{height}"
            )));
        }
        if ![min_lat, max_lat, min_lon, max_lon].iter().all(|bound| bound.is_finite()) {
            return Err(TideError::InvalidGeometry(format!(
                "bounds must be finite: lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon}"
            )));
        }
        if !(max_lat > min_lat) || !(max_lon > min_lon) {
            return Err(TideError::InvalidGeometry(format!(
                "bounds must increase: lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon}"
            )));
        }
        Ok(GridGeometry {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            res_lat: (max_lat - min_lat) / (height - 1) as f32,
            res_lon: (max_lon - min_lon) / (width - 1) as f32,
            width,
            height,
            undef_value,
        })
    }

    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when both geometries sample exactly the same points.
    pub fn same_sampling(&self, other: &GridGeometry) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.min_lat == other.min_lat
            && self.max_lat == other.max_lat
            && self.min_lon == other.min_lon
            && self.max_lon == other.max_lon
    }

    /// Fail with `IndexOutOfRange` unless `(x, y)` addresses a stored sample.
    pub fn check_index(&self, x: u32, y: u32) -> Result<()> {
        if x >= self.width || y >= self.height {
            return Err(TideError::IndexOutOfRange {
                x: x as i64,
                y: y as i64,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Row-major position of `(x, y)`.
    pub fn linear_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// What the values of a text grid represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridValueKind {
    Amplitude,
    Phase,
    SeaSurface,
}

/// A fully materialised grid of one quantity.
#[derive(Clone, Debug)]
pub struct TideGrid<T: Float> {
    pub constituent: TideConstituent,
    pub kind: GridValueKind,
    pub geometry: GridGeometry,
    values: Vec<T>,
}

impl<T: Float> TideGrid<T> {
    /// Wrap row-major values; the length must equal `width * height`.
    pub fn new(
        constituent: TideConstituent,
        kind: GridValueKind,
        geometry: GridGeometry,
        values: Vec<T>,
    ) -> Result<Self> {
        if values.len() as u64 != geometry.cell_count() {
            return Err(TideError::InvalidGeometry(format!(
                "expected {} values for {}x{} grid, got {}",
                geometry.cell_count(),
                geometry.width,
                geometry.height,
                values.len()
            )));
        }
        Ok(TideGrid {
            constituent,
            kind,
            geometry,
            values,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> Result<T> {
        self.geometry.check_index(x, y)?;
        Ok(self.values[self.geometry.linear_index(x, y)])
    }

    /// One latitude row, west to east.
    pub fn row(&self, y: u32) -> Result<&[T]> {
        self.geometry.check_index(0, y)?;
        let start = self.geometry.linear_index(0, y);
        Ok(&self.values[start..start + self.geometry.width as usize])
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// True if the stored value at `(x, y)` equals the undefined sentinel.
    pub fn is_undefined(&self, x: u32, y: u32) -> Result<bool> {
        let value = self.get(x, y)?;
        let undef = <T as NumCast>::from(self.geometry.undef_value).unwrap_or_else(T::nan);
        Ok(value == undef)
    }
}
