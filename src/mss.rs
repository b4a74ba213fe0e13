//! Mean sea surface sampling.
//!
//! A mean sea surface grid is a single-channel grid sampled the same way as a
//! constituent record, except that it does not wrap around the globe: points outside
//! the grid are errors. Heights are reported in centimetres like tide heights.

use crate::constituent::AmplitudeUnit;
use crate::error::{Result, TideError};
use crate::grid::{GridValueKind, TideGrid};
use crate::interpolate::{interpolate, Wraparound};

/// Height of the mean sea surface above the reference ellipsoid.
pub trait MeanSeaSurface {
    /// Height in centimetres at `(lat, lon)` degrees; `NaN` over undefined cells.
    fn height_at(&self, lat: f64, lon: f64) -> Result<f64>;
}

pub struct GridMeanSeaSurface {
    grid: TideGrid<f32>,
    to_centimeters: f64,
}

impl GridMeanSeaSurface {
    /// Wrap a grid parsed as [`GridValueKind::SeaSurface`] stored in `unit`.
    pub fn new(grid: TideGrid<f32>, unit: AmplitudeUnit) -> Result<Self> {
        if grid.kind != GridValueKind::SeaSurface {
            return Err(TideError::IncompatibleType {
                expected: "sea surface grid".to_string(),
                found: format!("{:?} grid", grid.kind),
            });
        }
        Ok(GridMeanSeaSurface {
            grid,
            to_centimeters: unit.to_centimeters(),
        })
    }

    pub fn grid(&self) -> &TideGrid<f32> {
        &self.grid
    }
}

impl MeanSeaSurface for GridMeanSeaSurface {
    fn height_at(&self, lat: f64, lon: f64) -> Result<f64> {
        // grids in 0..360 accept -180..180 input
        let lon = if lon < self.grid.geometry.min_lon as f64 {
            lon + 360.0
        } else {
            lon
        };
        let [height] = interpolate(&self.grid, lat, lon, Wraparound::Bounded)?;
        Ok(height * self.to_centimeters)
    }
}
