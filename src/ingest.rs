//! # Database Ingestion
//!
//! Builds a constituent database from a stream of in-memory grids. Atlas files deliver
//! one amplitude grid and one phase grid per constituent, back to back; the two are
//! paired, checked against each other and written as a single record.

use crate::constituent::{AmplitudeUnit, PhaseUnit, TideConstituent};
use crate::database::{Cell, TideDataDb, UnitInfo};
use crate::error::{Result, TideError};
use crate::grid::{GridValueKind, TideGrid};
use std::collections::VecDeque;
use tracing::info;

/// Source of parsed grids.
pub trait GridProducer {
    /// The next grid, or `None` once the input is exhausted.
    fn next_grid(&mut self) -> Result<Option<TideGrid<f32>>>;
}

impl GridProducer for VecDeque<TideGrid<f32>> {
    fn next_grid(&mut self) -> Result<Option<TideGrid<f32>>> {
        Ok(self.pop_front())
    }
}

/// Units stamped on every record of a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildUnits {
    pub amplitude: AmplitudeUnit,
    pub phase: PhaseUnit,
}

impl Default for BuildUnits {
    /// DTU atlases store metres and degrees.
    fn default() -> Self {
        BuildUnits {
            amplitude: AmplitudeUnit::Meter,
            phase: PhaseUnit::Degree,
        }
    }
}

/// Consume `producer` and write one record per amplitude/phase pair.
///
/// Returns the constituents written, in input order.
///
/// # Errors
/// - `InvalidFormat` for a lone grid or a pair that is not one amplitude and one phase
///   grid of the same constituent
/// - `DimensionMismatch` when the pair disagrees on geometry
/// - `AlreadyExists` when a constituent repeats
pub fn build_database<P>(producer: &mut P, db: &TideDataDb, units: BuildUnits) -> Result<Vec<TideConstituent>>
where
    P: GridProducer + ?Sized,
{
    let mut written = Vec::new();
    while let Some(first) = producer.next_grid()? {
        let second = producer.next_grid()?.ok_or_else(|| {
            TideError::InvalidFormat(format!(
                "{} {:?} grid has no matching second grid",
                first.constituent, first.kind
            ))
        })?;
        let (amplitude, phase) = pair_grids(first, second)?;
        write_pair(db, &amplitude, &phase, units)?;
        written.push(amplitude.constituent);
    }
    info!(records = written.len(), path = %db.path().display(), "database build finished");
    Ok(written)
}

/// Order a pair as (amplitude, phase) and check that it belongs together.
fn pair_grids(first: TideGrid<f32>, second: TideGrid<f32>) -> Result<(TideGrid<f32>, TideGrid<f32>)> {
    let (amplitude, phase) = match (first.kind, second.kind) {
        (GridValueKind::Amplitude, GridValueKind::Phase) => (first, second),
        (GridValueKind::Phase, GridValueKind::Amplitude) => (second, first),
        (a, b) => {
            return Err(TideError::InvalidFormat(format!(
                "expected an amplitude and a phase grid for {}, got {a:?} and {b:?}",
                first.constituent
            )))
        }
    };
    if amplitude.constituent != phase.constituent {
        return Err(TideError::InvalidFormat(format!(
            "amplitude grid for {} paired with phase grid for {}",
            amplitude.constituent, phase.constituent
        )));
    }
    if !amplitude.geometry.same_sampling(&phase.geometry) {
        let (a, p) = (&amplitude.geometry, &phase.geometry);
        return Err(TideError::DimensionMismatch {
            constituent: amplitude.constituent,
            detail: format!(
                "amplitude {}x{} lat {}..{} lon {}..{}, phase {}x{} lat {}..{} lon {}..{}",
                a.width, a.height, a.min_lat, a.max_lat, a.min_lon, a.max_lon,
                p.width, p.height, p.min_lat, p.max_lat, p.min_lon, p.max_lon
            ),
        });
    }
    Ok((amplitude, phase))
}

fn write_pair(
    db: &TideDataDb,
    amplitude: &TideGrid<f32>,
    phase: &TideGrid<f32>,
    units: BuildUnits,
) -> Result<()> {
    let record = db.create_record(
        amplitude.geometry,
        UnitInfo {
            constituent: amplitude.constituent,
            amplitude_unit: units.amplitude,
            phase_unit: units.phase,
        },
    )?;

    // the record carries one sentinel, so undefined phases take the amplitude's
    let undef = amplitude.geometry.undef_value;
    let phase_undef = phase.geometry.undef_value;
    let mut cells = Vec::with_capacity(amplitude.geometry.width as usize);
    for y in 0..amplitude.geometry.height {
        cells.clear();
        cells.extend(
            amplitude
                .row(y)?
                .iter()
                .zip(phase.row(y)?)
                .map(|(&a, &p)| Cell {
                    amplitude: a,
                    phase: if p == phase_undef { undef } else { p },
                }),
        );
        record.write_row(y, &cells)?;
    }

    info!(
        constituent = %amplitude.constituent,
        offset = record.offset(),
        length = record.length(),
        "wrote constituent record"
    );
    Ok(())
}
