//! # Tidal Datums and Series
//!
//! Long scans of one location's predicted heights:
//!
//! - [`scan_datums`] reduces a window to LAT / HAT / MSL (lowest, highest, mean)
//! - [`predict_series`] keeps every sample for output
//!
//! Windows are half-open, `[start, end)`. A multi-year scan at 15 minute steps is
//! several hundred thousand solves, so scans poll a [`CancelToken`] on every step.

use crate::error::{Result, TideError};
use crate::solver::{LocationHarmonics, SolverOptions};
use crate::{Sample, TideSeries};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Seconds from the Unix epoch to 2000-01-01T00:00:00Z
const Y2000_SECONDS: i64 = 946_684_800;
/// Seconds from the Unix epoch to 2020-01-01T00:00:00Z
const Y2020_SECONDS: i64 = 1_577_836_800;

/// Shared flag for aborting a running scan from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Time range and sampling step of a scan.
///
/// Only constructed through [`ScanWindow::new`] and friends, so the step is always
/// positive and the window never empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl Default for ScanWindow {
    /// 2000-01-01 to 2020-01-01 at 15 minutes.
    fn default() -> Self {
        let epoch = DateTime::<Utc>::default();
        ScanWindow {
            start: epoch + Duration::seconds(Y2000_SECONDS),
            end: epoch + Duration::seconds(Y2020_SECONDS),
            step: Duration::minutes(15),
        }
    }
}

impl ScanWindow {
    /// Validated window; `end` must be after `start` and `step` positive.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Self> {
        if end <= start {
            return Err(TideError::InvalidArgument(format!(
                "scan window ends ({end}) before it starts ({start})"
            )));
        }
        if step <= Duration::zero() {
            return Err(TideError::InvalidArgument(format!(
                "scan step must be positive, got {step}"
            )));
        }
        Ok(ScanWindow { start, end, step })
    }

    /// Window stepping by a whole number of seconds, as given on the command line.
    pub fn with_step_seconds(start: DateTime<Utc>, end: DateTime<Utc>, step_seconds: i64) -> Result<Self> {
        let step = Duration::try_seconds(step_seconds).ok_or_else(|| {
            TideError::InvalidArgument(format!("scan step of {step_seconds} s is out of range"))
        })?;
        Self::new(start, end, step)
    }

    /// Window from 1 January of `start_year` to 1 January of `end_year`.
    pub fn years(start_year: i32, end_year: i32, step_minutes: i64) -> Result<Self> {
        let jan_first = |year: i32| {
            chrono::NaiveDate::from_ymd_opt(year, 1, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
                .ok_or_else(|| TideError::InvalidArgument(format!("year {year} out of range")))
        };
        let step = Duration::try_minutes(step_minutes).ok_or_else(|| {
            TideError::InvalidArgument(format!("scan step of {step_minutes} min is out of range"))
        })?;
        Self::new(jan_first(start_year)?, jan_first(end_year)?, step)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Sample instants in `[start, end)`.
    pub fn instants(&self) -> impl Iterator<Item = DateTime<Utc>> {
        let (end, step) = (self.end, self.step);
        std::iter::successors(Some(self.start), move |&t| t.checked_add_signed(step))
            .take_while(move |&t| t < end)
    }

    /// Number of samples the window yields.
    pub fn len(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        let step = self.step.num_milliseconds().max(1);
        (span / step + i64::from(span % step != 0)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lowest, highest and mean predicted height over a window, in centimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideDatums {
    /// Lowest astronomical tide
    pub lowest: f64,
    /// Highest astronomical tide
    pub highest: f64,
    /// Mean over the window
    pub mean: f64,
    pub samples: u64,
}

/// Reduce the window to LAT / HAT / MSL.
///
/// A location on undefined grid cells predicts `NaN`; the scan stops at the first such
/// sample and reports `NaN` for all three datums.
///
/// # Errors
/// `Cancelled` as soon as `cancel` is set.
pub fn scan_datums(
    harmonics: &LocationHarmonics,
    window: &ScanWindow,
    options: &SolverOptions,
    cancel: &CancelToken,
) -> Result<TideDatums> {
    info!(
        lat = harmonics.lat,
        lon = harmonics.lon,
        start = %window.start(),
        end = %window.end(),
        samples = window.len(),
        "scanning tidal datums"
    );

    let mut lowest = f64::INFINITY;
    let mut highest = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut samples = 0u64;
    for time in window.instants() {
        if cancel.is_cancelled() {
            return Err(TideError::Cancelled);
        }
        let height = harmonics.height_at(time, options);
        samples += 1;
        if height.is_nan() {
            return Ok(TideDatums {
                lowest: f64::NAN,
                highest: f64::NAN,
                mean: f64::NAN,
                samples,
            });
        }
        lowest = lowest.min(height);
        highest = highest.max(height);
        sum += height;
    }

    let datums = TideDatums {
        lowest,
        highest,
        mean: sum / samples as f64,
        samples,
    };
    info!(
        lowest = datums.lowest,
        highest = datums.highest,
        mean = datums.mean,
        "datum scan finished"
    );
    Ok(datums)
}

/// Predict every sample of the window.
pub fn predict_series(
    harmonics: &LocationHarmonics,
    window: &ScanWindow,
    options: &SolverOptions,
    cancel: &CancelToken,
) -> Result<TideSeries> {
    let mut samples = Vec::with_capacity(window.len());
    for time in window.instants() {
        if cancel.is_cancelled() {
            return Err(TideError::Cancelled);
        }
        samples.push(Sample {
            time,
            height_cm: harmonics.height_at(time, options),
        });
    }
    Ok(TideSeries {
        lat: harmonics.lat,
        lon: harmonics.lon,
        samples,
    })
}
