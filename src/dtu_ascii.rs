//! # DTU ASCII Grid Reader
//!
//! Reads the fixed-format text grids distributed with the DTU10/DTU16 ocean tide
//! atlases (and the DTU mean sea surfaces). One file holds any number of grids, each
//! laid out as:
//!
//! ```text
//! M2 amplitude DTU16                  title, first token names the constituent
//! amplitude in meters                 description
//!   721  1441                         rows (latitude) and columns (longitude)
//!  -90.0   90.0                       latitude min max
//!    0.0  360.0                       longitude min max
//!  999.0                              undefined value
//! (10f8.3)                            Fortran format, values per line
//!   0.123 0.124 ...                   rows*cols values, south row first
//! ```
//!
//! The grid kind comes from the title or description ("amplitude", "phase", or
//! "mean sea surface"/"mss"); the description wins when both mention one.

use crate::constituent::TideConstituent;
use crate::error::{Result, TideError};
use crate::grid::{GridGeometry, GridValueKind, TideGrid};
use crate::ingest::GridProducer;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Values reserved up front for one grid; a DTU16 global grid is about a million.
const MAX_PREALLOCATED_VALUES: usize = 1 << 16;

/// Streaming reader over a DTU ASCII grid file.
pub struct DtuAsciiReader<R> {
    reader: R,
    /// 1-based number of the last line read
    line: usize,
    buf: String,
}

impl DtuAsciiReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

struct Header {
    constituent: TideConstituent,
    kind: GridValueKind,
    geometry: GridGeometry,
}

impl<R: BufRead> DtuAsciiReader<R> {
    pub fn new(reader: R) -> Self {
        DtuAsciiReader {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Read the next grid, `None` at end of input.
    pub fn read_grid(&mut self) -> Result<Option<TideGrid<f32>>> {
        let header = match self.read_header()? {
            Some(header) => header,
            None => return Ok(None),
        };
        let values = self.read_values(&header.geometry)?;
        debug!(
            constituent = %header.constituent,
            kind = ?header.kind,
            width = header.geometry.width,
            height = header.geometry.height,
            line = self.line,
            "parsed ascii grid"
        );
        TideGrid::new(header.constituent, header.kind, header.geometry, values).map(Some)
    }

    /// Next line with the trailing newline removed, `None` at end of input.
    fn next_line(&mut self) -> Result<Option<&str>> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        Ok(Some(self.buf.trim_end_matches(['\n', '\r'])))
    }

    fn parse_error(&self, message: impl Into<String>) -> TideError {
        TideError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    /// Next header line; end of input here is a truncated header.
    fn header_line(&mut self, what: &str) -> Result<String> {
        let line = self.next_line()?.map(str::to_string);
        line.ok_or_else(|| self.parse_error(format!("unexpected end of input, expected {what}")))
    }

    fn read_header(&mut self) -> Result<Option<Header>> {
        let title = loop {
            match self.next_line()?.map(str::to_string) {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };
        let token = title
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_string();
        let title_kind = kind_from_text(&title);

        let description = self.header_line("description")?;
        let kind = match kind_from_text(&description).or(title_kind) {
            Some(kind) => kind,
            None => return Err(self.parse_error("grid kind not found in title or description")),
        };

        let constituent = match (TideConstituent::from_str(&token), kind) {
            (Ok(constituent), _) => constituent,
            (Err(_), GridValueKind::SeaSurface) => TideConstituent::Unknown,
            (Err(err), _) => return Err(err),
        };

        let size = self.header_line("grid size")?;
        let [rows, cols] = self.parse_fields::<u32, 2>(&size, "rows and columns")?;
        let lat = self.header_line("latitude bounds")?;
        let [min_lat, max_lat] = self.parse_fields::<f32, 2>(&lat, "latitude bounds")?;
        let lon = self.header_line("longitude bounds")?;
        let [min_lon, max_lon] = self.parse_fields::<f32, 2>(&lon, "longitude bounds")?;
        let undef = self.header_line("undefined value")?;
        let [undef_value] = self.parse_fields::<f32, 1>(&undef, "undefined value")?;

        let format = self.header_line("format line")?;
        if !format.trim_start().starts_with('(') {
            return Err(self.parse_error(format!("expected Fortran format line, got {format:?}")));
        }

        let geometry = GridGeometry::new((min_lat, max_lat), (min_lon, max_lon), cols, rows, undef_value)?;
        Ok(Some(Header {
            constituent,
            kind,
            geometry,
        }))
    }

    /// Parse the first `N` whitespace-separated fields of a header line.
    fn parse_fields<T: FromStr, const N: usize>(&self, line: &str, what: &str) -> Result<[T; N]> {
        let mut fields = line.split_whitespace();
        let mut parsed = Vec::with_capacity(N);
        for _ in 0..N {
            let value = fields
                .next()
                .and_then(|field| fortran_number(field).parse::<T>().ok())
                .ok_or_else(|| self.parse_error(format!("expected {what}, got {line:?}")))?;
            parsed.push(value);
        }
        parsed
            .try_into()
            .map_err(|_| self.parse_error(format!("expected {what}, got {line:?}")))
    }

    fn read_values(&mut self, geometry: &GridGeometry) -> Result<Vec<f32>> {
        let expected = usize::try_from(geometry.cell_count())
            .map_err(|_| self.parse_error(format!("{}x{} grid is too large", geometry.width, geometry.height)))?;
        // header sizes are untrusted; grow past this as values actually arrive
        let mut values = Vec::with_capacity(expected.min(MAX_PREALLOCATED_VALUES));
        while values.len() < expected {
            let line = self.next_line()?.map(str::to_string);
            let line = line.ok_or_else(|| {
                self.parse_error(format!("too few values, expected {expected} got {}", values.len()))
            })?;
            if line.trim().is_empty() {
                return Err(TideError::InvalidFormat(format!(
                    "blank line {} inside data block after {} of {expected} values",
                    self.line,
                    values.len()
                )));
            }
            for field in line.split_whitespace() {
                if values.len() == expected {
                    return Err(self.parse_error(format!("too many values, expected {expected}")));
                }
                let value = fortran_number(field)
                    .parse::<f32>()
                    .map_err(|err| self.parse_error(format!("bad value {field:?}: {err}")))?;
                values.push(value);
            }
        }
        Ok(values)
    }
}

impl<R: BufRead> GridProducer for DtuAsciiReader<R> {
    fn next_grid(&mut self) -> Result<Option<TideGrid<f32>>> {
        self.read_grid()
    }
}

fn kind_from_text(text: &str) -> Option<GridValueKind> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("amplitude") {
        Some(GridValueKind::Amplitude)
    } else if lower.contains("phase") {
        Some(GridValueKind::Phase)
    } else if lower.contains("sea surface") || lower.split_whitespace().any(|word| word == "mss") {
        Some(GridValueKind::SeaSurface)
    } else {
        None
    }
}

/// Accept Fortran double-precision exponents (`1.5D-03`).
fn fortran_number(field: &str) -> Cow<'_, str> {
    if field.contains(['D', 'd']) {
        Cow::Owned(field.replace(['D', 'd'], "E"))
    } else {
        Cow::Borrowed(field)
    }
}
