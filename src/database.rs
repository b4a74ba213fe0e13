//! # Constituent Database
//!
//! A custom binary container holding one gridded (amplitude, phase) record per tidal
//! constituent. All multi-byte values are big-endian.
//!
//! ## File Layout
//!
//! ```text
//! preamble   12 bytes   magic "TIDEDAT" + version:u8, kind:u8, 3 padding bytes
//! record     40 bytes   length:u32 minLat:f32 maxLat:f32 minLon:f32 maxLon:f32
//!                       resLat:f32 resLon:f32 gridWidth:u32 gridHeight:u32 undef:f32
//!             6 bytes   constituentId:i32 amplitudeUnit:u8 phaseUnit:u8
//!            W*H*8      (amplitude:f32, phase:f32) cells, row-major south to north
//! record     ...
//! ```
//!
//! `length` covers header, unit info and payload, so records are found by a linear
//! scan that hops from header to header. There is no index and no deletion; the
//! file is append-only and holds at most one record per constituent.
//!
//! ## Concurrency
//!
//! The file handle and the record cache live behind one mutex. Every operation
//! seeks to an absolute offset before reading or writing while holding the lock,
//! so concurrent callers never observe each other's cursor.

use crate::constituent::{AmplitudeUnit, PhaseUnit, TideConstituent};
use crate::error::{Result, TideError};
use crate::grid::GridGeometry;
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Signature at the start of every database file, followed by the version byte.
pub const MAGIC: [u8; 7] = *b"TIDEDAT";
pub const FORMAT_VERSION: u8 = 2;

pub const PREAMBLE_SIZE: u64 = 12;
pub const RECORD_HEADER_SIZE: u64 = 40;
pub const UNIT_INFO_SIZE: u64 = 6;
/// One (amplitude, phase) pair of `f32`
pub const CELL_SIZE: u64 = 8;

const RECORD_PREFIX_SIZE: u64 = RECORD_HEADER_SIZE + UNIT_INFO_SIZE;

/// Payload kind declared in the preamble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Constituent = 0,
    /// Reserved for precomputed height caches; no record operations support it yet
    TideValueCache = 1,
}

impl DataKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(DataKind::Constituent),
            1 => Some(DataKind::TideValueCache),
            _ => None,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Constituent => f.write_str("constituent"),
            DataKind::TideValueCache => f.write_str("tide-value-cache"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file only; writes fail
    ReadOnly,
    /// Open or create; a new file gets a fresh preamble
    ReadWrite,
}

/// Identity and units of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitInfo {
    pub constituent: TideConstituent,
    pub amplitude_unit: AmplitudeUnit,
    pub phase_unit: PhaseUnit,
}

/// One stored grid sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub amplitude: f32,
    pub phase: f32,
}

/// Decoded record header plus its position in the file.
#[derive(Clone, Copy, Debug)]
struct RecordLocation {
    offset: u64,
    length: u32,
    geometry: GridGeometry,
    units: UnitInfo,
}

impl RecordLocation {
    fn payload_start(&self) -> u64 {
        self.offset + RECORD_PREFIX_SIZE
    }
}

struct DbState {
    file: File,
    records: HashMap<TideConstituent, RecordLocation>,
}

enum ScanOutcome {
    Found(RecordLocation),
    /// Offset just past the last record
    End(u64),
}

/// An open constituent database.
pub struct TideDataDb {
    path: PathBuf,
    kind: DataKind,
    mode: OpenMode,
    state: Mutex<DbState>,
}

impl TideDataDb {
    /// Open an existing database, or create one when `mode` is `ReadWrite` and the
    /// file is missing or empty.
    ///
    /// # Errors
    /// - `InvalidFormat` for a bad signature, version or kind byte
    /// - `IncompatibleType` when the file declares a different [`DataKind`]
    /// - `Io` when the file cannot be opened
    pub fn open<P: AsRef<Path>>(path: P, kind: DataKind, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = match mode {
            OpenMode::ReadOnly => File::open(&path)?,
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?,
        };

        if file.metadata()?.len() == 0 && mode == OpenMode::ReadWrite {
            debug!(path = %path.display(), %kind, "creating new tide database");
            write_preamble(&mut file, kind)?;
        } else {
            validate_preamble(&mut file, kind)?;
        }

        Ok(TideDataDb {
            path,
            kind,
            mode,
            state: Mutex::new(DbState {
                file,
                records: HashMap::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Look up the record of `constituent`.
    ///
    /// Consults the per-handle cache first and otherwise scans from the first record.
    ///
    /// # Errors
    /// - `NotFound` if the scan reaches end-of-file without a match
    /// - `IncompatibleType` for non-constituent databases
    pub fn get_record(&self, constituent: TideConstituent) -> Result<ConstituentRecord<'_>> {
        self.require_constituent_kind()?;
        let mut state = self.lock();
        if let Some(location) = state.records.get(&constituent) {
            debug!(%constituent, offset = location.offset, "record cache hit");
            return Ok(ConstituentRecord {
                db: self,
                location: *location,
            });
        }
        match scan(&mut state, constituent)? {
            ScanOutcome::Found(location) => Ok(ConstituentRecord { db: self, location }),
            ScanOutcome::End(_) => Err(TideError::NotFound(constituent)),
        }
    }

    /// Append a new record header and reserve its payload.
    ///
    /// The declared length is `40 + 6 + width * height * 8`; the file is extended to
    /// cover the whole payload so the record is complete before any cell is written.
    ///
    /// # Errors
    /// - `AlreadyExists` if a record for the constituent is present
    /// - `InvalidGeometry` if the payload does not fit the 32-bit length field
    pub fn create_record(
        &self,
        geometry: GridGeometry,
        units: UnitInfo,
    ) -> Result<ConstituentRecord<'_>> {
        self.require_constituent_kind()?;
        self.require_writable()?;
        if units.constituent == TideConstituent::Unknown {
            return Err(TideError::UnknownConstituent(units.constituent.to_string()));
        }

        let mut state = self.lock();
        if state.records.contains_key(&units.constituent) {
            return Err(TideError::AlreadyExists(units.constituent));
        }
        let offset = match scan(&mut state, units.constituent)? {
            ScanOutcome::Found(_) => return Err(TideError::AlreadyExists(units.constituent)),
            ScanOutcome::End(offset) => offset,
        };

        let length = geometry
            .cell_count()
            .checked_mul(CELL_SIZE)
            .and_then(|payload| payload.checked_add(RECORD_PREFIX_SIZE))
            .and_then(|total| u32::try_from(total).ok())
            .ok_or_else(|| {
                TideError::InvalidGeometry(format!(
                    "{}x{} grid exceeds the record size limit",
                    geometry.width, geometry.height
                ))
            })?;

        let location = RecordLocation {
            offset,
            length,
            geometry,
            units,
        };
        let header = encode_record_prefix(&location);
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(&header)?;
        let end = offset + length as u64;
        if state.file.metadata()?.len() < end {
            state.file.set_len(end)?;
        }
        state.records.insert(units.constituent, location);
        debug!(constituent = %units.constituent, offset, length, "created record");

        Ok(ConstituentRecord {
            db: self,
            location,
        })
    }

    /// Constituents stored in file order.
    pub fn constituents(&self) -> Result<Vec<TideConstituent>> {
        self.require_constituent_kind()?;
        let mut state = self.lock();
        let mut found = Vec::new();
        let mut offset = PREAMBLE_SIZE;
        while let Some(location) = read_location(&mut state.file, offset)? {
            found.push(location.units.constituent);
            state.records.insert(location.units.constituent, location);
            offset += location.length as u64;
        }
        Ok(found)
    }

    /// Flush written data to disk.
    pub fn sync(&self) -> Result<()> {
        self.lock().file.sync_all()?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, DbState> {
        // every operation re-seeks, so a poisoned cursor is harmless
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_constituent_kind(&self) -> Result<()> {
        if self.kind != DataKind::Constituent {
            return Err(TideError::IncompatibleType {
                expected: DataKind::Constituent.to_string(),
                found: self.kind.to_string(),
            });
        }
        Ok(())
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(TideError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "database opened read-only",
            )));
        }
        Ok(())
    }
}

/// Handle to one record for random-access cell reads and writes.
#[derive(Clone, Copy)]
pub struct ConstituentRecord<'db> {
    db: &'db TideDataDb,
    location: RecordLocation,
}

impl<'db> ConstituentRecord<'db> {
    pub fn constituent(&self) -> TideConstituent {
        self.location.units.constituent
    }

    pub fn units(&self) -> UnitInfo {
        self.location.units
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.location.geometry
    }

    /// Byte offset of the record header.
    pub fn offset(&self) -> u64 {
        self.location.offset
    }

    /// Declared total length (header + unit info + payload).
    pub fn length(&self) -> u32 {
        self.location.length
    }

    pub fn read_cell(&self, x: u32, y: u32) -> Result<Cell> {
        let offset = self.cell_offset(x, y)?;
        let mut buf = [0u8; CELL_SIZE as usize];
        {
            let mut state = self.db.lock();
            state.file.seek(SeekFrom::Start(offset))?;
            state.file.read_exact(&mut buf)?;
        }
        Ok(Cell {
            amplitude: BigEndian::read_f32(&buf[0..4]),
            phase: BigEndian::read_f32(&buf[4..8]),
        })
    }

    pub fn write_cell(&self, x: u32, y: u32, cell: Cell) -> Result<()> {
        self.db.require_writable()?;
        let offset = self.cell_offset(x, y)?;
        let mut buf = [0u8; CELL_SIZE as usize];
        BigEndian::write_f32(&mut buf[0..4], cell.amplitude);
        BigEndian::write_f32(&mut buf[4..8], cell.phase);

        let mut state = self.db.lock();
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(&buf)?;
        Ok(())
    }

    /// Write one complete latitude row in a single positioned write.
    pub fn write_row(&self, y: u32, cells: &[Cell]) -> Result<()> {
        self.db.require_writable()?;
        let width = self.location.geometry.width;
        if cells.len() != width as usize {
            return Err(TideError::IndexOutOfRange {
                x: cells.len() as i64,
                y: y as i64,
                width,
                height: self.location.geometry.height,
            });
        }
        let offset = self.cell_offset(0, y)?;
        let mut buf = vec![0u8; cells.len() * CELL_SIZE as usize];
        for (chunk, cell) in buf.chunks_exact_mut(CELL_SIZE as usize).zip(cells) {
            BigEndian::write_f32(&mut chunk[0..4], cell.amplitude);
            BigEndian::write_f32(&mut chunk[4..8], cell.phase);
        }

        let mut state = self.db.lock();
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(&buf)?;
        Ok(())
    }

    fn cell_offset(&self, x: u32, y: u32) -> Result<u64> {
        let geometry = &self.location.geometry;
        geometry.check_index(x, y)?;
        Ok(self.location.payload_start()
            + (y as u64 * geometry.width as u64 + x as u64) * CELL_SIZE)
    }
}

impl fmt::Debug for ConstituentRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstituentRecord")
            .field("constituent", &self.location.units.constituent)
            .field("offset", &self.location.offset)
            .field("length", &self.location.length)
            .field("geometry", &self.location.geometry)
            .finish()
    }
}

fn write_preamble(file: &mut File, kind: DataKind) -> Result<()> {
    let mut preamble = [0u8; PREAMBLE_SIZE as usize];
    preamble[..7].copy_from_slice(&MAGIC);
    preamble[7] = FORMAT_VERSION;
    preamble[8] = kind as u8;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&preamble)?;
    Ok(())
}

fn validate_preamble(file: &mut File, kind: DataKind) -> Result<()> {
    if file.metadata()?.len() < PREAMBLE_SIZE {
        return Err(TideError::InvalidFormat("file shorter than preamble".into()));
    }
    let mut preamble = [0u8; PREAMBLE_SIZE as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut preamble)?;

    if preamble[..7] != MAGIC {
        return Err(TideError::InvalidFormat("bad magic signature".into()));
    }
    if preamble[7] != FORMAT_VERSION {
        return Err(TideError::InvalidFormat(format!(
            "unsupported format version {}",
            preamble[7]
        )));
    }
    let found = DataKind::from_byte(preamble[8]).ok_or_else(|| {
        TideError::InvalidFormat(format!("unknown payload kind {}", preamble[8]))
    })?;
    if found != kind {
        return Err(TideError::IncompatibleType {
            expected: kind.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// Walk the record chain from the first record until `target` or end-of-file.
fn scan(state: &mut DbState, target: TideConstituent) -> Result<ScanOutcome> {
    let mut offset = PREAMBLE_SIZE;
    loop {
        let Some(location) = read_location(&mut state.file, offset)? else {
            return Ok(ScanOutcome::End(offset));
        };
        state.records.insert(location.units.constituent, location);
        if location.units.constituent == target {
            debug!(constituent = %target, offset, "record found by scan");
            return Ok(ScanOutcome::Found(location));
        }
        offset += location.length as u64;
    }
}

/// Decode the record starting at `offset`, or `None` at end-of-file.
fn read_location(file: &mut File, offset: u64) -> Result<Option<RecordLocation>> {
    let file_len = file.metadata()?.len();
    if offset >= file_len {
        return Ok(None);
    }
    if offset + RECORD_PREFIX_SIZE > file_len {
        return Err(TideError::InvalidFormat(format!(
            "truncated record header at offset {offset}"
        )));
    }
    let mut buf = [0u8; RECORD_PREFIX_SIZE as usize];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    decode_record_prefix(offset, &buf).map(Some)
}

fn encode_record_prefix(location: &RecordLocation) -> [u8; RECORD_PREFIX_SIZE as usize] {
    let g = &location.geometry;
    let mut buf = [0u8; RECORD_PREFIX_SIZE as usize];
    BigEndian::write_u32(&mut buf[0..4], location.length);
    BigEndian::write_f32(&mut buf[4..8], g.min_lat);
    BigEndian::write_f32(&mut buf[8..12], g.max_lat);
    BigEndian::write_f32(&mut buf[12..16], g.min_lon);
    BigEndian::write_f32(&mut buf[16..20], g.max_lon);
    BigEndian::write_f32(&mut buf[20..24], g.res_lat);
    BigEndian::write_f32(&mut buf[24..28], g.res_lon);
    BigEndian::write_u32(&mut buf[28..32], g.width);
    BigEndian::write_u32(&mut buf[32..36], g.height);
    BigEndian::write_f32(&mut buf[36..40], g.undef_value);
    BigEndian::write_i32(&mut buf[40..44], location.units.constituent.id());
    buf[44] = location.units.amplitude_unit as u8;
    buf[45] = location.units.phase_unit as u8;
    buf
}

fn decode_record_prefix(offset: u64, buf: &[u8; RECORD_PREFIX_SIZE as usize]) -> Result<RecordLocation> {
    let length = BigEndian::read_u32(&buf[0..4]);
    let geometry = GridGeometry {
        min_lat: BigEndian::read_f32(&buf[4..8]),
        max_lat: BigEndian::read_f32(&buf[8..12]),
        min_lon: BigEndian::read_f32(&buf[12..16]),
        max_lon: BigEndian::read_f32(&buf[16..20]),
        res_lat: BigEndian::read_f32(&buf[20..24]),
        res_lon: BigEndian::read_f32(&buf[24..28]),
        width: BigEndian::read_u32(&buf[28..32]),
        height: BigEndian::read_u32(&buf[32..36]),
        undef_value: BigEndian::read_f32(&buf[36..40]),
    };
    validate_stored_geometry(offset, &geometry)?;

    // a length below the prefix size would never advance the scan
    let expected = geometry
        .cell_count()
        .checked_mul(CELL_SIZE)
        .and_then(|cells| cells.checked_add(RECORD_PREFIX_SIZE))
        .ok_or_else(|| {
            TideError::InvalidFormat(format!(
                "record at offset {offset} declares a {}x{} grid too large to address",
                geometry.width, geometry.height
            ))
        })?;
    if (length as u64) != expected {
        return Err(TideError::InvalidFormat(format!(
            "record at offset {offset} declares length {length}, geometry implies {expected}"
        )));
    }

    let amplitude_unit = AmplitudeUnit::from_byte(buf[44]).ok_or_else(|| {
        TideError::InvalidFormat(format!("unknown amplitude unit {} at offset {offset}", buf[44]))
    })?;
    let phase_unit = PhaseUnit::from_byte(buf[45]).ok_or_else(|| {
        TideError::InvalidFormat(format!("unknown phase unit {} at offset {offset}", buf[45]))
    })?;

    Ok(RecordLocation {
        offset,
        length,
        geometry,
        units: UnitInfo {
            constituent: TideConstituent::from_id(BigEndian::read_i32(&buf[40..44])),
            amplitude_unit,
            phase_unit,
        },
    })
}

/// Reject stored sizes and bounds that `GridGeometry::new` would never produce.
fn validate_stored_geometry(offset: u64, geometry: &GridGeometry) -> Result<()> {
    GridGeometry::new(
        (geometry.min_lat, geometry.max_lat),
        (geometry.min_lon, geometry.max_lon),
        geometry.width,
        geometry.height,
        geometry.undef_value,
    )
    .map(|_| ())
    .map_err(|err| match err {
        TideError::InvalidGeometry(detail) => {
            TideError::InvalidFormat(format!("record at offset {offset}: {detail}"))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn geometry(width: u32, height: u32) -> GridGeometry {
        GridGeometry::new((-60.0, 60.0), (0.0, 350.0), width, height, 999.0).unwrap()
    }

    fn units(constituent: TideConstituent) -> UnitInfo {
        UnitInfo {
            constituent,
            amplitude_unit: AmplitudeUnit::Meter,
            phase_unit: PhaseUnit::Degree,
        }
    }

    #[test]
    fn test_new_file_gets_preamble() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tides.db");
        TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), PREAMBLE_SIZE as usize);
        assert_eq!(&bytes[..7], b"TIDEDAT");
        assert_eq!(bytes[7], FORMAT_VERSION);
        assert_eq!(bytes[8], 0);
        assert_eq!(&bytes[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_cell_roundtrip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let db = TideDataDb::open(dir.path().join("t.db"), DataKind::Constituent, OpenMode::ReadWrite)
            .unwrap();
        let record = db.create_record(geometry(5, 4), units(TideConstituent::M2)).unwrap();

        for y in 0..4 {
            for x in 0..5 {
                let cell = Cell {
                    amplitude: 0.1 * x as f32 + 1.0e-7 * y as f32,
                    phase: 359.999 - (x * y) as f32 / 3.0,
                };
                record.write_cell(x, y, cell).unwrap();
            }
        }
        for y in 0..4 {
            for x in 0..5 {
                let read = record.read_cell(x, y).unwrap();
                let expected_amp = 0.1 * x as f32 + 1.0e-7 * y as f32;
                let expected_phase = 359.999 - (x * y) as f32 / 3.0;
                assert_eq!(read.amplitude.to_bits(), expected_amp.to_bits());
                assert_eq!(read.phase.to_bits(), expected_phase.to_bits());
            }
        }
    }

    #[test]
    fn test_nan_cells_survive_roundtrip() {
        let dir = tempdir().unwrap();
        let db = TideDataDb::open(dir.path().join("t.db"), DataKind::Constituent, OpenMode::ReadWrite)
            .unwrap();
        let record = db.create_record(geometry(2, 2), units(TideConstituent::K1)).unwrap();
        record
            .write_cell(1, 1, Cell { amplitude: f32::NAN, phase: -0.0 })
            .unwrap();
        let read = record.read_cell(1, 1).unwrap();
        assert!(read.amplitude.is_nan());
        assert_eq!(read.phase.to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn test_empty_database_reports_not_found() {
        let dir = tempdir().unwrap();
        let db = TideDataDb::open(dir.path().join("t.db"), DataKind::Constituent, OpenMode::ReadWrite)
            .unwrap();
        for &constituent in TideConstituent::ALL {
            assert!(matches!(
                db.get_record(constituent),
                Err(TideError::NotFound(c)) if c == constituent
            ));
        }
    }

    #[test]
    fn test_duplicate_record_is_rejected_and_original_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
            let record = db.create_record(geometry(3, 3), units(TideConstituent::O1)).unwrap();
            record.write_cell(2, 2, Cell { amplitude: 4.5, phase: 12.0 }).unwrap();
            assert!(matches!(
                db.create_record(geometry(7, 7), units(TideConstituent::O1)),
                Err(TideError::AlreadyExists(TideConstituent::O1))
            ));
        }
        let size_before = std::fs::metadata(&path).unwrap().len();

        // a fresh handle has an empty cache and must find the duplicate by scanning
        let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
        assert!(matches!(
            db.create_record(geometry(7, 7), units(TideConstituent::O1)),
            Err(TideError::AlreadyExists(TideConstituent::O1))
        ));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size_before);

        let record = db.get_record(TideConstituent::O1).unwrap();
        assert_eq!(record.geometry().width, 3);
        assert_eq!(record.read_cell(2, 2).unwrap(), Cell { amplitude: 4.5, phase: 12.0 });
    }

    #[test]
    fn test_linear_scan_over_multiple_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
            for (i, &c) in [TideConstituent::Q1, TideConstituent::M2, TideConstituent::S2]
                .iter()
                .enumerate()
            {
                let record = db.create_record(geometry(3 + i as u32, 2), units(c)).unwrap();
                record
                    .write_cell(0, 1, Cell { amplitude: i as f32, phase: 10.0 * i as f32 })
                    .unwrap();
            }
        }

        let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadOnly).unwrap();
        let s2 = db.get_record(TideConstituent::S2).unwrap();
        assert_eq!(s2.geometry().width, 5);
        assert_eq!(s2.read_cell(0, 1).unwrap(), Cell { amplitude: 2.0, phase: 20.0 });

        let expected_offset = PREAMBLE_SIZE
            + (RECORD_PREFIX_SIZE + 3 * 2 * CELL_SIZE)
            + (RECORD_PREFIX_SIZE + 4 * 2 * CELL_SIZE);
        assert_eq!(s2.offset(), expected_offset);
        assert_eq!(s2.length() as u64, RECORD_PREFIX_SIZE + 5 * 2 * CELL_SIZE);
        assert_eq!(
            db.constituents().unwrap(),
            vec![TideConstituent::Q1, TideConstituent::M2, TideConstituent::S2]
        );
        assert!(matches!(db.get_record(TideConstituent::K1), Err(TideError::NotFound(_))));
    }

    #[test]
    fn test_cell_index_out_of_range() {
        let dir = tempdir().unwrap();
        let db = TideDataDb::open(dir.path().join("t.db"), DataKind::Constituent, OpenMode::ReadWrite)
            .unwrap();
        let record = db.create_record(geometry(4, 3), units(TideConstituent::N2)).unwrap();
        assert!(matches!(
            record.read_cell(4, 0),
            Err(TideError::IndexOutOfRange { x: 4, y: 0, width: 4, height: 3 })
        ));
        assert!(matches!(
            record.write_cell(0, 3, Cell { amplitude: 0.0, phase: 0.0 }),
            Err(TideError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_write_row_matches_cell_reads() {
        let dir = tempdir().unwrap();
        let db = TideDataDb::open(dir.path().join("t.db"), DataKind::Constituent, OpenMode::ReadWrite)
            .unwrap();
        let record = db.create_record(geometry(3, 2), units(TideConstituent::P1)).unwrap();
        let row: Vec<Cell> = (0..3)
            .map(|x| Cell { amplitude: x as f32, phase: 90.0 })
            .collect();
        record.write_row(1, &row).unwrap();
        assert_eq!(record.read_cell(2, 1).unwrap(), Cell { amplitude: 2.0, phase: 90.0 });
        assert!(record.write_row(0, &row[..2]).is_err());
    }

    #[test]
    fn test_bad_magic_is_invalid_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.db");
        std::fs::write(&path, b"NOTATIDEFILE").unwrap();
        assert!(matches!(
            TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadOnly),
            Err(TideError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_kind_mismatch_is_incompatible_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        TideDataDb::open(&path, DataKind::TideValueCache, OpenMode::ReadWrite).unwrap();
        assert!(matches!(
            TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadOnly),
            Err(TideError::IncompatibleType { .. })
        ));

        let cache = TideDataDb::open(&path, DataKind::TideValueCache, OpenMode::ReadOnly).unwrap();
        assert!(matches!(
            cache.get_record(TideConstituent::M2),
            Err(TideError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
            db.create_record(geometry(2, 2), units(TideConstituent::M2)).unwrap();
        }
        let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadOnly).unwrap();
        assert!(matches!(
            db.create_record(geometry(2, 2), units(TideConstituent::S2)),
            Err(TideError::Io(_))
        ));
        let record = db.get_record(TideConstituent::M2).unwrap();
        assert!(record
            .write_cell(0, 0, Cell { amplitude: 1.0, phase: 1.0 })
            .is_err());
    }

    #[test]
    fn test_missing_file_read_only_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            TideDataDb::open(dir.path().join("missing.db"), DataKind::Constituent, OpenMode::ReadOnly),
            Err(TideError::Io(_))
        ));
    }

    #[test]
    fn test_header_roundtrip_through_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let original = geometry(6, 5);
        {
            let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
            db.create_record(
                original,
                UnitInfo {
                    constituent: TideConstituent::M4,
                    amplitude_unit: AmplitudeUnit::Foot,
                    phase_unit: PhaseUnit::Radian,
                },
            )
            .unwrap();
        }
        let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadOnly).unwrap();
        let record = db.get_record(TideConstituent::M4).unwrap();
        assert_eq!(*record.geometry(), original);
        assert_eq!(record.units().amplitude_unit, AmplitudeUnit::Foot);
        assert_eq!(record.units().phase_unit, PhaseUnit::Radian);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            PREAMBLE_SIZE + RECORD_PREFIX_SIZE + 6 * 5 * CELL_SIZE
        );
    }

    #[test]
    fn test_corrupt_length_is_invalid_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
            db.create_record(geometry(2, 2), units(TideConstituent::M2)).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[PREAMBLE_SIZE as usize..PREAMBLE_SIZE as usize + 4].copy_from_slice(&[0, 0, 0, 0]);
        std::fs::write(&path, bytes).unwrap();

        let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadOnly).unwrap();
        assert!(matches!(
            db.get_record(TideConstituent::S2),
            Err(TideError::InvalidFormat(_))
        ));
    }

    /// Rewrite header bytes of the only record in a fresh single-M2 database.
    fn patch_header(patch: impl FnOnce(&mut [u8])) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
            db.create_record(geometry(3, 2), units(TideConstituent::M2)).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let start = PREAMBLE_SIZE as usize;
        patch(&mut bytes[start..start + RECORD_PREFIX_SIZE as usize]);
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    fn lookup_m2(path: &Path) -> Result<()> {
        let db = TideDataDb::open(path, DataKind::Constituent, OpenMode::ReadOnly).unwrap();
        db.get_record(TideConstituent::M2).map(|_| ())
    }

    #[test]
    fn test_oversized_grid_header_is_invalid_format() {
        let (_dir, path) = patch_header(|header| {
            BigEndian::write_u32(&mut header[28..32], u32::MAX);
            BigEndian::write_u32(&mut header[32..36], u32::MAX);
        });
        assert!(matches!(lookup_m2(&path), Err(TideError::InvalidFormat(_))));
    }

    #[test]
    fn test_empty_grid_header_is_invalid_format() {
        // zero columns with a length that matches an empty payload
        let (_dir, path) = patch_header(|header| {
            BigEndian::write_u32(&mut header[0..4], RECORD_PREFIX_SIZE as u32);
            BigEndian::write_u32(&mut header[28..32], 0);
        });
        assert!(matches!(lookup_m2(&path), Err(TideError::InvalidFormat(_))));
    }

    #[test]
    fn test_non_increasing_or_nan_bounds_are_invalid_format() {
        let (_dir, path) = patch_header(|header| {
            BigEndian::write_f32(&mut header[8..12], -60.0);
        });
        assert!(matches!(lookup_m2(&path), Err(TideError::InvalidFormat(_))));

        let (_dir, path) = patch_header(|header| {
            BigEndian::write_f32(&mut header[12..16], f32::NAN);
        });
        assert!(matches!(lookup_m2(&path), Err(TideError::InvalidFormat(_))));
    }
}
