//! # Atlas-to-Prediction Scenarios
//!
//! Each test writes a small DTU-style ASCII atlas (3 latitude rows by 4 longitude
//! columns, 60° by 90° spacing), builds a database from it on disk and predicts from
//! that database.

use approx::assert_abs_diff_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt::Write as _;
use std::fs;
use tempfile::{tempdir, TempDir};
use tide_predictor_lib::arguments::SLOT_COUNT;
use tide_predictor_lib::constituent::{AmplitudeUnit, PhaseUnit};
use tide_predictor_lib::database::{Cell, UnitInfo};
use tide_predictor_lib::datums::{predict_series, scan_datums, CancelToken, ScanWindow};
use tide_predictor_lib::dtu_ascii::DtuAsciiReader;
use tide_predictor_lib::ingest::{build_database, BuildUnits};
use tide_predictor_lib::grid::GridGeometry;
use tide_predictor_lib::interpolate::{interpolate_record, Harmonic, Wraparound};
use tide_predictor_lib::solver::MAJOR_CONSTITUENTS;
use tide_predictor_lib::{
    solve, DataKind, LocationHarmonics, OpenMode, SolverOptions, TideConstituent, TideDataDb, TideError,
};

const ROWS: usize = 3;
const COLS: usize = 4;
const UNDEF: f32 = 999.0;

fn grid_block(constituent: TideConstituent, kind: &str, values: &[f32]) -> String {
    assert_eq!(values.len(), ROWS * COLS);
    let mut text = format!(
        "{} {kind} test atlas\n{kind} grid\n {ROWS} {COLS}\n -60.0 60.0\n 0.0 270.0\n {UNDEF}\n({COLS}f9.4)\n",
        constituent.name()
    );
    for row in values.chunks(COLS) {
        for value in row {
            write!(text, " {value}").unwrap();
        }
        text.push('\n');
    }
    text
}

/// Amplitude (metres) and phase (degrees) used for every cell of a uniform constituent.
fn uniform(index: usize) -> (f32, f32) {
    (0.1 * (index + 1) as f32, 20.0 * index as f32)
}

/// Atlas text for the majors, uniform except where `custom` supplies both grids.
fn atlas(
    constituents: &[TideConstituent],
    custom: &dyn Fn(TideConstituent) -> Option<(Vec<f32>, Vec<f32>)>,
) -> String {
    let mut text = String::new();
    for (index, &constituent) in constituents.iter().enumerate() {
        let (amplitudes, phases) = custom(constituent).unwrap_or_else(|| {
            let (amplitude, phase) = uniform(index);
            (vec![amplitude; ROWS * COLS], vec![phase; ROWS * COLS])
        });
        text += &grid_block(constituent, "amplitude", &amplitudes);
        text.push('\n');
        text += &grid_block(constituent, "phase", &phases);
    }
    text
}

fn majors() -> Vec<TideConstituent> {
    MAJOR_CONSTITUENTS.iter().map(|&(constituent, _)| constituent).collect()
}

/// Write `text` as an atlas, build a database next to it and reopen it read-only.
fn build(dir: &TempDir, text: &str) -> TideDataDb {
    let atlas_path = dir.path().join("atlas.asc");
    let db_path = dir.path().join("atlas.db");
    fs::write(&atlas_path, text).unwrap();
    {
        let db = TideDataDb::open(&db_path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
        let mut reader = DtuAsciiReader::open(&atlas_path).unwrap();
        build_database(&mut reader, &db, BuildUnits::default()).unwrap();
        db.sync().unwrap();
    }
    TideDataDb::open(&db_path, DataKind::Constituent, OpenMode::ReadOnly).unwrap()
}

fn times() -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2016, 2, 29, 6, 30, 0).unwrap();
    (0..12).map(|i| start + Duration::hours(7 * i)).collect()
}

/// Heights from the stored atlas match heights from the same constants held in memory.
#[test]
fn database_prediction_matches_in_memory_constants() {
    let dir = tempdir().unwrap();
    let db = build(&dir, &atlas(&majors(), &|_| None));

    let mut slots = [Harmonic::default(); SLOT_COUNT];
    for (index, &(_, slot)) in MAJOR_CONSTITUENTS.iter().enumerate() {
        let (amplitude, phase) = uniform(index);
        slots[slot] = Harmonic::from_polar(amplitude as f64 * 100.0, phase as f64);
    }
    let expected = LocationHarmonics::from_major_slots(12.3, 45.6, slots);
    let stored = LocationHarmonics::at(&db, 12.3, 45.6).unwrap();

    let options = SolverOptions::default();
    for time in times() {
        assert_abs_diff_eq!(stored.height_at(time, &options), expected.height_at(time, &options), epsilon = 1e-9);
    }
}

/// Repeated solves of the same query are bit-identical.
#[test]
fn solves_are_deterministic() {
    let dir = tempdir().unwrap();
    let db = build(&dir, &atlas(&majors(), &|_| None));
    for time in times() {
        let first = solve(&db, 37.010503, -8.962977, time).unwrap();
        let second = solve(&db, 37.010503, -8.962977, time).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
        assert!(first.is_finite());
    }
}

/// Opposed phases around a cell cancel at its centre because blending happens on
/// the cosine and sine components rather than on amplitude and phase.
#[test]
fn opposed_phases_cancel_at_cell_centre() {
    let dir = tempdir().unwrap();
    let text = atlas(&majors(), &|constituent| {
        (constituent == TideConstituent::M2).then(|| {
            let mut phases = vec![0.0; ROWS * COLS];
            // cell (0,0)-(1,1): 0°, 90° on the south edge, 270°, 180° on the north edge
            phases[1] = 90.0;
            phases[COLS] = 270.0;
            phases[COLS + 1] = 180.0;
            (vec![1.0; ROWS * COLS], phases)
        })
    });
    let db = build(&dir, &text);

    let harmonics = LocationHarmonics::at(&db, -30.0, 45.0).unwrap();
    assert!(harmonics.slots()[5].amplitude() < 1e-9);

    // on a vertex the stored constant comes back unchanged
    let vertex = LocationHarmonics::at(&db, 0.0, 90.0).unwrap();
    assert_abs_diff_eq!(vertex.slots()[5].amplitude(), 100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(vertex.slots()[5].phase(), 180.0, epsilon = 1e-9);
}

/// One 2x2 M2 cell with unit amplitude, phases 0° on the south row and 180° on the
/// north row: the centre of the cell has no M2 tide at all.
#[test]
fn single_cell_with_opposed_rows_has_no_tide_at_centre() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cell.db");
    let db = TideDataDb::open(&path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
    let geometry = GridGeometry::new((-1.0, 1.0), (0.0, 1.0), 2, 2, UNDEF).unwrap();
    let record = db
        .create_record(
            geometry,
            UnitInfo {
                constituent: TideConstituent::M2,
                amplitude_unit: AmplitudeUnit::Meter,
                phase_unit: PhaseUnit::Degree,
            },
        )
        .unwrap();
    let south = Cell { amplitude: 1.0, phase: 0.0 };
    let north = Cell { amplitude: 1.0, phase: 180.0 };
    record.write_row(0, &[south, south]).unwrap();
    record.write_row(1, &[north, north]).unwrap();

    let centre = interpolate_record(&record, 0.0, 0.5, Wraparound::Global).unwrap();
    assert!(centre.amplitude() < 1e-9);

    let corner = interpolate_record(&record, 1.0, 1.0, Wraparound::Global).unwrap();
    assert_abs_diff_eq!(corner.phase(), 180.0, epsilon = 1e-9);
}

/// Longitudes east of the last column blend with column 0, however they are written.
#[test]
fn longitude_wraps_past_last_column() {
    let dir = tempdir().unwrap();
    let text = atlas(&majors(), &|constituent| {
        (constituent == TideConstituent::K1).then(|| {
            let amplitudes = (0..ROWS * COLS).map(|i| (i % COLS) as f32 + 1.0).collect();
            (amplitudes, vec![0.0; ROWS * COLS])
        })
    });
    let db = build(&dir, &text);

    let east = LocationHarmonics::at(&db, 0.0, 315.0).unwrap();
    let west = LocationHarmonics::at(&db, 0.0, -45.0).unwrap();
    assert_eq!(east.slots(), west.slots());
    // halfway between column 3 (4 m) and column 0 (1 m)
    assert_abs_diff_eq!(east.slots()[3].hcos, 250.0, epsilon = 1e-9);
    assert_abs_diff_eq!(west.slots()[3].hcos, 250.0, epsilon = 1e-9);
}

/// A missing major constituent is reported, not replaced by zero.
#[test]
fn missing_major_constituent_is_not_found() {
    let dir = tempdir().unwrap();
    let without_s1: Vec<_> = majors().into_iter().filter(|&c| c != TideConstituent::S1).collect();
    let db = build(&dir, &atlas(&without_s1, &|_| None));
    assert!(matches!(
        LocationHarmonics::at(&db, 0.0, 0.0),
        Err(TideError::NotFound(TideConstituent::S1))
    ));
}

/// Land cells reach the height as NaN; zero-weight neighbours do not.
#[test]
fn undefined_cells_propagate_as_nan() {
    let dir = tempdir().unwrap();
    let text = atlas(&majors(), &|constituent| {
        (constituent == TideConstituent::O1).then(|| {
            let mut amplitudes = vec![0.2; ROWS * COLS];
            amplitudes[COLS + 1] = UNDEF;
            (amplitudes, vec![10.0; ROWS * COLS])
        })
    });
    let db = build(&dir, &text);
    let time = times()[0];

    let wet = solve(&db, -60.0, 0.0, time).unwrap();
    assert!(wet.is_finite());
    let touching_land = solve(&db, -30.0, 45.0, time).unwrap();
    assert!(touching_land.is_nan());

    let harmonics = LocationHarmonics::at(&db, 0.0, 90.0).unwrap();
    let window = ScanWindow::new(time, time + Duration::days(1), Duration::hours(1)).unwrap();
    let datums = scan_datums(&harmonics, &window, &SolverOptions::default(), &CancelToken::new()).unwrap();
    assert!(datums.lowest.is_nan() && datums.highest.is_nan());
}

/// Building the same atlas twice keeps the first records.
#[test]
fn rebuilding_rejects_duplicates() {
    let dir = tempdir().unwrap();
    let text = atlas(&majors(), &|_| None);
    let db = build(&dir, &text);
    let mut stored = db.constituents().unwrap();
    stored.sort();
    let mut expected = majors();
    expected.sort();
    assert_eq!(stored, expected);
    drop(db);

    let db_path = dir.path().join("atlas.db");
    let db = TideDataDb::open(&db_path, DataKind::Constituent, OpenMode::ReadWrite).unwrap();
    let mut reader = DtuAsciiReader::open(dir.path().join("atlas.asc")).unwrap();
    assert!(matches!(
        build_database(&mut reader, &db, BuildUnits::default()),
        Err(TideError::AlreadyExists(TideConstituent::Q1))
    ));
    assert_eq!(db.constituents().unwrap().len(), MAJOR_CONSTITUENTS.len());
}

/// Datums over a database agree with the series predicted over the same window.
#[test]
fn datum_scan_over_database() {
    let dir = tempdir().unwrap();
    let db = build(&dir, &atlas(&majors(), &|_| None));
    let harmonics = LocationHarmonics::at(&db, 37.010503, -8.962977).unwrap();
    let window = ScanWindow::new(
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 4, 0, 0, 0).unwrap(),
        Duration::minutes(30),
    )
    .unwrap();
    let options = SolverOptions::default();
    let cancel = CancelToken::new();

    let datums = scan_datums(&harmonics, &window, &options, &cancel).unwrap();
    let series = predict_series(&harmonics, &window, &options, &cancel).unwrap();
    assert_eq!(series.samples.len(), 144);
    assert_eq!(datums.samples, 144);
    assert_eq!(series.lowest().unwrap().height_cm, datums.lowest);
    assert_eq!(series.highest().unwrap().height_cm, datums.highest);
    assert!(datums.lowest < datums.mean && datums.mean < datums.highest);
}
