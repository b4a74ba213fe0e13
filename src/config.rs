//! # Configuration Management
//!
//! Loads runtime settings from `tide-predictor.toml`: where the constituent database
//! lives, which solver to run and the default datum scan window. Command-line flags
//! override individual values.

use crate::datums::ScanWindow;
use crate::error::Result;
use crate::long_period::LongPeriodLatitude;
use crate::solver::{Solver, SolverOptions};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "tide-predictor.toml";

/// Application configuration loaded from tide-predictor.toml
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub solver: SolverConfig,
    pub datums: DatumConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Constituent database built with `tide-predictor build`
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SolverConfig {
    pub name: Solver,
    /// Latitude used for the long-period tide: "zero" or "site"
    pub long_period_latitude: LongPeriodLatitude,
}

/// Window for LAT / HAT / MSL scans
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DatumConfig {
    /// First year scanned (from 1 January)
    pub start_year: i32,
    /// Scan stops at 1 January of this year
    pub end_year: i32,
    pub step_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                path: PathBuf::from("tides.db"),
            },
            solver: SolverConfig {
                name: Solver::Perth3,
                long_period_latitude: LongPeriodLatitude::Zero,
            },
            datums: DatumConfig {
                start_year: 2000,
                end_year: 2020,
                step_minutes: 15,
            },
        }
    }
}

impl SolverConfig {
    pub fn options(&self) -> SolverOptions {
        SolverOptions {
            long_period_latitude: self.long_period_latitude,
        }
    }
}

impl DatumConfig {
    pub fn window(&self) -> Result<ScanWindow> {
        ScanWindow::years(self.start_year, self.end_year, self.step_minutes)
    }
}

impl Config {
    /// Load configuration from tide-predictor.toml in the working directory
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), database = %config.database.path.display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to tide-predictor.toml
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_path(CONFIG_FILE)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).context("serialize configuration")?;
        fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }
}
