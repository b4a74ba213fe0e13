//! # Scenario Test Suite
//!
//! End-to-end checks that run an atlas through ingestion, storage, interpolation and
//! the solver together, plus argument parsing of the binary. Per-module behaviour is
//! covered by the unit tests next to each module.

mod prediction_tests;
