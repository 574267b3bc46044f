//! # stormseries
//!
//! Orchestrates a series analysis of storm tiles by model initialization
//! time. The pipeline filters storm-track data when requested, builds ASCII
//! manifests of gridded forecast/analysis tiles, runs the external
//! `series_analysis` tool per (init time, storm, variable), and renders the
//! resulting NetCDF output into Postscript and PNG plots via the external
//! `plot_data_plane` and ImageMagick `convert` tools.
//!
//! All heavy computation lives in those external tools; this crate is file
//! discovery, command assembly, and sequencing.
//!
//! ## Modules
//!
//! - `config` - Typed configuration loaded from a TOML file
//! - `fileset` - Recursive file discovery and classification by naming convention
//! - `manifest` - ASCII manifest construction for forecast/analysis tiles
//! - `command` - Assembly of external tool invocations
//! - `filter` - Optional storm-track filtering via the tc_stat tool
//! - `pipeline` - The sequential stage loop driving a full run
//! - `plot` - Plot title derivation and plot/convert invocations
//! - `subprocess` - Subprocess abstraction layer with a mock runner for tests
pub mod command;
pub mod config;
pub mod error;
pub mod fileset;
pub mod filter;
pub mod manifest;
pub mod pipeline;
pub mod plot;
pub mod subprocess;
