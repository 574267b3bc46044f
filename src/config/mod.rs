use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SeriesError;

/// One `name/level` token from `var_list`, e.g. `TMP/Z2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarLevel {
    pub name: String,
    pub level: String,
}

impl VarLevel {
    pub fn parse(token: &str) -> std::result::Result<Self, SeriesError> {
        let mut parts = token.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(level), None) if !name.is_empty() && !level.is_empty() => {
                Ok(Self {
                    name: name.to_string(),
                    level: level.to_string(),
                })
            }
            _ => Err(SeriesError::Config(format!(
                "var_list entry '{token}' is not of the form name/level"
            ))),
        }
    }

    /// The original `name/level` token, used verbatim in plot titles.
    pub fn token(&self) -> String {
        format!("{}/{}", self.name, self.level)
    }

    /// Value bound to the NAME environment variable of series_analysis.
    /// Fields regridded by the MET tool are stored as `<name>_<level>`, so
    /// the downstream config must look them up under that composed name.
    pub fn series_name(&self, regrid_with_met_tool: bool) -> String {
        if regrid_with_met_tool {
            format!("{}_{}", self.name, self.level)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Ordered `name/level` tokens to run the series analysis over.
    pub var_list: Vec<String>,
    /// Ordered statistic names; one plot is produced per statistic.
    pub stat_list: Vec<String>,
    /// True when tiles were regridded with the MET regrid_data_plane tool
    /// (NetCDF naming convention) rather than wgrib2 (grib2 convention).
    #[serde(default)]
    pub regrid_with_met_tool: bool,

    /// Source tree of extracted n x m tiles, one subdirectory per init time.
    pub extract_tiles_dir: PathBuf,
    /// Canonical output tree: `<series_out_dir>/<init>/<storm>/`.
    pub series_out_dir: PathBuf,
    /// Destination for tiles that survive storm-track filtering.
    pub series_filtered_out_dir: PathBuf,
    /// Extra arguments for the tc_stat filter job. Empty disables filtering.
    #[serde(default)]
    pub series_filter_opts: String,
    pub tmp_dir: PathBuf,

    /// MET installation root; tool binaries live under `bin/`.
    pub met_build_base: PathBuf,
    /// Config file handed to series_analysis via -config.
    pub series_config_file: PathBuf,
    #[serde(default = "default_convert_exe")]
    pub convert_exe: PathBuf,
    /// Draw the background map in plots instead of suppressing map data.
    #[serde(default)]
    pub background_map: bool,

    #[serde(default = "default_fcst_tile_regex")]
    pub fcst_tile_regex: String,
    #[serde(default = "default_anly_tile_regex")]
    pub anly_tile_regex: String,
    #[serde(default = "default_fcst_nc_tile_regex")]
    pub fcst_nc_tile_regex: String,
    #[serde(default = "default_anly_nc_tile_regex")]
    pub anly_nc_tile_regex: String,
}

fn default_convert_exe() -> PathBuf {
    PathBuf::from("convert")
}

fn default_fcst_tile_regex() -> String {
    ".*FCST_TILE_F.*grb2".to_string()
}

fn default_anly_tile_regex() -> String {
    ".*ANLY_TILE_F.*grb2".to_string()
}

fn default_fcst_nc_tile_regex() -> String {
    ".*FCST_TILE_F.*nc".to_string()
}

fn default_anly_nc_tile_regex() -> String {
    ".*ANLY_TILE_F.*nc".to_string()
}

impl SeriesConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SeriesConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.var_list.is_empty() {
            bail!("var_list must not be empty");
        }
        if self.stat_list.is_empty() {
            bail!("stat_list must not be empty");
        }
        for token in &self.var_list {
            VarLevel::parse(token)?;
        }
        for pattern in [
            &self.fcst_tile_regex,
            &self.anly_tile_regex,
            &self.fcst_nc_tile_regex,
            &self.anly_nc_tile_regex,
        ] {
            Regex::new(pattern).with_context(|| format!("Invalid tile pattern '{pattern}'"))?;
        }
        Ok(())
    }

    pub fn vars(&self) -> std::result::Result<Vec<VarLevel>, SeriesError> {
        self.var_list.iter().map(|t| VarLevel::parse(t)).collect()
    }

    pub fn series_analysis_exe(&self) -> PathBuf {
        self.met_build_base.join("bin/series_analysis")
    }

    pub fn plot_data_plane_exe(&self) -> PathBuf {
        self.met_build_base.join("bin/plot_data_plane")
    }

    pub fn tc_stat_exe(&self) -> PathBuf {
        self.met_build_base.join("bin/tc_stat")
    }

    /// Tile patterns are selected by how the tiles were regridded, which
    /// determines their format suffix.
    pub fn fcst_tile_pattern(&self) -> &str {
        if self.regrid_with_met_tool {
            &self.fcst_nc_tile_regex
        } else {
            &self.fcst_tile_regex
        }
    }

    pub fn anly_tile_pattern(&self) -> &str {
        if self.regrid_with_met_tool {
            &self.anly_nc_tile_regex
        } else {
            &self.anly_tile_regex
        }
    }

    /// STAT_LIST value interpolated by the series_analysis config file. The
    /// tool only accepts double-quoted strings, and historical runs used a
    /// `", "` separator, so the format is fixed.
    pub fn stat_list_env(&self) -> String {
        let quoted: Vec<String> = self.stat_list.iter().map(|s| format!("\"{s}\"")).collect();
        format!("[{}]", quoted.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
            var_list = ["TMP/Z2", "HGT/P500"]
            stat_list = ["TOTAL", "FBAR"]
            extract_tiles_dir = "/d/extract"
            series_out_dir = "/d/series_init"
            series_filtered_out_dir = "/d/series_filtered"
            tmp_dir = "/tmp"
            met_build_base = "/usr/local/met"
            series_config_file = "/d/conf/SeriesAnalysisConfig"
        "#
        .to_string()
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: SeriesConfig = toml::from_str(&minimal_toml()).unwrap();
        config.validate().unwrap();
        assert!(!config.regrid_with_met_tool);
        assert!(!config.background_map);
        assert!(config.series_filter_opts.is_empty());
        assert_eq!(config.fcst_tile_regex, ".*FCST_TILE_F.*grb2");
        assert_eq!(config.convert_exe, PathBuf::from("convert"));
        assert_eq!(
            config.series_analysis_exe(),
            PathBuf::from("/usr/local/met/bin/series_analysis")
        );
    }

    #[test]
    fn tile_pattern_follows_regrid_flag() {
        let mut config: SeriesConfig = toml::from_str(&minimal_toml()).unwrap();
        assert_eq!(config.fcst_tile_pattern(), ".*FCST_TILE_F.*grb2");
        assert_eq!(config.anly_tile_pattern(), ".*ANLY_TILE_F.*grb2");
        config.regrid_with_met_tool = true;
        assert_eq!(config.fcst_tile_pattern(), ".*FCST_TILE_F.*nc");
        assert_eq!(config.anly_tile_pattern(), ".*ANLY_TILE_F.*nc");
    }

    #[test]
    fn stat_list_env_is_double_quoted_with_spaces() {
        let config: SeriesConfig = toml::from_str(&minimal_toml()).unwrap();
        assert_eq!(config.stat_list_env(), r#"["TOTAL", "FBAR"]"#);
    }

    #[test]
    fn var_level_parses_name_and_level() {
        let var = VarLevel::parse("TMP/Z2").unwrap();
        assert_eq!(var.name, "TMP");
        assert_eq!(var.level, "Z2");
        assert_eq!(var.token(), "TMP/Z2");
    }

    #[test]
    fn var_level_rejects_malformed_tokens() {
        assert!(VarLevel::parse("TMP").is_err());
        assert!(VarLevel::parse("TMP/").is_err());
        assert!(VarLevel::parse("/Z2").is_err());
        assert!(VarLevel::parse("TMP/Z2/extra").is_err());
    }

    #[test]
    fn series_name_composes_level_under_met_regridding() {
        let var = VarLevel::parse("TMP/Z2").unwrap();
        assert_eq!(var.series_name(false), "TMP");
        assert_eq!(var.series_name(true), "TMP_Z2");
    }

    #[test]
    fn validate_rejects_empty_lists_and_bad_vars() {
        let mut config: SeriesConfig = toml::from_str(&minimal_toml()).unwrap();
        config.var_list.clear();
        assert!(config.validate().is_err());

        let mut config: SeriesConfig = toml::from_str(&minimal_toml()).unwrap();
        config.var_list = vec!["no_level".to_string()];
        assert!(config.validate().is_err());

        let mut config: SeriesConfig = toml::from_str(&minimal_toml()).unwrap();
        config.fcst_tile_regex = "[".to_string();
        assert!(config.validate().is_err());
    }
}
