//! Plot generation from series_analysis output.
//!
//! One Postscript plot per (variable, init time, storm, statistic) via the
//! external plot_data_plane tool, each flattened and rotated into a PNG via
//! ImageMagick convert. Titles embed the forecast tile count and the first
//! and last forecast-hour tokens of the lexicographically sorted filenames;
//! historical plots were named and titled from that sort order, so it is
//! never replaced with a numeric sort.

use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{error, warn};

use crate::config::SeriesConfig;
use crate::error::{Result, SeriesError};
use crate::fileset;
use crate::subprocess::{ProcessCommand, SubprocessManager};

/// Forecast tile count and forecast-hour range for one (init, storm) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcstFileInfo {
    pub count: usize,
    pub first_hour: String,
    pub last_hour: String,
}

pub struct PlotGenerator<'a> {
    config: &'a SeriesConfig,
    subprocess: &'a SubprocessManager,
}

impl<'a> PlotGenerator<'a> {
    pub fn new(config: &'a SeriesConfig, subprocess: &'a SubprocessManager) -> Self {
        Self { config, subprocess }
    }

    pub async fn generate(&self, sorted_init: &[String], tile_dir: &Path) -> Result<()> {
        let vars = self.config.vars()?;
        let tile_pattern = fileset::compile(self.fcst_tile_pattern())?;
        let hour_pattern = fileset::compile(self.fcst_hour_pattern())?;
        let plot_exe = self.config.plot_data_plane_exe();

        for var in &vars {
            for init in sorted_init {
                let storms = fileset::storms_for_init(tile_dir, init)?;
                for storm in storms {
                    let plot_dir = self.config.series_out_dir.join(init).join(&storm);
                    fs::create_dir_all(&plot_dir).map_err(|e| SeriesError::io(&plot_dir, e))?;

                    let info =
                        self.fcst_file_info(tile_dir, init, &storm, &tile_pattern, &hour_pattern)?;
                    let input = plot_dir.join(format!("series_{}_{}.nc", var.name, var.level));

                    for stat in &self.config.stat_list {
                        let ps_path = plot_dir
                            .join(format!("series_{}_{}_{}.ps", var.name, var.level, stat));
                        let title = plot_title(init, &storm, &info, stat, &var.token());
                        let field = field_spec(stat, &var.level, self.config.background_map);

                        let mut env = std::collections::HashMap::new();
                        env.insert("CUR_STAT".to_string(), stat.clone());
                        env.insert("STAT_LIST".to_string(), self.config.stat_list_env());

                        let plot = ProcessCommand {
                            program: plot_exe.to_string_lossy().into_owned(),
                            args: vec![
                                input.to_string_lossy().into_owned(),
                                ps_path.to_string_lossy().into_owned(),
                                field,
                                "-title".to_string(),
                                title,
                            ],
                            env,
                            working_dir: None,
                        };
                        let output = self.subprocess.runner().run(plot).await?;
                        if !output.status.success() {
                            warn!(
                                "plot_data_plane failed for {} (status {:?})",
                                ps_path.display(),
                                output.status
                            );
                        }

                        let png_path = ps_path.with_extension("png");
                        let convert = ProcessCommand {
                            program: self.config.convert_exe.to_string_lossy().into_owned(),
                            args: vec![
                                "-rotate".to_string(),
                                "90".to_string(),
                                "-background".to_string(),
                                "white".to_string(),
                                "-flatten".to_string(),
                                ps_path.to_string_lossy().into_owned(),
                                png_path.to_string_lossy().into_owned(),
                            ],
                            env: Default::default(),
                            working_dir: None,
                        };
                        let output = self.subprocess.runner().run(convert).await?;
                        if !output.status.success() {
                            warn!(
                                "convert failed for {} (status {:?})",
                                png_path.display(),
                                output.status
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Count, first and last forecast-hour tokens of the forecast tiles for
    /// one (init, storm) pair. No matching files, or a filename without the
    /// expected hour token, is a naming-convention violation and fatal:
    /// unlike missing tiles elsewhere, a plot produced from a misread range
    /// would silently misrepresent the data.
    pub fn fcst_file_info(
        &self,
        dir_to_search: &Path,
        init: &str,
        storm: &str,
        tile_pattern: &Regex,
        hour_pattern: &Regex,
    ) -> Result<FcstFileInfo> {
        let gridded_dir = dir_to_search.join(init).join(storm);
        let files = fileset::get_files(&gridded_dir, tile_pattern)?;

        if files.is_empty() {
            error!(
                "No forecast files found for init time {init} under {}",
                gridded_dir.display()
            );
            return Err(SeriesError::NoForecastFiles(gridded_dir));
        }

        // get_files returns lexicographically sorted paths
        let first = extract_hour(hour_pattern, &files[0])?;
        let last = extract_hour(hour_pattern, &files[files.len() - 1])?;
        Ok(FcstFileInfo {
            count: files.len(),
            first_hour: first,
            last_hour: last,
        })
    }

    fn fcst_tile_pattern(&self) -> &'static str {
        if self.config.regrid_with_met_tool {
            ".*FCST_TILE.*nc"
        } else {
            ".*FCST_TILE.*grb2"
        }
    }

    fn fcst_hour_pattern(&self) -> &'static str {
        if self.config.regrid_with_met_tool {
            r".*FCST_TILE_(F[0-9]{3}).*nc"
        } else {
            r".*FCST_TILE_(F[0-9]{3}).*grb2"
        }
    }
}

fn extract_hour(pattern: &Regex, path: &Path) -> Result<String> {
    let name = path.to_string_lossy();
    pattern
        .captures(&name)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            error!("Unexpected file format encountered: {name}");
            SeriesError::UnexpectedFilename(name.into_owned())
        })
}

/// Title for one plot, embedding the forecast count and hour range.
pub fn plot_title(
    init: &str,
    storm: &str,
    info: &FcstFileInfo,
    stat: &str,
    var_token: &str,
) -> String {
    format!(
        "GFS Init {init} Storm {storm} {count} Forecasts ({beg} to {end}),{stat} for {var_token}",
        count = info.count,
        beg = info.first_hour,
        end = info.last_hour,
    )
}

/// Field specifier for plot_data_plane. Without a background map the map
/// data source list is emptied explicitly.
pub fn field_spec(stat: &str, level: &str, background_map: bool) -> String {
    let base = format!("name=\"series_cnt_{stat}\";level=\"{level}\";");
    if background_map {
        base
    } else {
        format!("{base} map_data={{ source=[];}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeriesConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> SeriesConfig {
        SeriesConfig {
            var_list: vec!["TMP/Z2".to_string()],
            stat_list: vec!["TOTAL".to_string()],
            regrid_with_met_tool: false,
            extract_tiles_dir: root.join("extract"),
            series_out_dir: root.join("series_init"),
            series_filtered_out_dir: root.join("series_filtered"),
            series_filter_opts: String::new(),
            tmp_dir: root.join("tmp"),
            met_build_base: PathBuf::from("/met"),
            series_config_file: root.join("SeriesAnalysisConfig"),
            convert_exe: PathBuf::from("convert"),
            background_map: false,
            fcst_tile_regex: ".*FCST_TILE_F.*grb2".to_string(),
            anly_tile_regex: ".*ANLY_TILE_F.*grb2".to_string(),
            fcst_nc_tile_regex: ".*FCST_TILE_F.*nc".to_string(),
            anly_nc_tile_regex: ".*ANLY_TILE_F.*nc".to_string(),
        }
    }

    fn touch(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn title_embeds_count_and_hour_range() {
        let info = FcstFileInfo {
            count: 2,
            first_hour: "F000".to_string(),
            last_hour: "F024".to_string(),
        };
        let title = plot_title("20200825_00", "AL012020", &info, "TOTAL", "TMP/Z2");
        assert_eq!(
            title,
            "GFS Init 20200825_00 Storm AL012020 2 Forecasts (F000 to F024),TOTAL for TMP/Z2"
        );
    }

    #[test]
    fn field_spec_suppresses_map_data_unless_requested() {
        assert_eq!(
            field_spec("TOTAL", "Z2", false),
            "name=\"series_cnt_TOTAL\";level=\"Z2\"; map_data={ source=[];}"
        );
        assert_eq!(
            field_spec("TOTAL", "Z2", true),
            "name=\"series_cnt_TOTAL\";level=\"Z2\";"
        );
    }

    #[test]
    fn fcst_file_info_counts_and_brackets_sorted_files() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path());
        let (subprocess, _mock) = SubprocessManager::mock();
        let plotter = PlotGenerator::new(&config, &subprocess);

        let storm_dir = dir.path().join("tiles/20200825_00/AL012020");
        touch(&storm_dir.join("FCST_TILE_F024_gfs_AL012020.grb2"), "x");
        touch(&storm_dir.join("FCST_TILE_F000_gfs_AL012020.grb2"), "x");
        touch(&storm_dir.join("FCST_TILE_F012_gfs_AL012020.grb2"), "x");

        let tile = fileset::compile(".*FCST_TILE.*grb2").unwrap();
        let hour = fileset::compile(r".*FCST_TILE_(F[0-9]{3}).*grb2").unwrap();
        let info = plotter
            .fcst_file_info(&dir.path().join("tiles"), "20200825_00", "AL012020", &tile, &hour)
            .unwrap();

        assert_eq!(
            info,
            FcstFileInfo {
                count: 3,
                first_hour: "F000".to_string(),
                last_hour: "F024".to_string(),
            }
        );
    }

    #[test]
    fn fcst_file_info_without_files_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path());
        let (subprocess, _mock) = SubprocessManager::mock();
        let plotter = PlotGenerator::new(&config, &subprocess);

        let tile = fileset::compile(".*FCST_TILE.*grb2").unwrap();
        let hour = fileset::compile(r".*FCST_TILE_(F[0-9]{3}).*grb2").unwrap();
        let err = plotter
            .fcst_file_info(&dir.path().join("tiles"), "20200825_00", "AL012020", &tile, &hour)
            .unwrap_err();
        assert!(matches!(err, SeriesError::NoForecastFiles(_)));
    }

    #[test]
    fn malformed_hour_token_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path());
        let (subprocess, _mock) = SubprocessManager::mock();
        let plotter = PlotGenerator::new(&config, &subprocess);

        let storm_dir = dir.path().join("tiles/20200825_00/AL012020");
        // hour token only two digits wide, violating the convention
        touch(&storm_dir.join("FCST_TILE_F24_gfs_AL012020.grb2"), "x");

        let tile = fileset::compile(".*FCST_TILE.*grb2").unwrap();
        let hour = fileset::compile(r".*FCST_TILE_(F[0-9]{3}).*grb2").unwrap();
        let err = plotter
            .fcst_file_info(&dir.path().join("tiles"), "20200825_00", "AL012020", &tile, &hour)
            .unwrap_err();
        assert!(matches!(err, SeriesError::UnexpectedFilename(_)));
    }
}
