//! Optional storm-track filtering via the external tc_stat tool.
//!
//! For each init time a tc_stat filter job is run against the source tiles;
//! the tiles of every storm surviving the filter are copied into the
//! filtered tree, which then replaces the source tree as series input. A
//! filter that matches nothing is an explicit, non-fatal fallback handled by
//! the caller.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::SeriesConfig;
use crate::error::{Result, SeriesError};
use crate::fileset;
use crate::subprocess::{ProcessCommand, SubprocessManager};

pub struct SeriesFilter<'a> {
    config: &'a SeriesConfig,
    subprocess: &'a SubprocessManager,
}

impl<'a> SeriesFilter<'a> {
    pub fn new(config: &'a SeriesConfig, subprocess: &'a SubprocessManager) -> Self {
        Self { config, subprocess }
    }

    /// Runs one tc_stat filter job per init time, then copies the tiles of
    /// every surviving storm into the filtered tree. A failed or empty
    /// filter for an init time is logged and skipped, never fatal.
    pub async fn apply(&self, tile_dir: &Path, init_times: &[String]) -> Result<()> {
        let extra_opts = shell_words::split(&self.config.series_filter_opts).map_err(|e| {
            SeriesError::Config(format!(
                "series_filter_opts is not splittable into arguments: {e}"
            ))
        })?;

        // per-run scratch dir for tc_stat
        let scratch = self.config.tmp_dir.join(std::process::id().to_string());
        fs::create_dir_all(&scratch).map_err(|e| SeriesError::io(&scratch, e))?;

        for init in init_times {
            let init_dir = self.config.series_filtered_out_dir.join(init);
            fs::create_dir_all(&init_dir).map_err(|e| SeriesError::io(&init_dir, e))?;
            let filter_file = init_dir.join(format!("filter_{init}.tcst"));

            let mut args = vec![
                "-job".to_string(),
                "filter".to_string(),
                "-lookin".to_string(),
                tile_dir.join(init).to_string_lossy().into_owned(),
                "-init_inc".to_string(),
                init.clone(),
                "-dump_row".to_string(),
                filter_file.to_string_lossy().into_owned(),
            ];
            args.extend(extra_opts.iter().cloned());

            let command = ProcessCommand {
                program: self.config.tc_stat_exe().to_string_lossy().into_owned(),
                args,
                env: Default::default(),
                working_dir: Some(scratch.clone()),
            };
            let output = self.subprocess.runner().run(command).await?;
            if !output.status.success() {
                warn!(
                    "tc_stat filter job failed for init time {init} (status {:?})",
                    output.status
                );
                continue;
            }

            self.copy_surviving_storms(tile_dir, init, &filter_file)?;
        }
        Ok(())
    }

    fn copy_surviving_storms(&self, tile_dir: &Path, init: &str, filter_file: &Path) -> Result<()> {
        for storm in fileset::storm_ids(filter_file)? {
            let src = tile_dir.join(init).join(&storm);
            if !src.is_dir() {
                debug!("Storm {storm} survived filtering but has no tile directory, skipping");
                continue;
            }
            let dst = self.config.series_filtered_out_dir.join(init).join(&storm);
            fs::create_dir_all(&dst).map_err(|e| SeriesError::io(&dst, e))?;

            let entries = fs::read_dir(&src).map_err(|e| SeriesError::io(&src, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| SeriesError::io(&src, e))?;
                if entry.file_type().map_err(|e| SeriesError::io(&src, e))?.is_file() {
                    let target = dst.join(entry.file_name());
                    fs::copy(entry.path(), &target)
                        .map_err(|e| SeriesError::io(&target, e))?;
                }
            }
        }
        Ok(())
    }

    /// Writes tmp_fcst and tmp_anly listings of the filtered tiles into the
    /// filtered tree. They exist for validating the filter step and for
    /// troubleshooting; nothing downstream reads them.
    pub fn write_tmp_files(&self) -> Result<()> {
        let filtered_dir = &self.config.series_filtered_out_dir;
        let everything = fileset::get_files(filtered_dir, &fileset::compile(".*")?)?;

        let fcst: Vec<String> = everything
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| p.contains("FCST_TILE"))
            .collect();
        let anly: Vec<String> = everything
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| p.contains("ANLY_TILE"))
            .collect();

        for (name, listing) in [("tmp_fcst", fcst), ("tmp_anly", anly)] {
            let path = filtered_dir.join(name);
            let mut contents = listing.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            fs::write(&path, contents).map_err(|e| SeriesError::io(&path, e))?;
        }
        Ok(())
    }
}
