//! The sequential stage loop for one full run: discover, verify, filter,
//! manifest, analyze, verify output, plot. Stages never run concurrently and
//! never backtrack; every external invocation completes before the next
//! begins.

use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::command::ToolCommandBuilder;
use crate::config::SeriesConfig;
use crate::error::{Result, SeriesError};
use crate::fileset;
use crate::filter::SeriesFilter;
use crate::manifest::{self, TileKind};
use crate::plot::PlotGenerator;
use crate::subprocess::SubprocessManager;
use walkdir::WalkDir;

pub struct SeriesByInitPipeline {
    config: SeriesConfig,
    subprocess: SubprocessManager,
}

impl SeriesByInitPipeline {
    pub fn new(config: SeriesConfig, subprocess: SubprocessManager) -> Self {
        Self { config, subprocess }
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting series analysis by init time");

        let fcst_pattern = fileset::compile(self.config.fcst_tile_pattern())?;
        let anly_pattern = fileset::compile(self.config.anly_tile_pattern())?;

        // Stage 1: discover init times in the source tile tree.
        let mut tile_dir = self.config.extract_tiles_dir.clone();
        let init_times = fileset::init_times(&tile_dir)?;

        // Stage 2: verify tile presence. Missing tiles are logged, and the
        // run continues with whatever is discoverable.
        if let Err(err) = fileset::check_for_tiles(&tile_dir, &fcst_pattern, &anly_pattern) {
            error!("{err}");
        }

        // Stage 3: optional storm-track filtering, with explicit fallback
        // to the unfiltered source when the filter matches nothing.
        if !self.config.series_filter_opts.is_empty() {
            let filter = SeriesFilter::new(&self.config, &self.subprocess);
            filter.apply(&tile_dir, &init_times).await?;

            // Stage 4: prune empties left behind by filtering.
            fileset::prune_empty(&self.config.series_filtered_out_dir)?;

            if fileset::dir_has_entries(&self.config.series_filtered_out_dir)? {
                tile_dir = self.config.series_filtered_out_dir.clone();
                filter.write_tmp_files()?;
            } else {
                info!(
                    "Applied series filter options, no results; \
                     using extract tiles data for series analysis input"
                );
            }
        }

        // Stage 5: build FCST and ANLY manifests per (init, storm).
        let sorted_init = self.build_manifests(&tile_dir, &fcst_pattern, &anly_pattern)?;
        fileset::prune_empty(&self.config.series_out_dir)?;
        debug!("Finished creating FCST and ANLY manifests and pruning empty files and dirs");

        // Stage 6: one series_analysis invocation per (init, storm, var).
        self.run_series_analysis(&sorted_init, &tile_dir).await?;

        // Stage 7: the analysis must have produced NetCDF output somewhere.
        if !self.netcdf_created()? {
            error!("No NetCDF files were created by series_analysis, exiting");
            return Err(SeriesError::NoDataProduced(
                self.config.series_out_dir.clone(),
            ));
        }

        // Stage 8: plots.
        let plotter = PlotGenerator::new(&self.config, &self.subprocess);
        plotter.generate(&sorted_init, &tile_dir).await?;

        info!("Finished series analysis by init time");
        Ok(())
    }

    /// Writes manifests for every (init, storm) pair that has both forecast
    /// and analysis tiles; pairs missing either kind are skipped with an
    /// informational log. Returns the sorted init times found in `tile_dir`,
    /// which filtering may have reduced.
    fn build_manifests(
        &self,
        tile_dir: &Path,
        fcst_pattern: &regex::Regex,
        anly_pattern: &regex::Regex,
    ) -> Result<Vec<String>> {
        let sorted_init = fileset::init_times(tile_dir)?;

        for init in &sorted_init {
            let storms = fileset::storms_for_init(tile_dir, init)?;
            if storms.is_empty() {
                continue;
            }
            for storm in &storms {
                let fcst_files = fileset::get_files(tile_dir, fcst_pattern)?;
                let anly_files = fileset::get_files(tile_dir, anly_pattern)?;

                if fcst_files.is_empty() || anly_files.is_empty() {
                    info!(
                        "No gridded analysis or forecast file found for storm {storm}, \
                         continuing to next storm"
                    );
                    continue;
                }

                manifest::write_manifest(
                    &self.config.series_out_dir,
                    init,
                    storm,
                    TileKind::Fcst,
                    &fcst_files,
                )?;
                manifest::write_manifest(
                    &self.config.series_out_dir,
                    init,
                    storm,
                    TileKind::Anly,
                    &anly_files,
                )?;
                fileset::prune_empty(&self.config.series_out_dir)?;
            }
        }
        Ok(sorted_init)
    }

    async fn run_series_analysis(&self, sorted_init: &[String], tile_dir: &Path) -> Result<()> {
        let vars = self.config.vars()?;
        let mut builder = ToolCommandBuilder::new(self.config.series_analysis_exe());

        for init in sorted_init {
            let storms = fileset::storms_for_init(tile_dir, init)?;
            for storm in &storms {
                for var in &vars {
                    builder.set_config_file(&self.config.series_config_file);
                    builder.add_input(
                        TileKind::Anly.flag(),
                        manifest::manifest_path(
                            &self.config.series_out_dir,
                            init,
                            storm,
                            TileKind::Anly,
                        ),
                    );
                    builder.add_input(
                        TileKind::Fcst.flag(),
                        manifest::manifest_path(
                            &self.config.series_out_dir,
                            init,
                            storm,
                            TileKind::Fcst,
                        ),
                    );

                    let out_dir = self.config.series_out_dir.join(init).join(storm);
                    fs::create_dir_all(&out_dir).map_err(|e| SeriesError::io(&out_dir, e))?;
                    let out_file =
                        out_dir.join(format!("series_{}_{}.nc", var.name, var.level));
                    builder.set_output_dir(&out_dir);
                    builder.set_output_file(&out_file);

                    // Scalar bindings read by the series_analysis config
                    // file; bound here, immediately before the invocation
                    // that consumes them.
                    builder.env("STAT_LIST", &self.config.stat_list_env());
                    builder.env(
                        "NAME",
                        &var.series_name(self.config.regrid_with_met_tool),
                    );
                    builder.env("LEVEL", &var.level);

                    let Some(command) = builder.build() else {
                        builder.clear();
                        continue;
                    };
                    let output = self.subprocess.runner().run(command).await?;
                    if !output.status.success() {
                        warn!(
                            "series_analysis failed for init {init} storm {storm} \
                             var {} (status {:?})",
                            var.token(),
                            output.status
                        );
                    }
                    builder.clear();
                }
            }
        }
        Ok(())
    }

    /// True when at least one NetCDF file exists anywhere under the series
    /// output tree.
    fn netcdf_created(&self) -> Result<bool> {
        let out_dir = &self.config.series_out_dir;
        if !out_dir.exists() {
            return Ok(false);
        }
        for entry in WalkDir::new(out_dir) {
            let entry = entry.map_err(|e| SeriesError::io(out_dir.clone(), e.into()))?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "nc")
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
