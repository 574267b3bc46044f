use std::path::PathBuf;
use thiserror::Error;

/// Exit code when series_analysis produced no NetCDF output. Kept at the
/// ENODATA errno value that downstream job schedulers already key on.
pub const EXIT_NO_DATA: i32 = 61;

/// Exit code for an unrecoverable naming-convention violation.
pub const EXIT_BAD_FILENAME: i32 = 1;

/// Exit code for any other failure.
pub const EXIT_FAILURE: i32 = 2;

#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Missing forecast or analysis tile files under {0}; extract tiles must be run first")]
    MissingTiles(PathBuf),

    #[error("Unexpected file format encountered: no forecast hour token in '{0}'")]
    UnexpectedFilename(String),

    #[error("No forecast tile files found under {0}")]
    NoForecastFiles(PathBuf),

    #[error("No NetCDF files were created by series_analysis under {0}")]
    NoDataProduced(PathBuf),

    #[error("Subprocess error: {0}")]
    Process(#[from] crate::subprocess::ProcessError),
}

impl SeriesError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this failure. The no-data case is distinguished
    /// so callers can tell "ran but produced nothing" from a plain failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoDataProduced(_) => EXIT_NO_DATA,
            Self::UnexpectedFilename(_) | Self::NoForecastFiles(_) => EXIT_BAD_FILENAME,
            _ => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, SeriesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_maps_to_distinguished_code() {
        let err = SeriesError::NoDataProduced(PathBuf::from("/out"));
        assert_eq!(err.exit_code(), EXIT_NO_DATA);
    }

    #[test]
    fn filename_violations_are_fatal_with_code_one() {
        let err = SeriesError::UnexpectedFilename("bad_name.grb2".to_string());
        assert_eq!(err.exit_code(), EXIT_BAD_FILENAME);
        let err = SeriesError::NoForecastFiles(PathBuf::from("/tiles"));
        assert_eq!(err.exit_code(), EXIT_BAD_FILENAME);
    }

    #[test]
    fn everything_else_maps_to_generic_failure() {
        let err = SeriesError::Config("bad".to_string());
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }
}
