//! CLI subcommands.

pub mod config;
pub mod simulate;

use std::path::PathBuf;

use lazyload::config::LazyConfig;

use crate::error::CliError;

/// Default configuration file: `<config dir>/lazyload/config.ini`.
pub fn config_file_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("lazyload").join("config.ini"))
        .ok_or(CliError::NoConfigDir)
}

/// Load the engine configuration.
///
/// An explicit path must exist. Without one the default file is used when
/// present, otherwise built-in defaults.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<LazyConfig, CliError> {
    if let Some(path) = explicit {
        tracing::debug!(path = %path.display(), "Loading configuration");
        return Ok(LazyConfig::from_ini_file(path)?);
    }

    match config_file_path() {
        Ok(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading default configuration file");
            Ok(LazyConfig::from_ini_file(&path)?)
        }
        _ => Ok(LazyConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lazyload]\nmax_attempts = 5\nmode = observer").unwrap();

        let config = load_config(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.mode, lazyload::Mode::Observer);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.ini");

        assert!(matches!(
            load_config(Some(&missing)),
            Err(CliError::Config(_))
        ));
    }
}
