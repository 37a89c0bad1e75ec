//! JSON configuration files for the solver binaries.
use eyre::WrapErr;
use log::info;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Loads a configuration, or returns the defaults when no path is given.
///
/// Fields missing from the file take their default values when the configuration type is
/// annotated with `#[serde(default)]`.
pub fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> eyre::Result<T> {
    match path {
        None => Ok(T::default()),
        Some(path) => {
            let file = File::open(path).wrap_err_with(|| format!("failed to open configuration file {}", path.display()))?;
            let config = serde_json::from_reader(BufReader::new(file))
                .wrap_err_with(|| format!("failed to parse configuration file {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
    }
}
