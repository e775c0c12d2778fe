//! Pipeline configuration.
//!
//! Read from `--config PATH`, else `./moviekg.toml` when it exists, else the
//! defaults below. Every field is optional in the file.
//!
//! ```toml
//! input = "data/movies.csv"
//! output_dir = "output"
//!
//! [property_graph]
//! enabled = true
//! database = "output/movie_graph.db"
//! optional = true
//!
//! [logging]
//! level = "debug"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::errors::MovieKgError;

pub const DEFAULT_CONFIG_FILE: &str = "moviekg.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KgConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Turtle snapshot file name, relative to `output_dir`.
    pub snapshot_file: String,
    pub report_file: String,
    pub property_graph: PropertyGraphConfig,
    pub load: LoadConfig,
    pub logging: LoggingConfig,
}

impl Default for KgConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/movies.csv"),
            output_dir: PathBuf::from("output"),
            snapshot_file: "movie_knowledge_graph.ttl".to_owned(),
            report_file: "pipeline_report.txt".to_owned(),
            property_graph: PropertyGraphConfig::default(),
            load: LoadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyGraphConfig {
    pub enabled: bool,
    pub database: PathBuf,
    /// When false an unreachable property graph aborts the load.
    pub optional: bool,
}

impl Default for PropertyGraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database: PathBuf::from("output/movie_graph.db"),
            optional: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub clear_before_load: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            clear_before_load: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

impl KgConfig {
    /// Loads `path`, or `./moviekg.toml` when `path` is `None` and the file exists.
    pub fn load(path: Option<&Path>) -> Result<Self, MovieKgError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load_from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, MovieKgError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            MovieKgError::invalid_input(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| MovieKgError::invalid_input(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(contents: &str) -> Result<Self, MovieKgError> {
        toml::from_str(contents).map_err(|e| MovieKgError::invalid_input(e.to_string()))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(&self.snapshot_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }
}
