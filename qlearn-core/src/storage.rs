use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Directories where a training run writes its outputs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StorageConfig {
    /// Root of model checkpoints. Each checkpoint is a subdirectory.
    pub model_dir: PathBuf,

    /// Directory of logs and configuration files of the run.
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("model"),
            log_dir: PathBuf::from("log"),
        }
    }
}

impl StorageConfig {
    /// Creates a configuration.
    pub fn new(model_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            log_dir: log_dir.into(),
        }
    }

    /// Returns the directory of the checkpoint `name`.
    pub fn checkpoint_dir(&self, name: &str) -> PathBuf {
        self.model_dir.join(name)
    }

    /// Creates the directories if they do not exist.
    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.model_dir)?;
        fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
