use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`CartPole`](crate::CartPole).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CartPoleConfig {
    /// Episodes are truncated after this number of steps.
    pub max_steps: Option<usize>,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(500),
        }
    }
}

impl CartPoleConfig {
    /// Sets the maximum number of steps of an episode.
    pub fn max_steps(mut self, v: Option<usize>) -> Self {
        self.max_steps = v;
        self
    }

    /// Loads [`CartPoleConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CartPoleConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_cartpole_config() -> Result<()> {
        let config = CartPoleConfig::default().max_steps(Some(200));
        let dir = TempDir::new("cartpole_config")?;
        let path = dir.path().join("cartpole.yaml");
        config.save(&path)?;
        assert_eq!(CartPoleConfig::load(&path)?, config);
        Ok(())
    }
}
