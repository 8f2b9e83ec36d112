use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Tracer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TracerConfig {
    /// Directory that session trace files are written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            output_dir: default_output_dir(),
        }
    }
}

impl TracerConfig {
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Output path for a session started now:
    /// `<output_dir>/<session>_<day>-<month>-<year>_<hour>-<minute>-<second>.json`.
    pub(crate) fn session_path(&self, session: &str) -> PathBuf {
        let now = chrono::Local::now();
        self.output_dir
            .join(format!("{}_{}.json", session, now.format("%d-%m-%Y_%H-%M-%S")))
    }
}
