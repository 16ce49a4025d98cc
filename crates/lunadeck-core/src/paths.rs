use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Application directories under the XDG base directories
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory (~/.config/lunadeck)
    pub config: PathBuf,

    /// Data directory (~/.local/share/lunadeck)
    pub data: PathBuf,

    /// Key-value storage directory, one JSON file per key
    pub storage: PathBuf,

    /// Default log file used by `--log-file` without a path
    pub log_file: PathBuf,
}

impl Paths {
    /// Resolve the standard per-user directories.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if no home directory can be determined.
    pub fn new() -> Result<Self> {
        let project = ProjectDirs::from("", "", "lunadeck")
            .ok_or_else(|| Error::Storage("unable to determine home directory".to_string()))?;

        let config = project.config_dir().to_path_buf();
        let data = project.data_dir().to_path_buf();

        Ok(Self {
            storage: data.join("storage"),
            log_file: data.join("lunadeck.log"),
            config,
            data,
        })
    }

    #[must_use]
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref().to_path_buf();
        Self {
            storage: base.join("storage"),
            log_file: base.join("lunadeck.log"),
            config: base.clone(),
            data: base,
        }
    }

    /// Ensure all directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config)?;
        std::fs::create_dir_all(&self.data)?;
        std::fs::create_dir_all(&self.storage)?;
        Ok(())
    }
}

/// Moonraker's unix socket in a stock `printer_data` layout.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    let home = BaseDirs::new().map_or_else(|| PathBuf::from("/"), |dirs| dirs.home_dir().to_path_buf());
    socket_path_in(&home)
}

fn socket_path_in(home: &Path) -> PathBuf {
    home.join("printer_data").join("comms").join("moonraker.sock")
}
