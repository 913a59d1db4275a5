//! XDG Base Directory support.

use std::path::PathBuf;

/// XDG directory paths for Souschef.
pub struct XdgDirs {
    /// Config directory (~/.config/souschef or XDG_CONFIG_HOME/souschef)
    pub config: PathBuf,
    /// Data directory (~/.local/share/souschef or XDG_DATA_HOME/souschef)
    pub data: PathBuf,
    /// State directory (~/.local/state/souschef or XDG_STATE_HOME/souschef)
    pub state: PathBuf,
}

impl XdgDirs {
    /// Get XDG directories, respecting environment variables.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            config: std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(".config"))
                .join("souschef"),
            data: std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(".local/share"))
                .join("souschef"),
            state: std::env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(".local/state"))
                .join("souschef"),
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.data, &self.state] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path of the settings file inside the config directory.
    pub fn settings_file(&self) -> PathBuf {
        self.config.join("settings.json")
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}
