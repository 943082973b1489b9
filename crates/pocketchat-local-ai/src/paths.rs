//! Path utilities for PocketChat data directories.

use std::path::{Path, PathBuf};

/// Filename the model artifact is stored under.
pub const MODEL_FILENAME: &str = "model.bin";

/// Directory layout rooted at one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Use an explicit data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform data directory (`<data dir>/pocketchat`), falling back to
    /// `~/.pocketchat` and finally `./.pocketchat`.
    pub fn platform_default() -> Self {
        let root = dirs::data_dir()
            .map(|dir| dir.join("pocketchat"))
            .or_else(|| dirs::home_dir().map(|home| home.join(".pocketchat")))
            .unwrap_or_else(|| PathBuf::from(".pocketchat"));
        Self { root }
    }

    pub fn data_dir(&self) -> &Path {
        &self.root
    }

    /// Get the models directory.
    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    /// Get the bin directory.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Get the path to the llama-server binary.
    pub fn llama_server_path(&self) -> PathBuf {
        let binary_name = if cfg!(target_os = "windows") {
            "llama-server.exe"
        } else {
            "llama-server"
        };
        self.bin_dir().join(binary_name)
    }

    /// Get the path of the model artifact.
    pub fn model_path(&self) -> PathBuf {
        self.models_dir().join(MODEL_FILENAME)
    }

    /// Ensure the data directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.models_dir())?;
        std::fs::create_dir_all(self.bin_dir())?;
        Ok(())
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = DataPaths::new("/tmp/pc");
        assert_eq!(paths.model_path(), PathBuf::from("/tmp/pc/models/model.bin"));
        assert!(paths.llama_server_path().starts_with("/tmp/pc/bin"));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data"));
        paths.ensure_dirs().unwrap();
        assert!(paths.models_dir().is_dir());
        assert!(paths.bin_dir().is_dir());
    }
}
