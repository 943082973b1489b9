//! Model metadata.

use serde::Serialize;
use std::path::PathBuf;

use crate::paths::DataPaths;
use crate::{DEFAULT_MODEL_NAME, DEFAULT_MODEL_SIZE, DEFAULT_MODEL_URL};

/// Static description of the model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Display name of the model.
    pub name: String,
    /// Human-readable size, e.g. `1.5GB`.
    pub size_label: String,
    /// Download URL.
    pub source_url: String,
    /// Where the artifact lives on disk.
    pub local_path: PathBuf,
}

impl ModelDescriptor {
    pub fn new(
        name: impl Into<String>,
        size_label: impl Into<String>,
        source_url: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            size_label: size_label.into(),
            source_url: source_url.into(),
            local_path: local_path.into(),
        }
    }

    /// The bundled default model stored under `paths`.
    pub fn default_for(paths: &DataPaths) -> Self {
        Self::new(
            DEFAULT_MODEL_NAME,
            DEFAULT_MODEL_SIZE,
            DEFAULT_MODEL_URL,
            paths.model_path(),
        )
    }

    /// Replace the download URL.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Check if the artifact is present on disk.
    pub fn is_installed(&self) -> bool {
        self.local_path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_info() {
        let paths = DataPaths::new("/data");
        let model = ModelDescriptor::default_for(&paths);
        assert_eq!(model.name, DEFAULT_MODEL_NAME);
        assert_eq!(model.size_label, "1.5GB");
        assert_eq!(model.local_path, PathBuf::from("/data/models/model.bin"));
        assert!(model.source_url.starts_with("https://huggingface.co/"));
    }

    #[test]
    fn test_url_override() {
        let model = ModelDescriptor::default_for(&DataPaths::new("/data"))
            .with_source_url("http://mirror.local/model.bin");
        assert_eq!(model.source_url, "http://mirror.local/model.bin");
        assert_eq!(model.name, DEFAULT_MODEL_NAME);
    }
}
