//! Model management commands.

use pocketchat_local_ai::{Acquirer, ArtifactLocation, DownloadAcquirer};

use crate::config::AppConfig;

/// Download the model unless it is already installed.
pub(crate) async fn pull(config: &AppConfig) -> miette::Result<()> {
    let model = config.descriptor();

    if model.is_installed() {
        println!("Model '{}' is already installed.", model.name);
        println!("Location: {}", model.local_path.display());
        return Ok(());
    }

    println!("Downloading model: {} ({})", model.name, model.size_label);
    println!("This may take a while depending on your connection...");
    println!();

    let location = DownloadAcquirer::new()
        .with_progress(true)
        .ensure_local_artifact(&model)
        .await
        .map_err(|e| miette::miette!("Failed to download model: {}", e))?;

    if let ArtifactLocation::Local(path) = location {
        println!();
        println!("Model downloaded successfully!");
        println!("Location: {}", path.display());
    }

    Ok(())
}

/// Show information about paths.
pub(crate) fn path(config: &AppConfig) -> miette::Result<()> {
    let paths = config.paths();

    println!("Data directory:   {}", paths.data_dir().display());
    println!("Models directory: {}", paths.models_dir().display());
    println!("Binaries:         {}", paths.bin_dir().display());
    println!("Model file:       {}", config.descriptor().local_path.display());
    println!("llama-server:     {}", config.llama_server_path().display());

    Ok(())
}

/// Remove the downloaded model.
pub(crate) fn remove(config: &AppConfig) -> miette::Result<()> {
    let model = config.descriptor();

    if !model.is_installed() {
        println!("Model '{}' is not installed.", model.name);
        return Ok(());
    }

    std::fs::remove_file(&model.local_path)
        .map_err(|e| miette::miette!("Failed to remove model: {}", e))?;
    tracing::info!("Removed model: {}", model.local_path.display());
    println!("Removed model '{}'.", model.name);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfigBuilder;

    #[test]
    fn test_remove_deletes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfigBuilder::default().data_dir(dir.path()).build();
        let model = config.descriptor();
        config.paths().ensure_dirs().unwrap();
        std::fs::write(&model.local_path, b"weights").unwrap();

        remove(&config).unwrap();
        assert!(!model.local_path.exists());

        // Removing again is a no-op.
        remove(&config).unwrap();
    }

    #[tokio::test]
    async fn test_pull_skips_installed_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfigBuilder::default()
            .data_dir(dir.path())
            .model_url("http://127.0.0.1:9/model.bin")
            .build();
        config.paths().ensure_dirs().unwrap();
        std::fs::write(config.descriptor().local_path, b"weights").unwrap();

        pull(&config).await.unwrap();
    }
}
