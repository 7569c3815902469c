use crate::{Config, pictures::MetadataRepository};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create image directory: {0}")]
    ImageDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Metadata document is unreadable: {0}")]
    MetadataUnreadable(String),

    #[error("{0} image record(s) point at missing files")]
    DanglingRecords(usize),
}

impl StartupCheckError {
    /// Critical failures stop the server from starting.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::ImageDirectoryCreationFailed(_)
                | StartupCheckError::MetadataUnreadable(_)
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let image_dir = Path::new(&config.storage.image_directory);
    if !image_dir.exists() {
        info!("Image directory does not exist, creating: {:?}", image_dir);
        if let Err(e) = tokio::fs::create_dir_all(image_dir).await {
            error!("Failed to create image directory: {}", e);
            errors.push(StartupCheckError::ImageDirectoryCreationFailed(e));
        }
    } else {
        info!("Image directory exists: {:?}", image_dir);
    }

    match MetadataRepository::read_document(&config.storage.metadata_file).await {
        Ok(records) => {
            info!(
                "Metadata document {:?} holds {} records",
                config.storage.metadata_file,
                records.len()
            );

            // Records are never pruned, only reported.
            let mut dangling = 0;
            for record in &records {
                if !Path::new(&record.file_path).exists() {
                    warn!(
                        "Image record {} points at missing file {:?}",
                        record.id, record.file_path
                    );
                    dangling += 1;
                }
            }
            if dangling > 0 {
                errors.push(StartupCheckError::DanglingRecords(dangling));
            }
        }
        Err(e) => {
            error!(
                "Metadata document {:?} cannot be loaded: {}",
                config.storage.metadata_file, e
            );
            errors.push(StartupCheckError::MetadataUnreadable(e.to_string()));
        }
    }

    if !config.templates.directory.exists() {
        warn!(
            "Template directory does not exist, using built-in templates: {:?}",
            config.templates.directory
        );
    } else {
        info!("Template directory exists: {:?}", config.templates.directory);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        warn!("Startup checks reported {} problem(s)", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pictures::ImageRecord;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.image_directory = temp_dir.path().join("Images");
        config.storage.metadata_file = temp_dir.path().join("imageInfo.json");
        config.templates.directory = temp_dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_creates_image_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        perform_startup_checks(&config).await.unwrap();
        assert!(config.storage.image_directory.is_dir());
    }

    #[tokio::test]
    async fn test_missing_template_directory_passes() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.templates.directory = temp_dir.path().join("no-templates");

        assert!(perform_startup_checks(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_metadata_is_critical() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::fs::write(&config.storage.metadata_file, "{ not json").unwrap();

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_critical());
    }

    #[tokio::test]
    async fn test_dangling_records_are_reported_not_critical() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let records = vec![ImageRecord::new(
            "gone",
            "Gone",
            temp_dir.path().join("Images/gone.png").to_string_lossy(),
        )];
        std::fs::write(
            &config.storage.metadata_file,
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert!(matches!(errors.as_slice(), [StartupCheckError::DanglingRecords(1)]));
        assert!(!errors[0].is_critical());

        // The document itself is left untouched.
        let content = std::fs::read_to_string(&config.storage.metadata_file).unwrap();
        assert!(content.contains("gone"));
    }
}
