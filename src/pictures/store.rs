use super::error::PicturesError;
use std::path::{Path, PathBuf};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;

pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Writes uploaded bytes under a storage directory as `<id><extension>`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    directory: PathBuf,
}

impl ImageStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Lower-cased extension of `file_name`, dot included, when it is one we
    /// accept. Only the final component of the client-supplied name is looked
    /// at, and a bare `.png` counts as having the extension `.png`.
    pub fn allowed_extension(file_name: &str) -> Option<String> {
        let base_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        let extension = &base_name[base_name.rfind('.')?..];
        let extension = extension.to_lowercase();

        ALLOWED_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }

    pub async fn save(
        &self,
        id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PicturesError> {
        if !ALLOWED_EXTENSIONS.contains(&extension) {
            return Err(PicturesError::InvalidExtension(extension.to_string()));
        }

        tokio::fs::create_dir_all(&self.directory).await?;

        let path = self.directory.join(format!("{}{}", id, extension));
        let mut file = File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!("Stored {} bytes at {:?}", bytes.len(), path);
        Ok(path)
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, PicturesError> {
        Ok(tokio::fs::read(path).await?)
    }

    pub async fn remove(&self, path: &Path) -> Result<(), PicturesError> {
        Ok(tokio::fs::remove_file(path).await?)
    }

    /// Media type for the `data:` URI of a stored file.
    pub fn mime_for_path(path: &Path) -> String {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}
