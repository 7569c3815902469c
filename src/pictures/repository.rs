use super::{error::PicturesError, types::ImageRecord};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub type SharedRepository = Arc<MetadataRepository>;

/// Ordered set of [`ImageRecord`]s backed by a single JSON document.
///
/// The whole document is read once on [`load`](Self::load) and rewritten after
/// every [`add`](Self::add). Writers are serialized by the lock, and the
/// document is replaced through a temporary file so a crash mid-write leaves
/// the previous version in place.
pub struct MetadataRepository {
    path: PathBuf,
    records: RwLock<Vec<ImageRecord>>,
}

impl MetadataRepository {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, PicturesError> {
        let path = path.into();
        let records = Self::read_document(&path).await?;

        info!(
            "Loaded {} image records from {:?}",
            records.len(),
            path
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Reads a metadata document without constructing a repository. A missing
    /// document is an empty one.
    pub async fn read_document(path: &Path) -> Result<Vec<ImageRecord>, PicturesError> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Metadata document {:?} does not exist, starting empty", path);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn add(&self, record: ImageRecord) -> Result<(), PicturesError> {
        let mut records = self.records.write().await;
        records.push(record);

        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }

        debug!("Metadata document now holds {} records", records.len());
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Option<ImageRecord> {
        let records = self.records.read().await;
        records.iter().find(|record| record.id == id).cloned()
    }

    pub async fn all(&self) -> Vec<ImageRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn persist(&self, records: &[ImageRecord]) -> Result<(), PicturesError> {
        let json = serde_json::to_string_pretty(records)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        Ok(())
    }
}
