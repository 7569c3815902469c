use serde::{Deserialize, Serialize};

/// Metadata for one uploaded picture, as persisted in the metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub title: String,
    pub file_path: String,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            file_path: file_path.into(),
        }
    }
}
