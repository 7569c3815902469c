pub mod error;
pub mod handlers;
pub mod repository;
pub mod store;
pub mod types;

pub use error::{PicturesError, UploadError};
pub use repository::{MetadataRepository, SharedRepository};
pub use store::ImageStore;
pub use types::ImageRecord;
