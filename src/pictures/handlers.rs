use super::{error::UploadError, store::ImageStore, types::ImageRecord};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const NOT_FOUND_MESSAGE: &str = "Image not found.";

struct UploadForm {
    title: Option<String>,
    file_name: Option<String>,
    bytes: Option<Bytes>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, UploadError> {
        let mut form = UploadForm {
            title: None,
            file_name: None,
            bytes: None,
        };

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                // A plain text part named "image" is not a file.
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    if file_name.is_some() {
                        form.file_name = file_name;
                        form.bytes = Some(field.bytes().await?);
                    } else {
                        debug!("Ignoring non-file \"image\" field");
                    }
                }
                other => debug!("Ignoring unexpected form field {:?}", other),
            }
        }

        Ok(form)
    }

    /// Checks title, then file presence, then extension, stopping at the first
    /// failure. Returns the title, the normalized extension and the bytes.
    fn validate(self) -> Result<(String, String, Bytes), UploadError> {
        let title = self
            .title
            .filter(|title| !title.is_empty())
            .ok_or(UploadError::MissingTitle)?;

        let bytes = self
            .bytes
            .filter(|bytes| !bytes.is_empty())
            .ok_or(UploadError::MissingFile)?;

        let extension = self
            .file_name
            .as_deref()
            .and_then(ImageStore::allowed_extension)
            .ok_or(UploadError::InvalidFormat)?;

        Ok((title, extension, bytes))
    }
}

pub async fn upload_form_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    match app_state.template_engine.form().await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to load upload form: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

pub async fn upload_handler(
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, UploadError> {
    let (title, extension, bytes) = UploadForm::read(multipart)
        .await?
        .validate()
        .inspect_err(|e| debug!("Rejected upload: {}", e))?;

    let id = Uuid::new_v4().to_string();
    let path = app_state.store.save(&id, &extension, &bytes).await?;

    let record = ImageRecord::new(&id, title, path.to_string_lossy());
    if let Err(e) = app_state.repository.add(record).await {
        if let Err(remove_err) = app_state.store.remove(&path).await {
            warn!("Failed to clean up {:?} after metadata error: {}", path, remove_err);
        }
        return Err(e.into());
    }

    info!("Stored upload {} ({} bytes) at {:?}", id, bytes.len(), path);

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, format!("/picture/{}", id))],
    )
        .into_response())
}

pub async fn picture_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let record = match app_state.repository.get_by_id(&id).await {
        Some(record) => record,
        None => {
            debug!("No image record for id {:?}", id);
            return (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response();
        }
    };

    let path = PathBuf::from(&record.file_path);
    let bytes = match app_state.store.read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read image {:?} for record {}: {}", path, record.id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read image.").into_response();
        }
    };

    let mime_type = ImageStore::mime_for_path(&path);
    let image_data = general_purpose::STANDARD.encode(&bytes);

    let globals = liquid::object!({
        "id": record.id,
        "title": record.title,
        "mime_type": mime_type,
        "image_data": image_data,
        "app_name": app_state.config.app.name.clone(),
    });

    match app_state.template_engine.render_picture(globals).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// `/picture/` with nothing after it.
pub async fn missing_id_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}
