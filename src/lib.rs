use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod pictures;
pub mod startup_checks;
pub mod templating;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written to.
    pub image_directory: PathBuf,
    /// JSON document holding the image records.
    pub metadata_file: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub directory: PathBuf,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Picture Drop".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_directory: PathBuf::from("Images"),
            metadata_file: PathBuf::from("imageInfo.json"),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, toml_edit::de::Error> {
        toml_edit::de::from_str::<Config>(content)
    }
}

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub template_engine: Arc<templating::TemplateEngine>,
    pub repository: pictures::SharedRepository,
    pub store: pictures::ImageStore,
    pub config: Config,
}

/// Builds the router. Fails when the metadata document exists but cannot be
/// read or parsed.
pub async fn create_app(config: Config) -> Result<Router, pictures::PicturesError> {
    let template_engine = Arc::new(templating::TemplateEngine::new(
        config.templates.directory.clone(),
    ));

    let repository = Arc::new(
        pictures::MetadataRepository::load(config.storage.metadata_file.clone()).await?,
    );

    let store = pictures::ImageStore::new(config.storage.image_directory.clone());

    let app_state = AppState {
        template_engine,
        repository,
        store,
        config: config.clone(),
    };

    Ok(router(app_state))
}

pub fn router(app_state: AppState) -> Router {
    let max_upload_bytes = app_state.config.storage.max_upload_bytes;

    Router::new()
        .route(
            "/",
            get(pictures::handlers::upload_form_handler).post(pictures::handlers::upload_handler),
        )
        .route("/picture/", get(pictures::handlers::missing_id_handler))
        .route("/picture/{id}", get(pictures::handlers::picture_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let route = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str())
                        .unwrap_or("-");
                    let body_bytes = request
                        .headers()
                        .get(axum::http::header::CONTENT_LENGTH)
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    // Uploads report their body size, picture views their id.
                    if route == "/picture/{id}" {
                        let id = request.uri().path().trim_start_matches("/picture/");
                        tracing::info!(
                            target: "access_log",
                            method = %request.method(),
                            route,
                            picture_id = %id,
                            "request"
                        );
                    } else {
                        tracing::info!(
                            target: "access_log",
                            method = %request.method(),
                            route,
                            body_bytes = %body_bytes,
                            "request"
                        );
                    }
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let headers = response.headers();
                        let redirect_to = headers
                            .get(axum::http::header::LOCATION)
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");
                        let content_type = headers
                            .get(axum::http::header::CONTENT_TYPE)
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            content_type = %content_type,
                            redirect_to = %redirect_to,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
[server]
host = "0.0.0.0"
port = 8080

[storage]
image_directory = "/var/lib/pictures"
metadata_file = "/var/lib/pictures.json"
"#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.storage.image_directory,
            PathBuf::from("/var/lib/pictures")
        );
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.app.name, "Picture Drop");
        assert_eq!(config.templates.directory, PathBuf::from("templates"));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.storage.image_directory, PathBuf::from("Images"));
        assert_eq!(config.storage.metadata_file, PathBuf::from("imageInfo.json"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_malformed_config_is_rejected() {
        assert!(Config::from_toml("[server]\nport = \"not a number\"").is_err());
    }
}
