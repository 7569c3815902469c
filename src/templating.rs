use std::{collections::HashMap, path::PathBuf, sync::Arc, time::SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const FORM_TEMPLATE: &str = "form.html";
pub const PICTURE_TEMPLATE: &str = "picture.html.liquid";

const BUILTIN_FORM: &str = include_str!("../templates/form.html");
const BUILTIN_PICTURE: &str = include_str!("../templates/picture.html.liquid");

/// Serves page templates from an override directory, falling back to the
/// copies compiled into the binary.
pub struct TemplateEngine {
    template_dir: PathBuf,
    cache: Arc<RwLock<HashMap<String, CachedTemplate>>>,
}

struct CachedTemplate {
    content: String,
    modified: SystemTime,
}

fn builtin(name: &str) -> Option<&'static str> {
    match name {
        FORM_TEMPLATE => Some(BUILTIN_FORM),
        PICTURE_TEMPLATE => Some(BUILTIN_PICTURE),
        _ => None,
    }
}

impl TemplateEngine {
    pub fn new(template_dir: PathBuf) -> Self {
        Self {
            template_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn load_template(&self, name: &str) -> Result<String, String> {
        let template_path = self.template_dir.join(name);

        let metadata = match tokio::fs::metadata(&template_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No override for {}, using built-in template", name);
                return builtin(name)
                    .map(str::to_string)
                    .ok_or_else(|| format!("Unknown template: {}", name));
            }
            Err(e) => return Err(format!("Failed to get metadata for {}: {}", name, e)),
        };

        let modified = metadata
            .modified()
            .map_err(|e| format!("Failed to get modified time: {}", e))?;

        let mut cache = self.cache.write().await;

        if let Some(cached) = cache.get(name)
            && cached.modified >= modified
        {
            debug!("Using cached template for {}", name);
            return Ok(cached.content.clone());
        }

        info!("Loading template: {:?}", template_path);

        let content = tokio::fs::read_to_string(&template_path)
            .await
            .map_err(|e| format!("Failed to read template {}: {}", name, e))?;

        cache.insert(
            name.to_string(),
            CachedTemplate {
                content: content.clone(),
                modified,
            },
        );

        Ok(content)
    }

    /// The upload form, returned verbatim.
    pub async fn form(&self) -> Result<String, String> {
        self.load_template(FORM_TEMPLATE).await
    }

    pub async fn render_picture(&self, globals: liquid::Object) -> Result<String, String> {
        self.render_template(PICTURE_TEMPLATE, globals).await
    }

    pub async fn render_template(
        &self,
        template_name: &str,
        globals: liquid::Object,
    ) -> Result<String, String> {
        let template_content = self.load_template(template_name).await?;

        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| format!("Failed to create parser: {}", e))?;

        let template = parser
            .parse(&template_content)
            .map_err(|e| format!("Failed to parse template: {}", e))?;

        template
            .render(&globals)
            .map_err(|e| format!("Failed to render template: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_builtin_form_used_without_override() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(temp_dir.path().join("missing"));

        let form = engine.form().await.unwrap();
        assert!(form.contains(r#"enctype="multipart/form-data""#));
        assert!(form.contains(r#"name="title""#));
        assert!(form.contains(r#"name="image""#));
    }

    #[tokio::test]
    async fn test_override_directory_wins() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(FORM_TEMPLATE), "<p>custom form</p>").unwrap();

        let engine = TemplateEngine::new(temp_dir.path().to_path_buf());
        assert_eq!(engine.form().await.unwrap(), "<p>custom form</p>");

        // Picture template has no override, so the built-in one renders.
        let html = engine
            .render_picture(liquid::object!({
                "title": "Sunset",
                "app_name": "Test",
                "mime_type": "image/png",
                "image_data": "AAAA",
            }))
            .await
            .unwrap();
        assert!(html.contains("data:image/png;base64,AAAA"));
    }

    #[tokio::test]
    async fn test_picture_title_is_escaped() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(temp_dir.path().to_path_buf());

        let html = engine
            .render_picture(liquid::object!({
                "title": "<script>alert(1)</script>",
                "app_name": "Test",
                "mime_type": "image/gif",
                "image_data": "",
            }))
            .await
            .unwrap();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_unknown_template_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(temp_dir.path().to_path_buf());

        let result = engine
            .render_template("nope.html.liquid", liquid::object!({}))
            .await;
        assert!(result.is_err());
    }
}
