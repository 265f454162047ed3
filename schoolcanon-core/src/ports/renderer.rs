// schoolcanon-core/src/ports/renderer.rs

use crate::error::CanonError;

pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, CanonError>;
}
