use super::ViewEngine;
use crate::di::{Annotate, Annotated};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Serves `.html` templates as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlViewEngine;

#[async_trait]
impl ViewEngine for HtmlViewEngine {
    fn ext(&self) -> &str {
        ".html"
    }

    async fn render(&self, path: &Path, _data: &Value) -> anyhow::Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

impl Annotated for HtmlViewEngine {
    fn annotate() -> crate::Result<()> {
        Annotate::<HtmlViewEngine>::new().view_engine(|_| Ok(HtmlViewEngine))
    }
}
