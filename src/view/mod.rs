//! View engines and template lookup.

mod html;

pub use html::HtmlViewEngine;

use crate::di::metadata::{Metadata, keys};
use crate::di::{Annotate, Args};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The ViewEngine trait
///
/// An engine renders template files carrying its extension.
#[async_trait]
pub trait ViewEngine: Send + Sync + 'static {
    /// Template extension including the dot, e.g. `.html`.
    fn ext(&self) -> &str;

    async fn render(&self, path: &Path, data: &Value) -> anyhow::Result<String>;
}

impl<T: ViewEngine> Annotate<T> {
    pub fn view_engine<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.implements::<dyn ViewEngine, _>(|it| it as Arc<dyn ViewEngine>)
            .service_named("ViewEngine", construct)
    }
}

/// View an action's result is rendered with, recorded per action key.
pub(crate) static VIEW: Metadata<Option<String>> = Metadata::new(keys::VIEW, Default::default);

/// Template roots and registered engines.
#[derive(Clone, Default)]
pub struct Views {
    roots: Vec<PathBuf>,
    engines: Vec<Arc<dyn ViewEngine>>,
}

impl Views {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            engines: Vec::new(),
        }
    }

    /// Registers an engine; it replaces any engine with the same extension.
    pub fn register(&mut self, engine: Arc<dyn ViewEngine>) {
        self.engines.retain(|it| it.ext() != engine.ext());
        self.engines.push(engine);
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Renders the view `name` with `data`.
    ///
    /// A name with an extension uses the engine for it. Otherwise engines are
    /// tried from the last registered one, and the first whose template
    /// exists renders it.
    pub async fn render(&self, name: &str, data: &Value) -> anyhow::Result<String> {
        let (engine, path) = self.find(name).await?;
        tracing::debug!(view = %name, path = %path.display(), "rendering view");
        engine.render(&path, data).await
    }

    async fn find(&self, name: &str) -> anyhow::Result<(Arc<dyn ViewEngine>, PathBuf)> {
        let ext = Path::new(name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()));

        if let Some(ext) = ext {
            let engine = self
                .engines
                .iter()
                .find(|engine| engine.ext() == ext)
                .ok_or_else(|| anyhow::anyhow!("No view engine registered for {ext}"))?;
            if let Some(path) = self.lookup(name, &ext).await {
                return Ok((Arc::clone(engine), path));
            }
        } else {
            for engine in self.engines.iter().rev() {
                if let Some(path) = self.lookup(name, engine.ext()).await {
                    return Ok((Arc::clone(engine), path));
                }
            }
        }

        anyhow::bail!("Failed to lookup view \"{name}\" in {:?}", self.roots)
    }

    async fn lookup(&self, name: &str, ext: &str) -> Option<PathBuf> {
        for root in &self.roots {
            let location = root.join(name);
            let Some(file) = location.file_name().map(|file| file.to_string_lossy().into_owned()) else {
                continue;
            };
            let dir = location.parent().map(Path::to_path_buf).unwrap_or_default();
            let stem = file.strip_suffix(ext).unwrap_or(&file);

            let candidates = [
                location.clone(),
                dir.join(format!("{file}{ext}")),
                dir.join(stem).join(format!("index{ext}")),
            ];
            for candidate in candidates {
                if is_file(&candidate).await {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    struct Upper;

    #[async_trait]
    impl ViewEngine for Upper {
        fn ext(&self) -> &str {
            ".up"
        }

        async fn render(&self, path: &Path, _data: &Value) -> anyhow::Result<String> {
            Ok(tokio::fs::read_to_string(path).await?.to_uppercase())
        }
    }

    fn views(root: &Path) -> Views {
        let mut views = Views::new(vec![root.to_path_buf()]);
        views.register(Arc::new(HtmlViewEngine));
        views.register(Arc::new(Upper));
        views
    }

    #[tokio::test]
    async fn test_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("home.html"), "<h1>home</h1>").unwrap();
        fs::create_dir(dir.path().join("books")).unwrap();
        fs::write(dir.path().join("books/index.html"), "<ul></ul>").unwrap();
        fs::write(dir.path().join("about.up"), "about").unwrap();

        let views = views(dir.path());
        let data = json!({});

        assert_eq!(views.render("home", &data).await.unwrap(), "<h1>home</h1>");
        assert_eq!(views.render("home.html", &data).await.unwrap(), "<h1>home</h1>");
        assert_eq!(views.render("books", &data).await.unwrap(), "<ul></ul>");
        assert_eq!(views.render("about", &data).await.unwrap(), "ABOUT");
    }

    #[tokio::test]
    async fn test_missing_view_fails() {
        let dir = tempfile::tempdir().unwrap();
        let views = views(dir.path());

        let err = views.render("nowhere", &json!({})).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to lookup view \"nowhere\""));
        assert!(views.render("page.hbs", &json!({})).await.is_err());
    }
}
