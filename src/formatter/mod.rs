//! Response formatters: serialize structured payloads into the media type the
//! client asked for.

mod json;
mod negotiate;

pub use json::JsonFormatter;
pub(crate) use negotiate::negotiate;
pub use negotiate::{MediaRange, parse_accept};

use crate::di::metadata::{Metadata, keys};
use crate::di::{Annotate, Args, Token};
use serde_json::Value;
use std::sync::Arc;

/// The Formatter trait
///
/// # Example
/// ```
/// use octavo::di::{Annotate, Annotated};
/// use octavo::formatter::{Formatter, FormatterOptions};
///
/// struct CsvRow;
///
/// impl Formatter for CsvRow {
///     fn format(&self, data: &serde_json::Value) -> anyhow::Result<String> {
///         let cells: Vec<String> = data
///             .as_array()
///             .into_iter()
///             .flatten()
///             .map(ToString::to_string)
///             .collect();
///         Ok(cells.join(","))
///     }
/// }
///
/// impl Annotated for CsvRow {
///     fn annotate() -> octavo::Result<()> {
///         Annotate::<CsvRow>::new()
///             .formatter(FormatterOptions::new(["text/csv"], "text/csv"), |_| Ok(CsvRow))
///     }
/// }
/// ```
pub trait Formatter: Send + Sync + 'static {
    fn format(&self, data: &Value) -> anyhow::Result<String>;
}

/// Media types a formatter answers and the content type it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterOptions {
    pub accepts: Vec<String>,
    pub content_type: String,
}

impl FormatterOptions {
    pub fn new<'a>(accepts: impl IntoIterator<Item = &'a str>, content_type: &str) -> Self {
        Self {
            accepts: accepts
                .into_iter()
                .map(|accept| accept.to_ascii_lowercase())
                .collect(),
            content_type: content_type.to_string(),
        }
    }
}

pub(crate) static FORMATTER: Metadata<Option<FormatterOptions>> =
    Metadata::new(keys::FORMATTER, Default::default);

/// Options a formatter was annotated with.
pub fn formatter_options(token: &Token) -> Option<FormatterOptions> {
    FORMATTER.get(token)
}

impl<T: Formatter> Annotate<T> {
    pub fn formatter<F>(self, options: FormatterOptions, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        let target = self.target().clone();
        self.implements::<dyn Formatter, _>(|it| it as Arc<dyn Formatter>)
            .service_named("Formatter", construct)?;
        FORMATTER.set(Some(options), &target);
        Ok(())
    }
}

/// A resolved formatter with its options, as attached to a request.
#[derive(Clone)]
pub(crate) struct FormatterEntry {
    pub(crate) options: FormatterOptions,
    pub(crate) formatter: Arc<dyn Formatter>,
}

impl FormatterEntry {
    pub(crate) fn new(options: FormatterOptions, formatter: Arc<dyn Formatter>) -> Self {
        Self { options, formatter }
    }
}
