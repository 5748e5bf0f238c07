use super::{Formatter, FormatterOptions};
use crate::di::{Annotate, Annotated};
use serde_json::Value;

pub(crate) const JSON: &str = "application/json";

/// Compact JSON. Every request starts with it as the fallback formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, data: &Value) -> anyhow::Result<String> {
        Ok(serde_json::to_string(data)?)
    }
}

impl Annotated for JsonFormatter {
    fn annotate() -> crate::Result<()> {
        Annotate::<JsonFormatter>::new()
            .formatter(FormatterOptions::new([JSON], JSON), |_| Ok(JsonFormatter))
    }
}
