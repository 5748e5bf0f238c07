use super::FormatterEntry;
use super::json::JSON;
use std::cmp::Ordering;

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    pub type_: String,
    pub subtype: String,
    pub quality: f32,
}

impl MediaRange {
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(';');
        let (type_, subtype) = parts.next()?.trim().split_once('/')?;

        let mut quality = 1.0;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("q") {
                    quality = value.trim().parse::<f32>().unwrap_or(0.0).clamp(0.0, 1.0);
                }
            }
        }

        Some(Self {
            type_: type_.trim().to_ascii_lowercase(),
            subtype: subtype.trim().to_ascii_lowercase(),
            quality,
        })
    }

    pub fn is_any(&self) -> bool {
        self.type_ == "*" && self.subtype == "*"
    }

    /// Whether `media_type` (`type/subtype`, parameters ignored) falls in
    /// this range.
    pub fn matches(&self, media_type: &str) -> bool {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        let Some((type_, subtype)) = essence.split_once('/') else {
            return false;
        };

        (self.type_ == "*" || self.type_.eq_ignore_ascii_case(type_))
            && (self.subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype))
    }

    fn specificity(&self) -> u8 {
        match (self.type_.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }
}

/// Parses an `Accept` header, most preferred first. Ranges with `q=0` are
/// dropped; ties keep header order.
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = header
        .split(',')
        .filter_map(MediaRange::parse)
        .filter(|range| range.quality > 0.0)
        .collect();

    ranges.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.specificity().cmp(&a.specificity()))
    });
    ranges
}

/// Picks the formatter for a request.
///
/// The most preferred range that any formatter accepts wins; among
/// formatters accepting it the last registered one is used. Without an
/// `Accept` header, for `*/*` and when nothing matches the last formatter
/// accepting JSON answers.
pub(crate) fn negotiate<'a>(
    accept: Option<&str>,
    entries: &'a [FormatterEntry],
) -> Option<&'a FormatterEntry> {
    let fallback = entries
        .iter()
        .rev()
        .find(|entry| entry.options.accepts.iter().any(|it| it == JSON))
        .or_else(|| entries.first());

    let Some(accept) = accept else {
        return fallback;
    };

    for range in parse_accept(accept) {
        if range.is_any() {
            return fallback;
        }

        let chosen = entries
            .iter()
            .rev()
            .find(|entry| entry.options.accepts.iter().any(|it| range.matches(it)));
        if chosen.is_some() {
            return chosen;
        }
    }

    fallback
}
