use regex::Regex;
use std::sync::LazyLock;

/// `#@key=value`: alphanumeric key, value up to (not including) the newline.
pub(crate) static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#@([a-zA-Z0-9]+)=([^\n]+)").expect("valid tag regex"));

/// Payment card directive value, `number-expiry-code`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub expiry: String,
    pub code: String,
}

impl CardDetails {
    /// Splits on `-`; missing parts stay empty, extra parts are ignored.
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split('-').map(|p| p.trim().to_string());
        Self {
            number: parts.next().unwrap_or_default(),
            expiry: parts.next().unwrap_or_default(),
            code: parts.next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Text(String),
    Card { value: String, card: CardDetails },
}

impl TagValue {
    fn from_directive(key: &str, value: &str) -> Self {
        if key == "card" {
            TagValue::Card {
                value: value.to_string(),
                card: CardDetails::parse(value),
            }
        } else {
            TagValue::Text(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TagValue::Text(text) => text,
            TagValue::Card { value, .. } => value,
        }
    }
}

/// Lower-cased tag keys in first-seen order; a repeated key keeps its
/// position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: Vec<(String, TagValue)>,
}

impl TagMap {
    pub fn insert(&mut self, key: &str, value: TagValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).map(TagValue::as_str)
    }

    /// Present with a non-empty value.
    pub fn has(&self, key: &str) -> bool {
        self.get_text(key).is_some_and(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every directive in scan order as `(lower-cased key, trimmed value)`.
pub(crate) fn scan(raw: &str) -> Vec<(String, String)> {
    TAG_PATTERN
        .captures_iter(raw)
        .map(|c| (c[1].to_lowercase(), c[2].trim().to_string()))
        .collect()
}

pub(crate) fn collect(raw: &str) -> TagMap {
    let mut tags = TagMap::default();
    for (key, value) in scan(raw) {
        let value = TagValue::from_directive(&key, &value);
        tags.insert(&key, value);
    }
    tags
}

pub(crate) fn strip(raw: &str) -> String {
    TAG_PATTERN.replace_all(raw, "").trim().to_string()
}
