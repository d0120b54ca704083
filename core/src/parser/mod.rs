//! The `#@key=value` note micro-language.
//!
//! A note is free text in which any `#@key=value` token up to the end of its
//! line is a tag directive. Parsing strips the directives, collects them into
//! a [`TagMap`], classifies the note and extracts URLs and coin addresses from
//! the raw text. The result is a pure function of the text and is never stored.

mod crypto_address;
mod references;
pub mod registry;
mod serialize;
mod tags;
mod validate;

pub use crypto_address::{CryptoAddress, extract_crypto_addresses};
pub use references::{Reference, ReferenceKind, extract_references};
pub use serialize::serialize;
pub use tags::{CardDetails, TagMap, TagValue};
pub use validate::validate_note;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const UNTITLED: &str = "Untitled Note";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Crypto,
    Password,
    Bookmark,
    Note,
}

impl NoteType {
    pub const ALL: [NoteType; 4] = [
        NoteType::Crypto,
        NoteType::Password,
        NoteType::Bookmark,
        NoteType::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Crypto => "crypto",
            NoteType::Password => "password",
            NoteType::Bookmark => "bookmark",
            NoteType::Note => "note",
        }
    }

    /// Classifies by tag presence, first match wins.
    pub fn classify(tags: &TagMap) -> NoteType {
        if tags.has("crypto") {
            NoteType::Crypto
        } else if ["password", "email", "username", "2fa", "totp"]
            .iter()
            .any(|key| tags.has(key))
        {
            NoteType::Password
        } else if tags.has("bookmark") || tags.has("url") {
            NoteType::Bookmark
        } else {
            NoteType::Note
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown note type: {s}"))
    }
}

/// Structured view of a note's raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote {
    pub raw: String,
    pub tags: TagMap,
    /// Raw text with every directive removed, trimmed.
    pub clean_content: String,
    pub note_type: NoteType,
    pub title: String,
    pub references: Vec<Reference>,
    pub crypto_addresses: Vec<CryptoAddress>,
    pub pinned: bool,
    pub icon: Option<String>,
    pub custom_tags: Vec<String>,
}

impl ParsedNote {
    /// Text value of a tag. Card tags yield their dash-joined form.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get_text(key)
    }

    pub fn card(&self) -> Option<&CardDetails> {
        match self.tags.get("card")? {
            TagValue::Card { card, .. } => Some(card),
            TagValue::Text(_) => None,
        }
    }

    /// `domains` tag split on commas.
    pub fn domains(&self) -> Vec<String> {
        split_list(self.tag("domains"))
    }

    /// Coin ids from the `crypto` tag, lower-cased (`bitcoin,ethereum`).
    pub fn crypto_ids(&self) -> Vec<String> {
        split_list(self.tag("crypto"))
            .into_iter()
            .map(|id| id.to_lowercase())
            .collect()
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse(raw: &str) -> ParsedNote {
    let tags = tags::collect(raw);
    let clean_content = tags::strip(raw);
    let note_type = NoteType::classify(&tags);
    let title = resolve_title(&tags, note_type, &clean_content);

    let pinned = matches!(tags.get_text("pin"), Some("true" | "1"));
    let icon = tags
        .get_text("icon")
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let custom_tags = split_list(tags.get_text("tags"));

    ParsedNote {
        raw: raw.to_string(),
        references: extract_references(raw),
        crypto_addresses: extract_crypto_addresses(raw),
        tags,
        clean_content,
        note_type,
        title,
        pinned,
        icon,
        custom_tags,
    }
}

fn resolve_title(tags: &TagMap, note_type: NoteType, clean_content: &str) -> String {
    let non_empty = |key: &str| tags.get_text(key).filter(|v| !v.is_empty());

    if let Some(title) = non_empty("title") {
        return title.to_string();
    }

    if note_type == NoteType::Bookmark
        && let Some(url) = non_empty("bookmark").or_else(|| non_empty("url"))
    {
        return url.to_string();
    }

    if note_type == NoteType::Password
        && let Some(identifier) = non_empty("email").or_else(|| non_empty("username"))
    {
        let domain = split_list(tags.get_text("domains")).into_iter().next();
        return domain.unwrap_or_else(|| identifier.to_string());
    }

    clean_content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}
