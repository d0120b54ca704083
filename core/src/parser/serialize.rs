use super::NoteType;
use crate::types::Fields;

const BODY_KEYS: [&str; 3] = ["content", "note", "body"];

fn leading_keys(note_type: NoteType) -> &'static [&'static str] {
    match note_type {
        NoteType::Password => &["email", "username", "password", "2fa", "totp", "domains"],
        NoteType::Bookmark => &["bookmark", "url"],
        NoteType::Crypto => &["crypto"],
        NoteType::Note => &[],
    }
}

/// Renders structured fields as note text.
///
/// `title` comes first, then the keys that mark `note_type`, then any other
/// alphanumeric key in sorted order. `content`/`note`/`body` become the free
/// text after a blank line. Empty values and keys that cannot be written as a
/// directive are dropped.
pub fn serialize(note_type: NoteType, fields: &Fields) -> String {
    let lookup = |key: &str| {
        fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    };

    let mut ordered: Vec<String> = Vec::new();
    for key in std::iter::once(&"title").chain(leading_keys(note_type)) {
        if lookup(key).is_some() {
            ordered.push(key.to_string());
        }
    }

    let mut rest: Vec<String> = fields
        .keys()
        .map(|k| k.to_lowercase())
        .filter(|k| !ordered.contains(k) && !BODY_KEYS.contains(&k.as_str()))
        .collect();
    rest.sort();
    rest.dedup();
    ordered.extend(rest);

    let mut lines = Vec::new();
    for key in &ordered {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            continue;
        }
        let Some(value) = lookup(key) else { continue };
        let value = value.replace(['\r', '\n'], " ");
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        lines.push(format!("#@{key}={value}"));
    }

    let body: Vec<&str> = BODY_KEYS
        .iter()
        .filter_map(|key| lookup(key))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect();

    let mut out = lines.join("\n");
    if !body.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&body.join("\n\n"));
    }
    out
}
