use super::{NoteType, parse, registry, tags};
use std::collections::BTreeMap;

/// Advisory warnings for a note. Never blocks a save.
pub fn validate_note(raw: &str) -> Vec<String> {
    let parsed = parse(raw);
    let tags = &parsed.tags;
    let mut warnings = Vec::new();

    if tags.has("password") && !tags.has("email") && !tags.has("username") {
        warnings.push("Password found but no email or username specified".to_string());
    }

    if (tags.has("2fa") || tags.has("totp")) && !tags.has("password") {
        warnings.push("2FA secret found but no password specified".to_string());
    }

    if parsed.note_type == NoteType::Bookmark && !tags.has("bookmark") && !tags.has("url") {
        warnings.push("Bookmark detected but no URL specified".to_string());
    }

    let directives = tags::scan(raw);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (key, _) in &directives {
        *counts.entry(key.as_str()).or_default() += 1;
    }
    for (key, count) in counts.iter().filter(|(_, c)| **c > 1) {
        warnings.push(format!(
            "Duplicate tag found: #@{key} (appears {count} times)"
        ));
    }

    for (key, value) in tags.iter() {
        let Some(descriptor) = registry::descriptor(key) else {
            continue;
        };
        if let Err(reason) = (descriptor.validate)(value.as_str()) {
            warnings.push(format!("#@{key}: {reason}"));
        }
    }

    warnings
}
