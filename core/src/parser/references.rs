use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://[\w.-]+(?:\.[\w.-]+)+[\w\-._~:/?#\[\]@!$&'()*+,;=]*")
        .expect("valid url regex")
});

static YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/shorts/)([a-zA-Z0-9_-]{11})",
    )
    .expect("valid youtube regex")
});

static INSTAGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)instagram\.com/(?:p|reel)/([a-zA-Z0-9_-]+)").expect("valid instagram regex")
});

static TWITTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:twitter\.com|x\.com)/([a-zA-Z0-9_]+)/status/([0-9]+)")
        .expect("valid twitter regex")
});

static REDDIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)reddit\.com/r/([a-zA-Z0-9_]+)/comments/([a-zA-Z0-9]+)")
        .expect("valid reddit regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    YouTube { video_id: String },
    Instagram { post_id: String },
    Twitter { user: String, status_id: String },
    Reddit { subreddit: String, post_id: String },
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub url: String,
    pub kind: ReferenceKind,
}

impl ReferenceKind {
    fn detect(url: &str) -> Self {
        if let Some(c) = YOUTUBE.captures(url) {
            return ReferenceKind::YouTube {
                video_id: c[1].to_string(),
            };
        }
        if let Some(c) = INSTAGRAM.captures(url) {
            return ReferenceKind::Instagram {
                post_id: c[1].to_string(),
            };
        }
        if let Some(c) = TWITTER.captures(url) {
            return ReferenceKind::Twitter {
                user: c[1].to_string(),
                status_id: c[2].to_string(),
            };
        }
        if let Some(c) = REDDIT.captures(url) {
            return ReferenceKind::Reddit {
                subreddit: c[1].to_string(),
                post_id: c[2].to_string(),
            };
        }
        ReferenceKind::Generic
    }
}

/// URLs in first-seen order, duplicates (exact string) removed.
pub fn extract_references(raw: &str) -> Vec<Reference> {
    let mut seen = HashSet::new();
    URL_PATTERN
        .find_iter(raw)
        .map(|m| m.as_str())
        .filter(|url| seen.insert(*url))
        .map(|url| Reference {
            url: url.to_string(),
            kind: ReferenceKind::detect(url),
        })
        .collect()
}
