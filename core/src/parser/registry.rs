//! Known tag keys with display metadata and advisory value checks.
//!
//! Unknown keys are still accepted by the parser; the registry only drives
//! suggestions and [`validate_note`](super::validate_note) warnings.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    Display,
    Credential,
    Link,
    Finance,
    General,
}

pub type ValueCheck = fn(&str) -> Result<(), String>;

#[derive(Debug, Clone, Copy)]
pub struct TagDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub category: TagCategory,
    pub icon: &'static str,
    pub example: &'static str,
    pub validate: ValueCheck,
}

fn any(_: &str) -> Result<(), String> {
    Ok(())
}

fn looks_like_url(value: &str) -> Result<(), String> {
    if value.contains(char::is_whitespace) || !value.contains('.') {
        return Err(format!("'{value}' does not look like a URL"));
    }
    Ok(())
}

fn looks_like_email(value: &str) -> Result<(), String> {
    match value.split_once('@') {
        Some((user, host)) if !user.is_empty() && host.contains('.') => Ok(()),
        _ => Err(format!("'{value}' does not look like an email address")),
    }
}

fn boolean(value: &str) -> Result<(), String> {
    match value {
        "true" | "false" | "1" | "0" => Ok(()),
        _ => Err(format!("expected true/false, got '{value}'")),
    }
}

fn base32_secret(value: &str) -> Result<(), String> {
    let valid = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .all(|c| matches!(c.to_ascii_uppercase(), 'A'..='Z' | '2'..='7' | '='));
    if valid {
        Ok(())
    } else {
        Err("TOTP secret should be base32 (A-Z, 2-7)".to_string())
    }
}

fn comma_list(value: &str) -> Result<(), String> {
    if value.split(',').all(|item| !item.trim().is_empty()) {
        Ok(())
    } else {
        Err("list contains an empty entry".to_string())
    }
}

fn card_triplet(value: &str) -> Result<(), String> {
    let parts: Vec<&str> = value.split('-').map(str::trim).collect();
    if parts.len() != 3 {
        return Err("card should be number-expiry-code".to_string());
    }
    if !parts[0].chars().all(|c| c.is_ascii_digit() || c == ' ') {
        return Err("card number should contain digits only".to_string());
    }
    Ok(())
}

fn color(value: &str) -> Result<(), String> {
    let hex = value
        .strip_prefix('#')
        .is_some_and(|h| matches!(h.len(), 3 | 6) && h.chars().all(|c| c.is_ascii_hexdigit()));
    if hex || value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a color name or #hex value"))
    }
}

fn date(value: &str) -> Result<(), String> {
    let shape_ok = value.chars().any(|c| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '/' | '.'));
    if shape_ok {
        Ok(())
    } else {
        Err(format!("'{value}' does not look like a date"))
    }
}

pub static TAGS: &[TagDescriptor] = &[
    TagDescriptor {
        name: "title",
        display_name: "Title",
        description: "Note title",
        category: TagCategory::Display,
        icon: "T",
        example: "#@title=My Note",
        validate: any,
    },
    TagDescriptor {
        name: "tags",
        display_name: "Tags",
        description: "Comma-separated custom tags",
        category: TagCategory::Display,
        icon: "#",
        example: "#@tags=work,personal",
        validate: comma_list,
    },
    TagDescriptor {
        name: "pin",
        display_name: "Pin",
        description: "Pin the note to the top",
        category: TagCategory::Display,
        icon: "★",
        example: "#@pin=true",
        validate: boolean,
    },
    TagDescriptor {
        name: "icon",
        display_name: "Icon",
        description: "Custom icon",
        category: TagCategory::Display,
        icon: "◆",
        example: "#@icon=🔑",
        validate: any,
    },
    TagDescriptor {
        name: "color",
        display_name: "Color",
        description: "Note color",
        category: TagCategory::Display,
        icon: "●",
        example: "#@color=#ff8800",
        validate: color,
    },
    TagDescriptor {
        name: "bookmark",
        display_name: "Bookmark",
        description: "Bookmark or URL",
        category: TagCategory::Link,
        icon: "🔖",
        example: "#@bookmark=https://example.com",
        validate: looks_like_url,
    },
    TagDescriptor {
        name: "url",
        display_name: "URL",
        description: "Website URL",
        category: TagCategory::Link,
        icon: "🌐",
        example: "#@url=https://example.com",
        validate: looks_like_url,
    },
    TagDescriptor {
        name: "domains",
        display_name: "Domains",
        description: "Related domains",
        category: TagCategory::Link,
        icon: "🌐",
        example: "#@domains=example.com,login.example.com",
        validate: comma_list,
    },
    TagDescriptor {
        name: "qrcode",
        display_name: "QR Code",
        description: "Text rendered as a QR code",
        category: TagCategory::Link,
        icon: "▦",
        example: "#@qrcode=https://example.com",
        validate: any,
    },
    TagDescriptor {
        name: "email",
        display_name: "Email",
        description: "Email address",
        category: TagCategory::Credential,
        icon: "✉",
        example: "#@email=user@example.com",
        validate: looks_like_email,
    },
    TagDescriptor {
        name: "username",
        display_name: "Username",
        description: "Username",
        category: TagCategory::Credential,
        icon: "👤",
        example: "#@username=johndoe",
        validate: any,
    },
    TagDescriptor {
        name: "password",
        display_name: "Password",
        description: "Password field",
        category: TagCategory::Credential,
        icon: "🔑",
        example: "#@password=secret123",
        validate: any,
    },
    TagDescriptor {
        name: "2fa",
        display_name: "2FA",
        description: "2FA/TOTP secret",
        category: TagCategory::Credential,
        icon: "🛡",
        example: "#@2fa=JBSWY3DPEHPK3PXP",
        validate: base32_secret,
    },
    TagDescriptor {
        name: "totp",
        display_name: "TOTP",
        description: "TOTP secret",
        category: TagCategory::Credential,
        icon: "🛡",
        example: "#@totp=JBSWY3DPEHPK3PXP",
        validate: base32_secret,
    },
    TagDescriptor {
        name: "apikey",
        display_name: "API Key",
        description: "API key",
        category: TagCategory::Credential,
        icon: "🗝",
        example: "#@apikey=sk_live_xxx",
        validate: any,
    },
    TagDescriptor {
        name: "secret",
        display_name: "Secret",
        description: "Secret value",
        category: TagCategory::Credential,
        icon: "🔒",
        example: "#@secret=hunter2",
        validate: any,
    },
    TagDescriptor {
        name: "wifi",
        display_name: "WiFi",
        description: "WiFi credentials",
        category: TagCategory::Credential,
        icon: "📶",
        example: "#@wifi=HomeNetwork:password",
        validate: any,
    },
    TagDescriptor {
        name: "crypto",
        display_name: "Crypto",
        description: "Cryptocurrency tracking",
        category: TagCategory::Finance,
        icon: "₿",
        example: "#@crypto=bitcoin,ethereum",
        validate: comma_list,
    },
    TagDescriptor {
        name: "card",
        display_name: "Card",
        description: "Card details as number-expiry-code",
        category: TagCategory::Finance,
        icon: "💳",
        example: "#@card=4111111111111111-12/27-123",
        validate: card_triplet,
    },
    TagDescriptor {
        name: "date",
        display_name: "Date",
        description: "Date",
        category: TagCategory::General,
        icon: "📅",
        example: "#@date=2024-01-31",
        validate: date,
    },
    TagDescriptor {
        name: "address",
        display_name: "Address",
        description: "Postal address",
        category: TagCategory::General,
        icon: "📍",
        example: "#@address=1 Main St, Springfield",
        validate: any,
    },
];

/// Looks up a tag by key, case-insensitively.
pub fn descriptor(name: &str) -> Option<&'static TagDescriptor> {
    TAGS.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

pub fn suggestions(category: Option<TagCategory>) -> impl Iterator<Item = &'static TagDescriptor> {
    TAGS.iter()
        .filter(move |t| category.is_none_or(|c| t.category == c))
}
