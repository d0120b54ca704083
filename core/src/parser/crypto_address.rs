use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A substring that structurally looks like a coin address. No checksum is
/// verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoAddress {
    pub currency: &'static str,
    pub subtype: &'static str,
    pub address: String,
    pub icon: &'static str,
}

struct AddressFamily {
    currency: &'static str,
    subtype: &'static str,
    icon: &'static str,
    pattern: &'static str,
    case_insensitive: bool,
}

const FAMILIES: &[AddressFamily] = &[
    AddressFamily {
        currency: "Bitcoin",
        subtype: "Taproot",
        icon: "₿",
        pattern: r"(?i)\b(bc1p[a-z0-9]{58})\b",
        case_insensitive: true,
    },
    AddressFamily {
        currency: "Bitcoin",
        subtype: "Bech32 (Native SegWit)",
        icon: "₿",
        pattern: r"(?i)\b(bc1[a-z0-9]{39,59})\b",
        case_insensitive: true,
    },
    AddressFamily {
        currency: "Bitcoin",
        subtype: "Legacy (P2PKH)",
        icon: "₿",
        pattern: r"\b(1[a-km-zA-HJ-NP-Z1-9]{25,34})\b",
        case_insensitive: false,
    },
    AddressFamily {
        currency: "Bitcoin",
        subtype: "SegWit (P2SH)",
        icon: "₿",
        pattern: r"\b(3[a-km-zA-HJ-NP-Z1-9]{25,34})\b",
        case_insensitive: false,
    },
    AddressFamily {
        currency: "Ethereum",
        subtype: "ERC-20",
        icon: "Ξ",
        pattern: r"\b(0x[a-fA-F0-9]{40})\b",
        case_insensitive: true,
    },
    AddressFamily {
        currency: "Litecoin",
        subtype: "Bech32 (ltc1...)",
        icon: "Ł",
        pattern: r"(?i)\b(ltc1[qpzry9x8gf2tvdw0s3jn54khce6mua7l]{39,59})\b",
        case_insensitive: true,
    },
    AddressFamily {
        currency: "Litecoin",
        subtype: "Legacy (L...)",
        icon: "Ł",
        pattern: r"\b(L[a-km-zA-HJ-NP-Z1-9]{26,33})\b",
        case_insensitive: false,
    },
    AddressFamily {
        currency: "Litecoin",
        subtype: "SegWit (M...)",
        icon: "Ł",
        pattern: r"\b(M[a-km-zA-HJ-NP-Z1-9]{26,33})\b",
        case_insensitive: false,
    },
    AddressFamily {
        currency: "Solana",
        subtype: "Base58",
        icon: "◎",
        pattern: r"\b([1-9A-HJ-NP-Za-km-z]{32,44})\b",
        case_insensitive: false,
    },
];

static COMPILED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FAMILIES
        .iter()
        .map(|f| Regex::new(f.pattern).expect("valid address regex"))
        .collect()
});

/// Scans every family in table order. An address already claimed by an
/// earlier family is not reported again.
pub fn extract_crypto_addresses(raw: &str) -> Vec<CryptoAddress> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for (family, regex) in FAMILIES.iter().zip(COMPILED.iter()) {
        for caps in regex.captures_iter(raw) {
            let address = &caps[1];
            let dedupe_key = if family.case_insensitive {
                address.to_lowercase()
            } else {
                address.to_string()
            };
            // Case-sensitive families also match a lower-cased earlier hit.
            if seen.contains(&dedupe_key) || seen.contains(&address.to_lowercase()) {
                continue;
            }
            seen.insert(dedupe_key);
            found.push(CryptoAddress {
                currency: family.currency,
                subtype: family.subtype,
                address: address.to_string(),
                icon: family.icon,
            });
        }
    }

    found
}
