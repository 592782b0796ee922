use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SiftError;

/// Hardcoded field patterns, compiled once and reused throughout the application.
/// Every pattern is anchored: a token has to match as a whole.

pub static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$").unwrap()
});

pub static NETWORK_ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9][0-9]|[0-9])\.){3}(25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9][0-9]|[0-9])$",
    )
    .unwrap()
});

pub static LOCATOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:[a-zA-Z0-9$-_@.&+!*(),]|%[0-9a-fA-F]{2})+$").unwrap()
});

// Leading plus, ITU country code, then up to 14 subscriber digits
pub static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\+(9[976][0-9]|8[987530][0-9]|6[987][0-9]|5[90][0-9]|42[0-9]|3[875][0-9]|2[98654321][0-9]|9[8543210]|8[6421]|6[6543210]|5[87654321]|4[987654310]|3[9643210]|2[70]|7|1)[0-9]{1,14}$",
    )
    .unwrap()
});

pub static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9@$!#%*?&._-]{2,50}$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Identifier,
    Secret,
    NetworkAddress,
    Locator,
    Phone,
    Other,
}

/// Attribute priority once the key slot is settled.
const ATTRIBUTE_PRIORITY: [FieldKind; 4] = [
    FieldKind::NetworkAddress,
    FieldKind::Locator,
    FieldKind::Phone,
    FieldKind::Secret,
];

impl FieldKind {
    pub fn matches(self, token: &str) -> bool {
        match self {
            FieldKind::Identifier => IDENTIFIER_PATTERN.is_match(token),
            FieldKind::Secret => SECRET_PATTERN.is_match(token),
            FieldKind::NetworkAddress => NETWORK_ADDRESS_PATTERN.is_match(token),
            FieldKind::Locator => LOCATOR_PATTERN.is_match(token),
            FieldKind::Phone => PHONE_PATTERN.is_match(token),
            FieldKind::Other => false,
        }
    }

    pub fn can_be_key(self) -> bool {
        self != FieldKind::Other
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Identifier => "email",
            FieldKind::Secret => "password",
            FieldKind::NetworkAddress => "ip",
            FieldKind::Locator => "url",
            FieldKind::Phone => "phone_number",
            FieldKind::Other => "else",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldKind {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" | "key" | "identifier" => Ok(FieldKind::Identifier),
            "password" | "secret" => Ok(FieldKind::Secret),
            "ip" | "network_address" => Ok(FieldKind::NetworkAddress),
            "url" | "locator" => Ok(FieldKind::Locator),
            "phone_number" | "phone" => Ok(FieldKind::Phone),
            _ => Err(SiftError::InvalidKeyField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Key,
    Attribute(FieldKind),
}

/// Classify a token against the chosen key field first, then the fixed attribute priority.
pub fn classify_token(token: &str, key_field: FieldKind) -> TokenClass {
    if key_field.matches(token) {
        return TokenClass::Key;
    }
    TokenClass::Attribute(classify_attribute(token))
}

/// First-match-wins over network address, locator, phone, secret; anything else is `Other`.
pub fn classify_attribute(token: &str) -> FieldKind {
    ATTRIBUTE_PRIORITY
        .iter()
        .copied()
        .find(|kind| kind.matches(token))
        .unwrap_or(FieldKind::Other)
}
