use serde::{Deserialize, Serialize};

use crate::constants::{
    ATTRIBUTE_SEPARATOR, CENSOR_MASK, CENSOR_VISIBLE_CHARS, OTHER_GROUP, TABULAR_COLUMN_COUNT,
};
use crate::core::patterns::FieldKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub secret: String,
    pub network_address: String,
    pub locator: String,
    pub phone: String,
    pub other: String,
    pub domain_group: String,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            key: String::new(),
            secret: String::new(),
            network_address: String::new(),
            locator: String::new(),
            phone: String::new(),
            other: String::new(),
            domain_group: OTHER_GROUP.to_string(),
        }
    }
}

impl Record {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Append a value to the slot for `kind`.
    pub fn push_attribute(&mut self, kind: FieldKind, value: &str) {
        append_value(self.slot_mut(kind), value, false);
    }

    /// Append a value carried over from another line with the same key. Values already present
    /// in the slot are not repeated.
    pub fn merge_attribute(&mut self, kind: FieldKind, value: &str) {
        append_value(self.slot_mut(kind), value, true);
    }

    fn slot_mut(&mut self, kind: FieldKind) -> &mut String {
        match kind {
            FieldKind::Identifier => &mut self.key,
            FieldKind::Secret => &mut self.secret,
            FieldKind::NetworkAddress => &mut self.network_address,
            FieldKind::Locator => &mut self.locator,
            FieldKind::Phone => &mut self.phone,
            FieldKind::Other => &mut self.other,
        }
    }

    /// Non-empty attributes in column order, without the domain group.
    pub fn attributes(&self) -> Vec<&str> {
        [
            self.key.as_str(),
            self.secret.as_str(),
            self.network_address.as_str(),
            self.locator.as_str(),
            self.phone.as_str(),
            self.other.as_str(),
        ]
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect()
    }

    pub fn attribute_line(&self) -> String {
        self.attributes().join(ATTRIBUTE_SEPARATOR)
    }

    pub fn to_columns(&self) -> [String; TABULAR_COLUMN_COUNT] {
        [
            self.key.clone(),
            self.secret.clone(),
            self.network_address.clone(),
            self.locator.clone(),
            self.phone.clone(),
            self.other.clone(),
            self.domain_group.clone(),
        ]
    }

    pub fn from_columns(columns: &[String]) -> Option<Self> {
        if columns.len() != TABULAR_COLUMN_COUNT {
            return None;
        }
        Some(Self {
            key: columns[0].clone(),
            secret: columns[1].clone(),
            network_address: columns[2].clone(),
            locator: columns[3].clone(),
            phone: columns[4].clone(),
            other: columns[5].clone(),
            domain_group: columns[6].clone(),
        })
    }
}

fn append_value(slot: &mut String, value: &str, union: bool) {
    if slot.is_empty() {
        slot.push_str(value);
        return;
    }
    if union && slot.split(ATTRIBUTE_SEPARATOR).any(|existing| existing == value) {
        return;
    }
    slot.push_str(ATTRIBUTE_SEPARATOR);
    slot.push_str(value);
}

/// Mask a secret down to its first characters followed by a fixed suffix.
pub fn censor_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(CENSOR_VISIBLE_CHARS).collect();
    format!("{}{}", visible, CENSOR_MASK)
}

/// One labeled line group: either a typed record or the raw tokens with the key first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Labeled(Record),
    Raw(Vec<String>),
}

impl Row {
    pub fn key(&self) -> &str {
        match self {
            Row::Labeled(record) => &record.key,
            Row::Raw(tokens) => tokens.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn attribute_line(&self) -> String {
        match self {
            Row::Labeled(record) => record.attribute_line(),
            Row::Raw(tokens) => tokens.join(ATTRIBUTE_SEPARATOR),
        }
    }

    /// Tabular form of the row, tagged with the group it was classified into.
    pub fn to_record(&self, domain_group: &str) -> Record {
        let mut record = match self {
            Row::Labeled(record) => record.clone(),
            Row::Raw(tokens) => {
                let mut record = Record::with_key(tokens.first().cloned().unwrap_or_default());
                for token in tokens.iter().skip(1) {
                    record.push_attribute(FieldKind::Other, token);
                }
                record
            }
        };
        record.domain_group = domain_group.to_string();
        record
    }
}
