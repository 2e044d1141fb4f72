//! The multi-field record model: named fields with sensitivity and kind,
//! environment-variable bindings, and free-form metadata. All three are
//! JSON-encoded before sealing, independently of each other.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    pub value: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Field {
    /// A plain, non-sensitive field with no extra attributes.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sensitive: false,
            kind: None,
            input_type: None,
            aliases: Vec::new(),
            hint: None,
        }
    }

    /// A field flagged sensitive, as used for the legacy single-value slot.
    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            sensitive: true,
            ..Self::plain(value)
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.url.is_none()
    }
}

pub type Fields = BTreeMap<String, Field>;
pub type Bindings = BTreeMap<String, String>;

pub fn encode_fields(fields: &Fields) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(fields)?)
}

pub fn decode_fields(bytes: &[u8]) -> Result<Fields> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_bindings(bindings: &Bindings) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(bindings)?)
}

pub fn decode_bindings(bytes: &[u8]) -> Result<Bindings> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_metadata(metadata: &Metadata) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(metadata)?)
}

pub fn decode_metadata(bytes: &[u8]) -> Result<Metadata> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_roundtrip_through_json() {
        let mut fields = Fields::new();
        fields.insert("host".to_string(), Field::plain("db.internal"));
        fields.insert("password".to_string(), Field::secret("hunter2"));

        let bytes = encode_fields(&fields).unwrap();
        let back = decode_fields(&bytes).unwrap();
        assert_eq!(back.get("password").unwrap().value, "hunter2");
        assert!(back.get("password").unwrap().sensitive);
        assert!(!back.get("host").unwrap().sensitive);
    }

    #[test]
    fn metadata_empty_when_unset() {
        assert!(Metadata::default().is_empty());
        let with_notes = Metadata { notes: Some("hi".to_string()), url: None };
        assert!(!with_notes.is_empty());
    }
}
