//! Signature set as stored by the mail service (`sender_info` payload).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SignPosition;

/// One signature in a user's set.
///
/// Unknown fields returned by the service are kept in `extra` and written back
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureEntry {
    pub text: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub is_default: bool,
    /// Sender addresses this signature is bound to. Empty means unbound.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SignatureEntry {
    pub fn new(text: impl Into<String>, lang: impl Into<String>, address: Option<&str>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            is_default: true,
            emails: address.map(|a| vec![a.to_string()]).unwrap_or_default(),
            extra: Map::new(),
        }
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey::from_parts(&self.lang, self.emails.iter().map(String::as_str))
    }

    pub fn has_lang(&self, lang: &str) -> bool {
        normalize_lang(&self.lang) == normalize_lang(lang)
    }
}

/// Case-folded language tag, shared by slot identity and default-flag checks.
fn normalize_lang(lang: &str) -> String {
    lang.trim().to_lowercase()
}

/// Identity of an entry inside a set: language plus bound addresses,
/// compared case-insensitively and order-independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    lang: String,
    addresses: Vec<String>,
}

impl SlotKey {
    /// Slot for a single address, or the unbound slot when `address` is `None`.
    pub fn new(lang: &str, address: Option<&str>) -> Self {
        Self::from_parts(lang, address)
    }

    fn from_parts<'a>(lang: &str, addresses: impl IntoIterator<Item = &'a str>) -> Self {
        let mut addresses: Vec<String> = addresses
            .into_iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        addresses.sort();
        addresses.dedup();
        Self {
            lang: normalize_lang(lang),
            addresses,
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn is_unbound(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// A user's complete signature configuration.
///
/// The service only supports whole-set writes, so this is always fetched,
/// edited in memory and written back in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSet {
    #[serde(default)]
    pub signs: Vec<SignatureEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_position: Option<SignPosition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SignatureSet {
    /// What the service reports for a mailbox that never had signatures.
    pub fn empty() -> Self {
        Self {
            signs: Vec::new(),
            sign_position: Some(SignPosition::Bottom),
            extra: Map::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.signs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signs.is_empty()
    }

    pub fn entry(&self, slot: &SlotKey) -> Option<&SignatureEntry> {
        self.signs.iter().find(|e| e.slot() == *slot)
    }

    /// Request body for the write call.
    pub fn to_body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_payload_and_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "fromName": "Andrey Ivanov",
            "signPosition": "under",
            "signs": [
                {"text": "Regards", "lang": "en", "isDefault": true, "emails": ["a@x.ru"]},
                {"text": "С уважением", "lang": "ru", "isDefault": false, "customFlag": 1}
            ]
        });
        let set: SignatureSet = serde_json::from_value(raw).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.sign_position, Some(SignPosition::Under));
        assert_eq!(set.extra["fromName"], "Andrey Ivanov");
        assert_eq!(set.signs[1].extra["customFlag"], 1);

        let body = set.to_body();
        assert_eq!(body["fromName"], "Andrey Ivanov");
        assert_eq!(body["signs"][1]["customFlag"], 1);
        assert!(body["signs"][1].get("emails").is_none());
    }

    #[test]
    fn missing_fields_default() {
        let set: SignatureSet = serde_json::from_str("{}").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.sign_position, None);
    }

    #[test]
    fn slot_key_ignores_case_and_order() {
        let a = SignatureEntry {
            emails: vec!["B@x.ru".into(), "a@x.ru".into()],
            ..SignatureEntry::new("t", "RU", None)
        };
        let b = SignatureEntry {
            emails: vec!["a@X.ru".into(), "b@x.ru".into()],
            ..SignatureEntry::new("t", "ru", None)
        };
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn unbound_and_bound_slots_differ() {
        let unbound = SlotKey::new("ru", None);
        let bound = SlotKey::new("ru", Some("a@x.ru"));
        assert!(unbound.is_unbound());
        assert_ne!(unbound, bound);
        assert_eq!(bound.lang(), "ru");
    }

    #[test]
    fn language_match_agrees_with_slot_identity_for_non_ascii_tags() {
        let entry = SignatureEntry::new("Поздрав", "СР", Some("a@x.ru"));
        let slot = SlotKey::new("ср", Some("a@x.ru"));

        assert_eq!(entry.slot(), slot);
        assert!(entry.has_lang(slot.lang()));
        assert!(!entry.has_lang("sr"));
    }
}
