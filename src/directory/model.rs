//! Addresses an account may legitimately send from.

use std::collections::BTreeSet;

use serde_json::Value;

/// Keys under which a directory user card may list extra addresses.
const ALIAS_KEYS: &[&str] = &["aliases", "emails", "alternateEmails"];

/// Primary mailbox plus aliases, normalized to trimmed lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountAliasSet {
    primary: Option<String>,
    addresses: BTreeSet<String>,
}

impl AccountAliasSet {
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for address in addresses {
            set.insert(address.as_ref());
        }
        set
    }

    /// Build from a directory user card.
    ///
    /// Accepts `email` as the primary address, the alias lists in
    /// [`ALIAS_KEYS`] (plain strings or `{ "address": .. }` objects) and
    /// `contacts` entries of type `email`. A bare login alias is qualified
    /// with the primary address's domain.
    pub fn from_user_card(card: &Value) -> Self {
        let mut set = Self::default();

        let primary = card.get("email").and_then(Value::as_str).map(normalize);
        let domain = primary
            .as_deref()
            .and_then(|p| p.split_once('@'))
            .map(|(_, d)| d.to_string());
        if let Some(primary) = primary.filter(|p| !p.is_empty()) {
            set.addresses.insert(primary.clone());
            set.primary = Some(primary);
        }

        for key in ALIAS_KEYS {
            let Some(items) = card.get(*key).and_then(Value::as_array) else {
                continue;
            };
            for item in items {
                let raw = match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(obj) => obj.get("address").and_then(Value::as_str),
                    _ => None,
                };
                if let Some(raw) = raw {
                    set.insert_qualified(raw, domain.as_deref());
                }
            }
        }

        if let Some(contacts) = card.get("contacts").and_then(Value::as_array) {
            for contact in contacts {
                if contact.get("type").and_then(Value::as_str) != Some("email") {
                    continue;
                }
                if let Some(value) = contact.get("value").and_then(Value::as_str) {
                    set.insert(value);
                }
            }
        }

        set
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, email: &str) -> bool {
        let needle = normalize(email);
        !needle.is_empty() && self.addresses.contains(&needle)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    fn insert(&mut self, address: &str) {
        let address = normalize(address);
        if !address.is_empty() {
            self.addresses.insert(address);
        }
    }

    fn insert_qualified(&mut self, alias: &str, domain: Option<&str>) {
        match domain {
            Some(domain) if !alias.contains('@') && !alias.trim().is_empty() => {
                self.insert(&format!("{}@{}", alias.trim(), domain));
            }
            _ => self.insert(alias),
        }
    }
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}
