//! Computes the next signature set for a user from the current one and a
//! single requested change. Pure: no I/O, total over normalized rows.

use tracing::debug;

use crate::config::{ReplaceScope, RunConfig, SignPosition, WriteMode};
use crate::signature::model::{SignatureEntry, SignatureSet, SlotKey};

/// Markup line break written in place of newlines.
pub const MARKUP_BREAK: &str = "<br>";

/// One row's worth of change, already validated.
#[derive(Debug, Clone, Copy)]
pub struct SignatureChange<'a> {
    /// Address to bind the signature to; `None` targets the unbound slot.
    pub address: Option<&'a str>,
    pub lang: &'a str,
    pub body: &'a str,
}

impl SignatureChange<'_> {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.lang, self.address)
    }
}

/// Merge/replace rules for one run.
#[derive(Debug, Clone, Copy)]
pub struct SignaturePolicy {
    mode: WriteMode,
    convert_newlines: bool,
    position: SignPosition,
}

impl SignaturePolicy {
    pub fn new(mode: WriteMode, convert_newlines: bool, position: SignPosition) -> Self {
        Self {
            mode,
            convert_newlines,
            position,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.mode, config.convert_newlines, config.position)
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Apply `change` with the run's configured mode.
    pub fn apply(&self, current: SignatureSet, change: &SignatureChange<'_>) -> SignatureSet {
        self.apply_with(current, change, self.mode)
    }

    /// Apply `change` with an explicit mode.
    pub fn apply_with(
        &self,
        mut current: SignatureSet,
        change: &SignatureChange<'_>,
        mode: WriteMode,
    ) -> SignatureSet {
        let body = if self.convert_newlines {
            convert_newlines(change.body)
        } else {
            change.body.to_string()
        };
        let slot = change.slot();
        let entry = SignatureEntry::new(body, slot.lang(), change.address);

        debug!(lang = slot.lang(), bound = !slot.is_unbound(), ?mode, "Applying signature change");

        match mode {
            WriteMode::Merge => {
                upsert(&mut current.signs, &slot, entry);
                current.sign_position = current.sign_position.or(Some(self.position));
            }
            WriteMode::Replace(ReplaceScope::Slot) => {
                current.signs.retain(|e| e.slot() != slot);
                clear_default(&mut current.signs, slot.lang());
                current.signs.push(entry);
                current.sign_position = Some(self.position);
            }
            WriteMode::Replace(ReplaceScope::All) => {
                current.signs = vec![entry];
                current.sign_position = Some(self.position);
            }
        }
        current
    }
}

/// Mode for the second and later rows of one user's batch.
///
/// A full replace wipes what the account held before the run, not what
/// earlier rows of the same run just wrote.
pub fn followup_mode(mode: WriteMode) -> WriteMode {
    match mode {
        WriteMode::Replace(ReplaceScope::All) => WriteMode::Replace(ReplaceScope::Slot),
        other => other,
    }
}

/// Replace newlines (real or the two-character `\n` escape) with `<br>`.
pub fn convert_newlines(text: &str) -> String {
    text.replace("\r\n", MARKUP_BREAK)
        .replace("\\n", MARKUP_BREAK)
        .replace('\n', MARKUP_BREAK)
}

fn clear_default(signs: &mut [SignatureEntry], lang: &str) {
    for sign in signs.iter_mut().filter(|s| s.has_lang(lang)) {
        sign.is_default = false;
    }
}

fn upsert(signs: &mut Vec<SignatureEntry>, slot: &SlotKey, entry: SignatureEntry) {
    clear_default(signs, slot.lang());

    match signs.iter().position(|s| s.slot() == *slot) {
        Some(idx) => {
            let existing = &mut signs[idx];
            existing.text = entry.text;
            existing.lang = entry.lang;
            existing.is_default = entry.is_default;
            existing.emails = entry.emails;

            // at most one entry per slot
            let mut seen = false;
            signs.retain(|s| {
                if s.slot() != *slot {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => signs.push(entry),
    }
}
