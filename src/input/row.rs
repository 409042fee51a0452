//! CSV records and their normalized form.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::RowError;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("email pattern compiles"));

/// A CSV record as read, fields trimmed but otherwise unchecked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRow {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub email: String,
    pub signature: String,
    pub lang: String,
}

/// A validated signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRow {
    pub row: usize,
    pub user_id: String,
    pub email: String,
    pub signature: String,
    /// Lowercased language tag; `None` selects the run's default language.
    pub lang: Option<String>,
}

impl SignatureRow {
    pub fn lang_or<'a>(&'a self, default_lang: &'a str) -> &'a str {
        self.lang.as_deref().unwrap_or(default_lang)
    }
}

impl RawRow {
    /// Validate required fields and normalize casing.
    pub fn normalize(&self) -> Result<SignatureRow, RowError> {
        let user_id = self.user_id.trim();
        let email = self.email.trim();
        let signature = self.signature.trim();

        if user_id.is_empty() {
            return Err(self.missing("userId"));
        }
        if email.is_empty() {
            return Err(self.missing("email"));
        }
        if signature.is_empty() {
            return Err(self.missing("signature"));
        }
        if !EMAIL_PATTERN.is_match(email) {
            return Err(RowError::InvalidEmail {
                row: self.row,
                email: email.to_string(),
            });
        }

        let lang = self.lang.trim().to_lowercase();
        Ok(SignatureRow {
            row: self.row,
            user_id: user_id.to_string(),
            email: email.to_string(),
            signature: signature.to_string(),
            lang: (!lang.is_empty()).then_some(lang),
        })
    }

    fn missing(&self, field: &'static str) -> RowError {
        RowError::MissingField {
            row: self.row,
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(user_id: &str, email: &str, signature: &str, lang: &str) -> RawRow {
        RawRow {
            row: 3,
            user_id: user_id.into(),
            email: email.into(),
            signature: signature.into(),
            lang: lang.into(),
        }
    }

    #[test]
    fn valid_row_is_trimmed_and_lang_lowercased() {
        let row = raw(" 113 ", " a@x.ru ", " Hi ", " EN ").normalize().unwrap();
        assert_eq!(row.user_id, "113");
        assert_eq!(row.email, "a@x.ru");
        assert_eq!(row.signature, "Hi");
        assert_eq!(row.lang.as_deref(), Some("en"));
        assert_eq!(row.row, 3);
    }

    #[test]
    fn empty_lang_falls_back_to_default() {
        let row = raw("113", "a@x.ru", "Hi", "  ").normalize().unwrap();
        assert_eq!(row.lang, None);
        assert_eq!(row.lang_or("ru"), "ru");
    }

    #[test]
    fn missing_required_fields_are_reported_by_name() {
        assert_eq!(
            raw("", "a@x.ru", "Hi", "").normalize(),
            Err(RowError::MissingField { row: 3, field: "userId" })
        );
        assert_eq!(
            raw("113", " ", "Hi", "").normalize(),
            Err(RowError::MissingField { row: 3, field: "email" })
        );
        assert_eq!(
            raw("113", "a@x.ru", "", "").normalize(),
            Err(RowError::MissingField { row: 3, field: "signature" })
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        for bad in ["a.ivanov", "a@@x.ru", "a ivanov@x.ru"] {
            assert!(
                matches!(raw("113", bad, "Hi", "").normalize(), Err(RowError::InvalidEmail { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
