//! Reads the signature CSV (`userId,email,signature[,lang]`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::error::InputError;
use crate::input::row::RawRow;

const REQUIRED_COLUMNS: [&str; 3] = ["userId", "email", "signature"];
const LANG_COLUMN: &str = "lang";

/// Column positions resolved from the header row.
struct Columns {
    user_id: usize,
    email: usize,
    signature: usize,
    lang: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, InputError> {
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        if names.iter().all(|n| n.is_empty()) {
            return Err(InputError::MissingHeader);
        }

        let find = |name: &str| names.iter().position(|n| *n == name);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| find(**c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(InputError::MissingColumns(missing));
        }

        Ok(Self {
            user_id: find("userId").unwrap_or_default(),
            email: find("email").unwrap_or_default(),
            signature: find("signature").unwrap_or_default(),
            lang: find(LANG_COLUMN),
        })
    }
}

/// Read every data row. Header problems abort; per-row checks happen later.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, InputError> {
    let mut csv = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(csv.headers()?)?;

    let mut rows = Vec::new();
    for (idx, record) in csv.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        rows.push(RawRow {
            row: idx + 1,
            user_id: field(columns.user_id),
            email: field(columns.email),
            signature: field(columns.signature),
            lang: columns.lang.map(field).unwrap_or_default(),
        });
    }

    debug!(rows = rows.len(), "CSV rows read");
    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> Result<Vec<RawRow>, InputError> {
    read_rows(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_in_order_with_optional_lang() {
        let data = "userId,email,signature,lang\n\
                    113,a@x.ru,Regards,en\n\
                    114,b@x.ru,\"Line one\nLine two\",\n";
        let rows = read_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].lang, "en");
        assert_eq!(rows[1].user_id, "114");
        assert_eq!(rows[1].signature, "Line one\nLine two");
        assert_eq!(rows[1].lang, "");
    }

    #[test]
    fn tolerates_bom_padding_and_column_order() {
        let data = "\u{feff} signature , email ,userId\nHi,a@x.ru,113\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows[0].user_id, "113");
        assert_eq!(rows[0].email, "a@x.ru");
        assert_eq!(rows[0].signature, "Hi");
        assert_eq!(rows[0].lang, "");
    }

    #[test]
    fn short_records_become_empty_fields() {
        let data = "userId,email,signature\n113,a@x.ru\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows[0].signature, "");
    }

    #[test]
    fn missing_columns_abort_the_read() {
        let err = read_rows("userId,signature\n1,x\n".as_bytes()).unwrap_err();
        match err {
            InputError::MissingColumns(cols) => assert_eq!(cols, vec!["email".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_has_no_header() {
        assert!(matches!(
            read_rows("".as_bytes()),
            Err(InputError::MissingHeader)
        ));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signatures.csv");
        std::fs::write(&path, "userId,email,signature\n113,a@x.ru,Hi\n").unwrap();

        let rows = read_rows_from_path(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
