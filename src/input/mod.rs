//! CSV input: reading records and normalizing them into signature requests.

pub mod reader;
pub mod row;

pub use reader::{read_rows, read_rows_from_path};
pub use row::{RawRow, SignatureRow};
