mod parser;
mod types;

pub use parser::{parse_doctype, parse_doctype_str};
pub use types::{storage_type, Doctype, Field, FieldType, StorageType};
