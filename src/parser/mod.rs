//! Definition parsing (form XML, FetchXML)

mod field_extractor;

pub use field_extractor::{
    extract_fields, extract_form_fields, extract_view_columns, DefinitionKind,
};
