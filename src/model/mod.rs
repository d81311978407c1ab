//! Canonical metadata model

mod attribute_type;
mod dictionary;
mod elements;
mod relationship;

pub use attribute_type::{map_attribute_type, AttributeType};
pub use dictionary::{
    DictionaryAttribute, DictionaryForm, DictionaryTable, DictionaryView, MetadataDictionary,
};
pub(crate) use elements::is_required_level;
pub use elements::{
    AttributeMetadata, FormMetadata, Solution, TableInfo, TableMetadata, ViewMetadata,
};
pub use relationship::{
    ensure_valid_relationships, validate_relationships, Relationship, RelationshipIssue,
};
