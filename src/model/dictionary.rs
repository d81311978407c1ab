//! The metadata dictionary artifact (`<solution> Metadata Dictionary.json`)

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AttributeType;
use crate::error::{DataverseError, Result};

/// Root of the dictionary document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataDictionary {
    pub environment: String,
    pub solution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub tables: Vec<DictionaryTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DictionaryTable {
    pub logical_name: String,
    pub display_name: String,
    pub schema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_id_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_name_attribute: Option<String>,
    pub forms: Vec<DictionaryForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<DictionaryView>,
    pub attributes: Vec<DictionaryAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DictionaryForm {
    pub form_id: Uuid,
    pub form_name: String,
    pub field_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DictionaryView {
    pub view_id: Uuid,
    pub view_name: String,
    pub fetch_xml: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DictionaryAttribute {
    pub logical_name: String,
    pub schema_name: String,
    pub display_name: String,
    pub attribute_type: AttributeType,
    pub is_custom: bool,
}

impl MetadataDictionary {
    pub fn new(environment: impl Into<String>, solution: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            solution: solution.into(),
            project_name: None,
            tables: Vec::new(),
        }
    }

    /// Read a dictionary previously written by [`crate::export::write_dictionary`]
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| DataverseError::DictionaryRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        serde_json::from_str(&content).map_err(|e| DataverseError::DictionaryRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn total_attributes(&self) -> usize {
        self.tables.iter().map(|t| t.attributes.len()).sum()
    }
}
