//! Canonical metadata records shared by every backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AttributeType;
use crate::metadata::FORM_TYPE_MAIN;

/// A versioned bundle of platform customizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub id: Uuid,
    pub unique_name: String,
    pub friendly_name: String,
    pub version: String,
    pub is_managed: bool,
    pub publisher_id: Option<Uuid>,
    pub modified_on: Option<DateTime<Utc>>,
}

/// Table (entity) metadata
///
/// `logical_name` is the stable identity. `display_name` already carries the
/// logical-name fallback when the backend had no label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub logical_name: String,
    pub display_name: String,
    pub schema_name: String,
    pub primary_id_attribute: Option<String>,
    pub primary_name_attribute: Option<String>,
    pub object_type_code: Option<i32>,
    pub metadata_id: Option<Uuid>,
}

/// Summary row returned when listing a solution's tables
pub type TableInfo = TableMetadata;

/// Attribute (column) metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    pub logical_name: String,
    pub display_name: String,
    pub schema_name: String,
    pub attribute_type: AttributeType,
    pub is_custom: bool,
    pub is_required: bool,
    /// Target table logical names, only for lookup-like attributes
    pub targets: Option<Vec<String>>,
}

/// A main or quick-view form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormMetadata {
    pub id: Uuid,
    pub name: String,
    /// `systemform.type`
    pub form_type: i64,
    pub definition: Option<String>,
    /// Referenced field logical names: lowercase, unique, sorted
    pub fields: Vec<String>,
}

impl FormMetadata {
    pub fn is_main(&self) -> bool {
        self.form_type == FORM_TYPE_MAIN
    }
}

/// A public view (saved query)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMetadata {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub definition: Option<String>,
    /// Referenced column logical names: lowercase, unique, sorted
    pub columns: Vec<String>,
}

/// Required levels that make an attribute mandatory
pub(crate) fn is_required_level(level: Option<&str>) -> bool {
    matches!(
        level,
        Some("SystemRequired") | Some("ApplicationRequired")
    )
}
