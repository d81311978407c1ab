//! Web API response shapes and record decoding

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DataverseError, Result};

/// Decode the `value` array of an OData collection.
///
/// Records that fail to decode are logged and skipped.
pub(crate) fn collection<T: DeserializeOwned>(url: &str, body: Value) -> Result<Vec<T>> {
    let Value::Object(mut map) = body else {
        return Err(DataverseError::InvalidResponse {
            url: url.to_string(),
            message: "expected a JSON object".to_string(),
        });
    };
    let Some(Value::Array(items)) = map.remove("value") else {
        return Err(DataverseError::InvalidResponse {
            url: url.to_string(),
            message: "missing `value` array".to_string(),
        });
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(url, "Skipping malformed record: {}", e);
                None
            }
        })
        .collect())
}

/// Decode a single-entity response.
pub(crate) fn single<T: DeserializeOwned>(url: &str, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| DataverseError::InvalidResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// `Label` wrapper (`DisplayName.UserLocalizedLabel.Label`)
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocalizedLabel {
    #[serde(rename = "UserLocalizedLabel")]
    user_localized_label: Option<Label>,
}

#[derive(Debug, Default, Deserialize)]
struct Label {
    #[serde(rename = "Label")]
    label: Option<String>,
}

impl LocalizedLabel {
    pub(crate) fn text(&self) -> Option<&str> {
        self.user_localized_label
            .as_ref()
            .and_then(|l| l.label.as_deref())
    }
}

/// `{ "Value": ... }` wrapper used by managed properties and type names
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValueWrapper {
    #[serde(rename = "Value")]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SolutionRecord {
    pub solutionid: Uuid,
    pub uniquename: Option<String>,
    pub friendlyname: Option<String>,
    pub version: Option<String>,
    pub ismanaged: Option<bool>,
    #[serde(rename = "_publisherid_value")]
    pub publisher_id: Option<Uuid>,
    pub modifiedon: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SolutionComponentRecord {
    pub objectid: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EntityDefinitionRecord {
    pub logical_name: String,
    pub schema_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<LocalizedLabel>,
    pub object_type_code: Option<i32>,
    pub primary_id_attribute: Option<String>,
    pub primary_name_attribute: Option<String>,
    #[serde(default)]
    pub is_activity: Option<bool>,
    #[serde(default)]
    pub is_intersect: Option<bool>,
    pub metadata_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AttributeDefinitionRecord {
    pub logical_name: String,
    pub schema_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<LocalizedLabel>,
    pub attribute_type: Option<String>,
    #[serde(default)]
    pub attribute_type_name: Option<ValueWrapper>,
    #[serde(default)]
    pub is_valid_for_read: Option<bool>,
    #[serde(default)]
    pub is_custom_attribute: Option<bool>,
    #[serde(default)]
    pub required_level: Option<ValueWrapper>,
}

impl AttributeDefinitionRecord {
    /// Type token: the type name refines `Virtual` (images, files, ...)
    pub(crate) fn type_token(&self) -> Option<&str> {
        let type_name = self
            .attribute_type_name
            .as_ref()
            .and_then(|t| t.value.as_deref());
        match (self.attribute_type.as_deref(), type_name) {
            (Some("Virtual"), Some(name)) => Some(name),
            (Some(ty), _) => Some(ty),
            (None, name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LookupTargetsRecord {
    pub logical_name: String,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SystemFormRecord {
    pub formid: Uuid,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub form_type: Option<i64>,
    pub formxml: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SavedQueryRecord {
    pub savedqueryid: Uuid,
    pub name: Option<String>,
    pub isdefault: Option<bool>,
    pub querytype: Option<i64>,
    pub fetchxml: Option<String>,
}
