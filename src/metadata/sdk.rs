//! Organization-service (SDK session) backend

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::{
    cancellable, label_or_logical, lookup_targets, resolve_attribute_type, sort_attributes,
    sort_forms, sort_solutions, sort_tables, sort_views, MetadataAdapter, COMPONENT_TYPE_ENTITY,
    FORM_STATE_ACTIVE, FORM_TYPE_MAIN, FORM_TYPE_QUICK_VIEW, QUERY_TYPE_PUBLIC,
};
use crate::error::{DataverseError, Result};
use crate::model::{
    is_required_level, AttributeMetadata, FormMetadata, Solution, TableInfo, TableMetadata,
    ViewMetadata,
};
use crate::parser::{extract_form_fields, extract_view_columns};

/// A record returned by the organization service
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub logical_name: String,
    pub id: Uuid,
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Guid stored as a string or as an entity reference `{ "id": ... }`
    pub fn get_uuid(&self, name: &str) -> Option<Uuid> {
        let value = self.get(name)?;
        let text = match value {
            Value::String(s) => s.as_str(),
            Value::Object(reference) => reference.get("id")?.as_str()?,
            _ => return None,
        };
        Uuid::parse_str(text).ok()
    }

    pub fn get_datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        let text = self.get_str(name)?;
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equal,
    In,
}

/// Attribute filter; `In` matches any of `values`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub operator: ConditionOperator,
    pub values: Vec<Value>,
}

impl Condition {
    pub fn matches(&self, entity: &Entity) -> bool {
        let Some(actual) = entity.get(&self.attribute) else {
            return false;
        };
        match self.operator {
            ConditionOperator::Equal => self.values.first() == Some(actual),
            ConditionOperator::In => self.values.contains(actual),
        }
    }
}

/// Query over one entity: selected columns, AND-ed conditions, ascending orders
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    pub entity_name: String,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub orders: Vec<String>,
}

impl QueryExpression {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            orders: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn where_equal(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.to_string(),
            operator: ConditionOperator::Equal,
            values: vec![value.into()],
        });
        self
    }

    pub fn where_in(mut self, attribute: &str, values: Vec<Value>) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.to_string(),
            operator: ConditionOperator::In,
            values,
        });
        self
    }

    pub fn order_by(mut self, attribute: &str) -> Self {
        self.orders.push(attribute.to_string());
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        entity.logical_name == self.entity_name && self.conditions.iter().all(|c| c.matches(entity))
    }
}

/// How `retrieve_entity` identifies a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitySelector {
    LogicalName(String),
    MetadataId(Uuid),
}

/// Table metadata as the organization service reports it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMetadataRecord {
    pub logical_name: String,
    pub schema_name: Option<String>,
    pub display_name: Option<String>,
    pub object_type_code: Option<i32>,
    pub primary_id_attribute: Option<String>,
    pub primary_name_attribute: Option<String>,
    pub is_activity: bool,
    pub is_intersect: bool,
    pub metadata_id: Option<Uuid>,
    pub attributes: Vec<AttributeMetadataRecord>,
}

/// Attribute metadata as the organization service reports it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMetadataRecord {
    pub logical_name: String,
    pub schema_name: Option<String>,
    pub display_name: Option<String>,
    /// Type name or numeric `AttributeTypeCode`
    pub attribute_type: Option<String>,
    pub is_custom: bool,
    pub is_valid_for_read: bool,
    pub required_level: Option<String>,
    pub targets: Vec<String>,
}

/// An already-authenticated organization service session
#[async_trait]
pub trait OrganizationService: Send + Sync {
    /// Whether the session is connected and authenticated
    fn is_ready(&self) -> bool;

    async fn retrieve_multiple(&self, query: &QueryExpression) -> Result<Vec<Entity>>;

    async fn retrieve(&self, entity_name: &str, id: Uuid, columns: &[&str]) -> Result<Entity>;

    async fn retrieve_entity(
        &self,
        selector: &EntitySelector,
        include_attributes: bool,
    ) -> Result<EntityMetadataRecord>;
}

/// Metadata adapter over an organization service session
pub struct SdkAdapter<S> {
    service: Arc<S>,
    span: Span,
}

impl<S: OrganizationService> SdkAdapter<S> {
    /// Wrap a session. Fails when the session is not ready.
    pub fn new(service: Arc<S>) -> Result<Self> {
        if !service.is_ready() {
            return Err(DataverseError::InvalidArgument {
                name: "service",
                message: "organization service session is not ready".to_string(),
            });
        }
        Ok(Self {
            service,
            span: info_span!("dataverse", backend = "sdk"),
        })
    }

    /// Attach the caller's logging span; every backend call runs inside it.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    async fn query(
        &self,
        query: QueryExpression,
        cancel: &CancellationToken,
    ) -> Result<Vec<Entity>> {
        cancellable(cancel, self.service.retrieve_multiple(&query))
            .instrument(self.span.clone())
            .await
    }

    async fn entity_metadata(
        &self,
        selector: EntitySelector,
        include_attributes: bool,
        cancel: &CancellationToken,
    ) -> Result<EntityMetadataRecord> {
        cancellable(
            cancel,
            self.service.retrieve_entity(&selector, include_attributes),
        )
        .instrument(self.span.clone())
        .await
    }

    async fn definition(
        &self,
        entity_name: &str,
        id: Uuid,
        column: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let entity = cancellable(cancel, self.service.retrieve(entity_name, id, &[column]))
            .instrument(self.span.clone())
            .await?;
        Ok(entity.get_str(column).map(str::to_string).unwrap_or_else(|| {
            warn!(entity = entity_name, %id, "Record has no definition");
            String::new()
        }))
    }

    fn to_solution(entity: &Entity) -> Solution {
        let unique_name = entity.get_str("uniquename").unwrap_or_default().to_string();
        Solution {
            id: entity.id,
            friendly_name: label_or_logical(
                entity.get_str("friendlyname"),
                &unique_name,
                "Solution",
            ),
            unique_name,
            version: entity.get_str("version").unwrap_or_default().to_string(),
            is_managed: entity.get_bool("ismanaged").unwrap_or(false),
            publisher_id: entity.get_uuid("publisherid"),
            modified_on: entity.get_datetime("modifiedon"),
        }
    }

    fn to_table(record: EntityMetadataRecord) -> TableMetadata {
        let display_name =
            label_or_logical(record.display_name.as_deref(), &record.logical_name, "Table");
        TableMetadata {
            schema_name: record
                .schema_name
                .unwrap_or_else(|| record.logical_name.clone()),
            display_name,
            logical_name: record.logical_name,
            primary_id_attribute: record.primary_id_attribute,
            primary_name_attribute: record.primary_name_attribute,
            object_type_code: record.object_type_code,
            metadata_id: record.metadata_id,
        }
    }

    fn to_attribute(record: AttributeMetadataRecord) -> AttributeMetadata {
        let attribute_type =
            resolve_attribute_type(record.attribute_type.as_deref(), &record.logical_name);
        AttributeMetadata {
            display_name: label_or_logical(
                record.display_name.as_deref(),
                &record.logical_name,
                "Attribute",
            ),
            schema_name: record
                .schema_name
                .unwrap_or_else(|| record.logical_name.clone()),
            targets: lookup_targets(&attribute_type, record.targets),
            attribute_type,
            is_custom: record.is_custom,
            is_required: is_required_level(record.required_level.as_deref()),
            logical_name: record.logical_name,
        }
    }
}

fn entity_name_or_unnamed(entity: &Entity, what: &str) -> String {
    match entity.get_str("name").filter(|n| !n.trim().is_empty()) {
        Some(name) => name.to_string(),
        None => {
            warn!(id = %entity.id, "{} has no name", what);
            "Unnamed".to_string()
        }
    }
}

#[async_trait]
impl<S: OrganizationService> MetadataAdapter for SdkAdapter<S> {
    async fn list_solutions(&self, cancel: &CancellationToken) -> Result<Vec<Solution>> {
        let query = QueryExpression::new("solution")
            .columns(&[
                "solutionid",
                "uniquename",
                "friendlyname",
                "version",
                "ismanaged",
                "publisherid",
                "modifiedon",
            ])
            .where_equal("isvisible", true)
            .order_by("friendlyname");
        let mut solutions: Vec<Solution> = self
            .query(query, cancel)
            .await?
            .iter()
            .map(Self::to_solution)
            .collect();
        sort_solutions(&mut solutions);
        Ok(solutions)
    }

    async fn list_solution_tables(
        &self,
        solution_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Vec<TableInfo>> {
        let query = QueryExpression::new("solutioncomponent")
            .columns(&["objectid"])
            .where_equal("solutionid", solution_id.to_string())
            .where_equal("componenttype", COMPONENT_TYPE_ENTITY);
        let components = self.query(query, cancel).await?;

        let mut tables = Vec::with_capacity(components.len());
        for component in components {
            let Some(metadata_id) = component.get_uuid("objectid") else {
                warn!(component = %component.id, "Solution component has no object id");
                continue;
            };
            let record = self
                .entity_metadata(EntitySelector::MetadataId(metadata_id), false, cancel)
                .await?;
            if record.is_activity || record.is_intersect {
                continue;
            }
            tables.push(Self::to_table(record));
        }

        sort_tables(&mut tables);
        Ok(tables)
    }

    async fn get_table_metadata(
        &self,
        logical_name: &str,
        cancel: &CancellationToken,
    ) -> Result<TableMetadata> {
        let record = self
            .entity_metadata(
                EntitySelector::LogicalName(logical_name.to_string()),
                false,
                cancel,
            )
            .await?;
        Ok(Self::to_table(record))
    }

    async fn list_attributes(
        &self,
        table_logical_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMetadata>> {
        let record = self
            .entity_metadata(
                EntitySelector::LogicalName(table_logical_name.to_string()),
                true,
                cancel,
            )
            .await?;
        let mut attributes: Vec<AttributeMetadata> = record
            .attributes
            .into_iter()
            .filter(|a| a.is_valid_for_read)
            .map(Self::to_attribute)
            .collect();
        sort_attributes(&mut attributes);
        Ok(attributes)
    }

    async fn list_forms(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormMetadata>> {
        let mut columns = vec!["formid", "name", "type"];
        if include_definition {
            columns.push("formxml");
        }
        let query = QueryExpression::new("systemform")
            .columns(&columns)
            .where_equal("objecttypecode", entity_logical_name)
            .where_in(
                "type",
                vec![FORM_TYPE_MAIN.into(), FORM_TYPE_QUICK_VIEW.into()],
            )
            .where_equal("formactivationstate", FORM_STATE_ACTIVE)
            .order_by("name");

        let mut forms: Vec<FormMetadata> = self
            .query(query, cancel)
            .await?
            .iter()
            .map(|form| {
                let definition = include_definition
                    .then(|| form.get_str("formxml").map(str::to_string))
                    .flatten();
                FormMetadata {
                    id: form.id,
                    name: entity_name_or_unnamed(form, "Form"),
                    form_type: form.get_i64("type").unwrap_or(FORM_TYPE_MAIN),
                    fields: definition
                        .as_deref()
                        .map(extract_form_fields)
                        .unwrap_or_default(),
                    definition,
                }
            })
            .collect();
        sort_forms(&mut forms);
        Ok(forms)
    }

    async fn get_form_definition(
        &self,
        form_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.definition("systemform", form_id, "formxml", cancel).await
    }

    async fn list_views(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ViewMetadata>> {
        let mut columns = vec!["savedqueryid", "name", "isdefault", "querytype"];
        if include_definition {
            columns.push("fetchxml");
        }
        let query = QueryExpression::new("savedquery")
            .columns(&columns)
            .where_equal("returnedtypecode", entity_logical_name)
            .where_equal("querytype", QUERY_TYPE_PUBLIC)
            .where_equal("statecode", 0)
            .order_by("name");

        let mut views: Vec<ViewMetadata> = self
            .query(query, cancel)
            .await?
            .iter()
            .map(|view| {
                let definition = include_definition
                    .then(|| view.get_str("fetchxml").map(str::to_string))
                    .flatten();
                ViewMetadata {
                    id: view.id,
                    name: entity_name_or_unnamed(view, "View"),
                    is_default: view.get_bool("isdefault").unwrap_or(false),
                    columns: definition
                        .as_deref()
                        .map(extract_view_columns)
                        .unwrap_or_default(),
                    definition,
                }
            })
            .collect();
        sort_views(&mut views);
        Ok(views)
    }

    async fn get_view_definition(
        &self,
        view_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.definition("savedquery", view_id, "fetchxml", cancel).await
    }
}
