//! Web API (OData v4) backend

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::odata::{
    collection, single, AttributeDefinitionRecord, EntityDefinitionRecord, LookupTargetsRecord,
    SavedQueryRecord, SolutionComponentRecord, SolutionRecord, SystemFormRecord,
};
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
use crate::util::odata_literal;

const API_PATH: &str = "api/data/v9.2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Entity ids per `EntityDefinitions` request
const ENTITY_BATCH_SIZE: usize = 50;

const SOLUTION_COLUMNS: &str =
    "solutionid,uniquename,friendlyname,version,ismanaged,_publisherid_value,modifiedon";
const ENTITY_COLUMNS: &str = "LogicalName,SchemaName,DisplayName,ObjectTypeCode,\
PrimaryIdAttribute,PrimaryNameAttribute,IsActivity,IsIntersect,MetadataId";
const ATTRIBUTE_COLUMNS: &str = "LogicalName,SchemaName,DisplayName,AttributeType,\
AttributeTypeName,IsValidForRead,IsCustomAttribute,RequiredLevel";

static ENVIRONMENT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://[^/\s]+(/[^\s]*)?$").unwrap());

/// Validate an environment URL and strip trailing slashes.
pub fn normalize_environment_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(DataverseError::InvalidArgument {
            name: "environment_url",
            message: "must not be empty".to_string(),
        });
    }
    if !ENVIRONMENT_URL_RE.is_match(trimmed) {
        return Err(DataverseError::InvalidEnvironmentUrl {
            url: url.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn name_or_unnamed(name: Option<String>, what: &str, id: Uuid) -> String {
    match name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name,
        None => {
            warn!(%id, "{} has no name", what);
            "Unnamed".to_string()
        }
    }
}

/// GET access to OData resources
#[async_trait]
pub trait ODataTransport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// Bearer-token HTTP transport
pub struct HttpTransport {
    client: reqwest::Client,
    access_token: String,
}

impl HttpTransport {
    pub fn new(access_token: &str) -> Result<Self> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(DataverseError::InvalidArgument {
                name: "access_token",
                message: "must not be empty".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| DataverseError::HttpClient { source })?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
        })
    }
}

#[async_trait]
impl ODataTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let http_error = |source| DataverseError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Accept", "application/json")
            .header("Prefer", "odata.include-annotations=*")
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        let body = response.text().await.map_err(http_error)?;
        if !status.is_success() {
            return Err(DataverseError::BackendStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| DataverseError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Metadata adapter over the Web API
pub struct WebApiAdapter<T = HttpTransport> {
    environment_url: String,
    api_url: String,
    transport: T,
    span: Span,
}

impl WebApiAdapter<HttpTransport> {
    /// Connect with a bearer token obtained by the caller.
    pub fn connect(environment_url: &str, access_token: &str) -> Result<Self> {
        let transport = HttpTransport::new(access_token)?;
        Self::with_transport(environment_url, transport)
    }
}

impl<T: ODataTransport> WebApiAdapter<T> {
    pub fn with_transport(environment_url: &str, transport: T) -> Result<Self> {
        let environment_url = normalize_environment_url(environment_url)?;
        let api_url = format!("{}/{}", environment_url, API_PATH);
        let span = info_span!("dataverse", backend = "web_api", environment = %environment_url);
        Ok(Self {
            environment_url,
            api_url,
            transport,
            span,
        })
    }

    /// Attach the caller's logging span; every backend call runs inside it.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn environment_url(&self) -> &str {
        &self.environment_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn get(&self, url: String, cancel: &CancellationToken) -> Result<(String, Value)> {
        debug!(%url, "GET");
        let body = cancellable(cancel, self.transport.get_json(&url))
            .instrument(self.span.clone())
            .await?;
        Ok((url, body))
    }

    fn to_solution(record: SolutionRecord) -> Solution {
        let unique_name = record.uniquename.unwrap_or_default();
        let friendly_name = label_or_logical(
            record.friendlyname.as_deref(),
            &unique_name,
            "Solution",
        );
        Solution {
            id: record.solutionid,
            unique_name,
            friendly_name,
            version: record.version.unwrap_or_default(),
            is_managed: record.ismanaged.unwrap_or(false),
            publisher_id: record.publisher_id,
            modified_on: record.modifiedon,
        }
    }

    fn to_table(record: EntityDefinitionRecord) -> TableMetadata {
        let display_name = label_or_logical(
            record.display_name.as_ref().and_then(|d| d.text()),
            &record.logical_name,
            "Table",
        );
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

    fn entity_path(&self, logical_name: &str) -> String {
        format!(
            "{}/EntityDefinitions(LogicalName='{}')",
            self.api_url,
            odata_literal(logical_name)
        )
    }
}

#[async_trait]
impl<T: ODataTransport> MetadataAdapter for WebApiAdapter<T> {
    async fn list_solutions(&self, cancel: &CancellationToken) -> Result<Vec<Solution>> {
        let url = format!(
            "{}/solutions?$select={}&$filter=isvisible eq true&$orderby=friendlyname",
            self.api_url, SOLUTION_COLUMNS
        );
        let (url, body) = self.get(url, cancel).await?;
        let mut solutions: Vec<Solution> = collection::<SolutionRecord>(&url, body)?
            .into_iter()
            .map(Self::to_solution)
            .collect();
        sort_solutions(&mut solutions);
        Ok(solutions)
    }

    async fn find_solution(
        &self,
        unique_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Solution> {
        let url = format!(
            "{}/solutions?$filter=uniquename eq '{}'&$select={}",
            self.api_url,
            odata_literal(unique_name),
            SOLUTION_COLUMNS
        );
        let (url, body) = self.get(url, cancel).await?;
        collection::<SolutionRecord>(&url, body)?
            .into_iter()
            .next()
            .map(Self::to_solution)
            .ok_or_else(|| DataverseError::SolutionNotFound {
                unique_name: unique_name.to_string(),
            })
    }

    async fn list_solution_tables(
        &self,
        solution_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Vec<TableInfo>> {
        let url = format!(
            "{}/solutioncomponents?$filter=_solutionid_value eq {} and componenttype eq {}&$select=objectid",
            self.api_url, solution_id, COMPONENT_TYPE_ENTITY
        );
        let (url, body) = self.get(url, cancel).await?;
        let entity_ids: Vec<Uuid> = collection::<SolutionComponentRecord>(&url, body)?
            .into_iter()
            .map(|c| c.objectid)
            .collect();

        let mut tables = Vec::with_capacity(entity_ids.len());
        for batch in entity_ids.chunks(ENTITY_BATCH_SIZE) {
            let id_filter = batch
                .iter()
                .map(|id| format!("MetadataId eq {}", id))
                .collect::<Vec<_>>()
                .join(" or ");
            let url = format!(
                "{}/EntityDefinitions?$filter=({})&$select={}",
                self.api_url, id_filter, ENTITY_COLUMNS
            );
            let (url, body) = self.get(url, cancel).await?;
            tables.extend(
                collection::<EntityDefinitionRecord>(&url, body)?
                    .into_iter()
                    .filter(|e| !e.is_activity.unwrap_or(false) && !e.is_intersect.unwrap_or(false))
                    .map(Self::to_table),
            );
        }

        sort_tables(&mut tables);
        Ok(tables)
    }

    async fn get_table_metadata(
        &self,
        logical_name: &str,
        cancel: &CancellationToken,
    ) -> Result<TableMetadata> {
        let url = format!("{}?$select={}", self.entity_path(logical_name), ENTITY_COLUMNS);
        let (url, body) = self.get(url, cancel).await?;
        Ok(Self::to_table(single(&url, body)?))
    }

    async fn list_attributes(
        &self,
        table_logical_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMetadata>> {
        let url = format!(
            "{}/Attributes?$select={}",
            self.entity_path(table_logical_name),
            ATTRIBUTE_COLUMNS
        );
        let (url, body) = self.get(url, cancel).await?;

        let mut attributes: Vec<AttributeMetadata> =
            collection::<AttributeDefinitionRecord>(&url, body)?
                .into_iter()
                .filter(|a| a.is_valid_for_read.unwrap_or(false))
                .map(|a| {
                    let attribute_type = resolve_attribute_type(a.type_token(), &a.logical_name);
                    let display_name = label_or_logical(
                        a.display_name.as_ref().and_then(|d| d.text()),
                        &a.logical_name,
                        "Attribute",
                    );
                    let is_required = is_required_level(
                        a.required_level.as_ref().and_then(|r| r.value.as_deref()),
                    );
                    AttributeMetadata {
                        schema_name: a.schema_name.unwrap_or_else(|| a.logical_name.clone()),
                        display_name,
                        targets: lookup_targets(&attribute_type, Vec::new()),
                        attribute_type,
                        is_custom: a.is_custom_attribute.unwrap_or(false),
                        is_required,
                        logical_name: a.logical_name,
                    }
                })
                .collect();

        if attributes.iter().any(|a| a.attribute_type.is_lookup()) {
            let url = format!(
                "{}/Attributes/Microsoft.Dynamics.CRM.LookupAttributeMetadata?$select=LogicalName,Targets",
                self.entity_path(table_logical_name)
            );
            let (url, body) = self.get(url, cancel).await?;
            let targets: HashMap<String, Vec<String>> =
                collection::<LookupTargetsRecord>(&url, body)?
                    .into_iter()
                    .map(|r| (r.logical_name, r.targets.unwrap_or_default()))
                    .collect();

            for attribute in attributes.iter_mut().filter(|a| a.attribute_type.is_lookup()) {
                match targets.get(&attribute.logical_name) {
                    Some(t) => attribute.targets = Some(t.clone()),
                    None => warn!(
                        table = table_logical_name,
                        attribute = %attribute.logical_name,
                        "Lookup attribute has no target metadata"
                    ),
                }
            }
        }

        sort_attributes(&mut attributes);
        Ok(attributes)
    }

    async fn list_forms(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormMetadata>> {
        let select = if include_definition {
            "formid,name,type,formxml"
        } else {
            "formid,name,type"
        };
        let url = format!(
            "{}/systemforms?$filter=objecttypecode eq '{}' and (type eq {} or type eq {}) and formactivationstate eq {}&$select={}&$orderby=name",
            self.api_url,
            odata_literal(entity_logical_name),
            FORM_TYPE_MAIN,
            FORM_TYPE_QUICK_VIEW,
            FORM_STATE_ACTIVE,
            select
        );
        let (url, body) = self.get(url, cancel).await?;

        let mut forms: Vec<FormMetadata> = collection::<SystemFormRecord>(&url, body)?
            .into_iter()
            .map(|f| {
                let definition = if include_definition { f.formxml } else { None };
                let fields = definition
                    .as_deref()
                    .map(extract_form_fields)
                    .unwrap_or_default();
                FormMetadata {
                    id: f.formid,
                    name: name_or_unnamed(f.name, "Form", f.formid),
                    form_type: f.form_type.unwrap_or(FORM_TYPE_MAIN),
                    definition,
                    fields,
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
        let url = format!("{}/systemforms({})?$select=formxml", self.api_url, form_id);
        let (url, body) = self.get(url, cancel).await?;
        let record: SystemFormRecord = single(&url, body)?;
        Ok(record.formxml.unwrap_or_else(|| {
            warn!(%form_id, "Form has no definition");
            String::new()
        }))
    }

    async fn list_views(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ViewMetadata>> {
        let select = if include_definition {
            "savedqueryid,name,isdefault,querytype,fetchxml"
        } else {
            "savedqueryid,name,isdefault,querytype"
        };
        let url = format!(
            "{}/savedqueries?$filter=returnedtypecode eq '{}' and statecode eq 0&$select={}&$orderby=name",
            self.api_url,
            odata_literal(entity_logical_name),
            select
        );
        let (url, body) = self.get(url, cancel).await?;

        let mut views: Vec<ViewMetadata> = collection::<SavedQueryRecord>(&url, body)?
            .into_iter()
            .filter(|v| v.querytype == Some(QUERY_TYPE_PUBLIC))
            .map(|v| {
                let definition = if include_definition { v.fetchxml } else { None };
                let columns = definition
                    .as_deref()
                    .map(extract_view_columns)
                    .unwrap_or_default();
                ViewMetadata {
                    id: v.savedqueryid,
                    name: name_or_unnamed(v.name, "View", v.savedqueryid),
                    is_default: v.isdefault.unwrap_or(false),
                    definition,
                    columns,
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
        let url = format!("{}/savedqueries({})?$select=fetchxml", self.api_url, view_id);
        let (url, body) = self.get(url, cancel).await?;
        let record: SavedQueryRecord = single(&url, body)?;
        Ok(record.fetchxml.unwrap_or_else(|| {
            warn!(%view_id, "View has no definition");
            String::new()
        }))
    }
}
