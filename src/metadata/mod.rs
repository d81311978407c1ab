//! Metadata retrieval
//!
//! [`MetadataAdapter`] is the single contract for reading solutions, tables,
//! attributes, forms and views. Two backends implement it independently:
//! [`WebApiAdapter`] talks OData to the Web API, [`SdkAdapter`] drives an
//! already-authenticated [`OrganizationService`] session. Both produce the
//! same canonical records in the same order.
//!
//! Operations are async and take a [`CancellationToken`]; hosts that cannot
//! run async code wrap an adapter in a [`BlockingAdapter`].
//!
//! Backend and transport failures propagate. Data-quality problems in single
//! records (missing labels, unknown type tokens, malformed definitions) are
//! logged and replaced with a fallback so one bad record never fails a
//! whole retrieval.

mod blocking;
mod odata;
mod sdk;
mod web_api;

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DataverseError, Result};
use crate::model::{
    map_attribute_type, AttributeMetadata, AttributeType, FormMetadata, Solution, TableInfo,
    TableMetadata, ViewMetadata,
};
use crate::util::cmp_ci;

pub use blocking::BlockingAdapter;
pub use sdk::{
    AttributeMetadataRecord, Condition, ConditionOperator, Entity, EntityMetadataRecord,
    EntitySelector, OrganizationService, QueryExpression, SdkAdapter,
};
pub use web_api::{normalize_environment_url, HttpTransport, ODataTransport, WebApiAdapter};

/// Solution component type for tables
pub const COMPONENT_TYPE_ENTITY: i64 = 1;
/// `systemform.type` for main forms
pub const FORM_TYPE_MAIN: i64 = 2;
/// `systemform.type` for quick-view forms
pub const FORM_TYPE_QUICK_VIEW: i64 = 6;
/// `systemform.formactivationstate` for active forms
pub const FORM_STATE_ACTIVE: i64 = 1;
/// `savedquery.querytype` for public views
pub const QUERY_TYPE_PUBLIC: i64 = 0;

/// Canonical metadata retrieval contract
///
/// Adapters hold no mutable state beyond the backend handle captured at
/// construction.
#[async_trait]
pub trait MetadataAdapter: Send + Sync {
    /// Visible solutions, ordered by friendly name
    async fn list_solutions(&self, cancel: &CancellationToken) -> Result<Vec<Solution>>;

    /// Resolve a solution by unique name
    async fn find_solution(
        &self,
        unique_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Solution> {
        self.list_solutions(cancel)
            .await?
            .into_iter()
            .find(|s| s.unique_name.eq_ignore_ascii_case(unique_name))
            .ok_or_else(|| DataverseError::SolutionNotFound {
                unique_name: unique_name.to_string(),
            })
    }

    /// Tables that are components of the solution, ordered by display name.
    ///
    /// An unknown solution or one without table components yields an empty list.
    async fn list_solution_tables(
        &self,
        solution_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Vec<TableInfo>>;

    async fn get_table_metadata(
        &self,
        logical_name: &str,
        cancel: &CancellationToken,
    ) -> Result<TableMetadata>;

    /// Readable attributes of a table, ordered by display name
    async fn list_attributes(
        &self,
        table_logical_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMetadata>>;

    /// Active main and quick-view forms, ordered by name.
    ///
    /// Fields are extracted only when `include_definition` is set.
    async fn list_forms(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormMetadata>>;

    async fn get_form_definition(&self, form_id: Uuid, cancel: &CancellationToken)
        -> Result<String>;

    /// Public views, ordered by name.
    ///
    /// Columns are extracted only when `include_definition` is set.
    async fn list_views(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ViewMetadata>>;

    async fn get_view_definition(&self, view_id: Uuid, cancel: &CancellationToken)
        -> Result<String>;
}

/// Run a backend call unless (or until) the token is cancelled.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(DataverseError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DataverseError::Cancelled),
        result = call => result,
    }
}

/// Label, or the logical name when the backend has none.
pub(crate) fn label_or_logical(label: Option<&str>, logical_name: &str, what: &str) -> String {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => label.to_string(),
        None => {
            warn!(
                logical_name,
                "{} has no display name; using logical name", what
            );
            logical_name.to_string()
        }
    }
}

/// Run a backend type token through the type mapper, warning on unknown tokens.
pub(crate) fn resolve_attribute_type(token: Option<&str>, logical_name: &str) -> AttributeType {
    let token = token.unwrap_or_default();
    let mapped = map_attribute_type(token);
    if !mapped.is_known() {
        warn!(
            logical_name,
            token, "Unrecognised attribute type; passing token through"
        );
    }
    mapped
}

/// Attach the target list to lookup-like attributes only.
pub(crate) fn lookup_targets(ty: &AttributeType, targets: Vec<String>) -> Option<Vec<String>> {
    ty.is_lookup().then_some(targets)
}

pub(crate) fn sort_solutions(solutions: &mut [Solution]) {
    solutions.sort_by(|a, b| {
        cmp_ci(&a.friendly_name, &b.friendly_name).then_with(|| a.unique_name.cmp(&b.unique_name))
    });
}

pub(crate) fn sort_tables(tables: &mut [TableInfo]) {
    tables.sort_by(|a, b| {
        cmp_ci(&a.display_name, &b.display_name).then_with(|| a.logical_name.cmp(&b.logical_name))
    });
}

pub(crate) fn sort_attributes(attributes: &mut [AttributeMetadata]) {
    attributes.sort_by(|a, b| {
        cmp_ci(&a.display_name, &b.display_name).then_with(|| a.logical_name.cmp(&b.logical_name))
    });
}

pub(crate) fn sort_forms(forms: &mut [FormMetadata]) {
    forms.sort_by(|a, b| cmp_ci(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
}

pub(crate) fn sort_views(views: &mut [ViewMetadata]) {
    views.sort_by(|a, b| cmp_ci(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
}
