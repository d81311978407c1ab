//! dataverse-semantic: Dataverse metadata to semantic model definitions
//!
//! This library reads table, attribute, form and view metadata from a
//! Dataverse environment (Web API or an organization service), writes a
//! metadata dictionary, and renders a star-schema semantic model as TMDL
//! fragments in a stable, exportable order.

pub mod error;
pub mod export;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod project;
pub mod semantic;
mod util;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use error::DataverseError;

use metadata::MetadataAdapter;
use model::{
    DictionaryAttribute, DictionaryForm, DictionaryTable, DictionaryView, FormMetadata,
    MetadataDictionary, Relationship, TableMetadata,
};
use semantic::{DateTableSpec, FragmentClassifier, ModelFragment, TableSelection};

/// Attributes kept in the dictionary even when no form references them
pub const STANDARD_FIELDS: &[&str] = &[
    "createdon",
    "modifiedon",
    "createdby",
    "modifiedby",
    "ownerid",
    "statecode",
    "statuscode",
];

/// Options for writing a metadata dictionary
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Unique name of the solution
    pub solution: String,
    /// Directory receiving the dictionary and `DataverseURL.txt`
    pub output_dir: PathBuf,
    /// Names the dictionary file when set
    pub project_name: Option<String>,
    /// Logical names of the tables to describe; empty means every solution table
    pub tables: Vec<String>,
    /// Table logical name to the one main form to describe
    pub table_forms: BTreeMap<String, String>,
    /// Table logical name to the view to describe instead of the default view
    pub table_views: BTreeMap<String, String>,
    /// Table logical name to an explicit attribute selection
    pub table_attributes: BTreeMap<String, Vec<String>>,
}

/// Form summary for one table of a solution
#[derive(Debug, Clone)]
pub struct TablePreview {
    pub table: TableMetadata,
    pub form_count: usize,
    /// Unique fields across all forms
    pub field_count: usize,
}

/// List a solution's tables with their form and field counts.
pub async fn preview_solution<A>(
    adapter: &A,
    solution: &str,
    cancel: &CancellationToken,
) -> Result<Vec<TablePreview>>
where
    A: MetadataAdapter + ?Sized,
{
    let solution = adapter.find_solution(solution, cancel).await?;
    let tables = adapter.list_solution_tables(solution.id, cancel).await?;

    let mut previews = Vec::with_capacity(tables.len());
    for table in tables {
        let forms = adapter
            .list_forms(&table.logical_name, true, cancel)
            .await?;
        let fields: BTreeSet<&str> = forms
            .iter()
            .flat_map(|f| f.fields.iter().map(String::as_str))
            .collect();
        if forms.is_empty() {
            warn!(table = %table.logical_name, "Table has no active forms");
        }
        previews.push(TablePreview {
            form_count: forms.len(),
            field_count: fields.len(),
            table,
        });
    }
    Ok(previews)
}

fn parse_id(id: &str, kind: &str, table: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim())
        .with_context(|| format!("Invalid {} id '{}' for table '{}'", kind, id, table))
}

/// Fail when a requested table is not a component of the solution.
fn ensure_in_solution<'a>(
    requested: impl IntoIterator<Item = &'a String>,
    tables: &[TableMetadata],
    solution: &str,
) -> Result<()> {
    for name in requested {
        if !tables
            .iter()
            .any(|t| t.logical_name.eq_ignore_ascii_case(name))
        {
            bail!("Table '{}' is not part of solution '{}'", name, solution);
        }
    }
    Ok(())
}

/// Active main forms of a table, or only the chosen one
async fn dictionary_forms<A>(
    adapter: &A,
    table: &TableMetadata,
    chosen: Option<&String>,
    cancel: &CancellationToken,
) -> Result<Vec<FormMetadata>>
where
    A: MetadataAdapter + ?Sized,
{
    let forms: Vec<FormMetadata> = adapter
        .list_forms(&table.logical_name, true, cancel)
        .await?
        .into_iter()
        .filter(FormMetadata::is_main)
        .collect();
    let Some(chosen) = chosen else {
        return Ok(forms);
    };
    let form_id = parse_id(chosen, "form", &table.logical_name)?;
    match forms.into_iter().find(|f| f.id == form_id) {
        Some(form) => Ok(vec![form]),
        None => bail!(
            "Form {} is not an active main form of table '{}'",
            form_id,
            table.logical_name
        ),
    }
}

/// The chosen view, else the default public view
async fn dictionary_view<A>(
    adapter: &A,
    table: &TableMetadata,
    chosen: Option<&String>,
    cancel: &CancellationToken,
) -> Result<Option<DictionaryView>>
where
    A: MetadataAdapter + ?Sized,
{
    let views = adapter
        .list_views(&table.logical_name, true, cancel)
        .await?;
    let view = match chosen {
        Some(chosen) => {
            let view_id = parse_id(chosen, "view", &table.logical_name)?;
            match views.into_iter().find(|v| v.id == view_id) {
                Some(view) => Some(view),
                None => bail!(
                    "View {} is not a public view of table '{}'",
                    view_id,
                    table.logical_name
                ),
            }
        }
        None => views.into_iter().find(|v| v.is_default),
    };
    Ok(view.map(|v| DictionaryView {
        view_id: v.id,
        view_name: v.name,
        fetch_xml: v.definition,
    }))
}

/// Collect the dictionary for a solution without writing it.
///
/// Forms are the table's active main forms, or the chosen form. Attributes
/// are the explicit selection when one is given; otherwise they are kept
/// when a form references them or they are one of [`STANDARD_FIELDS`], and
/// tables whose forms reference no fields are skipped.
pub async fn collect_dictionary<A>(
    adapter: &A,
    environment_url: &str,
    options: &ExtractOptions,
    cancel: &CancellationToken,
) -> Result<MetadataDictionary>
where
    A: MetadataAdapter + ?Sized,
{
    let solution = adapter.find_solution(&options.solution, cancel).await?;
    info!(
        solution = %solution.unique_name,
        id = %solution.id,
        "Extracting metadata dictionary"
    );
    let tables = adapter.list_solution_tables(solution.id, cancel).await?;
    ensure_in_solution(&options.tables, &tables, &solution.unique_name)?;

    let mut dictionary = MetadataDictionary::new(environment_url, solution.unique_name.clone());
    dictionary.project_name = options.project_name.clone();
    for table in tables.into_iter().filter(|t| {
        options.tables.is_empty()
            || options
                .tables
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&t.logical_name))
    }) {
        let chosen_form = lookup_ci(&options.table_forms, &table.logical_name);
        let forms = dictionary_forms(adapter, &table, chosen_form, cancel).await?;
        let form_fields: BTreeSet<&str> = forms
            .iter()
            .flat_map(|f| f.fields.iter().map(String::as_str))
            .collect();

        let selection: Option<BTreeSet<String>> =
            lookup_ci(&options.table_attributes, &table.logical_name)
                .map(|names| names.iter().map(|n| n.to_lowercase()).collect());
        if selection.is_none() && form_fields.is_empty() {
            warn!(table = %table.logical_name, "No fields found in forms, skipping table");
            continue;
        }

        let attributes: Vec<DictionaryAttribute> = adapter
            .list_attributes(&table.logical_name, cancel)
            .await?
            .into_iter()
            .filter(|a| {
                let logical = a.logical_name.to_lowercase();
                match &selection {
                    Some(selected) => selected.contains(&logical),
                    None => {
                        form_fields.contains(logical.as_str())
                            || STANDARD_FIELDS.contains(&logical.as_str())
                    }
                }
            })
            .map(|a| DictionaryAttribute {
                logical_name: a.logical_name,
                schema_name: a.schema_name,
                display_name: a.display_name,
                attribute_type: a.attribute_type,
                is_custom: a.is_custom,
            })
            .collect();

        let chosen_view = lookup_ci(&options.table_views, &table.logical_name);
        let view = dictionary_view(adapter, &table, chosen_view, cancel).await?;

        debug!(
            table = %table.logical_name,
            forms = forms.len(),
            attributes = attributes.len(),
            "Collected table"
        );
        dictionary.tables.push(DictionaryTable {
            forms: forms
                .iter()
                .map(|f| DictionaryForm {
                    form_id: f.id,
                    form_name: f.name.clone(),
                    field_count: f.fields.len(),
                })
                .collect(),
            logical_name: table.logical_name,
            display_name: table.display_name,
            schema_name: table.schema_name,
            object_type_code: table.object_type_code,
            primary_id_attribute: table.primary_id_attribute,
            primary_name_attribute: table.primary_name_attribute,
            view,
            attributes,
        });
    }
    Ok(dictionary)
}

/// Collect and write the dictionary, returning its path and contents.
pub async fn extract_dictionary<A>(
    adapter: &A,
    environment_url: &str,
    options: &ExtractOptions,
    cancel: &CancellationToken,
) -> Result<(PathBuf, MetadataDictionary)>
where
    A: MetadataAdapter + ?Sized,
{
    let dictionary = collect_dictionary(adapter, environment_url, options, cancel).await?;
    let path = export::write_dictionary(&dictionary, &options.output_dir)
        .with_context(|| format!("Writing dictionary for solution '{}'", options.solution))?;
    Ok((path, dictionary))
}

/// Options for building a semantic model
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Unique name of the solution
    pub solution: String,
    pub environment_url: String,
    /// Logical name of the fact table
    pub fact_table: String,
    /// Logical names of the tables to model; empty means every solution table
    pub tables: Vec<String>,
    pub date_table: Option<DateTableSpec>,
    /// Table logical name to the form whose fields select the columns
    pub table_forms: BTreeMap<String, String>,
    /// Table logical name to an explicit column selection
    pub table_attributes: BTreeMap<String, Vec<String>>,
}

/// Rendered fragments and the relationships between modelled tables
#[derive(Debug, Clone)]
pub struct SemanticModel {
    pub fragments: Vec<ModelFragment>,
    pub relationships: Vec<Relationship>,
}

impl SemanticModel {
    /// Fragments in canonical order
    pub fn sorted(&self) -> Vec<&ModelFragment> {
        semantic::sort_fragments(&self.fragments)
    }

    pub fn fragment(&self, name: &str) -> Option<&ModelFragment> {
        self.fragments
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

fn lookup_ci<'a, V>(map: &'a BTreeMap<String, V>, key: &str) -> Option<&'a V> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

async fn selected_fields<A>(
    adapter: &A,
    table: &TableMetadata,
    options: &ModelOptions,
    cancel: &CancellationToken,
) -> Result<Vec<String>>
where
    A: MetadataAdapter + ?Sized,
{
    if let Some(attributes) = lookup_ci(&options.table_attributes, &table.logical_name) {
        return Ok(attributes.clone());
    }
    if let Some(form_id) = lookup_ci(&options.table_forms, &table.logical_name) {
        let form_id = parse_id(form_id, "form", &table.logical_name)?;
        let definition = adapter.get_form_definition(form_id, cancel).await?;
        return Ok(parser::extract_form_fields(&definition));
    }
    let forms = adapter
        .list_forms(&table.logical_name, true, cancel)
        .await?;
    let fields: BTreeSet<String> = forms
        .into_iter()
        .filter(FormMetadata::is_main)
        .flat_map(|f| f.fields)
        .collect();
    Ok(fields.into_iter().collect())
}

/// Retrieve the chosen tables and render the semantic model.
///
/// Columns come from the explicit attribute selection, else the chosen form,
/// else the union of the active main forms. Relationships are inferred from
/// lookups between modelled tables and must form a valid set.
pub async fn build_semantic_model<A>(
    adapter: &A,
    options: &ModelOptions,
    cancel: &CancellationToken,
) -> Result<SemanticModel>
where
    A: MetadataAdapter + ?Sized,
{
    if options.fact_table.trim().is_empty() {
        bail!("A fact table is required");
    }

    let solution = adapter.find_solution(&options.solution, cancel).await?;
    let solution_tables = adapter.list_solution_tables(solution.id, cancel).await?;

    let is_chosen = |logical: &str| {
        options.tables.is_empty()
            || logical.eq_ignore_ascii_case(&options.fact_table)
            || options.tables.iter().any(|t| t.eq_ignore_ascii_case(logical))
    };
    ensure_in_solution(
        options.tables.iter().chain(std::iter::once(&options.fact_table)),
        &solution_tables,
        &solution.unique_name,
    )?;

    let mut selections = Vec::new();
    for table in solution_tables
        .into_iter()
        .filter(|t| is_chosen(&t.logical_name))
    {
        let attributes = adapter.list_attributes(&table.logical_name, cancel).await?;
        let fields = selected_fields(adapter, &table, options, cancel).await?;
        let is_fact = table.logical_name.eq_ignore_ascii_case(&options.fact_table);
        debug!(
            table = %table.logical_name,
            fields = fields.len(),
            is_fact,
            "Selected table"
        );
        selections.push(TableSelection::new(table, attributes, fields).as_fact(is_fact));
    }

    let mut reserved = vec![semantic::ENVIRONMENT_PARAMETER, semantic::RELATIONSHIPS_FRAGMENT];
    if let Some(date_table) = &options.date_table {
        reserved.push(date_table.name.as_str());
    }
    semantic::assign_table_names(&mut selections, &reserved);

    let relationships = semantic::infer_relationships(&selections);
    model::ensure_valid_relationships(&relationships)?;

    let mut fragments = vec![semantic::render_environment_expression(
        &options.environment_url,
    )];
    if let Some(date_table) = &options.date_table {
        fragments.push(semantic::render_date_table(date_table)?);
    }
    fragments.extend(selections.iter().map(semantic::render_table));
    if !relationships.is_empty() {
        fragments.push(semantic::render_relationships(&relationships, &selections)?);
    }
    semantic::ensure_unique_names(&fragments)?;

    info!(
        tables = selections.len(),
        fragments = fragments.len(),
        relationships = relationships.len(),
        "Built semantic model"
    );
    Ok(SemanticModel {
        fragments,
        relationships,
    })
}

/// Export every fragment, or only the one named by `only`.
///
/// Both paths derive file names and ordering the same way. The
/// relationship set is validated first.
pub fn export_semantic_model(
    model: &SemanticModel,
    dir: &Path,
    only: Option<&str>,
) -> Result<Vec<PathBuf>> {
    model::ensure_valid_relationships(&model.relationships)?;
    match only {
        Some(name) => {
            let Some(fragment) = model.fragment(name) else {
                bail!("No fragment named '{}'", name);
            };
            Ok(vec![export::export_fragment(fragment, dir)?])
        }
        None => Ok(export::export_fragments(&model.fragments, dir)?),
    }
}

/// Reload fragments exported to `dir`, assigning roles with `classifier`.
///
/// Fragment names are the file stems, so names that needed sanitizing come
/// back in their sanitized form.
pub fn load_exported_fragments(
    dir: &Path,
    classifier: &FragmentClassifier,
) -> Result<Vec<ModelFragment>> {
    let fragments: Vec<ModelFragment> = export::read_exported(dir)
        .with_context(|| format!("Reading fragments from {}", dir.display()))?
        .into_iter()
        .map(|(name, content)| {
            let role = classifier.classify(&name, &content);
            ModelFragment::new(name, content, role)
        })
        .collect();
    debug!(dir = %dir.display(), fragments = fragments.len(), "Loaded exported fragments");
    Ok(fragments)
}
