//! Semantic model build and export tests

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use dataverse_semantic::export::{read_exported, sanitize_file_name};
use dataverse_semantic::semantic::{sort_fragments, DateTableSpec, FragmentClassifier, FragmentRole};
use dataverse_semantic::{
    build_semantic_model, export_semantic_model, load_exported_fragments, ModelOptions,
    SemanticModel,
};

use crate::common::{sales_web_adapter, tables_by_name, ENVIRONMENT_URL, SOLUTION};

fn options() -> ModelOptions {
    ModelOptions {
        solution: SOLUTION.to_string(),
        environment_url: ENVIRONMENT_URL.to_string(),
        fact_table: "opportunity".to_string(),
        date_table: Some(DateTableSpec::default()),
        ..Default::default()
    }
}

async fn build(options: &ModelOptions) -> anyhow::Result<SemanticModel> {
    let adapter = sales_web_adapter();
    build_semantic_model(&adapter, options, &CancellationToken::new()).await
}

fn sorted_names(model: &SemanticModel) -> Vec<(FragmentRole, String)> {
    model
        .sorted()
        .into_iter()
        .map(|f| (f.role, f.name.clone()))
        .collect()
}

// ============================================================================
// Building
// ============================================================================

#[tokio::test]
async fn test_star_schema_from_solution() {
    let model = build(&options()).await.unwrap();

    assert_eq!(
        sorted_names(&model),
        vec![
            (FragmentRole::Expression, "DataverseURL".to_string()),
            (FragmentRole::Expression, "relationships".to_string()),
            (FragmentRole::DateTable, "Date".to_string()),
            (FragmentRole::FactTable, "Opportunity".to_string()),
            (FragmentRole::DimensionTable, "Account".to_string()),
            (FragmentRole::DimensionTable, "Contact".to_string()),
        ]
    );

    let edges: Vec<(&str, &str, &str, bool)> = model
        .relationships
        .iter()
        .map(|r| {
            (
                r.from_table.as_str(),
                r.from_attribute.as_str(),
                r.to_table.as_str(),
                r.is_active,
            )
        })
        .collect();
    assert_eq!(
        edges,
        vec![
            ("account", "primarycontactid", "contact", true),
            ("contact", "parentcustomerid", "account", false),
            ("opportunity", "customerid", "account", true),
            ("opportunity", "parentcontactid", "contact", true),
        ]
    );

    let relationships = model.fragment("relationships").unwrap();
    assert!(relationships
        .content
        .contains("\tfromColumn: Opportunity.'Potential Customer'\n\ttoColumn: Account.Account\n\trelyOnReferentialIntegrity\n"));
}

#[tokio::test]
async fn test_form_fields_select_columns() {
    let model = build(&options()).await.unwrap();
    let opportunity = model.fragment("Opportunity").unwrap();

    assert!(opportunity.content.contains("sourceColumn: estimatedvalue"));
    assert!(opportunity.content.contains("sourceColumn: opportunityid"));
    assert!(!opportunity.content.contains("closeprobability"));
    assert!(model
        .fragment("DataverseURL")
        .unwrap()
        .content
        .contains("\"contoso.crm.dynamics.com\""));
}

#[tokio::test]
async fn test_explicit_attribute_selection_wins() {
    let mut options = options();
    options.table_attributes = BTreeMap::from([(
        "Account".to_string(),
        vec!["revenue".to_string()],
    )]);
    let model = build(&options).await.unwrap();

    let account = model.fragment("Account").unwrap();
    assert!(account.content.contains("sourceColumn: revenue"));
    assert!(!account.content.contains("primarycontactid"));
    assert_eq!(model.relationships.len(), 3);
    assert!(model.relationships.iter().all(|r| r.is_active));
}

#[tokio::test]
async fn test_table_subset_and_no_date_table() {
    let mut options = options();
    options.tables = vec!["account".to_string()];
    options.date_table = None;
    let model = build(&options).await.unwrap();

    let names: Vec<String> = sorted_names(&model).into_iter().map(|(_, n)| n).collect();
    assert_eq!(
        names,
        vec!["DataverseURL", "relationships", "Opportunity", "Account"]
    );
    assert_eq!(model.relationships.len(), 1);
}

#[tokio::test]
async fn test_chosen_form_is_read_by_id() {
    let tables = tables_by_name();
    let mut options = options();
    options.table_forms = BTreeMap::from([(
        "contact".to_string(),
        tables["contact"].form_id.to_string(),
    )]);

    let adapter = sales_web_adapter();
    let model = build_semantic_model(&adapter, &options, &CancellationToken::new())
        .await
        .unwrap();
    assert!(model
        .fragment("Contact")
        .unwrap()
        .content
        .contains("sourceColumn: emailaddress1"));
    assert!(adapter
        .transport()
        .requested()
        .iter()
        .any(|u| u.contains(&format!("/systemforms({})", tables["contact"].form_id))));
}

#[tokio::test]
async fn test_table_named_like_built_in_fragment_is_disambiguated() {
    let mut options = options();
    options.date_table = Some(DateTableSpec {
        name: "account".to_string(),
        ..Default::default()
    });
    let model = build(&options).await.unwrap();

    assert_eq!(
        sorted_names(&model),
        vec![
            (FragmentRole::Expression, "DataverseURL".to_string()),
            (FragmentRole::Expression, "relationships".to_string()),
            (FragmentRole::DateTable, "account".to_string()),
            (FragmentRole::FactTable, "Opportunity".to_string()),
            (FragmentRole::DimensionTable, "Account (account)".to_string()),
            (FragmentRole::DimensionTable, "Contact".to_string()),
        ]
    );
    assert!(model
        .fragment("relationships")
        .unwrap()
        .content
        .contains("\ttoColumn: 'Account (account)'.Account\n"));
}

#[tokio::test]
async fn test_fact_table_must_be_in_solution() {
    let mut options = options();
    options.fact_table = "invoice".to_string();
    let err = build(&options).await.unwrap_err();
    assert!(err.to_string().contains("invoice"));

    options.fact_table = String::new();
    assert!(build(&options).await.is_err());
}

// ============================================================================
// Exporting
// ============================================================================

#[tokio::test]
async fn test_export_round_trip_is_byte_identical() {
    let model = build(&options()).await.unwrap();
    let dir = TempDir::new().unwrap();

    let paths = export_semantic_model(&model, dir.path(), None).unwrap();
    assert_eq!(paths.len(), model.fragments.len());

    let exported: BTreeMap<String, String> =
        read_exported(dir.path()).unwrap().into_iter().collect();
    assert_eq!(exported.len(), model.fragments.len());
    for fragment in &model.fragments {
        assert_eq!(
            exported.get(&sanitize_file_name(&fragment.name)),
            Some(&fragment.content),
            "fragment {}",
            fragment.name
        );
    }

    let order: Vec<String> = paths
        .iter()
        .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
        .collect();
    let expected: Vec<String> = model.sorted().iter().map(|f| f.name.clone()).collect();
    assert_eq!(order, expected);
}

#[tokio::test]
async fn test_export_one_matches_export_all() {
    let model = build(&options()).await.unwrap();
    let all = TempDir::new().unwrap();
    let one = TempDir::new().unwrap();

    export_semantic_model(&model, all.path(), None).unwrap();
    let paths = export_semantic_model(&model, one.path(), Some("contact")).unwrap();

    assert_eq!(paths.len(), 1);
    let file_name = paths[0].file_name().unwrap();
    assert_eq!(file_name, "Contact.tmdl");
    assert_eq!(
        std::fs::read(&paths[0]).unwrap(),
        std::fs::read(all.path().join(file_name)).unwrap()
    );
}

#[tokio::test]
async fn test_export_rejects_unknown_fragment_and_bad_relationships() {
    let mut model = build(&options()).await.unwrap();
    let dir = TempDir::new().unwrap();

    assert!(export_semantic_model(&model, dir.path(), Some("Invoice")).is_err());

    for relationship in &mut model.relationships {
        relationship.is_active = true;
    }
    let target = dir.path().join("out");
    assert!(export_semantic_model(&model, &target, None).is_err());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_reloaded_fragments_keep_roles_and_order() {
    let model = build(&options()).await.unwrap();
    let dir = TempDir::new().unwrap();
    export_semantic_model(&model, dir.path(), None).unwrap();

    let classifier = FragmentClassifier::new(["Opportunity"]);
    let reloaded = load_exported_fragments(dir.path(), &classifier).unwrap();

    let reloaded: Vec<(FragmentRole, String)> = sort_fragments(&reloaded)
        .into_iter()
        .map(|f| (f.role, f.name.clone()))
        .collect();
    assert_eq!(reloaded, sorted_names(&model));
}
