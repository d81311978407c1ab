//! Metadata dictionary extraction tests

use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use dataverse_semantic::model::{AttributeType, MetadataDictionary};
use dataverse_semantic::{collect_dictionary, extract_dictionary, ExtractOptions};

use crate::common::{sales_web_adapter, tables_by_name, ENVIRONMENT_URL, SOLUTION};

fn options() -> ExtractOptions {
    ExtractOptions {
        solution: SOLUTION.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_dictionary_keeps_form_and_standard_fields() {
    let adapter = sales_web_adapter();
    let dictionary =
        collect_dictionary(&adapter, ENVIRONMENT_URL, &options(), &CancellationToken::new())
            .await
            .unwrap();

    assert_eq!(dictionary.solution, "Sales");
    let tables: Vec<&str> = dictionary
        .tables
        .iter()
        .map(|t| t.logical_name.as_str())
        .collect();
    assert_eq!(tables, vec!["account", "contact", "opportunity"]);

    let opportunity = &dictionary.tables[2];
    let fields: Vec<&str> = opportunity
        .attributes
        .iter()
        .map(|a| a.logical_name.as_str())
        .collect();
    // main form fields plus createdon and statecode; closeprobability is only
    // on the quick-view form
    assert_eq!(
        fields,
        vec![
            "parentcontactid",
            "createdon",
            "estimatedvalue",
            "customerid",
            "statecode",
            "name"
        ]
    );
    assert_eq!(opportunity.forms.len(), 1);
    assert_eq!(opportunity.forms[0].form_name, "Information");
    assert_eq!(opportunity.forms[0].field_count, 4);
    assert!(!opportunity
        .attributes
        .iter()
        .any(|a| a.logical_name == "closeprobability"));
    assert_eq!(
        opportunity.view.as_ref().map(|v| v.view_name.as_str()),
        Some("Active Opportunitys")
    );

    let contact = &dictionary.tables[1];
    assert!(contact.attributes.iter().any(|a| a.logical_name == "modifiedon"));
}

#[tokio::test]
async fn test_extract_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let adapter = sales_web_adapter();
    let options = ExtractOptions {
        output_dir: dir.path().join("Metadata"),
        project_name: Some("Sales Report".to_string()),
        ..options()
    };

    let (path, dictionary) =
        extract_dictionary(&adapter, ENVIRONMENT_URL, &options, &CancellationToken::new())
            .await
            .unwrap();

    assert_eq!(
        path,
        dir.path().join("Metadata").join("Sales Report Metadata Dictionary.json")
    );
    assert_eq!(MetadataDictionary::from_path(&path).unwrap(), dictionary);
    assert_eq!(
        fs::read_to_string(dir.path().join("Metadata").join("DataverseURL.txt")).unwrap(),
        ENVIRONMENT_URL
    );

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["ProjectName"], "Sales Report");
    assert_eq!(json["Tables"][0]["LogicalName"], "account");
    assert_eq!(json["Tables"][0]["Attributes"][0]["LogicalName"], "name");
    assert_eq!(json["Tables"][0]["Attributes"][0]["AttributeType"], "String");
    assert!(!fs::read(&path).unwrap().starts_with(&[0xEF, 0xBB, 0xBF]));
}

#[tokio::test]
async fn test_chosen_tables_forms_views_and_attributes() {
    let tables = tables_by_name();
    let adapter = sales_web_adapter();
    let options = ExtractOptions {
        tables: vec!["Opportunity".to_string(), "contact".to_string()],
        table_forms: BTreeMap::from([(
            "opportunity".to_string(),
            tables["opportunity"].form_id.to_string(),
        )]),
        table_views: BTreeMap::from([(
            "contact".to_string(),
            tables["contact"].view_id.to_string(),
        )]),
        table_attributes: BTreeMap::from([(
            "contact".to_string(),
            vec!["EmailAddress1".to_string(), "fullname".to_string()],
        )]),
        ..options()
    };

    let dictionary =
        collect_dictionary(&adapter, ENVIRONMENT_URL, &options, &CancellationToken::new())
            .await
            .unwrap();

    let names: Vec<&str> = dictionary
        .tables
        .iter()
        .map(|t| t.logical_name.as_str())
        .collect();
    assert_eq!(names, vec!["contact", "opportunity"]);

    let contact = &dictionary.tables[0];
    let fields: Vec<&str> = contact
        .attributes
        .iter()
        .map(|a| a.logical_name.as_str())
        .collect();
    // no standard fields with an explicit selection
    assert_eq!(fields, vec!["emailaddress1", "fullname"]);
    let view = contact.view.as_ref().unwrap();
    assert_eq!(view.view_id, tables["contact"].view_id);
    assert_eq!(view.fetch_xml.as_deref(), Some(tables["contact"].fetch_xml().as_str()));

    let opportunity = &dictionary.tables[1];
    assert_eq!(opportunity.forms.len(), 1);
    assert_eq!(opportunity.forms[0].form_id, tables["opportunity"].form_id);
}

#[tokio::test]
async fn test_quick_view_form_cannot_be_chosen() {
    let tables = tables_by_name();
    let adapter = sales_web_adapter();
    let options = ExtractOptions {
        table_forms: BTreeMap::from([(
            "opportunity".to_string(),
            tables["opportunity"].quick_view_id().to_string(),
        )]),
        ..options()
    };
    let err = collect_dictionary(&adapter, ENVIRONMENT_URL, &options, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not an active main form"));
}

#[tokio::test]
async fn test_unknown_view_or_table_fails() {
    let adapter = sales_web_adapter();
    let cancel = CancellationToken::new();

    let options = ExtractOptions {
        table_views: BTreeMap::from([("account".to_string(), "not-a-guid".to_string())]),
        ..options()
    };
    let err = collect_dictionary(&adapter, ENVIRONMENT_URL, &options, &cancel)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid view id"));

    let options = ExtractOptions {
        tables: vec!["invoice".to_string()],
        ..self::options()
    };
    let err = collect_dictionary(&adapter, ENVIRONMENT_URL, &options, &cancel)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invoice"));
}

#[tokio::test]
async fn test_unknown_solution_fails() {
    let adapter = sales_web_adapter();
    let options = ExtractOptions {
        solution: "Missing".to_string(),
        ..options()
    };
    let result =
        collect_dictionary(&adapter, ENVIRONMENT_URL, &options, &CancellationToken::new()).await;
    assert!(result.is_err());
}

#[test]
fn test_corrupt_dictionary_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{").unwrap();
    let err = MetadataDictionary::from_path(&path).unwrap_err();
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn test_attribute_type_roundtrips_unknown_tokens() {
    let json = r#"{"Environment":"e","Solution":"s","Tables":[{"LogicalName":"a","DisplayName":"A","SchemaName":"A","Forms":[],"Attributes":[{"LogicalName":"x","SchemaName":"x","DisplayName":"X","AttributeType":"MultiSelectPicklistType","IsCustom":false}]}]}"#;
    let dictionary: MetadataDictionary = serde_json::from_str(json).unwrap();
    assert_eq!(
        dictionary.tables[0].attributes[0].attribute_type,
        AttributeType::Other("MultiSelectPicklistType".to_string())
    );
    assert_eq!(dictionary.total_attributes(), 1);
}
