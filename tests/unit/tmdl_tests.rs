//! TMDL rendering tests

use pretty_assertions::assert_eq;

use dataverse_semantic::model::{AttributeMetadata, AttributeType, TableMetadata};
use dataverse_semantic::semantic::{
    assign_table_names, ensure_unique_names, infer_relationships, quote_name,
    render_environment_expression, render_relationships, render_table, FragmentRole,
    ModelFragment, TableSelection, ENVIRONMENT_PARAMETER, RELATIONSHIPS_FRAGMENT,
};

fn attribute(logical: &str, display: &str, ty: AttributeType) -> AttributeMetadata {
    AttributeMetadata {
        logical_name: logical.to_string(),
        display_name: display.to_string(),
        schema_name: logical.to_string(),
        targets: ty.is_lookup().then(Vec::new),
        attribute_type: ty,
        is_custom: false,
        is_required: false,
    }
}

fn with_targets(mut attribute: AttributeMetadata, targets: &[&str]) -> AttributeMetadata {
    attribute.targets = Some(targets.iter().map(|t| t.to_string()).collect());
    attribute
}

fn table(logical: &str, display: &str, primary_name: &str) -> TableMetadata {
    TableMetadata {
        logical_name: logical.to_string(),
        display_name: display.to_string(),
        schema_name: display.to_string(),
        primary_id_attribute: Some(format!("{}id", logical)),
        primary_name_attribute: Some(primary_name.to_string()),
        object_type_code: None,
        metadata_id: None,
    }
}

fn star() -> Vec<TableSelection> {
    vec![
        TableSelection::new(
            table("opportunity", "Opportunity", "name"),
            vec![
                attribute("opportunityid", "Opportunity", AttributeType::Uniqueidentifier),
                attribute("name", "Topic", AttributeType::String),
                with_targets(
                    attribute("customerid", "Potential Customer", AttributeType::Customer),
                    &["account", "contact"],
                ),
                attribute("closeprobability", "Probability", AttributeType::Integer),
            ],
            vec!["customerid".to_string(), "closeprobability".to_string()],
        )
        .as_fact(true),
        TableSelection::new(
            table("account", "Account", "name"),
            vec![
                attribute("accountid", "Account", AttributeType::Uniqueidentifier),
                attribute("name", "Account Name", AttributeType::String),
            ],
            Vec::<String>::new(),
        ),
    ]
}

#[test]
fn test_fact_table_columns() {
    let selections = star();
    let fragment = render_table(&selections[0]);
    assert_eq!(fragment.role, FragmentRole::FactTable);
    assert!(fragment.content.contains(
        "\tcolumn 'Potential Customer'\n\t\tdataType: string\n\t\tisHidden\n\t\tsourceColumn: customerid\n"
    ));
    assert!(fragment
        .content
        .contains("\tcolumn Probability\n\t\tdataType: int64\n\t\tsourceColumn: closeprobability\n"));
    assert!(fragment
        .content
        .contains("\"SELECT opportunityid, name, customerid, closeprobability FROM opportunity\""));
}

#[test]
fn test_rendering_is_deterministic() {
    let selections = star();
    assert_eq!(render_table(&selections[1]), render_table(&selections[1]));
}

#[test]
fn test_relationships_fragment() {
    let selections = star();
    let relationships = infer_relationships(&selections);
    let fragment = render_relationships(&relationships, &selections).unwrap();

    assert_eq!(fragment.name, RELATIONSHIPS_FRAGMENT);
    assert_eq!(fragment.role, FragmentRole::Expression);
    assert_eq!(
        fragment.content,
        "relationship opportunity_customerid_account\n\
         \tfromColumn: Opportunity.'Potential Customer'\n\
         \ttoColumn: Account.Account\n"
    );
}

#[test]
fn test_inactive_and_integrity_flags() {
    let selections = star();
    let mut relationships = infer_relationships(&selections);
    relationships[0].is_active = false;
    relationships[0].assume_referential_integrity = true;
    let fragment = render_relationships(&relationships, &selections).unwrap();
    assert!(fragment
        .content
        .ends_with("\tisActive: false\n\trelyOnReferentialIntegrity\n"));
}

#[test]
fn test_tables_sharing_a_label_render_separately() {
    let mut selections = vec![
        TableSelection::new(
            table("new_invoice", "Invoice", "new_name"),
            vec![
                attribute("new_invoiceid", "Invoice", AttributeType::Uniqueidentifier),
                with_targets(
                    attribute("new_customerid", "Customer", AttributeType::Lookup),
                    &["account"],
                ),
                with_targets(
                    attribute("new_partnerid", "Partner", AttributeType::Lookup),
                    &["new_account"],
                ),
            ],
            vec!["new_customerid".to_string(), "new_partnerid".to_string()],
        )
        .as_fact(true),
        TableSelection::new(
            table("account", "Account", "name"),
            vec![attribute("accountid", "Account", AttributeType::Uniqueidentifier)],
            Vec::<String>::new(),
        ),
        TableSelection::new(
            table("new_account", "Account", "new_name"),
            vec![attribute("new_accountid", "Account", AttributeType::Uniqueidentifier)],
            Vec::<String>::new(),
        ),
        TableSelection::new(
            table("new_dataverseurl", "DataverseURL", "new_name"),
            vec![attribute("new_dataverseurlid", "Link", AttributeType::Uniqueidentifier)],
            Vec::<String>::new(),
        ),
    ];
    assign_table_names(&mut selections, &[ENVIRONMENT_PARAMETER, RELATIONSHIPS_FRAGMENT]);

    let relationships = infer_relationships(&selections);
    let mut fragments = vec![render_environment_expression("https://contoso.crm.dynamics.com")];
    fragments.extend(selections.iter().map(render_table));
    fragments.push(render_relationships(&relationships, &selections).unwrap());
    assert!(ensure_unique_names(&fragments).is_ok());

    let names: Vec<&str> = fragments.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "DataverseURL",
            "Invoice",
            "Account (account)",
            "Account (new_account)",
            "DataverseURL (new_dataverseurl)",
            "relationships",
        ]
    );

    let partner: &ModelFragment = &fragments[3];
    assert!(partner.content.starts_with("table 'Account (new_account)'\n"));
    assert_eq!(
        fragments[5].content,
        "relationship new_invoice_new_customerid_account\n\
         \tfromColumn: Invoice.Customer\n\
         \ttoColumn: 'Account (account)'.Account\n\
         \n\
         relationship new_invoice_new_partnerid_new_account\n\
         \tfromColumn: Invoice.Partner\n\
         \ttoColumn: 'Account (new_account)'.Account\n"
    );
}

#[test]
fn test_quote_name_doubles_quotes() {
    assert_eq!(quote_name("Customer's Orders"), "'Customer''s Orders'");
    assert_eq!(quote_name("Sales_2024"), "Sales_2024");
    assert_eq!(quote_name(""), "''");
}
