//! Fragment classification and canonical ordering tests

use dataverse_semantic::semantic::{
    sort_fragments, FragmentClassifier, FragmentRole, ModelFragment,
};

fn classified(classifier: &FragmentClassifier, items: &[(&str, &str)]) -> Vec<ModelFragment> {
    items
        .iter()
        .map(|(name, content)| {
            ModelFragment::new(*name, *content, classifier.classify(name, content))
        })
        .collect()
}

fn order(fragments: &[ModelFragment]) -> Vec<(FragmentRole, &str)> {
    sort_fragments(fragments)
        .into_iter()
        .map(|f| (f.role, f.name.as_str()))
        .collect()
}

#[test]
fn test_full_model_order() {
    let classifier = FragmentClassifier::new(["Opportunity"]).with_date_table("Calendar");
    let fragments = classified(
        &classifier,
        &[
            ("contact", "table contact"),
            ("relationships", "relationship x"),
            ("Opportunity", "table Opportunity"),
            ("Calendar", "table Calendar"),
            ("DataverseURL", "expression DataverseURL = \"x\""),
            ("Account", "table Account"),
        ],
    );

    assert_eq!(
        order(&fragments),
        vec![
            (FragmentRole::Expression, "DataverseURL"),
            (FragmentRole::Expression, "relationships"),
            (FragmentRole::DateTable, "Calendar"),
            (FragmentRole::FactTable, "Opportunity"),
            (FragmentRole::DimensionTable, "Account"),
            (FragmentRole::DimensionTable, "contact"),
        ]
    );
}

#[test]
fn test_expression_detected_by_content() {
    let classifier = FragmentClassifier::new(Vec::<String>::new());
    assert_eq!(
        classifier.classify("Parameters", "  EXPRESSION Region = \"EU\""),
        FragmentRole::Expression
    );
    assert_eq!(
        classifier.classify("Expressionist", "table Expressionist"),
        FragmentRole::DimensionTable
    );
}

#[test]
fn test_fact_match_ignores_case() {
    let classifier = FragmentClassifier::new(["opportunity"]);
    assert_eq!(
        classifier.classify("OPPORTUNITY", "table x"),
        FragmentRole::FactTable
    );
}

#[test]
fn test_every_permutation_sorts_identically() {
    let fragments = vec![
        ModelFragment::new("b", "", FragmentRole::DimensionTable),
        ModelFragment::new("A", "", FragmentRole::DimensionTable),
        ModelFragment::new("Sales", "", FragmentRole::FactTable),
        ModelFragment::new("Date", "", FragmentRole::DateTable),
    ];
    let expected: Vec<String> = sort_fragments(&fragments)
        .into_iter()
        .map(|f| f.name.clone())
        .collect();
    assert_eq!(expected, vec!["Date", "Sales", "A", "b"]);

    let mut indices: Vec<usize> = (0..fragments.len()).collect();
    let mut count = 0;
    permute(&mut indices, 0, &mut |perm: &[usize]| {
        let shuffled: Vec<ModelFragment> = perm.iter().map(|&i| fragments[i].clone()).collect();
        let names: Vec<String> = sort_fragments(&shuffled)
            .into_iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, expected);
        count += 1;
    });
    assert_eq!(count, 24);
}

fn permute(items: &mut Vec<usize>, k: usize, visit: &mut dyn FnMut(&[usize])) {
    if k == items.len() {
        visit(items.as_slice());
        return;
    }
    for i in k..items.len() {
        items.swap(k, i);
        permute(items, k + 1, visit);
        items.swap(k, i);
    }
}

#[test]
fn test_role_labels() {
    let labels: Vec<&str> = [
        FragmentRole::Expression,
        FragmentRole::DateTable,
        FragmentRole::FactTable,
        FragmentRole::DimensionTable,
    ]
    .iter()
    .map(|r| r.label())
    .collect();
    assert_eq!(labels, vec!["Config", "Date", "Fact", "Dimension"]);
}
