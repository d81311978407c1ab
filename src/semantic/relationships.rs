//! Relationship inference from lookup attributes

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::TableSelection;
use crate::model::Relationship;

/// Build relationships from modelled lookups whose target table is modelled.
///
/// Each lookup yields at most one relationship (its first modelled target).
/// The first relationship between a pair of tables is active and later ones
/// are inactive, so the result always passes
/// [`crate::model::validate_relationships`]. Lookups into a fact table are
/// skipped.
pub fn infer_relationships(selections: &[TableSelection]) -> Vec<Relationship> {
    let by_name: HashMap<String, &TableSelection> = selections
        .iter()
        .map(|s| (s.logical_name().to_lowercase(), s))
        .collect();

    let mut ordered: Vec<&TableSelection> = selections.iter().collect();
    ordered.sort_by(|a, b| a.logical_name().cmp(b.logical_name()));

    let mut active_pairs: HashSet<(String, String)> = HashSet::new();
    let mut relationships = Vec::new();

    for source in ordered {
        let mut lookups: Vec<_> = source
            .attributes
            .iter()
            .filter(|a| a.attribute_type.is_lookup() && source.is_modelled(a))
            .collect();
        lookups.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));

        for attribute in lookups {
            let targets = attribute.targets.as_deref().unwrap_or_default();
            let Some(target) = targets.iter().find_map(|t| {
                by_name
                    .get(&t.to_lowercase())
                    .filter(|target| target.logical_name() != source.logical_name())
            }) else {
                continue;
            };

            if target.is_fact {
                debug!(
                    from = source.logical_name(),
                    attribute = %attribute.logical_name,
                    to = target.logical_name(),
                    "Skipping lookup into fact table"
                );
                continue;
            }

            let mut relationship = Relationship {
                from_table: source.logical_name().to_string(),
                from_attribute: attribute.logical_name.clone(),
                to_table: target.logical_name().to_string(),
                display_name: Some(attribute.display_name.clone()),
                is_active: false,
                is_snowflake: !source.is_fact,
                assume_referential_integrity: attribute.is_required,
            };
            relationship.is_active = active_pairs.insert(relationship.table_pair());
            relationships.push(relationship);
        }
    }

    relationships
}
