//! The caller's choice of tables and columns to model

use std::collections::{BTreeSet, HashMap};

use crate::model::{AttributeMetadata, TableMetadata};

/// One table to model and the attributes chosen for it
#[derive(Debug, Clone)]
pub struct TableSelection {
    pub table: TableMetadata,
    /// Every readable attribute of the table, in display order
    pub attributes: Vec<AttributeMetadata>,
    /// Chosen attribute logical names (lowercase)
    pub selected: BTreeSet<String>,
    pub is_fact: bool,
    /// Overrides the display name as the model name; see [`assign_table_names`]
    pub model_name: Option<String>,
}

impl TableSelection {
    pub fn new(
        table: TableMetadata,
        attributes: Vec<AttributeMetadata>,
        selected: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            table,
            attributes,
            selected: selected.into_iter().map(|s| s.to_lowercase()).collect(),
            is_fact: false,
            model_name: None,
        }
    }

    pub fn as_fact(mut self, is_fact: bool) -> Self {
        self.is_fact = is_fact;
        self
    }

    pub fn logical_name(&self) -> &str {
        &self.table.logical_name
    }

    /// Model name of the table
    pub fn name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or(&self.table.display_name)
    }

    /// Primary id and primary name are always modelled.
    pub fn is_modelled(&self, attribute: &AttributeMetadata) -> bool {
        let logical = attribute.logical_name.as_str();
        self.selected.contains(&logical.to_lowercase())
            || self.table.primary_id_attribute.as_deref() == Some(logical)
            || self.table.primary_name_attribute.as_deref() == Some(logical)
    }

    pub fn is_primary_id(&self, attribute: &AttributeMetadata) -> bool {
        self.table.primary_id_attribute.as_deref() == Some(attribute.logical_name.as_str())
    }

    /// Modelled attributes with unique column names.
    ///
    /// Display names shared by several attributes are disambiguated with the
    /// logical name.
    pub fn column_names(&self) -> Vec<(&AttributeMetadata, String)> {
        let modelled: Vec<&AttributeMetadata> = self
            .attributes
            .iter()
            .filter(|a| self.is_modelled(a))
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for attribute in &modelled {
            *counts
                .entry(attribute.display_name.to_lowercase())
                .or_default() += 1;
        }

        modelled
            .into_iter()
            .map(|attribute| {
                let name = if counts[&attribute.display_name.to_lowercase()] > 1 {
                    format!("{} ({})", attribute.display_name, attribute.logical_name)
                } else {
                    attribute.display_name.clone()
                };
                (attribute, name)
            })
            .collect()
    }

    /// Rendered column name for an attribute, if it is modelled
    pub fn column_name(&self, logical_name: &str) -> Option<String> {
        self.column_names()
            .into_iter()
            .find(|(a, _)| a.logical_name.eq_ignore_ascii_case(logical_name))
            .map(|(_, name)| name)
    }
}

/// Give every selection a unique model name.
///
/// A display name shared by several tables, or equal to one of `reserved`
/// (ignoring case), is disambiguated with the logical name the same way
/// columns are.
pub fn assign_table_names(selections: &mut [TableSelection], reserved: &[&str]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for selection in selections.iter() {
        *counts
            .entry(selection.table.display_name.to_lowercase())
            .or_default() += 1;
    }
    for name in reserved {
        *counts.entry(name.to_lowercase()).or_default() += 1;
    }

    for selection in selections.iter_mut() {
        let table = &selection.table;
        selection.model_name = (counts[&table.display_name.to_lowercase()] > 1)
            .then(|| format!("{} ({})", table.display_name, table.logical_name));
    }
}
