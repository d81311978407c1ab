//! Model fragments, their roles and the canonical ordering

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DataverseError, Result};
use crate::util::{cmp_ci, starts_with_ci};

/// Name of the fragment holding every relationship
pub const RELATIONSHIPS_FRAGMENT: &str = "relationships";

/// Role of a fragment; the declaration order is the export order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FragmentRole {
    Expression,
    DateTable,
    FactTable,
    DimensionTable,
}

impl FragmentRole {
    pub fn ordinal(self) -> u8 {
        match self {
            FragmentRole::Expression => 0,
            FragmentRole::DateTable => 1,
            FragmentRole::FactTable => 2,
            FragmentRole::DimensionTable => 3,
        }
    }

    /// Presentation label
    pub fn label(self) -> &'static str {
        match self {
            FragmentRole::Expression => "Config",
            FragmentRole::DateTable => "Date",
            FragmentRole::FactTable => "Fact",
            FragmentRole::DimensionTable => "Dimension",
        }
    }
}

impl fmt::Display for FragmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One named, independently renderable block of model definition text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFragment {
    pub name: String,
    pub content: String,
    pub role: FragmentRole,
}

impl ModelFragment {
    pub fn new(name: impl Into<String>, content: impl Into<String>, role: FragmentRole) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            role,
        }
    }
}

/// Canonical order: role ordinal, then name case-insensitively.
///
/// The result depends only on the (role, name) pairs, never on input order.
/// Every preview, export-one and export-all path goes through here.
pub fn sort_fragments(fragments: &[ModelFragment]) -> Vec<&ModelFragment> {
    let mut sorted: Vec<&ModelFragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| {
        a.role
            .ordinal()
            .cmp(&b.role.ordinal())
            .then_with(|| cmp_ci(&a.name, &b.name))
    });
    sorted
}

/// Fail when two fragments share a name, ignoring case.
pub fn ensure_unique_names(fragments: &[ModelFragment]) -> Result<()> {
    let mut seen = HashSet::with_capacity(fragments.len());
    for fragment in fragments {
        if !seen.insert(fragment.name.to_lowercase()) {
            return Err(DataverseError::InvalidArgument {
                name: "fragments",
                message: format!("duplicate fragment name '{}'", fragment.name),
            });
        }
    }
    Ok(())
}

/// Assigns roles to fragments by name and content
#[derive(Debug, Clone)]
pub struct FragmentClassifier {
    fact_tables: HashSet<String>,
    date_table: String,
}

impl FragmentClassifier {
    pub fn new<I, S>(fact_tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fact_tables: fact_tables
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
            date_table: "Date".to_string(),
        }
    }

    pub fn with_date_table(mut self, name: impl Into<String>) -> Self {
        self.date_table = name.into();
        self
    }

    pub fn classify(&self, name: &str, content: &str) -> FragmentRole {
        if name.eq_ignore_ascii_case(RELATIONSHIPS_FRAGMENT)
            || starts_with_ci(content.trim_start(), "expression ")
        {
            FragmentRole::Expression
        } else if name.eq_ignore_ascii_case(&self.date_table) {
            FragmentRole::DateTable
        } else if self.fact_tables.contains(&name.to_lowercase()) {
            FragmentRole::FactTable
        } else {
            FragmentRole::DimensionTable
        }
    }
}
