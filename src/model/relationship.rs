//! Relationships between modelled tables and their validation

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DataverseError, Result};

/// A many-to-one edge from a lookup attribute to its target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub from_attribute: String,
    pub to_table: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    /// Dimension to parent dimension edge
    pub is_snowflake: bool,
    pub assume_referential_integrity: bool,
}

impl Relationship {
    /// Unordered table pair, lowercased
    pub fn table_pair(&self) -> (String, String) {
        let a = self.from_table.to_lowercase();
        let b = self.to_table.to_lowercase();
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// A violated relationship invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipIssue {
    /// More than one relationship defined on the same source attribute
    DuplicateDefinition {
        table: String,
        attribute: String,
        count: usize,
    },
    /// A connected table pair with no active relationship
    NoActiveRelationship { tables: (String, String) },
    /// A connected table pair with several active relationships
    MultipleActiveRelationships {
        tables: (String, String),
        active: usize,
    },
}

impl fmt::Display for RelationshipIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipIssue::DuplicateDefinition {
                table,
                attribute,
                count,
            } => write!(
                f,
                "{} relationships defined on {}.{}",
                count, table, attribute
            ),
            RelationshipIssue::NoActiveRelationship { tables } => write!(
                f,
                "no active relationship between {} and {}",
                tables.0, tables.1
            ),
            RelationshipIssue::MultipleActiveRelationships { tables, active } => write!(
                f,
                "{} active relationships between {} and {}",
                active, tables.0, tables.1
            ),
        }
    }
}

/// Check the relationship invariants.
///
/// Returns every issue found, ordered by table and attribute names. An empty
/// result means the set is valid.
pub fn validate_relationships(relationships: &[Relationship]) -> Vec<RelationshipIssue> {
    let mut by_source: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut active_by_pair: BTreeMap<(String, String), usize> = BTreeMap::new();

    for rel in relationships {
        *by_source
            .entry((
                rel.from_table.to_lowercase(),
                rel.from_attribute.to_lowercase(),
            ))
            .or_default() += 1;

        let active = active_by_pair.entry(rel.table_pair()).or_default();
        if rel.is_active {
            *active += 1;
        }
    }

    let mut issues: Vec<RelationshipIssue> = by_source
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((table, attribute), count)| RelationshipIssue::DuplicateDefinition {
            table,
            attribute,
            count,
        })
        .collect();

    for (tables, active) in active_by_pair {
        match active {
            1 => {}
            0 => issues.push(RelationshipIssue::NoActiveRelationship { tables }),
            _ => issues.push(RelationshipIssue::MultipleActiveRelationships { tables, active }),
        }
    }

    issues
}

/// Fail with [`DataverseError::InvalidRelationships`] when any invariant is violated.
pub fn ensure_valid_relationships(relationships: &[Relationship]) -> Result<()> {
    let issues = validate_relationships(relationships);
    if issues.is_empty() {
        return Ok(());
    }
    Err(DataverseError::InvalidRelationships {
        issues: issues.iter().map(ToString::to_string).collect(),
    })
}
