//! Mapping of backend attribute-type tokens to the canonical attribute types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical attribute type
///
/// Tokens the mapper does not recognise are carried through unchanged in
/// [`AttributeType::Other`], so a new backend type never breaks extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeType {
    String,
    Memo,
    Integer,
    BigInt,
    Double,
    Decimal,
    Money,
    Boolean,
    DateTime,
    Lookup,
    Customer,
    Owner,
    Uniqueidentifier,
    Picklist,
    State,
    Status,
    EntityName,
    Image,
    File,
    Virtual,
    /// Unrecognised token, preserved verbatim
    Other(String),
}

/// Canonical types paired with the names the backends use for them.
const NAMED_TYPES: &[(&str, AttributeType)] = &[
    ("String", AttributeType::String),
    ("Memo", AttributeType::Memo),
    ("Integer", AttributeType::Integer),
    ("BigInt", AttributeType::BigInt),
    ("Double", AttributeType::Double),
    ("Decimal", AttributeType::Decimal),
    ("Money", AttributeType::Money),
    ("Boolean", AttributeType::Boolean),
    ("DateTime", AttributeType::DateTime),
    ("Lookup", AttributeType::Lookup),
    ("Customer", AttributeType::Customer),
    ("Owner", AttributeType::Owner),
    ("Uniqueidentifier", AttributeType::Uniqueidentifier),
    ("Picklist", AttributeType::Picklist),
    ("State", AttributeType::State),
    ("Status", AttributeType::Status),
    ("EntityName", AttributeType::EntityName),
    ("Image", AttributeType::Image),
    ("ImageType", AttributeType::Image),
    ("File", AttributeType::File),
    ("FileType", AttributeType::File),
    ("Virtual", AttributeType::Virtual),
];

/// SDK `AttributeTypeCode` values. Codes without a canonical variant map to
/// their SDK name.
const SDK_TYPE_CODES: &[&str] = &[
    "Boolean",
    "Customer",
    "DateTime",
    "Decimal",
    "Double",
    "Integer",
    "Lookup",
    "Memo",
    "Money",
    "Owner",
    "PartyList",
    "Picklist",
    "State",
    "Status",
    "String",
    "Uniqueidentifier",
    "CalendarRules",
    "Virtual",
    "BigInt",
    "ManagedProperty",
    "EntityName",
];

/// Map a backend type token (name or SDK numeric code) to a canonical type.
///
/// Total: any token not in the table is returned as [`AttributeType::Other`]
/// holding the original token.
pub fn map_attribute_type(token: &str) -> AttributeType {
    let trimmed = token.trim();

    if let Ok(code) = trimmed.parse::<usize>() {
        if let Some(name) = SDK_TYPE_CODES.get(code) {
            return lookup_named(name).unwrap_or_else(|| AttributeType::Other(name.to_string()));
        }
    }

    lookup_named(trimmed).unwrap_or_else(|| AttributeType::Other(token.to_string()))
}

fn lookup_named(token: &str) -> Option<AttributeType> {
    NAMED_TYPES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, ty)| ty.clone())
}

impl AttributeType {
    /// Canonical name, or the original token for unrecognised types
    pub fn as_str(&self) -> &str {
        match self {
            AttributeType::String => "String",
            AttributeType::Memo => "Memo",
            AttributeType::Integer => "Integer",
            AttributeType::BigInt => "BigInt",
            AttributeType::Double => "Double",
            AttributeType::Decimal => "Decimal",
            AttributeType::Money => "Money",
            AttributeType::Boolean => "Boolean",
            AttributeType::DateTime => "DateTime",
            AttributeType::Lookup => "Lookup",
            AttributeType::Customer => "Customer",
            AttributeType::Owner => "Owner",
            AttributeType::Uniqueidentifier => "Uniqueidentifier",
            AttributeType::Picklist => "Picklist",
            AttributeType::State => "State",
            AttributeType::Status => "Status",
            AttributeType::EntityName => "EntityName",
            AttributeType::Image => "Image",
            AttributeType::File => "File",
            AttributeType::Virtual => "Virtual",
            AttributeType::Other(token) => token,
        }
    }

    /// Lookup, Customer and Owner attributes reference other tables.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            AttributeType::Lookup | AttributeType::Customer | AttributeType::Owner
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AttributeType::Other(_))
    }

    /// TMDL `dataType` used when rendering a column of this type
    pub fn tmdl_data_type(&self) -> &'static str {
        match self {
            AttributeType::Integer
            | AttributeType::BigInt
            | AttributeType::Picklist
            | AttributeType::State
            | AttributeType::Status => "int64",
            AttributeType::Double => "double",
            AttributeType::Decimal | AttributeType::Money => "decimal",
            AttributeType::Boolean => "boolean",
            AttributeType::DateTime => "dateTime",
            _ => "string",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AttributeType {
    fn from(token: String) -> Self {
        map_attribute_type(&token)
    }
}

impl From<AttributeType> for String {
    fn from(ty: AttributeType) -> Self {
        ty.as_str().to_string()
    }
}
