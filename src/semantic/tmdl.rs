//! TMDL text for tables, the calendar table, the environment parameter and
//! relationships
//!
//! Output is deterministic: tab indentation, `\n` line endings and a stable
//! column order, so re-rendering the same selection yields identical bytes.

use crate::error::{DataverseError, Result};
use crate::model::Relationship;

use super::fragment::{FragmentRole, ModelFragment, RELATIONSHIPS_FRAGMENT};
use super::TableSelection;

/// Name of the environment parameter expression
pub const ENVIRONMENT_PARAMETER: &str = "DataverseURL";

/// Calendar table settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTableSpec {
    pub name: String,
    pub start_year: i32,
    pub end_year: i32,
}

impl Default for DateTableSpec {
    fn default() -> Self {
        Self {
            name: "Date".to_string(),
            start_year: 2015,
            end_year: 2030,
        }
    }
}

/// Quote a TMDL object name when it is not a plain identifier.
pub fn quote_name(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

struct TmdlWriter {
    out: String,
}

impl TmdlWriter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Render one Dataverse table as an import-mode table backed by a native query.
pub fn render_table(selection: &TableSelection) -> ModelFragment {
    let table_name = selection.name();
    let columns = selection.column_names();

    let mut w = TmdlWriter::new();
    w.line(0, &format!("table {}", quote_name(table_name)));

    for (attribute, column_name) in &columns {
        w.blank();
        w.line(1, &format!("column {}", quote_name(column_name)));
        w.line(
            2,
            &format!("dataType: {}", attribute.attribute_type.tmdl_data_type()),
        );
        if attribute.attribute_type.is_lookup() || selection.is_primary_id(attribute) {
            w.line(2, "isHidden");
        }
        w.line(2, &format!("sourceColumn: {}", attribute.logical_name));
        w.line(2, "summarizeBy: none");
    }

    let select_list = columns
        .iter()
        .map(|(a, _)| a.logical_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "SELECT {} FROM {}",
        if select_list.is_empty() { "*" } else { select_list.as_str() },
        selection.logical_name()
    );

    w.blank();
    w.line(1, &format!("partition {} = m", quote_name(table_name)));
    w.line(2, "mode: import");
    w.line(2, "source =");
    w.line(4, "let");
    w.line(
        5,
        &format!(
            "Source = Value.NativeQuery(CommonDataService.Database({}), \"{}\", null, [EnableFolding=true])",
            ENVIRONMENT_PARAMETER,
            query.replace('"', "\"\"")
        ),
    );
    w.line(4, "in");
    w.line(5, "Source");

    let role = if selection.is_fact {
        FragmentRole::FactTable
    } else {
        FragmentRole::DimensionTable
    };
    ModelFragment::new(table_name, w.finish(), role)
}

/// Render a calculated calendar table spanning whole years.
pub fn render_date_table(spec: &DateTableSpec) -> Result<ModelFragment> {
    if spec.name.trim().is_empty() {
        return Err(DataverseError::InvalidArgument {
            name: "date_table",
            message: "name must not be empty".to_string(),
        });
    }
    if spec.start_year > spec.end_year {
        return Err(DataverseError::InvalidArgument {
            name: "date_table",
            message: format!(
                "start year {} is after end year {}",
                spec.start_year, spec.end_year
            ),
        });
    }

    let name = quote_name(&spec.name);
    let mut w = TmdlWriter::new();
    w.line(0, &format!("table {}", name));
    w.line(1, "dataCategory: Time");
    w.blank();
    w.line(1, "column Date");
    w.line(2, "dataType: dateTime");
    w.line(2, "isKey");
    w.line(2, "formatString: yyyy-mm-dd");
    w.line(2, "sourceColumn: [Date]");
    w.line(2, "summarizeBy: none");

    let calculated = [
        ("Year", "YEAR([Date])", "int64"),
        ("Quarter", "\"Q\" & QUARTER([Date])", "string"),
        ("Month", "MONTH([Date])", "int64"),
        ("MonthName", "FORMAT([Date], \"MMMM\")", "string"),
    ];
    for (column, expression, data_type) in calculated {
        w.blank();
        w.line(1, &format!("column {} = {}", column, expression));
        w.line(2, &format!("dataType: {}", data_type));
        w.line(2, "summarizeBy: none");
    }

    w.blank();
    w.line(1, &format!("partition {} = calculated", name));
    w.line(2, "mode: import");
    w.line(
        2,
        &format!(
            "source = CALENDAR(DATE({}, 1, 1), DATE({}, 12, 31))",
            spec.start_year, spec.end_year
        ),
    );

    Ok(ModelFragment::new(
        spec.name.clone(),
        w.finish(),
        FragmentRole::DateTable,
    ))
}

/// Render the required text parameter holding the environment host name.
pub fn render_environment_expression(environment_url: &str) -> ModelFragment {
    let host = environment_url
        .trim()
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let content = format!(
        "expression {} = \"{}\" meta [IsParameterQuery=true, Type=\"Text\", IsParameterQueryRequired=true]\n",
        ENVIRONMENT_PARAMETER,
        host.replace('"', "\"\"")
    );
    ModelFragment::new(ENVIRONMENT_PARAMETER, content, FragmentRole::Expression)
}

/// Render every relationship into the single `relationships` fragment.
///
/// Both ends must be modelled tables: the source column is the lookup's
/// column and the target column is the target table's primary id column.
pub fn render_relationships(
    relationships: &[Relationship],
    selections: &[TableSelection],
) -> Result<ModelFragment> {
    let find = |logical: &str| {
        selections
            .iter()
            .find(|s| s.logical_name().eq_ignore_ascii_case(logical))
    };
    let missing = |message: String| DataverseError::InvalidArgument {
        name: "relationships",
        message,
    };

    let mut w = TmdlWriter::new();
    for (index, relationship) in relationships.iter().enumerate() {
        let from = find(&relationship.from_table).ok_or_else(|| {
            missing(format!("table '{}' is not modelled", relationship.from_table))
        })?;
        let to = find(&relationship.to_table).ok_or_else(|| {
            missing(format!("table '{}' is not modelled", relationship.to_table))
        })?;

        let from_column = from.column_name(&relationship.from_attribute).ok_or_else(|| {
            missing(format!(
                "column '{}.{}' is not modelled",
                relationship.from_table, relationship.from_attribute
            ))
        })?;
        let to_column = to
            .table
            .primary_id_attribute
            .as_deref()
            .and_then(|id| to.column_name(id))
            .ok_or_else(|| {
                missing(format!(
                    "table '{}' has no modelled primary id column",
                    relationship.to_table
                ))
            })?;

        if index > 0 {
            w.blank();
        }
        w.line(
            0,
            &format!(
                "relationship {}",
                quote_name(&format!(
                    "{}_{}_{}",
                    relationship.from_table, relationship.from_attribute, relationship.to_table
                ))
            ),
        );
        w.line(
            1,
            &format!(
                "fromColumn: {}.{}",
                quote_name(from.name()),
                quote_name(&from_column)
            ),
        );
        w.line(
            1,
            &format!("toColumn: {}.{}", quote_name(to.name()), quote_name(&to_column)),
        );
        if !relationship.is_active {
            w.line(1, "isActive: false");
        }
        if relationship.assume_referential_integrity {
            w.line(1, "relyOnReferentialIntegrity");
        }
    }

    Ok(ModelFragment::new(
        RELATIONSHIPS_FRAGMENT,
        w.finish(),
        FragmentRole::Expression,
    ))
}
