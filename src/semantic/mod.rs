//! Semantic model construction: table selections, rendered fragments and
//! relationships

mod fragment;
mod relationships;
mod selection;
mod tmdl;

pub use fragment::{
    ensure_unique_names, sort_fragments, FragmentClassifier, FragmentRole, ModelFragment,
    RELATIONSHIPS_FRAGMENT,
};
pub use relationships::infer_relationships;
pub use selection::{assign_table_names, TableSelection};
pub use tmdl::{
    quote_name, render_date_table, render_environment_expression, render_relationships,
    render_table, DateTableSpec, ENVIRONMENT_PARAMETER,
};
