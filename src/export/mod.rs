//! Persisting rendered fragments and the metadata dictionary

mod dictionary;
mod naming;
mod writer;

pub use dictionary::{dictionary_file_name, write_dictionary, ENVIRONMENT_FILE};
pub use naming::{sanitize_file_name, PLACEHOLDER};
pub use writer::{
    export_fragment, export_fragments, fragment_file_name, read_exported, FRAGMENT_EXTENSION,
};
