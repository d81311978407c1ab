//! Project-level settings persisted between runs

mod settings;

pub use settings::{ExtractSettings, DEFAULT_SETTINGS_FILE};
