//! Field extraction from form XML and FetchXML definitions
//!
//! Definitions come from the backend and are treated as untrusted text. The
//! reader never expands entities, and a DOCTYPE declaration ends the scan.
//! A malformed document never fails the caller: the identifiers collected
//! before the fault are returned.

use std::collections::BTreeSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

/// Which definition language a document is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// Form XML: `<control datafieldname="...">`
    Form,
    /// FetchXML: `<attribute name="...">` outside any `<link-entity>`
    FetchXml,
}

impl DefinitionKind {
    fn element(self) -> &'static [u8] {
        match self {
            DefinitionKind::Form => b"control",
            DefinitionKind::FetchXml => b"attribute",
        }
    }

    fn field_attribute(self) -> &'static [u8] {
        match self {
            DefinitionKind::Form => b"datafieldname",
            DefinitionKind::FetchXml => b"name",
        }
    }
}

/// Field logical names bound to controls on a form
pub fn extract_form_fields(form_xml: &str) -> Vec<String> {
    extract_fields(form_xml, DefinitionKind::Form)
}

/// Column logical names selected by a view's FetchXML
pub fn extract_view_columns(fetch_xml: &str) -> Vec<String> {
    extract_fields(fetch_xml, DefinitionKind::FetchXml)
}

/// Extract lowercase, de-duplicated, ascending field identifiers.
pub fn extract_fields(definition: &str, kind: DefinitionKind) -> Vec<String> {
    let mut reader = Reader::from_str(definition);
    reader.config_mut().trim_text(true);

    let mut fields = BTreeSet::new();
    let mut link_entity_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                if is_link_entity(kind, &element) {
                    link_entity_depth += 1;
                } else if link_entity_depth == 0 {
                    collect_field(kind, &element, &mut fields);
                }
            }
            Ok(Event::Empty(element)) => {
                if link_entity_depth == 0 && !is_link_entity(kind, &element) {
                    collect_field(kind, &element, &mut fields);
                }
            }
            Ok(Event::End(element)) => {
                if kind == DefinitionKind::FetchXml
                    && element.local_name().as_ref() == b"link-entity"
                {
                    link_entity_depth = link_entity_depth.saturating_sub(1);
                }
            }
            Ok(Event::DocType(_)) => {
                warn!(
                    collected = fields.len(),
                    "Definition declares a DTD; stopping field extraction"
                );
                break;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(
                    position = reader.error_position(),
                    collected = fields.len(),
                    "Could not parse definition XML: {}",
                    e
                );
                break;
            }
        }
    }

    debug!(count = fields.len(), ?kind, "Extracted definition fields");
    fields.into_iter().collect()
}

fn is_link_entity(kind: DefinitionKind, element: &BytesStart) -> bool {
    kind == DefinitionKind::FetchXml && element.local_name().as_ref() == b"link-entity"
}

fn collect_field(kind: DefinitionKind, element: &BytesStart, fields: &mut BTreeSet<String>) {
    if element.local_name().as_ref() != kind.element() {
        return;
    }

    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() != kind.field_attribute() {
            continue;
        }
        match attr.unescape_value() {
            Ok(value) => {
                let value = value.trim();
                if !value.is_empty() {
                    fields.insert(value.to_lowercase());
                }
            }
            Err(e) => warn!("Skipping unreadable field reference: {}", e),
        }
    }
}
