//! Parsing of the portal's JSON payloads into records.
//!
//! The portal replies with undocumented JSON. Parsing is deliberately
//! forgiving: absent fields become empty strings and a payload without the
//! expected `content` array counts as zero results, because the schema has
//! changed under us before. Only a body that is not JSON at all is an error.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::{LeafletRecord, MedicineRecord};

/// Parses a medicine search response into records.
///
/// Registry numbers occasionally arrive as JSON numbers instead of
/// strings; both are accepted.
pub fn parse_search_results(
    body: &str,
    base_url: &str,
) -> Result<Vec<MedicineRecord>, serde_json::Error> {
    let root: Value = serde_json::from_str(body)?;
    let mut records = Vec::new();
    if let Some(items) = root.get("content").and_then(Value::as_array) {
        for item in items {
            let registry_number = text_field(item, "numeroRegistro");
            let leaflet_url = MedicineRecord::detail_url(base_url, &registry_number);
            records.push(MedicineRecord {
                process_number: text_field(item, "numeroProcesso"),
                product_name: text_field(item, "nomeProduto"),
                company: text_field(item, "razaoSocial"),
                cnpj: text_field(item, "cnpj"),
                active_ingredient: text_field(item, "principioAtivo"),
                therapeutic_class: text_field(item, "classesTerapeuticas"),
                regulatory_type: text_field(item, "categoriaRegulatoria"),
                presentation: text_field(item, "apresentacao"),
                registry_number,
                leaflet_url,
            });
        }
    }
    Ok(records)
}

/// Parses a leaflet lookup response.
///
/// The portal returns a `content` array where only the first element
/// matters. Either leaflet text may be missing; the record is still valid
/// with empty sides.
pub fn parse_leaflet(
    body: &str,
    registry_number: &str,
) -> Result<LeafletRecord, serde_json::Error> {
    let root: Value = serde_json::from_str(body)?;
    let mut record = LeafletRecord {
        registry_number: registry_number.to_string(),
        patient_leaflet_html: String::new(),
        professional_leaflet_html: String::new(),
    };
    if let Some(first) = root
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    {
        record.patient_leaflet_html = sanitize_html(&text_field(first, "textoRotulagem"));
        record.professional_leaflet_html = sanitize_html(&text_field(first, "textoBula"));
    }
    Ok(record)
}

/// Strips script and style elements from a leaflet fragment, keeping the
/// remaining body markup verbatim.
pub fn sanitize_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").unwrap();
    let stripped_selector = Selector::parse("script, style").unwrap();

    let mut sanitized = match document.select(&body_selector).next() {
        Some(body) => body.inner_html(),
        None => return String::new(),
    };
    // Both strings come from the same serializer, so the element's
    // serialized form matches the substring inside the body exactly.
    for element in document.select(&stripped_selector) {
        sanitized = sanitized.replace(&element.html(), "");
    }
    sanitized
}

// Text extraction matching how the records are published: strings pass
// through, numbers and booleans are rendered, everything else is empty.
fn text_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}
