//! Package leaflet content for a registered medicine.

use serde::{Deserialize, Serialize};

/// Patient and professional leaflet texts for one registration.
///
/// The portal serves both texts as HTML fragments. They are sanitized
/// before storage but otherwise kept verbatim; either side may be empty
/// when the agency has not published it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafletRecord {
    /// Registration number this leaflet belongs to.
    pub registry_number: String,
    /// Leaflet aimed at patients (`textoRotulagem`).
    pub patient_leaflet_html: String,
    /// Leaflet aimed at health professionals (`textoBula`).
    pub professional_leaflet_html: String,
}

impl LeafletRecord {
    /// True when neither leaflet text was published.
    pub fn is_empty(&self) -> bool {
        self.patient_leaflet_html.is_empty() && self.professional_leaflet_html.is_empty()
    }
}
