//! Medicine registration records as published by the ANVISA portal.
//!
//! Fields mirror the portal's search API payload. The upstream schema is
//! undocumented and shifts occasionally, so every field is kept as plain
//! text and absent values become empty strings rather than options.

use serde::{Deserialize, Serialize};

/// A registered medicine returned by the portal search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineRecord {
    /// Registration number issued by the agency (`numeroRegistro`).
    pub registry_number: String,
    /// Regulatory process number (`numeroProcesso`).
    pub process_number: String,
    /// Commercial product name (`nomeProduto`).
    pub product_name: String,
    /// Name of the registration holder (`razaoSocial`).
    pub company: String,
    /// Tax id of the registration holder (`cnpj`).
    pub cnpj: String,
    /// Active ingredient (`principioAtivo`).
    pub active_ingredient: String,
    /// Therapeutic class (`classesTerapeuticas`).
    pub therapeutic_class: String,
    /// Regulatory type, e.g. generic or similar (`categoriaRegulatoria`).
    pub regulatory_type: String,
    /// Commercial presentation (`apresentacao`), empty when not published.
    pub presentation: String,
    /// Portal page describing this registration.
    pub leaflet_url: String,
}

impl MedicineRecord {
    /// Builds the portal detail URL for a registration.
    ///
    /// The portal is a single-page application, so the "URL" is the base
    /// address plus a fragment route.
    pub fn detail_url(base_url: &str, registry_number: &str) -> String {
        format!(
            "{}#/medicamento/{}",
            base_url.trim_end_matches('/'),
            registry_number
        )
    }
}
