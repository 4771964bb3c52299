//! Data models for medicine registrations and package leaflets.

mod leaflet;
mod medicine;

pub use leaflet::LeafletRecord;
pub use medicine::MedicineRecord;
