//! Bulario - resilient client and cache for the ANVISA medicine portal.
//!
//! Searches medicine registrations and fetches patient and professional
//! leaflets from the public consulta portal. Requests are paced, rate
//! limited and guarded by a circuit breaker; responses are cached
//! in-process with per-kind TTLs.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod services;

pub use cache::{spawn_sweep_task, TtlCache};
pub use config::Settings;
pub use error::{ScrapingError, ScrapingErrorKind, ServiceError};
pub use models::{LeafletRecord, MedicineRecord};
pub use scrapers::{AnvisaClient, ScrapingClient};
pub use services::{LeafletService, MedicineService};
