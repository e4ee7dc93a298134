//! mkspool-pricing — hourly flavor prices from the public cloud catalog.
//!
//! # Architecture
//!
//! ```text
//! CatalogSource (HTTP GET ?ovhSubsidiary=FR)
//!        │ refresh on miss / TTL expiry (write lock, re-checked)
//!        ▼
//! PricingCache ── snapshot { version, fetched_at, catalog, key → price }
//!        │
//!        ├── lookup: flavor → region.flavor → instance-flavor.region.hour.consumption
//!        │           → instance-flavor.hour.consumption
//!        └── fallback: static table → CPU/RAM/GPU estimate → 0.10
//! ```
//!
//! Price lookups are infallible. Catalog failures are logged and degrade
//! to an estimate so pricing never blocks provisioning.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod estimate;
pub mod source;

pub use cache::{PricingCache, PricingConfig, lookup};
pub use catalog::{CatalogEntry, PricingCatalog, PricingDetail, PricingLocale, extract_prices};
pub use error::{PricingError, PricingResult};
pub use estimate::{DEFAULT_HOURLY_PRICE, FlavorShape, estimate_price, known_price};
pub use source::{CatalogSource, DEFAULT_CATALOG_URL, HttpCatalogSource, StaticCatalogSource};
