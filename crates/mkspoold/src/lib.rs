//! mkspoold — the elastic pool orchestrator daemon.
//!
//! Assembles the signed API client, pricing cache, instance catalog and
//! pool orchestrator, and serves their state over HTTP.
//!
//! # Architecture
//!
//! ```text
//! Config (mkspool.toml + OVH_* env)
//!   └── App::build
//!         ├── OvhTransport → RetryExecutor → PoolClient
//!         ├── HttpCatalogSource → PricingCache ── spawn_refresher()
//!         ├── StaticNodeClasses
//!         └── CloudProvider ── run_catalog_refresh()
//!
//! build_router → /healthz, /metrics, /api/v1/...
//! ```

pub mod app;
pub mod config;
pub mod http;

pub use app::{App, run_catalog_refresh};
pub use config::Config;
pub use http::{HttpState, build_router};
