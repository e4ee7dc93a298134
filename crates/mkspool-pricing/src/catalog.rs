//! Public cloud catalog document and hourly price extraction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Catalog prices are integers in 1e-8 of the currency unit.
pub const PRICE_DIVISOR: f64 = 100_000_000.0;

const PLAN_CODE_MARKER: &str = "instance";
const PLAN_CODE_PREFIX: &str = "instance-";
const CAPACITY_CONSUMPTION: &str = "consumption";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingCatalog {
    pub catalog_id: i64,
    pub locale: PricingLocale,
    pub plans: Vec<CatalogEntry>,
    pub addons: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingLocale {
    pub currency_code: String,
    pub subsidiary: String,
}

/// A plan or addon. Instance flavors are listed as addons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEntry {
    pub plan_code: String,
    pub invoice_name: String,
    pub pricings: Vec<PricingDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingDetail {
    pub capacities: Vec<String>,
    pub description: String,
    pub duration: String,
    pub interval: i64,
    pub minimum_repeat: i64,
    pub maximum_repeat: Option<i64>,
    pub price: i64,
    pub price_in_ucents: i64,
    pub tax: i64,
}

impl PricingDetail {
    /// Hourly, pay-as-you-go and non-zero.
    pub fn is_hourly_consumption(&self) -> bool {
        let hourly =
            self.duration.contains("P1H") || self.description.contains("hour") || self.interval == 1;
        let consumption = self.capacities.iter().any(|c| c == CAPACITY_CONSUMPTION);
        hourly && consumption && self.price > 0
    }

    pub fn hourly_price(&self) -> f64 {
        self.price as f64 / PRICE_DIVISOR
    }
}

/// `instance-b3-8.gra7.hour.consumption` → `b3-8`.
pub fn flavor_from_plan_code(plan_code: &str) -> Option<String> {
    let lower = plan_code.to_lowercase();
    let stripped = lower.strip_prefix(PLAN_CODE_PREFIX).unwrap_or(&lower);
    stripped
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Derive the lookup map: each qualifying addon is stored under its flavor
/// key and under its full lower-cased plan code. Later entries overwrite
/// earlier ones under the flavor key.
pub fn extract_prices(catalog: &PricingCatalog) -> HashMap<String, f64> {
    let mut prices = HashMap::new();

    for addon in &catalog.addons {
        let plan_code = addon.plan_code.to_lowercase();
        if !plan_code.contains(PLAN_CODE_MARKER) {
            continue;
        }
        let Some(flavor) = flavor_from_plan_code(&plan_code) else {
            continue;
        };
        for pricing in addon.pricings.iter().filter(|p| p.is_hourly_consumption()) {
            let price = pricing.hourly_price();
            prices.insert(flavor.clone(), price);
            prices.insert(plan_code.clone(), price);
        }
    }

    prices
}
