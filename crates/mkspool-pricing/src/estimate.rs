//! Static price estimation used when the catalog cannot answer.

/// Hourly price when nothing is known about the flavor.
pub const DEFAULT_HOURLY_PRICE: f64 = 0.10;

const PER_VCPU: f64 = 0.02;
const PER_GIB: f64 = 0.005;
const PER_GPU: f64 = 0.50;

/// Approximate hourly prices for the common flavor families.
const KNOWN_FLAVORS: &[(&str, f64)] = &[
    // general purpose
    ("b2-7", 0.0283),
    ("b2-15", 0.0567),
    ("b2-30", 0.1134),
    ("b2-60", 0.2268),
    ("b2-120", 0.4536),
    ("b3-8", 0.0340),
    ("b3-16", 0.0680),
    ("b3-32", 0.1360),
    ("b3-64", 0.2720),
    ("b3-128", 0.5440),
    // compute optimized
    ("c2-7", 0.0340),
    ("c2-15", 0.0680),
    ("c2-30", 0.1360),
    ("c2-60", 0.2720),
    ("c2-120", 0.5440),
    ("c3-8", 0.0408),
    ("c3-16", 0.0816),
    ("c3-32", 0.1632),
    ("c3-64", 0.3264),
    ("c3-128", 0.6528),
    // memory optimized
    ("r2-15", 0.0567),
    ("r2-30", 0.0850),
    ("r2-60", 0.1700),
    ("r2-120", 0.3400),
    ("r2-240", 0.6800),
    ("r3-16", 0.0680),
    ("r3-32", 0.1020),
    ("r3-64", 0.2040),
    ("r3-128", 0.4080),
    ("r3-256", 0.8160),
    // gpu
    ("t1-45", 0.90),
    ("t1-90", 1.80),
    ("t1-180", 3.60),
    ("t2-45", 1.10),
    ("t2-90", 2.20),
    ("t2-180", 4.40),
];

/// Declared hardware of a flavor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlavorShape {
    pub vcpus: u32,
    pub memory_gib: f64,
    pub gpus: u32,
}

impl FlavorShape {
    /// Linear estimate from CPU, RAM and GPU counts.
    pub fn estimate(&self) -> f64 {
        self.vcpus as f64 * PER_VCPU + self.memory_gib * PER_GIB + self.gpus as f64 * PER_GPU
    }
}

pub fn known_price(flavor: &str) -> Option<f64> {
    KNOWN_FLAVORS
        .iter()
        .find(|(name, _)| *name == flavor)
        .map(|(_, price)| *price)
}

/// Table price, else the shape estimate, else [`DEFAULT_HOURLY_PRICE`].
pub fn estimate_price(flavor: &str, shape: Option<&FlavorShape>) -> f64 {
    if let Some(price) = known_price(flavor) {
        return price;
    }
    match shape {
        Some(shape) if shape.vcpus > 0 => shape.estimate(),
        _ => DEFAULT_HOURLY_PRICE,
    }
}
