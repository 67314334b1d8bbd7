use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Region the synthetic crowd is scattered over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }
}

pub const SYNTHETIC_BOUNDS: BoundingBox = BoundingBox {
    south: 23.150,
    west: 75.740,
    north: 23.210,
    east: 75.800,
};

const MIN_WEIGHT: f64 = 0.5;
const MAX_WEIGHT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

/// Where the synthetic point coordinates come from.
///
/// `Fresh` draws new coordinates for every document. `Seeded` replays the same
/// set on every build, which keeps the heatmap still across toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointSource {
    #[default]
    Fresh,
    Seeded(u64),
}

impl PointSource {
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or(Self::Fresh, Self::Seeded)
    }

    pub fn generate(self, count: usize, bounds: &BoundingBox) -> Vec<GeoPoint> {
        match self {
            Self::Fresh => scatter(&mut rand::rng(), count, bounds),
            Self::Seeded(seed) => scatter(&mut StdRng::seed_from_u64(seed), count, bounds),
        }
    }
}

fn scatter<R: Rng + ?Sized>(rng: &mut R, count: usize, bounds: &BoundingBox) -> Vec<GeoPoint> {
    (0..count)
        .map(|_| GeoPoint {
            lat: round6(rng.random_range(bounds.south..=bounds.north)),
            lng: round6(rng.random_range(bounds.west..=bounds.east)),
            weight: round6(rng.random_range(MIN_WEIGHT..=MAX_WEIGHT)),
        })
        .collect()
}

// Six decimals is ~0.1m, plenty for a crowd mock and keeps the document small.
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
