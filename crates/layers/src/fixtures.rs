//! Small catalog shared by this crate's tests.

use foundation::math::{DEFAULT_ORIGIN, LocalProjection};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use scene::catalog::EntityCatalog;
use scene::tree::TreeRecord;

pub(crate) fn record(genus: &str, neighborhood: &str, dlat: f64, dlng: f64) -> TreeRecord {
    TreeRecord {
        lat: DEFAULT_ORIGIN.lat + dlat,
        lng: DEFAULT_ORIGIN.lng + dlng,
        genus: Some(genus.to_string()),
        common_name: Some(format!("{genus} tree")),
        species: Some("sp.".to_string()),
        diameter_in: Some(12.0),
        height_ft: Some("30-45".to_string()),
        condition: Some("Good".to_string()),
        neighborhood: Some(neighborhood.to_string()),
    }
}

/// Buckets in order: broad [0, 3], round [1, 4, 6], conifer [2], vase [5].
pub(crate) fn records() -> Vec<TreeRecord> {
    vec![
        record("Quercus", "Trinity Park", 0.001, 0.0),
        record("Acer", "Trinity Park", 0.002, 0.001),
        record("Pinus", "Old West Durham", -0.003, -0.002),
        record("Quercus", "Old West Durham", -0.001, -0.004),
        record("Acer", "Trinity Park", 0.0015, 0.002),
        record("Ulmus", "Other", 0.004, -0.003),
        TreeRecord {
            lat: DEFAULT_ORIGIN.lat - 0.004,
            lng: DEFAULT_ORIGIN.lng + 0.004,
            ..TreeRecord::default()
        },
    ]
}

pub(crate) fn rng() -> SmallRng {
    SmallRng::seed_from_u64(7)
}

pub(crate) fn catalog() -> EntityCatalog {
    EntityCatalog::load(records(), &LocalProjection::default(), &mut rng())
}
