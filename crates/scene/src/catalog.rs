use std::collections::{BTreeMap, BTreeSet};

use foundation::color::Rgb;
use foundation::math::{GroundPoint, LatLng, LocalProjection};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::archetype::{Shape, classify, jitter};
use crate::selection::SelectionSet;
use crate::tree::{Tree, TreeId, TreeRecord, UNKNOWN, resolve_dbh, resolve_height, text_or};

/// Scene units per unit of the canopy and height formulas.
const SIZE_SCALE: f64 = 14.0;

/// All trees sharing one shape, in insertion order.
///
/// Slot `i` of both of this bucket's batches is `members()[i]`. Members are
/// never reordered or removed; a different membership means a new bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchetypeBucket {
    shape: Shape,
    members: Vec<TreeId>,
}

impl ArchetypeBucket {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn members(&self) -> &[TreeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn tree_at(&self, slot: u32) -> Option<TreeId> {
        self.members.get(slot as usize).copied()
    }
}

/// A name and how many trees carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodGroup {
    pub name: String,
    pub count: usize,
    pub centroid: GroundPoint,
    /// Distinct common names.
    pub species: usize,
    /// Mean diameter over every member, defaulted values included.
    pub avg_dbh: f64,
}

impl NeighborhoodGroup {
    /// Hover text for the neighborhood's signpost.
    pub fn tooltip(&self) -> String {
        format!(
            "{}\n{} trees · {} species · avg {:.1}\" DBH",
            self.name, self.count, self.species, self.avg_dbh
        )
    }
}

/// Every loaded tree plus the derived buckets and aggregates. Immutable after load.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    trees: Vec<Tree>,
    buckets: Vec<ArchetypeBucket>,
    neighborhoods: Vec<NeighborhoodGroup>,
    genera: Vec<Tally>,
    conditions: Vec<Tally>,
    common_names: Vec<Tally>,
}

impl EntityCatalog {
    /// Builds the catalog from raw records. Never fails: bad fields are defaulted.
    ///
    /// `rng` drives the cosmetic per-tree variation only (color jitter and
    /// height spread); seasonal color choice is hash-based.
    pub fn load<R: Rng + ?Sized>(
        records: impl IntoIterator<Item = TreeRecord>,
        projection: &LocalProjection,
        rng: &mut R,
    ) -> Self {
        let mut trees = Vec::new();
        let mut buckets: Vec<ArchetypeBucket> = Vec::new();
        let mut defaulted = 0usize;

        for (index, record) in records.into_iter().enumerate() {
            let id = TreeId(index as u32);
            let genus = record.genus.clone().unwrap_or_default();
            let archetype = classify(&genus);

            let dbh = resolve_dbh(record.diameter_in);
            let height_ft = resolve_height(record.height_ft.as_deref());
            if record.diameter_in != Some(dbh) || record.height_ft.is_none() {
                defaulted += 1;
                debug!(tree = index, dbh, height_ft, "defaulted size attributes");
            }

            let base = Rgb::from_hex(archetype.base_color(record.lat, record.lng));
            let color = jitter(base, rng);
            let spread = 0.8 + rng.gen_range(0.0..0.4);

            let bucket_index = match buckets.iter().position(|b| b.shape == archetype.shape) {
                Some(i) => i,
                None => {
                    buckets.push(ArchetypeBucket {
                        shape: archetype.shape,
                        members: Vec::new(),
                    });
                    buckets.len() - 1
                }
            };
            let bucket = &mut buckets[bucket_index];
            let slot = bucket.members.len() as u32;
            bucket.members.push(id);

            trees.push(Tree {
                id,
                common_name: text_or(&record.common_name, UNKNOWN),
                genus,
                species: text_or(&record.species, ""),
                condition: text_or(&record.condition, UNKNOWN),
                neighborhood: text_or(&record.neighborhood, UNKNOWN),
                location: LatLng::new(record.lat, record.lng),
                position: projection.project(record.lat, record.lng),
                dbh,
                height_ft,
                canopy_scale: (0.4 + dbh / 25.0) * SIZE_SCALE,
                height_scale: (height_ft / 30.0) * spread * SIZE_SCALE,
                shape: archetype.shape,
                color,
                slot,
            });
        }

        let catalog = Self {
            neighborhoods: group_neighborhoods(&trees),
            genera: tally(trees.iter().map(|t| t.genus.as_str())),
            conditions: tally(trees.iter().map(|t| t.condition.as_str())),
            common_names: tally(trees.iter().map(|t| t.common_name.as_str())),
            trees,
            buckets,
        };

        info!(
            trees = catalog.trees.len(),
            buckets = catalog.buckets.len(),
            neighborhoods = catalog.neighborhoods.len(),
            defaulted,
            "catalog loaded"
        );
        catalog
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(id.index() as usize)
    }

    /// Buckets in the order their shape was first seen.
    pub fn buckets(&self) -> &[ArchetypeBucket] {
        &self.buckets
    }

    pub fn bucket(&self, shape: Shape) -> Option<&ArchetypeBucket> {
        self.buckets.iter().find(|b| b.shape == shape)
    }

    /// Tree occupying `slot` of the `shape` bucket.
    pub fn tree_at_slot(&self, shape: Shape, slot: u32) -> Option<&Tree> {
        self.bucket(shape)
            .and_then(|b| b.tree_at(slot))
            .and_then(|id| self.tree(id))
    }

    /// Neighborhoods by count descending, then name ascending.
    pub fn neighborhoods(&self) -> &[NeighborhoodGroup] {
        &self.neighborhoods
    }

    pub fn neighborhood(&self, name: &str) -> Option<&NeighborhoodGroup> {
        self.neighborhoods.iter().find(|n| n.name == name)
    }

    /// Genus counts, ranked like [`neighborhoods`](Self::neighborhoods).
    pub fn genus_counts(&self) -> &[Tally] {
        &self.genera
    }

    pub fn condition_counts(&self) -> &[Tally] {
        &self.conditions
    }

    pub fn common_name_counts(&self) -> &[Tally] {
        &self.common_names
    }

    /// Mean diameter over trees with a positive diameter.
    pub fn average_dbh(&self) -> Option<f64> {
        let (sum, n) = self
            .trees
            .iter()
            .filter(|t| t.dbh > 0.0)
            .fold((0.0, 0usize), |(s, n), t| (s + t.dbh, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Every tree in `neighborhood`.
    pub fn select_neighborhood(&self, neighborhood: &str) -> SelectionSet {
        let mut set = SelectionSet::with_capacity(self.trees.len());
        for tree in self.trees.iter().filter(|t| t.neighborhood == neighborhood) {
            set.insert(tree.id);
        }
        set
    }
}

/// Ranks names by count descending; ties by name ascending.
fn tally<'a>(names: impl Iterator<Item = &'a str>) -> Vec<Tally> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }
    let mut out: Vec<Tally> = counts
        .into_iter()
        .map(|(name, count)| Tally {
            name: name.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

#[derive(Default)]
struct GroupAcc<'a> {
    count: usize,
    sum_x: f64,
    sum_z: f64,
    sum_dbh: f64,
    species: BTreeSet<&'a str>,
}

fn group_neighborhoods(trees: &[Tree]) -> Vec<NeighborhoodGroup> {
    let mut groups: BTreeMap<&str, GroupAcc<'_>> = BTreeMap::new();
    for tree in trees {
        let acc = groups.entry(tree.neighborhood.as_str()).or_default();
        acc.count += 1;
        acc.sum_x += tree.position.x;
        acc.sum_z += tree.position.z;
        acc.sum_dbh += tree.dbh;
        acc.species.insert(tree.common_name.as_str());
    }

    let mut out: Vec<NeighborhoodGroup> = groups
        .into_iter()
        .map(|(name, acc)| {
            let n = acc.count as f64;
            NeighborhoodGroup {
                name: name.to_string(),
                count: acc.count,
                centroid: GroundPoint::new(acc.sum_x / n, acc.sum_z / n),
                species: acc.species.len(),
                avg_dbh: acc.sum_dbh / n,
            }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}
