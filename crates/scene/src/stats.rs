//! Read-only summaries for the stats surface and the neighborhood selector.

use serde::Serialize;

use crate::catalog::{EntityCatalog, Tally};
use crate::tree::UNKNOWN;

pub const TOP_SPECIES: usize = 8;
pub const TOP_NEIGHBORHOODS: usize = 6;

/// One ranked row; `fraction` is `count / leader_count`, the bar width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub name: String,
    pub count: usize,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_trees: usize,
    pub unique_species: usize,
    pub average_dbh: Option<f64>,
    pub top_species: Vec<RankedRow>,
    pub conditions: Vec<RankedRow>,
    pub top_neighborhoods: Vec<RankedRow>,
}

impl StatsSnapshot {
    pub fn from_catalog(catalog: &EntityCatalog) -> Self {
        let neighborhoods: Vec<Tally> = catalog
            .neighborhoods()
            .iter()
            .map(|n| Tally {
                name: n.name.clone(),
                count: n.count,
            })
            .collect();

        Self {
            total_trees: catalog.len(),
            unique_species: catalog.common_name_counts().len(),
            average_dbh: catalog.average_dbh(),
            top_species: ranked(catalog.common_name_counts(), TOP_SPECIES),
            conditions: ranked(catalog.condition_counts(), usize::MAX),
            top_neighborhoods: ranked(&neighborhoods, TOP_NEIGHBORHOODS),
        }
    }
}

fn ranked(tallies: &[Tally], limit: usize) -> Vec<RankedRow> {
    let leader = tallies.first().map_or(1, |t| t.count.max(1)) as f64;
    tallies
        .iter()
        .take(limit)
        .map(|t| RankedRow {
            name: t.name.clone(),
            count: t.count,
            fraction: t.count as f64 / leader,
        })
        .collect()
}

/// An entry in the neighborhood selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborhoodOption {
    pub value: String,
    pub label: String,
}

/// Every named neighborhood, largest first, labelled `"{name} ({count} trees)"`.
pub fn neighborhood_options(catalog: &EntityCatalog) -> Vec<NeighborhoodOption> {
    catalog
        .neighborhoods()
        .iter()
        .filter(|n| !n.name.is_empty() && n.name != UNKNOWN)
        .map(|n| NeighborhoodOption {
            value: n.name.clone(),
            label: format!("{} ({} trees)", n.name, n.count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{StatsSnapshot, neighborhood_options};
    use crate::catalog::tests::sample;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_summarizes_the_catalog() {
        let stats = StatsSnapshot::from_catalog(&sample());
        assert_eq!(stats.total_trees, 6);
        assert_eq!(stats.unique_species, 5);
        assert_eq!(stats.top_species[0].name, "Quercus tree");
        assert_eq!(stats.top_species[0].fraction, 1.0);
        assert_eq!(stats.top_species[1].fraction, 0.5);
        assert_eq!(stats.conditions.len(), 2);
        assert_eq!(stats.top_neighborhoods[0].name, "Trinity Park");
        assert_eq!(stats.top_neighborhoods.len(), 3);
    }

    #[test]
    fn options_skip_unknown_and_label_counts() {
        let labels: Vec<String> = neighborhood_options(&sample())
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "Trinity Park (3 trees)".to_string(),
                "Old West Durham (2 trees)".to_string(),
            ]
        );
    }
}
