//! Neighborhood filter: recolor every canopy from its catalog color and set
//! per-bucket trunk opacity.
//!
//! Displayed colors are always recomputed from the catalog's stored base
//! color, never read back from a batch, so clearing restores them exactly no
//! matter how many times a filter was applied.

use foundation::math::Vec3;
use runtime::animation::CameraPose;
use scene::catalog::EntityCatalog;
use scene::tree::Tree;
use tracing::{debug, info};

use crate::instancing::{BatchError, ForestLayer};
use crate::symbology::FilterStyle;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub matches: usize,
    /// Where the camera should go; `None` when nothing matched.
    pub flight: Option<CameraPose>,
}

#[derive(Debug, Clone)]
pub struct HighlightEngine {
    style: FilterStyle,
    focus_offset: Vec3,
    overview: CameraPose,
    active: Option<String>,
}

impl HighlightEngine {
    pub fn new(style: FilterStyle, focus_offset: Vec3, overview: CameraPose) -> Self {
        Self {
            style,
            focus_offset,
            overview,
            active: None,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// `None` or an empty name clears the filter.
    ///
    /// Mutates batches in place; the caller commits them.
    pub fn apply_filter(
        &mut self,
        neighborhood: Option<&str>,
        catalog: &EntityCatalog,
        forest: &mut ForestLayer,
    ) -> Result<FilterOutcome, BatchError> {
        match neighborhood.filter(|n| !n.is_empty()) {
            Some(name) => self.set(name, catalog, forest),
            None => self.clear(catalog, forest),
        }
    }

    fn set(
        &mut self,
        name: &str,
        catalog: &EntityCatalog,
        forest: &mut ForestLayer,
    ) -> Result<FilterOutcome, BatchError> {
        let selected = catalog.select_neighborhood(name);
        let mut matches = 0usize;
        let (mut sum_x, mut sum_z) = (0.0, 0.0);

        for group in forest.groups_mut() {
            let mut bucket_has_match = false;
            for slot in 0..group.members().len() {
                let tree = member(catalog, group.members(), slot)?;
                let is_match = selected.contains(tree.id);
                let color = if is_match {
                    matches += 1;
                    sum_x += tree.position.x;
                    sum_z += tree.position.z;
                    bucket_has_match = true;
                    tree.color
                } else {
                    tree.color.scaled(self.style.dim_factor)
                };
                group.canopy.set_instance_color(slot as u32, color)?;
            }
            group.trunk.set_opacity(if bucket_has_match {
                self.style.trunk_match_opacity
            } else {
                self.style.trunk_dimmed_opacity
            });
        }

        self.active = Some(name.to_string());
        if matches == 0 {
            info!(neighborhood = name, "filter matched nothing");
            return Ok(FilterOutcome {
                matches,
                flight: None,
            });
        }

        let n = matches as f64;
        let centroid = Vec3::new(sum_x / n, 0.0, sum_z / n);
        debug!(neighborhood = name, matches, "filter applied");
        Ok(FilterOutcome {
            matches,
            flight: Some(CameraPose::new(centroid + self.focus_offset, centroid)),
        })
    }

    fn clear(
        &mut self,
        catalog: &EntityCatalog,
        forest: &mut ForestLayer,
    ) -> Result<FilterOutcome, BatchError> {
        for group in forest.groups_mut() {
            for slot in 0..group.members().len() {
                let tree = member(catalog, group.members(), slot)?;
                group.canopy.set_instance_color(slot as u32, tree.color)?;
            }
            group.trunk.set_opacity(1.0);
        }
        if let Some(previous) = self.active.take() {
            debug!(neighborhood = %previous, "filter cleared");
        }
        Ok(FilterOutcome {
            matches: catalog.len(),
            flight: Some(self.overview),
        })
    }
}

fn member<'a>(
    catalog: &'a EntityCatalog,
    members: &[scene::tree::TreeId],
    slot: usize,
) -> Result<&'a Tree, BatchError> {
    let id = members[slot];
    catalog.tree(id).ok_or(BatchError::UnknownTree(id))
}
