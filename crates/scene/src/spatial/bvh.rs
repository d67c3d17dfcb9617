use foundation::bounds::Aabb3;
use foundation::math::precision::stable_total_cmp_f64;

/// Bounding volume hierarchy over `Aabb3` items for ray picking.
///
/// Keys are whatever the caller uses to find the item again (an instance
/// slot, a tree id). Distance ties resolve to the lower key, so results do
/// not depend on build order.
#[derive(Debug, Clone)]
pub struct Bvh<K> {
    nodes: Vec<Node<K>>,
}

#[derive(Debug, Clone)]
enum Node<K> {
    Leaf {
        bounds: Aabb3,
        items: Vec<Item<K>>,
    },
    Internal {
        bounds: Aabb3,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Item<K> {
    pub key: K,
    pub bounds: Aabb3,
}

impl<K> Default for Bvh<K> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<K: Copy + Ord> Bvh<K> {
    pub fn build(items: Vec<Item<K>>) -> Self {
        let mut nodes = Vec::new();
        let mut items = items;
        if !items.is_empty() {
            build_node(&mut nodes, &mut items);
        }
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Closest item along the ray and its entry distance (in units of `dir`).
    pub fn nearest_ray(
        &self,
        origin: [f64; 3],
        dir: [f64; 3],
        t_min: f64,
        t_max: f64,
    ) -> Option<(K, f64)> {
        self.nearest_ray_with(origin, dir, t_min, t_max, |_, entry| Some(entry))
    }

    /// Like [`nearest_ray`](Self::nearest_ray), but each item whose box the
    /// ray enters is handed to `exact` with its box entry distance; `exact`
    /// returns the real hit distance (never less than the entry) or `None`
    /// for a miss.
    ///
    /// Boxes entered beyond the best hit so far are skipped.
    pub fn nearest_ray_with(
        &self,
        origin: [f64; 3],
        dir: [f64; 3],
        t_min: f64,
        t_max: f64,
        mut exact: impl FnMut(K, f64) -> Option<f64>,
    ) -> Option<(K, f64)> {
        let mut best: Option<(K, f64)> = None;
        let mut stack: Vec<usize> = if self.nodes.is_empty() { Vec::new() } else { vec![0] };

        while let Some(idx) = stack.pop() {
            let limit = best.map_or(t_max, |(_, t)| t);
            match &self.nodes[idx] {
                Node::Leaf { bounds, items } => {
                    if bounds.ray_entry(origin, dir, t_min, limit).is_none() {
                        continue;
                    }
                    for item in items {
                        let limit = best.map_or(t_max, |(_, t)| t);
                        let Some(entry) = item.bounds.ray_entry(origin, dir, t_min, limit) else {
                            continue;
                        };
                        let Some(t) = exact(item.key, entry).filter(|t| *t <= t_max) else {
                            continue;
                        };
                        let better = match best {
                            None => true,
                            Some((bk, bt)) => stable_total_cmp_f64(t, bt)
                                .then_with(|| item.key.cmp(&bk))
                                .is_lt(),
                        };
                        if better {
                            best = Some((item.key, t));
                        }
                    }
                }
                Node::Internal {
                    bounds,
                    left,
                    right,
                } => {
                    if bounds.ray_entry(origin, dir, t_min, limit).is_none() {
                        continue;
                    }
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }

        best
    }
}

const LEAF_MAX: usize = 8;

fn build_node<K: Copy + Ord>(nodes: &mut Vec<Node<K>>, items: &mut [Item<K>]) -> usize {
    if items.len() <= LEAF_MAX {
        let bounds = bounds_for_items(items);
        let leaf_items = items.to_vec();
        let idx = nodes.len();
        nodes.push(Node::Leaf {
            bounds,
            items: leaf_items,
        });
        return idx;
    }

    let bounds = bounds_for_items(items);
    let axis = split_axis(&bounds);

    items.sort_by(|a, b| {
        let ca = centroid_axis(&a.bounds, axis);
        let cb = centroid_axis(&b.bounds, axis);
        stable_total_cmp_f64(ca, cb).then_with(|| a.key.cmp(&b.key))
    });

    let mid = items.len() / 2;
    let (left_items, right_items) = items.split_at_mut(mid);

    let idx = nodes.len();
    // Placeholder; will patch after children are built.
    nodes.push(Node::Leaf {
        bounds,
        items: Vec::new(),
    });

    let left = build_node(nodes, left_items);
    let right = build_node(nodes, right_items);

    nodes[idx] = Node::Internal {
        bounds,
        left,
        right,
    };
    idx
}

fn centroid_axis(aabb: &Aabb3, axis: usize) -> f64 {
    (aabb.min[axis] + aabb.max[axis]) * 0.5
}

fn split_axis(bounds: &Aabb3) -> usize {
    let ex = bounds.max[0] - bounds.min[0];
    let ey = bounds.max[1] - bounds.min[1];
    let ez = bounds.max[2] - bounds.min[2];

    // Deterministic tie-break: prefer X, then Y, then Z.
    if ex >= ey && ex >= ez {
        0
    } else if ey >= ez {
        1
    } else {
        2
    }
}

fn bounds_for_items<K>(items: &[Item<K>]) -> Aabb3 {
    let mut b = items[0].bounds;
    for item in &items[1..] {
        b = b.union(&item.bounds);
    }
    b
}

#[cfg(test)]
mod tests {
    use super::{Bvh, Item};
    use foundation::bounds::Aabb3;

    fn item(key: u32, min: [f64; 3], max: [f64; 3]) -> Item<u32> {
        Item {
            key,
            bounds: Aabb3::new(min, max),
        }
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let a: Vec<Item<u32>> = (0..20)
            .map(|i| {
                let z = -(i as f64) * 2.0;
                item(i, [-1.0, 0.0, z - 1.0], [1.0, 1.0, z])
            })
            .collect();
        let mut b = a.clone();
        b.reverse();

        let origin = [0.0, 0.5, 10.0];
        let dir = [0.0, 0.0, -1.0];
        let ha = Bvh::build(a).nearest_ray(origin, dir, 0.0, f64::INFINITY);
        let hb = Bvh::build(b).nearest_ray(origin, dir, 0.0, f64::INFINITY);
        assert_eq!(ha, hb);
        assert_eq!(ha, Some((0, 10.0)));
    }

    #[test]
    fn max_distance_cuts_off_far_items() {
        let bvh = Bvh::build(vec![item(1, [5.0, -1.0, -1.0], [6.0, 1.0, 1.0])]);
        assert!(bvh.nearest_ray([0.0; 3], [1.0, 0.0, 0.0], 0.0, 4.0).is_none());
        assert_eq!(bvh.nearest_ray([0.0; 3], [1.0, 0.0, 0.0], 0.0, 5.5), Some((1, 5.0)));
    }

    #[test]
    fn nearest_ray_finds_closest_across_many_leaves() {
        // A row of unit boxes along +x; more than one leaf's worth.
        let items: Vec<Item<u32>> = (0..40)
            .map(|i| {
                let x = i as f64 * 3.0;
                item(i, [x, 0.0, 0.0], [x + 1.0, 1.0, 1.0])
            })
            .collect();
        let bvh = Bvh::build(items);

        let hit = bvh.nearest_ray([-5.0, 0.5, 0.5], [1.0, 0.0, 0.0], 0.0, f64::INFINITY);
        assert_eq!(hit, Some((0, 5.0)));

        let back = bvh.nearest_ray([200.0, 0.5, 0.5], [-1.0, 0.0, 0.0], 0.0, f64::INFINITY);
        assert_eq!(back.map(|(k, _)| k), Some(39));
    }

    #[test]
    fn nearest_ray_breaks_ties_by_key() {
        let bvh = Bvh::build(vec![
            item(9, [2.0, -1.0, -1.0], [3.0, 1.0, 1.0]),
            item(4, [2.0, -2.0, -2.0], [3.5, 2.0, 2.0]),
        ]);
        let hit = bvh.nearest_ray([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.0, f64::INFINITY);
        assert_eq!(hit, Some((4, 2.0)));
    }

    #[test]
    fn empty_bvh_hits_nothing() {
        let bvh: Bvh<u32> = Bvh::build(Vec::new());
        assert!(bvh.is_empty());
        assert!(bvh.nearest_ray([0.0; 3], [0.0, 0.0, -1.0], 0.0, 1e9).is_none());
    }

    #[test]
    fn exact_test_can_reject_a_nearer_box() {
        let bvh = Bvh::build(vec![
            item(1, [2.0, -1.0, -1.0], [3.0, 1.0, 1.0]),
            item(2, [6.0, -1.0, -1.0], [7.0, 1.0, 1.0]),
        ]);
        let origin = [0.0, 0.0, 0.0];
        let dir = [1.0, 0.0, 0.0];
        let hit = bvh.nearest_ray_with(origin, dir, 0.0, f64::INFINITY, |key, entry| {
            (key != 1).then_some(entry + 0.25)
        });
        assert_eq!(hit, Some((2, 6.25)));
        assert!(bvh.nearest_ray_with(origin, dir, 0.0, f64::INFINITY, |_, _| None).is_none());
    }
}
