//! Interaction lists of a quadtree.
//!
//! Nearness between two boxes is measured in the maximum norm, in units of the side length of the
//! smaller box: boxes are near when fewer than `well_sep_is_n_away` such boxes fit in the gap between
//! them. Sources of every leaf are reached from a target leaf `t` exactly once, through either list 1
//! or list 3 of `t`, or list 2 or list 4 of one of the ancestors of `t` (including `t` itself).
use rayon::prelude::*;

use crate::{
    traits::general::RealScalar,
    tree::types::{InteractionLists, MortonKey, SingleNodeTree, Traversal},
};

impl InteractionLists {
    /// Compress a list of lists, sorting each list.
    pub fn from_lists(lists: Vec<Vec<usize>>) -> Self {
        let mut starts = Vec::with_capacity(lists.len() + 1);
        starts.push(0);
        let mut flat = Vec::with_capacity(lists.iter().map(|l| l.len()).sum());

        for mut list in lists {
            list.sort_unstable();
            flat.extend(list);
            starts.push(flat.len());
        }

        Self {
            starts,
            lists: flat,
        }
    }

    /// The list of entry `i`.
    pub fn get(&self, i: usize) -> &[usize] {
        &self.lists[self.starts[i]..self.starts[i + 1]]
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of interactions over all entries.
    pub fn n_interactions(&self) -> usize {
        self.lists.len()
    }
}

impl Traversal {
    /// Compute colleagues and interaction lists 1 to 4 of a tree. Boxes without sources never appear
    /// in an interaction list.
    ///
    /// # Arguments
    /// * `tree` - A constructed quadtree.
    /// * `well_sep_is_n_away` - Minimum separation of interacting boxes, in boxes of the smaller size.
    pub fn new<T: RealScalar>(tree: &SingleNodeTree<T>, well_sep_is_n_away: u64) -> Self {
        let n_away = well_sep_is_n_away;
        let boxes = tree.boxes();
        let has_sources = |i: usize| !boxes[i].sources.is_empty();

        // Colleagues and list 2, level by level as both derive from the parent's colleagues
        let mut colleagues = vec![Vec::new(); boxes.len()];
        let mut from_sep_siblings = vec![Vec::new(); boxes.len()];

        for level in 1..=tree.depth() {
            let range = tree.boxes_at_level(level);

            let level_lists = range
                .clone()
                .into_par_iter()
                .map(|ibox| {
                    let key = boxes[ibox].key;
                    let mut near = Vec::new();
                    let mut separated = Vec::new();

                    if let Some(parent) = boxes[ibox].parent {
                        let candidates = colleagues[parent]
                            .iter()
                            .chain(std::iter::once(&parent))
                            .flat_map(|&p| boxes[p].children.iter().copied());

                        for candidate in candidates {
                            if candidate == ibox {
                                continue;
                            }
                            if key.is_near(&boxes[candidate].key, n_away) {
                                near.push(candidate);
                            } else if has_sources(candidate) {
                                separated.push(candidate);
                            }
                        }
                    }
                    (near, separated)
                })
                .collect::<Vec<_>>();

            for (ibox, (near, separated)) in range.zip(level_lists) {
                colleagues[ibox] = near;
                from_sep_siblings[ibox] = separated;
            }
        }

        let target_boxes = tree.leaves().to_vec();
        let mut box_to_target_box = vec![None; boxes.len()];
        for (itarget_box, &ibox) in target_boxes.iter().enumerate() {
            box_to_target_box[ibox] = Some(itarget_box);
        }

        // Lists 1 and 3, descending from the root along boxes near the target leaf. Above the level
        // of the leaf, nearness is tested against the leaf's ancestor at the same level.
        let (neighbor_source_boxes, from_sep_smaller): (Vec<_>, Vec<_>) = target_boxes
            .par_iter()
            .map(|&itarget| {
                let target = boxes[itarget].key;
                let target_level = target.level();
                let reference = |level: u64| -> MortonKey {
                    if level < target_level {
                        MortonKey::from_anchor(target.anchor(), level)
                    } else {
                        target
                    }
                };

                let mut list1 = Vec::new();
                let mut list3 = Vec::new();
                let mut stack = vec![0];

                while let Some(ibox) = stack.pop() {
                    let node = &boxes[ibox];

                    if node.children.is_empty() {
                        if has_sources(ibox) && target.is_near(&node.key, n_away) {
                            list1.push(ibox);
                        }
                        continue;
                    }

                    for &child in node.children.iter().filter(|&&c| has_sources(c)) {
                        let child_key = boxes[child].key;
                        let child_level = child_key.level();

                        if child_key.is_near(&reference(child_level), n_away) {
                            stack.push(child);
                        } else if child_level > target_level {
                            list3.push(child);
                        }
                    }
                }

                (list1, list3)
            })
            .unzip();

        // List 4, leaves coarser than a box that are near its parent but not the box itself
        let from_sep_bigger = (0..boxes.len())
            .into_par_iter()
            .map(|ibox| {
                let mut list4 = Vec::new();
                let Some(parent) = boxes[ibox].parent else {
                    return list4;
                };

                let key = boxes[ibox].key;
                let parent_key = boxes[parent].key;
                let level = key.level();
                let mut stack = vec![0];

                while let Some(jbox) = stack.pop() {
                    let node = &boxes[jbox];

                    if node.children.is_empty() {
                        if node.key.level() < level
                            && has_sources(jbox)
                            && !key.is_near(&node.key, n_away)
                        {
                            list4.push(jbox);
                        }
                        continue;
                    }

                    stack.extend(node.children.iter().copied().filter(|&c| {
                        let child_key = &boxes[c].key;
                        child_key.level() < level
                            && has_sources(c)
                            && parent_key.is_near(child_key, n_away)
                    }));
                }

                list4
            })
            .collect::<Vec<_>>();

        let traversal = Self {
            well_sep_is_n_away,
            colleagues: InteractionLists::from_lists(colleagues),
            target_boxes,
            box_to_target_box,
            neighbor_source_boxes: InteractionLists::from_lists(neighbor_source_boxes),
            from_sep_siblings: InteractionLists::from_lists(from_sep_siblings),
            from_sep_smaller: InteractionLists::from_lists(from_sep_smaller),
            from_sep_bigger: InteractionLists::from_lists(from_sep_bigger),
        };

        log::debug!(
            "traversal: {} target boxes, list sizes 1: {}, 2: {}, 3: {}, 4: {}",
            traversal.target_boxes.len(),
            traversal.neighbor_source_boxes.n_interactions(),
            traversal.from_sep_siblings.n_interactions(),
            traversal.from_sep_smaller.n_interactions(),
            traversal.from_sep_bigger.n_interactions()
        );

        traversal
    }

    /// Separation parameter the lists were built with.
    pub fn well_sep_is_n_away(&self) -> u64 {
        self.well_sep_is_n_away
    }

    /// Same level boxes near each box, indexed by box.
    pub fn colleagues(&self) -> &InteractionLists {
        &self.colleagues
    }

    /// Leaf boxes holding targets or centers, in Morton order.
    pub fn target_boxes(&self) -> &[usize] {
        &self.target_boxes
    }

    /// Position of a box in [`Self::target_boxes`], if it is a leaf.
    pub fn target_box_index(&self, ibox: usize) -> Option<usize> {
        self.box_to_target_box[ibox]
    }

    /// List 1, indexed by target box.
    pub fn neighbor_source_boxes(&self) -> &InteractionLists {
        &self.neighbor_source_boxes
    }

    /// List 2, indexed by box.
    pub fn from_sep_siblings(&self) -> &InteractionLists {
        &self.from_sep_siblings
    }

    /// List 3, indexed by target box.
    pub fn from_sep_smaller(&self) -> &InteractionLists {
        &self.from_sep_smaller
    }

    /// List 4, indexed by box.
    pub fn from_sep_bigger(&self) -> &InteractionLists {
        &self.from_sep_bigger
    }

    /// Whether the multipole expansion of a box may be translated to a local expansion about a disc.
    ///
    /// The square bounding the disc must be separated from the box by at least
    /// `well_sep_is_n_away` box side lengths in the maximum norm.
    ///
    /// # Arguments
    /// * `tree` - Tree the traversal was built from.
    /// * `ibox` - Index of the source box.
    /// * `centre` - Centre of the disc.
    /// * `radius` - Radius of the disc.
    pub fn is_disc_separated<T: RealScalar>(
        &self,
        tree: &SingleNodeTree<T>,
        ibox: usize,
        centre: &[T; 2],
        radius: T,
    ) -> bool {
        let node = tree.node(ibox);
        let half = T::real(0.5) * node.side;

        let gap = (0..2)
            .map(|i| ((centre[i] - node.centre[i]).abs() - radius - half).max(T::zero()))
            .fold(T::zero(), |acc, g| acc.max(g));

        gap >= T::real(self.well_sep_is_n_away as f64) * node.side
    }

    /// Ancestors of a box, from its parent up to the root.
    pub fn ancestors<T: RealScalar>(tree: &SingleNodeTree<T>, ibox: usize) -> Vec<usize> {
        let mut result = Vec::new();
        let mut current = tree.node(ibox).parent;
        while let Some(parent) = current {
            result.push(parent);
            current = tree.node(parent).parent;
        }
        result
    }
}
