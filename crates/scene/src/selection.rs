use crate::tree::TreeId;

/// Bitset of tree ids. Ids ascend on iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    words: Vec<u64>,
    len: usize,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room for ids `0..trees` without regrowing.
    pub fn with_capacity(trees: usize) -> Self {
        Self {
            words: vec![0; trees.div_ceil(64)],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, tree: TreeId) -> bool {
        let (word, mask) = slot(tree);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Returns `false` when `tree` was already selected.
    pub fn insert(&mut self, tree: TreeId) -> bool {
        let (word, mask) = slot(tree);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        if self.words[word] & mask != 0 {
            return false;
        }
        self.words[word] |= mask;
        self.len += 1;
        true
    }

    pub fn iter_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let base = i as u32 * 64;
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros();
                rest &= rest - 1;
                Some(base + bit)
            })
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = TreeId> + '_ {
        self.iter_indices().map(TreeId)
    }
}

fn slot(tree: TreeId) -> (usize, u64) {
    let index = tree.index();
    ((index / 64) as usize, 1u64 << (index % 64))
}
