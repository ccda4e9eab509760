use std::collections::HashMap;

/// # Per-example out-of-vocabulary words
/// Maps a global example index to the ordered OOV words of that example's source text.
/// The position of a word in the list is its extended vocabulary slot.
#[derive(Debug, Clone, Default)]
pub struct OovDictionary {
    entries: HashMap<usize, Vec<String>>,
}

impl OovDictionary {
    pub fn new() -> OovDictionary {
        OovDictionary::default()
    }

    pub fn insert(&mut self, global_index: usize, oov_words: Vec<String>) {
        self.entries.insert(global_index, oov_words);
    }

    pub fn lookup(&self, global_index: usize) -> Option<&[String]> {
        self.entries.get(&global_index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::iter::FromIterator<(usize, Vec<String>)> for OovDictionary {
    fn from_iter<T: IntoIterator<Item = (usize, Vec<String>)>>(iter: T) -> Self {
        OovDictionary {
            entries: iter.into_iter().collect(),
        }
    }
}
