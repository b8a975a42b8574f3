//! Stem sets produced by a separation run

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Stem name → file path, for the stems actually present on disk
///
/// Ordered so responses list stems in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StemSet {
    stems: BTreeMap<String, PathBuf>,
}

impl StemSet {
    pub fn new(stems: BTreeMap<String, PathBuf>) -> Self {
        Self { stems }
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn get(&self, stem: &str) -> Option<&PathBuf> {
        self.stems.get(stem)
    }

    /// Map every stem path through `to_url`, dropping stems it rejects
    pub fn to_urls<F>(&self, to_url: F) -> BTreeMap<String, String>
    where
        F: Fn(&std::path::Path) -> Option<String>,
    {
        self.stems
            .iter()
            .filter_map(|(name, path)| to_url(path).map(|url| (name.clone(), url)))
            .collect()
    }
}
