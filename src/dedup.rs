use crate::models::ListingId;
use std::collections::HashSet;

/// Identifiers already stored or already scraped during this run
#[derive(Debug, Default, Clone)]
pub struct KnownIds {
    ids: HashSet<ListingId>,
}

impl KnownIds {
    pub fn new(ids: impl IntoIterator<Item = ListingId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, id: &ListingId) -> bool {
        self.ids.contains(id)
    }

    /// Record `id`, returning false if it was already known
    pub fn insert_new(&mut self, id: &ListingId) -> bool {
        self.ids.insert(id.clone())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
