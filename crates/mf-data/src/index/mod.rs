//! Feature lookup by id

use ahash::AHashMap;

use mf_core::{Feature, FeatureId};

use crate::DataError;

/// Position of every feature in a collection, keyed by id
#[derive(Debug, Clone, Default)]
pub struct FeatureIndex {
    positions: AHashMap<FeatureId, usize>,
}

impl FeatureIndex {
    /// Index a collection. Ids must be unique.
    pub fn build(features: &[Feature]) -> Result<Self, DataError> {
        let mut positions = AHashMap::with_capacity(features.len());
        for (position, feature) in features.iter().enumerate() {
            if positions.insert(feature.id.clone(), position).is_some() {
                return Err(DataError::DuplicateId(feature.id.clone()));
            }
        }
        Ok(Self { positions })
    }

    /// Position of a feature in the indexed collection
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Look up a feature in the collection this index was built from
    pub fn get<'a>(&self, features: &'a [Feature], id: &str) -> Option<&'a Feature> {
        self.position(id).and_then(|position| features.get(position))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        let features = vec![Feature::new("a"), Feature::new("b")];
        let index = FeatureIndex::build(&features).unwrap();

        assert_eq!(index.position("b"), Some(1));
        assert_eq!(index.get(&features, "a").map(|f| f.id.as_str()), Some("a"));
        assert!(index.get(&features, "zzz").is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let features = vec![Feature::new("a"), Feature::new("a")];
        assert!(matches!(
            FeatureIndex::build(&features),
            Err(DataError::DuplicateId(id)) if id == "a"
        ));
    }
}
