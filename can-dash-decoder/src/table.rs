//! Identifier to category lookup
//!
//! The table is built once from the [`IdentifierMap`] and never mutated
//! afterwards. Identifiers that are not in the table are not an error; the
//! caller simply drops those frames.

use crate::config::IdentifierMap;
use crate::types::Category;
use std::collections::HashMap;

/// Immutable map from arbitration identifier to frame category
#[derive(Debug, Clone)]
pub struct FrameDecoderTable {
    categories: HashMap<u32, Category>,
}

impl FrameDecoderTable {
    /// Build the table from a validated identifier map
    pub fn new(identifiers: &IdentifierMap) -> Self {
        let categories: HashMap<u32, Category> = identifiers.entries().into_iter().collect();
        log::debug!("Frame decoder table ready with {} identifiers", categories.len());
        Self { categories }
    }

    /// Look up the category for an identifier
    pub fn classify(&self, can_id: u32) -> Option<Category> {
        self.categories.get(&can_id).copied()
    }

    /// Number of registered identifiers
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for FrameDecoderTable {
    fn default() -> Self {
        Self::new(&IdentifierMap::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = FrameDecoderTable::default();
        assert_eq!(table.len(), 5);
        assert_eq!(table.classify(0x108), Some(Category::Motion));
        assert_eq!(table.classify(0x145), Some(Category::Engine));
        assert_eq!(table.classify(0x445), Some(Category::AirTemp));
        assert_eq!(table.classify(0x375), Some(Category::FuelLevel));
        assert_eq!(table.classify(0x206), Some(Category::SteeringWheelControl));
    }

    #[test]
    fn test_unknown_identifiers_classify_to_none() {
        let table = FrameDecoderTable::default();
        for can_id in (0..0x800).filter(|id| ![0x108, 0x145, 0x445, 0x375, 0x206].contains(id)) {
            assert_eq!(table.classify(can_id), None, "0x{:X}", can_id);
        }
        assert_eq!(table.classify(0x1FFF_FFFF), None);
    }

    #[test]
    fn test_custom_identifiers() {
        let identifiers = IdentifierMap {
            motion: 0x10,
            ..IdentifierMap::default()
        };
        let table = FrameDecoderTable::new(&identifiers);
        assert_eq!(table.classify(0x10), Some(Category::Motion));
        assert_eq!(table.classify(0x108), None);
    }
}
