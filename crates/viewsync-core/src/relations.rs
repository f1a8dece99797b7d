#![deny(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use viewsync_model::{DatasetName, EntityKind};

use crate::config::ConfigError;

/// Static mapping from an entity kind to the dataset names whose contents
/// may be affected when that kind is mutated.
///
/// Configuration, not state: built once at startup, read-only afterwards.
/// Target lists keep the order they were declared in; fan-out refreshes
/// follow that order.
#[derive(Debug, Clone, Default)]
pub struct RelationMap {
    relations: BTreeMap<EntityKind, Vec<DatasetName>>,
}

impl RelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the affected datasets for an entity kind, replacing any
    /// previous entry.
    pub fn insert(&mut self, kind: EntityKind, affects: Vec<DatasetName>) {
        self.relations.insert(kind, affects);
    }

    pub fn targets(&self, kind: &EntityKind) -> Option<&[DatasetName]> {
        self.relations.get(kind).map(Vec::as_slice)
    }

    pub fn entity_kinds(&self) -> impl Iterator<Item = &EntityKind> {
        self.relations.keys()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Every referenced dataset name must be registered; a dangling
    /// reference is a configuration error, not a runtime one.
    pub fn validate(&self, known: &BTreeSet<DatasetName>) -> Result<(), ConfigError> {
        for (kind, targets) in &self.relations {
            for target in targets {
                if !known.contains(target) {
                    return Err(ConfigError::DanglingRelation {
                        entity: kind.clone(),
                        dataset: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
