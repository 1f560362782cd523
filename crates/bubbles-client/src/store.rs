//! Entity store: the last known state of every live bubble.
//!
//! The store is a plain map keyed by [`BubbleId`]. It never talks to the
//! render surface; the [`Reconciler`](crate::reconciler::Reconciler) keeps
//! the two in step.

use std::collections::HashMap;

use bubbles_types::{BubbleId, BubbleState};

use crate::surface::{CellId, NodeId};

/// One live bubble as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// State from the most recent update.
    pub state: BubbleState,
    /// Render node drawing this bubble.
    pub node: NodeId,
    /// Cell the node is attached to, `None` while detached.
    pub attachment: Option<CellId>,
}

/// Map of live bubbles, at most one record per id.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    records: HashMap<BubbleId, EntityRecord>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record.
    pub fn get(&self, id: &BubbleId) -> Option<&EntityRecord> {
        self.records.get(id)
    }

    /// Whether a record exists for the id.
    pub fn contains(&self, id: &BubbleId) -> bool {
        self.records.contains_key(id)
    }

    /// Insert or replace the record for its bubble id.
    pub fn insert(&mut self, record: EntityRecord) {
        self.records.insert(record.state.id.clone(), record);
    }

    /// Remove and return a record.
    pub fn remove(&mut self, id: &BubbleId) -> Option<EntityRecord> {
        self.records.remove(id)
    }

    /// Keep only the records for which the predicate returns `true`.
    /// Dropped records are returned.
    pub fn drain_where(
        &mut self,
        mut drop: impl FnMut(&EntityRecord) -> bool,
    ) -> Vec<EntityRecord> {
        let ids: Vec<BubbleId> = self
            .records
            .iter()
            .filter(|(_, record)| drop(record))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| self.records.remove(id)).collect()
    }

    /// Mutable access to every record.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityRecord> {
        self.records.values_mut()
    }

    /// Every record, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of live bubbles.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no bubble is live.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
